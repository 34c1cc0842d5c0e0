use super::{AllowInsert, MoveType, Mover};
use crate::core::kinematics::Connection;
use crate::core::models::pose::Pose;
use crate::engine::config::LoopClosureSettings;
use crate::engine::error::{LoopClosureFailure, MoveError};
use nalgebra::{Point3, Vector3};
use rand::{Rng, RngCore};
use tracing::{debug, trace};

/// Closes chain breaks by cyclic coordinate descent over nearby bond torsions.
///
/// For a cut after residue `c`, every movable bond within `window` bonds of the cut is
/// a pivot. A pivot whose rotation carries exactly one side of the break is turned by
/// the angle that brings that side's backbone atom closest to the point at ideal bond
/// length from the other side. Sweeps repeat until the gap is below `tolerance` or
/// `max_iterations` sweeps have run.
#[derive(Debug, Clone)]
pub struct LoopCloser {
    settings: LoopClosureSettings,
    allow_insert: AllowInsert,
}

/// A bond rotation that moves one side of a chain break.
#[derive(Debug, Clone, Copy)]
struct Pivot {
    bond: usize,
    /// Residue whose subtree the rotation moves.
    child: usize,
    /// Side of the break carried by the rotation (`c` or `c + 1`).
    moving: usize,
    fixed: usize,
}

impl LoopCloser {
    pub fn new(settings: LoopClosureSettings, allow_insert: AllowInsert) -> Self {
        Self {
            settings,
            allow_insert,
        }
    }

    pub fn settings(&self) -> &LoopClosureSettings {
        &self.settings
    }

    fn pivots(&self, pose: &Pose, cutpoint: usize) -> Vec<Pivot> {
        let tree = pose.fold_tree();
        let window = self.settings.window;
        let lower = cutpoint.saturating_sub(window).max(1);
        let upper = (cutpoint + window).min(pose.total_residue().saturating_sub(1));

        (lower..=upper)
            .filter(|&bond| bond != cutpoint && self.allow_insert.bond(bond))
            .filter_map(|bond| {
                let child = if tree.parent(bond + 1) == Some((bond, Connection::Bond)) {
                    bond + 1
                } else if tree.parent(bond) == Some((bond + 1, Connection::Bond)) {
                    bond
                } else {
                    return None;
                };
                let left = tree.is_downstream(child, cutpoint);
                let right = tree.is_downstream(child, cutpoint + 1);
                let (moving, fixed) = match (left, right) {
                    (true, false) => (cutpoint, cutpoint + 1),
                    (false, true) => (cutpoint + 1, cutpoint),
                    _ => return None,
                };
                Some(Pivot {
                    bond,
                    child,
                    moving,
                    fixed,
                })
            })
            .collect()
    }

    /// Runs CCD on one chain break and returns the remaining gap.
    pub fn close_cutpoint(&self, pose: &mut Pose, cutpoint: usize) -> Result<f64, MoveError> {
        if !pose.is_chain_break(cutpoint) {
            return Ok(0.0);
        }
        let pivots = self.pivots(pose, cutpoint);
        if pivots.is_empty() {
            return Err(MoveError::NoMovableDof("loop closure"));
        }
        let ideal = pose
            .residue(cutpoint)
            .map(|r| r.kind().ideal_bond_length())
            .unwrap_or_default();

        let mut gap = pose.chain_break_gap(cutpoint);
        for iteration in 0..self.settings.max_iterations {
            if gap <= self.settings.tolerance {
                trace!(cutpoint, iteration, gap, "Chain break closed");
                return Ok(gap);
            }
            for pivot in &pivots {
                let angle = ccd_angle(pose, pivot, ideal);
                if angle.abs() > 1e-12 {
                    let delta = if pivot.child == pivot.bond + 1 { angle } else { -angle };
                    pose.rotate_bond(pivot.bond, delta)?;
                }
            }
            gap = pose.chain_break_gap(cutpoint);
        }
        if gap <= self.settings.tolerance {
            return Ok(gap);
        }
        Err(LoopClosureFailure { cutpoint, gap }.into())
    }

    /// Tries to close every chain break. All breaks are attempted; the failure with the
    /// largest remaining gap is returned.
    pub fn close_all(&self, pose: &mut Pose) -> Result<(), MoveError> {
        let mut worst: Option<LoopClosureFailure> = None;
        for cutpoint in pose.chain_breaks() {
            match self.close_cutpoint(pose, cutpoint) {
                Ok(_) => {}
                Err(MoveError::LoopClosure(failure)) => {
                    if worst.as_ref().is_none_or(|w| failure.gap > w.gap) {
                        worst = Some(failure);
                    }
                }
                Err(MoveError::NoMovableDof(_)) => {
                    debug!(cutpoint, "No pivots available near chain break");
                }
                Err(other) => return Err(other),
            }
        }
        match worst {
            Some(failure) => Err(failure.into()),
            None => Ok(()),
        }
    }

    /// True when every chain break is within `max_gap` of ideal bond length.
    pub fn check_closure(pose: &Pose, max_gap: f64) -> bool {
        pose.chain_breaks()
            .into_iter()
            .all(|c| pose.chain_break_gap(c) <= max_gap)
    }

    /// Largest chain-break gap of the pose, 0 when there are no breaks.
    pub fn max_gap(pose: &Pose) -> f64 {
        pose.chain_breaks()
            .into_iter()
            .map(|c| pose.chain_break_gap(c))
            .fold(0.0, f64::max)
    }
}

/// Rotation (degrees) about the pivot bond that brings the moving backbone atom
/// closest to its target.
fn ccd_angle(pose: &Pose, pivot: &Pivot, ideal: f64) -> f64 {
    let axis_origin = pose.backbone_xyz(pivot.bond + 1);
    let axis = pose.frame(pivot.bond).rotation * Vector3::x();

    let moving = pose.backbone_xyz(pivot.moving);
    let fixed = pose.backbone_xyz(pivot.fixed);
    let direction = moving - fixed;
    let target: Point3<f64> = if direction.norm() > 1e-9 {
        fixed + direction.normalize() * ideal
    } else {
        fixed
    };

    let perpendicular = |v: Vector3<f64>| v - axis * axis.dot(&v);
    let r = perpendicular(moving - axis_origin);
    let f = perpendicular(target - axis_origin);
    if r.norm() < 1e-9 || f.norm() < 1e-9 {
        return 0.0;
    }
    axis.dot(&r.cross(&f)).atan2(r.dot(&f)).to_degrees()
}

impl Mover for LoopCloser {
    /// Closes one random chain break.
    fn apply(&mut self, pose: &mut Pose, rng: &mut dyn RngCore) -> Result<(), MoveError> {
        let breaks = pose.chain_breaks();
        if breaks.is_empty() {
            return Err(MoveError::NoMovableDof("loop closure"));
        }
        let cutpoint = breaks[rng.gen_range(0..breaks.len())];
        self.close_cutpoint(pose, cutpoint).map(|_| ())
    }

    fn move_type(&self) -> MoveType {
        MoveType::LoopClosure
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::kinematics::FoldTree;
    use crate::core::models::residue::Polymer;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn broken_pose(twist: f64) -> Pose {
        let mut pose = Pose::from_sequence("ggggaaaacccc", Polymer::Rna).unwrap();
        pose.set_fold_tree(FoldTree::from_jumps_and_cuts(12, &[(2, 10)], &[6], 1).unwrap())
            .unwrap();
        pose.rotate_bond(3, twist).unwrap();
        pose.rotate_bond(8, -twist / 2.0).unwrap();
        pose
    }

    fn closer(pose: &Pose) -> LoopCloser {
        LoopCloser::new(LoopClosureSettings::default(), AllowInsert::from_pose(pose, &[]))
    }

    #[test]
    fn pivots_carry_exactly_one_side_of_the_break() {
        let pose = broken_pose(0.0);
        let bonds: Vec<usize> = closer(&pose)
            .pivots(&pose, 6)
            .iter()
            .map(|p| p.bond)
            .collect();
        assert_eq!(bonds, vec![2, 3, 4, 5, 7, 8, 9]);
    }

    #[test]
    fn ccd_closes_an_opened_break() {
        let mut pose = broken_pose(90.0);
        assert!(pose.chain_break_gap(6) > 0.1);
        let gap = closer(&pose).close_cutpoint(&mut pose, 6).unwrap();
        assert!(gap <= 0.05);
        assert!(pose.chain_break_gap(6) <= 0.05);
        assert!(LoopCloser::check_closure(&pose, 0.05));
    }

    #[test]
    fn closure_fails_softly_when_pivots_cannot_reach() {
        let mut pose = broken_pose(90.0);
        let mut allow = AllowInsert::from_pose(&pose, &[]);
        for bond in 1..12 {
            if bond != 5 {
                allow.set_bond(bond, false);
            }
        }
        let settings = LoopClosureSettings {
            max_iterations: 5,
            ..LoopClosureSettings::default()
        };
        let err = LoopCloser::new(settings, allow)
            .close_cutpoint(&mut pose, 6)
            .unwrap_err();
        assert!(matches!(err, MoveError::LoopClosure(LoopClosureFailure { cutpoint: 6, .. })));
        assert!(err.is_soft());
    }

    #[test]
    fn mover_without_breaks_is_a_soft_failure() {
        let mut pose = Pose::from_sequence("gggg", Polymer::Rna).unwrap();
        let mut closer = closer(&pose);
        let err = closer
            .apply(&mut pose, &mut StdRng::seed_from_u64(0))
            .unwrap_err();
        assert!(err.is_soft());
        assert_eq!(LoopCloser::max_gap(&pose), 0.0);
    }
}
