use super::residue::{ParseResidueError, Polymer, Residue, ResidueKind};
use super::secstruct::{SecStructError, SecondaryStructure};
use crate::core::constraints::ConstraintSet;
use crate::core::kinematics::dof::{self, BondGeometry};
use crate::core::kinematics::{Connection, FoldTree, FoldTreeError};
use nalgebra::{Isometry3, Matrix3, Point3, Rotation3, Translation3, UnitQuaternion, Vector3};
use thiserror::Error;

/// Bond angle of the extended chain built by [`Pose::from_sequence`].
pub const EXTENDED_BOND_ANGLE: f64 = 150.0;
/// Torsion of the extended chain built by [`Pose::from_sequence`].
pub const EXTENDED_TORSION: f64 = 180.0;

#[derive(Debug, Error)]
pub enum PoseError {
    #[error("Cannot build a pose from an empty sequence")]
    EmptySequence,
    #[error("Invalid sequence: {0}")]
    Sequence(#[from] ParseResidueError),
    #[error("Residue {seqpos} is out of range for a pose of {total_residue} residues")]
    ResidueOutOfRange { seqpos: usize, total_residue: usize },
    #[error("Jump {jump} does not exist (the fold tree has {num_jump} jumps)")]
    JumpOutOfRange { jump: usize, num_jump: usize },
    #[error("Fold tree covers {found} residues, pose has {expected}")]
    FoldTreeSize { expected: usize, found: usize },
    #[error("Fold tree construction failed: {0}")]
    FoldTree(#[from] FoldTreeError),
    #[error("Secondary structure error: {0}")]
    SecStruct(#[from] SecStructError),
    #[error("Cannot delete the last remaining residue")]
    LastResidue,
    #[error("Expected {expected} values, got {found}")]
    LengthMismatch { expected: usize, found: usize },
    #[error("Conservation score {value} of residue {seqpos} must be finite and non-negative")]
    InvalidConservation { seqpos: usize, value: f64 },
}

/// A polymer conformation with its kinematic tree.
///
/// Residue frames are the source of truth for coordinates. Internal degrees of
/// freedom (one virtual bond per sequence-adjacent pair, one rigid-body transform per
/// jump) are derived from the frames through the fold tree; changing a degree of
/// freedom refolds every frame below it while the root frame stays fixed. Bond
/// transforms are stored independently of tree direction: bond `i` always maps the
/// frame of residue `i` onto the frame of residue `i + 1`.
///
/// Residues are addressed by 1-based sequence position.
#[derive(Debug, Clone)]
pub struct Pose {
    residues: Vec<Residue>,
    frames: Vec<Isometry3<f64>>,
    bonds: Vec<Isometry3<f64>>,
    jumps: Vec<Isometry3<f64>>,
    fold_tree: FoldTree,
    constraints: ConstraintSet,
    secstruct: Option<SecondaryStructure>,
    conservation: Option<Vec<f64>>,
    chain_ends: Vec<usize>,
}

impl Pose {
    /// Builds an ideal extended chain from one-letter codes.
    pub fn from_sequence(sequence: &str, polymer: Polymer) -> Result<Self, PoseError> {
        let kinds = sequence
            .chars()
            .filter(|c| !c.is_whitespace())
            .map(|c| ResidueKind::from_code(c, polymer))
            .collect::<Result<Vec<_>, _>>()?;
        if kinds.is_empty() {
            return Err(PoseError::EmptySequence);
        }

        let mut frames = Vec::with_capacity(kinds.len());
        let mut frame = Isometry3::identity();
        for (i, kind) in kinds.iter().enumerate() {
            if i > 0 {
                frame *= dof::ideal_bond(
                    EXTENDED_BOND_ANGLE,
                    EXTENDED_TORSION,
                    kind.ideal_bond_length(),
                );
            }
            frames.push(frame);
        }
        let residues = kinds.into_iter().map(Residue::ideal).collect();
        Ok(Self::from_frames(residues, frames, Vec::new()))
    }

    /// Builds a pose from residues and their Cartesian backbone frames, with a simple
    /// fold tree. `chain_ends` lists residues that are not chemically bonded to their
    /// successor.
    pub fn from_frames(
        residues: Vec<Residue>,
        frames: Vec<Isometry3<f64>>,
        chain_ends: Vec<usize>,
    ) -> Self {
        let nres = residues.len();
        let mut pose = Self {
            residues,
            frames,
            bonds: Vec::new(),
            jumps: Vec::new(),
            fold_tree: FoldTree::simple(nres),
            constraints: ConstraintSet::new(),
            secstruct: None,
            conservation: None,
            chain_ends,
        };
        pose.derive_dofs();
        pose
    }

    pub fn total_residue(&self) -> usize {
        self.residues.len()
    }

    /// Number of residues that are not virtual.
    pub fn num_real_residues(&self) -> usize {
        self.residues.iter().filter(|r| !r.is_virtual()).count()
    }

    pub fn residue(&self, seqpos: usize) -> Option<&Residue> {
        seqpos.checked_sub(1).and_then(|i| self.residues.get(i))
    }

    pub fn residues(&self) -> &[Residue] {
        &self.residues
    }

    pub fn is_virtual(&self, seqpos: usize) -> bool {
        self.residue(seqpos).is_some_and(Residue::is_virtual)
    }

    pub fn sequence(&self) -> String {
        self.residues
            .iter()
            .filter(|r| !r.is_virtual())
            .map(|r| r.kind().one_letter())
            .collect()
    }

    pub fn frame(&self, seqpos: usize) -> &Isometry3<f64> {
        &self.frames[seqpos - 1]
    }

    /// Cartesian position of a named atom.
    pub fn xyz(&self, seqpos: usize, atom: &str) -> Option<Point3<f64>> {
        let residue = self.residue(seqpos)?;
        let atom = residue.atom(atom)?;
        Some(self.frames[seqpos - 1] * atom.local)
    }

    /// Position of the backbone reference atom, which is the frame origin.
    pub fn backbone_xyz(&self, seqpos: usize) -> Point3<f64> {
        Point3::from(self.frames[seqpos - 1].translation.vector)
    }

    /// Position of the coarse interaction site of a residue.
    pub fn bead(&self, seqpos: usize) -> Point3<f64> {
        let residue = &self.residues[seqpos - 1];
        residue
            .atom(residue.kind().bead_atom())
            .map(|atom| self.frames[seqpos - 1] * atom.local)
            .unwrap_or_else(|| self.backbone_xyz(seqpos))
    }

    /// Backbone positions of every non-virtual residue, in sequence order.
    pub fn backbone_coords(&self) -> Vec<Point3<f64>> {
        (1..=self.total_residue())
            .filter(|&i| !self.is_virtual(i))
            .map(|i| self.backbone_xyz(i))
            .collect()
    }

    /// Bead positions of every non-virtual residue, in sequence order.
    pub fn bead_coords(&self) -> Vec<Point3<f64>> {
        (1..=self.total_residue())
            .filter(|&i| !self.is_virtual(i))
            .map(|i| self.bead(i))
            .collect()
    }

    pub fn fold_tree(&self) -> &FoldTree {
        &self.fold_tree
    }

    /// Installs a new fold tree without moving any atom.
    pub fn set_fold_tree(&mut self, fold_tree: FoldTree) -> Result<(), PoseError> {
        if fold_tree.nres() != self.total_residue() {
            return Err(PoseError::FoldTreeSize {
                expected: self.total_residue(),
                found: fold_tree.nres(),
            });
        }
        self.fold_tree = fold_tree;
        self.derive_dofs();
        Ok(())
    }

    pub fn num_jump(&self) -> usize {
        self.fold_tree.num_jump()
    }

    /// Transform of bond `seqpos → seqpos + 1`.
    pub fn bond(&self, seqpos: usize) -> Option<&Isometry3<f64>> {
        seqpos.checked_sub(1).and_then(|i| self.bonds.get(i))
    }

    pub fn bond_geometry(&self, seqpos: usize) -> Option<BondGeometry> {
        self.bond(seqpos).map(dof::bond_geometry)
    }

    pub fn set_bond(&mut self, seqpos: usize, bond: Isometry3<f64>) -> Result<(), PoseError> {
        self.check_bond(seqpos)?;
        self.bonds[seqpos - 1] = bond;
        self.refold();
        Ok(())
    }

    /// Sets angle and torsion of a bond, keeping its length.
    pub fn set_bond_torsions(
        &mut self,
        seqpos: usize,
        angle: f64,
        torsion: f64,
    ) -> Result<(), PoseError> {
        self.check_bond(seqpos)?;
        let length = self.bonds[seqpos - 1].translation.vector.norm();
        self.bonds[seqpos - 1] = dof::ideal_bond(angle, torsion, length);
        self.refold();
        Ok(())
    }

    /// Applies several bond updates with a single refold.
    pub fn set_bonds(
        &mut self,
        updates: impl IntoIterator<Item = (usize, Isometry3<f64>)>,
    ) -> Result<(), PoseError> {
        for (seqpos, bond) in updates {
            self.check_bond(seqpos)?;
            self.bonds[seqpos - 1] = bond;
        }
        self.refold();
        Ok(())
    }

    /// Twists bond `seqpos` by `delta` degrees about its own axis.
    ///
    /// Whichever side of the bond lies further from the root is the side that moves.
    pub fn rotate_bond(&mut self, seqpos: usize, delta: f64) -> Result<(), PoseError> {
        self.check_bond(seqpos)?;
        self.bonds[seqpos - 1] = dof::twist_bond(&self.bonds[seqpos - 1], delta);
        self.refold();
        Ok(())
    }

    pub fn jump(&self, n: usize) -> Option<&Isometry3<f64>> {
        n.checked_sub(1).and_then(|i| self.jumps.get(i))
    }

    pub fn set_jump(&mut self, n: usize, jump: Isometry3<f64>) -> Result<(), PoseError> {
        if n == 0 || n > self.jumps.len() {
            return Err(PoseError::JumpOutOfRange {
                jump: n,
                num_jump: self.jumps.len(),
            });
        }
        self.jumps[n - 1] = jump;
        self.refold();
        Ok(())
    }

    pub fn constraints(&self) -> &ConstraintSet {
        &self.constraints
    }

    pub fn constraints_mut(&mut self) -> &mut ConstraintSet {
        &mut self.constraints
    }

    pub fn set_constraints(&mut self, constraints: ConstraintSet) {
        self.constraints = constraints;
    }

    pub fn secstruct(&self) -> Option<&SecondaryStructure> {
        self.secstruct.as_ref()
    }

    pub fn set_secstruct(&mut self, secstruct: SecondaryStructure) -> Result<(), PoseError> {
        if secstruct.len() != self.num_real_residues() {
            return Err(SecStructError::LengthMismatch {
                expected: self.num_real_residues(),
                found: secstruct.len(),
            }
            .into());
        }
        self.secstruct = Some(secstruct);
        Ok(())
    }

    pub fn has_conservation(&self) -> bool {
        self.conservation.is_some()
    }

    /// Per-residue structural conservation; `None` when the pose carries no data or
    /// the residue has no entry.
    pub fn structural_conservation(&self, seqpos: usize) -> Option<f64> {
        let scores = self.conservation.as_ref()?;
        seqpos.checked_sub(1).and_then(|i| scores.get(i)).copied()
    }

    pub fn set_conservation(&mut self, scores: Vec<f64>) -> Result<(), PoseError> {
        if scores.len() > self.total_residue() {
            return Err(PoseError::LengthMismatch {
                expected: self.total_residue(),
                found: scores.len(),
            });
        }
        if let Some((i, &value)) = scores
            .iter()
            .enumerate()
            .find(|&(_, v)| !v.is_finite() || *v < 0.0)
        {
            return Err(PoseError::InvalidConservation {
                seqpos: i + 1,
                value,
            });
        }
        self.conservation = Some(scores);
        Ok(())
    }

    pub fn clear_conservation(&mut self) {
        self.conservation = None;
    }

    pub fn chain_ends(&self) -> &[usize] {
        &self.chain_ends
    }

    /// True when the backbone is chemically continuous between `c` and `c + 1` but
    /// the fold tree cuts it, so the two sides may drift apart.
    pub fn is_chain_break(&self, c: usize) -> bool {
        c >= 1
            && c < self.total_residue()
            && self.fold_tree.is_cutpoint(c)
            && !self.chain_ends.contains(&c)
            && !self.is_virtual(c)
            && !self.is_virtual(c + 1)
    }

    pub fn chain_breaks(&self) -> Vec<usize> {
        self.fold_tree
            .cutpoints()
            .iter()
            .copied()
            .filter(|&c| self.is_chain_break(c))
            .collect()
    }

    /// Deviation of the backbone distance across `c → c + 1` from the ideal bond length.
    pub fn chain_break_gap(&self, c: usize) -> f64 {
        let ideal = self.residues[c - 1].kind().ideal_bond_length();
        let actual = nalgebra::distance(&self.backbone_xyz(c), &self.backbone_xyz(c + 1));
        (actual - ideal).abs()
    }

    /// Adds a virtual residue at `center` and makes it the fold-tree root.
    ///
    /// The existing jumps and cutpoints are kept; the new residue is attached by a
    /// jump to the residue nearest to `center`, and the former chain terminus becomes
    /// a cutpoint. Returns the index of the virtual residue.
    pub fn append_virtual_root(&mut self, center: Point3<f64>) -> Result<usize, PoseError> {
        let old_nres = self.total_residue();
        let nearest = (1..=old_nres)
            .filter(|&i| !self.is_virtual(i))
            .min_by(|&a, &b| {
                let da = nalgebra::distance_squared(&self.backbone_xyz(a), &center);
                let db = nalgebra::distance_squared(&self.backbone_xyz(b), &center);
                da.total_cmp(&db)
            })
            .unwrap_or(1);

        let (mut jumps, mut cuts) = self.fold_tree.jumps_and_cuts();
        let vrt = old_nres + 1;
        jumps.push((vrt, nearest));
        cuts.push(old_nres);
        let tree = FoldTree::from_jumps_and_cuts(vrt, &jumps, &cuts, vrt)?;

        self.residues.push(Residue::ideal(ResidueKind::Virtual));
        self.frames.push(Isometry3::from_parts(
            Translation3::from(center.coords),
            UnitQuaternion::identity(),
        ));
        if !self.chain_ends.contains(&old_nres) {
            self.chain_ends.push(old_nres);
        }
        self.fold_tree = tree;
        self.derive_dofs();
        Ok(vrt)
    }

    /// Removes a residue.
    ///
    /// Every residue above `seqpos` shifts down by one, so indices held by callers are
    /// invalid afterwards. Constraints touching the residue are dropped and the rest
    /// renumbered; the fold tree is reset to a simple tree over the remaining residues.
    pub fn delete_residue(&mut self, seqpos: usize) -> Result<(), PoseError> {
        let total_residue = self.total_residue();
        if seqpos == 0 || seqpos > total_residue {
            return Err(PoseError::ResidueOutOfRange {
                seqpos,
                total_residue,
            });
        }
        if total_residue == 1 {
            return Err(PoseError::LastResidue);
        }
        let removed_virtual = self.residues[seqpos - 1].is_virtual();
        self.residues.remove(seqpos - 1);
        self.frames.remove(seqpos - 1);
        self.constraints.remap_after_deletion(seqpos);
        if !removed_virtual {
            if let Some(ss) = self.secstruct.as_mut() {
                ss.remove(seqpos);
            }
        }
        if let Some(scores) = self.conservation.as_mut() {
            if seqpos <= scores.len() {
                scores.remove(seqpos - 1);
            }
        }
        let new_total = self.residues.len();
        self.chain_ends = self
            .chain_ends
            .iter()
            .filter(|&&c| c != seqpos)
            .map(|&c| if c > seqpos { c - 1 } else { c })
            .filter(|&c| c < new_total)
            .collect();
        self.fold_tree = FoldTree::simple(new_total);
        self.derive_dofs();
        Ok(())
    }

    fn check_bond(&self, seqpos: usize) -> Result<(), PoseError> {
        if seqpos == 0 || seqpos >= self.total_residue() {
            return Err(PoseError::ResidueOutOfRange {
                seqpos,
                total_residue: self.total_residue(),
            });
        }
        Ok(())
    }

    fn derive_dofs(&mut self) {
        self.bonds = self
            .frames
            .windows(2)
            .map(|w| w[0].inverse() * w[1])
            .collect();
        self.jumps = self
            .fold_tree
            .jumps()
            .iter()
            .map(|&(up, down)| self.frames[up - 1].inverse() * self.frames[down - 1])
            .collect();
    }

    fn refold(&mut self) {
        let steps = self.fold_tree.traversal();
        for step in steps {
            let parent = self.frames[step.parent - 1];
            let child = match step.connection {
                Connection::Bond if step.child == step.parent + 1 => {
                    parent * self.bonds[step.parent - 1]
                }
                Connection::Bond => parent * self.bonds[step.child - 1].inverse(),
                Connection::Jump(n) => parent * self.jumps[n - 1],
            };
            self.frames[step.child - 1] = child;
        }
    }
}

/// Builds orthonormal residue frames from a backbone trace.
///
/// Each frame's x axis points at the next residue (the last one reuses the previous
/// direction); the y axis lies in the plane of the previous, current and next points.
pub fn frames_from_trace(points: &[Point3<f64>]) -> Vec<Isometry3<f64>> {
    let n = points.len();
    (0..n)
        .map(|i| {
            let x = if n == 1 {
                Vector3::x()
            } else if i + 1 < n {
                points[i + 1] - points[i]
            } else {
                points[i] - points[i - 1]
            };
            let x = x.try_normalize(1e-9).unwrap_or_else(Vector3::x);
            let reference = if i > 0 {
                points[i - 1] - points[i]
            } else if n > 2 {
                points[i + 1] - points[i + 2]
            } else {
                Vector3::y()
            };
            let z = x
                .cross(&reference)
                .try_normalize(1e-9)
                .unwrap_or_else(|| any_perpendicular(&x));
            let y = z.cross(&x);
            let rotation = Rotation3::from_matrix_unchecked(Matrix3::from_columns(&[x, y, z]));
            Isometry3::from_parts(
                Translation3::from(points[i].coords),
                UnitQuaternion::from_rotation_matrix(&rotation),
            )
        })
        .collect()
}

fn any_perpendicular(v: &Vector3<f64>) -> Vector3<f64> {
    let helper = if v.x.abs() < 0.9 {
        Vector3::x()
    } else {
        Vector3::y()
    };
    v.cross(&helper).normalize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::constraints::{AtomRef, Constraint, Func};

    const EPS: f64 = 1e-6;

    fn rna(seq: &str) -> Pose {
        Pose::from_sequence(seq, Polymer::Rna).unwrap()
    }

    fn coords(pose: &Pose) -> Vec<Point3<f64>> {
        (1..=pose.total_residue()).map(|i| pose.bead(i)).collect()
    }

    fn max_displacement(a: &[Point3<f64>], b: &[Point3<f64>]) -> f64 {
        a.iter()
            .zip(b)
            .map(|(p, q)| nalgebra::distance(p, q))
            .fold(0.0, f64::max)
    }

    #[test]
    fn from_sequence_builds_ideal_chain() {
        let pose = rna("gGaC u");
        assert_eq!(pose.total_residue(), 5);
        assert_eq!(pose.sequence(), "ggacu");
        for i in 1..5 {
            let d = nalgebra::distance(&pose.backbone_xyz(i), &pose.backbone_xyz(i + 1));
            assert!((d - 5.9).abs() < EPS);
            let geometry = pose.bond_geometry(i).unwrap();
            assert!((geometry.angle - EXTENDED_BOND_ANGLE).abs() < EPS);
        }
        assert_eq!(pose.fold_tree().root(), 1);
    }

    #[test]
    fn from_sequence_rejects_empty_and_unknown_input() {
        assert!(matches!(
            Pose::from_sequence("  ", Polymer::Rna),
            Err(PoseError::EmptySequence)
        ));
        assert!(matches!(
            Pose::from_sequence("acgx", Polymer::Rna),
            Err(PoseError::Sequence(_))
        ));
    }

    #[test]
    fn set_fold_tree_does_not_move_atoms() {
        let mut pose = rna("acguacguac");
        pose.set_bond_torsions(4, 100.0, 60.0).unwrap();
        let before = coords(&pose);
        let tree = FoldTree::from_jumps_and_cuts(10, &[(2, 9)], &[5], 9).unwrap();
        pose.set_fold_tree(tree).unwrap();
        assert!(max_displacement(&before, &coords(&pose)) < EPS);
        assert!(pose.jump(1).is_some());
    }

    #[test]
    fn set_fold_tree_rejects_wrong_size() {
        let mut pose = rna("acgu");
        assert!(matches!(
            pose.set_fold_tree(FoldTree::simple(5)),
            Err(PoseError::FoldTreeSize {
                expected: 4,
                found: 5
            })
        ));
    }

    #[test]
    fn bond_change_moves_only_the_downstream_side() {
        let mut pose = rna("acguacgu");
        let before = coords(&pose);
        pose.set_bond_torsions(4, 120.0, 30.0).unwrap();
        let after = coords(&pose);
        assert!(max_displacement(&before[..4], &after[..4]) < EPS);
        assert!(max_displacement(&before[4..], &after[4..]) > 0.1);
    }

    #[test]
    fn bond_change_respects_tree_direction() {
        let mut pose = rna("acguacgu");
        let tree = FoldTree::from_jumps_and_cuts(8, &[], &[], 8).unwrap();
        pose.set_fold_tree(tree).unwrap();
        let before = coords(&pose);
        pose.rotate_bond(4, 40.0).unwrap();
        let after = coords(&pose);
        assert!(max_displacement(&before[4..], &after[4..]) < EPS);
        assert!(max_displacement(&before[..4], &after[..4]) > 0.1);
    }

    #[test]
    fn jump_change_moves_only_the_downstream_segment() {
        let mut pose = rna("acguacguac");
        let tree = FoldTree::from_jumps_and_cuts(10, &[(2, 8)], &[5], 2).unwrap();
        pose.set_fold_tree(tree).unwrap();
        let before = coords(&pose);
        let shifted = Isometry3::translation(0.0, 2.0, 0.0) * *pose.jump(1).unwrap();
        pose.set_jump(1, shifted).unwrap();
        let after = coords(&pose);
        assert!(max_displacement(&before[..5], &after[..5]) < EPS);
        assert!(max_displacement(&before[5..], &after[5..]) > 1.0);
        assert!(pose.is_chain_break(5));
        assert!(pose.chain_break_gap(5) > 0.0);
    }

    #[test]
    fn invalid_dof_indices_are_rejected() {
        let mut pose = rna("acgu");
        assert!(pose.set_bond_torsions(4, 120.0, 0.0).is_err());
        assert!(pose.set_bond_torsions(0, 120.0, 0.0).is_err());
        assert!(matches!(
            pose.set_jump(1, Isometry3::identity()),
            Err(PoseError::JumpOutOfRange { .. })
        ));
    }

    #[test]
    fn append_virtual_root_then_delete_restores_residue_count() {
        let mut pose = rna("acguacgu");
        let before = coords(&pose);
        let vrt = pose.append_virtual_root(Point3::new(1.0, 2.0, 3.0)).unwrap();
        assert_eq!(vrt, 9);
        assert_eq!(pose.total_residue(), 9);
        assert!(pose.is_virtual(9));
        assert_eq!(pose.fold_tree().root(), 9);
        assert!(!pose.is_chain_break(8));
        assert_eq!(pose.sequence(), "acguacgu");
        assert!((pose.backbone_xyz(9) - Point3::new(1.0, 2.0, 3.0)).norm() < EPS);

        pose.delete_residue(vrt).unwrap();
        assert_eq!(pose.total_residue(), 8);
        assert_eq!(pose.fold_tree().root(), 1);
        assert!(max_displacement(&before, &coords(&pose)) < EPS);
        assert!(pose.chain_ends().is_empty());
    }

    #[test]
    fn delete_residue_renumbers_constraints_and_conservation() {
        let mut pose = rna("acguac");
        pose.constraints_mut().add(Constraint::atom_pair(
            AtomRef::new(1, "P"),
            AtomRef::new(6, "P"),
            Func::Harmonic { x0: 5.0, sd: 1.0 },
        ));
        pose.set_conservation(vec![0.1, 0.2, 0.3, 0.4, 0.5, 0.6])
            .unwrap();
        pose.delete_residue(3).unwrap();
        let (_, constraint) = pose.constraints().iter().next().unwrap();
        assert_eq!(constraint.sequence_separation(), 4);
        assert_eq!(pose.structural_conservation(3), Some(0.4));
        assert!(matches!(
            pose.delete_residue(9),
            Err(PoseError::ResidueOutOfRange { .. })
        ));
    }

    #[test]
    fn conservation_is_optional_per_residue() {
        let mut pose = rna("acgu");
        assert!(!pose.has_conservation());
        pose.set_conservation(vec![1.0, 2.0]).unwrap();
        assert_eq!(pose.structural_conservation(2), Some(2.0));
        assert_eq!(pose.structural_conservation(3), None);
        assert!(pose.set_conservation(vec![0.0; 5]).is_err());
    }

    #[test]
    fn conservation_scores_must_be_usable_weights() {
        let mut pose = rna("acgu");
        pose.set_conservation(vec![0.5, 2.0]).unwrap();
        assert!(matches!(
            pose.set_conservation(vec![0.5, -1.0]),
            Err(PoseError::InvalidConservation { seqpos: 2, .. })
        ));
        assert!(matches!(
            pose.set_conservation(vec![f64::NAN]),
            Err(PoseError::InvalidConservation { seqpos: 1, .. })
        ));
        assert!(matches!(
            pose.set_conservation(vec![1.0, 1.0, f64::INFINITY]),
            Err(PoseError::InvalidConservation { seqpos: 3, .. })
        ));
        assert_eq!(pose.structural_conservation(2), Some(2.0));
    }

    #[test]
    fn set_secstruct_checks_length() {
        let mut pose = rna("acgu");
        assert!(pose.set_secstruct(SecondaryStructure::from_dssp("HHL")).is_err());
        pose.set_secstruct(SecondaryStructure::from_dssp("HHLL"))
            .unwrap();
        assert_eq!(pose.secstruct().unwrap().secstruct(3), 'L');
    }

    #[test]
    fn frames_from_trace_reproduce_the_ideal_chain_geometry() {
        let pose = rna("acguacgu");
        let frames = frames_from_trace(&pose.backbone_coords());
        for (i, frame) in frames.iter().enumerate() {
            let origin = Point3::from(frame.translation.vector);
            assert!((origin - pose.backbone_xyz(i + 1)).norm() < EPS);
            let r = frame.rotation.to_rotation_matrix();
            assert!((r.matrix().determinant() - 1.0).abs() < EPS);
        }
        let rebuilt = Pose::from_frames(pose.residues().to_vec(), frames, Vec::new());
        for i in 1..8 {
            let d = nalgebra::distance(&rebuilt.backbone_xyz(i), &rebuilt.backbone_xyz(i + 1));
            assert!((d - 5.9).abs() < EPS);
        }
    }
}
