use super::{MoveType, Mover};
use crate::core::models::chunk::Chunk;
use crate::core::models::pose::Pose;
use crate::core::utils::geometry::{centroid, rotation_from_axis_angle};
use crate::engine::config::RigidBodySettings;
use crate::engine::error::MoveError;
use nalgebra::{Isometry3, Point3, Translation3, UnitQuaternion, Vector3};
use rand::{Rng, RngCore};
use rand_distr::{Distribution, Normal, UnitSphere};
use tracing::trace;

/// Perturbs the rigid-body jumps that hang chunks off a virtual root.
///
/// A move rotates one chunk about its anchor by a Gaussian angle and shifts it by a
/// Gaussian offset; the whole assembly is then translated so the centroid of the
/// chunk residues sits on the virtual root again.
#[derive(Debug, Clone)]
pub struct RigidBodyMover {
    settings: RigidBodySettings,
    jumps: Vec<usize>,
    centroid_residues: Vec<usize>,
    virtual_res: Option<usize>,
}

impl RigidBodyMover {
    /// Collects the jumps leaving a virtual root. With fewer than two such jumps there
    /// is nothing to dock and the mover stays idle.
    pub fn new(pose: &Pose, chunks: &[Chunk], settings: RigidBodySettings) -> Self {
        let tree = pose.fold_tree();
        let virtual_res = Some(tree.root()).filter(|&root| pose.is_virtual(root));
        let jumps: Vec<usize> = match virtual_res {
            Some(root) => (1..=tree.num_jump())
                .filter(|&n| tree.upstream_jump_residue(n) == Some(root))
                .collect(),
            None => Vec::new(),
        };
        let jumps = if jumps.len() < 2 { Vec::new() } else { jumps };

        let frozen: Vec<usize> = (1..=pose.total_residue())
            .filter(|&i| !pose.is_virtual(i) && chunks.iter().any(|c| c.contains(i)))
            .collect();
        let centroid_residues = if frozen.is_empty() {
            (1..=pose.total_residue())
                .filter(|&i| !pose.is_virtual(i))
                .collect()
        } else {
            frozen
        };

        Self {
            settings,
            jumps,
            centroid_residues,
            virtual_res,
        }
    }

    /// Jumps this mover may perturb.
    pub fn movable_jumps(&self) -> &[usize] {
        &self.jumps
    }

    pub fn settings(&self) -> RigidBodySettings {
        self.settings
    }

    /// Perturbs jump `n`, rotating the downstream side about its anchor.
    pub fn perturb_jump(
        &self,
        pose: &mut Pose,
        n: usize,
        rng: &mut dyn RngCore,
    ) -> Result<(), MoveError> {
        let (upstream, downstream) = pose
            .fold_tree()
            .jump_edge(n)
            .ok_or(MoveError::NoMovableDof("rigid body"))?;

        let rotation_dist = Normal::new(0.0, self.settings.rotation_magnitude)?;
        let translation_dist = Normal::new(0.0, self.settings.translation_magnitude)?;
        let axis = Vector3::from(UnitSphere.sample(rng));
        let angle = rotation_dist.sample(rng);
        let shift = Vector3::from_fn(|_, _| translation_dist.sample(rng));

        let anchor = pose.backbone_xyz(downstream);
        let rotation =
            UnitQuaternion::from_rotation_matrix(&rotation_from_axis_angle(&axis, angle));
        let motion = Translation3::from(anchor.coords + shift)
            * rotation
            * Translation3::from(-anchor.coords);
        let moved = motion * *pose.frame(downstream);
        let jump = pose.frame(upstream).inverse() * moved;
        pose.set_jump(n, jump)?;
        trace!(jump = n, angle, shift = shift.norm(), "Perturbed rigid body");
        Ok(())
    }

    /// Translates every star jump so the chunk residues are centered on the root.
    pub fn slide_back_to_root(&self, pose: &mut Pose) -> Result<(), MoveError> {
        let Some(root) = self.virtual_res else {
            return Ok(());
        };
        if self.jumps.is_empty() {
            return Ok(());
        }
        let points: Vec<Point3<f64>> = self
            .centroid_residues
            .iter()
            .map(|&i| pose.backbone_xyz(i))
            .collect();
        let Some(center) = centroid(&points) else {
            return Ok(());
        };
        let offset = Translation3::from(pose.backbone_xyz(root) - center);
        let root_frame = *pose.frame(root);
        let tree = pose.fold_tree().clone();
        for n in 1..=tree.num_jump() {
            let Some((upstream, downstream)) = tree.jump_edge(n) else {
                continue;
            };
            if upstream != root {
                continue;
            }
            let shifted: Isometry3<f64> = offset * *pose.frame(downstream);
            pose.set_jump(n, root_frame.inverse() * shifted)?;
        }
        Ok(())
    }
}

impl Mover for RigidBodyMover {
    fn apply(&mut self, pose: &mut Pose, rng: &mut dyn RngCore) -> Result<(), MoveError> {
        if self.jumps.is_empty() {
            return Err(MoveError::NoMovableDof("rigid body"));
        }
        let n = self.jumps[rng.gen_range(0..self.jumps.len())];
        self.perturb_jump(pose, n, rng)?;
        self.slide_back_to_root(pose)
    }

    fn move_type(&self) -> MoveType {
        MoveType::RigidBodyJump
    }
}
