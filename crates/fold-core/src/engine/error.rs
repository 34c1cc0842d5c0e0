use rand_distr::NormalError;
use thiserror::Error;

use super::config::ConfigError;
use crate::core::fragments::{ChunkLibraryError, FragmentError};
use crate::core::kinematics::FoldTreeError;
use crate::core::models::chunk::ChunkError;
use crate::core::models::pose::PoseError;
use crate::core::utils::sampling::SamplingError;

#[derive(Debug, Error)]
pub enum TreeBuildError {
    #[error("Precondition violated: {0}")]
    Precondition(#[from] ChunkError),

    #[error("Invalid cutpoint range: lower bound {lower} exceeds upper bound {upper}")]
    InvalidRange { lower: usize, upper: usize },

    #[error("A tree is already built on this pose; tear it down first")]
    AlreadyBuilt,

    #[error("Fold tree construction failed: {0}")]
    FoldTreeConstruction(#[from] FoldTreeError),

    #[error("Anchor sampling failed: {0}")]
    Sampling(#[from] SamplingError),

    #[error("Pose update failed: {0}")]
    Pose(PoseError),
}

impl From<PoseError> for TreeBuildError {
    fn from(error: PoseError) -> Self {
        match error {
            PoseError::FoldTree(inner) => TreeBuildError::FoldTreeConstruction(inner),
            other => TreeBuildError::Pose(other),
        }
    }
}

/// A chain break that CCD could not bring within tolerance.
#[derive(Debug, Error, Clone, PartialEq)]
#[error("chain break after residue {cutpoint} still open by {gap:.3} Å")]
pub struct LoopClosureFailure {
    pub cutpoint: usize,
    pub gap: f64,
}

#[derive(Debug, Error)]
pub enum MoveError {
    #[error("Loop closure failed: {0}")]
    LoopClosure(#[from] LoopClosureFailure),

    #[error("No movable degree of freedom for '{0}'")]
    NoMovableDof(&'static str),

    #[error("Fragment selection failed: {0}")]
    Fragment(#[from] FragmentError),

    #[error("Pose update failed: {0}")]
    Pose(#[from] PoseError),

    #[error("Invalid perturbation magnitude: {0}")]
    Distribution(#[from] NormalError),
}

impl MoveError {
    /// Soft failures reject the trial and let the trajectory continue.
    pub fn is_soft(&self) -> bool {
        matches!(self, MoveError::LoopClosure(_) | MoveError::NoMovableDof(_))
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Fold tree setup failed: {0}")]
    Tree(#[from] TreeBuildError),

    #[error("Move failed: {0}")]
    Move(#[from] MoveError),

    #[error("Pose error: {0}")]
    Pose(#[from] PoseError),

    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Chunk library error: {0}")]
    ChunkLibrary(#[from] ChunkLibraryError),

    #[error("Native structure has {found} residues, the pose has {expected}")]
    NativeMismatch { expected: usize, found: usize },

    #[error("This driver has already run a trajectory; build a new one")]
    AlreadyRun,

    #[error("Phase '{phase}' failed: {reason}")]
    PhaseFailed { phase: &'static str, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fold_tree_pose_errors_become_construction_errors() {
        let err: TreeBuildError = PoseError::FoldTree(FoldTreeError::Empty).into();
        assert!(matches!(err, TreeBuildError::FoldTreeConstruction(FoldTreeError::Empty)));
        let err: TreeBuildError = PoseError::LastResidue.into();
        assert!(matches!(err, TreeBuildError::Pose(PoseError::LastResidue)));
    }

    #[test]
    fn only_closure_and_dof_failures_are_soft() {
        let closure = MoveError::LoopClosure(LoopClosureFailure {
            cutpoint: 8,
            gap: 1.25,
        });
        assert!(closure.is_soft());
        assert!(closure.to_string().contains("after residue 8"));
        assert!(MoveError::NoMovableDof("rigid body").is_soft());
        assert!(!MoveError::Fragment(FragmentError::MissingSize(3)).is_soft());
    }
}
