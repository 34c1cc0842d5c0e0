use super::TreeBuilder;
use crate::core::kinematics::FoldTree;
use crate::core::models::chunk::{Chunk, validate_chunks};
use crate::core::models::pose::Pose;
use crate::engine::error::TreeBuildError;
use rand::RngCore;
use tracing::debug;

/// Installs a single peptide edge from residue 1, so chunks move only through
/// backbone bonds. Useful for single-chunk runs and for debugging.
#[derive(Debug, Default)]
pub struct SimpleTreeBuilder {
    previous_tree: Option<FoldTree>,
}

impl SimpleTreeBuilder {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TreeBuilder for SimpleTreeBuilder {
    fn set_up(
        &mut self,
        chunks: &[Chunk],
        pose: &mut Pose,
        _rng: &mut dyn RngCore,
    ) -> Result<(), TreeBuildError> {
        if self.is_built() {
            return Err(TreeBuildError::AlreadyBuilt);
        }
        if !chunks.is_empty() {
            validate_chunks(chunks, pose.total_residue())?;
        }
        let previous = pose.fold_tree().clone();
        pose.set_fold_tree(FoldTree::simple(pose.total_residue()))?;
        debug!(nres = pose.total_residue(), "Simple fold tree installed");
        self.previous_tree = Some(previous);
        Ok(())
    }

    fn tear_down(&mut self, pose: &mut Pose) -> Result<(), TreeBuildError> {
        if let Some(tree) = self.previous_tree.take() {
            pose.set_fold_tree(tree)?;
        }
        Ok(())
    }

    fn is_built(&self) -> bool {
        self.previous_tree.is_some()
    }

    fn name(&self) -> &'static str {
        "simple"
    }
}
