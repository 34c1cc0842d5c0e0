//! Fold-tree builders used to set up sampling and to undo that setup afterwards.

pub mod cut_finder;
pub mod simple;
pub mod star;

pub use cut_finder::{CutFinder, CutPreference};
pub use simple::SimpleTreeBuilder;
pub use star::StarTreeBuilder;

use super::error::TreeBuildError;
use crate::core::models::chunk::Chunk;
use crate::core::models::pose::Pose;
use rand::RngCore;

/// Installs a fold tree on a pose and later restores the pose to its prior state.
///
/// Builders are stateful: `set_up` may only be called again after `tear_down`.
pub trait TreeBuilder: Send {
    fn set_up(
        &mut self,
        chunks: &[Chunk],
        pose: &mut Pose,
        rng: &mut dyn RngCore,
    ) -> Result<(), TreeBuildError>;

    /// Undoes `set_up`. Calling it without a built tree does nothing.
    fn tear_down(&mut self, pose: &mut Pose) -> Result<(), TreeBuildError>;

    fn is_built(&self) -> bool;

    fn name(&self) -> &'static str;
}
