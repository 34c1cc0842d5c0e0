//! Kinematic description of a pose: the fold tree and the virtual-bond degrees of
//! freedom that hang off it.

pub mod dof;
pub mod fold_tree;

pub use fold_tree::{Connection, Edge, EdgeLabel, FoldTree, FoldTreeError, Step};
