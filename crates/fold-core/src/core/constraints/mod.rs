//! Soft geometric restraints between atoms of a pose.
//!
//! Constraints address atoms by residue index and atom name rather than by handle,
//! so they survive cloning of the pose and are renumbered explicitly whenever a
//! residue is deleted.

pub mod func;
pub mod set;

pub use func::Func;
pub use set::{AtomRef, BASE_PAIR_DISTANCE, Constraint, ConstraintSet};
