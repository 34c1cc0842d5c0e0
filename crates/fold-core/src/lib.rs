//! # Rosetta Fold Core Library
//!
//! Coarse-grained fragment assembly for polymer structure prediction: star-shaped fold
//! trees over rigid chunks, fragment and chunk insertion moves, and a staged Monte
//! Carlo protocol that ramps its score function across rounds.
//!
//! ## Architectural Philosophy
//!
//! The library keeps the three-layer split used throughout the project:
//!
//! - **[`core`]: The Foundation.** Stateless data models (`Pose`, `FoldTree`,
//!   `ConstraintSet`), the coarse-grained score function, fragment libraries and I/O.
//!
//! - **[`engine`]: The Logic Core.** Stateful machinery that manipulates a pose: fold-tree
//!   builders and their cutpoint selection, movers, loop closure, Metropolis bookkeeping,
//!   options and progress reporting.
//!
//! - **[`workflows`]: The Public API.** The staged fragment Monte Carlo driver and the
//!   de novo protocol that runs many seeded trajectories and collects their results.

pub mod core;
pub mod engine;
pub mod workflows;
