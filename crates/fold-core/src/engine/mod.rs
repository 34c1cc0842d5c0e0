//! # Engine Module
//!
//! The sampling machinery behind fragment assembly: fold-tree setup, conformational
//! moves, Metropolis bookkeeping and the settings and errors shared by workflows.
//!
//! ## Overview
//!
//! A trajectory installs a fold tree with a [`tree::TreeBuilder`], perturbs the pose
//! with [`movers`] and accepts or rejects each trial through
//! [`monte_carlo::MonteCarlo`]. Everything here is single-threaded and draws its
//! randomness from an explicitly passed generator, so a trajectory is reproducible
//! from its seed.
//!
//! ## Architecture
//!
//! - **Configuration** ([`config`]) - Trajectory options and their builder
//! - **Fold trees** ([`tree`]) - Star and simple tree builders, cutpoint selection
//! - **Moves** ([`movers`]) - Fragment, chunk, rigid-body and loop-closure moves
//! - **Acceptance** ([`monte_carlo`]) - Metropolis criterion, snapshots and counters
//! - **State Tracking** ([`state`]) - Driver lifecycle, filters and trajectory results
//! - **Progress Monitoring** ([`progress`]) - Callback-based progress events
//! - **Error Handling** ([`error`]) - Engine error types and soft-failure classification

pub mod config;
pub mod error;
pub mod monte_carlo;
pub mod movers;
pub mod progress;
pub mod state;
pub mod tree;
