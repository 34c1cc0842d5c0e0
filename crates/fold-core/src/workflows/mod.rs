//! # Workflows Module
//!
//! Top-level entry points that turn a target sequence into models.
//!
//! ## Overview
//!
//! [`fragment_monte_carlo::FragmentMonteCarlo`] runs one staged trajectory: it installs
//! a fold tree, randomizes the pose, samples through a series of rounds with ramped
//! score weights and shrinking fragments, and finally closes loops, filters and
//! rescores the model. [`denovo`] prepares the starting pose from a sequence and its
//! secondary structure and runs many independently seeded trajectories.
//!
//! ## Architecture
//!
//! - **Trajectory driver** ([`fragment_monte_carlo`]) - One seeded, single-threaded
//!   trajectory with early-termination filters
//! - **De novo protocol** ([`denovo`]) - Pose preparation and many trajectories, in
//!   parallel unless the autofilter needs them in order

pub mod denovo;
pub mod fragment_monte_carlo;
