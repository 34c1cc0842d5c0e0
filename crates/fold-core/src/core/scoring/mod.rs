//! # Scoring Module
//!
//! Coarse-grained energy terms and the weighted score function used by the
//! fragment-assembly search.
//!
//! - [`term`] - Score-type identifiers and the per-term [`EnergyMap`]
//! - [`terms`] - Raw energy evaluation (clashes, base pairing and stacking,
//!   chain breaks, constraints, compaction)
//! - [`function`] - [`ScoreFunction`]: term weights, presets and weight files

pub mod function;
pub mod term;
pub mod terms;

pub use function::{ScoreFileError, ScoreFunction};
pub use term::{EnergyMap, ScoreType};
