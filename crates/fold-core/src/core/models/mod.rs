//! # Core Models Module
//!
//! Data structures describing a polymer conformation for fragment assembly.
//!
//! ## Overview
//!
//! A [`pose::Pose`] owns an ordered list of residues, one rigid frame per residue,
//! the fold tree that turns those frames into internal degrees of freedom, a
//! constraint set and optional per-residue annotations (secondary structure and
//! structural conservation). Everything else in the library reads or mutates a pose.
//!
//! ## Key Components
//!
//! - [`pose`] - The mutable structure with its kinematic tree
//! - [`residue`] - Residue kinds (nucleotides, amino acids, virtual residues) and
//!   their coarse atoms
//! - [`atom`] - Named atoms in residue-local coordinates
//! - [`chunk`] - Rigid residue ranges and the checks applied to chunk lists
//! - [`secstruct`] - Helix/strand/loop profiles and dot-bracket parsing
//! - [`ids`] - Stable handles for arena-stored items
//!
//! ## Index Stability
//!
//! Residues are addressed by 1-based sequence position. Deleting a residue shifts
//! every later residue down by one, so no caller may hold a residue index across a
//! deletion (virtual-root tear-down included).

pub mod atom;
pub mod chunk;
pub mod ids;
pub mod pose;
pub mod residue;
pub mod secstruct;
