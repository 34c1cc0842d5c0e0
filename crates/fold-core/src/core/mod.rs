//! # Core Module
//!
//! Stateless building blocks for coarse-grained fragment assembly: the data model, the
//! kinematic tree, scoring, conformational libraries and file I/O.
//!
//! ## Overview
//!
//! A [`models::pose::Pose`] stores one rigid frame per residue. Every conformational
//! change is expressed through the internal degrees of freedom defined by its
//! [`kinematics::FoldTree`], so the rest of the library never edits Cartesian
//! coordinates directly.
//!
//! ## Architecture
//!
//! - **Molecular Representation** ([`models`]) - Residues, chunks, secondary structure and the pose
//! - **Kinematics** ([`kinematics`]) - Fold trees and virtual-bond degrees of freedom
//! - **Restraints** ([`constraints`]) - Atom-pair and coordinate constraints with their functions
//! - **Energy Calculations** ([`scoring`]) - Coarse-grained terms, weights and presets
//! - **Conformational Libraries** ([`fragments`]) - Torsion fragments and rigid chunk alternatives
//! - **File I/O** ([`io`]) - Coarse PDB models and CSV score tables
//! - **Utilities** ([`utils`]) - Geometry helpers and weighted reservoir sampling

pub mod constraints;
pub mod fragments;
pub mod io;
pub mod kinematics;
pub mod models;
pub mod scoring;
pub mod utils;
