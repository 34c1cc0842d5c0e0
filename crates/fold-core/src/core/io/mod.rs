//! Reading and writing models and score tables.
//!
//! Structure formats implement [`traits::StructureFile`]; the coarse-grained PDB
//! reader/writer lives in [`pdb`] and the per-model CSV score table in [`report`].

pub mod pdb;
pub mod report;
pub mod traits;
