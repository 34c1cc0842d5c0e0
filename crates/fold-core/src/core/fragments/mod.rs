//! Conformational building blocks for assembly moves.
//!
//! - [`library`]: short runs of bond geometries cut from a torsion database.
//! - [`chunk_library`]: rigid multi-residue regions with interchangeable internal
//!   geometries.

pub mod chunk_library;
pub mod library;

pub use chunk_library::{ChunkLibrary, ChunkLibraryError, ChunkSet};
pub use library::{Fragment, FragmentError, FragmentLibrary, TorsionSet};
