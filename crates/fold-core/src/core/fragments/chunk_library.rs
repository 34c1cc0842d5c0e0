use crate::core::models::chunk::{Chunk, ChunkError, validate_chunks};
use crate::core::models::pose::{Pose, PoseError};
use nalgebra::Isometry3;
use rand::Rng;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChunkLibraryError {
    #[error("Alternative for chunk {chunk} has {found} residues, expected {expected}")]
    LengthMismatch {
        chunk: Chunk,
        expected: usize,
        found: usize,
    },
    #[error("Invalid chunk layout: {0}")]
    Layout(#[from] ChunkError),
}

/// A rigid region of the chain with one or more interchangeable internal geometries.
///
/// Each alternative stores the `length - 1` bond transforms spanning the chunk, so an
/// alternative can be dropped into any pose regardless of where the chunk sits.
#[derive(Debug, Clone)]
pub struct ChunkSet {
    chunk: Chunk,
    alternatives: Vec<Vec<Isometry3<f64>>>,
}

impl ChunkSet {
    pub fn new(chunk: Chunk) -> Self {
        Self {
            chunk,
            alternatives: Vec::new(),
        }
    }

    /// Builds a set from standalone models of the chunk, one per alternative.
    pub fn from_models(chunk: Chunk, models: &[Pose]) -> Result<Self, ChunkLibraryError> {
        let mut set = Self::new(chunk);
        for model in models {
            if model.total_residue() != chunk.length() {
                return Err(ChunkLibraryError::LengthMismatch {
                    chunk,
                    expected: chunk.length(),
                    found: model.total_residue(),
                });
            }
            let bonds = (1..chunk.length())
                .filter_map(|i| model.bond(i).copied())
                .collect();
            set.alternatives.push(bonds);
        }
        Ok(set)
    }

    /// Captures the chunk's current internal geometry from a full-length pose.
    pub fn capture(&mut self, pose: &Pose) -> Result<(), ChunkLibraryError> {
        if self.chunk.stop() > pose.total_residue() {
            return Err(ChunkError::OutOfRange {
                chunk: self.chunk,
                total_residue: pose.total_residue(),
            }
            .into());
        }
        let bonds = (self.chunk.start()..self.chunk.stop())
            .filter_map(|i| pose.bond(i).copied())
            .collect();
        self.alternatives.push(bonds);
        Ok(())
    }

    pub fn chunk(&self) -> Chunk {
        self.chunk
    }

    pub fn num_alternatives(&self) -> usize {
        self.alternatives.len()
    }

    /// Copies alternative `index` into the pose. Residues outside the chunk keep their
    /// internal geometry.
    pub fn insert(&self, pose: &mut Pose, index: usize) -> Result<(), PoseError> {
        let Some(bonds) = self.alternatives.get(index) else {
            return Ok(());
        };
        let start = self.chunk.start();
        pose.set_bonds(bonds.iter().enumerate().map(|(k, b)| (start + k, *b)))
    }
}

/// Chunk sets for a whole target, ordered along the sequence.
#[derive(Debug, Clone, Default)]
pub struct ChunkLibrary {
    sets: Vec<ChunkSet>,
}

impl ChunkLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a set, keeping the library sorted and free of overlapping chunks.
    pub fn add(&mut self, set: ChunkSet) -> Result<(), ChunkLibraryError> {
        let mut chunks = self.chunks();
        chunks.push(set.chunk);
        chunks.sort_by_key(|c| c.start());
        let total = chunks.iter().map(|c| c.stop()).max().unwrap_or(0);
        validate_chunks(&chunks, total)?;
        let position = self
            .sets
            .iter()
            .position(|s| s.chunk.start() > set.chunk.start())
            .unwrap_or(self.sets.len());
        self.sets.insert(position, set);
        Ok(())
    }

    pub fn sets(&self) -> &[ChunkSet] {
        &self.sets
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    pub fn chunks(&self) -> Vec<Chunk> {
        self.sets.iter().map(|s| s.chunk).collect()
    }

    /// Fraction of the chain covered by chunks that have a real choice of geometry.
    pub fn coverage(&self, total_residue: usize) -> f64 {
        if total_residue == 0 {
            return 0.0;
        }
        let covered: usize = self
            .sets
            .iter()
            .filter(|s| s.num_alternatives() > 1)
            .map(|s| s.chunk.length())
            .sum();
        covered as f64 / total_residue as f64
    }

    /// Puts the first alternative of every set into the pose.
    pub fn initialize(&self, pose: &mut Pose) -> Result<(), PoseError> {
        for set in &self.sets {
            set.insert(pose, 0)?;
        }
        Ok(())
    }

    /// Swaps a random alternative into a random multi-alternative chunk. Returns the
    /// chunk that changed, or `None` when no chunk offers a choice.
    pub fn random_insertion<R: Rng + ?Sized>(
        &self,
        pose: &mut Pose,
        rng: &mut R,
    ) -> Result<Option<Chunk>, PoseError> {
        let movable: Vec<&ChunkSet> = self
            .sets
            .iter()
            .filter(|s| s.num_alternatives() > 1)
            .collect();
        if movable.is_empty() {
            return Ok(None);
        }
        let set = movable[rng.gen_range(0..movable.len())];
        let index = rng.gen_range(0..set.num_alternatives());
        set.insert(pose, index)?;
        Ok(Some(set.chunk))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::kinematics::dof::ideal_bond;
    use crate::core::models::residue::Polymer;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn helix_model(len: usize, torsion: f64) -> Pose {
        let mut pose = Pose::from_sequence(&"a".repeat(len), Polymer::Rna).unwrap();
        let length = pose.bond(1).unwrap().translation.vector.norm();
        pose.set_bonds((1..len).map(|i| (i, ideal_bond(95.0, torsion, length))))
            .unwrap();
        pose
    }

    #[test]
    fn from_models_checks_lengths() {
        let chunk = Chunk::new(3, 6).unwrap();
        let err = ChunkSet::from_models(chunk, &[helix_model(5, 60.0)]).unwrap_err();
        assert!(matches!(err, ChunkLibraryError::LengthMismatch { found: 5, .. }));
        let set = ChunkSet::from_models(chunk, &[helix_model(4, 60.0), helix_model(4, 40.0)])
            .unwrap();
        assert_eq!(set.num_alternatives(), 2);
    }

    #[test]
    fn insert_reproduces_model_geometry_inside_the_chunk_only() {
        let chunk = Chunk::new(3, 6).unwrap();
        let model = helix_model(4, 60.0);
        let set = ChunkSet::from_models(chunk, &[model.clone()]).unwrap();
        let mut pose = Pose::from_sequence("acguacguac", Polymer::Rna).unwrap();
        let outside_before = *pose.bond(7).unwrap();
        set.insert(&mut pose, 0).unwrap();

        for k in 0..3 {
            let inserted = pose.bond_geometry(3 + k).unwrap();
            let expected = model.bond_geometry(1 + k).unwrap();
            assert!((inserted.torsion - expected.torsion).abs() < 1e-6);
        }
        assert!((pose.bond(7).unwrap().translation.vector - outside_before.translation.vector)
            .norm()
            < 1e-9);
        let d_model = nalgebra::distance(&model.backbone_xyz(1), &model.backbone_xyz(4));
        let d_pose = nalgebra::distance(&pose.backbone_xyz(3), &pose.backbone_xyz(6));
        assert!((d_model - d_pose).abs() < 1e-6);
    }

    #[test]
    fn add_keeps_sets_sorted_and_rejects_overlap() {
        let mut library = ChunkLibrary::new();
        library.add(ChunkSet::new(Chunk::new(10, 12).unwrap())).unwrap();
        library.add(ChunkSet::new(Chunk::new(1, 4).unwrap())).unwrap();
        assert_eq!(
            library.chunks(),
            vec![Chunk::new(1, 4).unwrap(), Chunk::new(10, 12).unwrap()]
        );
        assert!(library.add(ChunkSet::new(Chunk::new(4, 8).unwrap())).is_err());
    }

    #[test]
    fn coverage_counts_only_chunks_with_alternatives() {
        let mut library = ChunkLibrary::new();
        let single = ChunkSet::from_models(Chunk::new(1, 4).unwrap(), &[helix_model(4, 60.0)])
            .unwrap();
        let double = ChunkSet::from_models(
            Chunk::new(6, 10).unwrap(),
            &[helix_model(5, 60.0), helix_model(5, 30.0)],
        )
        .unwrap();
        library.add(single).unwrap();
        library.add(double).unwrap();
        assert!((library.coverage(20) - 0.25).abs() < 1e-12);
        assert_eq!(library.coverage(0), 0.0);
    }

    #[test]
    fn random_insertion_only_touches_movable_chunks() {
        let mut library = ChunkLibrary::new();
        library
            .add(ChunkSet::from_models(Chunk::new(1, 4).unwrap(), &[helix_model(4, 60.0)]).unwrap())
            .unwrap();
        let mut pose = Pose::from_sequence("acguacguac", Polymer::Rna).unwrap();
        let mut rng = StdRng::seed_from_u64(2);
        assert_eq!(library.random_insertion(&mut pose, &mut rng).unwrap(), None);

        library
            .add(
                ChunkSet::from_models(
                    Chunk::new(6, 9).unwrap(),
                    &[helix_model(4, 60.0), helix_model(4, 20.0)],
                )
                .unwrap(),
            )
            .unwrap();
        let changed = library.random_insertion(&mut pose, &mut rng).unwrap();
        assert_eq!(changed, Some(Chunk::new(6, 9).unwrap()));
    }

    #[test]
    fn capture_records_current_geometry() {
        let mut pose = Pose::from_sequence("acguacgu", Polymer::Rna).unwrap();
        pose.set_bond_torsions(3, 100.0, 45.0).unwrap();
        let mut set = ChunkSet::new(Chunk::new(2, 5).unwrap());
        set.capture(&pose).unwrap();
        let mut fresh = Pose::from_sequence("acguacgu", Polymer::Rna).unwrap();
        set.insert(&mut fresh, 0).unwrap();
        let g = fresh.bond_geometry(3).unwrap();
        assert!((g.torsion - 45.0).abs() < 1e-6);

        let mut out_of_range = ChunkSet::new(Chunk::new(6, 12).unwrap());
        assert!(out_of_range.capture(&pose).is_err());
    }
}
