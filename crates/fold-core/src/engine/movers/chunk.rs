use super::{MoveType, Mover};
use crate::core::fragments::ChunkLibrary;
use crate::core::models::pose::Pose;
use crate::engine::error::MoveError;
use rand::{Rng, RngCore};
use std::sync::Arc;
use tracing::trace;

/// Swaps a random alternative geometry into a random chunk.
#[derive(Debug, Clone)]
pub struct ChunkMover {
    library: Arc<ChunkLibrary>,
}

impl ChunkMover {
    pub fn new(library: Arc<ChunkLibrary>) -> Self {
        Self { library }
    }

    pub fn library(&self) -> &ChunkLibrary {
        &self.library
    }

    /// Puts a random alternative into every chunk; used to start a trajectory.
    pub fn randomize(&self, pose: &mut Pose, rng: &mut dyn RngCore) -> Result<(), MoveError> {
        self.library.initialize(pose)?;
        for set in self.library.sets() {
            if set.num_alternatives() > 1 {
                let index = rng.gen_range(0..set.num_alternatives());
                set.insert(pose, index)?;
                trace!(chunk = %set.chunk(), index, "Randomized chunk");
            }
        }
        Ok(())
    }
}

impl Mover for ChunkMover {
    fn apply(&mut self, pose: &mut Pose, rng: &mut dyn RngCore) -> Result<(), MoveError> {
        match self.library.random_insertion(pose, rng)? {
            Some(chunk) => {
                trace!(%chunk, "Inserted chunk alternative");
                Ok(())
            }
            None => Err(MoveError::NoMovableDof("chunk insertion")),
        }
    }

    fn move_type(&self) -> MoveType {
        MoveType::ChunkInsertion
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fragments::ChunkSet;
    use crate::core::kinematics::dof::ideal_bond;
    use crate::core::models::chunk::Chunk;
    use crate::core::models::residue::Polymer;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn model(torsion: f64) -> Pose {
        let mut pose = Pose::from_sequence("gcgc", Polymer::Rna).unwrap();
        let length = pose.bond(1).unwrap().translation.vector.norm();
        pose.set_bonds((1..4).map(|i| (i, ideal_bond(95.0, torsion, length))))
            .unwrap();
        pose
    }

    #[test]
    fn chunk_insertion_uses_one_of_the_alternatives() {
        let chunk = Chunk::new(3, 6).unwrap();
        let mut library = ChunkLibrary::new();
        library
            .add(ChunkSet::from_models(chunk, &[model(40.0), model(80.0)]).unwrap())
            .unwrap();
        let mut mover = ChunkMover::new(Arc::new(library));
        let mut pose = Pose::from_sequence("aagcgcaa", Polymer::Rna).unwrap();
        let mut rng = StdRng::seed_from_u64(2);
        for _ in 0..10 {
            mover.apply(&mut pose, &mut rng).unwrap();
            let torsion = pose.bond_geometry(4).unwrap().torsion;
            assert!((torsion - 40.0).abs() < 1e-9 || (torsion - 80.0).abs() < 1e-9);
        }
    }

    #[test]
    fn single_alternative_chunks_cannot_move() {
        let chunk = Chunk::new(1, 4).unwrap();
        let mut library = ChunkLibrary::new();
        library
            .add(ChunkSet::from_models(chunk, &[model(40.0)]).unwrap())
            .unwrap();
        let mut mover = ChunkMover::new(Arc::new(library));
        let mut pose = Pose::from_sequence("gcgcaa", Polymer::Rna).unwrap();
        let err = mover
            .apply(&mut pose, &mut StdRng::seed_from_u64(0))
            .unwrap_err();
        assert!(matches!(err, MoveError::NoMovableDof(_)));

        mover.randomize(&mut pose, &mut StdRng::seed_from_u64(0)).unwrap();
        assert!((pose.bond_geometry(2).unwrap().torsion - 40.0).abs() < 1e-9);
    }

    #[test]
    fn randomize_draws_an_alternative_for_every_chunk() {
        let chunks = [
            Chunk::new(1, 4).unwrap(),
            Chunk::new(6, 9).unwrap(),
            Chunk::new(11, 14).unwrap(),
        ];
        let alternatives: Vec<Pose> = (0..50).map(|k| model(10.0 + 2.0 * k as f64)).collect();
        let mut library = ChunkLibrary::new();
        for chunk in chunks {
            library
                .add(ChunkSet::from_models(chunk, &alternatives).unwrap())
                .unwrap();
        }
        let mover = ChunkMover::new(Arc::new(library));

        let runs = 300;
        let mut untouched_runs = 0;
        for seed in 0..runs {
            let mut pose = Pose::from_sequence("gcgcagcgcagcgcaa", Polymer::Rna).unwrap();
            mover
                .randomize(&mut pose, &mut StdRng::seed_from_u64(seed))
                .unwrap();
            let untouched = chunks.iter().any(|c| {
                (pose.bond_geometry(c.start()).unwrap().torsion - 10.0).abs() < 1e-9
            });
            if untouched {
                untouched_runs += 1;
            }
        }
        // Each chunk keeps alternative 0 with probability 1/50.
        assert!(
            untouched_runs < runs / 6,
            "{untouched_runs}/{runs} runs left a chunk at its first alternative"
        );
    }
}
