use super::pose::Pose;
use nalgebra::{Point3, Vector3};
use serde::Deserialize;
use std::fmt;
use thiserror::Error;

/// A contiguous, inclusive residue range treated as rigid during assembly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "(usize, usize)")]
pub struct Chunk {
    start: usize,
    stop: usize,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChunkError {
    #[error("Chunk start {start} is past its stop {stop}")]
    Inverted { start: usize, stop: usize },
    #[error("Residue indices are 1-based, got a chunk starting at 0")]
    ZeroIndex,
    #[error("Chunk list is empty")]
    Empty,
    #[error("Chunks are not sorted by start position: {previous} is followed by {next}")]
    Unsorted { previous: Chunk, next: Chunk },
    #[error("Chunks {previous} and {next} overlap")]
    Overlapping { previous: Chunk, next: Chunk },
    #[error("Chunk {chunk} lies outside a pose of {total_residue} residues")]
    OutOfRange { chunk: Chunk, total_residue: usize },
}

impl Chunk {
    pub fn new(start: usize, stop: usize) -> Result<Self, ChunkError> {
        if start == 0 {
            return Err(ChunkError::ZeroIndex);
        }
        if start > stop {
            return Err(ChunkError::Inverted { start, stop });
        }
        Ok(Self { start, stop })
    }

    pub fn start(&self) -> usize {
        self.start
    }

    pub fn stop(&self) -> usize {
        self.stop
    }

    pub fn length(&self) -> usize {
        self.stop - self.start + 1
    }

    /// Integer midpoint, rounding down.
    pub fn midpoint(&self) -> usize {
        (self.start + self.stop) / 2
    }

    pub fn contains(&self, seqpos: usize) -> bool {
        (self.start..=self.stop).contains(&seqpos)
    }

    pub fn residues(&self) -> impl Iterator<Item = usize> + use<> {
        self.start..=self.stop
    }
}

impl TryFrom<(usize, usize)> for Chunk {
    type Error = ChunkError;

    fn try_from((start, stop): (usize, usize)) -> Result<Self, Self::Error> {
        Chunk::new(start, stop)
    }
}

impl fmt::Display for Chunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.start, self.stop)
    }
}

/// Checks the caller contract for chunk lists: non-empty, ascending by start,
/// non-overlapping and inside a pose of `total_residue` residues.
pub fn validate_chunks(chunks: &[Chunk], total_residue: usize) -> Result<(), ChunkError> {
    let first = chunks.first().ok_or(ChunkError::Empty)?;
    for pair in chunks.windows(2) {
        let (previous, next) = (pair[0], pair[1]);
        if next.start < previous.start {
            return Err(ChunkError::Unsorted { previous, next });
        }
        if next.start <= previous.stop {
            return Err(ChunkError::Overlapping { previous, next });
        }
    }
    let last = chunks.last().unwrap_or(first);
    if last.stop > total_residue {
        return Err(ChunkError::OutOfRange {
            chunk: *last,
            total_residue,
        });
    }
    Ok(())
}

/// Mean backbone position over every residue covered by `chunks`.
pub fn center_of_mass(chunks: &[Chunk], pose: &Pose) -> Option<Point3<f64>> {
    let mut sum = Vector3::zeros();
    let mut count = 0usize;
    for chunk in chunks {
        for seqpos in chunk.residues() {
            sum += pose.backbone_xyz(seqpos).coords;
            count += 1;
        }
    }
    (count > 0).then(|| Point3::from(sum / count as f64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::residue::Polymer;

    fn chunk(start: usize, stop: usize) -> Chunk {
        Chunk::new(start, stop).unwrap()
    }

    #[test]
    fn new_rejects_inverted_and_zero_based_ranges() {
        assert_eq!(
            Chunk::new(5, 4),
            Err(ChunkError::Inverted { start: 5, stop: 4 })
        );
        assert_eq!(Chunk::new(0, 4), Err(ChunkError::ZeroIndex));
    }

    #[test]
    fn midpoint_uses_floor_division() {
        assert_eq!(chunk(1, 5).midpoint(), 3);
        assert_eq!(chunk(10, 16).midpoint(), 13);
        assert_eq!(chunk(20, 23).midpoint(), 21);
        assert_eq!(chunk(7, 7).midpoint(), 7);
    }

    #[test]
    fn length_and_contains_are_inclusive() {
        let c = chunk(10, 16);
        assert_eq!(c.length(), 7);
        assert!(c.contains(10));
        assert!(c.contains(16));
        assert!(!c.contains(17));
        assert_eq!(c.residues().count(), 7);
    }

    #[test]
    fn validate_accepts_sorted_disjoint_chunks() {
        let chunks = [chunk(1, 5), chunk(10, 16), chunk(20, 23)];
        assert!(validate_chunks(&chunks, 23).is_ok());
    }

    #[test]
    fn validate_rejects_empty_unsorted_overlapping_and_out_of_range() {
        assert_eq!(validate_chunks(&[], 10), Err(ChunkError::Empty));
        assert!(matches!(
            validate_chunks(&[chunk(6, 8), chunk(1, 3)], 10),
            Err(ChunkError::Unsorted { .. })
        ));
        assert!(matches!(
            validate_chunks(&[chunk(1, 5), chunk(5, 8)], 10),
            Err(ChunkError::Overlapping { .. })
        ));
        assert!(matches!(
            validate_chunks(&[chunk(1, 5), chunk(7, 11)], 10),
            Err(ChunkError::OutOfRange { .. })
        ));
    }

    #[test]
    fn deserializes_from_a_pair() {
        #[derive(Deserialize)]
        struct Wrapper {
            chunk: Chunk,
        }
        let parsed: Wrapper = toml::from_str("chunk = [3, 9]").unwrap();
        assert_eq!(parsed.chunk, chunk(3, 9));
        assert!(toml::from_str::<Wrapper>("chunk = [9, 3]").is_err());
    }

    #[test]
    fn center_of_mass_averages_chunk_backbone_positions() {
        let pose = Pose::from_sequence("gggaaaccc", Polymer::Rna).unwrap();
        let chunks = [chunk(1, 2), chunk(8, 9)];
        let com = center_of_mass(&chunks, &pose).unwrap();
        let expected = [1, 2, 8, 9]
            .iter()
            .map(|&i| pose.backbone_xyz(i).coords)
            .sum::<Vector3<f64>>()
            / 4.0;
        assert!((com.coords - expected).norm() < 1e-9);
        assert!(center_of_mass(&[], &pose).is_none());
    }
}
