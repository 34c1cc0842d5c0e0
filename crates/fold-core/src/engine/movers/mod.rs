//! Conformational moves applied by the Monte Carlo driver.
//!
//! Every mover changes internal degrees of freedom of a [`Pose`] in place and reports
//! soft failures (nothing to move, an unclosable loop) through [`MoveError`] so the
//! caller can reject the trial and carry on.

pub mod chunk;
pub mod fragment;
pub mod loop_closure;
pub mod minimizer;
pub mod rigid_body;

pub use chunk::ChunkMover;
pub use fragment::FragmentMover;
pub use loop_closure::LoopCloser;
pub use minimizer::TorsionMinimizer;
pub use rigid_body::RigidBodyMover;

use super::error::MoveError;
use crate::core::models::chunk::Chunk;
use crate::core::models::pose::Pose;
use rand::RngCore;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MoveType {
    FragmentInsertion,
    ChunkInsertion,
    RigidBodyJump,
    LoopClosure,
}

impl MoveType {
    pub const COUNT: usize = 4;

    pub const ALL: [MoveType; Self::COUNT] = [
        MoveType::FragmentInsertion,
        MoveType::ChunkInsertion,
        MoveType::RigidBodyJump,
        MoveType::LoopClosure,
    ];

    pub fn name(self) -> &'static str {
        match self {
            MoveType::FragmentInsertion => "fragment",
            MoveType::ChunkInsertion => "chunk",
            MoveType::RigidBodyJump => "rigid_body",
            MoveType::LoopClosure => "loop_closure",
        }
    }

    pub(crate) fn index(self) -> usize {
        match self {
            MoveType::FragmentInsertion => 0,
            MoveType::ChunkInsertion => 1,
            MoveType::RigidBodyJump => 2,
            MoveType::LoopClosure => 3,
        }
    }
}

impl fmt::Display for MoveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

pub trait Mover: Send {
    fn apply(&mut self, pose: &mut Pose, rng: &mut dyn RngCore) -> Result<(), MoveError>;

    fn move_type(&self) -> MoveType;

    fn name(&self) -> &'static str {
        self.move_type().name()
    }
}

/// Which backbone bonds fragment insertion and loop closure may change.
///
/// Bond `i` joins residues `i` and `i + 1`. A bond is frozen when it lies inside a
/// chunk, touches a virtual residue, crosses a chain end or is not part of the fold
/// tree (a cutpoint).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllowInsert {
    bonds: Vec<bool>,
}

impl AllowInsert {
    /// Every bond of a pose with `total_residue` residues is movable.
    pub fn all(total_residue: usize) -> Self {
        Self {
            bonds: vec![true; total_residue.saturating_sub(1)],
        }
    }

    pub fn from_pose(pose: &Pose, chunks: &[Chunk]) -> Self {
        let bonds = (1..pose.total_residue())
            .map(|i| {
                let inside_chunk = chunks.iter().any(|c| c.contains(i) && c.contains(i + 1));
                !inside_chunk
                    && !pose.is_virtual(i)
                    && !pose.is_virtual(i + 1)
                    && !pose.chain_ends().contains(&i)
                    && !pose.fold_tree().is_cutpoint(i)
            })
            .collect();
        Self { bonds }
    }

    pub fn bond(&self, seqpos: usize) -> bool {
        seqpos
            .checked_sub(1)
            .and_then(|i| self.bonds.get(i))
            .copied()
            .unwrap_or(false)
    }

    pub fn set_bond(&mut self, seqpos: usize, movable: bool) {
        if let Some(slot) = seqpos.checked_sub(1).and_then(|i| self.bonds.get_mut(i)) {
            *slot = movable;
        }
    }

    pub fn num_movable(&self) -> usize {
        self.bonds.iter().filter(|&&b| b).count()
    }

    /// First bonds of every run of `size` consecutive movable bonds.
    pub fn windows(&self, size: usize) -> Vec<usize> {
        if size == 0 || size > self.bonds.len() {
            return Vec::new();
        }
        self.bonds
            .windows(size)
            .enumerate()
            .filter(|(_, w)| w.iter().all(|&b| b))
            .map(|(i, _)| i + 1)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::kinematics::FoldTree;
    use crate::core::models::residue::Polymer;

    #[test]
    fn chunk_interiors_cutpoints_and_virtual_residues_are_frozen() {
        let mut pose = Pose::from_sequence("ggggaaaacccc", Polymer::Rna).unwrap();
        pose.set_fold_tree(FoldTree::from_jumps_and_cuts(12, &[(3, 10)], &[6], 1).unwrap())
            .unwrap();
        let chunks = [Chunk::new(1, 3).unwrap(), Chunk::new(9, 11).unwrap()];
        let allow = AllowInsert::from_pose(&pose, &chunks);

        let movable: Vec<usize> = (1..12).filter(|&i| allow.bond(i)).collect();
        assert_eq!(movable, vec![3, 4, 5, 7, 8, 11]);
        assert!(!allow.bond(0));
        assert!(!allow.bond(12));
    }

    #[test]
    fn windows_need_consecutive_movable_bonds() {
        let mut allow = AllowInsert::all(8);
        allow.set_bond(4, false);
        assert_eq!(allow.windows(3), vec![1, 5]);
        assert_eq!(allow.windows(1), vec![1, 2, 3, 5, 6, 7]);
        assert!(allow.windows(8).is_empty());
        assert_eq!(allow.num_movable(), 6);
    }

    #[test]
    fn virtual_root_bonds_are_frozen() {
        let mut pose = Pose::from_sequence("gggaaa", Polymer::Rna).unwrap();
        let center = pose.backbone_xyz(3);
        pose.append_virtual_root(center).unwrap();
        let allow = AllowInsert::from_pose(&pose, &[]);
        assert!(allow.bond(5));
        assert!(!allow.bond(6));
    }
}
