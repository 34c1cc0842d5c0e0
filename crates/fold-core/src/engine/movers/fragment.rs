use super::{AllowInsert, MoveType, Mover};
use crate::core::fragments::FragmentLibrary;
use crate::core::kinematics::dof::ideal_bond;
use crate::core::models::pose::Pose;
use crate::engine::error::MoveError;
use rand::{Rng, RngCore};
use std::sync::Arc;
use tracing::trace;

/// Replaces the bond geometry of a random movable window with a library fragment.
#[derive(Debug, Clone)]
pub struct FragmentMover {
    library: Arc<FragmentLibrary>,
    allow_insert: AllowInsert,
    frag_size: usize,
}

impl FragmentMover {
    pub fn new(library: Arc<FragmentLibrary>, allow_insert: AllowInsert, frag_size: usize) -> Self {
        Self {
            library,
            allow_insert,
            frag_size,
        }
    }

    pub fn frag_size(&self) -> usize {
        self.frag_size
    }

    pub fn set_frag_size(&mut self, frag_size: usize) {
        self.frag_size = frag_size;
    }

    /// Fragment length actually used: the requested size, or the largest smaller
    /// size the library provides.
    pub fn effective_size(&self) -> Option<usize> {
        self.library.best_size_at_most(self.frag_size)
    }

    /// Inserts a fragment whose first bond is `start`.
    pub fn insert_at(
        &self,
        pose: &mut Pose,
        start: usize,
        size: usize,
        rng: &mut dyn RngCore,
    ) -> Result<(), MoveError> {
        let ss_window = match pose.secstruct() {
            Some(ss) => ss.window(start, size),
            None => "L".repeat(size),
        };
        let fragment = self.library.pick(size, &ss_window, rng)?;
        let mut updates = Vec::with_capacity(size);
        for (offset, torsions) in fragment.torsions.iter().enumerate() {
            let seqpos = start + offset;
            let length = pose
                .bond(seqpos)
                .map(|b| b.translation.vector.norm())
                .unwrap_or_default();
            updates.push((seqpos, ideal_bond(torsions.angle, torsions.torsion, length)));
        }
        pose.set_bonds(updates)?;
        trace!(start, size, ss = %ss_window, "Inserted fragment");
        Ok(())
    }

    /// Puts a random fragment into every movable window, walking along the chain.
    pub fn randomize(&self, pose: &mut Pose, rng: &mut dyn RngCore) -> Result<(), MoveError> {
        let Some(size) = self.effective_size() else {
            return Ok(());
        };
        for start in self.allow_insert.windows(size) {
            self.insert_at(pose, start, size, rng)?;
        }
        Ok(())
    }
}

impl Mover for FragmentMover {
    fn apply(&mut self, pose: &mut Pose, rng: &mut dyn RngCore) -> Result<(), MoveError> {
        let size = self
            .effective_size()
            .ok_or(MoveError::NoMovableDof("fragment insertion"))?;
        let windows = self.allow_insert.windows(size);
        if windows.is_empty() {
            return Err(MoveError::NoMovableDof("fragment insertion"));
        }
        let start = windows[rng.gen_range(0..windows.len())];
        self.insert_at(pose, start, size, rng)
    }

    fn move_type(&self) -> MoveType {
        MoveType::FragmentInsertion
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fragments::{Fragment, TorsionSet};
    use crate::core::models::residue::Polymer;
    use crate::core::models::secstruct::SecondaryStructure;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn library_with(torsions: TorsionSet, ss: &str) -> Arc<FragmentLibrary> {
        let mut library = FragmentLibrary::new();
        library.add(Fragment {
            torsions: vec![torsions; ss.len()],
            secstruct: ss.to_string(),
        });
        Arc::new(library)
    }

    #[test]
    fn insertion_changes_only_movable_windows() {
        let mut pose = Pose::from_sequence("gggggggg", Polymer::Rna).unwrap();
        let mut allow = AllowInsert::all(8);
        for frozen in [1, 2, 6, 7] {
            allow.set_bond(frozen, false);
        }
        let mut mover =
            FragmentMover::new(library_with(TorsionSet::new(95.0, 60.0), "LLL"), allow, 3);
        let before: Vec<_> = (1..8).map(|i| *pose.bond(i).unwrap()).collect();
        let mut rng = StdRng::seed_from_u64(4);
        mover.apply(&mut pose, &mut rng).unwrap();

        for i in [1, 2, 6, 7] {
            assert_eq!(pose.bond(i).unwrap(), &before[i - 1]);
        }
        for i in 3..=5 {
            let geometry = pose.bond_geometry(i).unwrap();
            assert!((geometry.angle - 95.0).abs() < 1e-9);
            assert!((geometry.torsion - 60.0).abs() < 1e-9);
            let length = before[i - 1].translation.vector.norm();
            assert!((geometry.length - length).abs() < 1e-9);
        }
    }

    #[test]
    fn smaller_fragments_are_used_when_the_size_is_missing() {
        let mut pose = Pose::from_sequence("gggg", Polymer::Rna).unwrap();
        let mut mover = FragmentMover::new(
            library_with(TorsionSet::new(100.0, -30.0), "L"),
            AllowInsert::all(4),
            3,
        );
        assert_eq!(mover.effective_size(), Some(1));
        let mut rng = StdRng::seed_from_u64(0);
        mover.apply(&mut pose, &mut rng).unwrap();
        let changed = (1..4)
            .filter(|&i| (pose.bond_geometry(i).unwrap().angle - 100.0).abs() < 1e-9)
            .count();
        assert_eq!(changed, 1);
    }

    #[test]
    fn frozen_pose_is_a_soft_failure() {
        let mut pose = Pose::from_sequence("gggg", Polymer::Rna).unwrap();
        let mut allow = AllowInsert::all(4);
        allow.set_bond(2, false);
        let mut mover = FragmentMover::new(Arc::new(FragmentLibrary::ideal(&[3])), allow, 3);
        let err = mover
            .apply(&mut pose, &mut StdRng::seed_from_u64(0))
            .unwrap_err();
        assert!(err.is_soft());
    }

    #[test]
    fn secondary_structure_selects_matching_fragments() {
        let mut pose = Pose::from_sequence("gggggg", Polymer::Rna).unwrap();
        pose.set_secstruct(SecondaryStructure::from_dssp("HHHHHH")).unwrap();
        let mover = FragmentMover::new(
            Arc::new(FragmentLibrary::ideal(&[2])),
            AllowInsert::all(6),
            2,
        );
        let mut rng = StdRng::seed_from_u64(9);
        mover.randomize(&mut pose, &mut rng).unwrap();
        for i in 1..6 {
            let geometry = pose.bond_geometry(i).unwrap();
            assert!((geometry.angle - 95.0).abs() <= 5.0 + 1e-9);
            assert!((geometry.torsion - 60.0).abs() <= 10.0 + 1e-9);
        }
    }
}
