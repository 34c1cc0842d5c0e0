use super::func::Func;
use crate::core::models::ids::ConstraintId;
use crate::core::models::pose::Pose;
use nalgebra::Point3;
use slotmap::SlotMap;

/// Equilibrium distance between paired base centroids.
pub const BASE_PAIR_DISTANCE: f64 = 5.5;

/// Residue-indexed atom address. Indices follow the pose and are renumbered by
/// [`ConstraintSet::remap_after_deletion`] when residues are removed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AtomRef {
    pub seqpos: usize,
    pub atom: String,
}

impl AtomRef {
    pub fn new(seqpos: usize, atom: &str) -> Self {
        Self {
            seqpos,
            atom: atom.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Constraint {
    AtomPair {
        a: AtomRef,
        b: AtomRef,
        func: Func,
    },
    Coordinate {
        atom: AtomRef,
        target: Point3<f64>,
        func: Func,
    },
}

impl Constraint {
    pub fn atom_pair(a: AtomRef, b: AtomRef, func: Func) -> Self {
        Constraint::AtomPair { a, b, func }
    }

    pub fn is_atom_pair(&self) -> bool {
        matches!(self, Constraint::AtomPair { .. })
    }

    /// Distance in sequence between the constrained residues; zero for coordinate
    /// constraints.
    pub fn sequence_separation(&self) -> usize {
        match self {
            Constraint::AtomPair { a, b, .. } => a.seqpos.abs_diff(b.seqpos),
            Constraint::Coordinate { .. } => 0,
        }
    }

    pub fn touches(&self, seqpos: usize) -> bool {
        match self {
            Constraint::AtomPair { a, b, .. } => a.seqpos == seqpos || b.seqpos == seqpos,
            Constraint::Coordinate { atom, .. } => atom.seqpos == seqpos,
        }
    }

    /// Penalty for the current pose, or `None` if an addressed atom does not exist.
    pub fn evaluate(&self, pose: &Pose) -> Option<f64> {
        match self {
            Constraint::AtomPair { a, b, func } => {
                let pa = pose.xyz(a.seqpos, &a.atom)?;
                let pb = pose.xyz(b.seqpos, &b.atom)?;
                Some(func.eval(nalgebra::distance(&pa, &pb)))
            }
            Constraint::Coordinate { atom, target, func } => {
                let p = pose.xyz(atom.seqpos, &atom.atom)?;
                Some(func.eval(nalgebra::distance(&p, target)))
            }
        }
    }

    fn shift_after_deletion(&mut self, deleted: usize) {
        let shift = |r: &mut AtomRef| {
            if r.seqpos > deleted {
                r.seqpos -= 1;
            }
        };
        match self {
            Constraint::AtomPair { a, b, .. } => {
                shift(a);
                shift(b);
            }
            Constraint::Coordinate { atom, .. } => shift(atom),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConstraintSet {
    constraints: SlotMap<ConstraintId, Constraint>,
}

impl ConstraintSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flat-bottomed centroid restraints for every obligate base pair.
    pub fn base_pairs(pairs: &[(usize, usize)]) -> Self {
        let mut set = Self::new();
        for &(i, j) in pairs {
            set.add(Constraint::atom_pair(
                AtomRef::new(i, "CEN"),
                AtomRef::new(j, "CEN"),
                Func::FlatHarmonic {
                    x0: BASE_PAIR_DISTANCE,
                    sd: 1.0,
                    tol: 1.0,
                },
            ));
        }
        set
    }

    pub fn add(&mut self, constraint: Constraint) -> ConstraintId {
        self.constraints.insert(constraint)
    }

    pub fn remove(&mut self, id: ConstraintId) -> Option<Constraint> {
        self.constraints.remove(id)
    }

    pub fn get(&self, id: ConstraintId) -> Option<&Constraint> {
        self.constraints.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (ConstraintId, &Constraint)> {
        self.constraints.iter()
    }

    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    pub fn filtered(&self, mut keep: impl FnMut(&Constraint) -> bool) -> Self {
        let mut set = Self::new();
        for (_, constraint) in self.iter() {
            if keep(constraint) {
                set.add(constraint.clone());
            }
        }
        set
    }

    pub fn max_sequence_separation(&self) -> usize {
        self.constraints
            .values()
            .map(Constraint::sequence_separation)
            .max()
            .unwrap_or(0)
    }

    /// Drops constraints on the deleted residue and renumbers the ones above it.
    ///
    /// Surviving constraint ids stay valid.
    pub fn remap_after_deletion(&mut self, deleted: usize) {
        self.constraints.retain(|_, c| !c.touches(deleted));
        for constraint in self.constraints.values_mut() {
            constraint.shift_after_deletion(deleted);
        }
    }
}
