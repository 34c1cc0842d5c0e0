use phf::{Map, phf_map};
use std::fmt;
use std::ops::{Add, AddAssign, Index, IndexMut, Mul};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ScoreType {
    Repulsive,
    BasePair,
    BaseStack,
    BaseAxis,
    Chainbreak,
    LinearChainbreak,
    AtomPairConstraint,
    CoordinateConstraint,
    RadiusOfGyration,
}

static SCORE_TYPE_NAMES: Map<&'static str, ScoreType> = phf_map! {
    "rna_vdw" => ScoreType::Repulsive,
    "rna_base_pair" => ScoreType::BasePair,
    "rna_base_stack" => ScoreType::BaseStack,
    "rna_base_axis" => ScoreType::BaseAxis,
    "chainbreak" => ScoreType::Chainbreak,
    "linear_chainbreak" => ScoreType::LinearChainbreak,
    "atom_pair_constraint" => ScoreType::AtomPairConstraint,
    "coordinate_constraint" => ScoreType::CoordinateConstraint,
    "rg" => ScoreType::RadiusOfGyration,
};

impl ScoreType {
    pub const COUNT: usize = 9;

    pub const ALL: [ScoreType; Self::COUNT] = [
        ScoreType::Repulsive,
        ScoreType::BasePair,
        ScoreType::BaseStack,
        ScoreType::BaseAxis,
        ScoreType::Chainbreak,
        ScoreType::LinearChainbreak,
        ScoreType::AtomPairConstraint,
        ScoreType::CoordinateConstraint,
        ScoreType::RadiusOfGyration,
    ];

    pub fn from_name(name: &str) -> Option<Self> {
        SCORE_TYPE_NAMES.get(name.trim()).copied()
    }

    pub fn name(self) -> &'static str {
        match self {
            ScoreType::Repulsive => "rna_vdw",
            ScoreType::BasePair => "rna_base_pair",
            ScoreType::BaseStack => "rna_base_stack",
            ScoreType::BaseAxis => "rna_base_axis",
            ScoreType::Chainbreak => "chainbreak",
            ScoreType::LinearChainbreak => "linear_chainbreak",
            ScoreType::AtomPairConstraint => "atom_pair_constraint",
            ScoreType::CoordinateConstraint => "coordinate_constraint",
            ScoreType::RadiusOfGyration => "rg",
        }
    }

    pub fn is_constraint(self) -> bool {
        matches!(
            self,
            ScoreType::AtomPairConstraint | ScoreType::CoordinateConstraint
        )
    }
}

impl fmt::Display for ScoreType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One value per [`ScoreType`]: raw term energies or term weights.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EnergyMap {
    values: [f64; ScoreType::COUNT],
}

impl EnergyMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, score_type: ScoreType) -> f64 {
        self.values[score_type as usize]
    }

    pub fn set(&mut self, score_type: ScoreType, value: f64) {
        self.values[score_type as usize] = value;
    }

    pub fn iter(&self) -> impl Iterator<Item = (ScoreType, f64)> + '_ {
        ScoreType::ALL.iter().map(|&t| (t, self.values[t as usize]))
    }

    /// Entries that are not exactly zero.
    pub fn nonzero(&self) -> impl Iterator<Item = (ScoreType, f64)> + '_ {
        self.iter().filter(|&(_, v)| v != 0.0)
    }

    /// Dot product with a set of weights.
    pub fn weighted_total(&self, weights: &EnergyMap) -> f64 {
        self.iter().map(|(t, v)| v * weights.get(t)).sum()
    }

    #[inline]
    pub fn total(&self) -> f64 {
        self.values.iter().sum()
    }
}

impl Index<ScoreType> for EnergyMap {
    type Output = f64;

    fn index(&self, score_type: ScoreType) -> &f64 {
        &self.values[score_type as usize]
    }
}

impl IndexMut<ScoreType> for EnergyMap {
    fn index_mut(&mut self, score_type: ScoreType) -> &mut f64 {
        &mut self.values[score_type as usize]
    }
}

impl Add for EnergyMap {
    type Output = Self;

    fn add(mut self, rhs: Self) -> Self::Output {
        self += rhs;
        self
    }
}

impl AddAssign for EnergyMap {
    fn add_assign(&mut self, rhs: Self) {
        for (lhs, rhs) in self.values.iter_mut().zip(rhs.values) {
            *lhs += rhs;
        }
    }
}

/// Element-wise product, e.g. raw energies times weights.
impl Mul for EnergyMap {
    type Output = Self;

    fn mul(mut self, rhs: Self) -> Self::Output {
        for (lhs, rhs) in self.values.iter_mut().zip(rhs.values) {
            *lhs *= rhs;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip_through_lookup_table() {
        for t in ScoreType::ALL {
            assert_eq!(ScoreType::from_name(t.name()), Some(t));
        }
        assert_eq!(ScoreType::from_name("fa_atr"), None);
    }

    #[test]
    fn default_map_is_all_zero() {
        let map = EnergyMap::default();
        assert_eq!(map.total(), 0.0);
        assert_eq!(map.nonzero().count(), 0);
    }

    #[test]
    fn index_and_set_address_the_same_slot() {
        let mut map = EnergyMap::new();
        map.set(ScoreType::BasePair, -3.0);
        map[ScoreType::Chainbreak] += 2.0;
        assert_eq!(map[ScoreType::BasePair], -3.0);
        assert_eq!(map.get(ScoreType::Chainbreak), 2.0);
        assert_eq!(map.nonzero().count(), 2);
    }

    #[test]
    fn add_and_add_assign_sum_each_term() {
        let mut a = EnergyMap::new();
        a.set(ScoreType::Repulsive, 1.0);
        let mut b = EnergyMap::new();
        b.set(ScoreType::Repulsive, 2.0);
        b.set(ScoreType::RadiusOfGyration, 5.0);
        let sum = a + b;
        assert_eq!(sum[ScoreType::Repulsive], 3.0);
        a += b;
        assert_eq!(a, sum);
    }

    #[test]
    fn weighted_total_is_a_dot_product() {
        let mut raw = EnergyMap::new();
        raw.set(ScoreType::BasePair, -2.0);
        raw.set(ScoreType::Chainbreak, 4.0);
        let mut weights = EnergyMap::new();
        weights.set(ScoreType::BasePair, 3.0);
        weights.set(ScoreType::Chainbreak, 0.5);
        assert_eq!(raw.weighted_total(&weights), -4.0);
        assert_eq!((raw * weights).total(), -4.0);
    }
}
