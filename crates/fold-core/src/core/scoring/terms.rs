use super::term::{EnergyMap, ScoreType};
use crate::core::constraints::{BASE_PAIR_DISTANCE, Constraint};
use crate::core::models::pose::Pose;
use crate::core::utils::geometry::radius_of_gyration;
use itertools::Itertools;
use nalgebra::{Point3, Vector3};

/// Beads closer than this repel each other.
const BEAD_CLASH_DISTANCE: f64 = 3.5;
/// Backbone atoms closer than this repel each other.
const BACKBONE_CLASH_DISTANCE: f64 = 4.0;
const BASE_PAIR_WIDTH: f64 = 1.0;
/// Ideal rise between stacked base centroids.
const STACK_DISTANCE: f64 = 4.0;
const STACK_WIDTH: f64 = 0.8;
/// Hairpin loops need at least three unpaired residues.
const MIN_PAIR_SEPARATION: usize = 4;
/// Strength above which a base pair counts as formed.
pub const BASE_PAIR_FORMED: f64 = 0.5;

struct Site {
    seqpos: usize,
    bead: Point3<f64>,
    backbone: Point3<f64>,
    axis: Vector3<f64>,
    normal: Vector3<f64>,
}

fn sites(pose: &Pose) -> Vec<Site> {
    (1..=pose.total_residue())
        .filter(|&i| !pose.is_virtual(i))
        .map(|i| {
            let frame = pose.frame(i);
            Site {
                seqpos: i,
                bead: pose.bead(i),
                backbone: pose.backbone_xyz(i),
                axis: frame.rotation * Vector3::y(),
                normal: frame.rotation * Vector3::z(),
            }
        })
        .collect()
}

fn gaussian(x: f64, x0: f64, width: f64) -> f64 {
    let z = (x - x0) / width;
    (-0.5 * z * z).exp()
}

fn pair_strength(pose: &Pose, a: &Site, b: &Site) -> f64 {
    let (Some(base_a), Some(base_b)) = (
        pose.residues()[a.seqpos - 1].kind().base(),
        pose.residues()[b.seqpos - 1].kind().base(),
    ) else {
        return 0.0;
    };
    if a.seqpos.abs_diff(b.seqpos) < MIN_PAIR_SEPARATION || !base_a.pairs_with(base_b) {
        return 0.0;
    }
    let distance = nalgebra::distance(&a.bead, &b.bead);
    let facing = (-a.axis.dot(&b.axis)).max(0.0);
    gaussian(distance, BASE_PAIR_DISTANCE, BASE_PAIR_WIDTH) * facing
}

/// Strength in `[0, 1]` of the base pair `(i, j)` in the current conformation.
pub fn base_pair_strength(pose: &Pose, i: usize, j: usize) -> f64 {
    let all = sites(pose);
    let find = |seqpos| all.iter().find(|s| s.seqpos == seqpos);
    match (find(i), find(j)) {
        (Some(a), Some(b)) => pair_strength(pose, a, b),
        _ => 0.0,
    }
}

/// Base pairs whose strength exceeds [`BASE_PAIR_FORMED`], each residue used at most
/// once, strongest first.
pub fn formed_base_pairs(pose: &Pose) -> Vec<(usize, usize)> {
    let all = sites(pose);
    let mut candidates = Vec::new();
    for (a, b) in all.iter().tuple_combinations() {
        let strength = pair_strength(pose, a, b);
        if strength > BASE_PAIR_FORMED {
            candidates.push((strength, a.seqpos, b.seqpos));
        }
    }
    candidates.sort_by(|x, y| y.0.total_cmp(&x.0).then(x.1.cmp(&y.1)).then(x.2.cmp(&y.2)));
    let mut used = vec![false; pose.total_residue() + 1];
    let mut pairs = Vec::new();
    for (_, i, j) in candidates {
        if !used[i] && !used[j] {
            used[i] = true;
            used[j] = true;
            pairs.push((i, j));
        }
    }
    pairs.sort_unstable();
    pairs
}

/// Computes the raw (unweighted) energy of every term whose weight is nonzero.
pub fn evaluate(pose: &Pose, weights: &EnergyMap) -> EnergyMap {
    let mut energies = EnergyMap::new();
    let active = |t: ScoreType| weights.get(t) != 0.0;
    let all = sites(pose);

    let pairwise = active(ScoreType::Repulsive)
        || active(ScoreType::BasePair)
        || active(ScoreType::BaseStack)
        || active(ScoreType::BaseAxis);
    if pairwise {
        for (a, b) in all.iter().tuple_combinations() {
            let d_bead = nalgebra::distance(&a.bead, &b.bead);
            if a.seqpos.abs_diff(b.seqpos) >= 2 {
                let d_backbone = nalgebra::distance(&a.backbone, &b.backbone);
                let clash = (BEAD_CLASH_DISTANCE - d_bead).max(0.0).powi(2)
                    + (BACKBONE_CLASH_DISTANCE - d_backbone).max(0.0).powi(2);
                energies[ScoreType::Repulsive] += clash;
            }
            energies[ScoreType::BasePair] -= pair_strength(pose, a, b);

            let both_bases = pose.residues()[a.seqpos - 1].kind().base().is_some()
                && pose.residues()[b.seqpos - 1].kind().base().is_some();
            if both_bases {
                let stack = gaussian(d_bead, STACK_DISTANCE, STACK_WIDTH);
                if stack > 1e-6 {
                    let alignment = a.normal.dot(&b.normal);
                    energies[ScoreType::BaseStack] -= stack;
                    energies[ScoreType::BaseAxis] -= stack * alignment * alignment;
                }
            }
        }
    }

    if active(ScoreType::Chainbreak) || active(ScoreType::LinearChainbreak) {
        for c in pose.chain_breaks() {
            let gap = pose.chain_break_gap(c);
            energies[ScoreType::Chainbreak] += gap * gap;
            energies[ScoreType::LinearChainbreak] += gap;
        }
    }

    if active(ScoreType::AtomPairConstraint) || active(ScoreType::CoordinateConstraint) {
        for (_, constraint) in pose.constraints().iter() {
            let Some(value) = constraint.evaluate(pose) else {
                continue;
            };
            match constraint {
                Constraint::AtomPair { .. } => energies[ScoreType::AtomPairConstraint] += value,
                Constraint::Coordinate { .. } => {
                    energies[ScoreType::CoordinateConstraint] += value
                }
            }
        }
    }

    if active(ScoreType::RadiusOfGyration) {
        let beads: Vec<Point3<f64>> = all.iter().map(|s| s.bead).collect();
        energies[ScoreType::RadiusOfGyration] = radius_of_gyration(&beads);
    }

    energies
}
