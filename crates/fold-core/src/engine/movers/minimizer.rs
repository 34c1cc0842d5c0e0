use super::AllowInsert;
use crate::core::models::pose::Pose;
use crate::core::scoring::ScoreFunction;
use crate::engine::config::MinimizerSettings;
use crate::engine::error::MoveError;
use tracing::debug;

const MIN_BOND_ANGLE: f64 = 1.0;
const MAX_BOND_ANGLE: f64 = 179.0;

/// Greedy coordinate descent over the angle and torsion of every movable bond.
///
/// Each sweep visits the bonds in order and keeps the first of `angle ± step` and
/// `torsion ± step` that lowers the score. A sweep without any improvement halves the
/// step; the search stops once the step falls below `min_step` or after `max_passes`
/// sweeps.
#[derive(Debug, Clone)]
pub struct TorsionMinimizer {
    settings: MinimizerSettings,
    allow_insert: AllowInsert,
}

impl TorsionMinimizer {
    pub fn new(settings: MinimizerSettings, allow_insert: AllowInsert) -> Self {
        Self {
            settings,
            allow_insert,
        }
    }

    /// Minimizes `pose` in place and returns its final score.
    pub fn apply(&self, pose: &mut Pose, scorefxn: &ScoreFunction) -> Result<f64, MoveError> {
        let bonds: Vec<usize> = (1..pose.total_residue())
            .filter(|&i| self.allow_insert.bond(i))
            .collect();
        if bonds.is_empty() {
            return Err(MoveError::NoMovableDof("minimizer"));
        }

        let start = scorefxn.score(pose);
        let mut score = start;
        let mut step = self.settings.initial_step;
        let mut passes = 0;
        while passes < self.settings.max_passes && step >= self.settings.min_step {
            passes += 1;
            let mut improved = false;
            for &bond in &bonds {
                if let Some(lower) = self.improve_bond(pose, scorefxn, bond, step, score)? {
                    score = lower;
                    improved = true;
                }
            }
            if !improved {
                step /= 2.0;
            }
        }
        debug!(passes, start, score, "Torsion minimization finished");
        Ok(score)
    }

    fn improve_bond(
        &self,
        pose: &mut Pose,
        scorefxn: &ScoreFunction,
        bond: usize,
        step: f64,
        current: f64,
    ) -> Result<Option<f64>, MoveError> {
        let (Some(saved), Some(geometry)) = (pose.bond(bond).copied(), pose.bond_geometry(bond))
        else {
            return Ok(None);
        };
        let candidates = [
            (geometry.angle + step, geometry.torsion),
            (geometry.angle - step, geometry.torsion),
            (geometry.angle, geometry.torsion + step),
            (geometry.angle, geometry.torsion - step),
        ];
        for (angle, torsion) in candidates {
            let angle = angle.clamp(MIN_BOND_ANGLE, MAX_BOND_ANGLE);
            pose.set_bond_torsions(bond, angle, torsion)?;
            let trial = scorefxn.score(pose);
            if trial < current {
                return Ok(Some(trial));
            }
        }
        pose.set_bonds([(bond, saved)])?;
        Ok(None)
    }
}
