use super::movers::MoveType;
use crate::core::models::pose::Pose;
use crate::core::scoring::ScoreFunction;
use rand::{Rng, RngCore};
use std::fmt;
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MoveCount {
    pub trials: u64,
    pub accepted: u64,
}

impl MoveCount {
    pub fn acceptance_rate(&self) -> f64 {
        if self.trials == 0 {
            0.0
        } else {
            self.accepted as f64 / self.trials as f64
        }
    }
}

/// Trial and acceptance counts per move type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MoveCounters {
    counts: [MoveCount; MoveType::COUNT],
}

impl MoveCounters {
    pub fn record(&mut self, move_type: MoveType, accepted: bool) {
        let count = &mut self.counts[move_type.index()];
        count.trials += 1;
        if accepted {
            count.accepted += 1;
        }
    }

    pub fn get(&self, move_type: MoveType) -> MoveCount {
        self.counts[move_type.index()]
    }

    pub fn total_trials(&self) -> u64 {
        self.counts.iter().map(|c| c.trials).sum()
    }

    pub fn total_accepted(&self) -> u64 {
        self.counts.iter().map(|c| c.accepted).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (MoveType, MoveCount)> + '_ {
        MoveType::ALL.iter().map(|&t| (t, self.get(t)))
    }

    pub fn merge(&mut self, other: &MoveCounters) {
        for (mine, theirs) in self.counts.iter_mut().zip(&other.counts) {
            mine.trials += theirs.trials;
            mine.accepted += theirs.accepted;
        }
    }
}

impl fmt::Display for MoveCounters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (move_type, count) in self.iter().filter(|(_, c)| c.trials > 0) {
            if !first {
                f.write_str(", ")?;
            }
            first = false;
            write!(
                f,
                "{move_type}: {}/{} ({:.1}%)",
                count.accepted,
                count.trials,
                100.0 * count.acceptance_rate()
            )?;
        }
        Ok(())
    }
}

/// Metropolis bookkeeping for a single trajectory.
///
/// Holds snapshots of the last accepted and the lowest-scoring pose together with
/// their scores under the current score function.
#[derive(Debug, Clone)]
pub struct MonteCarlo {
    score_function: ScoreFunction,
    temperature: f64,
    last_accepted: Pose,
    last_accepted_score: f64,
    lowest: Pose,
    lowest_score: f64,
    counters: MoveCounters,
}

impl MonteCarlo {
    pub fn new(pose: &Pose, score_function: ScoreFunction, temperature: f64) -> Self {
        let score = score_function.score(pose);
        Self {
            score_function,
            temperature,
            last_accepted: pose.clone(),
            last_accepted_score: score,
            lowest: pose.clone(),
            lowest_score: score,
            counters: MoveCounters::default(),
        }
    }

    /// Scores `pose` and applies the Metropolis criterion against the last accepted
    /// state. A rejected pose is restored to the last accepted snapshot.
    ///
    /// At temperature zero only moves that do not raise the score are accepted.
    pub fn boltzmann(
        &mut self,
        pose: &mut Pose,
        move_type: MoveType,
        rng: &mut dyn RngCore,
    ) -> bool {
        let score = self.score_function.score(pose);
        let delta = score - self.last_accepted_score;
        let accepted = if delta <= 0.0 {
            true
        } else if self.temperature > 0.0 {
            rng.r#gen::<f64>() < (-delta / self.temperature).exp()
        } else {
            false
        };
        self.counters.record(move_type, accepted);

        if accepted {
            self.last_accepted.clone_from(pose);
            self.last_accepted_score = score;
            if score < self.lowest_score {
                self.lowest.clone_from(pose);
                self.lowest_score = score;
            }
        } else {
            pose.clone_from(&self.last_accepted);
        }
        trace!(%move_type, score, delta, accepted, "Metropolis step");
        accepted
    }

    /// Records a trial whose move failed softly and restores the last accepted pose.
    pub fn reject(&mut self, pose: &mut Pose, move_type: MoveType) {
        self.counters.record(move_type, false);
        pose.clone_from(&self.last_accepted);
    }

    /// Makes `pose` both the last accepted and the lowest-scoring state.
    pub fn reset(&mut self, pose: &Pose) {
        let score = self.score_function.score(pose);
        self.last_accepted.clone_from(pose);
        self.last_accepted_score = score;
        self.lowest.clone_from(pose);
        self.lowest_score = score;
    }

    /// Copies the lowest-scoring snapshot into `pose`.
    pub fn recover_low(&self, pose: &mut Pose) {
        pose.clone_from(&self.lowest);
    }

    /// Installs new weights and rescores both snapshots with them.
    pub fn set_score_function(&mut self, score_function: ScoreFunction) {
        self.score_function = score_function;
        self.last_accepted_score = self.score_function.score(&self.last_accepted);
        self.lowest_score = self.score_function.score(&self.lowest);
    }

    pub fn score_function(&self) -> &ScoreFunction {
        &self.score_function
    }

    pub fn set_temperature(&mut self, temperature: f64) {
        self.temperature = temperature;
    }

    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    pub fn last_accepted_score(&self) -> f64 {
        self.last_accepted_score
    }

    pub fn lowest_score(&self) -> f64 {
        self.lowest_score
    }

    pub fn last_accepted_pose(&self) -> &Pose {
        &self.last_accepted
    }

    pub fn lowest_score_pose(&self) -> &Pose {
        &self.lowest
    }

    pub fn counters(&self) -> &MoveCounters {
        &self.counters
    }
}
