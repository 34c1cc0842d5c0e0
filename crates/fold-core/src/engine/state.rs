use super::monte_carlo::MoveCounters;
use crate::core::models::pose::Pose;
use crate::core::scoring::EnergyMap;
use std::collections::VecDeque;
use std::fmt;

/// Lifecycle of a fragment Monte Carlo driver. A driver moves strictly forward and
/// cannot be restarted once `Done`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    Configured,
    Initializing,
    Running { round: usize },
    Finalizing,
    Done,
}

/// Checkpoint at which a trajectory may be abandoned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterStage {
    Autofilter,
    ChainClosureHalfway,
    BasePairsEarly,
    ChainClosure,
    BasePairs,
}

impl FilterStage {
    pub fn name(&self) -> &'static str {
        match self {
            FilterStage::Autofilter => "autofilter",
            FilterStage::ChainClosureHalfway => "chain_closure_halfway",
            FilterStage::BasePairsEarly => "base_pairs_early",
            FilterStage::ChainClosure => "chain_closure",
            FilterStage::BasePairs => "base_pairs",
        }
    }
}

impl fmt::Display for FilterStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How a trajectory ended. Filtering is a normal outcome, not an error.
#[derive(Debug, Clone, PartialEq)]
pub enum TrajectoryOutcome {
    Completed,
    Filtered { stage: FilterStage, reason: String },
}

impl TrajectoryOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, TrajectoryOutcome::Completed)
    }
}

impl fmt::Display for TrajectoryOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrajectoryOutcome::Completed => f.write_str("completed"),
            TrajectoryOutcome::Filtered { stage, .. } => write!(f, "filtered:{stage}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RoundSummary {
    pub round: usize,
    pub fragment_size: usize,
    pub trials: u64,
    pub accepted: u64,
    pub lowest_score: f64,
    /// Sequence-separation cutoff of the active constraints, when staging is on.
    pub constraint_separation: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BasePairStats {
    /// Native pairs that are formed in the model.
    pub recovered: usize,
    pub native: usize,
    /// All pairs formed in the model.
    pub formed: usize,
}

#[derive(Debug, Clone)]
pub struct TrajectoryResult {
    pub seed: u64,
    pub outcome: TrajectoryOutcome,
    pub pose: Pose,
    pub early_lores_score: Option<f64>,
    pub final_lores_score: Option<f64>,
    pub hires_score: Option<f64>,
    pub hires_breakdown: Option<EnergyMap>,
    pub rounds: Vec<RoundSummary>,
    pub rmsd: Option<f64>,
    pub base_pairs: Option<BasePairStats>,
    pub counters: MoveCounters,
}

/// Recent low-resolution scores shared by consecutive trajectories.
///
/// Only the most recent `capacity` scores of each kind are kept.
#[derive(Debug, Clone)]
pub struct ScoreHistory {
    capacity: usize,
    early: VecDeque<f64>,
    finals: VecDeque<f64>,
}

impl ScoreHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            early: VecDeque::new(),
            finals: VecDeque::new(),
        }
    }

    fn push(buffer: &mut VecDeque<f64>, capacity: usize, score: f64) {
        if buffer.len() == capacity {
            buffer.pop_front();
        }
        buffer.push_back(score);
    }

    pub fn record_final(&mut self, score: f64) {
        Self::push(&mut self.finals, self.capacity, score);
    }

    pub fn early_scores(&self) -> impl Iterator<Item = f64> + '_ {
        self.early.iter().copied()
    }

    pub fn final_scores(&self) -> impl Iterator<Item = f64> + '_ {
        self.finals.iter().copied()
    }

    /// Records `score` as an early score and checks it against the `quantile` of all
    /// early scores seen so far (itself included). The score passes when it does not
    /// exceed the value at sorted position `⌊n·quantile⌋`.
    pub fn record_early_and_check(&mut self, score: f64, quantile: f64) -> bool {
        Self::push(&mut self.early, self.capacity, score);
        let mut sorted: Vec<f64> = self.early.iter().copied().collect();
        sorted.sort_by(f64::total_cmp);
        let index = ((sorted.len() as f64 * quantile) as usize).min(sorted.len() - 1);
        score <= sorted[index]
    }
}

impl Default for ScoreHistory {
    fn default() -> Self {
        Self::new(1000)
    }
}
