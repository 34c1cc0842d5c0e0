use super::fragment_monte_carlo::FragmentMonteCarlo;
use crate::core::constraints::ConstraintSet;
use crate::core::fragments::{ChunkLibrary, FragmentLibrary};
use crate::core::models::pose::{Pose, PoseError};
use crate::core::models::residue::Polymer;
use crate::core::models::secstruct::{SecondaryStructure, parse_dot_bracket};
use crate::core::scoring::ScoreFunction;
use crate::engine::config::{ConfigError, FragmentMonteCarloOptions};
use crate::engine::error::EngineError;
use crate::engine::monte_carlo::MoveCounters;
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::state::{ScoreHistory, TrajectoryResult};
use rayon::prelude::*;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// What to fold: the sequence and everything known about it.
#[derive(Debug, Clone)]
pub struct DenovoTarget {
    pub sequence: String,
    pub polymer: Polymer,
    /// Dot-bracket secondary structure; its pairs become base-pair constraints.
    pub secstruct: Option<String>,
    /// Per-residue structural conservation used to weight jump anchors.
    pub conservation: Option<Vec<f64>>,
    /// Conformation to start from instead of the extended chain.
    pub start_pose: Option<Pose>,
    pub native: Option<Pose>,
    pub fragments: Arc<FragmentLibrary>,
    pub chunks: Arc<ChunkLibrary>,
}

impl DenovoTarget {
    pub fn new(
        sequence: impl Into<String>,
        polymer: Polymer,
        fragments: Arc<FragmentLibrary>,
    ) -> Self {
        Self {
            sequence: sequence.into(),
            polymer,
            secstruct: None,
            conservation: None,
            start_pose: None,
            native: None,
            fragments,
            chunks: Arc::new(ChunkLibrary::new()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DenovoConfig {
    pub nstruct: usize,
    pub options: FragmentMonteCarloOptions,
    pub lores_scorefxn: ScoreFunction,
    pub hires_scorefxn: Option<ScoreFunction>,
    /// Skip base-pair constraints derived from the secondary structure.
    pub ignore_secstruct: bool,
}

#[derive(Default)]
pub struct DenovoConfigBuilder {
    nstruct: Option<usize>,
    options: Option<FragmentMonteCarloOptions>,
    lores_scorefxn: Option<ScoreFunction>,
    hires_scorefxn: Option<ScoreFunction>,
    ignore_secstruct: bool,
}

impl DenovoConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn nstruct(mut self, nstruct: usize) -> Self {
        self.nstruct = Some(nstruct);
        self
    }

    pub fn options(mut self, options: FragmentMonteCarloOptions) -> Self {
        self.options = Some(options);
        self
    }

    pub fn lores_scorefxn(mut self, scorefxn: ScoreFunction) -> Self {
        self.lores_scorefxn = Some(scorefxn);
        self
    }

    pub fn hires_scorefxn(mut self, scorefxn: ScoreFunction) -> Self {
        self.hires_scorefxn = Some(scorefxn);
        self
    }

    pub fn ignore_secstruct(mut self, ignore: bool) -> Self {
        self.ignore_secstruct = ignore;
        self
    }

    pub fn build(self) -> Result<DenovoConfig, ConfigError> {
        let nstruct = self.nstruct.ok_or(ConfigError::MissingParameter("nstruct"))?;
        if nstruct == 0 {
            return Err(ConfigError::InvalidValue {
                parameter: "nstruct",
                reason: "at least one model is required".to_string(),
            });
        }
        let options = self.options.unwrap_or_default();
        options.validate()?;
        Ok(DenovoConfig {
            nstruct,
            options,
            lores_scorefxn: self.lores_scorefxn.unwrap_or_else(ScoreFunction::lores),
            hires_scorefxn: self.hires_scorefxn,
            ignore_secstruct: self.ignore_secstruct,
        })
    }
}

#[derive(Debug, Clone)]
pub struct DenovoResult {
    /// One entry per trajectory, in trajectory order.
    pub trajectories: Vec<TrajectoryResult>,
}

impl DenovoResult {
    pub fn completed(&self) -> impl Iterator<Item = &TrajectoryResult> {
        self.trajectories.iter().filter(|t| t.outcome.is_completed())
    }

    pub fn num_filtered(&self) -> usize {
        self.trajectories.len() - self.completed().count()
    }

    /// Completed trajectories ordered by high-resolution score, falling back to the
    /// final low-resolution score.
    pub fn ranked(&self) -> Vec<&TrajectoryResult> {
        let key = |t: &TrajectoryResult| {
            t.hires_score
                .or(t.final_lores_score)
                .unwrap_or(f64::INFINITY)
        };
        let mut ranked: Vec<&TrajectoryResult> = self.completed().collect();
        ranked.sort_by(|a, b| key(a).total_cmp(&key(b)));
        ranked
    }

    pub fn counters(&self) -> MoveCounters {
        let mut total = MoveCounters::default();
        for trajectory in &self.trajectories {
            total.merge(&trajectory.counters);
        }
        total
    }
}

/// Builds the starting pose and the base pairs expected from the secondary structure.
pub fn prepare_pose(
    target: &DenovoTarget,
    ignore_secstruct: bool,
) -> Result<(Pose, Vec<(usize, usize)>), EngineError> {
    let mut pose = match &target.start_pose {
        Some(start) => {
            let start_sequence = start.sequence();
            if !start_sequence.eq_ignore_ascii_case(&target.sequence) {
                return Err(EngineError::PhaseFailed {
                    phase: "Preparation",
                    reason: format!(
                        "start pose sequence '{start_sequence}' does not match '{}'",
                        target.sequence
                    ),
                });
            }
            start.clone()
        }
        None => Pose::from_sequence(&target.sequence, target.polymer)?,
    };

    let mut pairs = Vec::new();
    if let Some(dot_bracket) = &target.secstruct {
        pairs = parse_dot_bracket(dot_bracket).map_err(PoseError::from)?;
        let secstruct = SecondaryStructure::from_dot_bracket(dot_bracket).map_err(PoseError::from)?;
        pose.set_secstruct(secstruct)?;
        if ignore_secstruct {
            info!("Secondary structure given but its base-pair constraints are ignored.");
        } else {
            let mut constraints = pose.constraints().clone();
            for (_, constraint) in ConstraintSet::base_pairs(&pairs).iter() {
                constraints.add(constraint.clone());
            }
            pose.set_constraints(constraints);
        }
    }
    if let Some(scores) = &target.conservation {
        pose.set_conservation(scores.clone())?;
    }
    Ok((pose, pairs))
}

/// Runs `config.nstruct` independent trajectories with seeds `options.seed + i`.
///
/// With the autofilter on, trajectories run one after another and share a score
/// history; otherwise they run in parallel. Results come back in trajectory order.
#[instrument(skip_all, name = "denovo_workflow", fields(nstruct = config.nstruct))]
pub fn run(
    target: &DenovoTarget,
    config: &DenovoConfig,
    reporter: &ProgressReporter,
) -> Result<DenovoResult, EngineError> {
    // === Phase 1: Starting pose ===
    reporter.report(Progress::PhaseStart {
        name: "Preparation",
    });
    let (start, base_pairs) = prepare_pose(target, config.ignore_secstruct)?;
    let native = target.native.clone().map(Arc::new);
    info!(
        residues = start.total_residue(),
        base_pairs = base_pairs.len(),
        chunks = target.chunks.sets().len(),
        constraints = start.constraints().len(),
        "Starting pose prepared."
    );
    reporter.report(Progress::PhaseFinish);

    // === Phase 2: Trajectories ===
    reporter.report(Progress::PhaseStart {
        name: "Fragment assembly",
    });
    reporter.report(Progress::TaskStart {
        total_steps: config.nstruct as u64,
    });

    let run_one = |index: usize, history: &mut ScoreHistory| {
        let mut options = config.options.clone();
        options.seed = config.options.seed.wrapping_add(index as u64);
        let mut driver = FragmentMonteCarlo::new(
            Arc::new(options),
            Arc::clone(&target.fragments),
            Arc::clone(&target.chunks),
            config.lores_scorefxn.clone(),
        )
        .with_base_pairs(base_pairs.clone());
        if let Some(hires) = &config.hires_scorefxn {
            driver = driver.with_hires_scorefxn(hires.clone());
        }
        if let Some(native) = &native {
            driver = driver.with_native(Arc::clone(native));
        }
        let result = driver.apply(&start, history, &ProgressReporter::new())?;
        reporter.report(Progress::TrajectoryFinish {
            index,
            summary: summarize(&result),
        });
        reporter.report(Progress::TaskIncrement);
        Ok::<_, EngineError>(result)
    };

    let trajectories = if config.options.autofilter {
        let mut history = ScoreHistory::new(config.options.history_capacity);
        (0..config.nstruct)
            .map(|index| run_one(index, &mut history))
            .collect::<Result<Vec<_>, _>>()?
    } else {
        (0..config.nstruct)
            .into_par_iter()
            .map(|index| run_one(index, &mut ScoreHistory::new(config.options.history_capacity)))
            .collect::<Result<Vec<_>, _>>()?
    };
    reporter.report(Progress::TaskFinish);
    reporter.report(Progress::PhaseFinish);

    let result = DenovoResult { trajectories };
    let filtered = result.num_filtered();
    if filtered == result.trajectories.len() {
        warn!("Every trajectory was filtered.");
    }
    info!(
        completed = result.trajectories.len() - filtered,
        filtered,
        moves = %result.counters(),
        "De novo protocol finished."
    );
    Ok(result)
}

fn summarize(result: &TrajectoryResult) -> String {
    let mut summary = format!("seed {} {}", result.seed, result.outcome);
    if let Some(score) = result.final_lores_score {
        summary.push_str(&format!(", lores {score:.2}"));
    }
    if let Some(score) = result.hires_score {
        summary.push_str(&format!(", hires {score:.2}"));
    }
    if let Some(rmsd) = result.rmsd {
        summary.push_str(&format!(", rmsd {rmsd:.2} Å"));
    }
    summary
}
