use crate::core::fragments::{ChunkLibrary, FragmentLibrary};
use crate::core::models::chunk::Chunk;
use crate::core::models::pose::Pose;
use crate::core::scoring::terms::{BASE_PAIR_FORMED, base_pair_strength, formed_base_pairs};
use crate::core::scoring::{ScoreFunction, ScoreType};
use crate::core::utils::geometry::superposed_rmsd;
use crate::engine::config::{FragmentMonteCarloOptions, TreeKind};
use crate::engine::error::EngineError;
use crate::engine::monte_carlo::MonteCarlo;
use crate::engine::movers::{
    AllowInsert, ChunkMover, FragmentMover, LoopCloser, MoveType, Mover, RigidBodyMover,
    TorsionMinimizer,
};
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::state::{
    BasePairStats, DriverState, FilterStage, RoundSummary, ScoreHistory, TrajectoryOutcome,
    TrajectoryResult,
};
use crate::engine::tree::{SimpleTreeBuilder, StarTreeBuilder, TreeBuilder};
use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use std::sync::Arc;
use tracing::{debug, info, instrument, trace, warn};

const CYCLES_PER_FREE_RESIDUE: usize = 2000;
const CYCLES_PER_DOCKING_JUMP: usize = 20000;
const MAX_AUTO_CYCLES: usize = 100_000;
const INITIAL_FRAG_SIZE: usize = 3;

/// Terms whose weights are ramped up over the rounds.
const CHAINBREAK_TERMS: [ScoreType; 2] = [ScoreType::Chainbreak, ScoreType::LinearChainbreak];
const STACK_TERMS: [ScoreType; 2] = [ScoreType::BaseStack, ScoreType::BaseAxis];
const CONSTRAINT_TERMS: [ScoreType; 2] =
    [ScoreType::AtomPairConstraint, ScoreType::CoordinateConstraint];

/// Number of Monte Carlo trials when none is configured.
pub fn auto_cycles(free_residues: usize, docking_jumps: usize) -> usize {
    (CYCLES_PER_FREE_RESIDUE * free_residues + CYCLES_PER_DOCKING_JUMP * docking_jumps)
        .min(MAX_AUTO_CYCLES)
}

/// Fragment length used in round `round` of `rounds`: 3, then 2 after the first third,
/// then 1 after the second third.
pub fn fragment_size_for_round(round: usize, rounds: usize) -> usize {
    if round > 2 * rounds / 3 {
        1
    } else if round > rounds / 3 {
        2
    } else {
        INITIAL_FRAG_SIZE
    }
}

/// Largest sequence separation of the constraints active in a staged round.
pub fn constraint_separation_cutoff(round: usize, rounds: usize, total_residue: usize) -> usize {
    let fraction = round as f64 / rounds as f64;
    let cutoff = (5.0 / 3.0 * fraction * total_residue as f64).floor() as usize + 2;
    cutoff.min(total_residue)
}

/// The moves a trajectory can draw from.
struct MoverSet {
    fragment: FragmentMover,
    chunk: ChunkMover,
    rigid_body: RigidBodyMover,
    loop_closer: LoopCloser,
}

impl MoverSet {
    fn get_mut(&mut self, move_type: MoveType) -> &mut dyn Mover {
        match move_type {
            MoveType::FragmentInsertion => &mut self.fragment,
            MoveType::ChunkInsertion => &mut self.chunk,
            MoveType::RigidBodyJump => &mut self.rigid_body,
            MoveType::LoopClosure => &mut self.loop_closer,
        }
    }
}

/// Draws the non-rigid-body move of a trial.
struct MoveMixture {
    kinds: Vec<MoveType>,
    index: Option<WeightedIndex<f64>>,
}

impl MoveMixture {
    fn new(chunk_coverage: f64, loop_closure_weight: f64) -> Self {
        let candidates = [
            (MoveType::FragmentInsertion, 1.0 - chunk_coverage),
            (MoveType::ChunkInsertion, chunk_coverage),
            (MoveType::LoopClosure, loop_closure_weight),
        ];
        let (kinds, weights): (Vec<MoveType>, Vec<f64>) =
            candidates.into_iter().filter(|(_, w)| *w > 0.0).unzip();
        Self {
            kinds,
            index: WeightedIndex::new(&weights).ok(),
        }
    }

    /// Falls back to fragment insertion when every weight is zero.
    fn sample(&self, rng: &mut dyn RngCore) -> MoveType {
        match &self.index {
            Some(index) => self.kinds[index.sample(rng)],
            None => MoveType::FragmentInsertion,
        }
    }
}

/// Staged fragment-assembly Monte Carlo for one trajectory.
///
/// A driver is configured once and runs exactly one trajectory; calling
/// [`FragmentMonteCarlo::apply`] again fails with [`EngineError::AlreadyRun`].
pub struct FragmentMonteCarlo {
    options: Arc<FragmentMonteCarloOptions>,
    fragments: Arc<FragmentLibrary>,
    chunks: Arc<ChunkLibrary>,
    denovo_scorefxn: ScoreFunction,
    hires_scorefxn: Option<ScoreFunction>,
    native: Option<Arc<Pose>>,
    expected_base_pairs: Vec<(usize, usize)>,
    state: DriverState,
}

impl FragmentMonteCarlo {
    pub fn new(
        options: Arc<FragmentMonteCarloOptions>,
        fragments: Arc<FragmentLibrary>,
        chunks: Arc<ChunkLibrary>,
        denovo_scorefxn: ScoreFunction,
    ) -> Self {
        Self {
            options,
            fragments,
            chunks,
            denovo_scorefxn,
            hires_scorefxn: None,
            native: None,
            expected_base_pairs: Vec::new(),
            state: DriverState::Configured,
        }
    }

    pub fn with_hires_scorefxn(mut self, scorefxn: ScoreFunction) -> Self {
        self.hires_scorefxn = Some(scorefxn);
        self
    }

    pub fn with_native(mut self, native: Arc<Pose>) -> Self {
        self.native = Some(native);
        self
    }

    /// Base pairs the model is expected to form, checked by the base-pair filters.
    pub fn with_base_pairs(mut self, pairs: Vec<(usize, usize)>) -> Self {
        self.expected_base_pairs = pairs;
        self
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    pub fn options(&self) -> &FragmentMonteCarloOptions {
        &self.options
    }

    /// Runs the trajectory on a copy of `start`.
    ///
    /// `history` collects early and final low-resolution scores; trajectories that
    /// share it are compared by the autofilter.
    #[instrument(skip_all, name = "fragment_monte_carlo", fields(seed = self.options.seed))]
    pub fn apply(
        &mut self,
        start: &Pose,
        history: &mut ScoreHistory,
        reporter: &ProgressReporter,
    ) -> Result<TrajectoryResult, EngineError> {
        self.options.validate()?;
        if self.state != DriverState::Configured {
            return Err(EngineError::AlreadyRun);
        }
        if let Some(native) = &self.native {
            if native.num_real_residues() != start.num_real_residues() {
                return Err(EngineError::NativeMismatch {
                    expected: start.num_real_residues(),
                    found: native.num_real_residues(),
                });
            }
        }
        let options = Arc::clone(&self.options);
        let mut rng = StdRng::seed_from_u64(options.seed);
        let mut pose = start.clone();

        // === Phase 1: Fold tree, movers and starting conformation ===
        self.state = DriverState::Initializing;
        reporter.report(Progress::PhaseStart {
            name: "Initializing",
        });
        let chunk_list = self.chunks.chunks();
        let mut tree_builder = self.tree_builder(&chunk_list);
        tree_builder.set_up(&chunk_list, &mut pose, &mut rng)?;
        info!(
            tree = tree_builder.name(),
            jumps = pose.num_jump(),
            "Fold tree installed."
        );

        let allow_insert = AllowInsert::from_pose(&pose, &chunk_list);
        let mut movers = MoverSet {
            fragment: FragmentMover::new(
                Arc::clone(&self.fragments),
                allow_insert.clone(),
                INITIAL_FRAG_SIZE,
            ),
            chunk: ChunkMover::new(Arc::clone(&self.chunks)),
            rigid_body: RigidBodyMover::new(&pose, &chunk_list, options.rigid_body),
            loop_closer: LoopCloser::new(options.loop_closure.clone(), allow_insert.clone()),
        };

        let mut working_scorefxn = self.denovo_scorefxn.clone();
        if let Some(weight) = options.chainbreak_weight {
            working_scorefxn.set_weight(ScoreType::Chainbreak, weight);
        }
        if let Some(weight) = options.linear_chainbreak_weight {
            working_scorefxn.set_weight(ScoreType::LinearChainbreak, weight);
        }
        let bp_constraint = working_scorefxn.weight(ScoreType::AtomPairConstraint);
        working_scorefxn.set_weight(
            ScoreType::AtomPairConstraint,
            bp_constraint * options.suppress_bp_constraint,
        );

        let docking_jumps = movers.rigid_body.movable_jumps().len();
        let cycles = options
            .cycles
            .unwrap_or_else(|| auto_cycles(allow_insert.num_movable(), docking_jumps));
        let trials_per_round = (cycles / options.rounds).max(1);
        let total_residue = pose.num_real_residues();
        let chunk_coverage = options
            .chunk_coverage
            .unwrap_or_else(|| self.chunks.coverage(total_residue));
        let mixture = MoveMixture::new(chunk_coverage, options.loop_closure_weight);
        let full_constraints = pose.constraints().clone();

        if !options.refine_pose {
            movers.chunk.randomize(&mut pose, &mut rng)?;
            movers.fragment.randomize(&mut pose, &mut rng)?;
        }
        info!(
            cycles,
            trials_per_round,
            docking_jumps,
            chunk_coverage,
            movable_bonds = allow_insert.num_movable(),
            "Trajectory initialized."
        );
        reporter.report(Progress::PhaseFinish);

        // === Phase 2: Staged sampling rounds ===
        reporter.report(Progress::PhaseStart { name: "Sampling" });
        reporter.report(Progress::TaskStart {
            total_steps: options.rounds as u64,
        });
        let mut mc = MonteCarlo::new(&pose, working_scorefxn.clone(), options.temperature);
        let mut outcome = TrajectoryOutcome::Completed;
        let mut rounds = Vec::with_capacity(options.rounds);
        let mut early_lores_score = None;

        for round in 1..=options.rounds {
            self.state = DriverState::Running { round };
            mc.set_score_function(self.round_scorefxn(&working_scorefxn, round));
            mc.recover_low(&mut pose);

            movers
                .fragment
                .set_frag_size(fragment_size_for_round(round, options.rounds));
            let constraint_separation = if options.staged_constraints {
                let cutoff = constraint_separation_cutoff(round, options.rounds, total_residue);
                pose.set_constraints(
                    full_constraints.filtered(|c| c.sequence_separation() <= cutoff),
                );
                Some(cutoff)
            } else {
                None
            };
            mc.reset(&pose);

            let jump_change_frequency = if movers.rigid_body.movable_jumps().is_empty()
                || (options.refine_pose && round == 1)
            {
                0.0
            } else {
                options.jump_change_frequency
            };
            let close_after_move = options.close_loops_after_each_move
                || (options.close_loops_in_last_round && round == options.rounds);

            let before = *mc.counters();
            for _ in 0..trials_per_round {
                let move_type = if jump_change_frequency > 0.0
                    && rng.r#gen::<f64>() < jump_change_frequency
                {
                    MoveType::RigidBodyJump
                } else {
                    mixture.sample(&mut rng)
                };
                self.trial(
                    &mut movers,
                    &mut mc,
                    &mut pose,
                    move_type,
                    close_after_move,
                    &mut rng,
                )?;
            }
            mc.recover_low(&mut pose);

            let after = *mc.counters();
            let summary = RoundSummary {
                round,
                fragment_size: movers.fragment.effective_size().unwrap_or(0),
                trials: after.total_trials() - before.total_trials(),
                accepted: after.total_accepted() - before.total_accepted(),
                lowest_score: mc.lowest_score(),
                constraint_separation,
            };
            debug!(
                round,
                fragment_size = summary.fragment_size,
                accepted = summary.accepted,
                trials = summary.trials,
                lowest_score = summary.lowest_score,
                "Round finished."
            );
            reporter.report(Progress::RoundFinish {
                round,
                rounds: options.rounds,
                lowest_score: summary.lowest_score,
            });
            reporter.report(Progress::TaskIncrement);
            rounds.push(summary);

            if round == 2 {
                let score = working_scorefxn.score(&pose);
                early_lores_score = Some(score);
                let passed =
                    history.record_early_and_check(score, options.autofilter_score_quantile);
                if options.autofilter && !passed {
                    outcome = filtered(
                        FilterStage::Autofilter,
                        format!(
                            "early score {score:.3} is above the {:.0}% quantile",
                            100.0 * options.autofilter_score_quantile
                        ),
                    );
                    break;
                }
            }

            if round == options.rounds / 2 {
                if let Some(stage) = self.halfway_filter(&pose) {
                    outcome = stage;
                    break;
                }
            }
        }
        reporter.report(Progress::TaskFinish);
        reporter.report(Progress::PhaseFinish);

        // === Phase 3: Loop closure, final filters and high-resolution scoring ===
        self.state = DriverState::Finalizing;
        reporter.report(Progress::PhaseStart { name: "Finalizing" });
        pose.set_constraints(full_constraints);

        if outcome.is_completed() && options.close_loops {
            match movers.loop_closer.close_all(&mut pose) {
                Ok(()) => {}
                Err(error) if error.is_soft() => warn!(%error, "Final loop closure incomplete."),
                Err(error) => return Err(error.into()),
            }
        }

        if outcome.is_completed() && options.minimize_structure {
            let minimizer = TorsionMinimizer::new(options.minimizer, allow_insert.clone());
            match minimizer.apply(&mut pose, &working_scorefxn) {
                Ok(score) => debug!(score, "Structure minimized."),
                Err(error) if error.is_soft() => warn!(%error, "Minimization skipped."),
                Err(error) => return Err(error.into()),
            }
        }

        let final_lores_score = working_scorefxn.score(&pose);
        history.record_final(final_lores_score);

        if outcome.is_completed() {
            if let Some(stage) = self.final_filter(&pose) {
                outcome = stage;
            }
        }

        let (hires_score, hires_breakdown) = match (&self.hires_scorefxn, outcome.is_completed())
        {
            (Some(scorefxn), true) => {
                (Some(scorefxn.score(&pose)), Some(scorefxn.breakdown(&pose)))
            }
            _ => (None, None),
        };

        tree_builder.tear_down(&mut pose)?;

        let rmsd = self
            .native
            .as_ref()
            .and_then(|native| superposed_rmsd(&native.bead_coords(), &pose.bead_coords()));
        let base_pairs = self.base_pair_stats(&pose);
        reporter.report(Progress::PhaseFinish);

        self.state = DriverState::Done;
        info!(
            %outcome,
            final_lores_score,
            hires_score,
            rmsd,
            moves = %mc.counters(),
            "Trajectory finished."
        );

        Ok(TrajectoryResult {
            seed: options.seed,
            outcome,
            pose,
            early_lores_score,
            final_lores_score: Some(final_lores_score),
            hires_score,
            hires_breakdown,
            rounds,
            rmsd,
            base_pairs,
            counters: *mc.counters(),
        })
    }

    fn tree_builder(&self, chunks: &[Chunk]) -> Box<dyn TreeBuilder> {
        match self.options.tree {
            TreeKind::Star => Box::new(StarTreeBuilder::new()),
            TreeKind::Simple => Box::new(SimpleTreeBuilder::new()),
            TreeKind::Auto if chunks.is_empty() => Box::new(SimpleTreeBuilder::new()),
            TreeKind::Auto => Box::new(StarTreeBuilder::new()),
        }
    }

    /// Weights for `round`: ramped terms are scaled by `round / rounds`.
    fn round_scorefxn(&self, base: &ScoreFunction, round: usize) -> ScoreFunction {
        let options = &self.options;
        let suppress = round as f64 / options.rounds as f64;
        let mut scorefxn = base.clone();
        let mut ramp = |terms: &[ScoreType]| {
            for &term in terms {
                scorefxn.set_weight(term, base.weight(term) * suppress);
            }
        };
        ramp(&CHAINBREAK_TERMS);
        if options.titrate_stack_bonus {
            ramp(&STACK_TERMS);
        }
        if !options.staged_constraints {
            ramp(&CONSTRAINT_TERMS);
        }
        scorefxn
    }

    fn trial(
        &self,
        movers: &mut MoverSet,
        mc: &mut MonteCarlo,
        pose: &mut Pose,
        move_type: MoveType,
        close_after_move: bool,
        rng: &mut dyn RngCore,
    ) -> Result<(), EngineError> {
        let mut result = movers.get_mut(move_type).apply(pose, rng);
        if result.is_ok() && close_after_move && move_type != MoveType::LoopClosure {
            result = movers.loop_closer.close_all(pose);
        }
        match result {
            Ok(()) => {
                mc.boltzmann(pose, move_type, rng);
                Ok(())
            }
            Err(error) if error.is_soft() => {
                trace!(%move_type, %error, "Trial rejected.");
                mc.reject(pose, move_type);
                Ok(())
            }
            Err(error) => Err(error.into()),
        }
    }

    fn pairs_formed(&self, pose: &Pose) -> bool {
        self.expected_base_pairs
            .iter()
            .all(|&(i, j)| base_pair_strength(pose, i, j) > BASE_PAIR_FORMED)
    }

    fn halfway_filter(&self, pose: &Pose) -> Option<TrajectoryOutcome> {
        let options = &self.options;
        if options.filter_chain_closure_halfway
            && !LoopCloser::check_closure(pose, options.filter_chain_closure_distance)
        {
            return Some(filtered(
                FilterStage::ChainClosureHalfway,
                format!("largest chain-break gap {:.2} Å", LoopCloser::max_gap(pose)),
            ));
        }
        if options.filter_lores_base_pairs_early && !self.pairs_formed(pose) {
            return Some(filtered(
                FilterStage::BasePairsEarly,
                "expected base pairs are not formed".to_string(),
            ));
        }
        None
    }

    fn final_filter(&self, pose: &Pose) -> Option<TrajectoryOutcome> {
        let options = &self.options;
        if options.filter_chain_closure
            && !LoopCloser::check_closure(pose, options.filter_chain_closure_distance)
        {
            return Some(filtered(
                FilterStage::ChainClosure,
                format!("largest chain-break gap {:.2} Å", LoopCloser::max_gap(pose)),
            ));
        }
        if options.filter_lores_base_pairs && !self.pairs_formed(pose) {
            return Some(filtered(
                FilterStage::BasePairs,
                "expected base pairs are not formed".to_string(),
            ));
        }
        None
    }

    /// Pairs recovered relative to the native structure, or to the expected pairs when
    /// no native is given.
    fn base_pair_stats(&self, pose: &Pose) -> Option<BasePairStats> {
        let reference = match &self.native {
            Some(native) => formed_base_pairs(native),
            None if !self.expected_base_pairs.is_empty() => self.expected_base_pairs.clone(),
            None => return None,
        };
        let formed = formed_base_pairs(pose);
        let recovered = reference.iter().filter(|pair| formed.contains(pair)).count();
        Some(BasePairStats {
            recovered,
            native: reference.len(),
            formed: formed.len(),
        })
    }
}

fn filtered(stage: FilterStage, reason: String) -> TrajectoryOutcome {
    info!(%stage, %reason, "Trajectory filtered.");
    TrajectoryOutcome::Filtered { stage, reason }
}
