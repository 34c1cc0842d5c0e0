use thiserror::Error;

#[derive(Debug, Error, PartialEq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),
    #[error("Invalid value for '{parameter}': {reason}")]
    InvalidValue {
        parameter: &'static str,
        reason: String,
    },
}

/// Which fold tree the driver installs before sampling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TreeKind {
    /// Star tree when chunks are available, simple tree otherwise.
    #[default]
    Auto,
    Star,
    Simple,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RigidBodySettings {
    /// Standard deviation of the random rotation, in degrees.
    pub rotation_magnitude: f64,
    /// Standard deviation of the random translation, in Å.
    pub translation_magnitude: f64,
}

impl Default for RigidBodySettings {
    fn default() -> Self {
        Self {
            rotation_magnitude: 10.0,
            translation_magnitude: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoopClosureSettings {
    /// Number of bond pivots on each side of a cut that CCD may move.
    pub window: usize,
    pub max_iterations: usize,
    /// Gap (Å) below which a chain break counts as closed.
    pub tolerance: f64,
}

impl Default for LoopClosureSettings {
    fn default() -> Self {
        Self {
            window: 5,
            max_iterations: 100,
            tolerance: 0.05,
        }
    }
}

/// Greedy torsion minimization applied to a finished low-resolution model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MinimizerSettings {
    /// Upper bound on sweeps over the movable bonds.
    pub max_passes: usize,
    /// First angle and torsion step, in degrees.
    pub initial_step: f64,
    /// The step is halved after a sweep without improvement until it drops below this.
    pub min_step: f64,
}

impl Default for MinimizerSettings {
    fn default() -> Self {
        Self {
            max_passes: 25,
            initial_step: 10.0,
            min_step: 0.5,
        }
    }
}

/// Immutable settings of one staged fragment Monte Carlo trajectory.
#[derive(Debug, Clone, PartialEq)]
pub struct FragmentMonteCarloOptions {
    pub rounds: usize,
    /// Total trials over all rounds; derived from the number of free residues and
    /// docking jumps when unset.
    pub cycles: Option<usize>,
    pub temperature: f64,
    pub jump_change_frequency: f64,
    pub close_loops: bool,
    pub close_loops_in_last_round: bool,
    pub close_loops_after_each_move: bool,
    pub autofilter: bool,
    pub autofilter_score_quantile: f64,
    pub titrate_stack_bonus: bool,
    pub staged_constraints: bool,
    pub filter_chain_closure: bool,
    pub filter_chain_closure_distance: f64,
    pub filter_chain_closure_halfway: bool,
    pub filter_lores_base_pairs: bool,
    pub filter_lores_base_pairs_early: bool,
    /// Share of non-rigid-body trials spent on chunk insertion; taken from the chunk
    /// library when unset.
    pub chunk_coverage: Option<f64>,
    pub loop_closure_weight: f64,
    pub refine_pose: bool,
    /// Minimize movable torsions of completed models before high-resolution scoring.
    pub minimize_structure: bool,
    /// Scale on the atom-pair constraint weight, which carries the base-pair constraints.
    pub suppress_bp_constraint: f64,
    pub chainbreak_weight: Option<f64>,
    pub linear_chainbreak_weight: Option<f64>,
    pub tree: TreeKind,
    pub rigid_body: RigidBodySettings,
    pub loop_closure: LoopClosureSettings,
    pub minimizer: MinimizerSettings,
    pub history_capacity: usize,
    pub seed: u64,
}

impl Default for FragmentMonteCarloOptions {
    fn default() -> Self {
        Self {
            rounds: 10,
            cycles: None,
            temperature: 2.0,
            jump_change_frequency: 0.1,
            close_loops: true,
            close_loops_in_last_round: true,
            close_loops_after_each_move: false,
            autofilter: false,
            autofilter_score_quantile: 0.20,
            titrate_stack_bonus: true,
            staged_constraints: false,
            filter_chain_closure: true,
            filter_chain_closure_distance: 6.0,
            filter_chain_closure_halfway: true,
            filter_lores_base_pairs: false,
            filter_lores_base_pairs_early: false,
            chunk_coverage: None,
            loop_closure_weight: 0.0,
            refine_pose: false,
            minimize_structure: false,
            suppress_bp_constraint: 1.0,
            chainbreak_weight: None,
            linear_chainbreak_weight: None,
            tree: TreeKind::Auto,
            rigid_body: RigidBodySettings::default(),
            loop_closure: LoopClosureSettings::default(),
            minimizer: MinimizerSettings::default(),
            history_capacity: 1000,
            seed: 0,
        }
    }
}

#[derive(Default)]
pub struct FragmentMonteCarloOptionsBuilder {
    rounds: Option<usize>,
    cycles: Option<usize>,
    temperature: Option<f64>,
    jump_change_frequency: Option<f64>,
    close_loops: Option<bool>,
    close_loops_in_last_round: Option<bool>,
    close_loops_after_each_move: Option<bool>,
    autofilter: Option<bool>,
    autofilter_score_quantile: Option<f64>,
    titrate_stack_bonus: Option<bool>,
    staged_constraints: Option<bool>,
    filter_chain_closure: Option<bool>,
    filter_chain_closure_distance: Option<f64>,
    filter_chain_closure_halfway: Option<bool>,
    filter_lores_base_pairs: Option<bool>,
    filter_lores_base_pairs_early: Option<bool>,
    chunk_coverage: Option<f64>,
    loop_closure_weight: Option<f64>,
    refine_pose: Option<bool>,
    minimize_structure: Option<bool>,
    suppress_bp_constraint: Option<f64>,
    chainbreak_weight: Option<f64>,
    linear_chainbreak_weight: Option<f64>,
    tree: Option<TreeKind>,
    rigid_body: Option<RigidBodySettings>,
    loop_closure: Option<LoopClosureSettings>,
    minimizer: Option<MinimizerSettings>,
    history_capacity: Option<usize>,
    seed: Option<u64>,
}

impl FragmentMonteCarloOptionsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rounds(mut self, rounds: usize) -> Self {
        self.rounds = Some(rounds);
        self
    }
    pub fn cycles(mut self, cycles: usize) -> Self {
        self.cycles = Some(cycles);
        self
    }
    pub fn temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }
    pub fn jump_change_frequency(mut self, frequency: f64) -> Self {
        self.jump_change_frequency = Some(frequency);
        self
    }
    pub fn close_loops(mut self, enabled: bool) -> Self {
        self.close_loops = Some(enabled);
        self
    }
    pub fn close_loops_in_last_round(mut self, enabled: bool) -> Self {
        self.close_loops_in_last_round = Some(enabled);
        self
    }
    pub fn close_loops_after_each_move(mut self, enabled: bool) -> Self {
        self.close_loops_after_each_move = Some(enabled);
        self
    }
    pub fn autofilter(mut self, enabled: bool) -> Self {
        self.autofilter = Some(enabled);
        self
    }
    pub fn autofilter_score_quantile(mut self, quantile: f64) -> Self {
        self.autofilter_score_quantile = Some(quantile);
        self
    }
    pub fn titrate_stack_bonus(mut self, enabled: bool) -> Self {
        self.titrate_stack_bonus = Some(enabled);
        self
    }
    pub fn staged_constraints(mut self, enabled: bool) -> Self {
        self.staged_constraints = Some(enabled);
        self
    }
    pub fn filter_chain_closure(mut self, enabled: bool) -> Self {
        self.filter_chain_closure = Some(enabled);
        self
    }
    pub fn filter_chain_closure_distance(mut self, distance: f64) -> Self {
        self.filter_chain_closure_distance = Some(distance);
        self
    }
    pub fn filter_chain_closure_halfway(mut self, enabled: bool) -> Self {
        self.filter_chain_closure_halfway = Some(enabled);
        self
    }
    pub fn filter_lores_base_pairs(mut self, enabled: bool) -> Self {
        self.filter_lores_base_pairs = Some(enabled);
        self
    }
    pub fn filter_lores_base_pairs_early(mut self, enabled: bool) -> Self {
        self.filter_lores_base_pairs_early = Some(enabled);
        self
    }
    pub fn chunk_coverage(mut self, coverage: f64) -> Self {
        self.chunk_coverage = Some(coverage);
        self
    }
    pub fn loop_closure_weight(mut self, weight: f64) -> Self {
        self.loop_closure_weight = Some(weight);
        self
    }
    pub fn refine_pose(mut self, enabled: bool) -> Self {
        self.refine_pose = Some(enabled);
        self
    }
    pub fn minimize_structure(mut self, enabled: bool) -> Self {
        self.minimize_structure = Some(enabled);
        self
    }
    pub fn suppress_bp_constraint(mut self, factor: f64) -> Self {
        self.suppress_bp_constraint = Some(factor);
        self
    }
    pub fn chainbreak_weight(mut self, weight: f64) -> Self {
        self.chainbreak_weight = Some(weight);
        self
    }
    pub fn linear_chainbreak_weight(mut self, weight: f64) -> Self {
        self.linear_chainbreak_weight = Some(weight);
        self
    }
    pub fn tree(mut self, tree: TreeKind) -> Self {
        self.tree = Some(tree);
        self
    }
    pub fn rigid_body(mut self, settings: RigidBodySettings) -> Self {
        self.rigid_body = Some(settings);
        self
    }
    pub fn loop_closure(mut self, settings: LoopClosureSettings) -> Self {
        self.loop_closure = Some(settings);
        self
    }
    pub fn minimizer(mut self, settings: MinimizerSettings) -> Self {
        self.minimizer = Some(settings);
        self
    }
    pub fn history_capacity(mut self, capacity: usize) -> Self {
        self.history_capacity = Some(capacity);
        self
    }
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn build(self) -> Result<FragmentMonteCarloOptions, ConfigError> {
        let defaults = FragmentMonteCarloOptions::default();
        let filter_lores_base_pairs_early = self
            .filter_lores_base_pairs_early
            .unwrap_or(defaults.filter_lores_base_pairs_early);
        let options = FragmentMonteCarloOptions {
            rounds: self.rounds.unwrap_or(defaults.rounds),
            cycles: self.cycles.or(defaults.cycles),
            temperature: self.temperature.unwrap_or(defaults.temperature),
            jump_change_frequency: self
                .jump_change_frequency
                .unwrap_or(defaults.jump_change_frequency),
            close_loops: self.close_loops.unwrap_or(defaults.close_loops),
            close_loops_in_last_round: self
                .close_loops_in_last_round
                .unwrap_or(defaults.close_loops_in_last_round),
            close_loops_after_each_move: self
                .close_loops_after_each_move
                .unwrap_or(defaults.close_loops_after_each_move),
            autofilter: self.autofilter.unwrap_or(defaults.autofilter),
            autofilter_score_quantile: self
                .autofilter_score_quantile
                .unwrap_or(defaults.autofilter_score_quantile),
            titrate_stack_bonus: self
                .titrate_stack_bonus
                .unwrap_or(defaults.titrate_stack_bonus),
            staged_constraints: self
                .staged_constraints
                .unwrap_or(defaults.staged_constraints),
            filter_chain_closure: self
                .filter_chain_closure
                .unwrap_or(defaults.filter_chain_closure),
            filter_chain_closure_distance: self
                .filter_chain_closure_distance
                .unwrap_or(defaults.filter_chain_closure_distance),
            filter_chain_closure_halfway: self
                .filter_chain_closure_halfway
                .unwrap_or(defaults.filter_chain_closure_halfway),
            // The early base-pair filter makes no sense without the final one.
            filter_lores_base_pairs: filter_lores_base_pairs_early
                || self
                    .filter_lores_base_pairs
                    .unwrap_or(defaults.filter_lores_base_pairs),
            filter_lores_base_pairs_early,
            chunk_coverage: self.chunk_coverage.or(defaults.chunk_coverage),
            loop_closure_weight: self
                .loop_closure_weight
                .unwrap_or(defaults.loop_closure_weight),
            refine_pose: self.refine_pose.unwrap_or(defaults.refine_pose),
            minimize_structure: self
                .minimize_structure
                .unwrap_or(defaults.minimize_structure),
            suppress_bp_constraint: self
                .suppress_bp_constraint
                .unwrap_or(defaults.suppress_bp_constraint),
            chainbreak_weight: self.chainbreak_weight.or(defaults.chainbreak_weight),
            linear_chainbreak_weight: self
                .linear_chainbreak_weight
                .or(defaults.linear_chainbreak_weight),
            tree: self.tree.unwrap_or(defaults.tree),
            rigid_body: self.rigid_body.unwrap_or(defaults.rigid_body),
            loop_closure: self.loop_closure.unwrap_or(defaults.loop_closure),
            minimizer: self.minimizer.unwrap_or(defaults.minimizer),
            history_capacity: self.history_capacity.unwrap_or(defaults.history_capacity),
            seed: self.seed.unwrap_or(defaults.seed),
        };
        options.validate()?;
        Ok(options)
    }
}

fn invalid(parameter: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        parameter,
        reason: reason.into(),
    }
}

fn check_fraction(parameter: &'static str, value: f64) -> Result<(), ConfigError> {
    if !(0.0..=1.0).contains(&value) {
        return Err(invalid(parameter, format!("{value} is not in [0, 1]")));
    }
    Ok(())
}

impl FragmentMonteCarloOptions {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rounds == 0 {
            return Err(invalid("rounds", "at least one round is required"));
        }
        if self.cycles == Some(0) {
            return Err(invalid("cycles", "must be positive when given"));
        }
        if !self.temperature.is_finite() || self.temperature < 0.0 {
            return Err(invalid(
                "temperature",
                format!("{} is not a finite non-negative temperature", self.temperature),
            ));
        }
        check_fraction("jump_change_frequency", self.jump_change_frequency)?;
        check_fraction("autofilter_score_quantile", self.autofilter_score_quantile)?;
        if let Some(coverage) = self.chunk_coverage {
            check_fraction("chunk_coverage", coverage)?;
        }
        if self.loop_closure_weight.is_nan() || self.loop_closure_weight < 0.0 {
            return Err(invalid("loop_closure_weight", "must be non-negative"));
        }
        if self.filter_chain_closure_distance.is_nan() || self.filter_chain_closure_distance <= 0.0
        {
            return Err(invalid("filter_chain_closure_distance", "must be positive"));
        }
        if !self.suppress_bp_constraint.is_finite() || self.suppress_bp_constraint < 0.0 {
            return Err(invalid("suppress_bp_constraint", "must be finite and non-negative"));
        }
        let rigid_body = &self.rigid_body;
        if !(rigid_body.rotation_magnitude >= 0.0 && rigid_body.rotation_magnitude.is_finite())
            || !(rigid_body.translation_magnitude >= 0.0
                && rigid_body.translation_magnitude.is_finite())
        {
            return Err(invalid("rigid_body", "magnitudes must be finite and non-negative"));
        }
        let minimizer = &self.minimizer;
        if !(minimizer.min_step > 0.0 && minimizer.min_step <= minimizer.initial_step)
            || !minimizer.initial_step.is_finite()
        {
            return Err(invalid(
                "minimizer",
                "steps must satisfy 0 < min_step <= initial_step",
            ));
        }
        if self.history_capacity == 0 {
            return Err(invalid("history_capacity", "must be at least 1"));
        }
        let loop_closure = &self.loop_closure;
        if loop_closure.window == 0 || !(loop_closure.tolerance > 0.0) {
            return Err(invalid("loop_closure", "window and tolerance must be positive"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_without_overrides_matches_defaults() {
        let options = FragmentMonteCarloOptionsBuilder::new().build().unwrap();
        assert_eq!(options, FragmentMonteCarloOptions::default());
        assert_eq!(options.rounds, 10);
        assert_eq!(options.temperature, 2.0);
        assert_eq!(options.autofilter_score_quantile, 0.20);
        assert!(options.filter_chain_closure_halfway);
        assert_eq!(options.cycles, None);
    }

    #[test]
    fn early_base_pair_filter_implies_final_filter() {
        let options = FragmentMonteCarloOptionsBuilder::new()
            .filter_lores_base_pairs(false)
            .filter_lores_base_pairs_early(true)
            .build()
            .unwrap();
        assert!(options.filter_lores_base_pairs);
    }

    #[test]
    fn build_rejects_out_of_range_values() {
        let cases = [
            (FragmentMonteCarloOptionsBuilder::new().rounds(0), "rounds"),
            (FragmentMonteCarloOptionsBuilder::new().cycles(0), "cycles"),
            (
                FragmentMonteCarloOptionsBuilder::new().temperature(-1.0),
                "temperature",
            ),
            (
                FragmentMonteCarloOptionsBuilder::new().jump_change_frequency(1.5),
                "jump_change_frequency",
            ),
            (
                FragmentMonteCarloOptionsBuilder::new().autofilter_score_quantile(-0.1),
                "autofilter_score_quantile",
            ),
            (
                FragmentMonteCarloOptionsBuilder::new().chunk_coverage(2.0),
                "chunk_coverage",
            ),
            (
                FragmentMonteCarloOptionsBuilder::new().loop_closure_weight(f64::NAN),
                "loop_closure_weight",
            ),
            (
                FragmentMonteCarloOptionsBuilder::new().history_capacity(0),
                "history_capacity",
            ),
            (
                FragmentMonteCarloOptionsBuilder::new().suppress_bp_constraint(-0.5),
                "suppress_bp_constraint",
            ),
            (
                FragmentMonteCarloOptionsBuilder::new().rigid_body(RigidBodySettings {
                    rotation_magnitude: f64::NAN,
                    translation_magnitude: 0.5,
                }),
                "rigid_body",
            ),
            (
                FragmentMonteCarloOptionsBuilder::new().minimizer(MinimizerSettings {
                    min_step: 20.0,
                    ..MinimizerSettings::default()
                }),
                "minimizer",
            ),
        ];
        for (builder, expected) in cases {
            match builder.build() {
                Err(ConfigError::InvalidValue { parameter, .. }) => assert_eq!(parameter, expected),
                other => panic!("expected InvalidValue for {expected}, got {other:?}"),
            }
        }
    }

    #[test]
    fn validate_catches_hand_built_options() {
        let options = FragmentMonteCarloOptions {
            rounds: 0,
            cycles: Some(10),
            ..FragmentMonteCarloOptions::default()
        };
        assert!(matches!(
            options.validate(),
            Err(ConfigError::InvalidValue { parameter: "rounds", .. })
        ));
    }

    #[test]
    fn zero_temperature_is_allowed_for_greedy_runs() {
        let options = FragmentMonteCarloOptionsBuilder::new()
            .temperature(0.0)
            .build()
            .unwrap();
        assert_eq!(options.temperature, 0.0);
    }
}
