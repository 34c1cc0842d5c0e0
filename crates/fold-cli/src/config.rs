use crate::cli::{AutofilterFlags, FoldArgs};
use crate::error::{CliError, Result};
use crate::utils::parser;
use rosetta_fold::core::models::residue::Polymer;
use rosetta_fold::engine::config::{
    FragmentMonteCarloOptions, FragmentMonteCarloOptionsBuilder, LoopClosureSettings,
    RigidBodySettings,
};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;

const DEFAULT_NSTRUCT: usize = 1;
const DEFAULT_FRAGMENT_SIZES: [usize; 3] = [1, 2, 3];

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct PartialTargetConfig {
    sequence: Option<String>,
    fasta: Option<PathBuf>,
    polymer: Option<String>,
    secstruct: Option<String>,
    conservation: Option<Vec<f64>>,
    native: Option<PathBuf>,
    start_pose: Option<PathBuf>,
    ignore_secstruct: Option<bool>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct PartialFragmentConfig {
    vall: Option<PathBuf>,
    sizes: Option<Vec<usize>>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct PartialChunkConfig {
    start: usize,
    stop: usize,
    /// PDB models of the chunk region, one alternative each.
    models: Vec<PathBuf>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct PartialScoringConfig {
    lores_weights: Option<PathBuf>,
    hires_weights: Option<PathBuf>,
    chainbreak_weight: Option<f64>,
    linear_chainbreak_weight: Option<f64>,
    suppress_bp_constraint: Option<f64>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct PartialSamplingConfig {
    nstruct: Option<usize>,
    rounds: Option<usize>,
    cycles: Option<usize>,
    temperature: Option<f64>,
    seed: Option<u64>,
    jump_change_frequency: Option<f64>,
    chunk_coverage: Option<f64>,
    titrate_stack_bonus: Option<bool>,
    staged_constraints: Option<bool>,
    refine_pose: Option<bool>,
    minimize_structure: Option<bool>,
    tree: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct PartialLoopClosureConfig {
    close_loops: Option<bool>,
    in_last_round: Option<bool>,
    after_each_move: Option<bool>,
    weight: Option<f64>,
    window: Option<usize>,
    max_iterations: Option<usize>,
    tolerance: Option<f64>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct PartialRigidBodyConfig {
    rotation_magnitude: Option<f64>,
    translation_magnitude: Option<f64>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct PartialFilterConfig {
    autofilter: Option<bool>,
    autofilter_score_quantile: Option<f64>,
    chain_closure: Option<bool>,
    chain_closure_distance: Option<f64>,
    chain_closure_halfway: Option<bool>,
    lores_base_pairs: Option<bool>,
    lores_base_pairs_early: Option<bool>,
}

/// Run configuration as read from TOML; every field may be missing until merged with
/// the command line.
#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct PartialFoldConfig {
    target: Option<PartialTargetConfig>,
    fragments: Option<PartialFragmentConfig>,
    #[serde(default)]
    chunks: Vec<PartialChunkConfig>,
    scoring: Option<PartialScoringConfig>,
    sampling: Option<PartialSamplingConfig>,
    loop_closure: Option<PartialLoopClosureConfig>,
    rigid_body: Option<PartialRigidBodyConfig>,
    filters: Option<PartialFilterConfig>,
}

/// Where the target sequence comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum SequenceSource {
    Inline(String),
    Fasta(PathBuf),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChunkSpec {
    pub start: usize,
    pub stop: usize,
    pub models: Vec<PathBuf>,
}

/// Fully merged settings of a `fold` run.
#[derive(Debug, Clone)]
pub struct FoldConfig {
    pub output_dir: PathBuf,
    pub sequence: SequenceSource,
    pub polymer: Polymer,
    pub secstruct: Option<String>,
    pub conservation: Option<Vec<f64>>,
    pub native: Option<PathBuf>,
    pub start_pose: Option<PathBuf>,
    pub ignore_secstruct: bool,
    pub vall: Option<PathBuf>,
    pub fragment_sizes: Vec<usize>,
    pub chunks: Vec<ChunkSpec>,
    pub lores_weights: Option<PathBuf>,
    pub hires_weights: Option<PathBuf>,
    pub nstruct: usize,
    pub options: FragmentMonteCarloOptions,
}

fn parse_value<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| CliError::Config(format!("Invalid value for {key}: {value}")))
}

impl PartialFoldConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading configuration from file: {:?}", path);
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })?;
        if let Some(base) = path.parent() {
            config.resolve_relative_paths(base);
        }
        Ok(config)
    }

    /// Paths in a config file are relative to the file itself.
    fn resolve_relative_paths(&mut self, base: &Path) {
        let resolve = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        if let Some(target) = self.target.as_mut() {
            for path in [&mut target.fasta, &mut target.native, &mut target.start_pose]
                .into_iter()
                .flatten()
            {
                resolve(path);
            }
        }
        if let Some(vall) = self.fragments.as_mut().and_then(|f| f.vall.as_mut()) {
            resolve(vall);
        }
        for chunk in &mut self.chunks {
            chunk.models.iter_mut().for_each(resolve);
        }
        if let Some(scoring) = self.scoring.as_mut() {
            for path in [&mut scoring.lores_weights, &mut scoring.hires_weights]
                .into_iter()
                .flatten()
            {
                resolve(path);
            }
        }
    }

    pub fn merge_with_cli(mut self, args: &FoldArgs) -> Result<FoldConfig> {
        self.apply_set_values(&args.set_values)?;

        let target = self.target.take().unwrap_or_default();
        let fragments = self.fragments.take().unwrap_or_default();
        let scoring = self.scoring.take().unwrap_or_default();
        let sampling = self.sampling.take().unwrap_or_default();
        let loops = self.loop_closure.take().unwrap_or_default();
        let rigid = self.rigid_body.take().unwrap_or_default();
        let filters = self.filters.take().unwrap_or_default();

        let sequence = if let Some(sequence) = &args.sequence {
            SequenceSource::Inline(sequence.clone())
        } else if let Some(fasta) = &args.fasta {
            SequenceSource::Fasta(fasta.clone())
        } else if let Some(sequence) = target.sequence {
            SequenceSource::Inline(sequence)
        } else if let Some(fasta) = target.fasta {
            SequenceSource::Fasta(fasta)
        } else {
            return Err(CliError::Config(
                "A target sequence is required: use --sequence, --fasta or `target.sequence`."
                    .to_string(),
            ));
        };

        let polymer = match target.polymer.as_deref() {
            Some(name) => parser::parse_polymer(name).map_err(|e| CliError::Config(e.to_string()))?,
            None => Polymer::default(),
        };

        let mut builder = FragmentMonteCarloOptionsBuilder::new();
        if let Some(rounds) = args.rounds.or(sampling.rounds) {
            builder = builder.rounds(rounds);
        }
        if let Some(cycles) = args.cycles.or(sampling.cycles) {
            builder = builder.cycles(cycles);
        }
        if let Some(temperature) = args.temperature.or(sampling.temperature) {
            builder = builder.temperature(temperature);
        }
        if let Some(seed) = args.seed.or(sampling.seed) {
            builder = builder.seed(seed);
        }
        if let Some(v) = sampling.jump_change_frequency {
            builder = builder.jump_change_frequency(v);
        }
        if let Some(v) = sampling.chunk_coverage {
            builder = builder.chunk_coverage(v);
        }
        if let Some(v) = sampling.titrate_stack_bonus {
            builder = builder.titrate_stack_bonus(v);
        }
        if let Some(v) = sampling.staged_constraints {
            builder = builder.staged_constraints(v);
        }
        if let Some(v) = sampling.refine_pose {
            builder = builder.refine_pose(v);
        }
        if let Some(v) = sampling.minimize_structure {
            builder = builder.minimize_structure(v);
        }
        if let Some(name) = &sampling.tree {
            let tree = parser::parse_tree_kind(name).map_err(|e| CliError::Config(e.to_string()))?;
            builder = builder.tree(tree);
        }
        if let Some(v) = scoring.chainbreak_weight {
            builder = builder.chainbreak_weight(v);
        }
        if let Some(v) = scoring.linear_chainbreak_weight {
            builder = builder.linear_chainbreak_weight(v);
        }
        if let Some(v) = scoring.suppress_bp_constraint {
            builder = builder.suppress_bp_constraint(v);
        }
        builder = Self::merge_loop_closure(builder, &loops);
        builder = Self::merge_rigid_body(builder, &rigid);
        builder = Self::merge_filters(builder, args.autofilter, &filters);

        let options = builder.build().map_err(|e| CliError::Config(e.to_string()))?;

        let chunks = self
            .chunks
            .into_iter()
            .map(|c| ChunkSpec {
                start: c.start,
                stop: c.stop,
                models: c.models,
            })
            .collect();

        Ok(FoldConfig {
            output_dir: args.output.clone(),
            sequence,
            polymer,
            secstruct: args.secstruct.clone().or(target.secstruct),
            conservation: target.conservation,
            native: args.native.clone().or(target.native),
            start_pose: target.start_pose,
            ignore_secstruct: args.ignore_secstruct || target.ignore_secstruct.unwrap_or(false),
            vall: args.fragments.clone().or(fragments.vall),
            fragment_sizes: fragments
                .sizes
                .unwrap_or_else(|| DEFAULT_FRAGMENT_SIZES.to_vec()),
            chunks,
            lores_weights: scoring.lores_weights,
            hires_weights: scoring.hires_weights,
            nstruct: args.nstruct.or(sampling.nstruct).unwrap_or(DEFAULT_NSTRUCT),
            options,
        })
    }

    fn merge_loop_closure(
        mut builder: FragmentMonteCarloOptionsBuilder,
        loops: &PartialLoopClosureConfig,
    ) -> FragmentMonteCarloOptionsBuilder {
        if let Some(v) = loops.close_loops {
            builder = builder.close_loops(v);
        }
        if let Some(v) = loops.in_last_round {
            builder = builder.close_loops_in_last_round(v);
        }
        if let Some(v) = loops.after_each_move {
            builder = builder.close_loops_after_each_move(v);
        }
        if let Some(v) = loops.weight {
            builder = builder.loop_closure_weight(v);
        }
        let defaults = LoopClosureSettings::default();
        builder.loop_closure(LoopClosureSettings {
            window: loops.window.unwrap_or(defaults.window),
            max_iterations: loops.max_iterations.unwrap_or(defaults.max_iterations),
            tolerance: loops.tolerance.unwrap_or(defaults.tolerance),
        })
    }

    fn merge_rigid_body(
        builder: FragmentMonteCarloOptionsBuilder,
        rigid: &PartialRigidBodyConfig,
    ) -> FragmentMonteCarloOptionsBuilder {
        let defaults = RigidBodySettings::default();
        builder.rigid_body(RigidBodySettings {
            rotation_magnitude: rigid.rotation_magnitude.unwrap_or(defaults.rotation_magnitude),
            translation_magnitude: rigid
                .translation_magnitude
                .unwrap_or(defaults.translation_magnitude),
        })
    }

    fn merge_filters(
        mut builder: FragmentMonteCarloOptionsBuilder,
        cli_flags: AutofilterFlags,
        filters: &PartialFilterConfig,
    ) -> FragmentMonteCarloOptionsBuilder {
        if cli_flags.autofilter {
            builder = builder.autofilter(true);
        } else if cli_flags.no_autofilter {
            builder = builder.autofilter(false);
        } else if let Some(v) = filters.autofilter {
            builder = builder.autofilter(v);
        }
        if let Some(v) = filters.autofilter_score_quantile {
            builder = builder.autofilter_score_quantile(v);
        }
        if let Some(v) = filters.chain_closure {
            builder = builder.filter_chain_closure(v);
        }
        if let Some(v) = filters.chain_closure_distance {
            builder = builder.filter_chain_closure_distance(v);
        }
        if let Some(v) = filters.chain_closure_halfway {
            builder = builder.filter_chain_closure_halfway(v);
        }
        if let Some(v) = filters.lores_base_pairs {
            builder = builder.filter_lores_base_pairs(v);
        }
        if let Some(v) = filters.lores_base_pairs_early {
            builder = builder.filter_lores_base_pairs_early(v);
        }
        builder
    }

    fn apply_set_values(&mut self, set_values: &[String]) -> Result<()> {
        for kv_pair in set_values {
            let (key, value) = kv_pair.split_once('=').ok_or_else(|| {
                CliError::Config(format!(
                    "Invalid --set format: '{kv_pair}'. Expected KEY=VALUE."
                ))
            })?;
            let (key, value) = (key.trim(), value.trim());

            match key {
                "target.sequence" => {
                    self.target.get_or_insert_with(Default::default).sequence =
                        Some(value.to_string());
                }
                "target.secstruct" => {
                    self.target.get_or_insert_with(Default::default).secstruct =
                        Some(value.to_string());
                }
                "target.polymer" => {
                    self.target.get_or_insert_with(Default::default).polymer =
                        Some(value.to_string());
                }
                "sampling.nstruct" => {
                    self.sampling.get_or_insert_with(Default::default).nstruct =
                        Some(parse_value(key, value)?);
                }
                "sampling.rounds" => {
                    self.sampling.get_or_insert_with(Default::default).rounds =
                        Some(parse_value(key, value)?);
                }
                "sampling.cycles" => {
                    self.sampling.get_or_insert_with(Default::default).cycles =
                        Some(parse_value(key, value)?);
                }
                "sampling.temperature" => {
                    self.sampling.get_or_insert_with(Default::default).temperature =
                        Some(parse_value(key, value)?);
                }
                "sampling.seed" => {
                    self.sampling.get_or_insert_with(Default::default).seed =
                        Some(parse_value(key, value)?);
                }
                "sampling.jump-change-frequency" => {
                    self.sampling.get_or_insert_with(Default::default).jump_change_frequency =
                        Some(parse_value(key, value)?);
                }
                "sampling.chunk-coverage" => {
                    self.sampling.get_or_insert_with(Default::default).chunk_coverage =
                        Some(parse_value(key, value)?);
                }
                "sampling.staged-constraints" => {
                    self.sampling.get_or_insert_with(Default::default).staged_constraints =
                        Some(parse_value(key, value)?);
                }
                "sampling.minimize-structure" => {
                    self.sampling.get_or_insert_with(Default::default).minimize_structure =
                        Some(parse_value(key, value)?);
                }
                "scoring.suppress-bp-constraint" => {
                    self.scoring.get_or_insert_with(Default::default).suppress_bp_constraint =
                        Some(parse_value(key, value)?);
                }
                "sampling.tree" => {
                    let sampling = self.sampling.get_or_insert_with(Default::default);
                    sampling.tree = Some(value.to_string());
                }
                "loop-closure.close-loops" => {
                    self.loop_closure.get_or_insert_with(Default::default).close_loops =
                        Some(parse_value(key, value)?);
                }
                "loop-closure.weight" => {
                    self.loop_closure.get_or_insert_with(Default::default).weight =
                        Some(parse_value(key, value)?);
                }
                "filters.autofilter" => {
                    self.filters.get_or_insert_with(Default::default).autofilter =
                        Some(parse_value(key, value)?);
                }
                "filters.autofilter-score-quantile" => {
                    self.filters.get_or_insert_with(Default::default).autofilter_score_quantile =
                        Some(parse_value(key, value)?);
                }
                "filters.chain-closure" => {
                    self.filters.get_or_insert_with(Default::default).chain_closure =
                        Some(parse_value(key, value)?);
                }
                "filters.chain-closure-distance" => {
                    self.filters.get_or_insert_with(Default::default).chain_closure_distance =
                        Some(parse_value(key, value)?);
                }
                "filters.chain-closure-halfway" => {
                    self.filters.get_or_insert_with(Default::default).chain_closure_halfway =
                        Some(parse_value(key, value)?);
                }
                _ => {
                    return Err(CliError::Config(format!(
                        "Unsupported configuration key for --set: '{key}'"
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Commands};
    use clap::Parser;
    use rosetta_fold::engine::config::TreeKind;
    use std::fs;
    use tempfile::TempDir;

    fn write_config(dir: &TempDir, content: &str) -> PathBuf {
        let path = dir.path().join("fold.toml");
        fs::write(&path, content).unwrap();
        path
    }

    fn fold_args(extra: &[&str]) -> FoldArgs {
        let mut args = vec!["rfold", "fold", "-o", "out"];
        args.extend_from_slice(extra);
        match Cli::parse_from(args).command {
            Commands::Fold(args) => args,
            other => panic!("Expected 'fold' subcommand, got {other:?}"),
        }
    }

    #[test]
    fn file_values_fill_the_options() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            &dir,
            r#"
            [target]
            sequence = "ggggaaaacccc"
            secstruct = "((((....))))"
            native = "native.pdb"

            [sampling]
            nstruct = 4
            rounds = 5
            temperature = 1.5
            tree = "star"
            minimize-structure = true

            [scoring]
            suppress-bp-constraint = 0.25

            [loop-closure]
            window = 3

            [filters]
            chain-closure-distance = 4.0

            [[chunks]]
            start = 1
            stop = 4
            models = ["helix.pdb"]
            "#,
        );
        let config = PartialFoldConfig::from_file(&path)
            .unwrap()
            .merge_with_cli(&fold_args(&[]))
            .unwrap();

        assert_eq!(config.sequence, SequenceSource::Inline("ggggaaaacccc".to_string()));
        assert_eq!(config.nstruct, 4);
        assert_eq!(config.options.rounds, 5);
        assert_eq!(config.options.temperature, 1.5);
        assert_eq!(config.options.tree, TreeKind::Star);
        assert_eq!(config.options.loop_closure.window, 3);
        assert!(config.options.minimize_structure);
        assert_eq!(config.options.suppress_bp_constraint, 0.25);
        assert_eq!(config.options.filter_chain_closure_distance, 4.0);
        assert_eq!(config.native, Some(dir.path().join("native.pdb")));
        assert_eq!(config.chunks[0].models, vec![dir.path().join("helix.pdb")]);
        assert_eq!(config.fragment_sizes, vec![1, 2, 3]);
        assert!(!config.options.autofilter);
    }

    #[test]
    fn cli_arguments_override_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            &dir,
            r#"
            [target]
            sequence = "gggg"

            [sampling]
            nstruct = 4
            seed = 1

            [filters]
            autofilter = false
            "#,
        );
        let args = fold_args(&["-s", "cccc", "-n", "9", "--seed", "17", "--autofilter"]);
        let config = PartialFoldConfig::from_file(&path)
            .unwrap()
            .merge_with_cli(&args)
            .unwrap();
        assert_eq!(config.sequence, SequenceSource::Inline("cccc".to_string()));
        assert_eq!(config.nstruct, 9);
        assert_eq!(config.options.seed, 17);
        assert!(config.options.autofilter);
    }

    #[test]
    fn set_values_override_file_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            &dir,
            r#"
            [target]
            sequence = "gggg"

            [sampling]
            rounds = 4
            "#,
        );
        let args = fold_args(&[
            "-S",
            "sampling.rounds=8",
            "-S",
            "filters.chain-closure=false",
            "-S",
            "sampling.tree=simple",
            "-S",
            "scoring.suppress-bp-constraint=0",
        ]);
        let config = PartialFoldConfig::from_file(&path)
            .unwrap()
            .merge_with_cli(&args)
            .unwrap();
        assert_eq!(config.options.rounds, 8);
        assert!(!config.options.filter_chain_closure);
        assert_eq!(config.options.tree, TreeKind::Simple);
        assert_eq!(config.options.suppress_bp_constraint, 0.0);
    }

    #[test]
    fn invalid_input_is_reported_as_config_errors() {
        let missing_sequence = PartialFoldConfig::default().merge_with_cli(&fold_args(&[]));
        assert!(matches!(missing_sequence, Err(CliError::Config(msg)) if msg.contains("sequence")));

        let bad_key =
            PartialFoldConfig::default().merge_with_cli(&fold_args(&["-S", "sampling.speed=3"]));
        assert!(matches!(bad_key, Err(CliError::Config(msg)) if msg.contains("sampling.speed")));

        let bad_value = PartialFoldConfig::default()
            .merge_with_cli(&fold_args(&["-s", "gggg", "-S", "sampling.rounds=many"]));
        assert!(matches!(bad_value, Err(CliError::Config(_))));

        let out_of_range = PartialFoldConfig::default().merge_with_cli(&fold_args(&[
            "-s",
            "gggg",
            "-S",
            "filters.autofilter-score-quantile=2",
        ]));
        assert!(matches!(out_of_range, Err(CliError::Config(_))));

        let negative_scale = PartialFoldConfig::default().merge_with_cli(&fold_args(&[
            "-s",
            "gggg",
            "-S",
            "scoring.suppress-bp-constraint=-1",
        ]));
        assert!(matches!(negative_scale, Err(CliError::Config(_))));
    }

    #[test]
    fn unknown_fields_in_the_file_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "[sampling]\nspeed = 3\n");
        assert!(matches!(
            PartialFoldConfig::from_file(&path),
            Err(CliError::FileParsing { .. })
        ));
    }
}
