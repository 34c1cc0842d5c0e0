use crate::cli::FoldArgs;
use crate::config::{FoldConfig, PartialFoldConfig, SequenceSource};
use crate::error::{CliError, Result};
use crate::utils::parser;
use crate::utils::progress::CliProgressHandler;
use rosetta_fold::core::fragments::{ChunkLibrary, ChunkSet, FragmentLibrary};
use rosetta_fold::core::io::pdb::{PdbFile, PdbMetadata};
use rosetta_fold::core::io::report::{ScoreRecord, write_score_table};
use rosetta_fold::core::io::traits::StructureFile;
use rosetta_fold::core::models::chunk::Chunk;
use rosetta_fold::core::models::pose::Pose;
use rosetta_fold::core::scoring::ScoreFunction;
use rosetta_fold::engine::error::EngineError;
use rosetta_fold::engine::progress::ProgressReporter;
use rosetta_fold::engine::state::TrajectoryResult;
use rosetta_fold::workflows::denovo::{self, DenovoConfigBuilder, DenovoTarget};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

const SCORE_TABLE: &str = "scores.csv";

pub fn run(args: FoldArgs) -> Result<()> {
    let partial = match &args.config {
        Some(path) => PartialFoldConfig::from_file(path)?,
        None => PartialFoldConfig::default(),
    };
    info!("Merging configuration from file and CLI arguments...");
    let config = partial.merge_with_cli(&args)?;

    let target = load_target(&config)?;
    let mut builder = DenovoConfigBuilder::new()
        .nstruct(config.nstruct)
        .options(config.options.clone())
        .ignore_secstruct(config.ignore_secstruct);
    builder = builder.lores_scorefxn(match &config.lores_weights {
        Some(path) => load_weights(path)?,
        None => ScoreFunction::lores(),
    });
    builder = builder.hires_scorefxn(match &config.hires_weights {
        Some(path) => load_weights(path)?,
        None => ScoreFunction::hires(),
    });
    let denovo_config = builder
        .build()
        .map_err(|e| CliError::Config(e.to_string()))?;

    let progress_handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    println!(
        "Assembling {} model(s) of a {}-residue target...",
        config.nstruct,
        target.sequence.len()
    );
    let result = denovo::run(&target, &denovo_config, &reporter)?;

    std::fs::create_dir_all(&config.output_dir)?;
    let mut records = Vec::with_capacity(result.trajectories.len());
    for (index, trajectory) in result.trajectories.iter().enumerate() {
        let name = model_name(index);
        if trajectory.outcome.is_completed() {
            let path = config.output_dir.join(format!("{name}.pdb"));
            write_model(&path, trajectory)?;
        }
        records.push(score_record(name, index, trajectory));
    }
    let table = config.output_dir.join(SCORE_TABLE);
    write_score_table(&table, &records)?;
    info!("Score table written to {:?}", &table);

    let filtered = result.num_filtered();
    if filtered > 0 {
        println!("{filtered} trajectory(ies) were filtered and not written.");
    }
    match result.ranked().first() {
        Some(best) => {
            let index = result
                .trajectories
                .iter()
                .position(|t| std::ptr::eq(t, *best))
                .unwrap_or_default();
            println!(
                "✓ Best model {} (score {:.3}) written to: {}",
                model_name(index),
                best.hires_score.or(best.final_lores_score).unwrap_or(f64::NAN),
                config.output_dir.display()
            );
        }
        None => {
            warn!("Every trajectory was filtered; no models were written.");
            println!("Warning: every trajectory was filtered; no models were written.");
        }
    }
    Ok(())
}

fn model_name(index: usize) -> String {
    format!("model_{:04}", index + 1)
}

fn load_weights(path: &Path) -> Result<ScoreFunction> {
    ScoreFunction::from_weights_file(path).map_err(|e| CliError::FileParsing {
        path: path.to_path_buf(),
        source: e.into(),
    })
}

fn read_pdb(path: &Path) -> Result<Pose> {
    PdbFile::read_from_path(path)
        .map(|(pose, _)| pose)
        .map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })
}

fn load_target(config: &FoldConfig) -> Result<DenovoTarget> {
    let sequence = match &config.sequence {
        SequenceSource::Inline(sequence) => sequence.clone(),
        SequenceSource::Fasta(path) => {
            let content = std::fs::read_to_string(path)?;
            parser::parse_fasta(&content).map_err(|e| CliError::FileParsing {
                path: path.clone(),
                source: e.into(),
            })?
        }
    };

    let fragments = match &config.vall {
        Some(path) => {
            info!("Loading fragments from {:?}", path);
            FragmentLibrary::from_vall_path(path, &config.fragment_sizes).map_err(|e| {
                CliError::FileParsing {
                    path: path.clone(),
                    source: e.into(),
                }
            })?
        }
        None => {
            info!("Using the built-in ideal fragment library.");
            FragmentLibrary::ideal(&config.fragment_sizes)
        }
    };

    let mut target = DenovoTarget::new(sequence, config.polymer, Arc::new(fragments));
    target.secstruct = config.secstruct.clone();
    target.conservation = config.conservation.clone();
    target.chunks = Arc::new(load_chunks(config)?);
    target.native = config.native.as_deref().map(read_pdb).transpose()?;
    target.start_pose = config.start_pose.as_deref().map(read_pdb).transpose()?;
    Ok(target)
}

fn load_chunks(config: &FoldConfig) -> Result<ChunkLibrary> {
    let mut library = ChunkLibrary::new();
    for entry in &config.chunks {
        let chunk = Chunk::new(entry.start, entry.stop)
            .map_err(|e| CliError::Config(format!("chunk {}-{}: {e}", entry.start, entry.stop)))?;
        let models = entry
            .models
            .iter()
            .map(|path| read_pdb(path))
            .collect::<Result<Vec<Pose>>>()?;
        let set = ChunkSet::from_models(chunk, &models).map_err(EngineError::from)?;
        library.add(set).map_err(EngineError::from)?;
        info!(%chunk, alternatives = models.len(), "Loaded chunk models.");
    }
    Ok(library)
}

fn write_model(path: &Path, trajectory: &TrajectoryResult) -> Result<()> {
    let mut remarks = vec![format!("seed {}", trajectory.seed)];
    if let Some(score) = trajectory.final_lores_score {
        remarks.push(format!("lores_score {score:.3}"));
    }
    if let Some(score) = trajectory.hires_score {
        remarks.push(format!("hires_score {score:.3}"));
    }
    if let Some(rmsd) = trajectory.rmsd {
        remarks.push(format!("rmsd {rmsd:.3}"));
    }
    let metadata = PdbMetadata { remarks };
    PdbFile::write_to_path(&trajectory.pose, &metadata, path).map_err(|source| {
        CliError::ModelWrite {
            path: path.to_path_buf(),
            source,
        }
    })
}

fn score_record(model: String, index: usize, trajectory: &TrajectoryResult) -> ScoreRecord {
    ScoreRecord {
        model,
        trajectory: index,
        seed: trajectory.seed,
        outcome: trajectory.outcome.to_string(),
        early_lores: trajectory.early_lores_score,
        final_lores: trajectory.final_lores_score,
        hires: trajectory.hires_score,
        rmsd: trajectory.rmsd,
        base_pairs_recovered: trajectory.base_pairs.map(|b| b.recovered),
        base_pairs_native: trajectory.base_pairs.map(|b| b.native),
        trials: trajectory.counters.total_trials(),
        accepted: trajectory.counters.total_accepted(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Commands};
    use clap::Parser;
    use rosetta_fold::core::io::report::read_score_table;

    fn fold_args(args: &[&str]) -> FoldArgs {
        let mut argv = vec!["rfold", "fold"];
        argv.extend_from_slice(args);
        match Cli::parse_from(argv).command {
            Commands::Fold(args) => args,
            other => panic!("Expected 'fold' subcommand, got {other:?}"),
        }
    }

    #[test]
    fn fold_writes_models_and_a_score_table() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("models");
        let args = fold_args(&[
            "-o",
            out.to_str().unwrap(),
            "-s",
            "ggggaaaacccc",
            "--secstruct",
            "((((....))))",
            "-n",
            "2",
            "--rounds",
            "2",
            "--cycles",
            "20",
            "-S",
            "filters.chain-closure=false",
            "-S",
            "filters.chain-closure-halfway=false",
        ]);
        run(args).unwrap();

        assert!(out.join("model_0001.pdb").exists());
        assert!(out.join("model_0002.pdb").exists());
        let records = read_score_table(&out.join(SCORE_TABLE)).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].model, "model_0001");
        assert_eq!(records[1].seed, 1);
        assert_eq!(records[0].outcome, "completed");
        assert_eq!(records[0].trials, 20);

        let (model, metadata) = PdbFile::read_from_path(out.join("model_0001.pdb")).unwrap();
        assert_eq!(model.total_residue(), 12);
        assert!(metadata.remarks.iter().any(|r| r.starts_with("hires_score")));
    }

    #[test]
    fn fasta_targets_are_read_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let fasta = dir.path().join("target.fa");
        std::fs::write(&fasta, ">hairpin\ngggg\naaaacccc\n").unwrap();
        let args = fold_args(&["-o", "unused", "--fasta", fasta.to_str().unwrap()]);
        let config = PartialFoldConfig::default().merge_with_cli(&args).unwrap();
        let target = load_target(&config).unwrap();
        assert_eq!(target.sequence, "ggggaaaacccc");
        assert!(target.chunks.is_empty());
    }

    #[test]
    fn missing_chunk_models_are_parse_errors() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("fold.toml");
        std::fs::write(
            &config_path,
            concat!(
                "[target]\nsequence = \"ggggaaaacccc\"\n\n",
                "[[chunks]]\nstart = 1\nstop = 4\nmodels = [\"missing.pdb\"]\n",
            ),
        )
        .unwrap();
        let args = fold_args(&["-o", "unused", "-c", config_path.to_str().unwrap()]);
        let config = PartialFoldConfig::from_file(&config_path)
            .unwrap()
            .merge_with_cli(&args)
            .unwrap();
        assert!(matches!(
            load_target(&config),
            Err(CliError::FileParsing { .. })
        ));
    }
}
