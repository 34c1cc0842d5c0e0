use crate::cli::TreeArgs;
use crate::error::{CliError, Result};
use crate::utils::parser;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rosetta_fold::core::models::chunk::Chunk;
use rosetta_fold::core::models::pose::{Pose, PoseError};
use rosetta_fold::core::models::residue::Polymer;
use rosetta_fold::core::models::secstruct::SecondaryStructure;
use rosetta_fold::engine::error::EngineError;
use rosetta_fold::engine::tree::{StarTreeBuilder, TreeBuilder};
use std::fmt::Write;
use tracing::info;

/// Star tree layout for a pose, as printed by `rfold tree`.
#[derive(Debug, Clone, PartialEq)]
pub struct TreeReport {
    pub virtual_res: usize,
    pub jumps: Vec<(usize, usize)>,
    pub cutpoints: Vec<usize>,
    pub fold_tree: String,
}

impl TreeReport {
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Virtual root: {}", self.virtual_res);
        for (n, (upstream, downstream)) in self.jumps.iter().enumerate() {
            let _ = writeln!(out, "Jump {}: {} -> {}", n + 1, upstream, downstream);
        }
        let cuts: Vec<String> = self.cutpoints.iter().map(ToString::to_string).collect();
        let _ = writeln!(out, "Cutpoints: {}", cuts.join(" "));
        let _ = write!(out, "{}", self.fold_tree);
        out
    }
}

pub fn build_report(args: &TreeArgs) -> Result<TreeReport> {
    let polymer = if args.protein {
        Polymer::Protein
    } else {
        Polymer::Rna
    };
    let mut pose = Pose::from_sequence(&args.sequence, polymer).map_err(EngineError::from)?;
    if let Some(dot_bracket) = &args.secstruct {
        let secstruct = SecondaryStructure::from_dot_bracket(dot_bracket)
            .map_err(|e| EngineError::from(PoseError::from(e)))?;
        pose.set_secstruct(secstruct).map_err(EngineError::from)?;
    }

    let chunks = args
        .chunks
        .iter()
        .map(|range| {
            let (start, stop) =
                parser::parse_chunk_range(range).map_err(|e| CliError::Argument(e.to_string()))?;
            Chunk::new(start, stop).map_err(|e| CliError::Argument(format!("{range}: {e}")))
        })
        .collect::<Result<Vec<Chunk>>>()?;

    let mut builder = StarTreeBuilder::new();
    let mut rng = StdRng::seed_from_u64(args.seed);
    builder
        .set_up(&chunks, &mut pose, &mut rng)
        .map_err(EngineError::from)?;

    let tree = pose.fold_tree();
    let virtual_res = builder
        .virtual_res()
        .ok_or_else(|| CliError::Other(anyhow::anyhow!("star tree has no virtual root")))?;
    info!(virtual_res, jumps = tree.num_jump(), "Star tree built.");
    Ok(TreeReport {
        virtual_res,
        jumps: tree.jumps().to_vec(),
        cutpoints: tree.cutpoints().to_vec(),
        fold_tree: tree.to_string(),
    })
}

pub fn run(args: TreeArgs) -> Result<()> {
    let report = build_report(&args)?;
    println!("{}", report.render());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Commands};
    use clap::Parser;

    fn tree_args(args: &[&str]) -> TreeArgs {
        let mut argv = vec!["rfold", "tree"];
        argv.extend_from_slice(args);
        match Cli::parse_from(argv).command {
            Commands::Tree(args) => args,
            other => panic!("Expected 'tree' subcommand, got {other:?}"),
        }
    }

    #[test]
    fn three_chunks_give_the_expected_star() {
        let args = tree_args(&[
            "-s",
            "ggcgcaagccgcgaaagcgcuua",
            "-k",
            "1-5",
            "-k",
            "10-16",
            "-k",
            "20-23",
        ]);
        let report = build_report(&args).unwrap();
        assert_eq!(report.virtual_res, 24);
        assert_eq!(report.jumps, vec![(24, 3), (24, 13), (24, 21)]);
        assert_eq!(report.cutpoints, vec![8, 17, 23]);
        let rendered = report.render();
        assert!(rendered.starts_with("Virtual root: 24\nJump 1: 24 -> 3\n"));
        assert!(rendered.contains("Cutpoints: 8 17 23"));
        assert!(rendered.contains("FOLD_TREE"));
    }

    #[test]
    fn malformed_chunks_are_argument_errors() {
        let args = tree_args(&["-s", "gggg", "-k", "3"]);
        assert!(matches!(build_report(&args), Err(CliError::Argument(_))));
        let args = tree_args(&["-s", "gggg", "-k", "3-2"]);
        assert!(matches!(build_report(&args), Err(CliError::Argument(_))));
    }

    #[test]
    fn overlapping_chunks_fail_tree_setup() {
        let args = tree_args(&["-s", "gggggggg", "-k", "1-4", "-k", "3-6"]);
        assert!(matches!(
            build_report(&args),
            Err(CliError::FoldCore(EngineError::Tree(_)))
        ));
    }
}
