use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    author = "Rosetta Fold Developers",
    version,
    about = "rfold - coarse-grained fragment assembly of RNA and protein chains.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Number of trajectories run in parallel.
    /// Defaults to the number of available logical cores.
    #[arg(short = 'j', long, global = true, value_name = "NUM")]
    pub threads: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Assemble models of a sequence from fragments and chunks.
    Fold(FoldArgs),
    /// Build the star fold tree for a set of chunks and print it.
    Tree(TreeArgs),
}

/// Arguments for the `fold` subcommand.
#[derive(Args, Debug)]
pub struct FoldArgs {
    // --- Core Arguments ---
    /// Directory that receives the models and the score table.
    #[arg(short, long, required = true, value_name = "DIR")]
    pub output: PathBuf,

    /// Path to the run configuration in TOML format.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    // --- Target Overrides ---
    /// Target sequence, overriding `target.sequence`.
    #[arg(short, long, value_name = "SEQUENCE", conflicts_with = "fasta")]
    pub sequence: Option<String>,

    /// FASTA file holding the target sequence.
    #[arg(long, value_name = "PATH")]
    pub fasta: Option<PathBuf>,

    /// Dot-bracket secondary structure of the target.
    #[arg(long, value_name = "DOT_BRACKET")]
    pub secstruct: Option<String>,

    /// Reference structure (PDB) for RMSD and base-pair recovery.
    #[arg(long, value_name = "PATH")]
    pub native: Option<PathBuf>,

    /// Torsion database in vall format; the built-in ideal library is used otherwise.
    #[arg(long, value_name = "PATH")]
    pub fragments: Option<PathBuf>,

    /// Do not turn secondary-structure pairs into constraints.
    #[arg(long)]
    pub ignore_secstruct: bool,

    // --- Sampling Overrides ---
    /// Number of models to build.
    #[arg(short, long, value_name = "INT")]
    pub nstruct: Option<usize>,

    /// Number of Monte Carlo rounds.
    #[arg(long, value_name = "INT")]
    pub rounds: Option<usize>,

    /// Total Monte Carlo trials per trajectory.
    #[arg(long, value_name = "INT")]
    pub cycles: Option<usize>,

    /// Seed of the first trajectory; trajectory i uses seed + i.
    #[arg(long, value_name = "INT")]
    pub seed: Option<u64>,

    /// Metropolis temperature; 0 gives greedy descent.
    #[arg(short, long, value_name = "FLOAT")]
    pub temperature: Option<f64>,

    /// Override `filters.autofilter` from the config file.
    #[command(flatten)]
    pub autofilter: AutofilterFlags,

    /// Set a specific configuration value, overriding the config file.
    /// Can be used multiple times. Example: -S sampling.rounds=5
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", num_args(0..))]
    pub set_values: Vec<String>,
}

/// Mutually exclusive switches for the score autofilter.
#[derive(Args, Debug, Clone, Copy)]
#[group(required = false, multiple = false)]
pub struct AutofilterFlags {
    /// Drop trajectories whose early score is worse than most earlier ones.
    #[arg(long)]
    pub autofilter: bool,
    /// Keep every trajectory regardless of its early score.
    #[arg(long)]
    pub no_autofilter: bool,
}

/// Arguments for the `tree` subcommand.
#[derive(Args, Debug)]
pub struct TreeArgs {
    /// Sequence of the pose.
    #[arg(short, long, required = true, value_name = "SEQUENCE")]
    pub sequence: String,

    /// Chunk as START-STOP (1-based, inclusive). Can be used multiple times.
    #[arg(short = 'k', long = "chunk", value_name = "START-STOP", required = true)]
    pub chunks: Vec<String>,

    /// Dot-bracket secondary structure used to place cutpoints in loops.
    #[arg(long, value_name = "DOT_BRACKET")]
    pub secstruct: Option<String>,

    /// Treat the sequence as protein instead of RNA.
    #[arg(long)]
    pub protein: bool,

    /// Seed for anchor selection.
    #[arg(long, default_value_t = 0, value_name = "INT")]
    pub seed: u64,
}
