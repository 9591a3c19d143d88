use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "ci-results",
    version,
    about = "Collect periodic CI job results and report pass rates over time"
)]
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Fetch results from TestGrid and store them
    Index(IndexArgs),
    /// Print grouped pass/flake/fail counts as JSON
    Stats(StatsArgs),
    /// Print all known test names as a JSON array
    ListTests(DbArgs),
    /// Recompute job classifications and tags with the current rules
    Reclassify(ReclassifyArgs),
    Version,
}

#[derive(Parser, Clone)]
pub struct DbArgs {
    #[arg(long, env = "CI_RESULTS_DB", default_value = "results.db")]
    pub db: PathBuf,
}

#[derive(Parser, Clone)]
pub struct IndexArgs {
    /// indexer config (YAML); built-in defaults when omitted
    #[arg(long)]
    pub config: Option<PathBuf>,

    #[command(flatten)]
    pub db: DbArgs,

    /// index only these dashboards (repeatable)
    #[arg(long = "dashboard")]
    pub dashboards: Vec<String>,

    #[arg(long)]
    pub fetch_workers: Option<usize>,

    /// abort and roll back after this many seconds
    #[arg(long)]
    pub deadline_secs: Option<u64>,

    /// skip downloading CI configs (no x-platform-/x-test- tags)
    #[arg(long)]
    pub no_ci_config: bool,

    /// print the effective config as YAML and exit
    #[arg(long)]
    pub print_config: bool,
}

#[derive(Parser, Clone)]
pub struct StatsArgs {
    #[command(flatten)]
    pub db: DbArgs,

    /// comma-separated: sippytags|name|dashboard|test|platform|mod|testtype
    #[arg(long, default_value = "sippytags")]
    pub columns: String,

    /// space-separated tags; prefix with '-' to exclude
    #[arg(long, default_value = "")]
    pub filter: String,

    /// comma-separated day counts, most recent window first
    #[arg(long, default_value = "7,7")]
    pub periods: String,

    /// pin the status column to this test
    #[arg(long, default_value = "")]
    pub testname: String,

    #[arg(long)]
    pub pretty: bool,
}

#[derive(Parser, Clone)]
pub struct ReclassifyArgs {
    #[arg(long)]
    pub config: Option<PathBuf>,

    #[command(flatten)]
    pub db: DbArgs,

    #[arg(long)]
    pub no_ci_config: bool,
}
