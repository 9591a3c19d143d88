use super::args::*;
use ci_results_core::classify::{CiConfigTagger, JobTagSource};
use ci_results_core::config::{load_config, IndexerConfig};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

pub mod index;
pub mod reclassify;
pub mod stats;

pub mod exit_codes {
    pub const OK: i32 = 0;
    /// Ingestion aborted, or a storage or network failure.
    pub const FAILED: i32 = 1;
    /// Bad config file or request arguments.
    pub const CONFIG_ERROR: i32 = 2;
}

pub async fn dispatch(cli: Cli) -> anyhow::Result<i32> {
    match cli.cmd {
        Command::Index(args) => index::cmd_index(args).await,
        Command::Stats(args) => stats::cmd_stats(args).await,
        Command::ListTests(args) => stats::cmd_list_tests(args).await,
        Command::Reclassify(args) => reclassify::cmd_reclassify(args).await,
        Command::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(exit_codes::OK)
        }
    }
}

/// Config file when given, built-in defaults otherwise.
fn resolve_config(path: &Option<PathBuf>) -> anyhow::Result<IndexerConfig> {
    match path {
        Some(p) => load_config(p).map_err(|e| anyhow::anyhow!(e)),
        None => Ok(IndexerConfig::default()),
    }
}

async fn ci_config_source(
    cfg: &IndexerConfig,
    skip: bool,
) -> anyhow::Result<Option<Arc<dyn JobTagSource>>> {
    if skip {
        tracing::info!(event = "ci_config_skipped");
        return Ok(None);
    }
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(60))
        .build()?;
    let tagger = CiConfigTagger::download(&client, &cfg.ci_config).await?;
    Ok(Some(Arc::new(tagger)))
}

fn ensure_parent_dir(path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}
