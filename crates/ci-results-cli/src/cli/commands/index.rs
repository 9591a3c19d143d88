use super::{ci_config_source, ensure_parent_dir, exit_codes, resolve_config};
use crate::cli::args::IndexArgs;
use ci_results_core::config::IndexerConfig;
use ci_results_core::ingest::Indexer;
use ci_results_core::source::TestGridClient;
use ci_results_core::storage::Store;
use std::sync::Arc;

pub async fn cmd_index(args: IndexArgs) -> anyhow::Result<i32> {
    let mut cfg = match resolve_config(&args.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("config error: {e}");
            return Ok(exit_codes::CONFIG_ERROR);
        }
    };
    if !args.dashboards.is_empty() {
        cfg.dashboards = args.dashboards.clone();
    }
    if let Some(n) = args.fetch_workers {
        if n == 0 {
            eprintln!("config error: --fetch-workers must be at least 1");
            return Ok(exit_codes::CONFIG_ERROR);
        }
        cfg.fetch_workers = n;
    }
    if args.deadline_secs.is_some() {
        cfg.deadline_secs = args.deadline_secs;
    }

    if args.print_config {
        print!("{}", serde_yaml::to_string(&cfg)?);
        return Ok(exit_codes::OK);
    }

    match run_index(&args, &cfg).await {
        Ok(()) => Ok(exit_codes::OK),
        Err(e) => {
            eprintln!("index failed, nothing was committed: {e:#}");
            Ok(exit_codes::FAILED)
        }
    }
}

async fn run_index(args: &IndexArgs, cfg: &IndexerConfig) -> anyhow::Result<()> {
    ensure_parent_dir(&args.db.db)?;
    let store = Store::open_with_caches(&args.db.db, &cfg.cache)?;
    store.init_schema()?;

    let tag_source = ci_config_source(cfg, args.no_ci_config).await?;
    let indexer = Indexer {
        store: store.clone(),
        source: Arc::new(TestGridClient::new(cfg.testgrid_url.clone())?),
        labeler: Arc::new(cfg.labeler(tag_source)),
        config: cfg.ingest_config(),
    };

    let report = indexer.run().await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    eprintln!(
        "indexed {} builds ({} results); store now holds {} jobs, {} builds",
        report.builds_persisted,
        report.results_written,
        store.count_rows("jobs")?,
        store.count_rows("builds")?
    );
    Ok(())
}
