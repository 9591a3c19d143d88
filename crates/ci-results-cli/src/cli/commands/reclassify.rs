use super::{ci_config_source, exit_codes, resolve_config};
use crate::cli::args::ReclassifyArgs;
use ci_results_core::storage::Store;

pub async fn cmd_reclassify(args: ReclassifyArgs) -> anyhow::Result<i32> {
    let cfg = match resolve_config(&args.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("config error: {e}");
            return Ok(exit_codes::CONFIG_ERROR);
        }
    };

    let store = Store::open(&args.db.db)?;
    store.init_schema()?;
    let labeler = cfg.labeler(ci_config_source(&cfg, args.no_ci_config).await?);
    let n = store.reclassify_jobs(&labeler)?;
    eprintln!("reclassified {n} jobs");
    Ok(exit_codes::OK)
}
