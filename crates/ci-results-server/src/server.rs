use crate::cache::StatsCache;
use crate::config::ServerConfig;
use crate::routes::{router, AppState};
use anyhow::{Context, Result};
use ci_results_core::storage::Store;
use std::time::Duration;

pub struct Server;

impl Server {
    pub async fn run(cfg: ServerConfig) -> Result<()> {
        let store = Store::open(&cfg.db_path)?;
        store.init_schema()?;

        let state = AppState {
            store,
            cache: StatsCache::new(cfg.cache_entries, Duration::from_secs(cfg.cache_ttl_secs)),
        };

        let listener = tokio::net::TcpListener::bind(cfg.listen)
            .await
            .with_context(|| format!("failed to bind {}", cfg.listen))?;
        tracing::info!(event = "server_listening", addr = %cfg.listen, db = %cfg.db_path.display());

        let max_uptime = cfg.max_uptime_secs.map(Duration::from_secs);
        axum::serve(listener, router(state))
            .with_graceful_shutdown(shutdown_signal(max_uptime))
            .await
            .context("http server error")?;

        tracing::info!(event = "server_stopped");
        Ok(())
    }
}

async fn shutdown_signal(max_uptime: Option<Duration>) {
    let uptime = async {
        match max_uptime {
            Some(d) => tokio::time::sleep(d).await,
            None => std::future::pending::<()>().await,
        }
    };
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!(event = "shutdown", reason = "interrupt");
        }
        _ = uptime => {
            tracing::info!(event = "shutdown", reason = "max_uptime");
        }
    }
}
