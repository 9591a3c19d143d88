use anyhow::Result;
use ci_results_server::config;
use ci_results_server::server::Server;
use tracing_subscriber::{fmt, EnvFilter};

fn init_logging(log_level: &str) {
    let filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    fmt()
        .with_env_filter(filter)
        .json()
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .with_target(true)
        .with_current_span(false)
        .with_span_list(false)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cfg = config::ServerConfig::from_env();
    init_logging(&cfg.log_level);

    tracing::info!(event = "server_start", config = ?cfg);

    Server::run(cfg).await
}
