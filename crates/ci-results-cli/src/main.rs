use clap::Parser;

mod cli;

use cli::args::Cli;
use cli::commands::{dispatch, exit_codes};
use tracing_subscriber::EnvFilter;

fn init_logging() {
    let filter = std::env::var("CI_RESULTS_LOG")
        .ok()
        .and_then(|v| EnvFilter::try_new(v).ok())
        .unwrap_or_else(|| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main(flavor = "multi_thread")]
async fn main() {
    let cli = Cli::parse();
    init_logging();

    let code = match dispatch(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("fatal: {e:?}");
            exit_codes::FAILED
        }
    };
    std::process::exit(code);
}
