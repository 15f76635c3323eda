use anyhow::Context;
use clap::Parser;
use grepd_engine::DirSearcher;
use grepd_engine::EngineConfig;
use grepd_server::AppState;
use grepd_server::run_daemon;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "grepd",
    about = "Substring search over a directory of documents, served over HTTP"
)]
struct Args {
    /// Directory holding the searchable documents
    #[arg(long, default_value = "data")]
    root: PathBuf,

    /// Maximum concurrent file scans per search (defaults to the CPU count)
    #[arg(long)]
    jobs: Option<usize>,

    /// Address to listen on
    #[arg(long, default_value = "127.0.0.1:8080")]
    listen: SocketAddr,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let mut config = EngineConfig {
        root_dir: args.root,
        ..Default::default()
    };
    if let Some(jobs) = args.jobs {
        config.max_concurrent = jobs;
    }

    let searcher =
        Arc::new(DirSearcher::new(config).context("failed to initialize the searcher")?);
    info!("serving {} documents", searcher.file_set().len());

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown signal received");
            signal_token.cancel();
        }
    });

    run_daemon(args.listen, AppState::new(searcher, shutdown)).await
}
