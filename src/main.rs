//! termdeck - a multi-session pseudo-terminal orchestrator

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tokio::sync::mpsc;

use termdeck::config::Config;

#[derive(Parser)]
#[command(name = "termdeck")]
#[command(about = "A multi-session pseudo-terminal orchestrator")]
#[command(version)]
struct Cli {
    /// Path to config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Socket path the rendering surface connects to
    #[arg(short, long)]
    socket: Option<PathBuf>,

    /// Directory whose subdirectories are offered as projects
    #[arg(short, long)]
    projects: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    if let Some(projects) = cli.projects {
        config.general.projects_root = Some(projects);
    }
    let socket_path = cli.socket.unwrap_or_else(|| config.socket_path());

    let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>(1);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = shutdown_tx.send(()).await;
        }
    });

    termdeck::server::run(config, socket_path, shutdown_rx).await
}
