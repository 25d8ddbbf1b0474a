//! raid5d - HTTP server for the RAID-5 file store

use clap::Parser;
use raid5_store::{api, open_store, StoreConfig};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "raid5d")]
#[command(about = "RAID-5 style file store with XOR parity")]
struct Cli {
    /// Path to a TOML config file
    #[arg(short, long, env = "RAID5_CONFIG")]
    config: Option<PathBuf>,

    /// Root directory for the shard directories
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Number of disks (data + parity)
    #[arg(long)]
    disks: Option<usize>,

    /// HTTP listen address
    #[arg(long)]
    listen: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => StoreConfig::load_or_default(path),
        None => StoreConfig::default(),
    }
    .with_env_overrides()?
    .with_overrides(cli.data_dir, cli.disks, cli.listen);

    info!(
        root = %config.upload_path.display(),
        disks = config.num_disks,
        max_size = config.max_size,
        "Starting raid5d"
    );

    let store = Arc::new(open_store(&config).await?);
    let app = api::router(store).layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    info!(addr = %config.listen_addr, "HTTP server listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("raid5d stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    info!("Shutdown signal received");
}
