//! Framecast collector entry point.
//!
//! ```text
//! framecast-collector                      Run in the foreground
//! framecast-collector --config <path>      Load a custom config TOML
//! framecast-collector --gen-config         Write default config to stdout
//! framecast-collector --port <p> --output-dir <dir>
//! framecast-collector --plaintext          Serve HTTP without TLS
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use framecast_collector::config::CollectorConfig;
use framecast_collector::server;
use framecast_collector::storage::{FrameStore, run_writer};
use framecast_core::FrameQueue;

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "framecast-collector", about = "Receives and stores streamed screen frames")]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "framecast-collector.toml")]
    config: PathBuf,

    /// Print the default configuration to stdout and exit.
    #[arg(long)]
    gen_config: bool,

    /// Write the default configuration to `--config` and exit.
    #[arg(long)]
    init_config: bool,

    /// Listen port (overrides the config file).
    #[arg(long)]
    port: Option<u16>,

    /// Directory frames are written to (overrides the config file).
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Serve plaintext HTTP (overrides `[server.tls]`).
    #[arg(long)]
    plaintext: bool,
}

// ── Main ─────────────────────────────────────────────────────────

#[actix_web::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.gen_config {
        let text = toml::to_string_pretty(&CollectorConfig::default())?;
        println!("{text}");
        return Ok(());
    }
    if cli.init_config {
        CollectorConfig::write_default(&cli.config)?;
        println!("Default config written to {}", cli.config.display());
        return Ok(());
    }

    let (mut config, status) = CollectorConfig::load(&cli.config);
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(dir) = cli.output_dir {
        config.storage.output_dir = dir;
    }
    if cli.plaintext {
        config.server.tls.enabled = false;
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
    status.log(&cli.config);

    info!("framecast-collector v{}", env!("CARGO_PKG_VERSION"));
    info!("output directory: {}", config.storage.output_dir.display());
    info!("queue capacity: {}", config.storage.queue_capacity);

    let queue = Arc::new(FrameQueue::new(config.storage.queue_capacity));
    let store = FrameStore::new(&config.storage.output_dir)?;
    let shutdown = CancellationToken::new();
    let writer = actix_web::rt::spawn(run_writer(Arc::clone(&queue), store, shutdown.clone()));

    // The server stops itself on Ctrl-C.
    let (server, _) = server::bind(&config.server, queue)?;
    server.await?;

    info!("server stopped; flushing queued frames");
    shutdown.cancel();
    let saved = writer.await?;
    info!(saved, "collector stopped");

    Ok(())
}
