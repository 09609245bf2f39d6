//! Framecast agent entry point.
//!
//! ```text
//! framecast-agent                  Run in the foreground
//! framecast-agent --config <path>  Load a custom config TOML
//! framecast-agent --gen-config     Write default config to stdout
//! framecast-agent --host <h> --port <p>
//!                                  Override the collector address
//! ```

use std::path::PathBuf;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use framecast_agent::config::AgentConfig;
use framecast_agent::service::AgentService;

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "framecast-agent", about = "Screen frame capture and streaming agent")]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "framecast-agent.toml")]
    config: PathBuf,

    /// Print the default configuration to stdout and exit.
    #[arg(long)]
    gen_config: bool,

    /// Write the default configuration to `--config` and exit.
    #[arg(long)]
    init_config: bool,

    /// Collector host (overrides the config file).
    #[arg(long)]
    host: Option<String>,

    /// Collector port (overrides the config file).
    #[arg(long)]
    port: Option<u16>,
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // --gen-config: dump defaults and exit.
    if cli.gen_config {
        let text = toml::to_string_pretty(&AgentConfig::default())?;
        println!("{text}");
        return Ok(());
    }
    if cli.init_config {
        AgentConfig::write_default(&cli.config)?;
        println!("Default config written to {}", cli.config.display());
        return Ok(());
    }

    // Load config; the outcome is logged once tracing is up.
    let (mut config, status) = AgentConfig::load(&cli.config);
    if let Some(host) = cli.host {
        config.network.host = host;
    }
    if let Some(port) = cli.port {
        config.network.port = port;
    }

    // Init tracing.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
    status.log(&cli.config);

    info!("framecast-agent v{}", env!("CARGO_PKG_VERSION"));
    info!("capture: {}x{} @ {} fps", config.capture.width, config.capture.height, config.capture.fps);
    info!("delivery: {:?}, sink: {:?}", config.queue.delivery, config.network.sink);
    if config.control.enabled {
        info!("control port: {}", config.control.port);
    }

    let service = AgentService::new(config)?;
    let shutdown = service.shutdown_token();

    // Ctrl-C handler.
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Ctrl-C received, shutting down");
        shutdown.cancel();
    });

    service.run().await?;

    Ok(())
}
