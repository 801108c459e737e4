//! Diagnostic probe server.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ───────────────▶ axum router ──▶ lifecycle wrapper ──▶ probe registry
//!                                       (request id,          (one probe by
//!                                        cancellation,         name, or all
//!                                        access log)           in name order)
//!                                             │                      │
//!     Client Response                         ▼                      ▼
//!     ◀─────────────── encoder ◀─────── negotiated format ◀── ProbeResult(s)
//!                      (text/html/json/yaml)
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use probe_server::config::{load_config, validate_config, ConfigError, ProbeConfig};
use probe_server::http::server::bind;
use probe_server::http::Format;
use probe_server::lifecycle::signals::wait_for_signal;
use probe_server::observability::{logging, metrics};
use probe_server::probe::builtin::register_builtin;
use probe_server::probe::procfs::ProcFs;
use probe_server::{ProbeRegistry, ProbeServer, Shutdown};

#[derive(Parser)]
#[command(name = "probe-server")]
#[command(about = "Serve host diagnostic probes over HTTP", long_about = None)]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen address, overriding the configuration file.
    #[arg(short, long)]
    listen: Option<String>,

    /// Format used when the Accept header matches nothing.
    #[arg(long)]
    default_format: Option<Format>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ProbeConfig::default(),
    };
    if let Some(listen) = cli.listen {
        config.listener.bind_address = listen;
    }
    if let Some(format) = cli.default_format {
        config.output.default_format = format;
    }
    validate_config(&config).map_err(ConfigError::Validation)?;

    logging::init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "probe-server starting");

    if config.observability.metrics_enabled {
        let addr = config.observability.metrics_address.parse()?;
        metrics::init_metrics(addr)?;
    }

    // Every probe is registered before the listener accepts traffic.
    let registry = Arc::new(ProbeRegistry::with_policy(config.dispatch.failure_policy));
    register_builtin(&registry, ProcFs::host());

    let listener = bind(&config.listener.bind_address).await?;

    let shutdown = Arc::new(Shutdown::new());
    let on_signal = shutdown.clone();
    tokio::spawn(async move {
        wait_for_signal().await;
        on_signal.trigger();
    });

    let server = ProbeServer::new(config, registry, shutdown);
    server.run(listener).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
