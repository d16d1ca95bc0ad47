//! vein: serves controller pages and static files.
//!
//! # Architecture Overview
//!
//! ```text
//!                 ┌───────────────────────────────────────────────┐
//!                 │                     VEIN                      │
//!   Client        │  ┌──────────┐   ┌──────────┐   ┌───────────┐  │
//!   ──────────────┼─▶│   net    │──▶│  http    │──▶│  routing  │  │
//!                 │  │ listener │   │ worker N │   │  router   │  │
//!                 │  └──────────┘   └──────────┘   └─────┬─────┘  │
//!                 │                          ┌───────────┴──────┐ │
//!                 │                          ▼                  ▼ │
//!                 │                   ┌────────────┐   ┌────────┐ │
//!                 │                   │ controller │   │ static │ │
//!                 │                   │  + html    │   │ files  │ │
//!                 │                   └────────────┘   └────────┘ │
//!                 │  config · observability · lifecycle           │
//!                 └───────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use vein::config::{loader::read_config, validate_config, ServerConfig};
use vein::http::HttpServer;
use vein::lifecycle::{shutdown_signal, Shutdown};
use vein::observability::{logging, metrics};
use vein::site::site_router;

#[derive(Parser)]
#[command(name = "vein")]
#[command(about = "Serve controller pages and static files", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override listener.bind_address
    #[arg(short, long)]
    bind: Option<String>,

    /// Override site.public_root
    #[arg(short, long)]
    root: Option<PathBuf>,

    /// Override listener.workers
    #[arg(short, long)]
    workers: Option<usize>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => read_config(path)?,
        None => ServerConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
    }
    if let Some(root) = cli.root {
        config.site.public_root = root;
    }
    if let Some(workers) = cli.workers {
        config.listener.workers = workers;
    }

    logging::init_logging(&config.observability);
    tracing::info!("vein v{} starting", env!("CARGO_PKG_VERSION"));

    if let Err(errors) = validate_config(&config) {
        for error in &errors {
            tracing::error!(error = %error, "Invalid configuration");
        }
        return Err(format!("{} configuration error(s)", errors.len()).into());
    }

    tracing::info!(
        bind_address = %config.listener.bind_address,
        workers = config.listener.workers,
        public_root = %config.site.public_root.display(),
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        }
    }

    let router = site_router(&config)?;
    let listener = vein::net::bind(&config.listener)?;

    let shutdown = Shutdown::new();
    let handle = HttpServer::new(config, router).spawn(listener, &shutdown)?;

    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?
        .block_on(shutdown_signal());

    shutdown.trigger();
    handle.join()?;

    tracing::info!("Shutdown complete");
    Ok(())
}
