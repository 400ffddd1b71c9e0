use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::{info, warn};

use crate::config::PanelConfig;
use crate::session::PanelSession;

mod actions;
mod config;
mod console;
mod controls;
mod display;
mod error;
mod lookup;
mod panel;
mod poller;
mod request;
mod session;
mod station;
mod telemetry;
mod types;

#[cfg(test)]
mod testing;

/// Console control panel for the camera/scale measuring station
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Panel configuration file
    #[arg(long, default_value = "panel.json")]
    config: PathBuf,

    /// Station backend, overrides `backend_url`
    #[arg(long)]
    backend: Option<String>,

    /// Item lookup service, overrides `lookup_url`
    #[arg(long)]
    lookup: Option<String>,

    /// Skip the device list refresh on startup
    #[arg(long)]
    no_refresh: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    telemetry::init_telemetry();

    let mut config = PanelConfig::load(&cli.config)?;
    if let Some(backend) = cli.backend {
        config.backend_url = backend;
    }
    if let Some(lookup) = cli.lookup {
        config.lookup_url = Some(lookup);
    }
    info!("⚙️ Configuration loaded: backend {}", config.backend_url);

    let session = Arc::new(PanelSession::new(config)?);
    if !cli.no_refresh {
        if let Err(e) = session.refresh_devices().await {
            warn!("Device refresh failed: {}", e);
        }
    }

    println!("camstation panel ready, type help for commands");
    console::run(&session, tokio::io::stdin()).await?;

    // a hung poll request must not trap the process on exit
    tokio::select! {
        _ = session.shutdown() => {}
        _ = tokio::signal::ctrl_c() => warn!("Shutdown interrupted"),
    }

    // stdin's blocking reader would otherwise hold the runtime open until enter
    std::process::exit(0)
}
