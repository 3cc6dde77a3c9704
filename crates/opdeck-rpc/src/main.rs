//! opdeck RPC Server - JSON-RPC backend for the operator console UI.

use anyhow::Result;
use clap::Parser;
use opdeck_core::ConsoleConfig;
use opdeck_rpc::{start_server, AppState};
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "opdeck-rpc")]
#[command(about = "JSON-RPC server for the opdeck workstation console")]
struct Args {
    /// Port to listen on (0 = auto-assign)
    #[arg(short, long, default_value = "0")]
    port: u16,

    /// Host to bind to
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Configuration file (defaults to the user config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the scripts directory from the configuration
    #[arg(long)]
    scripts_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Set up logging
    let log_level = if args.debug { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .init();

    info!("Starting opdeck RPC Server");

    let mut config = ConsoleConfig::load_or_default(args.config.as_deref())?;
    if let Some(scripts_dir) = args.scripts_dir {
        config.scripts_dir = scripts_dir;
    }

    info!(
        "{} service(s), {} whitelisted app(s), scripts in {}",
        config.services.len(),
        config.allowed_apps.len(),
        config.scripts_dir.display()
    );

    let state = AppState::from_config(config);
    let addr = start_server(state, &args.host, args.port).await?;

    // Print port for the UI process to read (intentional stdout for IPC)
    println!("RPC_PORT={}", addr.port());

    info!("RPC server running on {}", addr);

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received, exiting");

    Ok(())
}
