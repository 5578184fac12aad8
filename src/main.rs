//! Insights backend service.
//!
//! # Shutdown Overview
//!
//! ```text
//!   SIGTERM / SIGINT
//!          │
//!          ▼
//!   ShutdownCoordinator::trigger ──────────────► every subscriber, exactly once
//!          │
//!          ▼
//!   ┌──────────┐  ┌────────────────────┐  ┌─────────────────┐  ┌───────────────┐  ┌─────────────────┐
//!   │ Draining │─▶│ BackgroundTeardown │─▶│ ChannelTeardown │─▶│ CacheTeardown │─▶│ StorageTeardown │─▶ Complete
//!   └──────────┘  └────────────────────┘  └─────────────────┘  └───────────────┘  └─────────────────┘
//!    graceful       background              fixed grace          db timeout          db timeout
//!    timeout        timeout                 period
//! ```

use std::path::PathBuf;

use clap::Parser;

use insights_backend::config::load_config;
use insights_backend::lifecycle::{
    build_runtime, run_until_complete, Application, ShutdownCoordinator, SignalListener,
};
use insights_backend::observability::init_logging;

#[derive(Parser)]
#[command(name = "insights-backend")]
#[command(about = "Insights backend API server", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long, env = "CONFIG_PATH")]
    config: Option<PathBuf>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let runtime = build_runtime()?;
    // Abandoned background tasks are not joined on the way out.
    run_until_complete(runtime, serve(cli))
}

async fn serve(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {

    let config = load_config(cli.config.as_deref())?;
    init_logging(config.observability.log_format)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        bind_address = %config.listener.bind_address,
        cache_backend = ?config.cache.backend,
        "insights-backend starting"
    );

    // Installed before serving; failure here aborts startup.
    let signals = SignalListener::install()?;

    let coordinator = ShutdownCoordinator::new();
    let app = Application::start(config, coordinator.clone()).await?;

    let signal = signals.recv().await;
    tracing::info!(signal = %signal, "Starting graceful shutdown");
    coordinator.trigger();

    let summary = app.shutdown().await;
    tracing::info!(
        clean = summary.is_clean(),
        total_ms = summary.total.as_millis() as u64,
        "Exiting"
    );
    Ok(())
}
