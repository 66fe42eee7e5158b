//! Polling daemon for the Adept follower bot.
//!
//! The runner logs in to the game portal, then keeps the account's followers
//! busy: every few minutes it fetches the full `HeroBag` state, acknowledges
//! finished missions and binds idle followers to eligible missions until the
//! state stops changing.
//!
//! # Architecture
//!
//! ```text
//! HttpGateway (session, csrf) <-- PollScheduler --> ReconciliationEngine
//!                                  | jittered sleep     | drain / attempt
//! ```
//!
//! The process exits with a non-zero status on a fatal condition (bad
//! configuration, no action links on the first snapshot) and with zero when
//! interrupted.

mod config;
mod error;
mod transport;

use std::path::PathBuf;
use std::process::ExitCode;

use adept_core::engine::ReconciliationEngine;
use adept_core::scheduler::PollScheduler;
use clap::Parser;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::config::{LogFormat, LoggingConfig, RunnerConfig};
use crate::error::RunnerError;
use crate::transport::HttpGateway;

/// Command line arguments.
#[derive(Parser, Debug)]
#[command(name = "adept-runner", about = "Keeps game followers busy on missions")]
struct Cli {
    /// Path to the YAML configuration file.
    #[arg(long, default_value = "adept.yaml")]
    config_file: PathBuf,
}

/// Application entry point.
///
/// Loads configuration, initializes logging, then runs the poll loop until
/// it fails fatally or the process is interrupted.
#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let loaded = RunnerConfig::from_file(&cli.config_file);
    let logging = loaded
        .as_ref()
        .map(|config| config.logging.clone())
        .unwrap_or_default();
    init_tracing(&logging);

    let config = match loaded {
        Ok(config) => config,
        Err(e) => {
            error!(path = %cli.config_file.display(), error = %e, "failed to load configuration");
            return ExitCode::FAILURE;
        }
    };

    info!("adept-runner starting");
    info!(
        interval_minutes = config.polling.interval_minutes,
        max_passes_per_tick = config.polling.max_passes_per_tick,
        request_timeout_secs = config.polling.request_timeout_secs,
        health_check = config.admin.check_url.is_some(),
        "configuration loaded"
    );

    tokio::select! {
        result = run(&config) => match result {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                error!(error = %e, "runner stopped");
                ExitCode::FAILURE
            }
        },
        _ = tokio::signal::ctrl_c() => {
            info!("interrupted, shutting down");
            ExitCode::SUCCESS
        }
    }
}

/// Log in and poll until a fatal condition.
async fn run(config: &RunnerConfig) -> Result<(), RunnerError> {
    let mut gateway = HttpGateway::new(config)?;
    gateway.start().await;
    info!("portal session established");

    let engine = ReconciliationEngine::new(config.polling.max_passes_per_tick);
    let mut scheduler = PollScheduler::new(config.polling.scheduler(), engine, StdRng::from_os_rng());

    match scheduler.run(&mut gateway).await {
        Ok(never) => match never {},
        Err(fatal) => Err(fatal.into()),
    }
}

/// Install the global subscriber. `RUST_LOG` wins over the configured level.
fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(logging.level.as_str()));

    match logging.format {
        LogFormat::Pretty => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_current_span(true)
            .with_env_filter(filter)
            .init(),
    }
}
