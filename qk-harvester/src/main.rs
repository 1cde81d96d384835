//! qk-harvester - quote harvesting service
//!
//! Watches one conversation channel, archives every attributed quote per
//! author and keeps the archive current on a fixed refresh interval.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::Parser;
use qk_common::events::EventBus;
use qk_harvester::config::{CliOverrides, HarvestConfig};
use qk_harvester::reconcile::ReconciliationLoop;
use qk_harvester::source::ExportSource;
use qk_harvester::watermark::Watermark;
use qk_harvester::HarvestState;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Command-line arguments for qk-harvester
#[derive(Parser, Debug)]
#[command(name = "qk-harvester")]
#[command(about = "Quote harvesting service for quotekeeper")]
#[command(version)]
struct Args {
    /// TOML config file (defaults to the platform config location)
    #[arg(short, long, env = "QK_CONFIG")]
    config: Option<PathBuf>,

    /// Folder holding the quote archive, alias table and watermark
    #[arg(short, long)]
    root_folder: Option<PathBuf>,

    /// Channel to harvest
    #[arg(long, env = "QK_CHANNEL_ID")]
    channel_id: Option<u64>,

    /// Folder containing `<channel_id>.jsonl` exports
    #[arg(long, env = "QK_EXPORT_DIR")]
    export_dir: Option<PathBuf>,

    /// Seconds between reconciliation passes
    #[arg(long, env = "QK_REFRESH_INTERVAL_SECS")]
    interval_secs: Option<u64>,

    /// Author name the bot posts under
    #[arg(long, env = "QK_BOT_NAME")]
    bot_name: Option<String>,

    /// Log level when RUST_LOG is not set
    #[arg(long, env = "QK_LOG_LEVEL")]
    log_level: Option<String>,

    /// Run a single pass and exit
    #[arg(long)]
    once: bool,
}

impl Args {
    fn overrides(&self) -> CliOverrides {
        CliOverrides {
            root_folder: self.root_folder.clone(),
            channel_id: self.channel_id,
            export_dir: self.export_dir.clone(),
            refresh_interval_secs: self.interval_secs,
            bot_name: self.bot_name.clone(),
            log_level: self.log_level.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse();

    let (toml_config, config_source) =
        qk_common::config::read_toml_config(args.config.as_deref())
            .context("Failed to load TOML config")?;
    let config = HarvestConfig::resolve(&args.overrides(), &toml_config)
        .context("Invalid configuration")?;

    init_tracing(&config)?;

    info!(
        "Starting qk-harvester v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    config_source.log();
    info!("Root folder: {}", config.root_folder.display());

    if let Some(path) = args.config.clone().or_else(qk_common::config::default_config_file) {
        warn_if_config_readable(&path);
    }

    // Create root folder if missing
    let artifacts = config.artifacts();
    artifacts
        .ensure_directory_exists()
        .context("Failed to initialize root folder")?;

    let event_bus = EventBus::new(100);
    let state = HarvestState::open(&artifacts.archive_path(), &artifacts.aliases_path(), event_bus)
        .context("Failed to load persisted artifacts")?;

    let source = ExportSource::new(&config.export_dir, config.channel_id, config.bot_name.clone());
    let mut harvester = ReconciliationLoop::new(
        source,
        state,
        artifacts.archive_path(),
        Watermark::new(artifacts.watermark_path()),
    )
    .context("Failed to read watermark")?
    .with_interval(config.refresh_interval);

    if args.once {
        harvester.resolve_source().await?;
        let report = harvester.run_pass().await?;
        info!(
            "Single pass finished: {} recorded, {} skipped",
            report.recorded,
            report.skipped.len()
        );
        return Ok(());
    }

    let cancel = CancellationToken::new();
    let mut handle = tokio::spawn(harvester.run(cancel.clone()));

    let joined = tokio::select! {
        joined = &mut handle => joined,
        _ = shutdown_signal() => {
            cancel.cancel();
            handle.await
        }
    };

    joined
        .context("Reconciliation task panicked")?
        .context("Reconciliation loop failed")?;

    info!("Shutdown complete");
    Ok(())
}

#[cfg(unix)]
fn warn_if_config_readable(path: &Path) {
    if path.exists() && qk_common::config::check_toml_permissions_loose(path).unwrap_or(false) {
        warn!("Config file {} is readable by other users (chmod 600 recommended)", path.display());
    }
}

#[cfg(not(unix))]
fn warn_if_config_readable(_path: &Path) {}

fn init_tracing(config: &HarvestConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "qk_harvester={level},qk_common={level}",
            level = config.log_level
        ))
    });

    match &config.log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(Mutex::new(file)),
                )
                .init();
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
