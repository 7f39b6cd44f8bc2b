//! wcapd - webcam capture daemon

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use wcap_capture::ChromeLauncher;
use wcap_core::CaptureSink;
use wcap_daemon::{CaptureOrchestrator, CycleRunner, DaemonConfig, Scheduler};
use wcap_overlay::{discover_font, OverlayCompositor};
use wcap_sinks::{FanoutSink, FsSink, SqliteSink};
use wcap_weather::{JsonFileStore, OpenMeteoSource, WeatherCache};

#[derive(Debug, Parser)]
#[command(name = "wcapd", version, about = "Captures the webcam feed with a weather overlay")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run a single capture cycle and exit
    Once,
    /// Capture continuously until SIGINT/SIGTERM (default)
    Run,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = DaemonConfig::from_env()?;
    wcap_obs::init("wcapd", config.log_format);
    info!(
        output_dir = %config.output_dir.display(),
        target = %config.target_url,
        "Starting webcam capture daemon"
    );

    let orchestrator = build_orchestrator(&config)?;

    match cli.command.unwrap_or(Command::Run) {
        Command::Once => {
            let report = orchestrator.run_cycle().await?;
            info!(
                width = report.width,
                height = report.height,
                readings = report.readings.len(),
                overlay = report.overlay_applied,
                "Single cycle finished"
            );
            if let Err(e) = report.stored {
                bail!("Capture was not stored: {}", e);
            }
        }
        Command::Run => {
            let token = CancellationToken::new();
            tokio::spawn(cancel_on_signal(token.clone()));

            let scheduler = Scheduler::new(Arc::new(orchestrator));
            let stats = scheduler.run(token).await;
            info!(cycles = stats.cycles, failed = stats.failed, unstored = stats.unstored, "Daemon stopped");
        }
    }

    Ok(())
}

fn build_orchestrator(config: &DaemonConfig) -> Result<CaptureOrchestrator<OpenMeteoSource, JsonFileStore>> {
    let source = OpenMeteoSource::new(&config.weather_api_url).context("Failed to build weather client")?;
    let store = JsonFileStore::in_output_root(&config.output_dir);
    info!(path = %store.path().display(), "Weather cache store");
    let weather = WeatherCache::new(source, store);

    let font = discover_font(config.font_path.as_deref());
    let compositor = OverlayCompositor::new(config.overlay_config(), font);

    let db = SqliteSink::open(&config.database_path)
        .with_context(|| format!("Failed to open database {}", config.database_path.display()))?;
    let sinks: Vec<Box<dyn CaptureSink>> = vec![Box::new(db), Box::new(FsSink::new(&config.output_dir))];

    Ok(CaptureOrchestrator::new(
        Box::new(ChromeLauncher::new()),
        config.session_config(),
        weather,
        compositor,
        Box::new(FanoutSink::new(sinks)),
    ))
}

/// Cancel `token` on SIGINT or SIGTERM
async fn cancel_on_signal(token: CancellationToken) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => info!("SIGINT received"),
                    _ = term.recv() => info!("SIGTERM received"),
                }
            }
            Err(e) => {
                warn!(error = %e, "Could not install SIGTERM handler");
                if let Err(e) = tokio::signal::ctrl_c().await {
                    warn!(error = %e, "Could not install SIGINT handler");
                    return;
                }
                info!("SIGINT received");
            }
        }
    }
    #[cfg(not(unix))]
    {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Could not install SIGINT handler");
            return;
        }
        info!("SIGINT received");
    }

    info!("Shutting down after the current cycle");
    token.cancel();
}
