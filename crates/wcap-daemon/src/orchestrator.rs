//! One capture cycle: browser frame + weather -> overlay -> persistence

use anyhow::{Context, Result};
use chrono::{DateTime, Local, NaiveDateTime, TimeZone};
use tracing::{error, info, instrument, warn};
use wcap_capture::{BrowserLauncher, CaptureSession, SessionConfig};
use wcap_core::{CaptureArtifact, CaptureRecord, CaptureSink, FrameSource, Location};
use wcap_overlay::OverlayCompositor;
use wcap_weather::{CacheStore, WeatherCache, WeatherFetcher};

/// What one cycle produced
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    /// Local wall-clock time the cycle was stamped with, whole seconds
    pub captured_at: NaiveDateTime,
    pub frame_source: FrameSource,
    pub width: u32,
    pub height: u32,
    /// Locations whose readings went into the artifact
    pub readings: Vec<Location>,
    pub overlay_applied: bool,
    /// Generated id, or the persistence failure
    pub stored: Result<i64, String>,
}

impl CycleReport {
    pub fn is_stored(&self) -> bool {
        self.stored.is_ok()
    }
}

/// Runs a whole cycle. Anything driving it (the scheduler, tests) only
/// needs this seam.
#[async_trait::async_trait]
pub trait CycleRunner: Send + Sync {
    async fn run_cycle(&self) -> Result<CycleReport>;
}

/// Wires a capture session, the weather cache, the compositor and a sink.
///
/// A cycle fails only when no frame could be captured or the artifact could
/// not be encoded. Missing weather, a failed overlay and a failed store all
/// degrade the report instead.
pub struct CaptureOrchestrator<F, S> {
    launcher: Box<dyn BrowserLauncher>,
    session: SessionConfig,
    weather: WeatherCache<F, S>,
    compositor: OverlayCompositor,
    sink: Box<dyn CaptureSink>,
}

impl<F: WeatherFetcher, S: CacheStore> CaptureOrchestrator<F, S> {
    pub fn new(
        launcher: Box<dyn BrowserLauncher>,
        session: SessionConfig,
        weather: WeatherCache<F, S>,
        compositor: OverlayCompositor,
        sink: Box<dyn CaptureSink>,
    ) -> Self {
        Self {
            launcher,
            session,
            weather,
            compositor,
            sink,
        }
    }

    pub fn weather(&self) -> &WeatherCache<F, S> {
        &self.weather
    }

    /// Run one cycle stamped with `now`
    #[instrument(skip(self, now), fields(at = %now.naive_local()))]
    pub async fn run_cycle_at<Tz>(&self, now: DateTime<Tz>) -> Result<CycleReport>
    where
        Tz: TimeZone + Send + Sync,
        Tz::Offset: Send + Sync,
    {
        let captured_at = now.naive_local();
        let session = CaptureSession::new(self.launcher.as_ref(), &self.session);

        let (capture, readings) = tokio::join!(
            session.run(),
            self.weather.fetch_all_at(now.timestamp())
        );
        let outcome = capture.context("Capture session failed")?;
        let frame_source = outcome.frame.source;

        let artifact = match self.compositor.compose(&outcome.frame, &readings, captured_at.date()) {
            Ok(artifact) => artifact,
            Err(e) => {
                warn!(error = %e, "Overlay failed, keeping the raw frame");
                CaptureArtifact::from_raw(outcome.frame, readings)
            }
        };

        let jpeg = artifact
            .encode_jpeg(self.compositor.config().jpeg_quality)
            .context("JPEG encoding failed")?;
        let record = CaptureRecord::from_artifact(&artifact, captured_at, jpeg);

        let stored = match self.sink.store(&record).await {
            Ok(id) => {
                info!(sink = self.sink.name(), id, bytes = record.image.len(), "Capture persisted");
                Ok(id)
            }
            Err(e) => {
                error!(sink = self.sink.name(), error = %e, "Capture could not be persisted");
                Err(format!("{:#}", e))
            }
        };

        Ok(CycleReport {
            captured_at: record.captured_at,
            frame_source,
            width: artifact.width,
            height: artifact.height,
            readings: artifact.readings.keys().copied().collect(),
            overlay_applied: artifact.overlay_applied,
            stored,
        })
    }
}

#[async_trait::async_trait]
impl<F: WeatherFetcher, S: CacheStore> CycleRunner for CaptureOrchestrator<F, S> {
    async fn run_cycle(&self) -> Result<CycleReport> {
        self.run_cycle_at(Local::now()).await
    }
}
