//! Core data types for a capture cycle

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageResult, RgbImage, RgbaImage};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::Location;

/// Timestamp type (Unix epoch seconds)
pub type Timestamp = i64;

/// Displayed in place of a sunrise/sunset time the provider did not return
pub const TIME_SENTINEL: &str = "--:--";

/// One location's weather snapshot.
///
/// Display fields never go missing: absent times degrade to
/// [`TIME_SENTINEL`] and an unknown day length to an empty string, so
/// consumers can format them without checks.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WeatherReading {
    pub location: Location,

    /// Current temperature, rounded to one decimal place
    #[serde(rename = "temperature", default)]
    pub temperature_c: f64,

    /// Local sunrise time as `HH:MM`
    pub sunrise: String,

    /// Local sunset time as `HH:MM`
    pub sunset: String,

    /// `"{H}h {M}m"`, or empty when either end of the day is unknown
    pub day_length: String,

    /// When the reading was fetched
    #[serde(default)]
    pub observed_at: Timestamp,

    /// Raw ISO-8601 local date-time from the provider
    #[serde(rename = "sunrise_datetime", default)]
    pub sunrise_iso: String,

    #[serde(rename = "sunset_datetime", default)]
    pub sunset_iso: String,
}

/// Readings keyed by location; zero, one or two entries
pub type Readings = BTreeMap<Location, WeatherReading>;

/// Where a raw frame was captured from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameSource {
    /// Tight crop of the embedded player element
    PlayerElement,
    /// Whole browser viewport
    Viewport,
}

/// Decoded screenshot produced by one capture attempt
#[derive(Debug, Clone)]
pub struct RawFrame {
    pub image: RgbaImage,
    pub source: FrameSource,
}

impl RawFrame {
    pub fn new(image: RgbaImage, source: FrameSource) -> Self {
        Self { image, source }
    }

    /// Decode an encoded screenshot (PNG from the browser)
    pub fn decode(bytes: &[u8], source: FrameSource) -> ImageResult<Self> {
        let image = image::load_from_memory(bytes)?.to_rgba8();
        Ok(Self { image, source })
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// Compositor output handed to persistence
#[derive(Debug, Clone)]
pub struct CaptureArtifact {
    pub image: RgbImage,
    pub width: u32,
    pub height: u32,

    /// Readings drawn onto the image (possibly empty)
    pub readings: Readings,

    /// False when the artifact is the raw frame kept after a failed overlay
    pub overlay_applied: bool,
}

impl CaptureArtifact {
    pub fn new(image: RgbImage, readings: Readings, overlay_applied: bool) -> Self {
        let (width, height) = image.dimensions();
        Self {
            image,
            width,
            height,
            readings,
            overlay_applied,
        }
    }

    /// Degraded artifact: the raw frame without any overlay
    pub fn from_raw(frame: RawFrame, readings: Readings) -> Self {
        let image = DynamicImage::ImageRgba8(frame.image).to_rgb8();
        Self::new(image, readings, false)
    }

    pub fn encode_jpeg(&self, quality: u8) -> ImageResult<Vec<u8>> {
        let mut buf = Vec::new();
        JpegEncoder::new_with_quality(&mut buf, quality).encode_image(&self.image)?;
        Ok(buf)
    }
}

/// A finished capture as the persistence collaborators see it
#[derive(Debug, Clone)]
pub struct CaptureRecord {
    /// Local wall-clock time of the capture, truncated to whole seconds
    pub captured_at: NaiveDateTime,
    pub image: Vec<u8>,
    pub image_format: String,
    pub width: u32,
    pub height: u32,
    pub readings: Readings,
}

impl CaptureRecord {
    pub fn from_artifact(artifact: &CaptureArtifact, captured_at: NaiveDateTime, jpeg: Vec<u8>) -> Self {
        let captured_at = captured_at.with_nanosecond(0).unwrap_or(captured_at);
        Self {
            captured_at,
            image: jpeg,
            image_format: "jpeg".to_string(),
            width: artifact.width,
            height: artifact.height,
            readings: artifact.readings.clone(),
        }
    }

    pub fn capture_date(&self) -> NaiveDate {
        self.captured_at.date()
    }

    pub fn capture_time(&self) -> NaiveTime {
        self.captured_at.time()
    }

    pub fn reading(&self, location: Location) -> Option<&WeatherReading> {
        self.readings.get(&location)
    }
}
