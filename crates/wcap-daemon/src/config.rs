//! Daemon configuration from environment variables

use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;
use wcap_capture::{SessionConfig, DEFAULT_TARGET_URL};
use wcap_obs::LogFormat;
use wcap_overlay::{CropRect, OverlayConfig, DEFAULT_OUTPUT_HEIGHT, DEFAULT_OUTPUT_WIDTH};
use wcap_weather::DEFAULT_FORECAST_URL;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid {var}={value:?}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone)]
pub struct DaemonConfig {
    /// Output root: cache metadata, per-day images and the default database
    pub output_dir: PathBuf,

    /// Page embedding the webcam player
    pub target_url: String,

    pub viewport_width: u32,
    pub viewport_height: u32,

    /// Crop percentages applied before the resize (default full frame)
    pub crop: CropRect,

    pub output_width: u32,
    pub output_height: u32,

    /// Browser executable; auto-detected when unset
    pub chrome_bin: Option<PathBuf>,

    /// SQLite file of the captures table
    pub database_path: PathBuf,

    pub font_path: Option<PathBuf>,

    pub weather_api_url: String,

    pub log_format: LogFormat,
}

impl DaemonConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok()).context("Invalid daemon configuration")
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let output_dir = PathBuf::from(var("OUTPUT_DIR").unwrap_or_else(|| "/data".to_string()));
        let database_path = var("DATABASE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| output_dir.join("captures.db"));

        let crop = CropRect::new(
            parse_or(&var, "CROP_X1", 0.0)?,
            parse_or(&var, "CROP_Y1", 0.0)?,
            parse_or(&var, "CROP_X2", 100.0)?,
            parse_or(&var, "CROP_Y2", 100.0)?,
        );

        let output_width = parse_or(&var, "OUTPUT_WIDTH", DEFAULT_OUTPUT_WIDTH)?;
        let output_height = parse_or(&var, "OUTPUT_HEIGHT", DEFAULT_OUTPUT_HEIGHT)?;
        if output_width == 0 || output_height == 0 {
            return Err(ConfigError::Invalid {
                var: "OUTPUT_WIDTH/OUTPUT_HEIGHT",
                value: format!("{}x{}", output_width, output_height),
                reason: "output size must be non-zero".to_string(),
            });
        }

        let log_format = match var("LOG_FORMAT") {
            Some(value) => value.parse().map_err(|reason| ConfigError::Invalid {
                var: "LOG_FORMAT",
                value,
                reason,
            })?,
            None => LogFormat::default(),
        };

        Ok(Self {
            target_url: var("TARGET_URL").unwrap_or_else(|| DEFAULT_TARGET_URL.to_string()),
            viewport_width: parse_or(&var, "VIEWPORT_WIDTH", 1920)?,
            viewport_height: parse_or(&var, "VIEWPORT_HEIGHT", 1080)?,
            crop,
            output_width,
            output_height,
            chrome_bin: var("CHROME_BIN").map(PathBuf::from),
            database_path,
            font_path: var("FONT_PATH").map(PathBuf::from),
            weather_api_url: var("WEATHER_API_URL").unwrap_or_else(|| DEFAULT_FORECAST_URL.to_string()),
            log_format,
            output_dir,
        })
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            target_url: self.target_url.clone(),
            viewport_width: self.viewport_width,
            viewport_height: self.viewport_height,
            chrome_bin: self.chrome_bin.clone(),
            ..SessionConfig::default()
        }
    }

    pub fn overlay_config(&self) -> OverlayConfig {
        OverlayConfig {
            crop: self.crop,
            output_width: self.output_width,
            output_height: self.output_height,
            ..OverlayConfig::default()
        }
    }
}

fn parse_or<T, V>(var: &V, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    V: Fn(&str) -> Option<String>,
{
    match var(key) {
        Some(value) => value.parse().map_err(|e: T::Err| ConfigError::Invalid {
            var: key,
            reason: e.to_string(),
            value,
        }),
        None => Ok(default),
    }
}
