//! Open-Meteo forecast client

use chrono::{NaiveDateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;
use wcap_core::{Location, Timestamp, WeatherReading, TIME_SENTINEL};

use crate::{WeatherError, WeatherResult};

pub const DEFAULT_FORECAST_URL: &str = "https://api.open-meteo.com/v1/forecast";

/// Bound on a single forecast request
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

const USER_AGENT: &str = concat!("wcap/", env!("CARGO_PKG_VERSION"));

/// Anything that can produce a live reading for a location
#[async_trait::async_trait]
pub trait WeatherFetcher: Send + Sync {
    /// Fetch a fresh reading. Exactly one attempt, no retries.
    async fn fetch(&self, location: Location) -> WeatherResult<WeatherReading>;
}

#[derive(Debug, Default, Deserialize)]
struct ForecastResponse {
    #[serde(default)]
    current: Option<CurrentBlock>,
    #[serde(default)]
    daily: Option<DailyBlock>,
}

#[derive(Debug, Default, Deserialize)]
struct CurrentBlock {
    temperature_2m: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct DailyBlock {
    #[serde(default)]
    sunrise: Vec<String>,
    #[serde(default)]
    sunset: Vec<String>,
}

/// Geocoded forecast endpoint client
#[derive(Debug, Clone)]
pub struct OpenMeteoSource {
    client: Client,
    base_url: String,
}

impl OpenMeteoSource {
    pub fn new(base_url: impl Into<String>) -> WeatherResult<Self> {
        Self::with_timeout(base_url, REQUEST_TIMEOUT)
    }

    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> WeatherResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait::async_trait]
impl WeatherFetcher for OpenMeteoSource {
    async fn fetch(&self, location: Location) -> WeatherResult<WeatherReading> {
        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("latitude", location.latitude().to_string()),
                ("longitude", location.longitude().to_string()),
                ("current", "temperature_2m".to_string()),
                ("daily", "sunrise,sunset".to_string()),
                ("timezone", "auto".to_string()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(WeatherError::Status(response.status().as_u16()));
        }

        let body = response.text().await?;
        let forecast: ForecastResponse =
            serde_json::from_str(&body).map_err(|e| WeatherError::Parse(e.to_string()))?;

        let temperature = forecast.current.and_then(|c| c.temperature_2m);
        let daily = forecast.daily.unwrap_or_default();
        let reading = build_reading(
            location,
            temperature,
            daily.sunrise.first().map(String::as_str),
            daily.sunset.first().map(String::as_str),
            Utc::now().timestamp(),
        );

        debug!(
            location = %location,
            temperature = reading.temperature_c,
            sunrise = %reading.sunrise,
            sunset = %reading.sunset,
            "Fetched weather"
        );
        Ok(reading)
    }
}

/// Parse a provider local date-time (`2024-12-16T07:45`, seconds optional)
pub fn parse_local_datetime(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M")
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S"))
        .ok()
}

/// `"{H}h {M}m"` for the whole minutes between sunrise and sunset
pub fn format_day_length(sunrise: NaiveDateTime, sunset: NaiveDateTime) -> String {
    let minutes = (sunset - sunrise).num_minutes().max(0);
    format!("{}h {}m", minutes / 60, minutes % 60)
}

/// Build a reading from raw forecast values, degrading missing pieces
/// to defaults instead of failing.
pub fn build_reading(
    location: Location,
    temperature: Option<f64>,
    sunrise_iso: Option<&str>,
    sunset_iso: Option<&str>,
    observed_at: Timestamp,
) -> WeatherReading {
    let temperature = (temperature.unwrap_or(0.0) * 10.0).round() / 10.0;
    let sunrise = sunrise_iso.and_then(parse_local_datetime);
    let sunset = sunset_iso.and_then(parse_local_datetime);

    let clock = |t: Option<NaiveDateTime>| {
        t.map(|t| t.format("%H:%M").to_string())
            .unwrap_or_else(|| TIME_SENTINEL.to_string())
    };

    let day_length = match (sunrise, sunset) {
        (Some(rise), Some(set)) if set >= rise => format_day_length(rise, set),
        _ => String::new(),
    };

    WeatherReading {
        location,
        temperature_c: temperature,
        sunrise: clock(sunrise),
        sunset: clock(sunset),
        day_length,
        observed_at,
        sunrise_iso: sunrise_iso.unwrap_or_default().to_string(),
        sunset_iso: sunset_iso.unwrap_or_default().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_day_length() {
        let reading = build_reading(
            Location::Alicante,
            Some(18.0),
            Some("2024-12-16T07:45"),
            Some("2024-12-16T18:10"),
            0,
        );
        assert_eq!(reading.sunrise, "07:45");
        assert_eq!(reading.sunset, "18:10");
        assert_eq!(reading.day_length, "10h 25m");
    }

    #[test]
    fn test_sunset_before_sunrise_has_no_day_length() {
        let reading = build_reading(
            Location::Alicante,
            Some(18.0),
            Some("2024-12-16T18:10"),
            Some("2024-12-16T16:40"),
            0,
        );
        assert_eq!(reading.day_length, "");
        assert_eq!(reading.sunrise, "18:10");
        assert_eq!(reading.sunset, "16:40");

        let rise = chrono::NaiveDate::from_ymd_opt(2024, 12, 16).unwrap().and_hms_opt(18, 10, 0).unwrap();
        let set = chrono::NaiveDate::from_ymd_opt(2024, 12, 16).unwrap().and_hms_opt(16, 40, 0).unwrap();
        assert_eq!(format_day_length(rise, set), "0h 0m");
    }

    #[test]
    fn test_missing_sunset_degrades() {
        let reading = build_reading(
            Location::Bratislava,
            Some(3.0),
            Some("2024-12-16T07:31"),
            None,
            0,
        );
        assert_eq!(reading.day_length, "");
        assert_eq!(reading.sunset, TIME_SENTINEL);
        assert_eq!(reading.sunrise, "07:31");
        assert_eq!(reading.sunset_iso, "");
    }

    #[test]
    fn test_unparseable_time_degrades() {
        let reading = build_reading(Location::Alicante, None, Some("yesterday"), Some(""), 0);
        assert_eq!(reading.sunrise, TIME_SENTINEL);
        assert_eq!(reading.sunset, TIME_SENTINEL);
        assert_eq!(reading.sunrise_iso, "yesterday");
    }

    #[test]
    fn test_temperature_rounding_and_default() {
        let reading = build_reading(Location::Alicante, Some(21.46), None, None, 0);
        assert_eq!(reading.temperature_c, 21.5);

        let reading = build_reading(Location::Alicante, None, None, None, 0);
        assert_eq!(reading.temperature_c, 0.0);
    }

    #[test]
    fn test_parse_with_seconds() {
        let parsed = parse_local_datetime("2024-06-21T05:12:30").unwrap();
        assert_eq!(parsed.format("%H:%M").to_string(), "05:12");
        assert!(parse_local_datetime("   ").is_none());
    }
}
