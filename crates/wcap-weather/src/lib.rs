//! Weather readings for the overlay
//!
//! [`OpenMeteoSource`] fetches one location per call and never retries.
//! [`WeatherCache`] sits in front of it: fresh entries are served without a
//! request, and a failed request falls back to the last good reading
//! however old it is. The cache is persisted through a [`CacheStore`].

pub mod cache;
pub mod source;
pub mod store;

pub use cache::*;
pub use source::*;
pub use store::*;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WeatherError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Provider returned HTTP {0}")]
    Status(u16),

    #[error("Invalid response: {0}")]
    Parse(String),

    #[error("Cache store error: {0}")]
    Store(String),
}

pub type WeatherResult<T> = Result<T, WeatherError>;
