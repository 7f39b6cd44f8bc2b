//! Persistence collaborators for finished captures
//!
//! Every sink implements [`wcap_core::CaptureSink`]. Failures come back as
//! `anyhow::Error` wrapping a [`SinkError`], so callers can downcast to tell
//! a duplicate capture slot apart from an I/O problem.

pub mod fanout;
pub mod fs;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use fanout::*;
pub use fs::*;
#[cfg(feature = "sqlite")]
pub use sqlite::*;

use chrono::{NaiveDate, NaiveTime};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("A capture already exists for {date} {time}")]
    Duplicate { date: NaiveDate, time: NaiveTime },

    #[cfg(feature = "sqlite")]
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage task failed: {0}")]
    Task(String),

    #[error("No sinks configured")]
    NoSinks,
}

pub type SinkResult<T> = Result<T, SinkError>;

/// `YYYY-MM-DD`, the date key of a capture
pub fn date_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// `HH:MM:SS`, the time key of a capture
pub fn time_key(time: NaiveTime) -> String {
    time.format("%H:%M:%S").to_string()
}
