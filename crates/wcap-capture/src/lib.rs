//! Browser capture of the webcam player
//!
//! A [`CaptureSession`] owns one browser for one cycle and walks it from
//! page load to a screenshot. Every step between navigation and the
//! screenshot is best effort: a miss is logged and the session moves on.
//! Browsers are reached through the [`BrowserDriver`] port; [`ChromeDriver`]
//! speaks the DevTools protocol and [`ScriptedDriver`] answers from a rule
//! table for tests.

pub mod chrome;
pub mod driver;
pub mod scripted;
pub mod session;
pub mod strategy;

pub use chrome::*;
pub use driver::*;
pub use scripted::*;
pub use session::*;
pub use strategy::*;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("Browser launch failed: {0}")]
    Launch(String),

    #[error("Browser protocol error: {0}")]
    Cdp(#[from] chromiumoxide::error::CdpError),

    #[error("Element not found: {0}")]
    NotFound(String),

    #[error("No frame at index {0}")]
    NoFrame(usize),

    #[error("Script error: {0}")]
    Script(String),

    #[error("Browser session already closed")]
    Closed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type DriverResult<T> = Result<T, DriverError>;

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("Could not start browser session: {0}")]
    Launch(#[source] DriverError),

    #[error("Navigation to {url} failed: {source}")]
    Navigation {
        url: String,
        #[source]
        source: DriverError,
    },

    #[error("Screenshot failed: {0}")]
    Screenshot(#[source] DriverError),

    #[error("Screenshot could not be decoded: {0}")]
    Decode(#[from] image::ImageError),
}

pub type CaptureResult<T> = Result<T, CaptureError>;
