//! Webcam capture daemon
//!
//! Coordinates:
//! - Browser capture of the webcam player (via [`wcap_capture`])
//! - Weather readings for both locations (via [`wcap_weather`])
//! - The overlay and persistence of the finished capture

pub mod config;
pub mod orchestrator;
pub mod scheduler;

pub use config::*;
pub use orchestrator::*;
pub use scheduler::*;
