//! Core data types and pipeline ports for the webcam capture service
//!
//! This crate holds the value types shared by every stage of a capture
//! cycle (locations, weather readings, frames, artifacts) and the traits
//! the daemon wires together.

pub mod location;
pub mod pipeline;
pub mod types;

pub use location::*;
pub use pipeline::*;
pub use types::*;
