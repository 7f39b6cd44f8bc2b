//! Weather overlay compositor
//!
//! Pure image transformation: a raw frame plus zero, one or two weather
//! readings and a reference date become the final annotated image. No I/O
//! happens here apart from optional font discovery in [`fonts`].
//!
//! Layout is defined for an 800x450 reference canvas and scaled
//! multiplicatively to the configured output size.

pub mod color;
pub mod compositor;
pub mod diff;
pub mod draw;
pub mod fonts;
pub mod geometry;
pub mod timeline;

pub use color::*;
pub use compositor::*;
pub use diff::*;
pub use fonts::{discover_font, load_font};
pub use geometry::*;
pub use timeline::*;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum OverlayError {
    #[error("Invalid output size {0}x{1}")]
    InvalidSize(u32, u32),

    #[error("Source frame is empty")]
    EmptyFrame,

    #[error("Font error: {0}")]
    Font(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type OverlayResult<T> = Result<T, OverlayError>;
