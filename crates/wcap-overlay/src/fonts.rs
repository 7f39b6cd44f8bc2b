//! Font discovery

use ab_glyph::FontArc;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

use crate::{OverlayError, OverlayResult};

/// System locations tried when no explicit font is configured
pub const FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Bold.ttf",
    "/usr/share/fonts/TTF/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans-Bold.ttf",
    "C:/Windows/Fonts/arialbd.ttf",
    "C:/Windows/Fonts/arial.ttf",
];

pub fn load_font<P: AsRef<Path>>(path: P) -> OverlayResult<FontArc> {
    let path = path.as_ref();
    let bytes = fs::read(path)?;
    FontArc::try_from_vec(bytes).map_err(|e| OverlayError::Font(format!("{}: {}", path.display(), e)))
}

/// The explicit font if it loads, else the first candidate that does
pub fn discover_font(explicit: Option<&Path>) -> Option<FontArc> {
    if let Some(path) = explicit {
        match load_font(path) {
            Ok(font) => {
                debug!(path = %path.display(), "Loaded configured font");
                return Some(font);
            }
            Err(e) => warn!(path = %path.display(), error = %e, "Configured font unusable"),
        }
    }

    for candidate in FONT_CANDIDATES {
        let path = Path::new(candidate);
        if !path.exists() {
            continue;
        }
        match load_font(path) {
            Ok(font) => {
                debug!(path = %candidate, "Loaded system font");
                return Some(font);
            }
            Err(e) => debug!(path = %candidate, error = %e, "Skipping font"),
        }
    }
    None
}

/// Bold sans shipped with the tests
#[cfg(test)]
pub(crate) fn fixture_font() -> FontArc {
    FontArc::try_from_slice(include_bytes!("../tests/fixtures/DejaVuSans-Bold.ttf")).unwrap()
}
