//! Crop rectangle, output size and the scaled layout

use image::imageops::{self, FilterType};
use image::RgbaImage;

use crate::{OverlayError, OverlayResult};

/// Layout is authored against this canvas
pub const REFERENCE_WIDTH: f32 = 800.0;
pub const REFERENCE_HEIGHT: f32 = 450.0;

pub const DEFAULT_OUTPUT_WIDTH: u32 = 800;
pub const DEFAULT_OUTPUT_HEIGHT: u32 = 450;
pub const DEFAULT_JPEG_QUALITY: u8 = 90;

/// Crop bounds as percentages (0-100) of the source frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CropRect {
    pub left_pct: f64,
    pub top_pct: f64,
    pub right_pct: f64,
    pub bottom_pct: f64,
}

impl Default for CropRect {
    fn default() -> Self {
        Self::FULL
    }
}

impl CropRect {
    pub const FULL: CropRect = CropRect {
        left_pct: 0.0,
        top_pct: 0.0,
        right_pct: 100.0,
        bottom_pct: 100.0,
    };

    pub fn new(left_pct: f64, top_pct: f64, right_pct: f64, bottom_pct: f64) -> Self {
        Self {
            left_pct,
            top_pct,
            right_pct,
            bottom_pct,
        }
    }

    /// Pixel rectangle `(x, y, width, height)` clamped to the image, or
    /// `None` when the clamped rectangle is empty (no crop is applied).
    pub fn to_pixels(&self, width: u32, height: u32) -> Option<(u32, u32, u32, u32)> {
        let edge = |pct: f64, extent: u32| -> u32 {
            let px = (extent as f64 * pct / 100.0).trunc();
            px.clamp(0.0, extent as f64) as u32
        };
        let left = edge(self.left_pct, width);
        let top = edge(self.top_pct, height);
        let right = edge(self.right_pct, width);
        let bottom = edge(self.bottom_pct, height);

        if right > left && bottom > top {
            Some((left, top, right - left, bottom - top))
        } else {
            None
        }
    }
}

/// Compositor settings
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayConfig {
    pub crop: CropRect,
    pub output_width: u32,
    pub output_height: u32,
    pub jpeg_quality: u8,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            crop: CropRect::FULL,
            output_width: DEFAULT_OUTPUT_WIDTH,
            output_height: DEFAULT_OUTPUT_HEIGHT,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }
}

/// Crop (when the rectangle is non-empty) then resize to the exact output
/// size. The resize is unconditional.
pub fn crop_and_resize(
    source: &RgbaImage,
    crop: &CropRect,
    width: u32,
    height: u32,
) -> OverlayResult<RgbaImage> {
    if width == 0 || height == 0 {
        return Err(OverlayError::InvalidSize(width, height));
    }
    if source.width() == 0 || source.height() == 0 {
        return Err(OverlayError::EmptyFrame);
    }

    let resized = match crop.to_pixels(source.width(), source.height()) {
        Some((x, y, w, h)) => {
            let cropped = imageops::crop_imm(source, x, y, w, h).to_image();
            imageops::resize(&cropped, width, height, FilterType::Lanczos3)
        }
        None => imageops::resize(source, width, height, FilterType::Lanczos3),
    };
    Ok(resized)
}

/// Multiplicative scale from the reference canvas
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scale(pub f32);

impl Scale {
    pub fn for_canvas(width: u32, height: u32) -> Self {
        let sx = width as f32 / REFERENCE_WIDTH;
        let sy = height as f32 / REFERENCE_HEIGHT;
        Scale(sx.min(sy))
    }

    /// Scale a reference-canvas length
    pub fn px(&self, reference: f32) -> f32 {
        reference * self.0
    }
}
