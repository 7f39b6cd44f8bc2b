//! Drawing primitives on an RGBA canvas
//!
//! Opaque shapes go through `imageproc`; translucent fills, arcs and glyph
//! coverage are blended here so partially covered pixels mix with the
//! frame underneath.

use ab_glyph::{point, Font, FontArc, GlyphId, PxScale, ScaleFont};
use image::{Rgb, Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_circle_mut};
use imageproc::rect::Rect;

pub const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
pub const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);

/// Offset of the text shadow pass, in pixels
pub const SHADOW_OFFSET: i32 = 2;

pub fn opaque(color: Rgb<u8>) -> Rgba<u8> {
    Rgba([color.0[0], color.0[1], color.0[2], 255])
}

/// Source-over blend of `color` scaled by `coverage` (0..=1)
pub fn blend_pixel(canvas: &mut RgbaImage, x: i32, y: i32, color: Rgba<u8>, coverage: f32) {
    if x < 0 || y < 0 || x as u32 >= canvas.width() || y as u32 >= canvas.height() {
        return;
    }
    let alpha = (color.0[3] as f32 / 255.0) * coverage.clamp(0.0, 1.0);
    if alpha <= 0.0 {
        return;
    }
    let dst = canvas.get_pixel_mut(x as u32, y as u32);
    for c in 0..3 {
        let mixed = color.0[c] as f32 * alpha + dst.0[c] as f32 * (1.0 - alpha);
        dst.0[c] = mixed.round().clamp(0.0, 255.0) as u8;
    }
    dst.0[3] = 255;
}

/// Solid rectangle; zero-sized rectangles draw nothing
pub fn fill_rect(canvas: &mut RgbaImage, x: i32, y: i32, width: u32, height: u32, color: Rgba<u8>) {
    if width == 0 || height == 0 {
        return;
    }
    draw_filled_rect_mut(canvas, Rect::at(x, y).of_size(width, height), color);
}

fn inside_rounded(px: f32, py: f32, x: f32, y: f32, w: f32, h: f32, r: f32) -> bool {
    if px < x || py < y || px >= x + w || py >= y + h {
        return false;
    }
    let cx = px.clamp(x + r, x + w - r);
    let cy = py.clamp(y + r, y + h - r);
    let (dx, dy) = (px - cx, py - cy);
    dx * dx + dy * dy <= r * r
}

/// Rounded rectangle, blended (honours the colour's alpha)
pub fn fill_rounded_rect(
    canvas: &mut RgbaImage,
    x: i32,
    y: i32,
    width: u32,
    height: u32,
    radius: f32,
    color: Rgba<u8>,
) {
    let r = radius.min(width as f32 / 2.0).min(height as f32 / 2.0).max(0.0);
    let (fx, fy, fw, fh) = (x as f32, y as f32, width as f32, height as f32);
    for py in y..y + height as i32 {
        for px in x..x + width as i32 {
            if inside_rounded(px as f32 + 0.5, py as f32 + 0.5, fx, fy, fw, fh, r) {
                blend_pixel(canvas, px, py, color, 1.0);
            }
        }
    }
}

/// Rounded rectangle outline of the given thickness, drawn inside the bounds
#[allow(clippy::too_many_arguments)]
pub fn stroke_rounded_rect(
    canvas: &mut RgbaImage,
    x: i32,
    y: i32,
    width: u32,
    height: u32,
    radius: f32,
    thickness: u32,
    color: Rgba<u8>,
) {
    let t = thickness as f32;
    let r = radius.min(width as f32 / 2.0).min(height as f32 / 2.0).max(0.0);
    let (fx, fy, fw, fh) = (x as f32, y as f32, width as f32, height as f32);
    let inner_r = (r - t).max(0.0);
    for py in y..y + height as i32 {
        for px in x..x + width as i32 {
            let (sx, sy) = (px as f32 + 0.5, py as f32 + 0.5);
            let outer = inside_rounded(sx, sy, fx, fy, fw, fh, r);
            let inner = inside_rounded(sx, sy, fx + t, fy + t, fw - 2.0 * t, fh - 2.0 * t, inner_r);
            if outer && !inner {
                blend_pixel(canvas, px, py, color, 1.0);
            }
        }
    }
}

/// Circle outline `thickness` pixels wide, growing inwards from `radius`
pub fn draw_ring(canvas: &mut RgbaImage, center: (i32, i32), radius: i32, thickness: i32, color: Rgba<u8>) {
    for i in 0..thickness.max(1) {
        let r = radius - i;
        if r > 0 {
            draw_hollow_circle_mut(canvas, center, r, color);
        }
    }
}

/// Whether the angle of `(dx, dy)` lies on the clockwise sweep
/// `[start_deg, start_deg + sweep_deg]` (image coordinates, 0° = +x).
pub fn on_arc(dx: f64, dy: f64, start_deg: f64, sweep_deg: f64) -> bool {
    if sweep_deg <= 0.0 {
        return false;
    }
    if sweep_deg >= 360.0 {
        return true;
    }
    let angle = dy.atan2(dx).to_degrees().rem_euclid(360.0);
    (angle - start_deg).rem_euclid(360.0) <= sweep_deg
}

/// Annular arc between `inner` and `outer` radius
pub fn draw_ring_arc(
    canvas: &mut RgbaImage,
    center: (i32, i32),
    inner: f64,
    outer: f64,
    start_deg: f64,
    sweep_deg: f64,
    color: Rgb<u8>,
) {
    let fill = opaque(color);
    let reach = outer.ceil() as i32;
    for dy in -reach..=reach {
        for dx in -reach..=reach {
            let dist = ((dx * dx + dy * dy) as f64).sqrt();
            if dist < inner || dist > outer {
                continue;
            }
            if on_arc(dx as f64, dy as f64, start_deg, sweep_deg) {
                blend_pixel(canvas, center.0 + dx, center.1 + dy, fill, 1.0);
            }
        }
    }
}

/// Text rendering over an optional font. Without a font every call is a
/// no-op and measurements are zero.
#[derive(Clone, Copy)]
pub struct TextPainter<'a> {
    font: Option<&'a FontArc>,
}

impl<'a> TextPainter<'a> {
    pub fn new(font: Option<&'a FontArc>) -> Self {
        Self { font }
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    /// `(width, height)` of a single line at `size` px
    pub fn measure(&self, text: &str, size: f32) -> (u32, u32) {
        let Some(font) = self.font else {
            return (0, 0);
        };
        let scaled = font.as_scaled(PxScale::from(size));
        let mut width = 0.0f32;
        let mut last: Option<GlyphId> = None;
        for ch in text.chars() {
            let id = scaled.glyph_id(ch);
            if let Some(prev) = last {
                width += scaled.kern(prev, id);
            }
            width += scaled.h_advance(id);
            last = Some(id);
        }
        (width.ceil().max(0.0) as u32, scaled.height().ceil().max(0.0) as u32)
    }

    /// Draw one line with its top-left corner at `(x, y)`
    pub fn draw(&self, canvas: &mut RgbaImage, x: i32, y: i32, text: &str, size: f32, color: Rgba<u8>) {
        let Some(font) = self.font else {
            return;
        };
        let scale = PxScale::from(size);
        let scaled = font.as_scaled(scale);
        let mut caret = point(x as f32, y as f32 + scaled.ascent());
        let mut last: Option<GlyphId> = None;

        for ch in text.chars() {
            let id = scaled.glyph_id(ch);
            if let Some(prev) = last {
                caret.x += scaled.kern(prev, id);
            }
            let glyph = id.with_scale_and_position(scale, caret);
            caret.x += scaled.h_advance(id);
            last = Some(id);

            if let Some(outlined) = font.outline_glyph(glyph) {
                let bounds = outlined.px_bounds();
                outlined.draw(|gx, gy, coverage| {
                    blend_pixel(
                        canvas,
                        bounds.min.x as i32 + gx as i32,
                        bounds.min.y as i32 + gy as i32,
                        color,
                        coverage,
                    );
                });
            }
        }
    }

    /// Black shadow at a small offset, then the fill on top
    pub fn draw_shadowed(&self, canvas: &mut RgbaImage, x: i32, y: i32, text: &str, size: f32, color: Rgba<u8>) {
        self.draw(canvas, x + SHADOW_OFFSET, y + SHADOW_OFFSET, text, size, BLACK);
        self.draw(canvas, x, y, text, size, color);
    }

    /// Shadowed text horizontally centred on `center_x`
    pub fn draw_centered(&self, canvas: &mut RgbaImage, center_x: i32, y: i32, text: &str, size: f32, color: Rgba<u8>) {
        let (w, _) = self.measure(text, size);
        self.draw_shadowed(canvas, center_x - w as i32 / 2, y, text, size, color);
    }
}
