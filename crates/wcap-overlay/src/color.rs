//! Temperature gauge scale and colour ramp

use image::Rgb;

/// Gauge range; temperatures outside are clamped
pub const GAUGE_MIN_C: f64 = -20.0;
pub const GAUGE_MAX_C: f64 = 50.0;

/// Total arc sweep for a full-scale reading, in degrees
pub const GAUGE_SWEEP_DEG: f64 = 300.0;

/// Angle where every arc ends (image coordinates, clockwise from +x)
pub const GAUGE_END_DEG: f64 = 150.0;

const BLUE: [u8; 3] = [0, 100, 255];
const CYAN: [u8; 3] = [0, 255, 255];
const GREEN: [u8; 3] = [0, 255, 0];
const YELLOW: [u8; 3] = [255, 255, 0];
const ORANGE: [u8; 3] = [255, 155, 0];
const RED: [u8; 3] = [255, 0, 0];

/// Band knots: each band interpolates between consecutive entries
const KNOTS: [(f64, [u8; 3]); 6] = [
    (GAUGE_MIN_C, BLUE),
    (0.0, CYAN),
    (15.0, GREEN),
    (25.0, YELLOW),
    (35.0, ORANGE),
    (GAUGE_MAX_C, RED),
];

/// Number of colour bands
pub const BAND_COUNT: usize = KNOTS.len() - 1;

pub fn clamp_temperature(temp_c: f64) -> f64 {
    if temp_c.is_nan() {
        return 0.0;
    }
    temp_c.clamp(GAUGE_MIN_C, GAUGE_MAX_C)
}

/// Position of a temperature on the gauge, 0.0..=1.0
pub fn gauge_ratio(temp_c: f64) -> f64 {
    (clamp_temperature(temp_c) - GAUGE_MIN_C) / (GAUGE_MAX_C - GAUGE_MIN_C)
}

/// `(start_deg, sweep_deg)` of the filled arc; the arc runs clockwise
/// from start and always ends at [`GAUGE_END_DEG`].
pub fn gauge_arc(temp_c: f64) -> (f64, f64) {
    let sweep = gauge_ratio(temp_c) * GAUGE_SWEEP_DEG;
    (GAUGE_END_DEG - sweep, sweep)
}

/// Band index a (clamped) temperature falls into
pub fn band_of(temp_c: f64) -> usize {
    let t = clamp_temperature(temp_c);
    (0..BAND_COUNT)
        .find(|&i| t < KNOTS[i + 1].0)
        .unwrap_or(BAND_COUNT - 1)
}

/// Evaluate one band's formula. The ratio is computed over that band's own
/// sub-range, so the ramp is continuous but not uniform.
pub fn band_color(band: usize, temp_c: f64) -> Rgb<u8> {
    let band = band.min(BAND_COUNT - 1);
    let (lo, from) = KNOTS[band];
    let (hi, to) = KNOTS[band + 1];
    let ratio = ((clamp_temperature(temp_c) - lo) / (hi - lo)).clamp(0.0, 1.0);
    lerp(from, to, ratio)
}

/// Gauge colour for a temperature
pub fn gauge_color(temp_c: f64) -> Rgb<u8> {
    band_color(band_of(temp_c), temp_c)
}

fn lerp(from: [u8; 3], to: [u8; 3], ratio: f64) -> Rgb<u8> {
    let channel = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * ratio).round() as u8;
    Rgb([
        channel(from[0], to[0]),
        channel(from[1], to[1]),
        channel(from[2], to[2]),
    ])
}
