//! Five-month date strip and day-of-month progress marker

use chrono::{Datelike, Duration, NaiveDate};

/// Months shown either side of the current one
pub const MONTH_WINDOW_RADIUS: i64 = 2;

/// Step between neighbouring window entries
pub const MONTH_STEP_DAYS: i64 = 30;

pub const TRACK_COLOR: [u8; 3] = [102, 126, 234];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonthLabel {
    /// `YYYY-MM`
    pub label: String,
    pub is_active: bool,
}

/// Labels for the strip: the reference date shifted by -60..=+60 days in
/// 30-day steps, each truncated to its month. Short months can make two
/// neighbouring entries land in the same month.
pub fn month_window(date: NaiveDate) -> Vec<MonthLabel> {
    (-MONTH_WINDOW_RADIUS..=MONTH_WINDOW_RADIUS)
        .map(|step| {
            let shifted = date
                .checked_add_signed(Duration::days(step * MONTH_STEP_DAYS))
                .unwrap_or(date);
            MonthLabel {
                label: shifted.format("%Y-%m").to_string(),
                is_active: step == 0,
            }
        })
        .collect()
}

pub fn days_in_month(year: i32, month: u32) -> u32 {
    let first = NaiveDate::from_ymd_opt(year, month, 1);
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    };
    match (first, next) {
        (Some(first), Some(next)) => (next - first).num_days() as u32,
        _ => 30,
    }
}

/// Linear position of `day` within a month of `days` days, 0.0..=1.0.
/// A one-day month sits at the midpoint.
pub fn day_fraction(day: u32, days: u32) -> f64 {
    if days <= 1 {
        return 0.5;
    }
    let day = day.clamp(1, days);
    (day - 1) as f64 / (days - 1) as f64
}

pub fn month_day_fraction(date: NaiveDate) -> f64 {
    day_fraction(date.day(), days_in_month(date.year(), date.month()))
}

/// Pixel geometry of the strip for one canvas
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DateStripLayout {
    pub strip_y: i32,
    pub strip_height: u32,
    pub month_y: i32,
    pub column_width: u32,
    pub track_x: i32,
    pub track_y: i32,
    pub track_width: u32,
    pub track_height: u32,
    pub marker_width: u32,
    pub marker_height: u32,
    pub month_font: f32,
    pub active_month_font: f32,
    pub day_font: f32,
}

impl DateStripLayout {
    pub const BOTTOM_PADDING: u32 = 10;
    pub const TRACK_MARGIN: f32 = 40.0;

    pub fn new(width: u32, height: u32, scale: f32) -> Self {
        let strip_height = ((30.0 * scale) as u32).max((height as f32 * 0.065) as u32).max(1);
        let strip_y = height as i32 - strip_height as i32 - Self::BOTTOM_PADDING as i32;
        let track_margin = (Self::TRACK_MARGIN * scale) as u32;
        let oh = strip_height as f32;

        Self {
            strip_y,
            strip_height,
            month_y: strip_y + 10,
            column_width: width / 5,
            track_x: track_margin as i32,
            track_y: strip_y + (oh * 0.65) as i32,
            track_width: width.saturating_sub(track_margin * 2),
            track_height: ((oh * 0.08) as u32).max(4),
            marker_width: 3,
            marker_height: ((oh * 0.35) as u32).max(20),
            month_font: (oh * 0.18).max(11.0),
            active_month_font: (oh * 0.22).max(13.0),
            day_font: (oh * 0.20).max(12.0),
        }
    }

    /// Marker centre for a day fraction
    pub fn marker_x(&self, fraction: f64) -> i32 {
        self.track_x + (self.track_width as f64 * fraction.clamp(0.0, 1.0)) as i32
    }

    /// Top of the marker line, centred vertically on the track
    pub fn marker_top(&self) -> i32 {
        self.track_y - (self.marker_height as i32 - self.track_height as i32) / 2
    }
}
