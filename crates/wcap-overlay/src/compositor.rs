//! Frame + readings + date -> annotated image

use ab_glyph::FontArc;
use chrono::{Datelike, NaiveDate};
use image::{DynamicImage, Rgba, RgbaImage};
use tracing::{debug, warn};
use wcap_core::{CaptureArtifact, Location, RawFrame, Readings, WeatherReading};

use crate::color::{gauge_arc, gauge_color};
use crate::diff::temperature_difference;
use crate::draw::{
    draw_ring, draw_ring_arc, fill_rect, fill_rounded_rect, opaque, stroke_rounded_rect,
    TextPainter, WHITE,
};
use crate::geometry::{crop_and_resize, OverlayConfig, Scale};
use crate::timeline::{month_day_fraction, month_window, DateStripLayout, TRACK_COLOR};
use crate::OverlayResult;

const MARGIN: f32 = 20.0;
const TITLE_FONT: f32 = 28.0;
const INFO_FONT: f32 = 22.0;
const LINE_HEIGHT: f32 = 30.0;

const GAUGE_SIZE: f32 = 80.0;
const GAUGE_BOTTOM_GAP: f32 = 50.0;
const GAUGE_SIDE_GAP: f32 = 20.0;
const GAUGE_OUTLINE: f32 = 3.0;
const GAUGE_ARC_INSET: f32 = 5.0;
const GAUGE_ARC_WIDTH: f32 = 15.0;
const GAUGE_TEMP_FONT: f32 = 32.0;
const GAUGE_NAME_FONT: f32 = 18.0;

const DIFF_BOX_WIDTH: f32 = 140.0;
const DIFF_BOX_HEIGHT: f32 = 70.0;
const DIFF_BOX_RADIUS: f32 = 12.0;
const DIFF_BOX_FILL: Rgba<u8> = Rgba([30, 30, 50, 200]);
const DIFF_CAPTION: Rgba<u8> = Rgba([180, 180, 200, 255]);

const INACTIVE_MONTH: Rgba<u8> = Rgba([255, 255, 255, 100]);

/// Draws the weather overlay. Holds no per-call state, so one instance
/// serves every cycle.
pub struct OverlayCompositor {
    config: OverlayConfig,
    font: Option<FontArc>,
}

impl OverlayCompositor {
    pub fn new(config: OverlayConfig, font: Option<FontArc>) -> Self {
        if font.is_none() {
            warn!("No font available, overlay text will be skipped");
        }
        Self { config, font }
    }

    pub fn config(&self) -> &OverlayConfig {
        &self.config
    }

    /// Crop, resize and annotate `frame`. Readings for unknown locations
    /// are ignored; a missing reading omits that location's blocks.
    pub fn compose(
        &self,
        frame: &RawFrame,
        readings: &Readings,
        date: NaiveDate,
    ) -> OverlayResult<CaptureArtifact> {
        let mut canvas = crop_and_resize(
            &frame.image,
            &self.config.crop,
            self.config.output_width,
            self.config.output_height,
        )?;
        let (width, height) = canvas.dimensions();
        let scale = Scale::for_canvas(width, height);
        let painter = TextPainter::new(self.font.as_ref());

        let [first, second] = Location::ALL;
        let first_reading = readings.get(&first);
        let second_reading = readings.get(&second);

        if let Some(reading) = first_reading {
            let x = scale.px(MARGIN) as i32;
            draw_info_block(&mut canvas, &painter, scale, x, Align::Left, reading);
        }
        if let Some(reading) = second_reading {
            let x = width as i32 - scale.px(MARGIN) as i32;
            draw_info_block(&mut canvas, &painter, scale, x, Align::Right, reading);
        }

        let gauge_size = scale.px(GAUGE_SIZE);
        let gauge_y = height as i32 - (gauge_size / 2.0) as i32 - scale.px(GAUGE_BOTTOM_GAP) as i32;
        let gauge_offset = (scale.px(MARGIN) + gauge_size / 2.0 + scale.px(GAUGE_SIDE_GAP)) as i32;

        if let Some(reading) = first_reading {
            draw_gauge(&mut canvas, &painter, scale, (gauge_offset, gauge_y), reading);
        }
        if let Some(reading) = second_reading {
            let center = (width as i32 - gauge_offset, gauge_y);
            draw_gauge(&mut canvas, &painter, scale, center, reading);
        }

        if let (Some(a), Some(b)) = (first_reading, second_reading) {
            draw_difference(&mut canvas, &painter, scale, (width as i32 / 2, gauge_y), a, b);
        }

        draw_date_strip(&mut canvas, &painter, scale, date);

        debug!(
            width,
            height,
            readings = readings.len(),
            text = painter.has_font(),
            "Overlay composed"
        );

        let image = DynamicImage::ImageRgba8(canvas).to_rgb8();
        Ok(CaptureArtifact::new(image, readings.clone(), true))
    }
}

#[derive(Clone, Copy)]
enum Align {
    Left,
    Right,
}

fn info_lines(reading: &WeatherReading) -> [(String, f32); 5] {
    [
        (reading.location.display_name().to_string(), TITLE_FONT),
        (format!("Temp: {:.1}°C", reading.temperature_c), INFO_FONT),
        (format!("Sunrise: {}", reading.sunrise), INFO_FONT),
        (format!("Sunset: {}", reading.sunset), INFO_FONT),
        (format!("Day: {}", reading.day_length), INFO_FONT),
    ]
}

fn draw_info_block(
    canvas: &mut RgbaImage,
    painter: &TextPainter<'_>,
    scale: Scale,
    x: i32,
    align: Align,
    reading: &WeatherReading,
) {
    let top = scale.px(MARGIN);
    for (i, (text, size)) in info_lines(reading).iter().enumerate() {
        let size = scale.px(*size);
        let y = (top + i as f32 * scale.px(LINE_HEIGHT)) as i32;
        let x = match align {
            Align::Left => x,
            Align::Right => x - painter.measure(text, size).0 as i32,
        };
        painter.draw_shadowed(canvas, x, y, text, size, WHITE);
    }
}

fn draw_gauge(
    canvas: &mut RgbaImage,
    painter: &TextPainter<'_>,
    scale: Scale,
    center: (i32, i32),
    reading: &WeatherReading,
) {
    let radius = scale.px(GAUGE_SIZE) / 2.0;
    let outline = scale.px(GAUGE_OUTLINE).round().max(1.0) as i32;
    draw_ring(canvas, center, radius as i32, outline, WHITE);

    let outer = (radius - scale.px(GAUGE_ARC_INSET)) as f64;
    let inner = (outer - scale.px(GAUGE_ARC_WIDTH) as f64).max(0.0);
    let (start, sweep) = gauge_arc(reading.temperature_c);
    draw_ring_arc(
        canvas,
        center,
        inner,
        outer,
        start,
        sweep,
        gauge_color(reading.temperature_c),
    );

    let temp_size = scale.px(GAUGE_TEMP_FONT);
    let temp_text = format!("{}°", reading.temperature_c.round() as i64);
    let (_, th) = painter.measure(&temp_text, temp_size);
    let temp_y = center.1 - th as i32 / 2 - scale.px(10.0) as i32;
    painter.draw_centered(canvas, center.0, temp_y, &temp_text, temp_size, WHITE);

    let name_y = center.1 + radius as i32 + scale.px(10.0) as i32;
    painter.draw_centered(
        canvas,
        center.0,
        name_y,
        reading.location.display_name(),
        scale.px(GAUGE_NAME_FONT),
        WHITE,
    );
}

fn draw_difference(
    canvas: &mut RgbaImage,
    painter: &TextPainter<'_>,
    scale: Scale,
    center: (i32, i32),
    first: &WeatherReading,
    second: &WeatherReading,
) {
    let indicator = temperature_difference(
        first.location,
        first.temperature_c,
        second.location,
        second.temperature_c,
    );

    let box_w = scale.px(DIFF_BOX_WIDTH) as u32;
    let box_h = scale.px(DIFF_BOX_HEIGHT) as u32;
    let left = center.0 - box_w as i32 / 2;
    let top = center.1 - box_h as i32 / 2;
    let radius = scale.px(DIFF_BOX_RADIUS);

    fill_rounded_rect(canvas, left, top, box_w, box_h, radius, DIFF_BOX_FILL);
    stroke_rounded_rect(canvas, left, top, box_w, box_h, radius, 2, opaque(indicator.border));

    let caption_size = scale.px(12.0);
    let (caption_w, _) = painter.measure("DIFFERENCE", caption_size);
    painter.draw(
        canvas,
        center.0 - caption_w as i32 / 2,
        top + scale.px(6.0) as i32,
        "DIFFERENCE",
        caption_size,
        DIFF_CAPTION,
    );

    let tier_color = opaque(indicator.tier.color());
    painter.draw_centered(
        canvas,
        center.0,
        center.1 - scale.px(8.0) as i32,
        &indicator.text,
        scale.px(28.0),
        tier_color,
    );

    let small = scale.px(11.0);
    let row_y = top + box_h as i32 - scale.px(18.0) as i32;
    let (arrow_w, _) = painter.measure(indicator.arrow, small);
    painter.draw(
        canvas,
        center.0 - scale.px(35.0) as i32 - arrow_w as i32 / 2,
        row_y,
        indicator.arrow,
        small,
        tier_color,
    );
    painter.draw(
        canvas,
        center.0 - scale.px(25.0) as i32,
        row_y,
        &indicator.label,
        small,
        DIFF_CAPTION,
    );
}

fn draw_date_strip(canvas: &mut RgbaImage, painter: &TextPainter<'_>, scale: Scale, date: NaiveDate) {
    let (width, height) = canvas.dimensions();
    let layout = DateStripLayout::new(width, height, scale.0);

    for (idx, month) in month_window(date).iter().enumerate() {
        let (size, color) = if month.is_active {
            (layout.active_month_font, WHITE)
        } else {
            (layout.month_font, INACTIVE_MONTH)
        };
        let (text_w, _) = painter.measure(&month.label, size);
        let column_x = idx as i32 * layout.column_width as i32;
        let x = column_x + (layout.column_width as i32 - text_w as i32) / 2;
        painter.draw(canvas, x, layout.month_y, &month.label, size, color);
    }

    let track = Rgba([TRACK_COLOR[0], TRACK_COLOR[1], TRACK_COLOR[2], 255]);
    fill_rect(
        canvas,
        layout.track_x,
        layout.track_y,
        layout.track_width,
        layout.track_height,
        track,
    );

    let marker_x = layout.marker_x(month_day_fraction(date));
    let marker_top = layout.marker_top();
    fill_rect(
        canvas,
        marker_x - layout.marker_width as i32 / 2,
        marker_top,
        layout.marker_width,
        layout.marker_height,
        WHITE,
    );

    if painter.has_font() {
        let day_text = date.day().to_string();
        let (text_w, text_h) = painter.measure(&day_text, layout.day_font);
        let padding = 4;
        let badge_x = marker_x - text_w as i32 / 2 - padding;
        let badge_y = marker_top - text_h as i32 - 10;
        fill_rounded_rect(
            canvas,
            badge_x,
            badge_y,
            text_w + 2 * padding as u32,
            text_h + padding as u32,
            4.0,
            track,
        );
        painter.draw(
            canvas,
            marker_x - text_w as i32 / 2,
            badge_y + padding / 2,
            &day_text,
            layout.day_font,
            WHITE,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::CropRect;
    use image::Rgb;
    use wcap_core::FrameSource;

    fn reading(location: Location, temp: f64) -> WeatherReading {
        WeatherReading {
            location,
            temperature_c: temp,
            sunrise: "07:45".to_string(),
            sunset: "18:10".to_string(),
            day_length: "10h 25m".to_string(),
            observed_at: 0,
            sunrise_iso: String::new(),
            sunset_iso: String::new(),
        }
    }

    fn black_frame(width: u32, height: u32) -> RawFrame {
        RawFrame::new(
            RgbaImage::from_pixel(width, height, Rgba([0, 0, 0, 255])),
            FrameSource::Viewport,
        )
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 12, 16).unwrap()
    }

    fn both() -> Readings {
        [
            (Location::Alicante, reading(Location::Alicante, 22.0)),
            (Location::Bratislava, reading(Location::Bratislava, 9.0)),
        ]
        .into()
    }

    #[test]
    fn test_output_size_is_fixed() {
        let compositor = OverlayCompositor::new(OverlayConfig::default(), None);
        for (w, h) in [(1920, 1080), (300, 300), (801, 451)] {
            let artifact = compositor.compose(&black_frame(w, h), &both(), date()).unwrap();
            assert_eq!((artifact.width, artifact.height), (800, 450));
            assert_eq!(artifact.image.dimensions(), (800, 450));
            assert!(artifact.overlay_applied);
        }
    }

    #[test]
    fn test_crop_applies_before_resize() {
        let mut src = RgbaImage::from_pixel(400, 200, Rgba([255, 0, 0, 255]));
        for y in 0..200 {
            for x in 200..400 {
                src.put_pixel(x, y, Rgba([0, 0, 255, 255]));
            }
        }
        let config = OverlayConfig {
            crop: CropRect::new(50.0, 0.0, 100.0, 100.0),
            ..OverlayConfig::default()
        };
        let compositor = OverlayCompositor::new(config, None);
        let artifact = compositor
            .compose(&RawFrame::new(src, FrameSource::PlayerElement), &Readings::new(), date())
            .unwrap();

        let p = artifact.image.get_pixel(400, 150).0;
        assert!(p[0] < 5 && p[2] > 250, "expected blue, got {:?}", p);
    }

    #[test]
    fn test_gauge_arc_colour_and_extent() {
        let compositor = OverlayCompositor::new(OverlayConfig::default(), None);
        let readings: Readings = [(Location::Alicante, reading(Location::Alicante, 22.0))].into();
        let artifact = compositor.compose(&black_frame(800, 450), &readings, date()).unwrap();

        // 22°C fills 180° from -30° through the bottom to 150°
        assert_eq!(*artifact.image.get_pixel(80, 388), Rgb([179, 255, 0]));
        assert_eq!(*artifact.image.get_pixel(80, 332), Rgb([0, 0, 0]));
        // no reading for the second location, no gauge on the right
        assert_eq!(*artifact.image.get_pixel(720, 388), Rgb([0, 0, 0]));
    }

    #[test]
    fn test_gauge_scales_with_output() {
        let config = OverlayConfig {
            output_width: 1600,
            output_height: 900,
            ..OverlayConfig::default()
        };
        let compositor = OverlayCompositor::new(config, None);
        let readings: Readings = [(Location::Alicante, reading(Location::Alicante, 22.0))].into();
        let artifact = compositor.compose(&black_frame(640, 360), &readings, date()).unwrap();

        assert_eq!(*artifact.image.get_pixel(160, 720 + 56), Rgb([179, 255, 0]));
    }

    #[test]
    fn test_difference_box_needs_both_readings() {
        let compositor = OverlayCompositor::new(OverlayConfig::default(), None);

        let with_both = compositor.compose(&black_frame(800, 450), &both(), date()).unwrap();
        assert_ne!(*with_both.image.get_pixel(400, 360), Rgb([0, 0, 0]));

        let one: Readings = [(Location::Bratislava, reading(Location::Bratislava, 9.0))].into();
        let with_one = compositor.compose(&black_frame(800, 450), &one, date()).unwrap();
        assert_eq!(*with_one.image.get_pixel(400, 360), Rgb([0, 0, 0]));
    }

    #[test]
    fn test_date_strip_without_readings() {
        let compositor = OverlayCompositor::new(OverlayConfig::default(), None);
        let artifact = compositor
            .compose(&black_frame(800, 450), &Readings::new(), date())
            .unwrap();

        assert_eq!(*artifact.image.get_pixel(100, 430), Rgb([102, 126, 234]));
        // day 16 of 31 sits in the middle of the track
        assert_eq!(*artifact.image.get_pixel(400, 425), Rgb([255, 255, 255]));
        assert!(artifact.readings.is_empty());
    }

    fn bright_columns(image: &image::RgbImage, rows: std::ops::Range<u32>, cols: std::ops::Range<u32>) -> Vec<u32> {
        cols.filter(|&x| rows.clone().any(|y| image.get_pixel(x, y).0.iter().all(|&c| c > 200)))
            .collect()
    }

    #[test]
    fn test_info_blocks_align_to_margins() {
        let compositor = OverlayCompositor::new(OverlayConfig::default(), Some(crate::fonts::fixture_font()));
        let artifact = compositor.compose(&black_frame(800, 450), &both(), date()).unwrap();

        let left = bright_columns(&artifact.image, 15..175, 0..400);
        let right = bright_columns(&artifact.image, 15..175, 400..800);

        let first = *left.first().unwrap();
        assert!((20..=24).contains(&first), "left block starts at {}", first);
        let last = *right.last().unwrap();
        assert!((772..=780).contains(&last), "right block ends at {}", last);
    }

    #[test]
    fn test_difference_text_is_drawn() {
        let font = crate::fonts::fixture_font();
        let with_text = OverlayCompositor::new(OverlayConfig::default(), Some(font))
            .compose(&black_frame(800, 450), &both(), date())
            .unwrap();
        let without_text = OverlayCompositor::new(OverlayConfig::default(), None)
            .compose(&black_frame(800, 450), &both(), date())
            .unwrap();

        // box interior: 330..470 x 325..395, clear of the stroke
        let changed_rows = |rows: std::ops::Range<u32>| {
            rows.flat_map(|y| (334..466).map(move |x| (x, y)))
                .filter(|&(x, y)| with_text.image.get_pixel(x, y) != without_text.image.get_pixel(x, y))
                .count()
        };
        assert!(changed_rows(329..343) > 0, "caption missing");
        assert!(changed_rows(343..375) > 0, "value missing");
        assert!(changed_rows(377..393) > 0, "label missing");

        let indicator = temperature_difference(Location::Alicante, 22.0, Location::Bratislava, 9.0);
        let tier = indicator.tier.color();
        let tier_ink = (343..375).any(|y| (334..466).any(|x| *with_text.image.get_pixel(x, y) == tier));
        assert!(tier_ink, "no pixel in the tier colour {:?}", tier);
    }
}
