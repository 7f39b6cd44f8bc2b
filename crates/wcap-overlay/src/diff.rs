//! Temperature difference indicator between the two locations

use image::Rgb;
use std::fmt;
use wcap_core::Location;

/// Magnitude thresholds separating the three tiers per direction
pub const DIFF_TIER_MILD: f64 = 8.0;
pub const DIFF_TIER_STRONG: f64 = 15.0;

/// Colour tier of a temperature difference
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffTier {
    LightOrange,
    Orange,
    RedOrange,
    VeryLightBlue,
    LightBlue,
    DeepBlue,
    Gray,
}

impl DiffTier {
    pub fn for_difference(diff: f64) -> Self {
        let magnitude = diff.abs();
        if diff > 0.0 {
            if magnitude <= DIFF_TIER_MILD {
                DiffTier::LightOrange
            } else if magnitude <= DIFF_TIER_STRONG {
                DiffTier::Orange
            } else {
                DiffTier::RedOrange
            }
        } else if diff < 0.0 {
            if magnitude <= DIFF_TIER_MILD {
                DiffTier::VeryLightBlue
            } else if magnitude <= DIFF_TIER_STRONG {
                DiffTier::LightBlue
            } else {
                DiffTier::DeepBlue
            }
        } else {
            DiffTier::Gray
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            DiffTier::LightOrange => "Light orange",
            DiffTier::Orange => "Orange",
            DiffTier::RedOrange => "Red-orange",
            DiffTier::VeryLightBlue => "Very light blue",
            DiffTier::LightBlue => "Light blue",
            DiffTier::DeepBlue => "Deep blue",
            DiffTier::Gray => "Gray",
        }
    }

    pub fn color(&self) -> Rgb<u8> {
        match self {
            DiffTier::LightOrange => Rgb([255, 200, 100]),
            DiffTier::Orange => Rgb([255, 165, 0]),
            DiffTier::RedOrange => Rgb([255, 100, 50]),
            DiffTier::VeryLightBlue => Rgb([150, 220, 255]),
            DiffTier::LightBlue => Rgb([100, 200, 255]),
            DiffTier::DeepBlue => Rgb([50, 150, 255]),
            DiffTier::Gray => Rgb([200, 200, 200]),
        }
    }
}

impl fmt::Display for DiffTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Everything the indicator box draws
#[derive(Debug, Clone, PartialEq)]
pub struct DiffIndicator {
    /// `first - second`, rounded to one decimal
    pub diff: f64,
    /// Signed value, e.g. `+13.0°`
    pub text: String,
    pub tier: DiffTier,
    pub arrow: &'static str,
    pub label: String,
    pub border: Rgb<u8>,
}

const WARM_BORDER: Rgb<u8> = Rgb([255, 200, 100]);
const COOL_BORDER: Rgb<u8> = Rgb([100, 200, 255]);
const NEUTRAL_BORDER: Rgb<u8> = Rgb([200, 200, 200]);

/// Compare `first` against `second`; positive means `first` is warmer
pub fn temperature_difference(
    first: Location,
    first_temp: f64,
    second: Location,
    second_temp: f64,
) -> DiffIndicator {
    let diff = ((first_temp - second_temp) * 10.0).round() / 10.0;
    let tier = DiffTier::for_difference(diff);

    let (arrow, label, border) = if diff > 0.0 {
        ("▲", format!("{} warmer", first.short_code()), WARM_BORDER)
    } else if diff < 0.0 {
        ("▼", format!("{} warmer", second.short_code()), COOL_BORDER)
    } else {
        ("=", "Same temp".to_string(), NEUTRAL_BORDER)
    };

    // Avoid rendering "-0.0°"
    let text = if diff == 0.0 {
        "0.0°".to_string()
    } else {
        format!("{:+.1}°", diff)
    };

    DiffIndicator {
        diff,
        text,
        tier,
        arrow,
        label,
        border,
    }
}
