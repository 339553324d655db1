//! Age-based visual decay.
//!
//! Maps an entity's age and its feed's TTL to the color and opacity the
//! renderer paints it with. Everything here is pure: the publisher calls
//! [`DecayRamp::weight`] for every visible entity on each decay tick.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;
use std::time::Duration;

/// 24-bit color, serialized as `#rrggbb`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub fn parse_hex(s: &str) -> Result<Self, String> {
        let hex = s.trim().trim_start_matches('#');
        if hex.len() != 6 || !hex.is_ascii() {
            return Err(format!("expected #rrggbb color, got '{}'", s));
        }
        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&hex[range], 16).map_err(|_| format!("invalid hex color '{}'", s))
        };
        Ok(Self::new(channel(0..2)?, channel(2..4)?, channel(4..6)?))
    }

    pub fn to_hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }

    fn lerp(self, other: Rgb, t: f64) -> Rgb {
        let mix = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * t).round() as u8;
        Rgb::new(mix(self.r, other.r), mix(self.g, other.g), mix(self.b, other.b))
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl TryFrom<String> for Rgb {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Rgb::parse_hex(&value)
    }
}

impl From<Rgb> for String {
    fn from(color: Rgb) -> Self {
        color.to_hex()
    }
}

/// Visual weight painted for one entity.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Weight {
    pub color: Rgb,
    pub opacity: f64,
}

/// Color control point at `at` × TTL.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ColorStop {
    pub at: f64,
    pub color: Rgb,
}

/// Opacity control point at `at` × TTL.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct OpacityStop {
    pub at: f64,
    pub opacity: f64,
}

/// Piecewise-linear decay curve over the fraction of TTL elapsed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DecayRamp {
    pub color: Vec<ColorStop>,
    pub opacity: Vec<OpacityStop>,
}

pub const FRESH_COLOR: Rgb = Rgb::new(0xff, 0xff, 0xff);
pub const MID_COLOR: Rgb = Rgb::new(0x63, 0xb3, 0xed);
pub const FADED_COLOR: Rgb = Rgb::new(0x2c, 0x52, 0x82);

impl Default for DecayRamp {
    fn default() -> Self {
        Self {
            color: vec![
                ColorStop { at: 0.0, color: FRESH_COLOR },
                ColorStop { at: 0.5, color: MID_COLOR },
                ColorStop { at: 1.0, color: FADED_COLOR },
            ],
            opacity: vec![
                OpacityStop { at: 0.0, opacity: 0.9 },
                OpacityStop { at: 0.5, opacity: 0.7 },
                OpacityStop { at: 1.0, opacity: 0.0 },
            ],
        }
    }
}

impl DecayRamp {
    /// Weight for an entity of the given age.
    ///
    /// Age at or beyond the TTL (and any age under a zero TTL) is fully
    /// decayed: opacity 0, last color stop.
    pub fn weight(&self, age: Duration, ttl: Duration) -> Weight {
        let faded = self.color.last().map(|s| s.color).unwrap_or(FADED_COLOR);
        if ttl.is_zero() || age >= ttl {
            return Weight {
                color: faded,
                opacity: 0.0,
            };
        }

        let fraction = age.as_secs_f64() / ttl.as_secs_f64();

        let color = match locate(&self.color, fraction, |s| s.at) {
            Some((lo, hi, t)) => lo.color.lerp(hi.color, t),
            None => faded,
        };
        let opacity = match locate(&self.opacity, fraction, |s| s.at) {
            Some((lo, hi, t)) => lo.opacity + (hi.opacity - lo.opacity) * t,
            None => 0.0,
        };

        Weight {
            color,
            opacity: opacity.clamp(0.0, 1.0),
        }
    }

    /// Reject ramps that would not fade monotonically from age 0 to the TTL.
    pub fn check(&self) -> Result<(), String> {
        check_positions(&self.color.iter().map(|s| s.at).collect::<Vec<_>>(), "color")?;
        check_positions(&self.opacity.iter().map(|s| s.at).collect::<Vec<_>>(), "opacity")?;

        if self
            .opacity
            .iter()
            .any(|s| !s.opacity.is_finite() || !(0.0..=1.0).contains(&s.opacity))
        {
            return Err("opacity values must lie in [0, 1]".to_string());
        }
        if self.opacity.windows(2).any(|w| w[1].opacity > w[0].opacity) {
            return Err("opacity must not increase with age".to_string());
        }
        Ok(())
    }
}

fn check_positions(ats: &[f64], name: &str) -> Result<(), String> {
    if ats.len() < 2 {
        return Err(format!("{} ramp needs at least two stops", name));
    }
    if ats.first() != Some(&0.0) || ats.last() != Some(&1.0) {
        return Err(format!("{} ramp must start at 0.0 and end at 1.0", name));
    }
    if ats.windows(2).any(|w| !(w[1] > w[0])) {
        return Err(format!("{} stops must be strictly increasing", name));
    }
    Ok(())
}

/// Find the segment containing `fraction`; returns its ends and the local
/// interpolation parameter.
fn locate<S>(stops: &[S], fraction: f64, at: impl Fn(&S) -> f64) -> Option<(&S, &S, f64)> {
    let first = stops.first()?;
    if fraction <= at(first) {
        return Some((first, first, 0.0));
    }
    for pair in stops.windows(2) {
        let (lo, hi) = (&pair[0], &pair[1]);
        if fraction <= at(hi) {
            let span = at(hi) - at(lo);
            let t = if span > 0.0 {
                (fraction - at(lo)) / span
            } else {
                1.0
            };
            return Some((lo, hi, t));
        }
    }
    let last = stops.last()?;
    Some((last, last, 0.0))
}

fn default_ramp() -> &'static DecayRamp {
    static DEFAULT: OnceLock<DecayRamp> = OnceLock::new();
    DEFAULT.get_or_init(DecayRamp::default)
}

/// Weight under the default ramp.
pub fn weight(age: Duration, ttl: Duration) -> Weight {
    default_ramp().weight(age, ttl)
}
