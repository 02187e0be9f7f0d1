//! Color helpers shared by the matting stages.
//!
//! Pixels are handled as `[f32; 3]` RGB triples in the 0..=255 range so that
//! intermediate adjustments (spill removal, blending) never saturate early.

use std::fmt;
use std::str::FromStr;

use image::Rgba;
use serde::{Deserialize, Serialize};

/// Largest possible Euclidean RGB distance, sqrt(255^2 * 3).
pub const MAX_COLOR_DISTANCE: f32 = 441.672_96;

/// An opaque sRGB color, written as `#RRGGBB`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const WHITE: Color = Color::new(255, 255, 255);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub fn to_rgb(self) -> [f32; 3] {
        [self.r as f32, self.g as f32, self.b as f32]
    }

    pub fn to_rgba(self) -> Rgba<u8> {
        Rgba([self.r, self.g, self.b, 255])
    }
}

impl Default for Color {
    fn default() -> Self {
        Color::WHITE
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

impl FromStr for Color {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s.trim().trim_start_matches('#');
        if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(format!("expected #RRGGBB, got {s:?}"));
        }
        let channel = |i: usize| {
            u8::from_str_radix(&hex[i..i + 2], 16).map_err(|e| format!("{s:?}: {e}"))
        };
        Ok(Color::new(channel(0)?, channel(2)?, channel(4)?))
    }
}

impl TryFrom<String> for Color {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Color> for String {
    fn from(c: Color) -> Self {
        c.to_string()
    }
}

#[inline]
pub fn rgb_of(p: &Rgba<u8>) -> [f32; 3] {
    [p[0] as f32, p[1] as f32, p[2] as f32]
}

/// Mean of the three channels.
#[inline]
pub fn brightness(c: [f32; 3]) -> f32 {
    (c[0] + c[1] + c[2]) / 3.0
}

/// Euclidean RGB distance divided by [`MAX_COLOR_DISTANCE`], in [0,1].
#[inline]
pub fn color_distance(c: [f32; 3], other: [f32; 3]) -> f32 {
    let dr = c[0] - other[0];
    let dg = c[1] - other[1];
    let db = c[2] - other[2];
    ((dr * dr + dg * dg + db * db).sqrt() / MAX_COLOR_DISTANCE).min(1.0)
}

/// True when every channel lies within `tolerance` of the channel mean.
#[inline]
pub fn is_grayish(c: [f32; 3], tolerance: f32) -> bool {
    let mean = brightness(c);
    c.iter().all(|v| (v - mean).abs() < tolerance)
}

/// How close a pixel is to `background` on a 0..=255 scale.
///
/// For a white background this is exactly [`brightness`].
#[inline]
pub fn closeness(c: [f32; 3], background: [f32; 3]) -> f32 {
    let deviation =
        ((c[0] - background[0]).abs() + (c[1] - background[1]).abs() + (c[2] - background[2]).abs())
            / 3.0;
    255.0 - deviation
}

/// Linear interpolation from `from` toward `to` by `t` in [0,1].
#[inline]
pub fn mix(from: [f32; 3], to: [f32; 3], t: f32) -> [f32; 3] {
    let t = t.clamp(0.0, 1.0);
    [
        from[0] + (to[0] - from[0]) * t,
        from[1] + (to[1] - from[1]) * t,
        from[2] + (to[2] - from[2]) * t,
    ]
}

#[inline]
pub fn quantize(v: f32) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}
