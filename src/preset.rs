//! Output size presets and physical-unit conversions.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

const MM_PER_INCH: f32 = 25.4;

/// Physical unit a preset is specified in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Unit {
    #[serde(rename = "mm")]
    Millimeters,
    Inches,
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Unit::Millimeters => f.write_str("mm"),
            Unit::Inches => f.write_str("in"),
        }
    }
}

pub fn mm_to_pixels(mm: f32, dpi: u32) -> u32 {
    (mm / MM_PER_INCH * dpi as f32).round().max(0.0) as u32
}

pub fn inches_to_pixels(inches: f32, dpi: u32) -> u32 {
    (inches * dpi as f32).round().max(0.0) as u32
}

pub fn pixels_to_mm(pixels: u32, dpi: u32) -> f32 {
    pixels as f32 / dpi as f32 * MM_PER_INCH
}

pub fn pixels_to_inches(pixels: u32, dpi: u32) -> f32 {
    pixels as f32 / dpi as f32
}

/// Final output geometry: physical size plus the exact pixel size it
/// resolves to at `dpi`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SizePreset {
    pub name: String,
    pub width: f32,
    pub height: f32,
    pub unit: Unit,
    pub dpi: u32,
    pub width_px: u32,
    pub height_px: u32,
}

impl SizePreset {
    /// 2x2 in at 300 dpi.
    pub fn us_passport() -> Self {
        Self::physical("US Passport (2x2 in)", 2.0, 2.0, Unit::Inches, 300)
    }

    /// 35x45 mm at 300 dpi.
    pub fn eu_schengen() -> Self {
        Self::physical("EU/Schengen (35x45 mm)", 35.0, 45.0, Unit::Millimeters, 300)
    }

    /// 33x48 mm at 300 dpi.
    pub fn china_visa() -> Self {
        Self::physical("China Visa (33x48 mm)", 33.0, 48.0, Unit::Millimeters, 300)
    }

    pub fn builtin() -> Vec<Self> {
        vec![Self::us_passport(), Self::eu_schengen(), Self::china_visa()]
    }

    /// User-defined size. Every value must be positive and resolve to at
    /// least one pixel per side.
    pub fn custom(width: f32, height: f32, unit: Unit, dpi: u32) -> Result<Self> {
        let positive = |v: f32| v.is_finite() && v > 0.0;
        if !positive(width) || !positive(height) || dpi == 0 {
            return Err(Error::InvalidPreset(format!(
                "{width}x{height} {unit} at {dpi} dpi"
            )));
        }
        let name = format!("Custom ({width}x{height} {unit})");
        let preset = Self::physical(&name, width, height, unit, dpi);
        if preset.width_px == 0 || preset.height_px == 0 {
            return Err(Error::InvalidPreset(format!(
                "{name} is smaller than a pixel at {dpi} dpi"
            )));
        }
        Ok(preset)
    }

    fn physical(name: &str, width: f32, height: f32, unit: Unit, dpi: u32) -> Self {
        let to_px = match unit {
            Unit::Millimeters => mm_to_pixels,
            Unit::Inches => inches_to_pixels,
        };
        Self {
            name: name.to_string(),
            width,
            height,
            unit,
            dpi,
            width_px: to_px(width, dpi),
            height_px: to_px(height, dpi),
        }
    }

    /// Width over height of the pixel target.
    pub fn aspect_ratio(&self) -> f32 {
        self.width_px as f32 / self.height_px as f32
    }
}

impl fmt::Display for SizePreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} - {}x{} px @ {} dpi",
            self.name, self.width_px, self.height_px, self.dpi
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_pixel_sizes() {
        let us = SizePreset::us_passport();
        assert_eq!((us.width_px, us.height_px), (600, 600));
        assert_eq!(us.aspect_ratio(), 1.0);

        let eu = SizePreset::eu_schengen();
        assert_eq!((eu.width_px, eu.height_px), (413, 531));

        let cn = SizePreset::china_visa();
        assert_eq!((cn.width_px, cn.height_px), (390, 567));

        assert_eq!(SizePreset::builtin().len(), 3);
    }

    #[test]
    fn unit_round_trip() {
        for &dpi in &[150u32, 300, 600] {
            let half_pixel_mm = MM_PER_INCH / dpi as f32 / 2.0;
            for &mm in &[1.0f32, 25.4, 33.0, 35.0, 45.0, 48.0, 51.0, 100.0] {
                let back = pixels_to_mm(mm_to_pixels(mm, dpi), dpi);
                assert!((back - mm).abs() <= half_pixel_mm + 1e-4, "{mm} mm @ {dpi}");
            }
            for &inches in &[0.5f32, 1.0, 2.0, 3.5] {
                let back = pixels_to_inches(inches_to_pixels(inches, dpi), dpi);
                assert!((back - inches).abs() < 1e-4);
            }
        }
    }

    #[test]
    fn custom_presets() {
        let p = SizePreset::custom(40.0, 50.0, Unit::Millimeters, 300).unwrap();
        assert_eq!((p.width_px, p.height_px), (472, 591));
        assert_eq!(p.name, "Custom (40x50 mm)");

        let p = SizePreset::custom(1.5, 2.0, Unit::Inches, 600).unwrap();
        assert_eq!((p.width_px, p.height_px), (900, 1200));

        assert!(SizePreset::custom(0.0, 50.0, Unit::Millimeters, 300).is_err());
        assert!(SizePreset::custom(40.0, -1.0, Unit::Millimeters, 300).is_err());
        assert!(SizePreset::custom(40.0, 50.0, Unit::Millimeters, 0).is_err());
        assert!(SizePreset::custom(0.01, 0.01, Unit::Millimeters, 10).is_err());
    }

    #[test]
    fn unit_serde() {
        assert_eq!(serde_json::to_string(&Unit::Millimeters).unwrap(), "\"mm\"");
        assert_eq!(serde_json::to_string(&Unit::Inches).unwrap(), "\"inches\"");
    }
}
