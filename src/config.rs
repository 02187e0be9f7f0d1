//! Tunables for matting and framing.
//!
//! Every threshold that more than one stage depends on lives here so the
//! pipeline passes a single value around instead of re-deriving constants.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::color::Color;
use crate::error::Result;

/// Brightness cut-offs (0..=255 channel mean) used by the color-aware refiner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrightnessThresholds {
    /// Above this, pixels close to the background color lose alpha.
    pub near_background: f32,
    /// Lower bound of the gray-halo band.
    pub gray_low: f32,
    /// Upper bound of the gray-halo band.
    pub gray_high: f32,
    /// Below this, confident pixels are pushed toward opaque.
    pub dark: f32,
}

impl Default for BrightnessThresholds {
    fn default() -> Self {
        Self {
            near_background: 180.0,
            gray_low: 140.0,
            gray_high: 220.0,
            dark: 50.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MattingConfig {
    pub background: Color,
    /// Minimum feather radius in pixels; scaled up for large images.
    pub feather_radius: f32,
    /// Max per-channel deviation from the mean for a pixel to count as gray.
    pub gray_tolerance: f32,
    /// Half-width of the square window scanned by the edge detector.
    pub edge_radius: u32,
    pub brightness: BrightnessThresholds,
}

impl Default for MattingConfig {
    fn default() -> Self {
        Self {
            background: Color::WHITE,
            feather_radius: 3.0,
            gray_tolerance: 25.0,
            edge_radius: 4,
            brightness: BrightnessThresholds::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CropConfig {
    /// Fraction of the frame height taken by the padded face box.
    pub head_to_frame_ratio: f32,
    /// Space above the face box, as a fraction of its height.
    pub headroom_ratio: f32,
    /// Padding added to each axis of the face-oval box.
    pub face_padding: f32,
}

impl Default for CropConfig {
    fn default() -> Self {
        Self {
            head_to_frame_ratio: 0.6,
            headroom_ratio: 0.35,
            face_padding: 0.15,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub matting: MattingConfig,
    pub crop: CropConfig,
    /// Eye-line tilt (degrees) below which the photo is not re-leveled.
    pub leveling_threshold_deg: f32,
    /// Fine-tune rotations smaller than this are ignored.
    pub fine_rotation_threshold_deg: f32,
    /// Longest side handed to the segmentation model. `None` keeps full size.
    pub max_segmentation_side: Option<u32>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            matting: MattingConfig::default(),
            crop: CropConfig::default(),
            leveling_threshold_deg: 0.5,
            fine_rotation_threshold_deg: 0.1,
            max_segmentation_side: Some(1024),
        }
    }
}

impl PipelineConfig {
    /// Load a configuration from a JSON file. Missing fields keep defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        let config = serde_json::from_reader(BufReader::new(file))?;
        Ok(config)
    }
}
