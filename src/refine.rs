//! Mask refinement: color-aware alpha correction and the multi-pass
//! morphology/feather sequence.

use image::RgbaImage;
use rayon::prelude::*;
use tracing::debug;

use crate::color::{brightness, color_distance, is_grayish, quantize, rgb_of};
use crate::config::MattingConfig;
use crate::edges::EdgeRegion;
use crate::error::{Error, Result};
use crate::morphology::{dilate, erode, gaussian_blur};
use crate::raster::AlphaMask;

/// Normalized distance to the background below which bright pixels fade.
const HALO_DISTANCE: f32 = 0.2;
const GRAY_BAND_MAX_ALPHA: f32 = 0.85;
const GRAY_BAND_FACTOR: f32 = 0.3;
const EDGE_GRAY_BRIGHTNESS: f32 = 160.0;
const EDGE_GRAY_TOLERANCE: f32 = 35.0;
const EDGE_GRAY_MAX_ALPHA: f32 = 0.9;
const EDGE_GRAY_CAP: f32 = 0.1;
const EDGE_DARK_BRIGHTNESS: f32 = 70.0;
const EDGE_DARK_MIN_ALPHA: f32 = 0.2;
const DARK_MIN_ALPHA: f32 = 0.4;
const DARK_BOOST: f32 = 0.5;

/// Adjust one pixel's alpha (0..=1) from its color. Rules apply in order and
/// later rules see earlier results. Fully opaque pixels away from the edge
/// band are subject and pass through unchanged.
fn refine_pixel(rgb: [f32; 3], alpha: f32, in_edge: bool, config: &MattingConfig) -> f32 {
    if alpha >= 1.0 && !in_edge {
        return 1.0;
    }
    let thresholds = &config.brightness;
    let b = brightness(rgb);
    let distance = color_distance(rgb, config.background.to_rgb());
    let mut a = alpha;

    if b > thresholds.near_background && distance < HALO_DISTANCE {
        let t = distance / HALO_DISTANCE;
        a *= t * t;
    }

    if b > thresholds.gray_low
        && b < thresholds.gray_high
        && is_grayish(rgb, config.gray_tolerance)
        && a < GRAY_BAND_MAX_ALPHA
    {
        a *= GRAY_BAND_FACTOR;
    }

    let mut boosted = false;
    if in_edge {
        let gray_halo = b > EDGE_GRAY_BRIGHTNESS
            && is_grayish(rgb, EDGE_GRAY_TOLERANCE)
            && a < EDGE_GRAY_MAX_ALPHA;
        if gray_halo {
            a = a.min(EDGE_GRAY_CAP);
        } else if b < EDGE_DARK_BRIGHTNESS && a > EDGE_DARK_MIN_ALPHA {
            let darkness = 1.0 - b / EDGE_DARK_BRIGHTNESS;
            a += (1.0 - a) * darkness;
            boosted = true;
        }
    }

    if !boosted && b < thresholds.dark && a > DARK_MIN_ALPHA {
        a += (1.0 - a) * DARK_BOOST;
    }

    a.clamp(0.0, 1.0)
}

/// Correct the raw segmentation alpha using foreground color.
///
/// Bright pixels close to the background color and gray mid-tones lose
/// alpha (upstream models leave a light halo around hair and shoulders);
/// dark transition pixels gain alpha.
pub fn refine_alpha_by_color(
    foreground: &RgbaImage,
    mask: &AlphaMask,
    config: &MattingConfig,
) -> Result<AlphaMask> {
    let (width, height) = foreground.dimensions();
    if mask.dimensions() != (width, height) {
        return Err(Error::DegenerateGeometry(format!(
            "mask is {}x{} but foreground is {width}x{height}",
            mask.width(),
            mask.height()
        )));
    }
    if mask.is_empty() {
        return Ok(mask.clone());
    }

    let edges = EdgeRegion::detect(mask, config.edge_radius);
    let mut out = AlphaMask::new(width, height);
    out.as_mut_raw()
        .par_chunks_mut(width as usize)
        .enumerate()
        .for_each(|(y, row)| {
            let y = y as u32;
            for (x, dst) in row.iter_mut().enumerate() {
                let x = x as u32;
                let rgb = rgb_of(foreground.get_pixel(x, y));
                let alpha = mask.alpha(x, y) as f32 / 255.0;
                let refined = refine_pixel(rgb, alpha, edges.contains(x, y), config);
                *dst = quantize(refined * 255.0);
            }
        });

    debug!(edge_pixels = edges.count(), "color-aware refinement done");
    Ok(out)
}

/// Erosion radius that retracts halos, scaled with resolution.
pub fn halo_erosion_radius(width: u32, height: u32) -> u32 {
    ((width.min(height) as f32 / 350.0).round() as u32).max(2)
}

/// Feather radius scaled with resolution, never below `feather_radius`.
pub fn feather_radius(width: u32, height: u32, feather_radius: f32) -> f32 {
    (width.min(height) as f32 / 100.0).max(feather_radius)
}

/// Speckle removal, halo retraction and feathering.
pub fn refine_mask(mask: &AlphaMask, feather: f32) -> AlphaMask {
    let (width, height) = mask.dimensions();

    let mut current = mask.clone();
    for _ in 0..2 {
        current = dilate(&erode(&current, 1), 1);
    }

    let erosion = halo_erosion_radius(width, height);
    current = erode(&current, erosion);

    let blur = feather_radius(width, height, feather);
    debug!(erosion, blur, "multi-pass mask refinement");
    gaussian_blur(&current, blur)
}
