//! Flattening composite of a matted foreground onto a solid background.

use image::RgbaImage;
use rayon::prelude::*;
use tracing::debug;

use crate::cleanup::cleanup_gray_artifacts;
use crate::color::{brightness, is_grayish, quantize, rgb_of};
use crate::config::MattingConfig;
use crate::edges::EdgeRegion;
use crate::error::{Error, Result};
use crate::raster::AlphaMask;
use crate::refine::{refine_alpha_by_color, refine_mask};

/// Alpha outside (UNSETTLED_LOW, UNSETTLED_HIGH) is treated as decided.
const UNSETTLED_LOW: f32 = 0.05;
const UNSETTLED_HIGH: f32 = 0.95;
const HALO_LOW: f32 = 130.0;
const HALO_HIGH: f32 = 245.0;
const HALO_FACTOR: f32 = 0.08;
const SPILL_STRENGTH: f32 = 0.5;
const DARK: f32 = 50.0;
const DARK_BOOST: f32 = 0.5;
const BRIGHT_GRAY: f32 = 200.0;
const BRIGHT_GRAY_FACTOR: f32 = 0.1;
const BRIGHT: f32 = 180.0;
const BRIGHT_MAX_REDUCTION: f32 = 0.4;
const CLAMP_LOW: f32 = 0.08;
const CLAMP_HIGH: f32 = 0.92;

#[inline]
fn smoothstep(a: f32) -> f32 {
    a * a * (3.0 - 2.0 * a)
}

#[inline]
fn unsettled(a: f32) -> bool {
    a > UNSETTLED_LOW && a < UNSETTLED_HIGH
}

/// Final per-pixel matte. Returns the (spill-corrected) foreground color
/// and the alpha to blend with. Rules run in a fixed order; later ones see
/// the alpha written by earlier ones.
fn matte_pixel(
    rgb: [f32; 3],
    alpha: f32,
    in_edge: bool,
    background: [f32; 3],
    config: &MattingConfig,
) -> ([f32; 3], f32) {
    let b = brightness(rgb);
    let grayish = is_grayish(rgb, config.gray_tolerance);
    let mut a = smoothstep(alpha.clamp(0.0, 1.0));
    let mut color = rgb;

    if grayish && b > HALO_LOW && b < HALO_HIGH && unsettled(a) {
        a *= HALO_FACTOR;
    }

    if in_edge && unsettled(a) {
        let spill = (1.0 - a) * SPILL_STRENGTH;
        for i in 0..3 {
            color[i] = (rgb[i] + (rgb[i] - background[i]) * spill).clamp(0.0, 255.0);
        }

        if b < DARK {
            a += (1.0 - a) * DARK_BOOST;
        } else if b > BRIGHT_GRAY && grayish {
            a *= BRIGHT_GRAY_FACTOR;
        } else if b > BRIGHT {
            a *= 1.0 - BRIGHT_MAX_REDUCTION * ((b - BRIGHT) / 75.0).min(1.0);
        }
    }

    if a < CLAMP_LOW {
        a = 0.0;
    } else if a > CLAMP_HIGH {
        a = 1.0;
    }
    (color, a)
}

/// Matte `foreground` with `mask` and flatten it onto the configured
/// background. The result is fully opaque and has the foreground's size;
/// the mask is resampled first if its size differs.
pub fn composite(
    foreground: &RgbaImage,
    mask: &AlphaMask,
    config: &MattingConfig,
) -> Result<RgbaImage> {
    let (width, height) = foreground.dimensions();
    if width == 0 || height == 0 {
        return Err(Error::EmptyRaster { width, height });
    }
    let mask = mask.resized(width, height)?;

    let color_refined = refine_alpha_by_color(foreground, &mask, config)?;
    let refined = refine_mask(&color_refined, config.feather_radius);
    let edges = EdgeRegion::detect(&refined, config.edge_radius);
    let background = config.background.to_rgb();

    let mut out = RgbaImage::new(width, height);
    let mut scope = vec![false; (width as usize) * (height as usize)];
    out.par_chunks_mut(width as usize * 4)
        .zip(scope.par_chunks_mut(width as usize))
        .enumerate()
        .for_each(|(y, (row, scope_row))| {
            let y = y as u32;
            for (x, (px, touched)) in row.chunks_exact_mut(4).zip(scope_row).enumerate() {
                let x = x as u32;
                let fg = rgb_of(foreground.get_pixel(x, y));
                let in_edge = edges.contains(x, y);
                let alpha = refined.alpha(x, y) as f32 / 255.0;
                let (color, a) = matte_pixel(fg, alpha, in_edge, background, config);
                for i in 0..3 {
                    px[i] = quantize(color[i] * a + background[i] * (1.0 - a));
                }
                px[3] = u8::MAX;
                // confidently opaque subject pixels are final
                *touched = in_edge || a < 1.0;
            }
        });

    debug!(width, height, edge_pixels = edges.count(), "composited");
    cleanup_gray_artifacts(&out, foreground, &scope, config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Color;
    use image::Rgba;

    fn textured(width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_fn(width, height, |x, y| {
            Rgba([
                (x * 7 % 256) as u8,
                (y * 5 % 256) as u8,
                ((x + y) * 3 % 256) as u8,
                255,
            ])
        })
    }

    fn opaque(width: u32, height: u32) -> AlphaMask {
        AlphaMask::filled(width, height, 255)
    }

    fn half(width: u32, height: u32) -> AlphaMask {
        AlphaMask::filled(width, height, 128)
    }

    #[test]
    fn smoothstep_endpoints() {
        assert_eq!(smoothstep(0.0), 0.0);
        assert_eq!(smoothstep(1.0), 1.0);
        assert!((smoothstep(0.5) - 0.5).abs() < 1e-6);
        assert!(smoothstep(0.25) < 0.25);
    }

    #[test]
    fn opaque_mask_returns_foreground() {
        let fg = textured(40, 30);
        let out = composite(&fg, &opaque(40, 30), &MattingConfig::default()).unwrap();
        assert_eq!(out, fg);
    }

    #[test]
    fn white_clothing_under_opaque_mask_is_kept() {
        let fg = RgbaImage::from_fn(60, 60, |_, y| {
            if (25..35).contains(&y) {
                Rgba([250, 250, 250, 255])
            } else {
                Rgba([40, 30, 30, 255])
            }
        });
        let out = composite(&fg, &opaque(60, 60), &MattingConfig::default()).unwrap();
        assert_eq!(*out.get_pixel(30, 22), Rgba([40, 30, 30, 255]));
        assert_eq!(*out.get_pixel(30, 30), Rgba([250, 250, 250, 255]));
        assert_eq!(out, fg);
    }

    #[test]
    fn transparent_mask_returns_background() {
        let fg = textured(40, 30);
        let config = MattingConfig {
            background: Color::new(20, 90, 200),
            ..MattingConfig::default()
        };
        let out = composite(&fg, &AlphaMask::filled(40, 30, 0), &config).unwrap();
        assert!(out.pixels().all(|p| *p == Rgba([20, 90, 200, 255])));
    }

    #[test]
    fn smaller_mask_is_resampled() {
        let fg = textured(40, 30);
        let out = composite(&fg, &opaque(10, 10), &MattingConfig::default()).unwrap();
        assert_eq!(out.dimensions(), (40, 30));
        assert_eq!(out, fg);
    }

    #[test]
    fn empty_inputs_fail() {
        let config = MattingConfig::default();
        assert!(matches!(
            composite(&RgbaImage::new(0, 4), &AlphaMask::filled(4, 4, 255), &config),
            Err(Error::EmptyRaster { .. })
        ));
        assert!(matches!(
            composite(&textured(4, 4), &AlphaMask::new(0, 0), &config),
            Err(Error::EmptyRaster { .. })
        ));
    }

    #[test]
    fn half_alpha_gray_is_darker_than_a_linear_blend() {
        let fg = RgbaImage::from_pixel(32, 32, Rgba([128, 128, 128, 255]));
        let out = composite(&fg, &half(32, 32), &MattingConfig::default()).unwrap();
        let linear = 128.0 * 0.5 + 255.0 * 0.5;
        let v = out.get_pixel(16, 16)[0] as f32;
        // spill removal darkens it to about 175
        assert!(v < linear - 5.0, "got {v}");
        assert!(v > 128.0, "got {v}");
    }

    #[test]
    fn light_gray_halo_goes_to_background() {
        let fg = RgbaImage::from_pixel(32, 32, Rgba([180, 180, 180, 255]));
        let out = composite(&fg, &half(32, 32), &MattingConfig::default()).unwrap();
        assert!(out.pixels().all(|p| p[0] >= 250 && p[1] >= 250 && p[2] >= 250));
    }

    #[test]
    fn dark_edge_pixels_gain_alpha() {
        let bg = [255.0; 3];
        let config = MattingConfig::default();
        let (_, plain) = matte_pixel([40.0, 40.0, 40.0], 0.5, false, bg, &config);
        let (_, edge) = matte_pixel([40.0, 40.0, 40.0], 0.5, true, bg, &config);
        assert!(edge > plain);
    }

    #[test]
    fn spill_pushes_color_away_from_background() {
        let config = MattingConfig::default();
        let (color, _) = matte_pixel([120.0, 60.0, 30.0], 0.5, true, [255.0; 3], &config);
        assert!(color[0] < 120.0 && color[1] < 60.0 && color[2] < 30.0);
    }

    #[test]
    fn alpha_is_hard_clamped() {
        let config = MattingConfig::default();
        for step in 0..=100 {
            let alpha = step as f32 / 100.0;
            for &edge in &[false, true] {
                let (_, a) = matte_pixel([90.0, 60.0, 150.0], alpha, edge, [255.0; 3], &config);
                assert!(a == 0.0 || a == 1.0 || (CLAMP_LOW..=CLAMP_HIGH).contains(&a));
            }
        }
    }
}
