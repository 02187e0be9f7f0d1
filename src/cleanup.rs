//! Neighborhood-aware removal of gray halo pixels left after compositing.

use image::RgbaImage;
use rayon::prelude::*;

use crate::color::{closeness, is_grayish, mix, quantize, rgb_of};
use crate::config::MattingConfig;
use crate::error::{Error, Result};

const PASSES: u32 = 3;
const BASE_RADIUS: u32 = 4;
/// Pixels at or below this closeness are subject, at or above it background.
const SUBJECT_MAX: f32 = 100.0;
const BACKGROUND_MIN: f32 = 252.0;
const NEAR_BACKGROUND: f32 = 248.0;
const NEAR_DARK: f32 = 70.0;
const MIN_BACKGROUND_FRACTION: f32 = 0.3;
const MAX_DARK_FRACTION: f32 = 0.15;
const FORCE_BACKGROUND_FRACTION: f32 = 0.5;
const FORCE_LOW: f32 = 180.0;
const FORCE_HIGH: f32 = 240.0;
const FINAL_MIN: f32 = 240.0;
const FINAL_TOLERANCE: f32 = 15.0;

/// Ring of offsets with 0 < dx² + dy² <= radius².
fn ring_offsets(radius: u32) -> Vec<(i64, i64)> {
    let r = radius as i64;
    let mut offsets = Vec::new();
    for dy in -r..=r {
        for dx in -r..=r {
            let d2 = dx * dx + dy * dy;
            if d2 > 0 && d2 <= r * r {
                offsets.push((dx, dy));
            }
        }
    }
    offsets
}

/// Fractions of in-bounds neighbors that are near the background and dark.
fn neighborhood(
    image: &RgbaImage,
    x: i64,
    y: i64,
    offsets: &[(i64, i64)],
    background: [f32; 3],
) -> (f32, f32) {
    let (w, h) = (image.width() as i64, image.height() as i64);
    let (mut total, mut near_bg, mut dark) = (0u32, 0u32, 0u32);
    for &(dx, dy) in offsets {
        let (nx, ny) = (x + dx, y + dy);
        if nx < 0 || ny < 0 || nx >= w || ny >= h {
            continue;
        }
        let c = closeness(rgb_of(image.get_pixel(nx as u32, ny as u32)), background);
        total += 1;
        if c > NEAR_BACKGROUND {
            near_bg += 1;
        }
        if c < NEAR_DARK {
            dark += 1;
        }
    }
    if total == 0 {
        return (0.0, 0.0);
    }
    (near_bg as f32 / total as f32, dark as f32 / total as f32)
}

/// Pull gray pixels that sit mostly among background pixels onto the
/// background color.
///
/// `original` is the foreground before compositing; a pixel counts as gray
/// if it is gray now or was gray there. Only pixels whose `scope` entry is
/// set are touched. All three inputs must cover the same pixels.
pub fn cleanup_gray_artifacts(
    composited: &RgbaImage,
    original: &RgbaImage,
    scope: &[bool],
    config: &MattingConfig,
) -> Result<RgbaImage> {
    let (width, height) = composited.dimensions();
    if width == 0 || height == 0 {
        return Err(Error::EmptyRaster { width, height });
    }
    if original.dimensions() != (width, height) {
        return Err(Error::DegenerateGeometry(format!(
            "original is {}x{} but composite is {width}x{height}",
            original.width(),
            original.height()
        )));
    }
    let pixels = (width as usize) * (height as usize);
    if scope.len() != pixels {
        return Err(Error::DegenerateGeometry(format!(
            "scope covers {} pixels but composite has {pixels}",
            scope.len()
        )));
    }
    let background = config.background.to_rgb();
    let tolerance = config.gray_tolerance;
    let row_len = width as usize * 4;

    let mut current = composited.clone();
    for pass in 0..PASSES {
        let offsets = ring_offsets(BASE_RADIUS + pass);
        let src = &current;
        let mut next = current.clone();
        next.par_chunks_mut(row_len)
            .enumerate()
            .for_each(|(y, row)| {
                for (x, px) in row.chunks_exact_mut(4).enumerate() {
                    if !scope[y * width as usize + x] {
                        continue;
                    }
                    let rgb = [px[0] as f32, px[1] as f32, px[2] as f32];
                    let c = closeness(rgb, background);
                    if c <= SUBJECT_MAX || c >= BACKGROUND_MIN {
                        continue;
                    }
                    let was = rgb_of(original.get_pixel(x as u32, y as u32));
                    if !is_grayish(rgb, tolerance) && !is_grayish(was, tolerance) {
                        continue;
                    }

                    let (bg_fraction, dark_fraction) =
                        neighborhood(src, x as i64, y as i64, &offsets, background);
                    let mut out = rgb;
                    if bg_fraction > MIN_BACKGROUND_FRACTION && dark_fraction < MAX_DARK_FRACTION {
                        let excess = (bg_fraction - MIN_BACKGROUND_FRACTION)
                            / (1.0 - MIN_BACKGROUND_FRACTION);
                        let nearness = (c - SUBJECT_MAX) / (BACKGROUND_MIN - SUBJECT_MAX);
                        out = mix(out, background, excess * nearness);
                    }
                    if c > FORCE_LOW && c < FORCE_HIGH && bg_fraction > FORCE_BACKGROUND_FRACTION {
                        out = background;
                    }
                    for i in 0..3 {
                        px[i] = quantize(out[i]);
                    }
                }
            });
        current = next;
    }

    // Last sweep: anything almost background and neutral becomes background.
    current
        .par_chunks_mut(row_len)
        .enumerate()
        .for_each(|(y, row)| {
            for (x, px) in row.chunks_exact_mut(4).enumerate() {
                if !scope[y * width as usize + x] {
                    continue;
                }
                let rgb = [px[0] as f32, px[1] as f32, px[2] as f32];
                if closeness(rgb, background) >= FINAL_MIN && is_grayish(rgb, FINAL_TOLERANCE) {
                    for i in 0..3 {
                        px[i] = quantize(background[i]);
                    }
                }
            }
        });

    Ok(current)
}
