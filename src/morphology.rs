//! Morphological filters over an [`AlphaMask`].
//!
//! Each filter reads only its immutable input and writes a separate output
//! mask, row by row in parallel. Reads past the border are clamped to the
//! nearest edge pixel.

use rayon::prelude::*;

use crate::raster::AlphaMask;

/// Offsets (dx, dy) with dx² + dy² <= radius².
fn disk_offsets(radius: u32) -> Vec<(i64, i64)> {
    let r = radius as i64;
    let r2 = r * r;
    let mut offsets = Vec::with_capacity(((2 * r + 1) * (2 * r + 1)) as usize);
    for dy in -r..=r {
        for dx in -r..=r {
            if dx * dx + dy * dy <= r2 {
                offsets.push((dx, dy));
            }
        }
    }
    offsets
}

fn disk_filter<F>(mask: &AlphaMask, radius: u32, init: u8, pick: F) -> AlphaMask
where
    F: Fn(u8, u8) -> u8 + Sync,
{
    if radius == 0 || mask.is_empty() {
        return mask.clone();
    }
    let (width, height) = mask.dimensions();
    let offsets = disk_offsets(radius);
    let mut out = AlphaMask::new(width, height);

    out.as_mut_raw()
        .par_chunks_mut(width as usize)
        .enumerate()
        .for_each(|(y, row)| {
            let y = y as i64;
            for (x, dst) in row.iter_mut().enumerate() {
                let x = x as i64;
                *dst = offsets
                    .iter()
                    .fold(init, |acc, &(dx, dy)| pick(acc, mask.alpha_clamped(x + dx, y + dy)));
            }
        });

    out
}

/// Minimum alpha over a disk of `radius`; shrinks the foreground.
pub fn erode(mask: &AlphaMask, radius: u32) -> AlphaMask {
    disk_filter(mask, radius, u8::MAX, u8::min)
}

/// Maximum alpha over a disk of `radius`; grows the foreground.
pub fn dilate(mask: &AlphaMask, radius: u32) -> AlphaMask {
    disk_filter(mask, radius, u8::MIN, u8::max)
}

/// Normalized 1D Gaussian with sigma = radius / 2 and 2·ceil(radius)+1 taps.
pub fn gaussian_kernel(radius: f32) -> Vec<f32> {
    let half = radius.max(0.0).ceil() as i64;
    let sigma = radius / 2.0;
    let denom = 2.0 * sigma * sigma;
    let mut kernel: Vec<f32> = (-half..=half)
        .map(|i| (-((i * i) as f32) / denom).exp())
        .collect();
    let sum: f32 = kernel.iter().sum();
    for w in &mut kernel {
        *w /= sum;
    }
    kernel
}

/// Separable Gaussian smoothing. Radii below half a pixel return a copy.
pub fn gaussian_blur(mask: &AlphaMask, radius: f32) -> AlphaMask {
    if !(radius >= 0.5) || mask.is_empty() {
        return mask.clone();
    }
    let (width, height) = mask.dimensions();
    let kernel = gaussian_kernel(radius);
    let half = (kernel.len() / 2) as i64;
    let (w, h) = (width as i64, height as i64);

    // horizontal pass keeps full precision for the vertical one
    let mut horizontal = vec![0.0f32; (width * height) as usize];
    horizontal
        .par_chunks_mut(width as usize)
        .enumerate()
        .for_each(|(y, row)| {
            let y = y as i64;
            for (x, dst) in row.iter_mut().enumerate() {
                let x = x as i64;
                *dst = kernel
                    .iter()
                    .zip(-half..=half)
                    .map(|(k, d)| k * mask.alpha_clamped(x + d, y) as f32)
                    .sum();
            }
        });

    let mut out = AlphaMask::new(width, height);
    out.as_mut_raw()
        .par_chunks_mut(width as usize)
        .enumerate()
        .for_each(|(y, row)| {
            let y = y as i64;
            for (x, dst) in row.iter_mut().enumerate() {
                let v: f32 = kernel
                    .iter()
                    .zip(-half..=half)
                    .map(|(k, d)| {
                        let sy = (y + d).clamp(0, h - 1);
                        k * horizontal[(sy * w) as usize + x]
                    })
                    .sum();
                *dst = v.round().clamp(0.0, 255.0) as u8;
            }
        });

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square_mask(size: u32, lo: u32, hi: u32) -> AlphaMask {
        AlphaMask::from_fn(size, size, |x, y| {
            if (lo..hi).contains(&x) && (lo..hi).contains(&y) {
                255
            } else {
                0
            }
        })
    }

    #[test]
    fn disk_shape() {
        assert_eq!(disk_offsets(0), vec![(0, 0)]);
        // radius 1 is a plus sign
        assert_eq!(disk_offsets(1).len(), 5);
        assert_eq!(disk_offsets(2).len(), 13);
    }

    #[test]
    fn erode_removes_isolated_speck() {
        let mut mask = AlphaMask::new(9, 9);
        mask.as_mut_raw()[4 * 9 + 4] = 255;
        let eroded = erode(&mask, 1);
        assert!(eroded.as_raw().iter().all(|&a| a == 0));
    }

    #[test]
    fn erode_then_dilate_keeps_large_regions() {
        let mask = square_mask(20, 5, 15);
        let opened = dilate(&erode(&mask, 1), 1);
        // interior and straight edges survive the opening
        assert_eq!(opened.alpha(10, 10), 255);
        assert_eq!(opened.alpha(5, 10), 255);
        assert_eq!(opened.alpha(2, 2), 0);
    }

    #[test]
    fn dilate_grows_by_radius() {
        let mask = square_mask(20, 8, 12);
        let grown = dilate(&mask, 2);
        assert_eq!(grown.alpha(6, 10), 255);
        assert_eq!(grown.alpha(5, 10), 0);
    }

    #[test]
    fn erosion_never_exceeds_input() {
        let mask = AlphaMask::from_fn(16, 12, |x, y| ((x * 37 + y * 91) % 256) as u8);
        for r in 1..4 {
            let dilated = dilate(&mask, r);
            let closed = erode(&dilated, r);
            for (c, d) in closed.as_raw().iter().zip(dilated.as_raw()) {
                assert!(c <= d);
            }
            for (d, m) in dilated.as_raw().iter().zip(mask.as_raw()) {
                assert!(d >= m);
            }
        }
    }

    #[test]
    fn kernel_is_normalized() {
        let k = gaussian_kernel(3.0);
        assert_eq!(k.len(), 7);
        assert!((k.iter().sum::<f32>() - 1.0).abs() < 1e-5);
        assert!(k[3] > k[2] && k[2] > k[1]);
        assert!((k[0] - k[6]).abs() < 1e-7);

        assert_eq!(gaussian_kernel(2.5).len(), 7);
    }

    #[test]
    fn blur_preserves_uniform_mask() {
        let mask = AlphaMask::filled(10, 7, 128);
        let blurred = gaussian_blur(&mask, 4.0);
        assert!(blurred.as_raw().iter().all(|&a| a == 128));
    }

    #[test]
    fn blur_softens_step() {
        let mask = AlphaMask::from_fn(21, 5, |x, _| if x < 10 { 0 } else { 255 });
        let blurred = gaussian_blur(&mask, 3.0);
        let row: Vec<u8> = (0..21).map(|x| blurred.alpha(x, 2)).collect();
        assert_eq!(row[0], 0);
        assert_eq!(row[20], 255);
        assert!(row[9] > 0 && row[9] < 128);
        assert!(row[10] > 128 && row[10] < 255);
        assert!(row.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn zero_radius_is_copy() {
        let mask = AlphaMask::from_fn(4, 4, |x, y| (x * 60 + y) as u8);
        assert_eq!(erode(&mask, 0), mask);
        assert_eq!(gaussian_blur(&mask, 0.0), mask);
    }
}
