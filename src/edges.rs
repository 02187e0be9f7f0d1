//! Foreground/background transition band detection.

use rayon::prelude::*;

use crate::raster::AlphaMask;

/// Alpha strictly between these marks a pixel as mid-transition.
const TRANSITION_LOW: u8 = 10;
const TRANSITION_HIGH: u8 = 245;
/// A window containing both a value below `NEIGHBOR_LOW` and one above
/// `NEIGHBOR_HIGH` straddles an edge.
const NEIGHBOR_LOW: u8 = 50;
const NEIGHBOR_HIGH: u8 = 200;

/// Boolean raster aligned with the mask it was computed from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeRegion {
    width: u32,
    height: u32,
    bits: Vec<bool>,
}

impl EdgeRegion {
    /// Classify every pixel of `mask`, scanning a square window of
    /// half-width `radius` around it.
    pub fn detect(mask: &AlphaMask, radius: u32) -> Self {
        let (width, height) = mask.dimensions();
        let mut bits = vec![false; (width as usize) * (height as usize)];
        if mask.is_empty() {
            return Self {
                width,
                height,
                bits,
            };
        }

        let r = radius as i64;
        let (w, h) = (width as i64, height as i64);
        bits.par_chunks_mut(width as usize)
            .enumerate()
            .for_each(|(y, row)| {
                let y = y as i64;
                for (x, edge) in row.iter_mut().enumerate() {
                    let x = x as i64;
                    let a = mask.alpha(x as u32, y as u32);
                    if a > TRANSITION_LOW && a < TRANSITION_HIGH {
                        *edge = true;
                        continue;
                    }
                    *edge = straddles(mask, x, y, r, w, h);
                }
            });

        Self {
            width,
            height,
            bits,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn contains(&self, x: u32, y: u32) -> bool {
        self.bits[(y as usize) * (self.width as usize) + x as usize]
    }

    /// Flat row-major view, one entry per pixel.
    pub fn as_slice(&self) -> &[bool] {
        &self.bits
    }

    pub fn count(&self) -> usize {
        self.bits.iter().filter(|&&b| b).count()
    }
}

fn straddles(mask: &AlphaMask, x: i64, y: i64, r: i64, w: i64, h: i64) -> bool {
    let mut seen_low = false;
    let mut seen_high = false;
    for ny in (y - r).max(0)..=(y + r).min(h - 1) {
        for nx in (x - r).max(0)..=(x + r).min(w - 1) {
            let a = mask.alpha(nx as u32, ny as u32);
            seen_low |= a < NEIGHBOR_LOW;
            seen_high |= a > NEIGHBOR_HIGH;
            if seen_low && seen_high {
                return true;
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_masks_have_no_edges() {
        assert_eq!(EdgeRegion::detect(&AlphaMask::filled(8, 8, 0), 4).count(), 0);
        assert_eq!(EdgeRegion::detect(&AlphaMask::filled(8, 8, 255), 4).count(), 0);
    }

    #[test]
    fn partial_alpha_is_edge() {
        let region = EdgeRegion::detect(&AlphaMask::filled(3, 3, 128), 1);
        assert_eq!(region.count(), 9);

        // thresholds are strict
        assert_eq!(EdgeRegion::detect(&AlphaMask::filled(3, 3, 10), 1).count(), 0);
        assert_eq!(EdgeRegion::detect(&AlphaMask::filled(3, 3, 245), 1).count(), 0);
    }

    #[test]
    fn hard_step_gives_band_of_radius() {
        let mask = AlphaMask::from_fn(20, 3, |x, _| if x < 10 { 0 } else { 255 });
        let region = EdgeRegion::detect(&mask, 4);
        let row: Vec<bool> = (0..20).map(|x| region.contains(x, 1)).collect();
        // pixels within 4 columns of the step see both sides
        for (x, &edge) in row.iter().enumerate() {
            assert_eq!(edge, (6..14).contains(&x), "column {x}");
        }
    }

    #[test]
    fn empty_mask() {
        let region = EdgeRegion::detect(&AlphaMask::new(0, 5), 4);
        assert_eq!(region.count(), 0);
        assert_eq!(region.as_slice().len(), 0);
    }
}
