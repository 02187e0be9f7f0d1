//! Raster primitives: the alpha-mask type and geometric transforms.
//!
//! Every function here borrows its input and allocates a fresh output; no
//! transform mutates a raster another stage can still see.

use image::imageops::{self, FilterType};
use image::{GrayImage, Luma, Rgba, RgbaImage};
use rayon::prelude::*;

use crate::error::{Error, Result};
use crate::types::{CropRect, Point};

/// Full-color raster exchanged with decode/encode collaborators.
pub type RasterImage = RgbaImage;

/// Single-channel foreground probability, 0 = background, 255 = subject.
#[derive(Debug, Clone, PartialEq)]
pub struct AlphaMask(GrayImage);

impl AlphaMask {
    pub fn new(width: u32, height: u32) -> Self {
        Self(GrayImage::new(width, height))
    }

    pub fn filled(width: u32, height: u32, alpha: u8) -> Self {
        Self(GrayImage::from_pixel(width, height, Luma([alpha])))
    }

    pub fn from_fn<F>(width: u32, height: u32, f: F) -> Self
    where
        F: Fn(u32, u32) -> u8,
    {
        Self(GrayImage::from_fn(width, height, |x, y| Luma([f(x, y)])))
    }

    /// Take the alpha channel of an RGBA mask image.
    pub fn from_alpha_channel(image: &RgbaImage) -> Self {
        Self(GrayImage::from_fn(image.width(), image.height(), |x, y| {
            Luma([image.get_pixel(x, y)[3]])
        }))
    }

    pub fn from_luma(image: GrayImage) -> Self {
        Self(image)
    }

    pub fn width(&self) -> u32 {
        self.0.width()
    }

    pub fn height(&self) -> u32 {
        self.0.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.0.dimensions()
    }

    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    #[inline]
    pub fn alpha(&self, x: u32, y: u32) -> u8 {
        self.0.get_pixel(x, y)[0]
    }

    /// Alpha at a signed coordinate, clamped to the nearest border pixel.
    #[inline]
    pub fn alpha_clamped(&self, x: i64, y: i64) -> u8 {
        let cx = x.clamp(0, self.width() as i64 - 1) as u32;
        let cy = y.clamp(0, self.height() as i64 - 1) as u32;
        self.alpha(cx, cy)
    }

    pub fn as_raw(&self) -> &[u8] {
        self.0.as_raw()
    }

    pub(crate) fn as_mut_raw(&mut self) -> &mut [u8] {
        &mut self.0
    }

    /// RGBA rendition with white color channels.
    pub fn to_rgba(&self) -> RgbaImage {
        RgbaImage::from_fn(self.width(), self.height(), |x, y| {
            Rgba([255, 255, 255, self.alpha(x, y)])
        })
    }

    /// Resample to the given size with Lanczos3.
    pub fn resized(&self, width: u32, height: u32) -> Result<Self> {
        if self.is_empty() || width == 0 || height == 0 {
            return Err(Error::EmptyRaster {
                width: self.width().min(width),
                height: self.height().min(height),
            });
        }
        if self.dimensions() == (width, height) {
            return Ok(self.clone());
        }
        Ok(Self(imageops::resize(
            &self.0,
            width,
            height,
            FilterType::Lanczos3,
        )))
    }
}

/// Size of the canvas that fully contains a `width` x `height` raster
/// rotated by `degrees`.
pub fn rotated_canvas_size(width: u32, height: u32, degrees: f32) -> (u32, u32) {
    let rad = degrees.to_radians();
    let (sin, cos) = (rad.sin().abs(), rad.cos().abs());
    let (w, h) = (width as f32, height as f32);
    // Tolerance keeps exact multiples of 90 degrees from growing by a pixel.
    let new_w = (w * cos + h * sin - 1e-3).ceil().max(1.0);
    let new_h = (h * cos + w * sin - 1e-3).ceil().max(1.0);
    (new_w as u32, new_h as u32)
}

/// Map a point of the source raster into the canvas produced by
/// [`rotate_to_fit`] with the same arguments.
pub fn rotate_point(p: Point, width: u32, height: u32, degrees: f32) -> Point {
    let (new_w, new_h) = rotated_canvas_size(width, height, degrees);
    let (sin, cos) = degrees.to_radians().sin_cos();
    let dx = p.x - width as f32 / 2.0;
    let dy = p.y - height as f32 / 2.0;
    Point::new(
        dx * cos - dy * sin + new_w as f32 / 2.0,
        dx * sin + dy * cos + new_h as f32 / 2.0,
    )
}

/// Rotate around the image center onto an expanded canvas. Positive angles
/// turn clockwise on screen (y grows downward). Uncovered canvas is `fill`.
pub fn rotate_to_fit(image: &RgbaImage, degrees: f32, fill: Rgba<u8>) -> RgbaImage {
    let (width, height) = image.dimensions();
    let (new_w, new_h) = rotated_canvas_size(width, height, degrees);
    let mut out = RgbaImage::from_pixel(new_w, new_h, fill);
    if width == 0 || height == 0 {
        return out;
    }

    let (sin, cos) = degrees.to_radians().sin_cos();
    let (src_cx, src_cy) = (width as f32 / 2.0, height as f32 / 2.0);
    let (dst_cx, dst_cy) = (new_w as f32 / 2.0, new_h as f32 / 2.0);
    let fill_f = [fill[0] as f32, fill[1] as f32, fill[2] as f32, fill[3] as f32];

    out.par_chunks_mut(new_w as usize * 4)
        .enumerate()
        .for_each(|(y, row)| {
            let dy = y as f32 + 0.5 - dst_cy;
            for (x, px) in row.chunks_exact_mut(4).enumerate() {
                let dx = x as f32 + 0.5 - dst_cx;
                // inverse rotation back into source pixel-center space
                let sx = dx * cos + dy * sin + src_cx - 0.5;
                let sy = -dx * sin + dy * cos + src_cy - 0.5;
                let v = sample_bilinear(image, sx, sy, fill_f);
                for c in 0..4 {
                    px[c] = v[c].round().clamp(0.0, 255.0) as u8;
                }
            }
        });

    out
}

/// Bilinear sample; coordinates outside the raster read as `fill`.
#[inline]
fn sample_bilinear(image: &RgbaImage, x: f32, y: f32, fill: [f32; 4]) -> [f32; 4] {
    let (width, height) = (image.width() as i64, image.height() as i64);
    let x0 = x.floor() as i64;
    let y0 = y.floor() as i64;
    let fx = x - x0 as f32;
    let fy = y - y0 as f32;

    let fetch = |px: i64, py: i64| -> [f32; 4] {
        if px < 0 || py < 0 || px >= width || py >= height {
            return fill;
        }
        let p = image.get_pixel(px as u32, py as u32);
        [p[0] as f32, p[1] as f32, p[2] as f32, p[3] as f32]
    };

    let p00 = fetch(x0, y0);
    let p10 = fetch(x0 + 1, y0);
    let p01 = fetch(x0, y0 + 1);
    let p11 = fetch(x0 + 1, y0 + 1);

    let mut out = [0.0f32; 4];
    for c in 0..4 {
        let top = p00[c] * (1.0 - fx) + p10[c] * fx;
        let bottom = p01[c] * (1.0 - fx) + p11[c] * fx;
        out[c] = top * (1.0 - fy) + bottom * fy;
    }
    out
}

/// Cut `rect` out of `image` and resample it to exactly `out_width` x
/// `out_height`. The crop is snapped to whole pixels inside the raster.
pub fn crop_and_resize(
    image: &RgbaImage,
    rect: &CropRect,
    out_width: u32,
    out_height: u32,
) -> Result<RgbaImage> {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 || out_width == 0 || out_height == 0 {
        return Err(Error::EmptyRaster {
            width: width.min(out_width),
            height: height.min(out_height),
        });
    }
    let finite = rect.x.is_finite()
        && rect.y.is_finite()
        && rect.width.is_finite()
        && rect.height.is_finite();
    if !finite {
        return Err(Error::DegenerateGeometry(format!(
            "non-finite crop rectangle {rect:?}"
        )));
    }

    let x = (rect.x.round().max(0.0) as u32).min(width - 1);
    let y = (rect.y.round().max(0.0) as u32).min(height - 1);
    let w = (rect.width.round().max(1.0) as u32).min(width - x);
    let h = (rect.height.round().max(1.0) as u32).min(height - y);

    let cropped = imageops::crop_imm(image, x, y, w, h).to_image();
    if (w, h) == (out_width, out_height) {
        return Ok(cropped);
    }
    Ok(imageops::resize(
        &cropped,
        out_width,
        out_height,
        FilterType::Lanczos3,
    ))
}

/// Shrink so the longest side is at most `max_side`. Returns the raster to
/// process and the applied scale (1.0 when no resize was needed).
pub fn downscale_to_fit(image: &RgbaImage, max_side: u32) -> (RgbaImage, f32) {
    let (width, height) = image.dimensions();
    let longest = width.max(height);
    if longest <= max_side || max_side == 0 {
        return (image.clone(), 1.0);
    }
    let scale = max_side as f32 / longest as f32;
    let new_w = ((width as f32 * scale).round() as u32).max(1);
    let new_h = ((height as f32 * scale).round() as u32).max(1);
    (
        imageops::resize(image, new_w, new_h, FilterType::Triangle),
        scale,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alpha_mask_conversions() {
        let rgba = RgbaImage::from_fn(3, 2, |x, y| Rgba([10, 20, 30, (x * 50 + y) as u8]));
        let mask = AlphaMask::from_alpha_channel(&rgba);
        assert_eq!(mask.dimensions(), (3, 2));
        assert_eq!(mask.alpha(2, 1), 101);

        let back = mask.to_rgba();
        assert_eq!(*back.get_pixel(2, 1), Rgba([255, 255, 255, 101]));
    }

    #[test]
    fn clamped_reads_stay_in_bounds() {
        let mask = AlphaMask::from_fn(3, 3, |x, y| (x + 3 * y) as u8);
        assert_eq!(mask.alpha_clamped(-5, -5), 0);
        assert_eq!(mask.alpha_clamped(10, 1), 5);
        assert_eq!(mask.alpha_clamped(1, 10), 7);
    }

    #[test]
    fn resize_mask() {
        let mask = AlphaMask::filled(4, 4, 200);
        let up = mask.resized(8, 6).unwrap();
        assert_eq!(up.dimensions(), (8, 6));
        assert!(up.as_raw().iter().all(|&a| a == 200));

        assert!(matches!(
            AlphaMask::new(0, 4).resized(8, 8),
            Err(Error::EmptyRaster { .. })
        ));
        assert!(mask.resized(0, 8).is_err());
    }

    #[test]
    fn zero_rotation_is_identity() {
        let img = RgbaImage::from_fn(5, 4, |x, y| Rgba([(x * 40) as u8, (y * 60) as u8, 7, 255]));
        let out = rotate_to_fit(&img, 0.0, Rgba([255, 255, 255, 255]));
        assert_eq!(out, img);
    }

    #[test]
    fn quarter_turn_swaps_dimensions() {
        assert_eq!(rotated_canvas_size(40, 20, 90.0), (20, 40));
        assert_eq!(rotated_canvas_size(40, 20, 0.0), (40, 20));
        let (w, h) = rotated_canvas_size(100, 100, 45.0);
        assert_eq!((w, h), (142, 142));

        // A marker at the top-left corner ends up at the top-right.
        let mut img = RgbaImage::from_pixel(4, 2, Rgba([0, 0, 0, 255]));
        img.put_pixel(0, 0, Rgba([255, 0, 0, 255]));
        let out = rotate_to_fit(&img, 90.0, Rgba([255, 255, 255, 255]));
        assert_eq!(out.dimensions(), (2, 4));
        assert_eq!(out.get_pixel(1, 0)[0], 255);
        assert_eq!(out.get_pixel(0, 0)[0], 0);
    }

    #[test]
    fn rotate_point_tracks_pixels() {
        let p = rotate_point(Point::new(0.5, 0.5), 4, 2, 90.0);
        assert!((p.x - 1.5).abs() < 1e-4);
        assert!((p.y - 0.5).abs() < 1e-4);

        // Center stays at the canvas center for any angle.
        let c = rotate_point(Point::new(50.0, 30.0), 100, 60, 17.0);
        let (w, h) = rotated_canvas_size(100, 60, 17.0);
        assert!((c.x - w as f32 / 2.0).abs() < 1e-3);
        assert!((c.y - h as f32 / 2.0).abs() < 1e-3);
    }

    #[test]
    fn rotation_fills_corners() {
        let img = RgbaImage::from_pixel(20, 20, Rgba([0, 0, 0, 255]));
        let out = rotate_to_fit(&img, 45.0, Rgba([255, 255, 255, 255]));
        assert_eq!(*out.get_pixel(0, 0), Rgba([255, 255, 255, 255]));
        let (w, h) = out.dimensions();
        assert_eq!(*out.get_pixel(w / 2, h / 2), Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn crop_and_resize_hits_target_size() {
        let img = RgbaImage::from_fn(100, 80, |x, _| {
            Rgba([if x < 50 { 0 } else { 255 }, 0, 0, 255])
        });
        let out = crop_and_resize(&img, &CropRect::new(10.0, 10.0, 30.0, 40.0), 60, 80).unwrap();
        assert_eq!(out.dimensions(), (60, 80));
        assert!(out.pixels().all(|p| p[0] == 0));

        // Oversized rectangles are snapped inside the raster.
        let out = crop_and_resize(&img, &CropRect::new(90.0, 70.0, 50.0, 50.0), 10, 10).unwrap();
        assert_eq!(out.dimensions(), (10, 10));

        assert!(crop_and_resize(&img, &CropRect::new(0.0, 0.0, 10.0, 10.0), 0, 10).is_err());
        assert!(crop_and_resize(&img, &CropRect::new(f32::NAN, 0.0, 10.0, 10.0), 10, 10).is_err());
    }

    #[test]
    fn downscale_limits_longest_side() {
        let img = RgbaImage::new(2048, 1024);
        let (small, scale) = downscale_to_fit(&img, 1024);
        assert_eq!(small.dimensions(), (1024, 512));
        assert!((scale - 0.5).abs() < 1e-6);

        let img = RgbaImage::new(300, 200);
        let (same, scale) = downscale_to_fit(&img, 1024);
        assert_eq!(same.dimensions(), (300, 200));
        assert_eq!(scale, 1.0);
    }
}
