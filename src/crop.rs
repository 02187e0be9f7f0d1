//! ID-photo framing: base crop from face geometry and live adjustments.

use tracing::debug;

use crate::config::CropConfig;
use crate::error::{Error, Result};
use crate::face::FaceGeometry;
use crate::types::{Adjustments, CropRect};

/// Crops smaller than this on either side are rejected.
const MIN_CROP_SIDE: f32 = 1.0;

/// Fit `rect` inside a `width` x `height` raster.
///
/// A rect larger than the raster on some axis is first scaled down
/// uniformly about its own center; the result is then translated, never
/// resized, until it lies inside. It is not re-centered on the raster, so
/// an off-center face keeps its side of the frame.
pub fn fit_within(rect: &CropRect, width: u32, height: u32) -> Result<CropRect> {
    if width == 0 || height == 0 {
        return Err(Error::EmptyRaster { width, height });
    }
    let finite = rect.x.is_finite()
        && rect.y.is_finite()
        && rect.width.is_finite()
        && rect.height.is_finite();
    if !finite || rect.width <= 0.0 || rect.height <= 0.0 {
        return Err(Error::DegenerateGeometry(format!(
            "crop {rect:?} has no area"
        )));
    }

    let (w, h) = (width as f32, height as f32);
    let scale = (w / rect.width).min(h / rect.height).min(1.0);
    let mut fitted = if scale < 1.0 {
        let resized = CropRect::new(
            rect.x,
            rect.y,
            (rect.width * scale).min(w),
            (rect.height * scale).min(h),
        );
        resized.centered_at(rect.center())
    } else {
        *rect
    };

    if fitted.width < MIN_CROP_SIDE || fitted.height < MIN_CROP_SIDE {
        return Err(Error::DegenerateGeometry(format!(
            "crop shrinks to {}x{} inside {width}x{height}",
            fitted.width, fitted.height
        )));
    }

    fitted.x = fitted.x.min(w - fitted.width).max(0.0);
    fitted.y = fitted.y.min(h - fitted.height).max(0.0);
    Ok(fitted)
}

/// Frame the face for an ID photo of the given aspect ratio (width over
/// height).
///
/// The head box fills `head_to_frame_ratio` of the frame height, the frame
/// top sits `headroom_ratio` box heights above the box, and the frame is
/// centered horizontally on the eyes.
pub fn calculate_crop(
    face: &FaceGeometry,
    width: u32,
    height: u32,
    aspect_ratio: f32,
    config: &CropConfig,
) -> Result<CropRect> {
    if !(aspect_ratio.is_finite() && aspect_ratio > 0.0) {
        return Err(Error::DegenerateGeometry(format!(
            "aspect ratio {aspect_ratio} is not positive"
        )));
    }
    if !(config.head_to_frame_ratio.is_finite() && config.head_to_frame_ratio > 0.0) {
        return Err(Error::DegenerateGeometry(format!(
            "head-to-frame ratio {} is not positive",
            config.head_to_frame_ratio
        )));
    }

    let head = face.bounding_box;
    let frame_height = head.height / config.head_to_frame_ratio;
    let frame_width = frame_height * aspect_ratio;
    let top = head.y - head.height * config.headroom_ratio;
    let left = face.face_center.x - frame_width / 2.0;

    let crop = fit_within(
        &CropRect::new(left, top, frame_width, frame_height),
        width,
        height,
    )?;
    debug!(
        x = crop.x,
        y = crop.y,
        w = crop.width,
        h = crop.height,
        "base crop"
    );
    Ok(crop)
}

/// Apply zoom (above 1 zooms in) and a vertical pixel offset (positive
/// moves the frame down) to `base`, keeping the result inside the raster.
pub fn apply_adjustments(
    base: &CropRect,
    adjustments: &Adjustments,
    width: u32,
    height: u32,
) -> Result<CropRect> {
    let zoom = adjustments.zoom;
    if !(zoom.is_finite() && zoom > 0.0) {
        return Err(Error::DegenerateGeometry(format!(
            "zoom {zoom} is not positive"
        )));
    }
    if !adjustments.vertical_offset.is_finite() {
        return Err(Error::DegenerateGeometry("vertical offset is not finite".into()));
    }

    let mut center = base.center();
    center.y += adjustments.vertical_offset;
    let zoomed = CropRect::new(0.0, 0.0, base.width / zoom, base.height / zoom).centered_at(center);
    fit_within(&zoomed, width, height)
}
