//! Face geometry derived from a face-mesh landmark set.
//!
//! Indices follow the 468/478-point face mesh. Eye centers are means of
//! fixed contour subsets; the face box encloses the face oval.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::raster::{rotate_point, rotated_canvas_size};
use crate::types::{BoundingBox, Landmark, Point};

/// Contour around the eye on the image-left side.
pub const LEFT_EYE: [usize; 8] = [33, 133, 160, 159, 158, 144, 145, 153];

/// Contour around the eye on the image-right side.
pub const RIGHT_EYE: [usize; 8] = [362, 263, 387, 386, 385, 373, 374, 380];

/// Closed face oval, forehead to chin and back.
pub const FACE_OVAL: [usize; 36] = [
    10, 338, 297, 332, 284, 251, 389, 356, 454, 323, 361, 288, 397, 365, 379, 378, 400, 377, 152,
    148, 176, 149, 150, 136, 172, 58, 132, 93, 234, 127, 162, 21, 54, 103, 67, 109,
];

/// Smallest landmark count covering every index above.
pub const MIN_LANDMARKS: usize = 455;

/// Pixel-space face measurements used for leveling and cropping.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FaceGeometry {
    /// Face-oval box, padded on every side.
    pub bounding_box: BoundingBox,
    pub left_eye: Point,
    pub right_eye: Point,
    /// Angle of the left-to-right eye line in degrees. Positive means the
    /// right eye sits lower on screen.
    pub eye_angle: f32,
    /// Eye midpoint horizontally, box center vertically.
    pub face_center: Point,
}

fn mean_of(points: &[Point], indices: &[usize]) -> Point {
    let n = indices.len() as f32;
    let (sx, sy) = indices
        .iter()
        .fold((0.0, 0.0), |(sx, sy), &i| (sx + points[i].x, sy + points[i].y));
    Point::new(sx / n, sy / n)
}

impl FaceGeometry {
    /// Measure a face from normalized landmarks detected on a `width` x
    /// `height` raster. `padding` is the fraction added to each side of
    /// the face-oval box.
    pub fn from_landmarks(
        landmarks: &[Landmark],
        width: u32,
        height: u32,
        padding: f32,
    ) -> Result<Self> {
        if landmarks.is_empty() {
            return Err(Error::NoFaceDetected);
        }
        if landmarks.len() < MIN_LANDMARKS {
            return Err(Error::DegenerateGeometry(format!(
                "expected at least {MIN_LANDMARKS} landmarks, got {}",
                landmarks.len()
            )));
        }
        if width == 0 || height == 0 {
            return Err(Error::EmptyRaster { width, height });
        }

        let points: Vec<Point> = landmarks.iter().map(|l| l.to_pixel(width, height)).collect();
        Self::from_points(&points, padding)
    }

    /// Same as [`FaceGeometry::from_landmarks`] for landmarks already in
    /// pixel space.
    pub fn from_points(points: &[Point], padding: f32) -> Result<Self> {
        if points.is_empty() {
            return Err(Error::NoFaceDetected);
        }
        if points.len() < MIN_LANDMARKS {
            return Err(Error::DegenerateGeometry(format!(
                "expected at least {MIN_LANDMARKS} landmarks, got {}",
                points.len()
            )));
        }
        let used = LEFT_EYE.iter().chain(&RIGHT_EYE).chain(&FACE_OVAL);
        if used.map(|&i| points[i]).any(|p| !p.x.is_finite() || !p.y.is_finite()) {
            return Err(Error::DegenerateGeometry("non-finite landmark".into()));
        }

        let left_eye = mean_of(points, &LEFT_EYE);
        let right_eye = mean_of(points, &RIGHT_EYE);
        let eye_angle = left_eye.angle_to(&right_eye);

        let oval = BoundingBox::enclosing(FACE_OVAL.iter().map(|&i| points[i]))
            .ok_or(Error::NoFaceDetected)?;
        if oval.width <= 0.0 || oval.height <= 0.0 {
            return Err(Error::DegenerateGeometry(format!(
                "face oval collapses to {}x{}",
                oval.width, oval.height
            )));
        }
        let bounding_box = oval.padded(padding);
        let face_center = Point::new(
            left_eye.midpoint(&right_eye).x,
            bounding_box.center().y,
        );

        debug!(
            eye_angle,
            box_w = bounding_box.width,
            box_h = bounding_box.height,
            "face geometry"
        );

        Ok(Self {
            bounding_box,
            left_eye,
            right_eye,
            eye_angle,
            face_center,
        })
    }

    /// Rotation in degrees that levels the eyes, or `None` when the tilt is
    /// within `threshold_deg`.
    pub fn leveling_rotation(&self, threshold_deg: f32) -> Option<f32> {
        if self.eye_angle.abs() > threshold_deg {
            Some(-self.eye_angle)
        } else {
            None
        }
    }
}

/// Move landmarks from a `width` x `height` raster onto the canvas that
/// [`crate::raster::rotate_to_fit`] produces for `degrees`, renormalized
/// against that canvas.
pub fn rotate_landmarks(
    landmarks: &[Landmark],
    width: u32,
    height: u32,
    degrees: f32,
) -> (Vec<Landmark>, (u32, u32)) {
    let canvas = rotated_canvas_size(width, height, degrees);
    let rotated = landmarks
        .iter()
        .map(|l| {
            let p = rotate_point(l.to_pixel(width, height), width, height, degrees);
            Landmark::from_pixel(p, l.z, canvas.0, canvas.1)
        })
        .collect();
    (rotated, canvas)
}
