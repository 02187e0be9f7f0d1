use serde::{Deserialize, Serialize};

/// A 2D point in source-raster pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn midpoint(&self, other: &Point) -> Point {
        Point::new((self.x + other.x) / 2.0, (self.y + other.y) / 2.0)
    }

    /// Angle of the vector from `self` to `other`, in degrees.
    pub fn angle_to(&self, other: &Point) -> f32 {
        (other.y - self.y).atan2(other.x - self.x).to_degrees()
    }
}

impl std::ops::Add for Point {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self {
            x: self.x + rhs.x,
            y: self.y + rhs.y,
        }
    }
}

impl std::ops::Sub for Point {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self {
            x: self.x - rhs.x,
            y: self.y - rhs.y,
        }
    }
}

/// An axis-aligned box defined by top-left corner, width, and height.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl BoundingBox {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Smallest box enclosing every point. `None` for an empty iterator.
    pub fn enclosing<I: IntoIterator<Item = Point>>(points: I) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
        for p in iter {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }
        Some(Self::new(min_x, min_y, max_x - min_x, max_y - min_y))
    }

    /// Grow the box by `fraction` of its own size on every side.
    pub fn padded(&self, fraction: f32) -> Self {
        let dx = self.width * fraction;
        let dy = self.height * fraction;
        Self::new(
            self.x - dx,
            self.y - dy,
            self.width + 2.0 * dx,
            self.height + 2.0 * dy,
        )
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }
}

/// One face-mesh landmark, normalized to [0,1] against the image it was
/// detected in. `z` is relative depth and is carried but unused here.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    #[serde(default)]
    pub z: f32,
}

impl Landmark {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Pixel position inside a `width` x `height` raster.
    pub fn to_pixel(&self, width: u32, height: u32) -> Point {
        Point::new(self.x * width as f32, self.y * height as f32)
    }

    /// Inverse of [`Landmark::to_pixel`], keeping `z`.
    pub fn from_pixel(p: Point, z: f32, width: u32, height: u32) -> Self {
        Self::new(p.x / width as f32, p.y / height as f32, z)
    }
}

/// Crop rectangle in source-raster pixel space.
///
/// Values produced by the crop calculator always satisfy
/// `0 <= x`, `0 <= y`, `x + width <= W`, `y + height <= H`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CropRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl CropRect {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Same size, moved so its center sits at `center`.
    pub fn centered_at(&self, center: Point) -> Self {
        Self::new(
            center.x - self.width / 2.0,
            center.y - self.height / 2.0,
            self.width,
            self.height,
        )
    }

    pub fn translated(&self, dx: f32, dy: f32) -> Self {
        Self::new(self.x + dx, self.y + dy, self.width, self.height)
    }

    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        const EPS: f32 = 1e-3;
        self.x >= 0.0
            && self.y >= 0.0
            && self.x + self.width <= width as f32 + EPS
            && self.y + self.height <= height as f32 + EPS
    }
}

/// Live view adjustments applied on top of the base crop.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Adjustments {
    /// 1.0 = base framing, >1 zooms in.
    pub zoom: f32,
    /// Pixels, positive moves the frame down.
    pub vertical_offset: f32,
    /// Fine-tune rotation in degrees.
    pub rotation: f32,
}

impl Default for Adjustments {
    fn default() -> Self {
        Self {
            zoom: 1.0,
            vertical_offset: 0.0,
            rotation: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point_arithmetic() {
        let a = Point::new(1.0, 2.0);
        let b = Point::new(3.0, 4.0);

        let sum = a + b;
        assert_eq!(sum.x, 4.0);
        assert_eq!(sum.y, 6.0);

        let diff = b - a;
        assert_eq!(diff.x, 2.0);
        assert_eq!(diff.y, 2.0);

        let mid = a.midpoint(&b);
        assert_eq!(mid, Point::new(2.0, 3.0));
    }

    #[test]
    fn angle_sign_follows_image_axes() {
        // y grows downward, so a lower right point gives a positive angle
        let a = Point::new(450.0, 500.0);
        let b = Point::new(550.0, 520.0);
        assert!((a.angle_to(&b) - 11.309_932).abs() < 1e-3);
        assert!((b.angle_to(&a) - (-168.690_07)).abs() < 1e-3);
    }

    #[test]
    fn enclosing_and_padding() {
        let bbox = BoundingBox::enclosing(vec![
            Point::new(10.0, 20.0),
            Point::new(30.0, 5.0),
            Point::new(20.0, 45.0),
        ])
        .unwrap();
        assert_eq!(bbox, BoundingBox::new(10.0, 5.0, 20.0, 40.0));

        let padded = bbox.padded(0.15);
        assert!((padded.x - 7.0).abs() < 1e-4);
        assert!((padded.y - -1.0).abs() < 1e-4);
        assert!((padded.width - 26.0).abs() < 1e-4);
        assert!((padded.height - 52.0).abs() < 1e-4);

        assert!(BoundingBox::enclosing(Vec::new()).is_none());
    }

    #[test]
    fn landmark_pixel_conversion() {
        let lm = Landmark::new(0.25, 0.5, -0.1);
        let p = lm.to_pixel(800, 600);
        assert_eq!(p, Point::new(200.0, 300.0));

        let back = Landmark::from_pixel(p, lm.z, 800, 600);
        assert!((back.x - 0.25).abs() < 1e-6);
        assert!((back.y - 0.5).abs() < 1e-6);
        assert_eq!(back.z, -0.1);
    }

    #[test]
    fn crop_rect_helpers() {
        let rect = CropRect::new(10.0, 20.0, 100.0, 50.0);
        assert_eq!(rect.center(), Point::new(60.0, 45.0));
        assert_eq!(
            rect.centered_at(Point::new(50.0, 25.0)),
            CropRect::new(0.0, 0.0, 100.0, 50.0)
        );
        assert!(rect.fits_within(110, 70));
        assert!(!rect.fits_within(109, 70));
        assert!(!rect.translated(-11.0, 0.0).fits_within(200, 200));
    }

    #[test]
    fn adjustments_deserialize_with_defaults() {
        let adj: Adjustments = serde_json::from_str(r#"{"zoom": 1.5}"#).unwrap();
        assert_eq!(adj.zoom, 1.5);
        assert_eq!(adj.vertical_offset, 0.0);
        assert_eq!(adj.rotation, 0.0);
    }
}
