//! End-to-end ID photo processing.
//!
//! ```text
//! detect landmarks -> face geometry -> level eyes -> segment
//!     -> composite -> base crop -> crop + resize to preset
//! ```
//!
//! Landmark detection and segmentation are external models and plug in
//! through [`LandmarkDetector`] and [`Segmenter`]. The result keeps the
//! composite around so adjustments and preset changes only redo the crop.

use std::borrow::Cow;

use image::RgbaImage;
use tracing::{debug, info};

use crate::composite::composite;
use crate::config::PipelineConfig;
use crate::crop::{apply_adjustments, calculate_crop};
use crate::error::{Error, Result};
use crate::face::{rotate_landmarks, FaceGeometry};
use crate::preset::SizePreset;
use crate::raster::{crop_and_resize, downscale_to_fit, rotate_to_fit, AlphaMask};
use crate::types::{Adjustments, CropRect, Landmark};

/// Source of face-mesh landmarks, normalized against the image passed in.
pub trait LandmarkDetector {
    /// `None` (or an empty set) means no face was found.
    fn detect(&mut self, image: &RgbaImage) -> Option<Vec<Landmark>>;
}

/// What the segmenter is asked to matte.
#[derive(Debug, Clone, Copy)]
pub struct SegmentationRequest<'a> {
    /// Leveled raster, possibly shrunk for the model.
    pub image: &'a RgbaImage,
    /// Rotation already applied to the source to level the eyes.
    pub leveling_rotation: Option<f32>,
}

/// Source of foreground-probability masks. The mask may have any size.
pub trait Segmenter {
    fn segment(&mut self, request: SegmentationRequest<'_>) -> Option<AlphaMask>;
}

impl<T: LandmarkDetector + ?Sized> LandmarkDetector for &mut T {
    fn detect(&mut self, image: &RgbaImage) -> Option<Vec<Landmark>> {
        (**self).detect(image)
    }
}

impl<T: Segmenter + ?Sized> Segmenter for &mut T {
    fn segment(&mut self, request: SegmentationRequest<'_>) -> Option<AlphaMask> {
        (**self).segment(request)
    }
}

pub struct IdPhotoPipeline<D, S> {
    detector: D,
    segmenter: S,
    config: PipelineConfig,
}

impl<D: LandmarkDetector, S: Segmenter> IdPhotoPipeline<D, S> {
    pub fn new(detector: D, segmenter: S, config: PipelineConfig) -> Self {
        Self {
            detector,
            segmenter,
            config,
        }
    }

    /// Run the whole pipeline on `image` and frame it for `preset`.
    pub fn process(&mut self, image: &RgbaImage, preset: &SizePreset) -> Result<ProcessedPhoto> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(Error::EmptyRaster { width, height });
        }
        info!(width, height, preset = %preset.name, "processing photo");

        let landmarks = self
            .detector
            .detect(image)
            .filter(|l| !l.is_empty())
            .ok_or(Error::NoFaceDetected)?;
        let padding = self.config.crop.face_padding;
        let detected = FaceGeometry::from_landmarks(&landmarks, width, height, padding)?;

        let leveling = detected.leveling_rotation(self.config.leveling_threshold_deg);
        let (leveled, face) = match leveling {
            Some(degrees) => {
                debug!(degrees, "leveling eyes");
                let fill = self.config.matting.background.to_rgba();
                let leveled = rotate_to_fit(image, degrees, fill);
                let (rotated, (w, h)) = rotate_landmarks(&landmarks, width, height, degrees);
                let face = FaceGeometry::from_landmarks(&rotated, w, h, padding)?;
                (Cow::Owned(leveled), face)
            }
            None => (Cow::Borrowed(image), detected),
        };

        let model_input = match self.config.max_segmentation_side {
            Some(max_side) => {
                let (small, scale) = downscale_to_fit(&leveled, max_side);
                debug!(scale, w = small.width(), h = small.height(), "segmentation input");
                Cow::Owned(small)
            }
            None => Cow::Borrowed(&*leveled),
        };
        let mask = self
            .segmenter
            .segment(SegmentationRequest {
                image: &model_input,
                leveling_rotation: leveling,
            })
            .filter(|m| !m.is_empty())
            .ok_or(Error::SegmentationUnavailable)?;

        let composited = composite(&leveled, &mask, &self.config.matting)?;
        let photo = ProcessedPhoto::new(composited, face, leveling, preset.clone(), self.config)?;
        info!(
            out_w = photo.output.width(),
            out_h = photo.output.height(),
            "photo ready"
        );
        Ok(photo)
    }
}

/// A composited photo plus everything needed to re-frame it.
#[derive(Debug, Clone)]
pub struct ProcessedPhoto {
    composite: RgbaImage,
    face: FaceGeometry,
    leveling_rotation: Option<f32>,
    base_crop: CropRect,
    preset: SizePreset,
    adjustments: Adjustments,
    config: PipelineConfig,
    output: RgbaImage,
}

impl ProcessedPhoto {
    /// Frame `composite` (already leveled) for `preset`. `face` must be
    /// measured on `composite`.
    pub fn new(
        composite: RgbaImage,
        face: FaceGeometry,
        leveling_rotation: Option<f32>,
        preset: SizePreset,
        config: PipelineConfig,
    ) -> Result<Self> {
        let (width, height) = composite.dimensions();
        let base_crop = calculate_crop(&face, width, height, preset.aspect_ratio(), &config.crop)?;
        let mut photo = Self {
            composite,
            face,
            leveling_rotation,
            base_crop,
            preset,
            adjustments: Adjustments::default(),
            config,
            output: RgbaImage::new(0, 0),
        };
        photo.render(&Adjustments::default())?;
        Ok(photo)
    }

    /// Re-derive the output for new adjustments.
    pub fn render(&mut self, adjustments: &Adjustments) -> Result<&RgbaImage> {
        let rotation = adjustments.rotation;
        if !rotation.is_finite() {
            return Err(Error::DegenerateGeometry("rotation is not finite".into()));
        }

        let (source, base) = if rotation.abs() > self.config.fine_rotation_threshold_deg {
            let fill = self.config.matting.background.to_rgba();
            let rotated = rotate_to_fit(&self.composite, rotation, fill);
            // keep the base crop on the same content as the canvas grows
            let dx = (rotated.width() as f32 - self.composite.width() as f32) / 2.0;
            let dy = (rotated.height() as f32 - self.composite.height() as f32) / 2.0;
            (Cow::Owned(rotated), self.base_crop.translated(dx, dy))
        } else {
            (Cow::Borrowed(&self.composite), self.base_crop)
        };

        let (width, height) = source.dimensions();
        let crop = apply_adjustments(&base, adjustments, width, height)?;
        debug!(
            x = crop.x,
            y = crop.y,
            w = crop.width,
            h = crop.height,
            rotation,
            "adjusted crop"
        );
        self.output = crop_and_resize(&source, &crop, self.preset.width_px, self.preset.height_px)?;
        self.adjustments = *adjustments;
        Ok(&self.output)
    }

    /// Switch to another output size, recomputing the base crop and keeping
    /// the current adjustments.
    pub fn set_preset(&mut self, preset: SizePreset) -> Result<&RgbaImage> {
        let (width, height) = self.composite.dimensions();
        self.base_crop = calculate_crop(
            &self.face,
            width,
            height,
            preset.aspect_ratio(),
            &self.config.crop,
        )?;
        self.preset = preset;
        let adjustments = self.adjustments;
        self.render(&adjustments)
    }

    /// Leveled, flattened full-size photo.
    pub fn composite(&self) -> &RgbaImage {
        &self.composite
    }

    /// Face geometry on the leveled photo.
    pub fn face(&self) -> &FaceGeometry {
        &self.face
    }

    pub fn leveling_rotation(&self) -> Option<f32> {
        self.leveling_rotation
    }

    pub fn base_crop(&self) -> CropRect {
        self.base_crop
    }

    pub fn preset(&self) -> &SizePreset {
        &self.preset
    }

    pub fn adjustments(&self) -> Adjustments {
        self.adjustments
    }

    pub fn output(&self) -> &RgbaImage {
        &self.output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BoundingBox, Point};
    use image::Rgba;

    fn photo(preset: SizePreset) -> ProcessedPhoto {
        let composite = RgbaImage::from_fn(400, 500, |x, y| {
            Rgba([(x % 256) as u8, (y % 256) as u8, 90, 255])
        });
        let face = FaceGeometry {
            bounding_box: BoundingBox::new(130.0, 120.0, 140.0, 180.0),
            left_eye: Point::new(170.0, 190.0),
            right_eye: Point::new(230.0, 190.0),
            eye_angle: 0.0,
            face_center: Point::new(200.0, 210.0),
        };
        ProcessedPhoto::new(composite, face, None, preset, PipelineConfig::default()).unwrap()
    }

    #[test]
    fn output_matches_preset() {
        let p = photo(SizePreset::eu_schengen());
        assert_eq!(p.output().dimensions(), (413, 531));
        assert!(p.base_crop().fits_within(400, 500));
    }

    #[test]
    fn preset_change_reframes() {
        let mut p = photo(SizePreset::eu_schengen());
        let before = p.base_crop();
        p.set_preset(SizePreset::us_passport()).unwrap();
        assert_eq!(p.output().dimensions(), (600, 600));
        let after = p.base_crop();
        assert!((after.width / after.height - 1.0).abs() < 1e-3);
        assert!((after.height - before.height).abs() < 1e-3);
    }

    #[test]
    fn fine_rotation_fills_with_background() {
        let mut p = photo(SizePreset::us_passport());
        let adjustments = Adjustments {
            zoom: 0.5,
            vertical_offset: 0.0,
            rotation: 20.0,
        };
        let out = p.render(&adjustments).unwrap();
        assert_eq!(out.dimensions(), (600, 600));
        // zoomed out far enough to show the uncovered corners
        assert_eq!(*out.get_pixel(0, 0), Rgba([255, 255, 255, 255]));
        assert_eq!(p.adjustments(), adjustments);
    }

    #[test]
    fn tiny_rotation_is_ignored() {
        let mut p = photo(SizePreset::us_passport());
        let plain = p.output().clone();
        let out = p
            .render(&Adjustments {
                rotation: 0.05,
                ..Adjustments::default()
            })
            .unwrap();
        assert_eq!(*out, plain);
    }

    #[test]
    fn invalid_adjustments_are_rejected() {
        let mut p = photo(SizePreset::us_passport());
        let bad = Adjustments {
            rotation: f32::NAN,
            ..Adjustments::default()
        };
        assert!(p.render(&bad).is_err());
        let bad = Adjustments {
            zoom: -1.0,
            ..Adjustments::default()
        };
        assert!(p.render(&bad).is_err());
    }
}
