//! # passport-matte
//!
//! Pure Rust ID-photo processing: segmentation-mask refinement, compositing
//! onto a solid background, and face-geometry based framing.
//!
//! This crate provides:
//! - **Matting**: color-aware alpha correction, morphological cleanup,
//!   feathering, edge-aware spill removal and gray halo cleanup
//! - **Geometry**: eye centers, eye-line angle and face box from face-mesh
//!   landmarks, with automatic eye leveling
//! - **Framing**: head-to-frame and headroom driven crops, zoom/offset/rotation
//!   adjustments, and output size presets (US, EU/Schengen, China, custom)
//!
//! Landmark detection and segmentation are left to external models; plug
//! them in through [`LandmarkDetector`] and [`Segmenter`].
//!
//! ## Pipeline Overview
//!
//! 1. Detect landmarks and measure the face
//! 2. Rotate the photo so the eyes are level (only past 0.5 degrees of tilt)
//! 3. Segment the leveled photo (shrunk to at most 1024 px for the model)
//! 4. Refine the mask and composite onto the background
//! 5. Compute the base crop for the preset's aspect ratio
//! 6. Crop and resample to the preset's exact pixel size
//!
//! ## Quick Start
//!
//! ```rust
//! use passport_matte::{composite, AlphaMask, Color, MattingConfig, SizePreset};
//! use image::{Rgba, RgbaImage};
//!
//! let photo = RgbaImage::from_pixel(64, 64, Rgba([90, 60, 40, 255]));
//! let mask = AlphaMask::filled(32, 32, 0);
//!
//! let config = MattingConfig {
//!     background: "#3366CC".parse::<Color>().unwrap(),
//!     ..MattingConfig::default()
//! };
//! let flat = composite(&photo, &mask, &config).unwrap();
//! assert_eq!(*flat.get_pixel(10, 10), Rgba([0x33, 0x66, 0xCC, 255]));
//!
//! let eu = SizePreset::eu_schengen();
//! assert_eq!((eu.width_px, eu.height_px), (413, 531));
//! ```
//!
//! ## Plugging in Models
//!
//! ```rust,no_run
//! use passport_matte::{
//!     AlphaMask, IdPhotoPipeline, Landmark, LandmarkDetector, PipelineConfig,
//!     SegmentationRequest, Segmenter, SizePreset,
//! };
//! use image::RgbaImage;
//!
//! struct MyFaceMesh;
//!
//! impl LandmarkDetector for MyFaceMesh {
//!     fn detect(&mut self, image: &RgbaImage) -> Option<Vec<Landmark>> {
//!         // Run a 468/478-point face mesh, normalized to [0,1]
//!         None
//!     }
//! }
//!
//! struct MySegmenter;
//!
//! impl Segmenter for MySegmenter {
//!     fn segment(&mut self, request: SegmentationRequest<'_>) -> Option<AlphaMask> {
//!         // Foreground probability for request.image, any resolution
//!         None
//!     }
//! }
//!
//! let image = image::open("portrait.jpg").unwrap().to_rgba8();
//! let mut pipeline = IdPhotoPipeline::new(MyFaceMesh, MySegmenter, PipelineConfig::default());
//! match pipeline.process(&image, &SizePreset::us_passport()) {
//!     Ok(photo) => photo.output().save("passport.png").unwrap(),
//!     Err(e) => eprintln!("{:?}: {}", e.category(), e),
//! }
//! ```

mod cleanup;
mod color;
mod composite;
mod config;
mod crop;
mod edges;
mod error;
mod face;
mod morphology;
mod pipeline;
mod preset;
mod raster;
mod refine;
mod types;

pub use cleanup::cleanup_gray_artifacts;
pub use color::Color;
pub use composite::composite;
pub use config::{BrightnessThresholds, CropConfig, MattingConfig, PipelineConfig};
pub use crop::{apply_adjustments, calculate_crop, fit_within};
pub use edges::EdgeRegion;
pub use error::{Error, ErrorCategory, Result};
pub use face::{rotate_landmarks, FaceGeometry, FACE_OVAL, LEFT_EYE, MIN_LANDMARKS, RIGHT_EYE};
pub use morphology::{dilate, erode, gaussian_blur};
pub use pipeline::{
    IdPhotoPipeline, LandmarkDetector, ProcessedPhoto, SegmentationRequest, Segmenter,
};
pub use preset::{
    inches_to_pixels, mm_to_pixels, pixels_to_inches, pixels_to_mm, SizePreset, Unit,
};
pub use raster::{
    crop_and_resize, downscale_to_fit, rotate_point, rotate_to_fit, rotated_canvas_size,
    AlphaMask, RasterImage,
};
pub use refine::{refine_alpha_by_color, refine_mask};
pub use types::{Adjustments, BoundingBox, CropRect, Landmark, Point};
