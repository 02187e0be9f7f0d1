//! CLI application for turning a portrait into a sized ID photo.
//!
//! Landmarks and the segmentation mask come from external models and are
//! passed in as files.
//!
//! Usage:
//!   passport-matte photo.jpg --landmarks mesh.json --mask mask.png
//!   passport-matte photo.jpg --landmarks mesh.json --mask mask.png --preset eu -o eu.png
//!   passport-matte photo.jpg --landmarks mesh.json --mask mask.png --custom 40x50 --unit mm --json

use clap::{Parser, ValueEnum};
use image::RgbaImage;
use passport_matte::{
    rotate_to_fit, Adjustments, AlphaMask, Color, Error, ErrorCategory, IdPhotoPipeline,
    Landmark, LandmarkDetector, PipelineConfig, ProcessedPhoto, SegmentationRequest, Segmenter,
    SizePreset, Unit,
};
use serde::Serialize;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::debug;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser, Debug)]
#[command(name = "passport-matte")]
#[command(author, version, about = "ID photo matting, cropping and sizing", long_about = None)]
struct Args {
    /// Input portrait
    #[arg(required = true)]
    image: PathBuf,

    /// Face-mesh landmarks as a JSON array of {x, y, z}, normalized to the image
    #[arg(long)]
    landmarks: PathBuf,

    /// Foreground mask (alpha channel if present, else luminance)
    #[arg(long)]
    mask: PathBuf,

    /// Built-in output size
    #[arg(long, value_enum, default_value_t = PresetArg::Us, conflicts_with = "custom")]
    preset: PresetArg,

    /// Custom output size as WIDTHxHEIGHT in --unit
    #[arg(long)]
    custom: Option<String>,

    /// Unit of --custom
    #[arg(long, value_enum, default_value_t = UnitArg::Mm)]
    unit: UnitArg,

    /// Resolution of --custom
    #[arg(long, default_value = "300")]
    dpi: u32,

    /// Zoom on top of the automatic framing (>1 zooms in)
    #[arg(long, default_value = "1.0")]
    zoom: f32,

    /// Vertical frame offset in pixels (positive moves the frame down)
    #[arg(long, default_value = "0", allow_negative_numbers = true)]
    offset: f32,

    /// Extra rotation in degrees, clockwise
    #[arg(long, default_value = "0", allow_negative_numbers = true)]
    rotation: f32,

    /// Background color as #RRGGBB (overrides --config)
    #[arg(long)]
    background: Option<Color>,

    /// Pipeline configuration JSON
    #[arg(long)]
    config: Option<PathBuf>,

    /// Output image file
    #[arg(short, long, default_value = "passport.png")]
    output: PathBuf,

    /// Print the report as JSON
    #[arg(short, long)]
    json: bool,

    /// Show verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum PresetArg {
    Us,
    Eu,
    China,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum UnitArg {
    Mm,
    Inches,
}

/// Output structure for JSON serialization
#[derive(Serialize)]
struct Output {
    image: String,
    width: u32,
    height: u32,
    preset: PresetOutput,
    /// Degrees applied to level the eyes, if any
    leveling_rotation: Option<f32>,
    face: FaceOutput,
    base_crop: RectOutput,
    adjustments: Adjustments,
    output: String,
}

#[derive(Serialize)]
struct PresetOutput {
    name: String,
    width_px: u32,
    height_px: u32,
    dpi: u32,
}

#[derive(Serialize)]
struct FaceOutput {
    bounding_box: RectOutput,
    left_eye: [f32; 2],
    right_eye: [f32; 2],
    eye_angle: f32,
}

#[derive(Serialize)]
struct RectOutput {
    x: f32,
    y: f32,
    width: f32,
    height: f32,
}

/// Replays landmarks loaded from disk.
struct FileLandmarks {
    landmarks: Vec<Landmark>,
}

impl LandmarkDetector for FileLandmarks {
    fn detect(&mut self, _image: &RgbaImage) -> Option<Vec<Landmark>> {
        Some(self.landmarks.clone())
    }
}

/// Serves a mask computed for the unrotated photo, turning it with the
/// photo when the pipeline levels the eyes.
struct PrecomputedMask {
    mask: AlphaMask,
}

impl Segmenter for PrecomputedMask {
    fn segment(&mut self, request: SegmentationRequest<'_>) -> Option<AlphaMask> {
        match request.leveling_rotation {
            Some(degrees) => {
                let clear = image::Rgba([255, 255, 255, 0]);
                let rotated = rotate_to_fit(&self.mask.to_rgba(), degrees, clear);
                Some(AlphaMask::from_alpha_channel(&rotated))
            }
            None => Some(self.mask.clone()),
        }
    }
}

fn main() {
    let args = Args::parse();
    init_logging(args.verbose);

    if let Err(e) = run(&args) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::WARN
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(default_level.into())
                .from_env_lossy(),
        )
        .with(
            tracing_subscriber::fmt::Layer::default()
                .compact()
                .with_writer(std::io::stderr),
        )
        .init();
}

fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = match &args.config {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::default(),
    };
    if let Some(background) = args.background {
        config.matting.background = background;
    }

    let preset = select_preset(args)?;
    debug!(preset = %preset, "output size");

    let landmarks = load_landmarks(&args.landmarks)?;
    let mask = load_mask(&args.mask)?;
    let photo = image::open(&args.image)?.to_rgba8();
    let (width, height) = photo.dimensions();

    let mut pipeline = IdPhotoPipeline::new(
        FileLandmarks { landmarks },
        PrecomputedMask { mask },
        config,
    );
    let mut processed = pipeline.process(&photo, &preset).map_err(user_message)?;

    let adjustments = Adjustments {
        zoom: args.zoom,
        vertical_offset: args.offset,
        rotation: args.rotation,
    };
    if adjustments != Adjustments::default() {
        processed.render(&adjustments).map_err(user_message)?;
    }

    save_output(processed.output(), &args.output)?;
    if args.verbose {
        eprintln!("Output written to {:?}", args.output);
    }

    let output = report(args, width, height, &processed);
    let output_str = if args.json {
        serde_json::to_string_pretty(&output)?
    } else {
        format_human_readable(&output)
    };
    println!("{}", output_str);

    Ok(())
}

fn select_preset(args: &Args) -> Result<SizePreset, Box<dyn std::error::Error>> {
    let Some(custom) = &args.custom else {
        return Ok(match args.preset {
            PresetArg::Us => SizePreset::us_passport(),
            PresetArg::Eu => SizePreset::eu_schengen(),
            PresetArg::China => SizePreset::china_visa(),
        });
    };
    let (w, h) = custom
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got {custom:?}"))?;
    let unit = match args.unit {
        UnitArg::Mm => Unit::Millimeters,
        UnitArg::Inches => Unit::Inches,
    };
    Ok(SizePreset::custom(w.trim().parse()?, h.trim().parse()?, unit, args.dpi)?)
}

fn load_landmarks(path: &Path) -> Result<Vec<Landmark>, Box<dyn std::error::Error>> {
    let file = File::open(path)?;
    let landmarks: Vec<Landmark> = serde_json::from_reader(BufReader::new(file))?;
    debug!(count = landmarks.len(), "loaded landmarks");
    Ok(landmarks)
}

fn load_mask(path: &Path) -> Result<AlphaMask, Box<dyn std::error::Error>> {
    let img = image::open(path)?;
    let rgba = img.to_rgba8();
    let mask = if rgba.pixels().any(|p| p[3] < u8::MAX) {
        AlphaMask::from_alpha_channel(&rgba)
    } else {
        AlphaMask::from_luma(img.to_luma8())
    };
    debug!(w = mask.width(), h = mask.height(), "loaded mask");
    Ok(mask)
}

/// JPEG has no alpha channel; everything else keeps RGBA.
fn save_output(image: &RgbaImage, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let is_jpeg = path
        .extension()
        .and_then(|e| e.to_str())
        .map_or(false, |e| e.eq_ignore_ascii_case("jpg") || e.eq_ignore_ascii_case("jpeg"));
    if is_jpeg {
        image::DynamicImage::ImageRgba8(image.clone()).to_rgb8().save(path)?;
    } else {
        image.save(path)?;
    }
    Ok(())
}

/// Collapse pipeline errors to the message a user can act on.
fn user_message(e: Error) -> String {
    match e.category() {
        ErrorCategory::NoFace => {
            "No face detected. Please use a clear, front-facing portrait.".into()
        }
        ErrorCategory::Segmentation => {
            "Failed to separate the subject from the background.".into()
        }
        ErrorCategory::Processing => format!("Processing failed: {}", e),
    }
}

fn report(args: &Args, width: u32, height: u32, photo: &ProcessedPhoto) -> Output {
    let face = photo.face();
    let preset = photo.preset();
    let crop = photo.base_crop();
    let bbox = face.bounding_box;
    Output {
        image: args.image.display().to_string(),
        width,
        height,
        preset: PresetOutput {
            name: preset.name.clone(),
            width_px: preset.width_px,
            height_px: preset.height_px,
            dpi: preset.dpi,
        },
        leveling_rotation: photo.leveling_rotation(),
        face: FaceOutput {
            bounding_box: RectOutput {
                x: bbox.x,
                y: bbox.y,
                width: bbox.width,
                height: bbox.height,
            },
            left_eye: [face.left_eye.x, face.left_eye.y],
            right_eye: [face.right_eye.x, face.right_eye.y],
            eye_angle: face.eye_angle,
        },
        base_crop: RectOutput {
            x: crop.x,
            y: crop.y,
            width: crop.width,
            height: crop.height,
        },
        adjustments: photo.adjustments(),
        output: args.output.display().to_string(),
    }
}

fn format_human_readable(output: &Output) -> String {
    let mut s = String::new();

    s.push_str(&format!("Image: {} ({}x{})\n", output.image, output.width, output.height));
    s.push_str(&format!(
        "Preset: {} ({}x{} px @ {} dpi)\n",
        output.preset.name, output.preset.width_px, output.preset.height_px, output.preset.dpi
    ));

    s.push_str("\nFace:\n");
    match output.leveling_rotation {
        Some(deg) => s.push_str(&format!("  Leveled by {:.2} deg\n", deg)),
        None => s.push_str("  Eyes already level\n"),
    }
    let b = &output.face.bounding_box;
    s.push_str(&format!(
        "  Box: {:.0}x{:.0} at ({:.0}, {:.0})\n",
        b.width, b.height, b.x, b.y
    ));
    s.push_str(&format!(
        "  Eyes: ({:.0}, {:.0}) / ({:.0}, {:.0})\n",
        output.face.left_eye[0],
        output.face.left_eye[1],
        output.face.right_eye[0],
        output.face.right_eye[1]
    ));

    let c = &output.base_crop;
    s.push_str(&format!(
        "\nCrop: {:.0}x{:.0} at ({:.0}, {:.0})\n",
        c.width, c.height, c.x, c.y
    ));
    let a = &output.adjustments;
    s.push_str(&format!(
        "  Zoom {:.2}x, offset {:.0} px, rotation {:.1} deg\n",
        a.zoom, a.vertical_offset, a.rotation
    ));

    s.push_str(&format!("\nSaved: {}\n", output.output));
    s
}
