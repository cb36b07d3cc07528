use async_trait::async_trait;
use image::{DynamicImage, GenericImageView, Rgba};
use rand::Rng;
use std::path::{Path, PathBuf};
use strum::Display;

/// Synchronous photo transforms offered through captions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Filter {
    Blur,
    Contour,
    SaltAndPepper,
}

/// Applies a filter to an image file and writes the result next to it.
#[async_trait]
pub trait ImageFilters: Send + Sync {
    async fn apply(&self, filter: Filter, source: &Path) -> Result<PathBuf, FilterError>;
}

const BLUR_SIGMA: f32 = 4.0;
const NOISE_RATIO: f64 = 0.2;

// Edge-detection kernel; output is inverted so contours come out dark on light.
const CONTOUR_KERNEL: [f32; 9] = [-1.0, -1.0, -1.0, -1.0, 8.0, -1.0, -1.0, -1.0, -1.0];

/// Filters backed by the `image` crate, run on the blocking thread pool.
#[derive(Debug, Default, Clone)]
pub struct ImageProcessor;

/// `photos/file_1.jpg` becomes `photos/file_1_filtered.jpg`.
pub fn filtered_path(source: &Path) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    let file_name = match source.extension() {
        Some(ext) => format!("{stem}_filtered.{}", ext.to_string_lossy()),
        None => format!("{stem}_filtered"),
    };
    source.with_file_name(file_name)
}

fn salt_and_pepper(img: &DynamicImage) -> DynamicImage {
    let mut rng = rand::thread_rng();
    let mut out = img.to_rgba8();
    for pixel in out.pixels_mut() {
        let roll: f64 = rng.gen();
        if roll < NOISE_RATIO {
            *pixel = Rgba([255, 255, 255, pixel[3]]);
        } else if roll > 1.0 - NOISE_RATIO {
            *pixel = Rgba([0, 0, 0, pixel[3]]);
        }
    }
    DynamicImage::ImageRgba8(out)
}

fn transform(filter: Filter, source: &Path) -> Result<PathBuf, FilterError> {
    let img = image::open(source)?;
    let (width, height) = img.dimensions();
    if width == 0 || height == 0 {
        return Err(FilterError::EmptyImage);
    }

    let output = match filter {
        Filter::Blur => img.blur(BLUR_SIGMA),
        Filter::Contour => {
            let mut edges = img.grayscale().filter3x3(&CONTOUR_KERNEL);
            edges.invert();
            edges
        }
        Filter::SaltAndPepper => salt_and_pepper(&img),
    };

    let target = filtered_path(source);
    // JPEG cannot carry an alpha channel.
    DynamicImage::ImageRgb8(output.to_rgb8()).save(&target)?;
    Ok(target)
}

#[async_trait]
impl ImageFilters for ImageProcessor {
    async fn apply(&self, filter: Filter, source: &Path) -> Result<PathBuf, FilterError> {
        let source = source.to_path_buf();
        let started = std::time::Instant::now();
        let target = tokio::task::spawn_blocking(move || transform(filter, &source)).await??;

        metrics::histogram!("image_filter_seconds", "filter" => filter.to_string())
            .record(started.elapsed().as_secs_f64());
        Ok(target)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FilterError {
    #[error("Image processing failed: {0}")]
    Image(#[from] image::ImageError),

    #[error("Image has no pixels")]
    EmptyImage,

    #[error("Filter task aborted: {0}")]
    Join(#[from] tokio::task::JoinError),
}
