//! Pure Rust probing backend.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Raster dimensions | `image::ImageReader::into_dimensions` (header only, no decode) |
//! | SVG dimensions | `roxmltree`, see [`svg`](super::svg) |
//! | EXIF summary | `nom-exif`, see [`exif`](super::exif) |

use super::backend::{BackendError, Dimensions, ExifSummary, ImageBackend};
use super::{exif, svg};
use image::ImageReader;
use std::path::Path;

/// Extensions whose files may carry EXIF capture data.
pub const EXIF_EXTENSIONS: &[&str] = &["jpg", "jpeg", "jpe", "tif", "tiff"];

/// Pure Rust backend using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase()
}

impl ImageBackend for RustBackend {
    fn identify(&self, path: &Path) -> Result<Dimensions, BackendError> {
        if extension(path) == "svg" {
            let content = std::fs::read_to_string(path)?;
            return Ok(svg::svg_dimensions(&content));
        }
        // Guess from content: `.jpe` and mislabelled files still probe.
        let (width, height) = ImageReader::open(path)?
            .with_guessed_format()?
            .into_dimensions()
            .map_err(|e| {
                BackendError::ProbeFailed(format!(
                    "Failed to read dimensions of {}: {}",
                    path.display(),
                    e
                ))
            })?;
        Ok(Dimensions { width, height })
    }

    fn read_exif(&self, path: &Path) -> Result<ExifSummary, BackendError> {
        let ext = extension(path);
        if !EXIF_EXTENSIONS.contains(&ext.as_str()) {
            return Err(BackendError::Unsupported(ext));
        }
        exif::read_exif_summary(path)
    }
}
