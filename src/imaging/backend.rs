//! Image probing backend trait and shared types.
//!
//! The [`ImageBackend`] trait defines the two probes the rewriter needs from
//! an image file: its pixel dimensions and its EXIF capture summary.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend): `image` for raster
//! headers, `roxmltree` for SVG, `nom-exif` for EXIF.

use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Unsupported image type: {0}")]
    Unsupported(String),
    #[error("Probe failed: {0}")]
    ProbeFailed(String),
}

/// Result of an identify operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    /// Both sides known and non-zero.
    pub fn is_resolved(&self) -> bool {
        self.width > 0 && self.height > 0
    }
}

/// Capture summary extracted from EXIF, already formatted for display.
///
/// Every field is empty when the tag is missing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExifSummary {
    /// Make and model, e.g. `Canon EOS R5`.
    pub camera: String,
    /// e.g. `50mm`
    pub focal_length: String,
    /// e.g. `f/2.8`
    pub fstop: String,
    /// e.g. `1/250s`
    pub shutter: String,
    /// e.g. `ISO100`
    pub iso: String,
    /// `YYYY-MM-DD HH:MM:SS`
    pub captured_at: String,
}

/// Trait for image probing backends.
pub trait ImageBackend {
    /// Get image dimensions. SVG files report their unscaled size.
    fn identify(&self, path: &Path) -> Result<Dimensions, BackendError>;

    /// Read the EXIF capture summary.
    fn read_exif(&self, path: &Path) -> Result<ExifSummary, BackendError>;
}
