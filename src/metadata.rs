//! Per-image metadata: probing and cached lookup.
//!
//! [`ImageMetadata`] is what the rewriter knows about one image file:
//! pixel dimensions plus an EXIF capture summary. It is computed once per
//! (resolved path, modification time) pair and then served from a
//! [`TransientStore`] for [`IMAGE_DETAILS_TTL`].
//!
//! ## Degradation
//!
//! Nothing here fails. A missing file, an undecodable header or a broken SVG
//! produce zero dimensions; a missing or unreadable EXIF block produces empty
//! strings. The rewriter treats zero dimensions as "emit nothing".
//!
//! ## SVG scaling
//!
//! SVG sizes are stored unscaled. [`display_dimensions`] applies the
//! configured percentage when the attributes are written, so changing the
//! option does not require a cache flush.

use crate::cache::{CacheStats, IMAGE_DETAILS_TTL, TransientStore, cache_key};
use crate::imaging::{EXIF_EXTENSIONS, ExifSummary, ImageBackend};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::UNIX_EPOCH;

/// Dimensions and capture summary of one image file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageMetadata {
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub camera_model: String,
    #[serde(default)]
    pub focal_length: String,
    #[serde(default)]
    pub fstop: String,
    #[serde(default)]
    pub shutter_speed: String,
    #[serde(default)]
    pub iso: String,
    #[serde(default)]
    pub captured_at: String,
}

impl ImageMetadata {
    /// Both dimensions known and non-zero.
    pub fn has_dimensions(&self) -> bool {
        self.width > 0 && self.height > 0
    }

    /// The EXIF part as a display summary.
    pub fn exif(&self) -> ExifSummary {
        ExifSummary {
            camera: self.camera_model.clone(),
            focal_length: self.focal_length.clone(),
            fstop: self.fstop.clone(),
            shutter: self.shutter_speed.clone(),
            iso: self.iso.clone(),
            captured_at: self.captured_at.clone(),
        }
    }
}

/// Modification time in seconds since the epoch, `0` when unknown.
pub fn file_mtime(path: &Path) -> u64 {
    std::fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Probe a file for its metadata.
///
/// EXIF is only read for jpeg/tiff files and only when the dimensions
/// resolved; failures leave the EXIF fields empty.
pub fn compute(backend: &dyn ImageBackend, path: &Path, extension: &str) -> ImageMetadata {
    let dims = match backend.identify(path) {
        Ok(dims) => dims,
        Err(e) => {
            log::debug!("no dimensions for {}: {}", path.display(), e);
            return ImageMetadata::default();
        }
    };
    let mut meta = ImageMetadata {
        width: dims.width,
        height: dims.height,
        ..ImageMetadata::default()
    };
    if !dims.is_resolved() || !EXIF_EXTENSIONS.contains(&extension) {
        return meta;
    }
    match backend.read_exif(path) {
        Ok(exif) => {
            meta.camera_model = exif.camera;
            meta.focal_length = exif.focal_length;
            meta.fstop = exif.fstop;
            meta.shutter_speed = exif.shutter;
            meta.iso = exif.iso;
            meta.captured_at = exif.captured_at;
        }
        Err(e) => log::debug!("no EXIF for {}: {}", path.display(), e),
    }
    meta
}

/// Serve metadata from the store, probing and storing on a miss.
///
/// `mtime` is part of the key, so a changed file always misses.
pub fn lookup(
    backend: &dyn ImageBackend,
    store: &mut dyn TransientStore,
    stats: &mut CacheStats,
    path: &Path,
    extension: &str,
    mtime: u64,
) -> ImageMetadata {
    let key = cache_key(&path.to_string_lossy(), mtime);
    if let Some(meta) = store.get(&key) {
        stats.hit();
        return meta;
    }
    stats.miss();
    let meta = compute(backend, path, extension);
    // Only resolved sizes are stored: a file uploaded after a failed probe
    // shows up on the next render.
    if meta.has_dimensions() {
        store.set(&key, meta.clone(), IMAGE_DETAILS_TTL);
    }
    meta
}

/// Dimensions as written into the markup: SVG sizes scaled by `svg_scaling`
/// percent, everything else unchanged.
pub fn display_dimensions(
    meta: &ImageMetadata,
    extension: &str,
    svg_scaling: u32,
) -> (f64, f64) {
    let (width, height) = (f64::from(meta.width), f64::from(meta.height));
    if extension == "svg" {
        let factor = f64::from(svg_scaling) / 100.0;
        (width * factor, height * factor)
    } else {
        (width, height)
    }
}

/// Render a dimension without a trailing `.0`.
pub fn format_dimension(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{}", value as u64)
    } else {
        format!("{value}")
    }
}
