//! Image probing in pure Rust, no system libraries.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Identify** | `image` header probe, `roxmltree` for SVG |
//! | **EXIF summary** | `nom-exif` |
//!
//! The module is split into:
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]
//! - **SVG**: pure functions over the root element's size attributes
//! - **EXIF**: tag reading plus pure display formatting

pub mod backend;
pub mod exif;
pub mod rust_backend;
pub mod svg;

pub use backend::{BackendError, Dimensions, ExifSummary, ImageBackend};
pub use rust_backend::{EXIF_EXTENSIONS, RustBackend};

/// Extensions the rewriter treats as images.
pub const IMAGE_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "jpe", "gif", "png", "bmp", "tif", "tiff", "ico", "webp", "svg",
];

/// Lowercased extension of a URL or path, ignoring any query or fragment.
pub fn extension_of(file: &str) -> Option<String> {
    let file = file.split(['?', '#']).next().unwrap_or(file);
    let name = file.rsplit('/').next().unwrap_or(file);
    let (_, ext) = name.rsplit_once('.')?;
    (!ext.is_empty()).then(|| ext.to_lowercase())
}

/// Whether the extension names a supported image type.
pub fn is_image_extension(ext: &str) -> bool {
    IMAGE_EXTENSIONS.contains(&ext)
}
