//! CLI output formatting.
//!
//! Rewritten HTML goes to stdout, so run summaries go to stderr.
//!
//! # Output Format
//!
//! ## Rewrite / Gallery
//!
//! ```text
//! 3 image links tagged
//! Cache: 2 cached, 1 probed (3 total)
//! ```
//!
//! ## Inspect
//!
//! ```text
//! 2024/05/dawn.jpg
//!     Size: 6000x4000
//!     Camera: Canon EOS R5
//!     Exposure: 50mm, f/2.8, 1/250s, ISO100
//!     Captured: 2024-05-01 18:30:00
//! ```
//!
//! SVG files show the displayed size next to the intrinsic one:
//!
//! ```text
//! logo.svg
//!     Size: 200x100 (displayed 400x200)
//! ```
//!
//! # Architecture
//!
//! Each output has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper. Format functions are pure.

use crate::cache::CacheStats;
use crate::metadata::{self, ImageMetadata};
use std::path::Path;

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn labelled(label: &str, value: &str) -> Option<String> {
    (!value.is_empty()).then(|| format!("{}{}: {}", indent(1), label, value))
}

// ============================================================================
// Rewrite
// ============================================================================

/// Number of anchors carrying size attributes.
pub fn count_tagged(html: &str) -> usize {
    html.matches(" data-lbwps-width=").count()
}

/// Format the run summary of a rewrite.
pub fn format_rewrite_summary(tagged: usize, stats: &CacheStats) -> Vec<String> {
    let noun = if tagged == 1 { "link" } else { "links" };
    vec![
        format!("{} image {} tagged", tagged, noun),
        format!("Cache: {}", stats),
    ]
}

pub fn print_rewrite_summary(tagged: usize, stats: &CacheStats) {
    for line in format_rewrite_summary(tagged, stats) {
        eprintln!("{}", line);
    }
}

// ============================================================================
// Inspect
// ============================================================================

/// Format the metadata of one file.
///
/// Unresolved files show `Size: unknown` and nothing else.
pub fn format_inspect(
    path: &Path,
    meta: &ImageMetadata,
    extension: &str,
    svg_scaling: u32,
) -> Vec<String> {
    let mut lines = vec![path.display().to_string()];
    if !meta.has_dimensions() {
        lines.push(format!("{}Size: unknown", indent(1)));
        return lines;
    }

    let size = format!("{}x{}", meta.width, meta.height);
    let (width, height) = metadata::display_dimensions(meta, extension, svg_scaling);
    let displayed = format!(
        "{}x{}",
        metadata::format_dimension(width),
        metadata::format_dimension(height)
    );
    if displayed == size {
        lines.push(format!("{}Size: {}", indent(1), size));
    } else {
        lines.push(format!("{}Size: {} (displayed {})", indent(1), size, displayed));
    }

    let exposure = [
        meta.focal_length.as_str(),
        meta.fstop.as_str(),
        meta.shutter_speed.as_str(),
        meta.iso.as_str(),
    ]
    .into_iter()
    .filter(|part| !part.is_empty())
    .collect::<Vec<_>>()
    .join(", ");

    lines.extend(labelled("Camera", &meta.camera_model));
    lines.extend(labelled("Exposure", &exposure));
    lines.extend(labelled("Captured", &meta.captured_at));
    lines
}

pub fn print_inspect(path: &Path, meta: &ImageMetadata, extension: &str, svg_scaling: u32) {
    for line in format_inspect(path, meta, extension, svg_scaling) {
        println!("{}", line);
    }
}

// ============================================================================
// Cache maintenance
// ============================================================================

pub fn format_prune(removed: usize, remaining: usize) -> String {
    format!("Pruned {} expired entries, {} remaining", removed, remaining)
}

pub fn format_clear(removed: usize) -> String {
    format!("Cleared {} entries", removed)
}
