//! SVG size detection.
//!
//! Size comes from the root `<svg>` element only:
//!
//! 1. explicit `width` and `height` (a trailing `px` is allowed), else
//! 2. the `viewBox` (or lowercase `viewbox`) as `(maxX - minX, maxY - minY)`
//!    where the four values are read as `minX minY maxX maxY`.
//!
//! Anything else, including unparseable XML, yields zero dimensions.

use super::backend::Dimensions;
use roxmltree::{Document, ParsingOptions};

/// Determine the unscaled size of an SVG document.
pub fn svg_dimensions(content: &str) -> Dimensions {
    let options = ParsingOptions {
        allow_dtd: true,
        ..ParsingOptions::default()
    };
    let doc = match Document::parse_with_options(content, options) {
        Ok(doc) => doc,
        Err(e) => {
            log::debug!("SVG parse failed: {e}");
            return Dimensions::default();
        }
    };
    let root = doc.root_element();

    let explicit = root
        .attribute("width")
        .and_then(parse_length)
        .zip(root.attribute("height").and_then(parse_length));
    if let Some((width, height)) = explicit {
        return Dimensions { width, height };
    }

    root.attribute("viewBox")
        .or_else(|| root.attribute("viewbox"))
        .and_then(parse_view_box)
        .unwrap_or_default()
}

/// Parse a user-unit or `px` length into whole pixels.
///
/// Relative units (`%`, `em`) cannot be resolved and return `None`.
pub fn parse_length(value: &str) -> Option<u32> {
    let number = value.trim().trim_end_matches("px").trim();
    let parsed: f64 = number.parse().ok()?;
    if !parsed.is_finite() {
        return None;
    }
    let pixels = parsed as u32;
    (pixels > 0).then_some(pixels)
}

/// Parse a `viewBox` value into dimensions.
pub fn parse_view_box(value: &str) -> Option<Dimensions> {
    let numbers: Vec<f64> = value
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|s| !s.is_empty())
        .map(str::parse)
        .collect::<Result<_, _>>()
        .ok()?;
    if numbers.len() != 4 {
        return None;
    }
    let width = (numbers[2] - numbers[0]).max(0.0) as u32;
    let height = (numbers[3] - numbers[1]).max(0.0) as u32;
    Some(Dimensions { width, height })
}
