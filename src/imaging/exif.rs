//! EXIF capture summary.
//!
//! Reads camera, exposure and capture-time tags with `nom-exif` and formats
//! them for display:
//!
//! | Field | Tag(s) | Example |
//! |---|---|---|
//! | camera | Make + Model | `Canon EOS R5` |
//! | focal length | FocalLength | `50mm` |
//! | f-stop | FNumber | `f/2.8` |
//! | shutter | ExposureTime | `1/250s`, `2s` |
//! | ISO | ISOSpeedRatings | `ISO100` |
//! | capture date | DateTimeOriginal | `2024-05-01 18:30:00` |
//!
//! Tag values are taken from their display form and parsed leniently, so a
//! rational may arrive as `28/10`, `2.8` or `28/10 (2.8000)`.

use super::backend::{BackendError, ExifSummary};
use nom_exif::{EntryValue, Exif, ExifIter, ExifTag, MediaParser, MediaSource};
use std::path::Path;

/// Read and format the capture summary of a jpeg/tiff file.
pub fn read_exif_summary(path: &Path) -> Result<ExifSummary, BackendError> {
    let mut parser = MediaParser::new();
    let source = MediaSource::file_path(path)
        .map_err(|e| BackendError::ProbeFailed(format!("{}: {e}", path.display())))?;
    let iter: ExifIter = parser
        .parse(source)
        .map_err(|e| BackendError::ProbeFailed(format!("{}: {e}", path.display())))?;
    let exif: Exif = iter.into();

    let text = |tag: ExifTag| exif.get(tag).map(entry_text).unwrap_or_default();

    Ok(ExifSummary {
        camera: format_camera(&text(ExifTag::Make), &text(ExifTag::Model)),
        focal_length: format_focal_length(&text(ExifTag::FocalLength)),
        fstop: format_fstop(&text(ExifTag::FNumber)),
        shutter: format_shutter(&text(ExifTag::ExposureTime)),
        iso: format_iso(&text(ExifTag::ISOSpeedRatings)),
        captured_at: format_datetime(&text(ExifTag::DateTimeOriginal)),
    })
}

fn entry_text(value: &EntryValue) -> String {
    value
        .to_string()
        .trim()
        .trim_matches('"')
        .trim_matches(|c: char| c == '[' || c == ']')
        .trim()
        .to_string()
}

/// Parse a rational or decimal in display form.
fn parse_rational(raw: &str) -> Option<f64> {
    let token = raw
        .trim()
        .trim_matches(|c: char| c == '(' || c == ')')
        .split_whitespace()
        .next()?;
    let token = token.trim_end_matches(',');
    match token.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.trim().parse().ok()?;
            let den: f64 = den.trim().parse().ok()?;
            (den != 0.0).then(|| num / den)
        }
        None => token.parse().ok(),
    }
}

/// Render with at most one decimal, dropping a trailing `.0`.
fn trim_number(value: f64) -> String {
    let rounded = (value * 10.0).round() / 10.0;
    if rounded.fract() == 0.0 {
        format!("{}", rounded as i64)
    } else {
        format!("{rounded:.1}")
    }
}

/// Join make and model, skipping the make when the model already names it.
pub fn format_camera(make: &str, model: &str) -> String {
    let make = make.trim();
    let model = model.trim();
    if model.is_empty() {
        return make.to_string();
    }
    if make.is_empty() || model.to_lowercase().starts_with(&make.to_lowercase()) {
        return model.to_string();
    }
    format!("{make} {model}")
}

pub fn format_focal_length(raw: &str) -> String {
    match parse_rational(raw) {
        Some(v) if v > 0.0 => format!("{}mm", trim_number(v)),
        _ => String::new(),
    }
}

pub fn format_fstop(raw: &str) -> String {
    match parse_rational(raw) {
        Some(v) if v > 0.0 => format!("f/{}", trim_number(v)),
        _ => String::new(),
    }
}

pub fn format_shutter(raw: &str) -> String {
    match parse_rational(raw) {
        Some(v) if v > 0.0 && v < 1.0 => format!("1/{}s", (1.0 / v).round() as u64),
        Some(v) if v >= 1.0 => format!("{}s", trim_number(v)),
        _ => String::new(),
    }
}

pub fn format_iso(raw: &str) -> String {
    let digits: String = raw
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    match digits.parse::<u32>() {
        Ok(n) if n > 0 => format!("ISO{n}"),
        _ => String::new(),
    }
}

/// Normalize `YYYY:MM:DD HH:MM:SS` and RFC 3339 forms to `YYYY-MM-DD HH:MM:SS`.
pub fn format_datetime(raw: &str) -> String {
    let digits: Vec<char> = raw.chars().filter(char::is_ascii_digit).take(14).collect();
    if digits.len() < 14 || digits.iter().all(|c| *c == '0') {
        return String::new();
    }
    let part = |from: usize, to: usize| digits[from..to].iter().collect::<String>();
    format!(
        "{}-{}-{} {}:{}:{}",
        part(0, 4),
        part(4, 6),
        part(6, 8),
        part(8, 10),
        part(10, 12),
        part(12, 14)
    )
}

/// Build the single-line EXIF caption.
///
/// Non-empty parts are joined with `, ` in the order focal length, f-stop,
/// shutter, ISO, capture date (only when `show_date`), camera.
pub fn build_caption(exif: &ExifSummary, show_date: bool) -> String {
    let date = if show_date { exif.captured_at.as_str() } else { "" };
    [
        exif.focal_length.as_str(),
        exif.fstop.as_str(),
        exif.shutter.as_str(),
        exif.iso.as_str(),
        date,
        exif.camera.as_str(),
    ]
    .iter()
    .filter(|part| !part.is_empty())
    .copied()
    .collect::<Vec<_>>()
    .join(", ")
}
