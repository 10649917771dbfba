//! Rewriter options.
//!
//! Options are a flat set of named values. They can come from a `config.toml`
//! file or from a flat string map (the representation used by the hosting
//! CMS, where booleans are stored as `"0"`/`"1"` and lists as comma-separated
//! strings). Both paths merge the user values on top of the stock defaults,
//! reject unknown keys, and validate the result.
//!
//! ## Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! site_url = "http://localhost"     # Canonical site origin
//! # home_url = "http://localhost"   # Base for relative links (defaults to site_url)
//! upload_dir = "wp-content/uploads" # Uploads base directory on disk
//! abspath = "."                     # Site root on disk
//!
//! cdn_url = []                      # CDN prefixes to strip
//! cdn_mode = "pull"                 # "prefix" or "pull"
//! ignore_external = false
//! ignore_hash = false
//!
//! usepostdata = true
//! show_caption = true
//! fix_links = true
//! usecaption = true
//! usetitle = false
//! usedescription = false
//! showexif = false
//! showexif_date = false
//!
//! svg_scaling = 200
//! add_lazyloading = true
//! separate_galleries = false
//!
//! disabled_post_ids = []
//! disabled_post_types = []
//! ```
//!
//! Every boolean also accepts `0`/`1` and `"0"`/`"1"`; every list also
//! accepts a comma-separated string.

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::Display;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// How configured CDN prefixes map back onto the site origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CdnMode {
    /// `http://<cdn>/<site-host>/<path>`: the CDN prefix is dropped and the
    /// remainder already names the origin host.
    Prefix,
    /// `http://<cdn>/<path>`: the CDN prefix is replaced with the site origin.
    #[default]
    Pull,
}

/// Rewriter options.
///
/// Read-only during a rewrite pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Options {
    /// Canonical site origin, e.g. `https://example.com`.
    pub site_url: String,
    /// Base URL that relative links are resolved against.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub home_url: Option<String>,
    /// Uploads base directory on disk.
    pub upload_dir: PathBuf,
    /// Site root on disk; used when a file is not under the uploads directory.
    pub abspath: PathBuf,

    #[serde(deserialize_with = "list")]
    pub cdn_url: Vec<String>,
    pub cdn_mode: CdnMode,
    #[serde(deserialize_with = "flag")]
    pub ignore_external: bool,
    #[serde(deserialize_with = "flag")]
    pub ignore_hash: bool,

    /// Look up caption/title/description in the attachment index.
    #[serde(deserialize_with = "flag")]
    pub usepostdata: bool,
    #[serde(deserialize_with = "flag")]
    pub show_caption: bool,
    /// Strip a `-WIDTHxHEIGHT` size suffix before the caption lookup.
    #[serde(deserialize_with = "flag")]
    pub fix_links: bool,
    #[serde(deserialize_with = "flag")]
    pub usecaption: bool,
    #[serde(deserialize_with = "flag")]
    pub usetitle: bool,
    #[serde(deserialize_with = "flag")]
    pub usedescription: bool,
    #[serde(deserialize_with = "flag")]
    pub showexif: bool,
    #[serde(deserialize_with = "flag")]
    pub showexif_date: bool,

    /// Percentage applied to SVG dimensions.
    #[serde(deserialize_with = "number")]
    pub svg_scaling: u32,
    #[serde(deserialize_with = "flag")]
    pub add_lazyloading: bool,
    #[serde(deserialize_with = "flag")]
    pub separate_galleries: bool,

    #[serde(deserialize_with = "list")]
    pub disabled_post_ids: Vec<u64>,
    #[serde(deserialize_with = "list")]
    pub disabled_post_types: Vec<String>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            site_url: "http://localhost".to_string(),
            home_url: None,
            upload_dir: PathBuf::from("wp-content/uploads"),
            abspath: PathBuf::from("."),
            cdn_url: Vec::new(),
            cdn_mode: CdnMode::Pull,
            ignore_external: false,
            ignore_hash: false,
            usepostdata: true,
            show_caption: true,
            fix_links: true,
            usecaption: true,
            usetitle: false,
            usedescription: false,
            showexif: false,
            showexif_date: false,
            svg_scaling: 200,
            add_lazyloading: true,
            separate_galleries: false,
            disabled_post_ids: Vec::new(),
            disabled_post_types: Vec::new(),
        }
    }
}

impl Options {
    /// Validate option values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.site_url.starts_with("http://") && !self.site_url.starts_with("https://") {
            return Err(ConfigError::Validation(
                "site_url must start with http:// or https://".into(),
            ));
        }
        if !(1..=1000).contains(&self.svg_scaling) {
            return Err(ConfigError::Validation(
                "svg_scaling must be 1-1000".into(),
            ));
        }
        Ok(())
    }

    /// Site origin without scheme or trailing slash, e.g. `example.com/blog`.
    fn site_host(&self) -> &str {
        self.site_url
            .trim_start_matches("https://")
            .trim_start_matches("http://")
            .trim_end_matches('/')
    }

    /// Site origin forced to `http://`.
    pub fn site_url_http(&self) -> String {
        format!("http://{}", self.site_host())
    }

    /// Site origin forced to `https://`.
    pub fn site_url_https(&self) -> String {
        format!("https://{}", self.site_host())
    }

    /// Base URL for relative links, without trailing slash.
    pub fn home_url(&self) -> &str {
        self.home_url
            .as_deref()
            .unwrap_or(&self.site_url)
            .trim_end_matches('/')
    }

    /// Build options from a flat name → string map, as stored by the host.
    ///
    /// Keys use the option names above. Unknown keys are rejected.
    pub fn from_flat(values: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let table: toml::map::Map<String, toml::Value> = values
            .iter()
            .map(|(k, v)| (k.clone(), toml::Value::String(v.clone())))
            .collect();
        resolve_options(stock_defaults_value(), Some(toml::Value::Table(table)))
    }
}

// =============================================================================
// Flat-encoding deserializers
// =============================================================================

#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Bool(bool),
    Int(i64),
    Str(String),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ListRepr {
    List(Vec<Scalar>),
    Joined(String),
}

/// Accept `true`/`false`, `0`/`1`, or `"0"`/`"1"`.
fn flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    match Scalar::deserialize(deserializer)? {
        Scalar::Bool(b) => Ok(b),
        Scalar::Int(i) => Ok(i != 0),
        Scalar::Str(s) => match s.trim() {
            "1" | "true" | "on" => Ok(true),
            "" | "0" | "false" | "off" => Ok(false),
            other => Err(de::Error::custom(format!("invalid flag value `{other}`"))),
        },
    }
}

/// Accept an integer or a numeric string.
fn number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    let value = match Scalar::deserialize(deserializer)? {
        Scalar::Int(i) => i.to_string(),
        Scalar::Str(s) => s.trim().to_string(),
        Scalar::Bool(_) => return Err(de::Error::custom("expected a number, found a boolean")),
    };
    value
        .parse()
        .map_err(|_| de::Error::custom(format!("invalid number `{value}`")))
}

/// Accept an array or a comma-separated string. Empty items are dropped.
fn list<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: Display,
{
    let items: Vec<String> = match ListRepr::deserialize(deserializer)? {
        ListRepr::Joined(s) => s.split(',').map(|item| item.trim().to_string()).collect(),
        ListRepr::List(values) => values
            .into_iter()
            .map(|v| match v {
                Scalar::Bool(b) => b.to_string(),
                Scalar::Int(i) => i.to_string(),
                Scalar::Str(s) => s.trim().to_string(),
            })
            .collect(),
    };
    items
        .into_iter()
        .filter(|item| !item.is_empty())
        .map(|item| {
            item.parse::<T>()
                .map_err(|e| de::Error::custom(format!("invalid list item `{item}`: {e}")))
        })
        .collect()
}

// =============================================================================
// Loading, merging, and validation
// =============================================================================

/// Returns the stock default options as a `toml::Value::Table`.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(Options::default()).expect("default options must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load an options file as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_options(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<Options, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let options: Options = merged.try_into()?;
    options.validate()?;
    Ok(options)
}

/// Load options from a TOML file, falling back to the stock defaults when
/// the file does not exist.
pub fn load_options(path: &Path) -> Result<Options, ConfigError> {
    let overlay = load_raw_config(path)?;
    resolve_options(stock_defaults_value(), overlay)
}

/// Returns a fully-commented stock options file.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# lightbox-rewrite options
# ========================
# All settings are optional. Values shown below are the defaults.
# Booleans also accept 0/1 and "0"/"1"; lists also accept "a,b,c".
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Site layout
# ---------------------------------------------------------------------------
# Canonical origin. Links to this host (http or https) are treated as local.
site_url = "http://localhost"

# Base URL relative links are resolved against (defaults to site_url).
# home_url = "http://localhost"

# Uploads directory and site root on disk.
upload_dir = "wp-content/uploads"
abspath = "."

# ---------------------------------------------------------------------------
# Link filtering
# ---------------------------------------------------------------------------
# CDN prefixes to map back onto the site origin, e.g. ["https://cdn.example.com/"].
cdn_url = []

# "pull":   http://<cdn>/<path>            -> <site_url>/<path>
# "prefix": http://<cdn>/<site-host>/<path> -> http://<site-host>/<path>
cdn_mode = "pull"

# Leave links to other hosts untouched.
ignore_external = false

# Leave links containing '#' untouched.
ignore_hash = false

# ---------------------------------------------------------------------------
# Captions
# ---------------------------------------------------------------------------
# Look up caption, title and description of uploaded media.
usepostdata = true
show_caption = true

# Map resized links (photo-1024x768.jpg) back to the original (photo.jpg).
fix_links = true

usecaption = true
usetitle = false
usedescription = false

# Camera and exposure summary for jpeg/tiff files.
showexif = false
showexif_date = false

# ---------------------------------------------------------------------------
# Output
# ---------------------------------------------------------------------------
# Percentage applied to SVG dimensions.
svg_scaling = 200

# Add loading="lazy" to <img> tags that do not declare a loading mode.
add_lazyloading = true

# Give every gallery its own data-lbwps-gid.
separate_galleries = false

# ---------------------------------------------------------------------------
# Per-page switches
# ---------------------------------------------------------------------------
disabled_post_ids = []
disabled_post_types = []
"##
}
