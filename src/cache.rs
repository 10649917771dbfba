//! Transient cache for per-image metadata.
//!
//! Probing an image (header read, SVG parse, EXIF walk) is the only I/O the
//! rewriter does per link. A page that links the same photo on every render
//! should pay for it once a day, not once a request.
//!
//! # Design
//!
//! A transient is a key/value entry with an absolute expiry time. Expired
//! entries are never returned. They are dropped whenever a new entry is
//! written, by [`TransientStore::prune`], and never persisted by
//! [`FileStore::save`], so a store only holds what is still live.
//!
//! ## Cache keys
//!
//! Keys are derived from the resolved file path **and** its modification
//! time:
//!
//! ```text
//! lightbox-photoswipe-imgdata-<sha256(path \0 mtime)>
//! ```
//!
//! Editing or replacing a file changes its mtime, which changes the key, so a
//! stale entry can never be hit after a file change. The old entry simply
//! ages out.
//!
//! ## Races
//!
//! There is no locking. Two renders missing the same key both probe the file
//! and both write; the last writer wins. Values are a pure function of the
//! file state, so either write is correct.
//!
//! ## Storage
//!
//! - [`MemoryStore`]: a map owned by the process, for embedding and tests.
//! - [`FileStore`]: the same map persisted as `.transients.json` in a cache
//!   directory. A missing, corrupt or version-mismatched file loads as empty.

use crate::metadata::ImageMetadata;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// Prefix shared by every image-metadata transient key.
pub const KEY_PREFIX: &str = "lightbox-photoswipe-imgdata-";

/// Lifetime of a cached metadata entry.
pub const IMAGE_DETAILS_TTL: Duration = Duration::from_secs(86_400);

/// Name of the persisted store within the cache directory.
const STORE_FILENAME: &str = ".transients.json";

/// Version of the persisted format. Bump to invalidate existing stores.
const STORE_VERSION: u32 = 1;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Source of "now" in seconds since the Unix epoch.
pub type Clock = Box<dyn Fn() -> u64>;

/// Wall-clock seconds since the Unix epoch.
pub fn system_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Build the transient key for a resolved file and its modification time.
pub fn cache_key(path: &str, mtime: u64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(path.as_bytes());
    hasher.update(b"\0");
    hasher.update(mtime.to_le_bytes());
    format!("{}{:x}", KEY_PREFIX, hasher.finalize())
}

/// A key/value store with per-entry expiry.
pub trait TransientStore {
    /// Fetch a live entry.
    fn get(&self, key: &str) -> Option<ImageMetadata>;

    /// Store an entry that expires `ttl` from now, dropping expired ones.
    fn set(&mut self, key: &str, value: ImageMetadata, ttl: Duration);

    /// Drop expired entries, returning how many were removed.
    fn prune(&mut self) -> usize;

    /// Drop every entry.
    fn clear(&mut self);
}

/// A single stored value.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Transient {
    pub value: ImageMetadata,
    /// Seconds since the Unix epoch.
    pub expires_at: u64,
}

impl Transient {
    fn is_live(&self, now: u64) -> bool {
        now < self.expires_at
    }
}

/// In-process transient store.
pub struct MemoryStore {
    entries: HashMap<String, Transient>,
    clock: Clock,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_clock(Box::new(system_now))
    }

    pub fn with_clock(clock: Clock) -> Self {
        Self {
            entries: HashMap::new(),
            clock,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn live_value(
    entries: &HashMap<String, Transient>,
    key: &str,
    now: u64,
) -> Option<ImageMetadata> {
    entries
        .get(key)
        .filter(|t| t.is_live(now))
        .map(|t| t.value.clone())
}

fn insert_entry(
    entries: &mut HashMap<String, Transient>,
    key: &str,
    value: ImageMetadata,
    ttl: Duration,
    now: u64,
) {
    prune_entries(entries, now);
    entries.insert(
        key.to_string(),
        Transient {
            value,
            expires_at: now.saturating_add(ttl.as_secs()),
        },
    );
}

fn prune_entries(entries: &mut HashMap<String, Transient>, now: u64) -> usize {
    let before = entries.len();
    entries.retain(|_, t| t.is_live(now));
    before - entries.len()
}

impl TransientStore for MemoryStore {
    fn get(&self, key: &str) -> Option<ImageMetadata> {
        live_value(&self.entries, key, (self.clock)())
    }

    fn set(&mut self, key: &str, value: ImageMetadata, ttl: Duration) {
        let now = (self.clock)();
        insert_entry(&mut self.entries, key, value, ttl, now);
    }

    fn prune(&mut self) -> usize {
        let now = (self.clock)();
        prune_entries(&mut self.entries, now)
    }

    fn clear(&mut self) {
        self.entries.clear();
    }
}

/// On-disk form of a [`FileStore`].
#[derive(Debug, Serialize, Deserialize)]
struct StoreFile {
    version: u32,
    entries: HashMap<String, Transient>,
}

/// Transient store persisted as JSON in a cache directory.
///
/// Changes are held in memory until [`FileStore::save`].
pub struct FileStore {
    dir: PathBuf,
    entries: HashMap<String, Transient>,
    clock: Clock,
}

impl FileStore {
    /// Load from the cache directory. Returns an empty store if the file
    /// doesn't exist or can't be parsed (version mismatch, corruption).
    pub fn load(dir: &Path) -> Self {
        Self::load_with_clock(dir, Box::new(system_now))
    }

    pub fn load_with_clock(dir: &Path, clock: Clock) -> Self {
        let entries = std::fs::read_to_string(store_path(dir))
            .ok()
            .and_then(|content| serde_json::from_str::<StoreFile>(&content).ok())
            .filter(|file| file.version == STORE_VERSION)
            .map(|file| file.entries)
            .unwrap_or_default();
        Self {
            dir: dir.to_path_buf(),
            entries,
            clock,
        }
    }

    /// Write the live entries to the cache directory, creating the
    /// directory.
    pub fn save(&self) -> Result<(), CacheError> {
        std::fs::create_dir_all(&self.dir)?;
        let now = (self.clock)();
        let entries = self
            .entries
            .iter()
            .filter(|(_, t)| t.is_live(now))
            .map(|(k, t)| (k.clone(), t.clone()))
            .collect();
        let file = StoreFile {
            version: STORE_VERSION,
            entries,
        };
        let json = serde_json::to_string_pretty(&file)?;
        std::fs::write(store_path(&self.dir), json)?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl TransientStore for FileStore {
    fn get(&self, key: &str) -> Option<ImageMetadata> {
        live_value(&self.entries, key, (self.clock)())
    }

    fn set(&mut self, key: &str, value: ImageMetadata, ttl: Duration) {
        let now = (self.clock)();
        insert_entry(&mut self.entries, key, value, ttl, now);
    }

    fn prune(&mut self) -> usize {
        let now = (self.clock)();
        prune_entries(&mut self.entries, now)
    }

    fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Resolve the persisted store path for a cache directory.
pub fn store_path(dir: &Path) -> PathBuf {
    dir.join(STORE_FILENAME)
}

/// Summary of cache performance for a rewrite run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u32,
    pub misses: u32,
}

impl CacheStats {
    pub fn hit(&mut self) {
        self.hits += 1;
    }

    pub fn miss(&mut self) {
        self.misses += 1;
    }

    pub fn total(&self) -> u32 {
        self.hits + self.misses
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.hits > 0 {
            write!(
                f,
                "{} cached, {} probed ({} total)",
                self.hits,
                self.misses,
                self.total()
            )
        } else {
            write!(f, "{} probed", self.misses)
        }
    }
}
