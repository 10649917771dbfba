//! Caption source for uploaded media.
//!
//! The host keeps caption, title and description of each uploaded file keyed
//! by its path relative to the uploads directory (`2024/05/dawn.jpg`). The
//! rewriter only needs that single lookup, expressed as [`AttachmentIndex`].
//!
//! [`JsonAttachments`] reads an export of that table:
//!
//! ```json
//! {
//!   "2024/05/dawn.jpg": {
//!     "caption": "First light over the ridge",
//!     "title": "Dawn",
//!     "description": ""
//!   }
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AttachmentError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Caption fields of one uploaded file. Empty strings mean "not set".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Attachment {
    pub caption: String,
    pub title: String,
    pub description: String,
}

/// Lookup of caption fields by uploads-relative file name.
pub trait AttachmentIndex {
    fn find(&self, attached_file: &str) -> Option<Attachment>;
}

/// An index with no entries.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoAttachments;

impl AttachmentIndex for NoAttachments {
    fn find(&self, _attached_file: &str) -> Option<Attachment> {
        None
    }
}

/// Attachment index loaded from a JSON object keyed by attached file.
#[derive(Debug, Default, Clone)]
pub struct JsonAttachments {
    entries: HashMap<String, Attachment>,
}

impl JsonAttachments {
    pub fn from_entries(entries: HashMap<String, Attachment>) -> Self {
        Self { entries }
    }

    pub fn load(path: &Path) -> Result<Self, AttachmentError> {
        let content = std::fs::read_to_string(path)?;
        let entries = serde_json::from_str(&content)?;
        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl AttachmentIndex for JsonAttachments {
    fn find(&self, attached_file: &str) -> Option<Attachment> {
        self.entries
            .get(attached_file.trim_start_matches('/'))
            .cloned()
    }
}
