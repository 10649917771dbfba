//! # Lightbox Rewrite
//!
//! Adds lightbox metadata to image links in rendered HTML. Every anchor that
//! links to a local image gains `data-lbwps-*` attributes describing the
//! target, so a PhotoSwipe-style viewer can open it at the right size with
//! its caption, without fetching anything first.
//!
//! # Architecture: One Filter, Three Passes
//!
//! ```text
//! rendered HTML ─► anchor metadata ─► lazy loading ─► rewritten HTML
//!                        │
//!                        ▼
//!              resolve file ─► transient cache ─► probe (size, EXIF)
//!
//! gallery HTML ─► gallery id tagging (one id per gallery in the render)
//! ```
//!
//! All passes are tag-local regular expression replaces. The rewrite never
//! fails: a missing file, an unknown format or a broken SVG only means that
//! one anchor gets no attributes.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`rewrite`] | The three passes and link-to-file resolution |
//! | [`context`] | Per-render state: gallery counter, buffering, enable check |
//! | [`hooks`] | Event dispatch table the host drives during a render |
//! | [`config`] | Options from TOML or the host's flat string map |
//! | [`metadata`] | Per-image metadata, cached lookup, display sizes |
//! | [`cache`] | Transient key/value store with TTL, in memory or on disk |
//! | [`attachments`] | Caption, title and description by uploaded file |
//! | [`imaging`] | Pure-Rust probing: raster headers, SVG size, EXIF summary |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Explicit Render State
//!
//! The gallery counter and the output-buffer flag belong to one page render.
//! They live in a [`context::RewriteContext`] that the host creates per
//! render and passes to every call, so two renders can never share a
//! counter.
//!
//! ## Keys Follow the File
//!
//! Cache keys hash the resolved path together with the file's modification
//! time. Replacing a file changes its key; stale metadata is never served
//! and simply expires.
//!
//! ## No Remote Fetching
//!
//! Links to other hosts are left alone. Only files on the local disk are
//! probed, so rendering a page never waits on the network.

pub mod attachments;
pub mod cache;
pub mod config;
pub mod context;
pub mod hooks;
pub mod imaging;
pub mod metadata;
pub mod output;
pub mod rewrite;
