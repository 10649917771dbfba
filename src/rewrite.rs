//! HTML content rewriting.
//!
//! The rewriter works on rendered HTML fragments with three passes, each a
//! tag-local regular expression replace:
//!
//! 1. **Anchor metadata**: every `<a ... href="...">` linking to an image gets
//!    `data-lbwps-*` attributes describing the target (size, captions, EXIF).
//! 2. **Lazy loading**: every `<img ... src="...">` without a `loading`
//!    attribute gets `loading="lazy"`.
//! 3. **Gallery tagging**: anchors inside a rendered gallery get
//!    `data-lbwps-gid="N"`, one id per gallery within the render.
//!
//! ## Resolving a link to a file
//!
//! ```text
//! href ─► strip query ─► absolutize ─► image extension? ─► strip CDN ─► local?
//!                                            │ no                          │ no
//!                                            ▼                             ▼
//!                                        unchanged               unchanged (never fetched)
//!
//! local ─► uploads-dir splice ─► size-suffix fix ─► attachment lookup ─► metadata
//! ```
//!
//! Every failure along the way degrades to "no attributes" for that one
//! anchor. Nothing in this module returns an error.
//!
//! ## Attribute order
//!
//! `data-lbwps-width`, `data-lbwps-height`, `data-lbwps-object-position`
//! (cover blocks only), `data-lbwps-caption`, `data-lbwps-title`,
//! `data-lbwps-description`, `data-lbwps-exif`. Nothing is written unless
//! both dimensions are known.

use crate::attachments::{Attachment, AttachmentIndex, NoAttachments};
use crate::cache::{CacheStats, TransientStore};
use crate::config::{CdnMode, Options};
use crate::context::{FocalPoint, RewriteContext};
use crate::imaging::{self, ImageBackend, exif};
use crate::metadata::{self, ImageMetadata};
use maud::html;
use regex::{Captures, Regex};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

/// `<a ... href="URL" ...>`, captured as prefix, URL, quote, rest, `>`.
static ANCHOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)(<a\s[^>]*?href=["'])([^"']+)(["'])([^>]*)(>)"#).expect("valid anchor regex")
});

/// `<img ... src="URL" ...>`, same groups as [`ANCHOR`].
static IMG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)(<img\s[^>]*?src=["'])([^"']+)(["'])([^>]*)(>)"#).expect("valid img regex")
});

/// A `loading` attribute name, not a suffix of another attribute.
static LOADING_ATTR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(^|\s)loading\s*=").expect("valid loading regex"));

/// Jetpack Photon host prefix.
static PHOTON: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"i[0-2]\.wp\.com/").expect("valid photon regex"));

/// `-WIDTHxHEIGHT` right before the extension of the last path segment.
static SIZE_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-\d+x\d+(\.[^./]+)$").expect("valid size regex"));

/// Rewrites HTML fragments for one site.
///
/// Owns the options and collaborators for a run; per-render state lives in
/// the [`RewriteContext`] passed to each call.
pub struct Rewriter<S: TransientStore> {
    options: Options,
    backend: Box<dyn ImageBackend>,
    store: S,
    attachments: Box<dyn AttachmentIndex>,
    stats: CacheStats,
}

/// Outcome of resolving one anchor.
struct AnchorRewrite {
    href: Option<String>,
    attributes: String,
}

impl<S: TransientStore> Rewriter<S> {
    pub fn new(options: Options, backend: Box<dyn ImageBackend>, store: S) -> Self {
        Self {
            options,
            backend,
            store,
            attachments: Box::new(NoAttachments),
            stats: CacheStats::default(),
        }
    }

    pub fn with_attachments(mut self, attachments: Box<dyn AttachmentIndex>) -> Self {
        self.attachments = attachments;
        self
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Cache hits and misses since construction.
    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Full output filter: anchor metadata, then lazy loading when enabled.
    ///
    /// A disabled context returns the content unchanged.
    pub fn filter_output(&mut self, ctx: &RewriteContext, content: &str) -> String {
        if !ctx.is_enabled() {
            return content.to_string();
        }
        let content = self.add_metadata(ctx, content);
        if self.options.add_lazyloading {
            add_lazy_loading(&content)
        } else {
            content
        }
    }

    /// Inject `data-lbwps-*` attributes into every anchor that links to an
    /// image. Anchors that already carry a size are left as they are.
    pub fn add_metadata(&mut self, ctx: &RewriteContext, content: &str) -> String {
        ANCHOR
            .replace_all(content, |caps: &Captures| {
                let tagged = |part: &str| part.contains(" data-lbwps-width=");
                if tagged(&caps[1]) || tagged(&caps[4]) {
                    return caps[0].to_string();
                }
                let rewrite = self.rewrite_anchor(ctx, &caps[2]);
                format!(
                    "{}{}{}{}{}{}",
                    &caps[1],
                    rewrite.href.as_deref().unwrap_or(&caps[2]),
                    &caps[3],
                    &caps[4],
                    rewrite.attributes,
                    &caps[5]
                )
            })
            .into_owned()
    }

    /// Open the next gallery in `ctx` and tag every anchor in `content` with
    /// its id.
    pub fn render_gallery(&self, ctx: &mut RewriteContext, content: &str) -> String {
        if !ctx.is_enabled() {
            return content.to_string();
        }
        let id = ctx.next_gallery();
        tag_gallery(content, id)
    }

    /// Add anchor metadata to one cover block, with `focal` as the
    /// `object-position` of its images. The focal point does not outlive the
    /// block.
    pub fn render_cover(
        &mut self,
        ctx: &mut RewriteContext,
        focal: FocalPoint,
        content: &str,
    ) -> String {
        if !ctx.is_enabled() {
            return content.to_string();
        }
        ctx.set_cover(Some(focal));
        let out = self.add_metadata(ctx, content);
        ctx.set_cover(None);
        out
    }

    fn rewrite_anchor(&mut self, ctx: &RewriteContext, href: &str) -> AnchorRewrite {
        let mut rewrite = AnchorRewrite {
            href: None,
            attributes: String::new(),
        };

        let base = strip_query(href);
        let mut file = if is_absolute_url(base) {
            base.to_string()
        } else {
            format!(
                "{}/{}",
                self.options.home_url(),
                base.trim_start_matches('/')
            )
        };

        let Some(extension) = imaging::extension_of(&file) else {
            return rewrite;
        };
        if !imaging::is_image_extension(&extension) {
            return rewrite;
        }

        file = PHOTON.replace_all(&file, "").into_owned();
        file = strip_cdn(&self.options, &file);

        let site_http = self.options.site_url_http();
        let site_https = self.options.site_url_https();
        let is_local = file.starts_with(&site_http) || file.starts_with(&site_https);

        if !is_local && self.options.ignore_external {
            return rewrite;
        }
        if file.contains('#') && self.options.ignore_hash {
            return rewrite;
        }
        if !is_local {
            // Remote files are never fetched.
            return rewrite;
        }

        let relative = file
            .strip_prefix(&site_http)
            .or_else(|| file.strip_prefix(&site_https))
            .unwrap_or(&file)
            .trim_start_matches('/')
            .to_string();
        let mut path = self.local_path(&relative);

        let mut attachment = None;
        if self.options.usepostdata && self.options.show_caption {
            if self.options.fix_links
                && let Some(fixed) = fix_size_suffix(&path)
                && self.original_exists(&fixed)
            {
                path = fixed;
                rewrite.href = fix_size_suffix(base);
            }
            attachment = self.attachments.find(&self.attached_file(&path));
        }

        let path = PathBuf::from(path);
        let mtime = metadata::file_mtime(&path);
        let meta = metadata::lookup(
            self.backend.as_ref(),
            &mut self.store,
            &mut self.stats,
            &path,
            &extension,
            mtime,
        );

        rewrite.attributes = self.attributes(ctx, &meta, &extension, attachment.as_ref());
        rewrite
    }

    /// Map an uploads-relative or site-relative path to a file on disk.
    fn local_path(&self, relative: &str) -> String {
        let uploads = self.options.upload_dir.to_string_lossy();
        if let Some(spliced) = str_replace_overlap(&uploads, relative)
            && is_readable(Path::new(&spliced))
        {
            return spliced;
        }
        self.options
            .abspath
            .join(relative)
            .to_string_lossy()
            .into_owned()
    }

    /// Path relative to the uploads directory, as the attachment index keys it.
    fn attached_file(&self, path: &str) -> String {
        let uploads = self.options.upload_dir.to_string_lossy();
        let prefix = format!("{}/", uploads.trim_end_matches('/'));
        path.strip_prefix(&prefix).unwrap_or(path).to_string()
    }

    /// A size-stripped file is only used when it is really there.
    fn original_exists(&self, fixed: &str) -> bool {
        Path::new(fixed).exists() || self.attachments.find(&self.attached_file(fixed)).is_some()
    }

    fn attributes(
        &self,
        ctx: &RewriteContext,
        meta: &ImageMetadata,
        extension: &str,
        attachment: Option<&Attachment>,
    ) -> String {
        if !meta.has_dimensions() {
            return String::new();
        }
        let options = &self.options;
        let (width, height) = metadata::display_dimensions(meta, extension, options.svg_scaling);
        let mut attrs = format!(
            " data-lbwps-width=\"{}\" data-lbwps-height=\"{}\"",
            metadata::format_dimension(width),
            metadata::format_dimension(height)
        );

        if let Some(focal) = ctx.cover() {
            attrs.push_str(&format!(
                " data-lbwps-object-position=\"{}\"",
                focal.object_position()
            ));
        }

        if let Some(attachment) = attachment {
            let fields = [
                ("caption", options.usecaption, &attachment.caption),
                ("title", options.usetitle, &attachment.title),
                ("description", options.usedescription, &attachment.description),
            ];
            for (name, enabled, text) in fields {
                if enabled && !text.is_empty() {
                    attrs.push_str(&format!(
                        " data-lbwps-{}=\"{}\"",
                        name,
                        escape_text(&nl2br(text))
                    ));
                }
            }
        }

        if options.showexif {
            let caption = exif::build_caption(&meta.exif(), options.showexif_date);
            if !caption.is_empty() {
                attrs.push_str(&format!(" data-lbwps-exif=\"{}\"", escape_text(&caption)));
            }
        }
        attrs
    }
}

/// Add `loading="lazy"` to every `<img>` that declares no `loading`
/// attribute. Running it twice changes nothing.
pub fn add_lazy_loading(content: &str) -> String {
    IMG.replace_all(content, |caps: &Captures| {
        if LOADING_ATTR.is_match(&caps[1]) || LOADING_ATTR.is_match(&caps[4]) {
            return caps[0].to_string();
        }
        let rest = &caps[4];
        let rest = match rest.strip_suffix('/') {
            Some(head) => format!("{} loading=\"lazy\" /", head.trim_end()),
            None => format!("{rest} loading=\"lazy\""),
        };
        format!("{}{}{}{}{}", &caps[1], &caps[2], &caps[3], rest, &caps[5])
    })
    .into_owned()
}

/// Append `data-lbwps-gid="id"` to every anchor with an `href`.
pub fn tag_gallery(content: &str, gallery_id: u32) -> String {
    ANCHOR
        .replace_all(content, |caps: &Captures| {
            format!(
                "{}{}{}{} data-lbwps-gid=\"{}\"{}",
                &caps[1], &caps[2], &caps[3], &caps[4], gallery_id, &caps[5]
            )
        })
        .into_owned()
}

/// Splice `relative` onto `base` at their longest overlap.
///
/// The longest suffix of `base` that is also a prefix of `relative` is
/// written once: `/var/www/wp-content/uploads` + `wp-content/uploads/a.jpg`
/// gives `/var/www/wp-content/uploads/a.jpg`. Returns `None` without overlap.
pub fn str_replace_overlap(base: &str, relative: &str) -> Option<String> {
    let max = base.len().min(relative.len());
    let overlap = (1..=max)
        .rev()
        .filter_map(|len| relative.get(..len))
        .find(|prefix| base.ends_with(prefix))?;
    Some(format!("{}{}", base, &relative[overlap.len()..]))
}

/// Map a CDN URL back to the site. Entries without a scheme match any
/// scheme.
fn strip_cdn(options: &Options, file: &str) -> String {
    let mut file = file.to_string();
    for cdn in options.cdn_url.iter().filter(|c| !c.is_empty()) {
        let Some(rest) = strip_cdn_prefix(&file, cdn) else {
            continue;
        };
        file = match options.cdn_mode {
            CdnMode::Prefix => format!("http://{}", rest.trim_start_matches('/')),
            CdnMode::Pull => format!(
                "{}/{}",
                options.site_url_http(),
                rest.trim_start_matches('/')
            ),
        };
    }
    file
}

fn strip_cdn_prefix<'a>(file: &'a str, cdn: &str) -> Option<&'a str> {
    if let Some(rest) = file.strip_prefix(cdn) {
        return Some(rest);
    }
    if is_absolute_url(cdn) {
        return None;
    }
    strip_scheme(file).strip_prefix(cdn)
}

/// Drop a `-WxH` size suffix; `None` when there is none.
fn fix_size_suffix(file: &str) -> Option<String> {
    SIZE_SUFFIX
        .is_match(file)
        .then(|| SIZE_SUFFIX.replace(file, "$1").into_owned())
}

fn strip_query(url: &str) -> &str {
    url.split('?').next().unwrap_or(url)
}

fn is_absolute_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

fn strip_scheme(url: &str) -> &str {
    url.strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .unwrap_or(url)
}

fn is_readable(path: &Path) -> bool {
    File::open(path).is_ok()
}

/// Insert `<br />` before every line break.
fn nl2br(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\n', "<br />\n")
}

/// Escape text for use inside a double-quoted attribute.
fn escape_text(text: &str) -> String {
    html! { (text) }.into_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attachments::JsonAttachments;
    use crate::cache::MemoryStore;
    use crate::context::{FocalPoint, PageInfo};
    use crate::imaging::ExifSummary;
    use crate::imaging::backend::tests::MockBackend;
    use std::collections::HashMap;

    const UPLOADS: &str = "/srv/site/wp-content/uploads";

    fn site_options() -> Options {
        Options {
            site_url: "https://example.com".into(),
            upload_dir: PathBuf::from(UPLOADS),
            abspath: PathBuf::from("/srv/site"),
            add_lazyloading: false,
            ..Options::default()
        }
    }

    fn upload(name: &str) -> String {
        format!("{UPLOADS}/{name}")
    }

    fn rewriter(options: Options, backend: MockBackend) -> Rewriter<MemoryStore> {
        Rewriter::new(options, Box::new(backend), MemoryStore::new())
    }

    fn anchor(href: &str) -> String {
        format!(r#"<a href="{href}"><img src="thumb.jpg"></a>"#)
    }

    // =========================================================================
    // Anchor metadata
    // =========================================================================

    #[test]
    fn png_dimensions_injected() {
        let backend = MockBackend::new().with_image(&upload("2024/05/a.png"), 800, 600);
        let mut rw = rewriter(site_options(), backend);
        let out = rw.add_metadata(
            &RewriteContext::default(),
            &anchor("https://example.com/wp-content/uploads/2024/05/a.png"),
        );
        assert_eq!(
            out,
            r#"<a href="https://example.com/wp-content/uploads/2024/05/a.png" data-lbwps-width="800" data-lbwps-height="600"><img src="thumb.jpg"></a>"#
        );
    }

    #[test]
    fn unsupported_extension_unchanged() {
        let mut rw = rewriter(site_options(), MockBackend::new());
        for href in [
            "https://example.com/wp-content/uploads/doc.pdf",
            "https://example.com/about/",
            "mailto:me@example.com",
            "#top",
        ] {
            let html = anchor(href);
            assert_eq!(rw.add_metadata(&RewriteContext::default(), &html), html);
        }
        assert_eq!(rw.stats().total(), 0);
    }

    #[test]
    fn svg_view_box_scaled() {
        let backend = MockBackend::new().with_image(&upload("logo.svg"), 200, 100);
        let options = Options {
            svg_scaling: 50,
            ..site_options()
        };
        let mut rw = rewriter(options, backend);
        let out = rw.add_metadata(
            &RewriteContext::default(),
            &anchor("https://example.com/wp-content/uploads/logo.svg"),
        );
        assert!(out.contains(r#"data-lbwps-width="100" data-lbwps-height="50""#));
    }

    #[test]
    fn svg_fractional_scale_keeps_fraction() {
        let backend = MockBackend::new().with_image(&upload("logo.svg"), 3, 1);
        let options = Options {
            svg_scaling: 50,
            ..site_options()
        };
        let mut rw = rewriter(options, backend);
        let out = rw.add_metadata(
            &RewriteContext::default(),
            &anchor("https://example.com/wp-content/uploads/logo.svg"),
        );
        assert!(out.contains(r#"data-lbwps-width="1.5" data-lbwps-height="0.5""#));
    }

    #[test]
    fn missing_file_leaves_anchor_unchanged() {
        let mut rw = rewriter(site_options(), MockBackend::new());
        let html = anchor("https://example.com/wp-content/uploads/gone.jpg");
        assert_eq!(rw.add_metadata(&RewriteContext::default(), &html), html);
    }

    #[test]
    fn relative_link_resolved_against_home() {
        let backend = MockBackend::new().with_image(&upload("a.jpg"), 10, 20);
        let mut rw = rewriter(site_options(), backend);
        let out = rw.add_metadata(
            &RewriteContext::default(),
            &anchor("/wp-content/uploads/a.jpg?ver=3"),
        );
        // The href itself is left as written
        assert!(out.starts_with(r#"<a href="/wp-content/uploads/a.jpg?ver=3" data-lbwps-width="10""#));
    }

    #[test]
    fn http_and_https_both_local() {
        let backend = MockBackend::new().with_image(&upload("a.jpg"), 10, 20);
        let mut rw = rewriter(site_options(), backend);
        let ctx = RewriteContext::default();
        for scheme in ["http", "https"] {
            let out = rw.add_metadata(
                &ctx,
                &anchor(&format!("{scheme}://example.com/wp-content/uploads/a.jpg")),
            );
            assert!(out.contains("data-lbwps-width=\"10\""), "{scheme}");
        }
    }

    #[test]
    fn external_links_are_never_probed() {
        let mut rw = rewriter(site_options(), MockBackend::new());
        let html = anchor("https://elsewhere.org/photo.jpg");
        assert_eq!(rw.add_metadata(&RewriteContext::default(), &html), html);
        assert_eq!(rw.stats().total(), 0);
    }

    #[test]
    fn ignore_hash_skips_fragment_links() {
        let backend = MockBackend::new().with_image(&upload("a.jpg"), 10, 20);
        let options = Options {
            ignore_hash: true,
            ..site_options()
        };
        let mut rw = rewriter(options, backend);
        let html = anchor("https://example.com/wp-content/uploads/a.jpg#zoom");
        assert_eq!(rw.add_metadata(&RewriteContext::default(), &html), html);
    }

    #[test]
    fn single_quoted_and_uppercase_attrs_preserved() {
        let backend = MockBackend::new().with_image(&upload("a.JPG"), 10, 20);
        let mut rw = rewriter(site_options(), backend);
        let html = "<a class='Big' href='https://example.com/wp-content/uploads/a.JPG' TARGET=_blank>x</a>";
        let out = rw.add_metadata(&RewriteContext::default(), html);
        assert_eq!(
            out,
            "<a class='Big' href='https://example.com/wp-content/uploads/a.JPG' TARGET=_blank data-lbwps-width=\"10\" data-lbwps-height=\"20\">x</a>"
        );
    }

    #[test]
    fn matching_stays_tag_local() {
        let backend = MockBackend::new().with_image(&upload("a.jpg"), 10, 20);
        let mut rw = rewriter(site_options(), backend);
        let html = concat!(
            r#"<abbr title="x">y</abbr><p>text > more</p>"#,
            r#"<a href="https://example.com/wp-content/uploads/a.jpg">1</a>"#,
            r#"<a name="top">2</a>"#
        );
        let out = rw.add_metadata(&RewriteContext::default(), html);
        assert_eq!(out.matches("data-lbwps-width").count(), 1);
        assert!(out.starts_with(r#"<abbr title="x">y</abbr><p>text > more</p>"#));
        assert!(out.ends_with(r#"<a name="top">2</a>"#));
    }

    #[test]
    fn repeated_renders_hit_cache() {
        let backend = MockBackend::new().with_image(&upload("a.jpg"), 10, 20);
        let mut rw = rewriter(site_options(), backend);
        let html = anchor("https://example.com/wp-content/uploads/a.jpg");
        let first = rw.add_metadata(&RewriteContext::default(), &html);
        let second = rw.add_metadata(&RewriteContext::default(), &html);
        assert_eq!(first, second);
        assert_eq!(rw.stats(), CacheStats { hits: 1, misses: 1 });
        assert_eq!(rw.store().len(), 1);
    }

    // =========================================================================
    // Captions and EXIF
    // =========================================================================

    fn attachments(name: &str, attachment: Attachment) -> Box<JsonAttachments> {
        let mut entries = HashMap::new();
        entries.insert(name.to_string(), attachment);
        Box::new(JsonAttachments::from_entries(entries))
    }

    #[test]
    fn attribute_order_and_escaping() {
        let backend = MockBackend::new()
            .with_image(&upload("2024/a.jpg"), 6000, 4000)
            .with_exif(
                &upload("2024/a.jpg"),
                ExifSummary {
                    camera: "Canon EOS R5".into(),
                    focal_length: "50mm".into(),
                    fstop: "f/2.8".into(),
                    shutter: "1/250s".into(),
                    iso: "ISO100".into(),
                    captured_at: "2024-05-01 18:30:00".into(),
                },
            );
        let options = Options {
            usetitle: true,
            usedescription: true,
            showexif: true,
            ..site_options()
        };
        let index = attachments(
            "2024/a.jpg",
            Attachment {
                caption: "Tom & \"Jerry\"\nat <home>".into(),
                title: "Dawn".into(),
                description: "Long text".into(),
            },
        );
        let mut rw = rewriter(options, backend).with_attachments(index);
        let mut ctx = RewriteContext::default();
        ctx.set_cover(Some(FocalPoint { x: 0.5, y: 0.25 }));

        let out = rw.add_metadata(
            &ctx,
            r#"<a href="https://example.com/wp-content/uploads/2024/a.jpg">x</a>"#,
        );
        assert_eq!(
            out,
            concat!(
                r#"<a href="https://example.com/wp-content/uploads/2024/a.jpg""#,
                r#" data-lbwps-width="6000" data-lbwps-height="4000""#,
                r#" data-lbwps-object-position="50% 25%""#,
                " data-lbwps-caption=\"Tom &amp; &quot;Jerry&quot;&lt;br /&gt;\nat &lt;home&gt;\"",
                r#" data-lbwps-title="Dawn""#,
                r#" data-lbwps-description="Long text""#,
                r#" data-lbwps-exif="50mm, f/2.8, 1/250s, ISO100, Canon EOS R5""#,
                ">x</a>"
            )
        );
    }

    #[test]
    fn cover_focal_point_is_scoped_to_the_block() {
        let backend = MockBackend::new()
            .with_image(&upload("cover.jpg"), 1200, 800)
            .with_image(&upload("plain.jpg"), 300, 200);
        let mut rw = rewriter(site_options(), backend);
        let mut ctx = RewriteContext::default();

        let cover = rw.render_cover(
            &mut ctx,
            FocalPoint { x: 0.3, y: 0.7 },
            &anchor("https://example.com/wp-content/uploads/cover.jpg"),
        );
        assert_eq!(ctx.cover(), None);

        let page = format!(
            "{cover}{}",
            anchor("https://example.com/wp-content/uploads/plain.jpg")
        );
        let out = rw.add_metadata(&ctx, &page);
        assert_eq!(out.matches("data-lbwps-object-position").count(), 1);
        assert!(out.contains(
            r#"cover.jpg" data-lbwps-width="1200" data-lbwps-height="800" data-lbwps-object-position="30% 70%">"#
        ));
        assert!(out.contains(r#"plain.jpg" data-lbwps-width="300" data-lbwps-height="200">"#));
    }

    #[test]
    fn add_metadata_skips_tagged_anchors() {
        let backend = MockBackend::new().with_image(&upload("a.jpg"), 10, 20);
        let mut rw = rewriter(site_options(), backend);
        let ctx = RewriteContext::default();
        let once = rw.add_metadata(&ctx, &anchor("https://example.com/wp-content/uploads/a.jpg"));
        assert_eq!(rw.add_metadata(&ctx, &once), once);
        assert_eq!(once.matches("data-lbwps-width").count(), 1);
    }

    #[test]
    fn caption_lookup_needs_postdata_and_show_caption() {
        let backend = MockBackend::new().with_image(&upload("a.jpg"), 10, 20);
        let options = Options {
            show_caption: false,
            ..site_options()
        };
        let index = attachments(
            "a.jpg",
            Attachment {
                caption: "Hidden".into(),
                ..Attachment::default()
            },
        );
        let mut rw = rewriter(options, backend).with_attachments(index);
        let out = rw.add_metadata(
            &RewriteContext::default(),
            &anchor("https://example.com/wp-content/uploads/a.jpg"),
        );
        assert!(!out.contains("data-lbwps-caption"));
    }

    #[test]
    fn empty_exif_caption_omitted() {
        let backend = MockBackend::new().with_image(&upload("a.jpg"), 10, 20);
        let options = Options {
            showexif: true,
            ..site_options()
        };
        let mut rw = rewriter(options, backend);
        let out = rw.add_metadata(
            &RewriteContext::default(),
            &anchor("https://example.com/wp-content/uploads/a.jpg"),
        );
        assert!(!out.contains("data-lbwps-exif"));
    }

    #[test]
    fn fix_links_uses_original_known_to_index() {
        let backend = MockBackend::new().with_image(&upload("2024/a.jpg"), 4000, 3000);
        let index = attachments(
            "2024/a.jpg",
            Attachment {
                caption: "Full size".into(),
                ..Attachment::default()
            },
        );
        let mut rw = rewriter(site_options(), backend).with_attachments(index);
        let out = rw.add_metadata(
            &RewriteContext::default(),
            &anchor("https://example.com/wp-content/uploads/2024/a-1024x768.jpg"),
        );
        assert!(out.starts_with(
            r#"<a href="https://example.com/wp-content/uploads/2024/a.jpg" data-lbwps-width="4000" data-lbwps-height="3000" data-lbwps-caption="Full size""#
        ));
    }

    #[test]
    fn fix_links_keeps_name_without_original() {
        let backend = MockBackend::new().with_image(&upload("logo-16x16.png"), 16, 16);
        let mut rw = rewriter(site_options(), backend);
        let out = rw.add_metadata(
            &RewriteContext::default(),
            &anchor("https://example.com/wp-content/uploads/logo-16x16.png"),
        );
        assert!(out.starts_with(
            r#"<a href="https://example.com/wp-content/uploads/logo-16x16.png" data-lbwps-width="16""#
        ));
    }

    // =========================================================================
    // CDN stripping
    // =========================================================================

    #[test]
    fn cdn_prefix_mode() {
        let options = Options {
            cdn_url: vec!["cdn.example.com/mysite.com".into()],
            cdn_mode: CdnMode::Prefix,
            ..site_options()
        };
        assert_eq!(
            strip_cdn(&options, "http://cdn.example.com/mysite.com/img.jpg"),
            "http://img.jpg"
        );

        let options = Options {
            cdn_url: vec!["http://cdn.example.com/".into()],
            cdn_mode: CdnMode::Prefix,
            ..site_options()
        };
        assert_eq!(
            strip_cdn(&options, "http://cdn.example.com/example.com/wp-content/uploads/a.jpg"),
            "http://example.com/wp-content/uploads/a.jpg"
        );
    }

    #[test]
    fn cdn_pull_mode() {
        let options = Options {
            cdn_url: vec!["https://cdn.example.net".into()],
            ..site_options()
        };
        assert_eq!(
            strip_cdn(&options, "https://cdn.example.net/wp-content/uploads/a.jpg"),
            "http://example.com/wp-content/uploads/a.jpg"
        );
        // Not a CDN URL
        assert_eq!(
            strip_cdn(&options, "https://other.net/a.jpg"),
            "https://other.net/a.jpg"
        );
    }

    #[test]
    fn cdn_link_resolves_to_local_file() {
        let backend = MockBackend::new().with_image(&upload("a.jpg"), 10, 20);
        let options = Options {
            cdn_url: vec!["cdn.example.net".into()],
            ignore_external: true,
            ..site_options()
        };
        let mut rw = rewriter(options, backend);
        let out = rw.add_metadata(
            &RewriteContext::default(),
            &anchor("https://cdn.example.net/wp-content/uploads/a.jpg"),
        );
        assert!(out.contains("data-lbwps-width=\"10\""));
    }

    #[test]
    fn photon_prefix_stripped() {
        let backend = MockBackend::new().with_image(&upload("a.jpg"), 10, 20);
        let mut rw = rewriter(site_options(), backend);
        let out = rw.add_metadata(
            &RewriteContext::default(),
            &anchor("https://i1.wp.com/example.com/wp-content/uploads/a.jpg"),
        );
        assert!(out.contains("data-lbwps-width=\"10\""));
    }

    // =========================================================================
    // Path splicing
    // =========================================================================

    #[test]
    fn overlap_uses_longest_match() {
        assert_eq!(
            str_replace_overlap("/var/www/wp-content/uploads", "wp-content/uploads/a.jpg"),
            Some("/var/www/wp-content/uploads/a.jpg".into())
        );
        assert_eq!(
            str_replace_overlap("/var/www/uploads", "uploads/uploads/a.jpg"),
            Some("/var/www/uploads/uploads/a.jpg".into())
        );
        assert_eq!(str_replace_overlap("/var/www/uploads", "images/a.jpg"), None);
    }

    #[test]
    fn fix_size_suffix_only_strips_last_segment() {
        assert_eq!(fix_size_suffix("/u/a-1024x768.jpg").as_deref(), Some("/u/a.jpg"));
        assert_eq!(fix_size_suffix("/u/a-1x1/b.jpg"), None);
        assert_eq!(fix_size_suffix("/u/a.jpg"), None);
    }

    // =========================================================================
    // Lazy loading
    // =========================================================================

    #[test]
    fn lazy_loading_appended() {
        assert_eq!(
            add_lazy_loading(r#"<img src="a.jpg" alt="x">"#),
            r#"<img src="a.jpg" alt="x" loading="lazy">"#
        );
    }

    #[test]
    fn lazy_loading_before_self_closing_slash() {
        assert_eq!(
            add_lazy_loading(r#"<img src="a.jpg" />"#),
            r#"<img src="a.jpg" loading="lazy" />"#
        );
        assert_eq!(
            add_lazy_loading(r#"<img src="a.jpg"/>"#),
            r#"<img src="a.jpg" loading="lazy" />"#
        );
    }

    #[test]
    fn lazy_loading_is_idempotent() {
        let html = r#"<p><img src="a.jpg"><img src='b.png' /></p>"#;
        let once = add_lazy_loading(html);
        assert_eq!(add_lazy_loading(&once), once);
        assert_eq!(once.matches("loading=\"lazy\"").count(), 2);
    }

    #[test]
    fn lazy_loading_respects_existing_attribute() {
        for html in [
            r#"<img loading="eager" src="a.jpg">"#,
            r#"<img src="a.jpg" loading='lazy'>"#,
            r#"<img src="a.jpg" LOADING="eager">"#,
            r#"<img src="a.jpg" Loading = "auto">"#,
        ] {
            assert_eq!(add_lazy_loading(html), html);
        }
    }

    #[test]
    fn lazy_loading_ignores_prefixed_attribute_names() {
        assert_eq!(
            add_lazy_loading(r#"<img src="a.jpg" data-loading="spinner">"#),
            r#"<img src="a.jpg" data-loading="spinner" loading="lazy">"#
        );
        assert_eq!(
            add_lazy_loading(r#"<img data-loading="spinner" src="a.jpg">"#),
            r#"<img data-loading="spinner" src="a.jpg" loading="lazy">"#
        );
    }

    #[test]
    fn filter_output_applies_lazy_loading_when_enabled() {
        let options = Options {
            add_lazyloading: true,
            ..site_options()
        };
        let mut rw = rewriter(options, MockBackend::new());
        let out = rw.filter_output(&RewriteContext::default(), r#"<img src="a.jpg">"#);
        assert_eq!(out, r#"<img src="a.jpg" loading="lazy">"#);
    }

    #[test]
    fn filter_output_disabled_context_untouched() {
        let backend = MockBackend::new().with_image(&upload("a.jpg"), 10, 20);
        let options = Options {
            add_lazyloading: true,
            disabled_post_ids: vec![5],
            ..site_options()
        };
        let page = PageInfo {
            post_id: Some(5),
            ..PageInfo::default()
        };
        let ctx = RewriteContext::new(&options, page);
        let mut rw = rewriter(options, backend);
        let html = anchor("https://example.com/wp-content/uploads/a.jpg");
        assert_eq!(rw.filter_output(&ctx, &html), html);
    }

    // =========================================================================
    // Gallery tagging
    // =========================================================================

    #[test]
    fn gallery_ids_increment_per_gallery() {
        let rw = rewriter(site_options(), MockBackend::new());
        let mut ctx = RewriteContext::default();
        let gallery = r#"<a href="a.jpg"><img src="a.jpg"></a><a href="b.jpg">b</a>"#;

        let first = rw.render_gallery(&mut ctx, gallery);
        let second = rw.render_gallery(&mut ctx, gallery);

        assert_eq!(first.matches(r#"data-lbwps-gid="1""#).count(), 2);
        assert_eq!(second.matches(r#"data-lbwps-gid="2""#).count(), 2);
        assert_eq!(ctx.gallery_id(), 2);
    }

    #[test]
    fn tag_gallery_appends_before_close() {
        assert_eq!(
            tag_gallery(r#"<a href="a.jpg" class="x">a</a>"#, 3),
            r#"<a href="a.jpg" class="x" data-lbwps-gid="3">a</a>"#
        );
    }
}
