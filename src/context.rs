//! Per-render state.
//!
//! One [`RewriteContext`] lives for exactly one page render. It carries the
//! gallery counter, the output-buffer flag and the page being rendered, and
//! is passed explicitly to every rewriter call and hook handler.

use crate::config::Options;
use std::fmt;
use std::str::FromStr;

/// Kind of page being rendered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum View {
    /// A single post or page.
    #[default]
    Singular,
    Home,
    Archive,
    Search,
    NotFound,
}

impl FromStr for View {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "singular" | "single" | "page" => Ok(View::Singular),
            "home" => Ok(View::Home),
            "archive" => Ok(View::Archive),
            "search" => Ok(View::Search),
            "404" | "not-found" => Ok(View::NotFound),
            other => Err(format!("unknown view `{other}`")),
        }
    }
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            View::Singular => "singular",
            View::Home => "home",
            View::Archive => "archive",
            View::Search => "search",
            View::NotFound => "404",
        };
        f.write_str(name)
    }
}

/// The page a render belongs to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageInfo {
    pub post_id: Option<u64>,
    pub post_type: Option<String>,
    pub view: View,
}

/// Whether the rewriter runs for `page`.
///
/// Listing pages (home, archive, search, 404) are always enabled; the
/// per-post switches only apply to singular views.
pub fn is_enabled(options: &Options, page: &PageInfo) -> bool {
    if page.view != View::Singular {
        return true;
    }
    let id_disabled = page
        .post_id
        .is_some_and(|id| options.disabled_post_ids.contains(&id));
    let type_disabled = page
        .post_type
        .as_ref()
        .is_some_and(|t| options.disabled_post_types.contains(t));
    !(id_disabled || type_disabled)
}

/// Focal point of a cover block, both axes in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FocalPoint {
    pub x: f64,
    pub y: f64,
}

impl FocalPoint {
    /// CSS `object-position` value, e.g. `50% 30%`.
    pub fn object_position(&self) -> String {
        format!(
            "{}% {}%",
            (self.x * 100.0).round() as i64,
            (self.y * 100.0).round() as i64
        )
    }
}

impl FromStr for FocalPoint {
    type Err = String;

    /// Parse `x,y` with both values in `0.0..=1.0`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (x, y) = s
            .split_once(',')
            .ok_or_else(|| format!("expected `x,y`, found `{s}`"))?;
        let parse = |v: &str| {
            let v = v.trim();
            match v.parse::<f64>() {
                Ok(n) if (0.0..=1.0).contains(&n) => Ok(n),
                Ok(_) => Err(format!("coordinate `{v}` is outside 0..1")),
                Err(_) => Err(format!("invalid coordinate `{v}`")),
            }
        };
        Ok(FocalPoint {
            x: parse(x)?,
            y: parse(y)?,
        })
    }
}

/// State threaded through one render.
#[derive(Debug, Clone)]
pub struct RewriteContext {
    page: PageInfo,
    enabled: bool,
    buffering: bool,
    gallery_id: u32,
    cover: Option<FocalPoint>,
}

impl RewriteContext {
    pub fn new(options: &Options, page: PageInfo) -> Self {
        let enabled = is_enabled(options, &page);
        if !enabled {
            log::debug!("rewriting disabled for {} page {:?}", page.view, page.post_id);
        }
        Self {
            page,
            enabled,
            buffering: false,
            gallery_id: 0,
            cover: None,
        }
    }

    pub fn page(&self) -> &PageInfo {
        &self.page
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_buffering(&self) -> bool {
        self.buffering
    }

    pub fn start_buffering(&mut self) {
        self.buffering = true;
    }

    pub fn stop_buffering(&mut self) {
        self.buffering = false;
    }

    /// Id of the most recent gallery, `0` before the first one.
    pub fn gallery_id(&self) -> u32 {
        self.gallery_id
    }

    /// Open a new gallery and return its id. The first gallery is `1`.
    pub fn next_gallery(&mut self) -> u32 {
        self.gallery_id += 1;
        self.gallery_id
    }

    /// Focal point of the cover block being rendered, if any.
    pub fn cover(&self) -> Option<FocalPoint> {
        self.cover
    }

    pub fn set_cover(&mut self, cover: Option<FocalPoint>) {
        self.cover = cover;
    }
}

impl Default for RewriteContext {
    fn default() -> Self {
        Self::new(&Options::default(), PageInfo::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options_disabling(ids: &[u64], types: &[&str]) -> Options {
        Options {
            disabled_post_ids: ids.to_vec(),
            disabled_post_types: types.iter().map(|t| t.to_string()).collect(),
            ..Options::default()
        }
    }

    fn singular(id: u64, post_type: &str) -> PageInfo {
        PageInfo {
            post_id: Some(id),
            post_type: Some(post_type.to_string()),
            view: View::Singular,
        }
    }

    // =========================================================================
    // Enable check
    // =========================================================================

    #[test]
    fn enabled_by_default() {
        assert!(is_enabled(&Options::default(), &PageInfo::default()));
    }

    #[test]
    fn disabled_by_post_id() {
        let options = options_disabling(&[42], &[]);
        assert!(!is_enabled(&options, &singular(42, "post")));
        assert!(is_enabled(&options, &singular(43, "post")));
    }

    #[test]
    fn disabled_by_post_type() {
        let options = options_disabling(&[], &["product"]);
        assert!(!is_enabled(&options, &singular(1, "product")));
        assert!(is_enabled(&options, &singular(1, "page")));
    }

    #[test]
    fn listing_views_ignore_disable_lists() {
        let options = options_disabling(&[42], &["post"]);
        for view in [View::Home, View::Archive, View::Search, View::NotFound] {
            let page = PageInfo {
                view,
                ..singular(42, "post")
            };
            assert!(is_enabled(&options, &page), "{view}");
        }
    }

    // =========================================================================
    // Context state
    // =========================================================================

    #[test]
    fn gallery_ids_start_at_one_and_increase() {
        let mut ctx = RewriteContext::default();
        assert_eq!(ctx.gallery_id(), 0);
        assert_eq!(ctx.next_gallery(), 1);
        assert_eq!(ctx.next_gallery(), 2);
        assert_eq!(ctx.next_gallery(), 3);
        assert_eq!(ctx.gallery_id(), 3);
    }

    #[test]
    fn buffering_toggles() {
        let mut ctx = RewriteContext::default();
        assert!(!ctx.is_buffering());
        ctx.start_buffering();
        assert!(ctx.is_buffering());
        ctx.stop_buffering();
        assert!(!ctx.is_buffering());
    }

    #[test]
    fn context_records_disabled_page() {
        let options = options_disabling(&[7], &[]);
        let ctx = RewriteContext::new(&options, singular(7, "post"));
        assert!(!ctx.is_enabled());
        assert_eq!(ctx.page().post_id, Some(7));
    }

    // =========================================================================
    // Parsing
    // =========================================================================

    #[test]
    fn view_from_str() {
        assert_eq!("home".parse::<View>().unwrap(), View::Home);
        assert_eq!("404".parse::<View>().unwrap(), View::NotFound);
        assert_eq!("Archive".parse::<View>().unwrap(), View::Archive);
        assert!("feed".parse::<View>().is_err());
    }

    #[test]
    fn focal_point_object_position() {
        let focal: FocalPoint = "0.5, 0.333".parse().unwrap();
        assert_eq!(focal.object_position(), "50% 33%");
        assert!("0.5".parse::<FocalPoint>().is_err());
        assert!("a,b".parse::<FocalPoint>().is_err());
    }

    #[test]
    fn focal_point_rejects_out_of_range() {
        assert!("5,-3".parse::<FocalPoint>().is_err());
        assert!("1.01,0.5".parse::<FocalPoint>().is_err());
        assert!("NaN,0.5".parse::<FocalPoint>().is_err());
        let corner: FocalPoint = "0,1".parse().unwrap();
        assert_eq!(corner.object_position(), "0% 100%");
    }
}
