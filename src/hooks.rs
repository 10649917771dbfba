//! Explicit event dispatch for embedding the rewriter in a page renderer.
//!
//! The host owns a [`HookTable`] and calls [`HookTable::dispatch`] at each
//! point of a render. Handlers are plain function pointers receiving the
//! target they were registered for, the render's [`RewriteContext`], the
//! event arguments and the content flowing through the event. Actions with
//! no content (head, footer) pass an empty string through.
//!
//! Handlers for one hook run in ascending priority; equal priorities run in
//! registration order.
//!
//! ```text
//! Head (2050)        start buffering if the page is enabled
//! OutputBuffer (10)  full filter over the buffered page
//! Footer (10)        stop buffering
//! GalleryShortcode   next gallery id + tag anchors   (separate_galleries)
//! RenderBlock        same, for core/gallery blocks   (separate_galleries)
//! RenderBlock        core/cover: anchor metadata with the block's focal point
//! ```

use crate::cache::TransientStore;
use crate::context::{FocalPoint, RewriteContext};
use crate::rewrite::Rewriter;
use std::collections::HashMap;

/// Render events the rewriter can react to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Hook {
    Head,
    OutputBuffer,
    Footer,
    GalleryShortcode,
    RenderBlock,
}

/// Priority used when none is given.
pub const DEFAULT_PRIORITY: i32 = 10;

/// Priority of the buffering start in the page head; late, so other head
/// output is already written.
pub const HEAD_PRIORITY: i32 = 2050;

/// Block whose output counts as a gallery.
pub const GALLERY_BLOCK: &str = "core/gallery";

/// Block whose image links carry an `object-position`.
pub const COVER_BLOCK: &str = "core/cover";

/// Arguments accompanying an event.
#[derive(Debug, Clone, Copy, Default)]
pub struct HookArgs<'a> {
    /// Name of the block being rendered, for [`Hook::RenderBlock`].
    pub block_name: Option<&'a str>,
    /// Focal point of the block, for [`COVER_BLOCK`].
    pub cover: Option<FocalPoint>,
}

impl<'a> HookArgs<'a> {
    pub fn block(name: &'a str) -> Self {
        Self {
            block_name: Some(name),
            cover: None,
        }
    }

    pub fn cover(focal: FocalPoint) -> Self {
        Self {
            block_name: Some(COVER_BLOCK),
            cover: Some(focal),
        }
    }
}

/// A registered handler. Returns the (possibly rewritten) content.
pub type Handler<T> = fn(&mut T, &mut RewriteContext, &HookArgs<'_>, String) -> String;

struct Registration<T> {
    priority: i32,
    handler: Handler<T>,
}

/// Event name to ordered handler list.
pub struct HookTable<T> {
    handlers: HashMap<Hook, Vec<Registration<T>>>,
}

impl<T> HookTable<T> {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register `handler` for `hook`.
    pub fn add(&mut self, hook: Hook, priority: i32, handler: Handler<T>) {
        let list = self.handlers.entry(hook).or_default();
        // Insert after every registration with priority <= ours.
        let at = list.partition_point(|r| r.priority <= priority);
        list.insert(at, Registration { priority, handler });
    }

    /// Number of handlers registered for `hook`.
    pub fn handler_count(&self, hook: Hook) -> usize {
        self.handlers.get(&hook).map_or(0, Vec::len)
    }

    /// Run every handler for `hook`, threading `content` through them.
    pub fn dispatch(
        &self,
        hook: Hook,
        target: &mut T,
        ctx: &mut RewriteContext,
        args: &HookArgs<'_>,
        content: String,
    ) -> String {
        let Some(list) = self.handlers.get(&hook) else {
            return content;
        };
        list.iter()
            .fold(content, |content, r| (r.handler)(target, ctx, args, content))
    }
}

impl<T> Default for HookTable<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: TransientStore> Rewriter<S> {
    /// Install the rewriter's handlers. The gallery handlers are only
    /// installed with `separate_galleries`.
    pub fn register(&self, table: &mut HookTable<Self>) {
        table.add(Hook::Head, HEAD_PRIORITY, on_head);
        table.add(Hook::OutputBuffer, DEFAULT_PRIORITY, on_output_buffer);
        table.add(Hook::Footer, DEFAULT_PRIORITY, on_footer);
        table.add(Hook::RenderBlock, DEFAULT_PRIORITY, on_cover_block);
        if self.options().separate_galleries {
            table.add(Hook::GalleryShortcode, DEFAULT_PRIORITY, on_gallery_shortcode);
            table.add(Hook::RenderBlock, DEFAULT_PRIORITY, on_gallery_block);
        }
    }
}

fn on_head<S: TransientStore>(
    _rewriter: &mut Rewriter<S>,
    ctx: &mut RewriteContext,
    _args: &HookArgs<'_>,
    content: String,
) -> String {
    if ctx.is_enabled() {
        ctx.start_buffering();
    }
    content
}

fn on_output_buffer<S: TransientStore>(
    rewriter: &mut Rewriter<S>,
    ctx: &mut RewriteContext,
    _args: &HookArgs<'_>,
    content: String,
) -> String {
    if ctx.is_buffering() {
        rewriter.filter_output(ctx, &content)
    } else {
        content
    }
}

fn on_footer<S: TransientStore>(
    _rewriter: &mut Rewriter<S>,
    ctx: &mut RewriteContext,
    _args: &HookArgs<'_>,
    content: String,
) -> String {
    ctx.stop_buffering();
    content
}

fn on_gallery_shortcode<S: TransientStore>(
    rewriter: &mut Rewriter<S>,
    ctx: &mut RewriteContext,
    _args: &HookArgs<'_>,
    content: String,
) -> String {
    rewriter.render_gallery(ctx, &content)
}

fn on_gallery_block<S: TransientStore>(
    rewriter: &mut Rewriter<S>,
    ctx: &mut RewriteContext,
    args: &HookArgs<'_>,
    content: String,
) -> String {
    if args.block_name == Some(GALLERY_BLOCK) {
        rewriter.render_gallery(ctx, &content)
    } else {
        content
    }
}

fn on_cover_block<S: TransientStore>(
    rewriter: &mut Rewriter<S>,
    ctx: &mut RewriteContext,
    args: &HookArgs<'_>,
    content: String,
) -> String {
    match (args.block_name, args.cover) {
        (Some(COVER_BLOCK), Some(focal)) => rewriter.render_cover(ctx, focal, &content),
        _ => content,
    }
}
