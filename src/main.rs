use clap::{Parser, Subcommand};
use lightbox_rewrite::attachments::{AttachmentIndex, JsonAttachments, NoAttachments};
use lightbox_rewrite::cache::{FileStore, TransientStore};
use lightbox_rewrite::config::{self, Options};
use lightbox_rewrite::context::{FocalPoint, PageInfo, RewriteContext, View};
use lightbox_rewrite::hooks::{Hook, HookArgs, HookTable};
use lightbox_rewrite::imaging::{self, RustBackend};
use lightbox_rewrite::rewrite::Rewriter;
use lightbox_rewrite::{metadata, output};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "lightbox-rewrite")]
#[command(version)]
#[command(about = "Add lightbox metadata to image links in rendered HTML")]
#[command(long_about = "\
Add lightbox metadata to image links in rendered HTML

Every <a href=\"...\"> that links to a local image gains data-lbwps-*
attributes (size, caption, title, description, EXIF summary). <img> tags
gain loading=\"lazy\". Gallery output is tagged with a per-page gallery id.

Image sizes are cached per file and modification time for 24 hours in
<cache-dir>/.transients.json.

Run 'lightbox-rewrite gen-config' to generate a documented lightbox.toml.")]
struct Cli {
    /// Options file
    #[arg(long, default_value = "lightbox.toml", global = true)]
    config: PathBuf,

    /// Directory for the metadata cache
    #[arg(long, default_value = ".lightbox-cache", global = true)]
    cache_dir: PathBuf,

    /// JSON export of attachment captions, keyed by uploads-relative path
    #[arg(long, global = true, value_name = "FILE")]
    attachments: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

/// The page being rendered.
#[derive(clap::Args, Clone)]
struct PageArgs {
    /// Post id, checked against disabled_post_ids
    #[arg(long)]
    post_id: Option<u64>,

    /// Post type, checked against disabled_post_types
    #[arg(long)]
    post_type: Option<String>,

    /// Kind of page: singular, home, archive, search or 404
    #[arg(long, default_value = "singular")]
    view: View,
}

impl PageArgs {
    fn context(&self, options: &Options) -> RewriteContext {
        let page = PageInfo {
            post_id: self.post_id,
            post_type: self.post_type.clone(),
            view: self.view,
        };
        RewriteContext::new(options, page)
    }
}

#[derive(Subcommand)]
enum Command {
    /// Rewrite one rendered page (file or stdin) to stdout
    Rewrite {
        /// Input HTML, `-` or omitted for stdin
        input: Option<PathBuf>,
        #[command(flatten)]
        page: PageArgs,
    },
    /// Render gallery fragments as consecutive galleries of one page
    Gallery {
        /// Gallery HTML fragments, in page order
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
        #[command(flatten)]
        page: PageArgs,
    },
    /// Render one cover block fragment with its focal point
    Cover {
        /// Cover block HTML, `-` or omitted for stdin
        input: Option<PathBuf>,
        /// Focal point as x,y in 0..1
        #[arg(long, value_name = "X,Y", default_value = "0.5,0.5")]
        focal: FocalPoint,
        #[command(flatten)]
        page: PageArgs,
    },
    /// Show the metadata the rewriter computes for an image file
    Inspect {
        file: PathBuf,
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Print a stock lightbox.toml with all options documented
    GenConfig,
    /// Maintain the metadata cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// Drop expired entries
    Prune,
    /// Drop every entry
    Clear,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    match &cli.command {
        Command::Rewrite { input, page } => {
            let options = config::load_options(&cli.config)?;
            let content = read_input(input.as_deref())?;
            let mut ctx = page.context(&options);
            let mut rewriter = build_rewriter(&cli, options)?;

            let mut table = HookTable::new();
            rewriter.register(&mut table);
            let args = HookArgs::default();
            table.dispatch(Hook::Head, &mut rewriter, &mut ctx, &args, String::new());
            let html = table.dispatch(Hook::OutputBuffer, &mut rewriter, &mut ctx, &args, content);
            table.dispatch(Hook::Footer, &mut rewriter, &mut ctx, &args, String::new());

            print!("{}", html);
            output::print_rewrite_summary(output::count_tagged(&html), &rewriter.stats());
            rewriter.into_store().save()?;
        }
        Command::Gallery { inputs, page } => {
            let options = config::load_options(&cli.config)?;
            let mut ctx = page.context(&options);
            let mut rewriter = build_rewriter(&cli, options)?;

            let mut html = String::new();
            for input in inputs {
                let fragment = std::fs::read_to_string(input)?;
                html.push_str(&rewriter.render_gallery(&mut ctx, &fragment));
            }
            let html = rewriter.filter_output(&ctx, &html);
            log::info!("{} galleries rendered", ctx.gallery_id());

            print!("{}", html);
            output::print_rewrite_summary(output::count_tagged(&html), &rewriter.stats());
            rewriter.into_store().save()?;
        }
        Command::Cover { input, focal, page } => {
            let options = config::load_options(&cli.config)?;
            let content = read_input(input.as_deref())?;
            let mut ctx = page.context(&options);
            let mut rewriter = build_rewriter(&cli, options)?;

            let mut table = HookTable::new();
            rewriter.register(&mut table);
            let html = table.dispatch(
                Hook::RenderBlock,
                &mut rewriter,
                &mut ctx,
                &HookArgs::cover(*focal),
                content,
            );
            let html = rewriter.filter_output(&ctx, &html);

            print!("{}", html);
            output::print_rewrite_summary(output::count_tagged(&html), &rewriter.stats());
            rewriter.into_store().save()?;
        }
        Command::Inspect { file, json } => {
            let options = config::load_options(&cli.config)?;
            let extension = imaging::extension_of(&file.to_string_lossy())
                .filter(|ext| imaging::is_image_extension(ext))
                .ok_or_else(|| format!("{} is not a supported image", file.display()))?;
            let meta = metadata::compute(&RustBackend::new(), file, &extension);
            if *json {
                println!("{}", serde_json::to_string_pretty(&meta)?);
            } else {
                output::print_inspect(file, &meta, &extension, options.svg_scaling);
            }
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
        Command::Cache { action } => {
            let mut store = FileStore::load(&cli.cache_dir);
            let line = match action {
                CacheAction::Prune => {
                    let removed = store.prune();
                    output::format_prune(removed, store.len())
                }
                CacheAction::Clear => {
                    let removed = store.len();
                    store.clear();
                    output::format_clear(removed)
                }
            };
            store.save()?;
            println!("{}", line);
        }
    }

    Ok(())
}

fn build_rewriter(
    cli: &Cli,
    options: Options,
) -> Result<Rewriter<FileStore>, Box<dyn std::error::Error>> {
    let attachments: Box<dyn AttachmentIndex> = match &cli.attachments {
        Some(path) => {
            let index = JsonAttachments::load(path)?;
            log::debug!("{} attachments loaded from {}", index.len(), path.display());
            Box::new(index)
        }
        None => Box::new(NoAttachments),
    };
    let store = FileStore::load(&cli.cache_dir);
    Ok(Rewriter::new(options, Box::new(RustBackend::new()), store).with_attachments(attachments))
}

/// Read the input file, or stdin for `-` or no path.
fn read_input(path: Option<&Path>) -> io::Result<String> {
    match path {
        Some(p) if p != Path::new("-") => std::fs::read_to_string(p),
        _ => {
            let mut content = String::new();
            io::stdin().read_to_string(&mut content)?;
            Ok(content)
        }
    }
}
