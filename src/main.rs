use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::info;

use pageview::config;
use pageview::document::TypstRasterizer;
use pageview::render::{self, RenderedPage, compile_document};
use pageview::viewer::{PageRasterizer, PlaceholderLayout};
use pageview::world::{DocumentWorld, FontCache};

const VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("PAGEVIEW_BUILD_GIT_HASH"),
    " ",
    env!("PAGEVIEW_BUILD_PROFILE"),
    ")"
);

#[derive(Parser)]
#[command(
    name = "pageview",
    version = VERSION,
    about = "Virtualized terminal viewer for paged Typst documents"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Typst file to view
    input: Option<PathBuf>,

    /// Page to open at (1-based)
    #[arg(long)]
    page: Option<u32>,

    /// Initial zoom factor
    #[arg(long, global = true)]
    scale: Option<f32>,

    /// Resolution at zoom 1.0, in pixels per inch
    #[arg(long, global = true)]
    ppi: Option<f32>,

    /// Disable automatic file watching (viewer reloads on file change by default)
    #[arg(long)]
    no_watch: bool,

    /// Log output file path (enables logging when specified)
    #[arg(long, global = true)]
    log: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Render one page to PNG
    Render {
        /// Input Typst file
        input: PathBuf,

        /// Page to render (1-based)
        #[arg(long, default_value_t = 1)]
        page: u32,

        /// Output PNG file
        #[arg(short, long, default_value = "page.png")]
        output: PathBuf,
    },
    /// Print the page count and slot size of every page
    Info {
        /// Input Typst file
        input: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    if let Some(log_path) = &cli.log {
        let file = match std::fs::File::create(log_path) {
            Ok(f) => f,
            Err(e) => {
                eprintln!("Error: failed to open log file {}: {e}", log_path.display());
                std::process::exit(1);
            }
        };
        env_logger::Builder::from_default_env()
            .target(env_logger::Target::Pipe(Box::new(file)))
            .init();
    } else if cli.command.is_some() {
        env_logger::init();
    }
    // viewer mode + no --log → logger not initialized (the viewer owns the terminal)

    // Load config file and merge CLI overrides
    let mut cfg = match config::load_config() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {e:#}");
            std::process::exit(1);
        }
    };
    cfg.merge_cli(cli.scale, cli.ppi);
    let config = cfg.resolve();

    let result = match cli.command {
        Some(Command::Render {
            input,
            page,
            output,
        }) => cmd_render(input, page, output, &config),
        Some(Command::Info { input }) => cmd_info(input, &config),
        None => match cli.input {
            Some(path) => pageview::tty::run(path, config, cli.page, !cli.no_watch),
            None => {
                eprintln!("Error: input file required");
                std::process::exit(1);
            }
        },
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn cmd_render(input: PathBuf, page: u32, output: PathBuf, config: &config::Config) -> Result<()> {
    let pipeline_start = Instant::now();
    let scale = config.viewer.scale.default;

    let fonts = Arc::new(FontCache::new());
    let world = DocumentWorld::open(&input, fonts)?;
    let document = compile_document(&world)?;

    let total = document.pages.len();
    let frame = (page as usize)
        .checked_sub(1)
        .and_then(|idx| document.pages.get(idx))
        .ok_or_else(|| anyhow::anyhow!("page {page} out of range (document has {total})"))?;

    let RenderedPage { png, width, height } =
        render::render_page(frame, render::pixel_per_pt(config.ppi, scale))?;

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    fs::write(&output, &png).with_context(|| format!("failed to write {}", output.display()))?;

    info!(
        "cmd_render: total pipeline completed in {:.1}ms",
        pipeline_start.elapsed().as_secs_f64() * 1000.0
    );
    eprintln!(
        "rendered {} page {page}/{total} -> {} ({width}x{height} px, {} bytes)",
        input.display(),
        output.display(),
        png.len()
    );
    Ok(())
}

fn cmd_info(input: PathBuf, config: &config::Config) -> Result<()> {
    let scale = config.viewer.scale.default;
    let mut rasterizer = TypstRasterizer::new(Arc::new(FontCache::new()), config.ppi);
    let document = rasterizer.open_document(&input.to_string_lossy())?;
    let count = rasterizer.page_count(&document);

    let mut layout: PlaceholderLayout<RenderedPage> = PlaceholderLayout::new();
    layout.build(count, scale, |page| {
        rasterizer.page_size(&document, page, scale)
    });

    println!(
        "{}: {count} page(s) at scale {scale} ({} ppi)",
        input.display(),
        config.ppi
    );
    for slot in layout.slots() {
        println!(
            "  page {:>4}: {} x {} px",
            slot.page, slot.size.width, slot.size.height
        );
    }
    if !layout.degraded_pages().is_empty() {
        println!("  unmeasurable: {:?}", layout.degraded_pages());
    }

    rasterizer.close_document(document);
    Ok(())
}
