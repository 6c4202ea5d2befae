use std::time::Instant;

use anyhow::{Result, bail};
use log::{info, warn};
use typst::layout::{Page, PagedDocument};

use crate::world::DocumentWorld;

/// Compile the world's main file into pages.
pub fn compile_document(world: &DocumentWorld) -> Result<PagedDocument> {
    let start = Instant::now();
    let warned = typst::compile::<PagedDocument>(world);

    for warning in &warned.warnings {
        warn!("typst warning: {}", warning.message);
    }

    let document = match warned.output {
        Ok(doc) => doc,
        Err(errors) => {
            let messages: Vec<String> = errors.iter().map(|e| e.message.to_string()).collect();
            bail!(
                "typst compilation failed with {} error(s): {}",
                errors.len(),
                messages.join("; ")
            );
        }
    };

    if document.pages.is_empty() {
        bail!("typst produced no pages");
    }

    info!(
        "render: compiled {} page(s) in {:.1}ms",
        document.pages.len(),
        start.elapsed().as_secs_f64() * 1000.0
    );
    Ok(document)
}

/// Natural page size in points.
pub fn page_size_pt(page: &Page) -> (f64, f64) {
    let size = page.frame.size();
    (size.x.to_pt(), size.y.to_pt())
}

/// Device pixels per typographic point at `ppi` and `scale`.
pub fn pixel_per_pt(ppi: f32, scale: f32) -> f32 {
    ppi / 72.0 * scale
}

/// Pixel dimensions `page` gets at `pixel_per_pt`, rounded up.
pub fn page_size_px(page: &Page, pixel_per_pt: f32) -> (f64, f64) {
    let (w, h) = page_size_pt(page);
    let k = pixel_per_pt as f64;
    ((w * k).ceil(), (h * k).ceil())
}

/// A page rasterized to PNG.
#[derive(Debug, Clone)]
pub struct RenderedPage {
    pub png: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Rasterize one page.
pub fn render_page(page: &Page, pixel_per_pt: f32) -> Result<RenderedPage> {
    let start = Instant::now();
    let pixmap = typst_render::render(page, pixel_per_pt);
    let (width, height) = (pixmap.width(), pixmap.height());
    let png = pixmap
        .encode_png()
        .map_err(|e| anyhow::anyhow!("PNG encoding failed: {e}"))?;
    log::debug!(
        "render: {width}x{height}px page in {:.1}ms ({} bytes)",
        start.elapsed().as_secs_f64() * 1000.0,
        png.len()
    );
    Ok(RenderedPage { png, width, height })
}
