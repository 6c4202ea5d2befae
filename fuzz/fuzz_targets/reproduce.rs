use std::sync::Arc;
use std::time::Instant;

use log::info;
use pageview::render::{compile_document, pixel_per_pt, render_page};
use pageview::world::{DocumentWorld, FontCache};

fn main() {
    env_logger::init();

    let path = std::env::args().nth(1).unwrap_or_else(|| {
        eprintln!("Usage: reproduce <artifact-file-or-typst>");
        std::process::exit(1);
    });

    let data = std::fs::read(&path).unwrap_or_else(|e| {
        eprintln!("Failed to read {path}: {e}");
        std::process::exit(1);
    });

    let source = match std::str::from_utf8(&data) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Input is not valid UTF-8: {e}");
            std::process::exit(1);
        }
    };

    let iterations = std::env::var("ITERATIONS")
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .unwrap_or(1);

    eprintln!("=== Input: {} ({} bytes), {} iteration(s) ===", path, source.len(), iterations);

    let fonts = Arc::new(FontCache::new());

    for i in 0..iterations {
        let iter_start = Instant::now();

        let world = DocumentWorld::from_source(source, Arc::clone(&fonts));
        let document = match compile_document(&world) {
            Ok(doc) => doc,
            Err(e) => {
                eprintln!("Compile error: {e}");
                std::process::exit(1);
            }
        };

        for (idx, page) in document.pages.iter().enumerate() {
            match render_page(page, pixel_per_pt(144.0, 1.0)) {
                Ok(rendered) => info!(
                    "iteration {i}: page {} is {}x{}px",
                    idx + 1,
                    rendered.width,
                    rendered.height
                ),
                Err(e) => {
                    eprintln!("Render error on page {}: {e}", idx + 1);
                    std::process::exit(1);
                }
            }
        }

        info!(
            "iteration {}: total {:.1}ms",
            i,
            iter_start.elapsed().as_secs_f64() * 1000.0
        );

        comemo::evict(0);
    }
}
