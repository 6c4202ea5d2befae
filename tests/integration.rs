use std::sync::Arc;
use std::time::{Duration, Instant};

use pageview::document::TypstRasterizer;
use pageview::render::{compile_document, page_size_pt, pixel_per_pt, render_page};
use pageview::viewer::{
    PageRasterizer, PageSize, ViewerController, ViewerError, ViewerOptions, ViewerPhase,
};
use pageview::world::{DocumentWorld, FontCache};

const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n";

fn rasterizer() -> TypstRasterizer {
    // 72 ppi: one pixel per point at scale 1.0
    TypstRasterizer::new(Arc::new(FontCache::new()), 72.0)
}

/// Pump until `page`'s slot is painted or the deadline passes.
fn wait_for_page(viewer: &mut ViewerController<TypstRasterizer>, page: u32) -> bool {
    let deadline = Instant::now() + Duration::from_secs(30);
    while Instant::now() < deadline {
        viewer.pump();
        if viewer.layout().slot(page).is_some_and(|s| s.is_rendered()) {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    false
}

#[test]
fn test_compile_from_source() {
    let fonts = Arc::new(FontCache::new());
    let world = DocumentWorld::from_source(
        "#set page(width: 100pt, height: 50pt)\nHello",
        fonts,
    );
    let document = compile_document(&world).expect("compilation should succeed");
    assert_eq!(document.pages.len(), 1);
    assert_eq!(page_size_pt(&document.pages[0]), (100.0, 50.0));

    let rendered =
        render_page(&document.pages[0], pixel_per_pt(144.0, 1.0)).expect("render should succeed");
    assert_eq!(&rendered.png[..8], PNG_MAGIC, "output should be valid PNG");
    assert_eq!((rendered.width, rendered.height), (200, 100));
}

#[test]
fn test_compile_error_is_reported() {
    let fonts = Arc::new(FontCache::new());
    let world = DocumentWorld::from_source("#let x = (", fonts);
    let err = compile_document(&world).expect_err("unclosed delimiter should fail");
    assert!(format!("{err:#}").contains("compilation failed"));
}

#[test]
fn test_measures_every_page() {
    let mut raster = rasterizer();
    let document = raster
        .open_document("tests/fixtures/three_pages.typ")
        .expect("fixture should compile");
    assert_eq!(raster.page_count(&document), 3);
    for page in 1..=3 {
        assert_eq!(
            raster.page_size(&document, page, 1.5).expect("page exists"),
            PageSize::new(300.0, 450.0)
        );
    }
    assert!(matches!(
        raster.page_size(&document, 4, 1.0),
        Err(ViewerError::PageMeasure { page: 4, .. })
    ));
    raster.close_document(document);
}

#[test]
fn test_slots_follow_page_sizes() {
    let mut viewer = ViewerController::new(rasterizer(), ViewerOptions::default());
    viewer
        .open("tests/fixtures/mixed_sizes.typ", None)
        .expect("fixture should compile");
    let sizes: Vec<PageSize> = viewer.layout().slots().iter().map(|s| s.size).collect();
    assert_eq!(
        sizes,
        vec![PageSize::new(300.0, 450.0), PageSize::new(600.0, 150.0)]
    );
}

#[test]
fn test_viewer_paints_visible_pages() {
    let mut viewer = ViewerController::new(rasterizer(), ViewerOptions::default());
    viewer
        .open("tests/fixtures/three_pages.typ", Some(2))
        .expect("fixture should compile");
    viewer.settle();
    assert_eq!(viewer.current_page(), Some(2));

    assert!(wait_for_page(&mut viewer, 2), "page 2 should be painted");
    let surface = viewer
        .layout()
        .slot(2)
        .and_then(|s| s.surface())
        .expect("slot 2 holds a surface");
    assert_eq!(&surface.png[..8], PNG_MAGIC);
    assert_eq!((surface.width, surface.height), (300, 450));
}

#[test]
fn test_zoom_repaints_at_new_size() {
    let mut viewer = ViewerController::new(rasterizer(), ViewerOptions::default());
    viewer
        .open("tests/fixtures/three_pages.typ", None)
        .expect("fixture should compile");
    viewer.settle();
    assert!(wait_for_page(&mut viewer, 1));

    assert!(viewer.set_scale(2.0));
    viewer.settle();
    assert!(wait_for_page(&mut viewer, 1));
    let surface = viewer
        .layout()
        .slot(1)
        .and_then(|s| s.surface())
        .expect("slot 1 holds a surface");
    assert_eq!((surface.width, surface.height), (400, 600));
}

#[test]
fn test_broken_document_fails_to_load() {
    let mut viewer = ViewerController::new(rasterizer(), ViewerOptions::default());
    let err = viewer
        .open("tests/fixtures/broken.typ", None)
        .expect_err("broken fixture should not compile");
    assert!(matches!(err, ViewerError::DocumentLoad { .. }));
    assert!(err.is_fatal());
    assert_eq!(viewer.phase(), ViewerPhase::Closed);
    assert_eq!(viewer.total_pages(), 0);
}

#[test]
fn test_missing_file_fails_to_load() {
    let mut viewer = ViewerController::new(rasterizer(), ViewerOptions::default());
    let err = viewer
        .open("tests/fixtures/does_not_exist.typ", None)
        .expect_err("missing file should not open");
    assert!(err.to_string().contains("does_not_exist.typ"));
}
