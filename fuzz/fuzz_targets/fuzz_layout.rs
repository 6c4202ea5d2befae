#![no_main]

use libfuzzer_sys::fuzz_target;
use pageview::render::{compile_document, page_size_px, pixel_per_pt};
use pageview::viewer::{PageSize, PlaceholderLayout, ViewerError};
use pageview::world::{DocumentWorld, FontCache};
use std::sync::{Arc, LazyLock};

static FONTS: LazyLock<Arc<FontCache>> = LazyLock::new(|| Arc::new(FontCache::new()));

// Any source that compiles must lay out one usable slot per page.
fuzz_target!(|data: &[u8]| {
    let Ok(source) = std::str::from_utf8(data) else {
        return;
    };

    let world = DocumentWorld::from_source(source, Arc::clone(&FONTS));
    let Ok(document) = compile_document(&world) else {
        return;
    };

    let mut layout: PlaceholderLayout<()> = PlaceholderLayout::new();
    let scale = 1.5;
    layout.build(document.pages.len() as u32, scale, |page| {
        let frame = &document.pages[(page - 1) as usize];
        let (w, h) = page_size_px(frame, pixel_per_pt(144.0, scale));
        Ok::<_, ViewerError>(PageSize::new(w, h))
    });

    assert_eq!(layout.len(), document.pages.len());
    for slot in layout.slots() {
        assert!(slot.size.is_usable(), "page {} has size {:?}", slot.page, slot.size);
    }
});
