#![no_main]

use libfuzzer_sys::fuzz_target;
use pageview::viewer::{
    PageSize, SyntheticRasterizer, ViewerController, ViewerOptions, ViewerPhase,
};

// Byte 0: page count. Byte 1: bitmask of unmeasurable pages among the first
// eight. Byte 2: bitmask of pages whose paint fails. Then (opcode, arg)
// pairs.
fuzz_target!(|data: &[u8]| {
    let [count, corrupt, failing, ops @ ..] = data else {
        return;
    };
    let count = u32::from(*count % 64);

    let mut raster = SyntheticRasterizer::new();
    let pages = (0..count)
        .map(|i| {
            let corrupt = i < 8 && corrupt & (1 << i) != 0;
            (!corrupt).then(|| PageSize::new(300.0 + f64::from(i % 5) * 100.0, 800.0))
        })
        .collect();
    raster.add_document("doc", pages);
    for page in 1..=8 {
        if failing & (1 << (page - 1)) != 0 {
            raster.fail_render(page);
        }
    }
    raster.hold_completions(ops.first().is_some_and(|b| b & 1 == 1));

    let mut viewer = ViewerController::new(raster, ViewerOptions::default());
    if viewer.open("doc", Some(u32::from(*corrupt))).is_err() {
        return;
    }

    for pair in ops.chunks_exact(2) {
        let arg = pair[1];
        match pair[0] % 14 {
            0 => viewer.settle(),
            1 => {
                viewer.pump();
            }
            2 => viewer.on_scroll(f64::from(arg) * 250.0),
            3 => viewer.scroll_by(f64::from(arg as i8) * 40.0),
            4 => {
                viewer.go_to_page(u32::from(arg));
            }
            5 => {
                viewer.next_page();
            }
            6 => {
                viewer.previous_page();
            }
            7 => {
                viewer.zoom_in();
            }
            8 => {
                viewer.zoom_out();
            }
            9 => {
                viewer.set_scale(f32::from(arg) / 40.0);
            }
            10 => viewer.resize(f64::from(arg) * 10.0, f64::from(arg) * 8.0),
            11 => {
                viewer.rasterizer_mut().release();
            }
            12 => {
                viewer.on_becomes_visible(u32::from(arg));
            }
            _ => {
                if viewer.open("doc", Some(u32::from(arg))).is_err() {
                    return;
                }
            }
        }

        let state = viewer.state();
        assert_eq!(state.phase, ViewerPhase::Ready);
        assert_eq!(viewer.layout().len() as u32, count);
        if count > 0 {
            let page = state.current_page.expect("current page while ready");
            assert!((1..=count).contains(&page));
        }
        let range = viewer.scale_range();
        assert!(state.scale >= range.min && state.scale <= range.max);
        let offset = viewer.viewport().scroll_offset();
        assert!(offset >= 0.0 && offset <= viewer.viewport().scrollable_extent());
        for slot in viewer.layout().slots() {
            assert!(slot.size.is_usable());
        }
    }

    viewer.close();
    assert_eq!(viewer.phase(), ViewerPhase::Closed);
    assert!(viewer.layout().is_empty());
});
