//! Tracks which page is "current": the slot whose vertical midpoint is
//! closest to the viewport's.

use log::trace;

use super::geometry::ViewportGeometry;

/// Page whose slot midpoint is nearest the viewport midpoint. Ties go to the
/// lower page. Linear in the number of slots.
pub fn nearest_page(geometry: &impl ViewportGeometry) -> Option<u32> {
    let center = geometry.viewport_rect().mid_y();
    let mut best: Option<(u32, f64)> = None;
    for page in 1..=geometry.slot_count() {
        let Some(rect) = geometry.slot_rect(page) else {
            continue;
        };
        let dist = (rect.mid_y() - center).abs();
        match best {
            Some((_, best_dist)) if dist >= best_dist => {}
            _ => best = Some((page, dist)),
        }
    }
    best.map(|(page, _)| page)
}

/// Read model for the current page.
///
/// [`update`](Self::update) and [`pin`](Self::pin) report a page only when it
/// differs from the last one reported, so hosts never redraw for nothing.
#[derive(Debug, Default)]
pub struct ScrollPositionTracker {
    current: Option<u32>,
    page_count: u32,
}

impl ScrollPositionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin tracking a freshly laid out document, starting at
    /// `initial_page` clamped to `[1, page_count]`. Returns the start page,
    /// or `None` for an empty document.
    pub fn start(&mut self, page_count: u32, initial_page: u32) -> Option<u32> {
        self.page_count = page_count;
        self.current = (page_count > 0).then(|| initial_page.clamp(1, page_count));
        self.current
    }

    pub fn stop(&mut self) {
        self.current = None;
        self.page_count = 0;
    }

    pub fn current_page(&self) -> Option<u32> {
        self.current
    }

    /// Recompute from geometry after a scroll or layout change.
    pub fn update(&mut self, geometry: &impl ViewportGeometry) -> Option<u32> {
        if self.page_count == 0 {
            return None;
        }
        let page = nearest_page(geometry)?.clamp(1, self.page_count);
        self.report(page)
    }

    /// Set the current page directly after programmatic navigation.
    pub fn pin(&mut self, page: u32) -> Option<u32> {
        if self.page_count == 0 {
            return None;
        }
        self.report(page.clamp(1, self.page_count))
    }

    fn report(&mut self, page: u32) -> Option<u32> {
        if self.current == Some(page) {
            return None;
        }
        trace!("scroll: current page {:?} -> {page}", self.current);
        self.current = Some(page);
        Some(page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::viewer::geometry::Rect;

    /// Pages of the given heights stacked with no gaps.
    struct Stack {
        heights: Vec<f64>,
        offset: f64,
        viewport_h: f64,
    }

    impl ViewportGeometry for Stack {
        fn viewport_rect(&self) -> Rect {
            Rect::new(0.0, self.offset, 100.0, self.viewport_h)
        }

        fn slot_rect(&self, page: u32) -> Option<Rect> {
            let idx = (page as usize).checked_sub(1)?;
            let h = *self.heights.get(idx)?;
            let y: f64 = self.heights[..idx].iter().sum();
            Some(Rect::new(0.0, y, 100.0, h))
        }

        fn slot_count(&self) -> u32 {
            self.heights.len() as u32
        }
    }

    fn stack(offset: f64) -> Stack {
        Stack {
            heights: vec![1000.0; 5],
            offset,
            viewport_h: 800.0,
        }
    }

    #[test]
    fn nearest_page_uses_midpoints() {
        assert_eq!(nearest_page(&stack(0.0)), Some(1));
        // viewport mid 1600: page 2 mid 1500, page 3 mid 2500
        assert_eq!(nearest_page(&stack(1200.0)), Some(2));
        assert_eq!(nearest_page(&stack(1700.0)), Some(3));
    }

    #[test]
    fn tie_prefers_lower_page() {
        // viewport mid 1000 sits exactly between pages 1 and 2
        assert_eq!(nearest_page(&stack(600.0)), Some(1));
    }

    #[test]
    fn empty_geometry_has_no_page() {
        let empty = Stack {
            heights: vec![],
            offset: 0.0,
            viewport_h: 800.0,
        };
        assert_eq!(nearest_page(&empty), None);
    }

    #[test]
    fn redundant_updates_are_suppressed() {
        let mut tracker = ScrollPositionTracker::new();
        tracker.start(5, 1);
        assert_eq!(tracker.update(&stack(0.0)), None);
        assert_eq!(tracker.update(&stack(1200.0)), Some(2));
        assert_eq!(tracker.update(&stack(1250.0)), None);
        assert_eq!(tracker.current_page(), Some(2));
    }

    #[test]
    fn start_clamps_initial_page() {
        let mut tracker = ScrollPositionTracker::new();
        assert_eq!(tracker.start(5, 99), Some(5));
        assert_eq!(tracker.start(5, 0), Some(1));
        assert_eq!(tracker.start(0, 3), None);
    }

    #[test]
    fn pin_reports_changes_only() {
        let mut tracker = ScrollPositionTracker::new();
        tracker.start(5, 1);
        assert_eq!(tracker.pin(4), Some(4));
        assert_eq!(tracker.pin(4), None);
    }

    #[test]
    fn stopped_tracker_is_undefined() {
        let mut tracker = ScrollPositionTracker::new();
        tracker.start(5, 2);
        tracker.stop();
        assert_eq!(tracker.current_page(), None);
        assert_eq!(tracker.update(&stack(0.0)), None);
    }
}
