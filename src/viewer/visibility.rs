//! Decides which slots have come close enough to the viewport to be painted.

use std::collections::HashSet;

use log::{debug, trace};

use super::geometry::ViewportGeometry;
use super::layout::PageSlot;

/// Extra distance beyond the viewport edges, in pixels, within which a slot
/// already counts as visible.
pub const DEFAULT_VISIBILITY_MARGIN: f64 = 600.0;

/// Reports each observed slot once, the first time it enters the viewport
/// expanded by the margin.
#[derive(Debug)]
pub struct VisibilityTracker {
    margin: f64,
    observed: Vec<u32>,
    fired: HashSet<u32>,
}

impl Default for VisibilityTracker {
    fn default() -> Self {
        Self::new(DEFAULT_VISIBILITY_MARGIN)
    }
}

impl VisibilityTracker {
    pub fn new(margin: f64) -> Self {
        Self {
            margin: margin.max(0.0),
            observed: Vec::new(),
            fired: HashSet::new(),
        }
    }

    pub fn margin(&self) -> f64 {
        self.margin
    }

    /// Start watching `slots`, replacing anything observed before. Slots that
    /// are already painted are never reported.
    pub fn observe<S>(&mut self, slots: &[PageSlot<S>]) {
        self.observed = slots
            .iter()
            .filter(|s| !s.is_rendered())
            .map(|s| s.page)
            .collect();
        self.fired.clear();
        debug!("visibility: observing {} slot(s)", self.observed.len());
    }

    /// Stop all notifications. Must precede a relayout.
    pub fn disconnect(&mut self) {
        if !self.observed.is_empty() {
            debug!("visibility: disconnected from {} slot(s)", self.observed.len());
        }
        self.observed.clear();
        self.fired.clear();
    }

    pub fn is_connected(&self) -> bool {
        !self.observed.is_empty()
    }

    /// Whether `page`'s slot intersects the viewport grown by the margin.
    pub fn is_near_viewport(&self, geometry: &impl ViewportGeometry, page: u32) -> bool {
        let zone = geometry.viewport_rect().expand_y(self.margin);
        geometry
            .slot_rect(page)
            .is_some_and(|rect| rect.overlaps_y(&zone))
    }

    /// Pages entering the visibility zone for the first time since
    /// [`observe`](Self::observe), in ascending page order.
    pub fn poll(&mut self, geometry: &impl ViewportGeometry) -> Vec<u32> {
        let entered: Vec<u32> = self
            .observed
            .iter()
            .copied()
            .filter(|page| !self.fired.contains(page))
            .filter(|&page| self.is_near_viewport(geometry, page))
            .collect();
        for &page in &entered {
            trace!("visibility: page {page} entered the margin");
            self.fired.insert(page);
        }
        entered
    }

    /// Let `page` be reported again the next time it is inside the zone.
    pub fn rearm(&mut self, page: u32) {
        if self.fired.remove(&page) {
            trace!("visibility: page {page} re-armed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::viewer::geometry::Rect;
    use crate::viewer::layout::PlaceholderLayout;
    use crate::viewer::rasterizer::PageSize;

    /// Ten 1000px pages with no gaps and a 500px viewport.
    struct Column {
        offset: f64,
    }

    impl ViewportGeometry for Column {
        fn viewport_rect(&self) -> Rect {
            Rect::new(0.0, self.offset, 800.0, 500.0)
        }

        fn slot_rect(&self, page: u32) -> Option<Rect> {
            (1..=10)
                .contains(&page)
                .then(|| Rect::new(0.0, (page - 1) as f64 * 1000.0, 800.0, 1000.0))
        }

        fn slot_count(&self) -> u32 {
            10
        }
    }

    fn slots(n: u32) -> PlaceholderLayout<()> {
        let mut layout = PlaceholderLayout::new();
        layout.build(n, 1.0, |_| Ok(PageSize::new(800.0, 1000.0)));
        layout
    }

    #[test]
    fn margin_pulls_in_next_page() {
        let layout = slots(10);
        let mut tracker = VisibilityTracker::new(600.0);
        tracker.observe(layout.slots());
        // viewport 0..500, zone -600..1100 touches pages 1 and 2
        assert_eq!(tracker.poll(&Column { offset: 0.0 }), vec![1, 2]);
    }

    #[test]
    fn without_margin_only_visible_page() {
        let layout = slots(10);
        let mut tracker = VisibilityTracker::new(0.0);
        tracker.observe(layout.slots());
        assert_eq!(tracker.poll(&Column { offset: 0.0 }), vec![1]);
    }

    #[test]
    fn each_slot_fires_once() {
        let layout = slots(10);
        let mut tracker = VisibilityTracker::new(600.0);
        tracker.observe(layout.slots());
        tracker.poll(&Column { offset: 0.0 });
        assert!(tracker.poll(&Column { offset: 0.0 }).is_empty());
        assert_eq!(tracker.poll(&Column { offset: 1500.0 }), vec![3]);
    }

    #[test]
    fn jump_reports_only_the_destination() {
        let layout = slots(10);
        let mut tracker = VisibilityTracker::new(600.0);
        tracker.observe(layout.slots());
        assert_eq!(tracker.poll(&Column { offset: 8200.0 }), vec![8, 9, 10]);
    }

    #[test]
    fn disconnect_silences_everything() {
        let layout = slots(10);
        let mut tracker = VisibilityTracker::new(600.0);
        tracker.observe(layout.slots());
        tracker.disconnect();
        assert!(!tracker.is_connected());
        assert!(tracker.poll(&Column { offset: 0.0 }).is_empty());
    }

    #[test]
    fn rendered_slots_are_not_observed() {
        let mut layout = slots(2);
        let g = layout.generation();
        layout.fill(g, 1, ());
        let mut tracker = VisibilityTracker::new(600.0);
        tracker.observe(layout.slots());
        assert_eq!(tracker.poll(&Column { offset: 0.0 }), vec![2]);
    }

    #[test]
    fn near_viewport_includes_margin() {
        let tracker = VisibilityTracker::new(600.0);
        let view = Column { offset: 3000.0 };
        // zone 2400..4100
        assert!(tracker.is_near_viewport(&view, 3));
        assert!(tracker.is_near_viewport(&view, 5));
        assert!(!tracker.is_near_viewport(&view, 2));
        assert!(!tracker.is_near_viewport(&view, 6));
        assert!(!tracker.is_near_viewport(&view, 11));
    }

    #[test]
    fn rearmed_page_fires_again() {
        let layout = slots(10);
        let mut tracker = VisibilityTracker::new(600.0);
        tracker.observe(layout.slots());
        assert_eq!(tracker.poll(&Column { offset: 0.0 }), vec![1, 2]);
        tracker.rearm(1);
        assert_eq!(tracker.poll(&Column { offset: 0.0 }), vec![1]);
        // never reported, nothing to re-arm
        tracker.rearm(7);
        assert!(tracker.poll(&Column { offset: 0.0 }).is_empty());
    }
}
