//! Placeholder layout: one correctly sized empty slot per page, built before
//! anything is painted so the scroll container has its final extent at once.

use std::time::Instant;

use log::{debug, info, warn};

use super::error::ViewerError;
use super::rasterizer::PageSize;

/// Size used at scale 1.0 when no page before a failed one could be measured
/// (A4 in points).
pub const FALLBACK_PAGE_SIZE: PageSize = PageSize::new(595.0, 842.0);

/// Counter bumped on every slot rebuild.
///
/// Every paint request carries the generation it was issued under; a
/// completion is applied only if the layout is still at that generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct LayoutGeneration(u64);

impl LayoutGeneration {
    pub fn value(self) -> u64 {
        self.0
    }

    pub fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }

    /// Whether a result issued under `issued` may still touch the slots of
    /// this generation.
    pub fn accepts(self, issued: LayoutGeneration) -> bool {
        self == issued
    }
}

#[derive(Debug)]
pub enum SlotState<S> {
    Unrendered,
    Rendered(S),
}

/// A reserved region for one page.
#[derive(Debug)]
pub struct PageSlot<S> {
    /// 1-based page number.
    pub page: u32,
    pub size: PageSize,
    pub state: SlotState<S>,
}

impl<S> PageSlot<S> {
    fn placeholder(page: u32, size: PageSize) -> Self {
        Self {
            page,
            size,
            state: SlotState::Unrendered,
        }
    }

    pub fn is_rendered(&self) -> bool {
        matches!(self.state, SlotState::Rendered(_))
    }

    pub fn surface(&self) -> Option<&S> {
        match &self.state {
            SlotState::Rendered(s) => Some(s),
            SlotState::Unrendered => None,
        }
    }
}

/// Owns the current slot sequence and its generation.
#[derive(Debug)]
pub struct PlaceholderLayout<S> {
    slots: Vec<PageSlot<S>>,
    generation: LayoutGeneration,
    scale: f32,
    degraded: Vec<u32>,
}

impl<S> Default for PlaceholderLayout<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> PlaceholderLayout<S> {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            generation: LayoutGeneration::default(),
            scale: 1.0,
            degraded: Vec::new(),
        }
    }

    /// Replace every slot with fresh placeholders for `page_count` pages at
    /// `scale`, returning the new generation.
    ///
    /// `measure(page)` returns the page's size already scaled. A page that
    /// cannot be measured takes the dimensions of the last page that could
    /// (or [`FALLBACK_PAGE_SIZE`] scaled, if none has yet); the rebuild
    /// never aborts and logs a single warning naming the affected pages.
    pub fn build<F>(&mut self, page_count: u32, scale: f32, mut measure: F) -> LayoutGeneration
    where
        F: FnMut(u32) -> Result<PageSize, ViewerError>,
    {
        let start = Instant::now();
        self.generation = self.generation.next();
        self.scale = scale;
        self.degraded.clear();

        let mut slots = Vec::with_capacity(page_count as usize);
        let mut last_good: Option<PageSize> = None;
        for page in 1..=page_count {
            let measured = match measure(page) {
                Ok(size) if size.is_usable() => Ok(size),
                Ok(size) => Err(ViewerError::page_measure(
                    page,
                    format!("unusable size {}x{}", size.width, size.height),
                )),
                Err(e) => Err(e),
            };
            let size = match measured {
                Ok(size) => {
                    last_good = Some(size);
                    size
                }
                Err(e) => {
                    debug!("layout: {e}");
                    self.degraded.push(page);
                    last_good.unwrap_or_else(|| FALLBACK_PAGE_SIZE.scaled(scale))
                }
            };
            slots.push(PageSlot::placeholder(page, size));
        }
        self.slots = slots;

        if !self.degraded.is_empty() {
            warn!(
                "layout: {} page(s) could not be measured, using neighbouring dimensions: {:?}",
                self.degraded.len(),
                self.degraded
            );
        }
        info!(
            "layout: generation {} built {} slot(s) at scale {} in {:.1}ms",
            self.generation.value(),
            self.slots.len(),
            scale,
            start.elapsed().as_secs_f64() * 1000.0
        );
        self.generation
    }

    /// Drop all slots. Bumps the generation so in-flight paints are ignored.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.degraded.clear();
        self.generation = self.generation.next();
    }

    pub fn generation(&self) -> LayoutGeneration {
        self.generation
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn slots(&self) -> &[PageSlot<S>] {
        &self.slots
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn slot(&self, page: u32) -> Option<&PageSlot<S>> {
        let idx = (page as usize).checked_sub(1)?;
        self.slots.get(idx)
    }

    /// Pages whose size was borrowed during the last build.
    pub fn degraded_pages(&self) -> &[u32] {
        &self.degraded
    }

    /// Store a painted surface in `page`'s slot.
    ///
    /// Returns false, leaving everything untouched, when `issued` is not the
    /// current generation or the page has no slot.
    pub fn fill(&mut self, issued: LayoutGeneration, page: u32, surface: S) -> bool {
        if !self.generation.accepts(issued) {
            return false;
        }
        let Some(idx) = (page as usize).checked_sub(1) else {
            return false;
        };
        match self.slots.get_mut(idx) {
            Some(slot) => {
                slot.state = SlotState::Rendered(surface);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uniform(_page: u32, scale: f32) -> Result<PageSize, ViewerError> {
        Ok(PageSize::new(100.0, 150.0).scaled(scale))
    }

    #[test]
    fn builds_one_slot_per_page_in_order() {
        let mut layout: PlaceholderLayout<()> = PlaceholderLayout::new();
        layout.build(4, 1.0, |p| uniform(p, 1.0));
        let pages: Vec<u32> = layout.slots().iter().map(|s| s.page).collect();
        assert_eq!(pages, vec![1, 2, 3, 4]);
        assert!(layout.slots().iter().all(|s| !s.is_rendered()));
    }

    #[test]
    fn zero_pages_builds_nothing() {
        let mut layout: PlaceholderLayout<()> = PlaceholderLayout::new();
        layout.build(0, 1.0, |p| uniform(p, 1.0));
        assert!(layout.is_empty());
        assert!(layout.slot(1).is_none());
    }

    #[test]
    fn every_build_bumps_generation() {
        let mut layout: PlaceholderLayout<()> = PlaceholderLayout::new();
        let g1 = layout.build(2, 1.0, |p| uniform(p, 1.0));
        let g2 = layout.build(2, 2.0, |p| uniform(p, 2.0));
        assert!(g2 > g1);
        assert_eq!(layout.generation(), g2);
        assert_eq!(layout.scale(), 2.0);
    }

    #[test]
    fn unmeasurable_page_borrows_previous_size() {
        let mut layout: PlaceholderLayout<()> = PlaceholderLayout::new();
        layout.build(3, 1.0, |p| match p {
            1 => Ok(PageSize::new(10.0, 20.0)),
            2 => Err(ViewerError::page_measure(2, "corrupt")),
            _ => Ok(PageSize::new(30.0, 40.0)),
        });
        assert_eq!(layout.slot(2).unwrap().size, PageSize::new(10.0, 20.0));
        assert_eq!(layout.slot(3).unwrap().size, PageSize::new(30.0, 40.0));
        assert_eq!(layout.degraded_pages(), &[2]);
    }

    #[test]
    fn leading_unmeasurable_page_uses_fallback() {
        let mut layout: PlaceholderLayout<()> = PlaceholderLayout::new();
        layout.build(2, 2.0, |p| {
            if p == 1 {
                Err(ViewerError::page_measure(1, "corrupt"))
            } else {
                Ok(PageSize::new(1.0, 1.0))
            }
        });
        assert_eq!(layout.slot(1).unwrap().size, FALLBACK_PAGE_SIZE.scaled(2.0));
    }

    #[test]
    fn zero_sized_page_counts_as_unmeasurable() {
        let mut layout: PlaceholderLayout<()> = PlaceholderLayout::new();
        layout.build(2, 1.0, |p| {
            if p == 1 {
                Ok(PageSize::new(50.0, 60.0))
            } else {
                Ok(PageSize::new(0.0, 0.0))
            }
        });
        assert_eq!(layout.slot(2).unwrap().size, PageSize::new(50.0, 60.0));
        assert_eq!(layout.degraded_pages(), &[2]);
    }

    #[test]
    fn fill_rejects_stale_generation() {
        let mut layout: PlaceholderLayout<&str> = PlaceholderLayout::new();
        let old = layout.build(2, 1.0, |p| uniform(p, 1.0));
        layout.build(2, 1.5, |p| uniform(p, 1.5));
        assert!(!layout.fill(old, 1, "stale"));
        assert!(!layout.slot(1).unwrap().is_rendered());

        let current = layout.generation();
        assert!(layout.fill(current, 1, "fresh"));
        assert_eq!(layout.slot(1).unwrap().surface(), Some(&"fresh"));
    }

    #[test]
    fn fill_out_of_range_page() {
        let mut layout: PlaceholderLayout<()> = PlaceholderLayout::new();
        let g = layout.build(1, 1.0, |p| uniform(p, 1.0));
        assert!(!layout.fill(g, 0, ()));
        assert!(!layout.fill(g, 2, ()));
    }

    #[test]
    fn clear_invalidates_in_flight_generation() {
        let mut layout: PlaceholderLayout<()> = PlaceholderLayout::new();
        let g = layout.build(1, 1.0, |p| uniform(p, 1.0));
        layout.clear();
        assert!(layout.is_empty());
        assert!(!layout.generation().accepts(g));
    }
}
