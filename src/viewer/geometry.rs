//! Viewport geometry.
//!
//! All rectangles live in scroll-content coordinates: `y = 0` is the top of
//! the first slot's container and the viewport rect's `y` is the current
//! scroll offset.

use super::layout::PageSlot;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn mid_y(&self) -> f64 {
        self.y + self.height / 2.0
    }

    /// Grow vertically by `margin` on both edges.
    pub fn expand_y(&self, margin: f64) -> Rect {
        Rect {
            y: self.y - margin,
            height: self.height + 2.0 * margin,
            ..*self
        }
    }

    /// Vertical overlap test. Touching edges do not overlap.
    pub fn overlaps_y(&self, other: &Rect) -> bool {
        self.y < other.bottom() && other.y < self.bottom()
    }
}

/// Read-only view of the scroll container.
///
/// The trackers only read through this trait, so they can be driven by
/// synthetic geometry in tests.
pub trait ViewportGeometry {
    fn viewport_rect(&self) -> Rect;

    /// Rect of the slot for 1-based `page`, if laid out.
    fn slot_rect(&self, page: u32) -> Option<Rect>;

    fn slot_count(&self) -> u32;
}

/// The scroll container: slots stacked top to bottom, `gap` pixels apart
/// and `gap` from the top and bottom edges, each centered horizontally.
#[derive(Debug, Clone)]
pub struct ScrollViewport {
    width: f64,
    height: f64,
    gap: f64,
    offset: f64,
    rects: Vec<Rect>,
    content_height: f64,
}

impl ScrollViewport {
    pub fn new(width: f64, height: f64, gap: f64) -> Self {
        Self {
            width: width.max(0.0),
            height: height.max(0.0),
            gap: gap.max(0.0),
            offset: 0.0,
            rects: Vec::new(),
            content_height: 0.0,
        }
    }

    /// Position `slots` and recompute the content height. The scroll offset
    /// is clamped to the new extent; callers that need to preserve position
    /// must read it first.
    pub fn lay_out<S>(&mut self, slots: &[PageSlot<S>]) {
        self.rects.clear();
        if slots.is_empty() {
            self.content_height = 0.0;
            self.offset = 0.0;
            return;
        }
        let mut cursor = self.gap;
        for slot in slots {
            let w = slot.size.width;
            let h = slot.size.height;
            self.rects.push(Rect::new(self.centered_x(w), cursor, w, h));
            cursor += h + self.gap;
        }
        self.content_height = cursor;
        self.offset = self.offset.clamp(0.0, self.scrollable_extent());
    }

    /// Forget every slot.
    pub fn clear(&mut self) {
        self.rects.clear();
        self.content_height = 0.0;
        self.offset = 0.0;
    }

    pub fn resize(&mut self, width: f64, height: f64) {
        self.width = width.max(0.0);
        self.height = height.max(0.0);
        let width = self.width;
        for r in &mut self.rects {
            r.x = ((width - r.width) / 2.0).max(0.0);
        }
        self.offset = self.offset.clamp(0.0, self.scrollable_extent());
    }

    fn centered_x(&self, w: f64) -> f64 {
        ((self.width - w) / 2.0).max(0.0)
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn height(&self) -> f64 {
        self.height
    }

    pub fn content_height(&self) -> f64 {
        self.content_height
    }

    pub fn scroll_offset(&self) -> f64 {
        self.offset
    }

    /// Largest valid scroll offset.
    pub fn scrollable_extent(&self) -> f64 {
        (self.content_height - self.height).max(0.0)
    }

    /// Scroll to `offset`, clamped. Returns the offset applied.
    pub fn set_scroll_offset(&mut self, offset: f64) -> f64 {
        let offset = if offset.is_finite() { offset } else { 0.0 };
        self.offset = offset.clamp(0.0, self.scrollable_extent());
        self.offset
    }

    pub fn scroll_by(&mut self, delta: f64) -> f64 {
        self.set_scroll_offset(self.offset + delta)
    }

    /// Bring the top edge of `page`'s slot to the top of the viewport, as
    /// far as the extent allows.
    pub fn scroll_slot_to_top(&mut self, page: u32) -> Option<f64> {
        let rect = self.slot_rect(page)?;
        Some(self.set_scroll_offset(rect.y))
    }
}

impl ViewportGeometry for ScrollViewport {
    fn viewport_rect(&self) -> Rect {
        Rect::new(0.0, self.offset, self.width, self.height)
    }

    fn slot_rect(&self, page: u32) -> Option<Rect> {
        let idx = (page as usize).checked_sub(1)?;
        self.rects.get(idx).copied()
    }

    fn slot_count(&self) -> u32 {
        self.rects.len() as u32
    }
}
