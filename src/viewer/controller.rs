//! The viewer state machine: open → layout → observe → paint, plus
//! navigation and zoom.
//!
//! Everything runs on the caller's thread. The only asynchrony is the
//! rasterizer's: paint requests go out through [`PageRasterizer::render`]
//! and come back through [`ViewerController::pump`], where the layout
//! generation guard drops anything issued before the latest rebuild.

use std::collections::BTreeSet;
use std::sync::mpsc;

use log::{debug, info, warn};

use super::cache::PageRenderCache;
use super::error::ViewerError;
use super::geometry::{ScrollViewport, ViewportGeometry};
use super::layout::{LayoutGeneration, PlaceholderLayout};
use super::rasterizer::{PageRasterizer, PaintOutcome, PaintRequest};
use super::scroll::ScrollPositionTracker;
use super::visibility::{DEFAULT_VISIBILITY_MARGIN, VisibilityTracker};
use super::zoom::{ScaleRange, ZoomController};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewerPhase {
    Closed,
    Opening,
    Ready,
}

/// Read model. Only the controller writes it.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewerState {
    pub phase: ViewerPhase,
    /// Undefined until a document with at least one page is open.
    pub current_page: Option<u32>,
    pub total_pages: u32,
    pub scale: f32,
    /// From the start of `open` until its initial scroll has been applied.
    pub is_loading: bool,
    pub last_error: Option<ViewerError>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ViewerEvent {
    PhaseChanged(ViewerPhase),
    PageChanged(u32),
    ScaleChanged(f32),
    PageRendered {
        page: u32,
        generation: LayoutGeneration,
    },
    PageFailed {
        page: u32,
        error: ViewerError,
    },
    LoadFailed(ViewerError),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewerOptions {
    pub scale: ScaleRange,
    pub visibility_margin: f64,
    pub page_gap: f64,
    pub viewport_width: f64,
    pub viewport_height: f64,
}

impl Default for ViewerOptions {
    fn default() -> Self {
        Self {
            scale: ScaleRange::default(),
            visibility_margin: DEFAULT_VISIBILITY_MARGIN,
            page_gap: 16.0,
            viewport_width: 800.0,
            viewport_height: 600.0,
        }
    }
}

pub struct ViewerController<R: PageRasterizer> {
    rasterizer: R,
    document: Option<R::Document>,
    state: ViewerState,
    layout: PlaceholderLayout<R::Surface>,
    viewport: ScrollViewport,
    visibility: VisibilityTracker,
    cache: PageRenderCache,
    scroll: ScrollPositionTracker,
    zoom: ZoomController,
    /// Page to bring to the top on the next [`settle`](Self::settle).
    pending_page: Option<u32>,
    /// Pages whose paint failed at the current generation. Navigation
    /// makes them eligible again.
    failed: BTreeSet<u32>,
    subscribers: Vec<mpsc::Sender<ViewerEvent>>,
}

impl<R: PageRasterizer> ViewerController<R> {
    pub fn new(rasterizer: R, options: ViewerOptions) -> Self {
        let zoom = ZoomController::new(options.scale);
        Self {
            rasterizer,
            document: None,
            state: ViewerState {
                phase: ViewerPhase::Closed,
                current_page: None,
                total_pages: 0,
                scale: zoom.scale(),
                is_loading: false,
                last_error: None,
            },
            layout: PlaceholderLayout::new(),
            viewport: ScrollViewport::new(
                options.viewport_width,
                options.viewport_height,
                options.page_gap,
            ),
            visibility: VisibilityTracker::new(options.visibility_margin),
            cache: PageRenderCache::new(),
            scroll: ScrollPositionTracker::new(),
            zoom,
            pending_page: None,
            failed: BTreeSet::new(),
            subscribers: Vec::new(),
        }
    }

    /// Receive every [`ViewerEvent`] from now on. Dropped receivers are
    /// pruned on the next event.
    pub fn subscribe(&mut self) -> mpsc::Receiver<ViewerEvent> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.push(tx);
        rx
    }

    fn publish(&mut self, event: ViewerEvent) {
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    fn set_phase(&mut self, phase: ViewerPhase) {
        if self.state.phase != phase {
            debug!("viewer: {:?} -> {phase:?}", self.state.phase);
            self.state.phase = phase;
            self.publish(ViewerEvent::PhaseChanged(phase));
        }
    }

    fn set_current_page(&mut self, page: Option<u32>) {
        if let Some(page) = page {
            self.state.current_page = Some(page);
            self.publish(ViewerEvent::PageChanged(page));
        }
    }

    pub fn state(&self) -> &ViewerState {
        &self.state
    }

    pub fn phase(&self) -> ViewerPhase {
        self.state.phase
    }

    pub fn current_page(&self) -> Option<u32> {
        self.state.current_page
    }

    pub fn total_pages(&self) -> u32 {
        self.state.total_pages
    }

    pub fn scale(&self) -> f32 {
        self.state.scale
    }

    pub fn scale_range(&self) -> ScaleRange {
        self.zoom.range()
    }

    /// Whether a scroll restoration is waiting for [`settle`](Self::settle).
    pub fn is_settling(&self) -> bool {
        self.pending_page.is_some() || self.zoom.is_settling()
    }

    pub fn rasterizer(&self) -> &R {
        &self.rasterizer
    }

    pub fn rasterizer_mut(&mut self) -> &mut R {
        &mut self.rasterizer
    }

    pub fn layout(&self) -> &PlaceholderLayout<R::Surface> {
        &self.layout
    }

    pub fn viewport(&self) -> &ScrollViewport {
        &self.viewport
    }

    pub fn cache(&self) -> &PageRenderCache {
        &self.cache
    }

    fn is_ready(&self) -> bool {
        self.state.phase == ViewerPhase::Ready && self.document.is_some()
    }

    /// Open `source`, replacing any open document.
    ///
    /// `initial_page` outside `[1, page_count]` (or omitted) means page 1.
    /// The layout is built at the default scale; the jump to the initial page
    /// happens on the next [`settle`](Self::settle). On failure the viewer
    /// is left closed and empty with the error in the read model.
    pub fn open(&mut self, source: &str, initial_page: Option<u32>) -> Result<(), ViewerError> {
        self.close();
        self.state.is_loading = true;
        self.set_phase(ViewerPhase::Opening);

        let document = match self.rasterizer.open_document(source) {
            Ok(document) => document,
            Err(e) => {
                warn!("viewer: {e}");
                self.state.is_loading = false;
                self.state.last_error = Some(e.clone());
                self.publish(ViewerEvent::LoadFailed(e.clone()));
                self.set_phase(ViewerPhase::Closed);
                return Err(e);
            }
        };

        let page_count = self.rasterizer.page_count(&document);
        self.zoom.reset();
        let scale = self.zoom.scale();
        let rasterizer = &self.rasterizer;
        self.layout
            .build(page_count, scale, |page| rasterizer.page_size(&document, page, scale));
        self.viewport.clear();
        self.viewport.lay_out(self.layout.slots());
        self.cache.clear();
        self.failed.clear();
        self.visibility.observe(self.layout.slots());
        self.document = Some(document);

        let initial = initial_page
            .filter(|p| (1..=page_count).contains(p))
            .unwrap_or(1);
        let start = self.scroll.start(page_count, initial);
        self.pending_page = start;

        info!("viewer: opened {source} ({page_count} page(s)), initial page {initial}");
        self.state.total_pages = page_count;
        self.state.scale = scale;
        self.state.last_error = None;
        if start.is_none() {
            self.state.is_loading = false;
        }
        self.set_phase(ViewerPhase::Ready);
        self.publish(ViewerEvent::ScaleChanged(scale));
        self.set_current_page(start);
        Ok(())
    }

    /// Tear down the open document. Safe to call repeatedly.
    pub fn close(&mut self) {
        if self.state.phase == ViewerPhase::Closed && self.document.is_none() {
            return;
        }
        self.visibility.disconnect();
        self.scroll.stop();
        if let Some(document) = self.document.take() {
            self.rasterizer.close_document(document);
        }
        self.layout.clear();
        self.viewport.clear();
        self.cache.clear();
        self.failed.clear();
        self.zoom.reset();
        self.pending_page = None;
        self.state.current_page = None;
        self.state.total_pages = 0;
        self.state.scale = self.zoom.scale();
        self.state.is_loading = false;
        info!("viewer: closed");
        self.set_phase(ViewerPhase::Closed);
    }

    /// The host's layout pass has happened: apply any pending scroll
    /// (initial page or zoom ratio) and request paints for newly visible
    /// slots.
    pub fn settle(&mut self) {
        if !self.is_ready() {
            return;
        }
        if let Some(page) = self.pending_page.take() {
            self.zoom.discard_pending();
            self.viewport.scroll_slot_to_top(page);
            let changed = self.scroll.pin(page);
            self.set_current_page(changed);
            self.state.is_loading = false;
        } else if self.zoom.restore(&mut self.viewport).is_some() {
            self.update_current_page();
        }
        self.refresh_visibility();
    }

    /// Drain finished paints and apply them. Returns how many slots were
    /// filled.
    pub fn pump(&mut self) -> usize {
        let mut filled = 0;
        for outcome in self.rasterizer.poll_completed() {
            if self.complete_paint(outcome) {
                filled += 1;
            }
        }
        filled
    }

    /// Apply one paint outcome. Returns true if a slot was filled.
    ///
    /// Outcomes from an older layout generation are dropped without touching
    /// anything. A failed paint leaves the placeholder and its cache entry in
    /// place; nothing retries it until the next navigation or relayout.
    pub fn complete_paint(&mut self, outcome: PaintOutcome<R::Surface>) -> bool {
        let current = self.layout.generation();
        if !current.accepts(outcome.generation) {
            debug!(
                "viewer: dropping stale paint of page {} (generation {} != {})",
                outcome.page,
                outcome.generation.value(),
                current.value()
            );
            return false;
        }
        match outcome.result {
            Ok(surface) => {
                if !self.layout.fill(outcome.generation, outcome.page, surface) {
                    return false;
                }
                self.publish(ViewerEvent::PageRendered {
                    page: outcome.page,
                    generation: outcome.generation,
                });
                true
            }
            Err(error) => {
                warn!("viewer: {error}");
                self.failed.insert(outcome.page);
                self.publish(ViewerEvent::PageFailed {
                    page: outcome.page,
                    error,
                });
                false
            }
        }
    }

    /// Visibility callback target. Issues a paint for `page` unless it is
    /// already painted or requested at the current scale.
    pub fn on_becomes_visible(&mut self, page: u32) -> bool {
        let Some(document) = self.document.as_ref() else {
            return false;
        };
        let Some(slot) = self.layout.slot(page) else {
            return false;
        };
        if slot.is_rendered() || !self.cache.mark_requested(page) {
            return false;
        }
        let request = PaintRequest {
            page,
            scale: self.layout.scale(),
            size: slot.size,
            generation: self.layout.generation(),
        };
        debug!(
            "viewer: requesting page {page} at scale {} (generation {})",
            request.scale,
            request.generation.value()
        );
        self.rasterizer.render(document, request);
        true
    }

    fn refresh_visibility(&mut self) {
        for page in self.visibility.poll(&self.viewport) {
            self.on_becomes_visible(page);
        }
    }

    fn update_current_page(&mut self) {
        let changed = self.scroll.update(&self.viewport);
        self.set_current_page(changed);
    }

    fn after_viewport_change(&mut self) {
        self.update_current_page();
        self.refresh_visibility();
    }

    /// User scroll to an absolute offset. Supersedes any pending restoration.
    pub fn on_scroll(&mut self, offset: f64) {
        if !self.is_ready() {
            return;
        }
        if self.is_settling() {
            debug!("viewer: user scroll supersedes pending restoration");
            self.pending_page = None;
            self.zoom.discard_pending();
            self.state.is_loading = false;
        }
        self.viewport.set_scroll_offset(offset);
        self.after_viewport_change();
    }

    pub fn scroll_by(&mut self, delta: f64) {
        let offset = self.viewport.scroll_offset() + delta;
        self.on_scroll(offset);
    }

    /// Host viewport resized. Slot sizes depend only on scale, so this only
    /// re-centers, re-clamps and re-evaluates.
    pub fn resize(&mut self, width: f64, height: f64) {
        self.viewport.resize(width, height);
        if self.is_ready() && !self.is_settling() {
            self.after_viewport_change();
        }
    }

    /// Scroll page `page` to the top and make it current. Out-of-range pages
    /// are ignored.
    pub fn go_to_page(&mut self, page: u32) -> bool {
        if !self.is_ready() || !(1..=self.state.total_pages).contains(&page) {
            debug!("viewer: go_to_page({page}) ignored");
            return false;
        }
        self.pending_page = None;
        self.zoom.discard_pending();
        self.state.is_loading = false;
        self.viewport.scroll_slot_to_top(page);
        let changed = self.scroll.pin(page);
        self.set_current_page(changed);
        self.retry_failed();
        self.refresh_visibility();
        true
    }

    /// Make every failed page requestable again. Those inside the visibility
    /// zone are re-requested by the following refresh, the rest when they
    /// next enter it.
    fn retry_failed(&mut self) {
        for page in std::mem::take(&mut self.failed) {
            debug!("viewer: page {page} will be retried");
            self.cache.forget(page);
            self.visibility.rearm(page);
        }
    }

    pub fn next_page(&mut self) -> bool {
        match self.state.current_page {
            Some(page) => self.go_to_page(page.saturating_add(1)),
            None => false,
        }
    }

    pub fn previous_page(&mut self) -> bool {
        match self.state.current_page {
            Some(page) => self.go_to_page(page.saturating_sub(1)),
            None => false,
        }
    }

    pub fn first_page(&mut self) -> bool {
        self.go_to_page(1)
    }

    pub fn last_page(&mut self) -> bool {
        self.go_to_page(self.state.total_pages)
    }

    /// Rescale every slot, keeping the reader's relative position.
    ///
    /// The scroll ratio is taken before anything moves; observation stops,
    /// the slots are rebuilt at the new scale (discarding painted surfaces),
    /// the render cache is cleared and observation restarts. The ratio is
    /// re-applied on the next [`settle`](Self::settle). Returns false when
    /// the clamped scale equals the current one.
    pub fn set_scale(&mut self, requested: f32) -> bool {
        if !self.is_ready() {
            debug!("viewer: set_scale({requested}) ignored, no document");
            return false;
        }
        let Some(target) = self.zoom.target(requested) else {
            return false;
        };
        let Some(document) = self.document.as_ref() else {
            return false;
        };

        self.zoom.begin_rescale(target, &self.viewport);
        self.visibility.disconnect();

        let rasterizer = &self.rasterizer;
        self.layout.build(self.state.total_pages, target, |page| {
            rasterizer.page_size(document, page, target)
        });
        self.viewport.lay_out(self.layout.slots());
        self.cache.clear();
        self.failed.clear();
        self.visibility.observe(self.layout.slots());

        if self.pending_page.is_some() {
            // The initial page of a just-opened document outranks the ratio.
            self.zoom.discard_pending();
        }
        info!("viewer: scale {} -> {target}", self.state.scale);
        self.state.scale = target;
        self.publish(ViewerEvent::ScaleChanged(target));
        true
    }

    pub fn zoom_in(&mut self) -> bool {
        self.set_scale(self.zoom.zoom_in_target())
    }

    pub fn zoom_out(&mut self) -> bool {
        self.set_scale(self.zoom.zoom_out_target())
    }

    pub fn reset_zoom(&mut self) -> bool {
        self.set_scale(self.zoom.reset_target())
    }

    /// Pages whose slots intersect the viewport itself (no margin), in order.
    pub fn visible_pages(&self) -> Vec<u32> {
        let view = self.viewport.viewport_rect();
        (1..=self.viewport.slot_count())
            .filter(|&page| {
                self.viewport
                    .slot_rect(page)
                    .is_some_and(|rect| rect.overlaps_y(&view))
            })
            .collect()
    }
}

impl<R: PageRasterizer> Drop for ViewerController<R> {
    fn drop(&mut self) {
        self.close();
    }
}
