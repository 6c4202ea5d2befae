//! In-memory rasterizer with scripted page sizes and failures.
//!
//! Used by the test suites and the fuzz target, and handy for host work
//! without a real document.

use std::collections::{HashMap, HashSet};

use log::trace;

use super::error::ViewerError;
use super::rasterizer::{PageRasterizer, PageSize, PaintOutcome, PaintRequest};

/// Page sizes of one registered document. `None` marks a page whose size
/// cannot be read.
#[derive(Debug, Clone)]
pub struct SyntheticDocument {
    pub name: String,
    pub pages: Vec<Option<PageSize>>,
}

/// What a synthetic paint produces.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyntheticSurface {
    pub page: u32,
    pub scale: f32,
    pub size: PageSize,
}

#[derive(Debug, Default)]
pub struct SyntheticRasterizer {
    documents: HashMap<String, Vec<Option<PageSize>>>,
    failing: HashSet<u32>,
    hold: bool,
    held: Vec<PaintRequest>,
    completed: Vec<PaintOutcome<SyntheticSurface>>,
    requests: Vec<PaintRequest>,
    opened: usize,
    closed: usize,
}

impl SyntheticRasterizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_document(&mut self, name: &str, pages: Vec<Option<PageSize>>) {
        self.documents.insert(name.to_string(), pages);
    }

    /// Register `count` pages of the same unscaled size.
    pub fn add_uniform(&mut self, name: &str, count: u32, size: PageSize) {
        self.add_document(name, vec![Some(size); count as usize]);
    }

    /// Every paint of `page` fails from now on.
    pub fn fail_render(&mut self, page: u32) {
        self.failing.insert(page);
    }

    /// Undo [`fail_render`](Self::fail_render) for `page`.
    pub fn allow_render(&mut self, page: u32) {
        self.failing.remove(&page);
    }

    /// With `hold` set, paints stay pending until [`release`](Self::release)
    /// or [`take_pending`](Self::take_pending).
    pub fn hold_completions(&mut self, hold: bool) {
        self.hold = hold;
    }

    /// Complete every held paint. Returns how many were released.
    pub fn release(&mut self) -> usize {
        let held = std::mem::take(&mut self.held);
        let n = held.len();
        for request in held {
            let outcome = self.paint(&request);
            self.completed.push(outcome);
        }
        n
    }

    /// Hand held requests to the caller, who completes them by hand.
    pub fn take_pending(&mut self) -> Vec<PaintRequest> {
        std::mem::take(&mut self.held)
    }

    /// Paint `request` the way `render` would.
    pub fn paint(&self, request: &PaintRequest) -> PaintOutcome<SyntheticSurface> {
        if self.failing.contains(&request.page) {
            return PaintOutcome::failed(
                request,
                ViewerError::page_render(request.page, "scripted failure"),
            );
        }
        PaintOutcome::painted(
            request,
            SyntheticSurface {
                page: request.page,
                scale: request.scale,
                size: request.size,
            },
        )
    }

    /// Every paint request ever received, in order.
    pub fn requests(&self) -> &[PaintRequest] {
        &self.requests
    }

    pub fn request_count(&self, page: u32) -> usize {
        self.requests.iter().filter(|r| r.page == page).count()
    }


    pub fn opened_count(&self) -> usize {
        self.opened
    }

    pub fn closed_count(&self) -> usize {
        self.closed
    }
}

impl PageRasterizer for SyntheticRasterizer {
    type Document = SyntheticDocument;
    type Surface = SyntheticSurface;

    fn open_document(&mut self, source: &str) -> Result<SyntheticDocument, ViewerError> {
        let pages = self
            .documents
            .get(source)
            .ok_or_else(|| ViewerError::document_load(source, "no such document"))?;
        self.opened += 1;
        Ok(SyntheticDocument {
            name: source.to_string(),
            pages: pages.clone(),
        })
    }

    fn page_count(&self, document: &SyntheticDocument) -> u32 {
        document.pages.len() as u32
    }

    fn page_size(
        &self,
        document: &SyntheticDocument,
        page: u32,
        scale: f32,
    ) -> Result<PageSize, ViewerError> {
        let idx = (page as usize)
            .checked_sub(1)
            .ok_or_else(|| ViewerError::page_measure(page, "page numbers start at 1"))?;
        match document.pages.get(idx) {
            Some(Some(size)) => Ok(size.scaled(scale)),
            Some(None) => Err(ViewerError::page_measure(page, "corrupt page")),
            None => Err(ViewerError::page_measure(page, "out of range")),
        }
    }

    fn render(&mut self, document: &SyntheticDocument, request: PaintRequest) {
        trace!("synthetic: {} page {} requested", document.name, request.page);
        self.requests.push(request);
        if self.hold {
            self.held.push(request);
        } else {
            let outcome = self.paint(&request);
            self.completed.push(outcome);
        }
    }

    fn poll_completed(&mut self) -> Vec<PaintOutcome<SyntheticSurface>> {
        std::mem::take(&mut self.completed)
    }

    fn close_document(&mut self, document: SyntheticDocument) {
        trace!("synthetic: closing {}", document.name);
        self.closed += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::viewer::layout::LayoutGeneration;

    fn request(page: u32) -> PaintRequest {
        PaintRequest {
            page,
            scale: 1.0,
            size: PageSize::new(10.0, 10.0),
            generation: LayoutGeneration::default(),
        }
    }

    #[test]
    fn unknown_document_fails_to_open() {
        let mut raster = SyntheticRasterizer::new();
        let err = raster.open_document("missing").unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(raster.opened_count(), 0);
    }

    #[test]
    fn page_size_is_scaled() {
        let mut raster = SyntheticRasterizer::new();
        raster.add_document("d", vec![Some(PageSize::new(100.0, 200.0)), None]);
        let doc = raster.open_document("d").unwrap();
        assert_eq!(raster.page_count(&doc), 2);
        assert_eq!(
            raster.page_size(&doc, 1, 2.0).unwrap(),
            PageSize::new(200.0, 400.0)
        );
        assert!(raster.page_size(&doc, 2, 1.0).is_err());
        assert!(raster.page_size(&doc, 3, 1.0).is_err());
        assert!(raster.page_size(&doc, 0, 1.0).is_err());
    }

    #[test]
    fn held_paints_complete_on_release() {
        let mut raster = SyntheticRasterizer::new();
        raster.add_uniform("d", 3, PageSize::new(10.0, 10.0));
        let doc = raster.open_document("d").unwrap();
        raster.hold_completions(true);
        raster.render(&doc, request(1));
        raster.render(&doc, request(2));
        assert!(raster.poll_completed().is_empty());
        assert_eq!(raster.release(), 2);
        assert_eq!(raster.poll_completed().len(), 2);
    }

    #[test]
    fn scripted_failures() {
        let mut raster = SyntheticRasterizer::new();
        raster.fail_render(2);
        assert!(raster.paint(&request(2)).result.is_err());
        assert!(raster.paint(&request(1)).result.is_ok());
    }
}
