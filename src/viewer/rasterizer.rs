//! The page rasterization collaborator.
//!
//! The viewer never paints anything itself. It asks a [`PageRasterizer`] for
//! page dimensions and hands it fire-and-forget paint requests; finished
//! paints come back through [`PageRasterizer::poll_completed`].

use super::error::ViewerError;
use super::layout::LayoutGeneration;

/// Pixel dimensions of a page at some scale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSize {
    pub width: f64,
    pub height: f64,
}

impl PageSize {
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    pub fn scaled(self, scale: f32) -> Self {
        let s = scale as f64;
        Self {
            width: self.width * s,
            height: self.height * s,
        }
    }

    /// Usable as a slot size: finite and strictly positive on both axes.
    pub fn is_usable(&self) -> bool {
        self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0
    }
}

/// One paint request, stamped with the layout generation it was issued under.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PaintRequest {
    /// 1-based page number.
    pub page: u32,
    pub scale: f32,
    /// Slot size reserved for the page.
    pub size: PageSize,
    pub generation: LayoutGeneration,
}

/// Completion of a [`PaintRequest`].
#[derive(Debug)]
pub struct PaintOutcome<S> {
    pub page: u32,
    pub generation: LayoutGeneration,
    pub result: Result<S, ViewerError>,
}

impl<S> PaintOutcome<S> {
    pub fn painted(request: &PaintRequest, surface: S) -> Self {
        Self {
            page: request.page,
            generation: request.generation,
            result: Ok(surface),
        }
    }

    pub fn failed(request: &PaintRequest, error: ViewerError) -> Self {
        Self {
            page: request.page,
            generation: request.generation,
            result: Err(error),
        }
    }
}

/// Capability to open documents, measure pages and paint them.
///
/// Pages are numbered from 1. `render` must not block on the paint; at most
/// one request per page is in flight because the viewer deduplicates
/// through its render cache.
pub trait PageRasterizer {
    /// Handle to an opened document. Owned by the viewer until it is passed
    /// back to [`PageRasterizer::close_document`].
    type Document;
    /// A painted page.
    type Surface;

    fn open_document(&mut self, source: &str) -> Result<Self::Document, ViewerError>;

    fn page_count(&self, document: &Self::Document) -> u32;

    /// Dimensions of `page` already multiplied by `scale`.
    fn page_size(
        &self,
        document: &Self::Document,
        page: u32,
        scale: f32,
    ) -> Result<PageSize, ViewerError>;

    fn render(&mut self, document: &Self::Document, request: PaintRequest);

    /// Drain paints that finished since the last call. Never blocks.
    fn poll_completed(&mut self) -> Vec<PaintOutcome<Self::Surface>>;

    /// Release the document's resources. Late completions for it may still
    /// arrive from `poll_completed`.
    fn close_document(&mut self, document: Self::Document);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scaled_multiplies_both_axes() {
        let size = PageSize::new(100.0, 200.0).scaled(1.5);
        assert_eq!(size, PageSize::new(150.0, 300.0));
    }

    #[test]
    fn unusable_sizes() {
        assert!(PageSize::new(1.0, 1.0).is_usable());
        assert!(!PageSize::new(0.0, 1.0).is_usable());
        assert!(!PageSize::new(1.0, f64::NAN).is_usable());
        assert!(!PageSize::new(-3.0, 10.0).is_usable());
    }
}
