use std::collections::HashSet;

use log::trace;

/// Which pages have been requested for painting at the current scale.
///
/// Membership is set before the asynchronous paint starts, so two visibility
/// signals racing for the same slot produce a single request. Entries leave
/// through [`PageRenderCache::clear`], once per relayout, or through
/// [`PageRenderCache::forget`] for a page whose paint failed and so was
/// never painted at this scale.
#[derive(Debug, Default)]
pub struct PageRenderCache {
    requested: HashSet<u32>,
}

impl PageRenderCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a request for `page`. Returns true only the first time, in
    /// which case the caller should go on to paint.
    pub fn mark_requested(&mut self, page: u32) -> bool {
        let first = self.requested.insert(page);
        if !first {
            trace!("render cache: page {page} already requested");
        }
        first
    }

    pub fn contains(&self, page: u32) -> bool {
        self.requested.contains(&page)
    }

    pub fn len(&self) -> usize {
        self.requested.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requested.is_empty()
    }

    /// Drop `page` so it may be requested again. Returns whether it was
    /// present.
    pub fn forget(&mut self, page: u32) -> bool {
        let present = self.requested.remove(&page);
        if present {
            trace!("render cache: forgetting page {page}");
        }
        present
    }

    pub fn clear(&mut self) {
        trace!("render cache: clearing {} page(s)", self.requested.len());
        self.requested.clear();
    }
}
