use thiserror::Error;

/// Errors raised by the viewer and its rasterizer.
///
/// Only [`ViewerError::DocumentLoad`] aborts a viewing session. Per-page
/// errors are recovered where they happen: a page that cannot be measured
/// borrows the previous page's dimensions, and a page that fails to paint
/// keeps its blank placeholder.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ViewerError {
    #[error("cannot open document {origin}: {reason}")]
    DocumentLoad { origin: String, reason: String },

    #[error("cannot measure page {page}: {reason}")]
    PageMeasure { page: u32, reason: String },

    #[error("cannot render page {page}: {reason}")]
    PageRender { page: u32, reason: String },
}

impl ViewerError {
    pub fn document_load(origin: impl Into<String>, reason: impl ToString) -> Self {
        Self::DocumentLoad {
            origin: origin.into(),
            reason: reason.to_string(),
        }
    }

    pub fn page_measure(page: u32, reason: impl ToString) -> Self {
        Self::PageMeasure {
            page,
            reason: reason.to_string(),
        }
    }

    pub fn page_render(page: u32, reason: impl ToString) -> Self {
        Self::PageRender {
            page,
            reason: reason.to_string(),
        }
    }

    /// True for the one error kind that ends the session.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::DocumentLoad { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_document_load_is_fatal() {
        assert!(ViewerError::document_load("a.typ", "missing").is_fatal());
        assert!(!ViewerError::page_measure(3, "corrupt").is_fatal());
        assert!(!ViewerError::page_render(3, "oom").is_fatal());
    }

    #[test]
    fn messages_name_the_page() {
        let e = ViewerError::page_render(7, "worker gone");
        assert_eq!(e.to_string(), "cannot render page 7: worker gone");
    }
}
