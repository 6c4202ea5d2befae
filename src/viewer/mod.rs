//! Virtualized paged-document viewer.
//!
//! A document of any length is shown as a column of placeholder slots sized
//! exactly like the pages they stand for. Only slots near the viewport are
//! painted, the current page follows the viewport midpoint, and a zoom
//! rebuilds every slot while keeping the relative scroll position.
//!
//! The viewer is independent of any rendering technology: pages come from a
//! [`PageRasterizer`] and geometry is read through [`ViewportGeometry`].

pub mod cache;
pub mod controller;
pub mod error;
pub mod geometry;
pub mod layout;
pub mod rasterizer;
pub mod scroll;
pub mod synthetic;
pub mod visibility;
pub mod zoom;

pub use cache::PageRenderCache;
pub use controller::{ViewerController, ViewerEvent, ViewerOptions, ViewerPhase, ViewerState};
pub use error::ViewerError;
pub use geometry::{Rect, ScrollViewport, ViewportGeometry};
pub use layout::{LayoutGeneration, PageSlot, PlaceholderLayout, SlotState};
pub use rasterizer::{PageRasterizer, PageSize, PaintOutcome, PaintRequest};
pub use scroll::ScrollPositionTracker;
pub use synthetic::{SyntheticRasterizer, SyntheticSurface};
pub use visibility::VisibilityTracker;
pub use zoom::{ScaleRange, ZoomController};
