//! Scale bounds, zoom stepping, and scroll-ratio preservation across a
//! rescale.
//!
//! Absolute offsets mean nothing once every slot has changed height, so a
//! rescale records `offset / extent` before touching the layout and
//! re-applies it to the new extent once the new slots are sized.

use log::{debug, warn};

use super::geometry::ScrollViewport;

/// Scale values are kept on a 1e-4 grid so repeated stepping cannot drift.
fn quantize(scale: f32) -> f32 {
    (scale * 10_000.0).round() / 10_000.0
}

/// Allowed scales and the zoom step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleRange {
    pub min: f32,
    pub max: f32,
    pub step: f32,
    pub default: f32,
}

impl Default for ScaleRange {
    fn default() -> Self {
        Self {
            min: 0.5,
            max: 3.0,
            step: 0.25,
            default: 1.5,
        }
    }
}

impl ScaleRange {
    /// Build a range, replacing nonsensical values with defaults.
    pub fn new(min: f32, max: f32, step: f32, default: f32) -> Self {
        let fallback = Self::default();
        let valid = |v: f32| v.is_finite() && v > 0.0;
        let (min, max) = if valid(min) && valid(max) && min <= max {
            (min, max)
        } else {
            warn!("zoom: invalid scale bounds [{min}, {max}], using defaults");
            (fallback.min, fallback.max)
        };
        let step = if valid(step) {
            step
        } else {
            warn!("zoom: invalid scale step {step}, using {}", fallback.step);
            fallback.step
        };
        let default = if default.is_finite() {
            default.clamp(min, max)
        } else {
            fallback.default.clamp(min, max)
        };
        Self {
            min,
            max,
            step,
            default: quantize(default),
        }
    }

    pub fn clamp(&self, scale: f32) -> f32 {
        if scale.is_nan() {
            return self.default;
        }
        quantize(scale.clamp(self.min, self.max))
    }
}

/// `offset / extent`, or 0 when there is nothing to scroll.
pub fn scroll_ratio(offset: f64, extent: f64) -> f64 {
    if extent <= 0.0 || !extent.is_finite() {
        return 0.0;
    }
    (offset / extent).clamp(0.0, 1.0)
}

pub fn offset_for_ratio(ratio: f64, extent: f64) -> f64 {
    (ratio.clamp(0.0, 1.0) * extent.max(0.0)).max(0.0)
}

/// Owns the scale factor and any scroll restoration still waiting for the
/// next layout pass.
#[derive(Debug)]
pub struct ZoomController {
    range: ScaleRange,
    scale: f32,
    pending_ratio: Option<f64>,
}

impl ZoomController {
    pub fn new(range: ScaleRange) -> Self {
        Self {
            range,
            scale: range.default,
            pending_ratio: None,
        }
    }

    pub fn range(&self) -> ScaleRange {
        self.range
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    /// Back to the default scale with nothing pending, for a new document.
    pub fn reset(&mut self) {
        self.scale = self.range.default;
        self.pending_ratio = None;
    }

    /// The clamped scale `requested` resolves to, or `None` if that is the
    /// current scale.
    pub fn target(&self, requested: f32) -> Option<f32> {
        let target = self.range.clamp(requested);
        if (target - self.scale).abs() < f32::EPSILON {
            None
        } else {
            Some(target)
        }
    }

    pub fn zoom_in_target(&self) -> f32 {
        self.range.clamp(self.scale + self.range.step)
    }

    pub fn zoom_out_target(&self) -> f32 {
        self.range.clamp(self.scale - self.range.step)
    }

    pub fn reset_target(&self) -> f32 {
        self.range.default
    }

    /// Record where the user is and commit `new_scale`. Call before any
    /// layout mutation.
    ///
    /// If a previous rescale has not been restored yet, its ratio is kept:
    /// the unsettled geometry would report a meaningless position.
    pub fn begin_rescale(&mut self, new_scale: f32, viewport: &ScrollViewport) -> f64 {
        let ratio = match self.pending_ratio {
            Some(pending) => {
                debug!("zoom: rescale while settling, keeping ratio {pending:.4}");
                pending
            }
            None => scroll_ratio(viewport.scroll_offset(), viewport.scrollable_extent()),
        };
        debug!(
            "zoom: scale {} -> {} at scroll ratio {ratio:.4}",
            self.scale, new_scale
        );
        self.scale = new_scale;
        self.pending_ratio = Some(ratio);
        ratio
    }

    pub fn is_settling(&self) -> bool {
        self.pending_ratio.is_some()
    }

    /// Apply the recorded ratio to the relaid-out viewport. Returns the new
    /// offset, or `None` if nothing was pending.
    pub fn restore(&mut self, viewport: &mut ScrollViewport) -> Option<f64> {
        let ratio = self.pending_ratio.take()?;
        let extent = viewport.scrollable_extent();
        let offset = viewport.set_scroll_offset(offset_for_ratio(ratio, extent));
        debug!("zoom: restored ratio {ratio:.4} -> offset {offset:.1} of {extent:.1}");
        Some(offset)
    }

    /// Drop a pending restoration that has been superseded.
    pub fn discard_pending(&mut self) {
        self.pending_ratio = None;
    }
}
