//! Terminal layout, uploaded page images, placement math and status text.

use std::collections::HashMap;
use std::io;

use log::debug;

use super::terminal;
use crate::viewer::{LayoutGeneration, Rect, ViewerError};

/// Uploaded images kept in the terminal beyond the visible ones.
const MAX_LOADED_PAGES: usize = 8;

// ---------------------------------------------------------------------------
// Layout
// ---------------------------------------------------------------------------

pub(super) struct Layout {
    pub image_cols: u16, // image area width (= term_cols)
    pub image_rows: u16, // image area height (= term_rows - 1)
    pub status_row: u16, // status bar row (= term_rows - 1)
    pub cell_w: u16,     // pixels per cell (width)
    pub cell_h: u16,     // pixels per cell (height)
}

impl Layout {
    /// Pixel size of the image area, the viewer's viewport.
    pub(super) fn viewport_px(&self) -> (f64, f64) {
        (
            self.image_cols as f64 * self.cell_w as f64,
            self.image_rows as f64 * self.cell_h as f64,
        )
    }
}

pub(super) fn compute_layout(term_cols: u16, term_rows: u16, pixel_w: u16, pixel_h: u16) -> Layout {
    let image_rows = term_rows.saturating_sub(1);
    let status_row = term_rows.saturating_sub(1);
    let cell_w = if term_cols > 0 { (pixel_w / term_cols).max(1) } else { 1 };
    let cell_h = if term_rows > 0 { (pixel_h / term_rows).max(1) } else { 1 };
    Layout {
        image_cols: term_cols,
        image_rows,
        status_row,
        cell_w,
        cell_h,
    }
}

// ---------------------------------------------------------------------------
// Placement
// ---------------------------------------------------------------------------

/// Where and how much of one page image to show, in cells and source pixels.
#[derive(Debug, PartialEq, Eq)]
pub(super) struct Placement {
    pub col: u16,
    pub row: u16,
    pub src_y: u32,
    pub src_w: u32,
    pub src_h: u32,
    pub cols: u16,
    pub rows: u16,
}

/// Crop `slot` (scroll-content coordinates) to `view` and convert to cells.
///
/// `surface_w`/`surface_h` bound the source rectangle, since the painted
/// image can differ from the slot by a rounding pixel.
pub(super) fn place_slot(
    slot: Rect,
    view: Rect,
    surface_w: u32,
    surface_h: u32,
    layout: &Layout,
) -> Option<Placement> {
    let top = slot.y.max(view.y);
    let bottom = slot.bottom().min(view.bottom());
    if bottom <= top || layout.image_rows == 0 {
        return None;
    }
    let cell_w = layout.cell_w.max(1) as f64;
    let cell_h = layout.cell_h.max(1) as f64;

    let row = ((top - view.y) / cell_h).floor() as u16;
    if row >= layout.image_rows {
        return None;
    }
    let src_y = (top - slot.y).floor() as u32;
    let src_h = ((bottom - top).round() as u32).min(surface_h.saturating_sub(src_y));
    let src_w = (slot.width.min(view.width).round() as u32).min(surface_w);
    if src_h == 0 || src_w == 0 {
        return None;
    }

    let col = (slot.x.max(0.0) / cell_w).floor() as u16;
    let rows = ((src_h as f64 / cell_h).ceil() as u16).clamp(1, layout.image_rows - row);
    let max_cols = layout.image_cols.saturating_sub(col).max(1);
    let cols = ((src_w as f64 / cell_w).ceil() as u16).clamp(1, max_cols);
    Some(Placement {
        col,
        row,
        src_y,
        src_w,
        src_h,
        cols,
        rows,
    })
}

// ---------------------------------------------------------------------------
// Uploaded images
// ---------------------------------------------------------------------------

/// Track which page PNGs are loaded in the terminal.
///
/// Images belong to one layout generation; a relayout makes all of them
/// stale, so they are deleted on the first sync with a newer generation.
pub(super) struct LoadedPages {
    /// page → Kitty image ID
    map: HashMap<u32, u32>,
    generation: Option<LayoutGeneration>,
    next_id: u32,
}

impl LoadedPages {
    pub(super) fn new() -> Self {
        Self {
            map: HashMap::new(),
            generation: None,
            next_id: 100, // Reserve 1-99 for future use
        }
    }

    pub(super) fn sync(&mut self, generation: LayoutGeneration) -> io::Result<()> {
        if self.generation != Some(generation) {
            debug!(
                "images: generation {:?} -> {}, dropping {} image(s)",
                self.generation.map(LayoutGeneration::value),
                generation.value(),
                self.map.len()
            );
            self.clear()?;
            self.generation = Some(generation);
        }
        Ok(())
    }

    /// Upload `png` for `page` unless already present. Returns the image ID.
    pub(super) fn ensure_loaded(&mut self, page: u32, png: &[u8]) -> io::Result<u32> {
        if let Some(&id) = self.map.get(&page) {
            return Ok(id);
        }
        let id = self.next_id;
        self.next_id = self.next_id.checked_add(1).unwrap_or(100);
        terminal::send_image(png, id)?;
        debug!("images: page {page} uploaded as {id} ({} bytes)", png.len());
        self.map.insert(page, id);
        Ok(id)
    }

    /// Bound terminal memory: delete images of pages not in `keep` once more
    /// than a handful are loaded.
    pub(super) fn evict_except(&mut self, keep: &[u32]) -> io::Result<()> {
        if self.map.len() <= MAX_LOADED_PAGES {
            return Ok(());
        }
        let evict: Vec<u32> = self
            .map
            .keys()
            .filter(|p| !keep.contains(p))
            .copied()
            .collect();
        for page in evict {
            if let Some(id) = self.map.remove(&page) {
                terminal::delete_image(id)?;
            }
        }
        Ok(())
    }

    /// Delete all placements, keeping image data.
    pub(super) fn delete_placements(&self) -> io::Result<()> {
        for &id in self.map.values() {
            terminal::delete_placement(id)?;
        }
        Ok(())
    }

    pub(super) fn clear(&mut self) -> io::Result<()> {
        for (_, id) in self.map.drain() {
            terminal::delete_image(id)?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Status bar
// ---------------------------------------------------------------------------

pub(super) struct StatusInfo<'a> {
    pub filename: &'a str,
    pub current_page: Option<u32>,
    pub total_pages: u32,
    pub scale: f32,
    pub loading: bool,
    pub error: Option<&'a ViewerError>,
}

/// Status line text (without padding).
///
/// `acc_peek`: a pending count, shown as `:12_`
/// `flash`: a transient message, cleared by the next key
pub(super) fn status_text(info: &StatusInfo, acc_peek: Option<u32>, flash: Option<&str>) -> String {
    let page = match info.current_page {
        Some(p) => format!("page {p}/{}", info.total_pages),
        None => format!("page -/{}", info.total_pages),
    };
    let zoom = (info.scale * 100.0).round() as u32;
    let head = format!(" {} | {page} | {zoom}%", info.filename);
    if let Some(e) = info.error {
        format!("{head} | {e}")
    } else if let Some(msg) = flash {
        format!("{head} | {msg}")
    } else if let Some(n) = acc_peek {
        format!("{head} | :{n}_")
    } else if info.loading {
        format!("{head} | loading...")
    } else {
        format!("{head}  [j/k d/u n/p Ng:goto +/-/0:zoom q:quit]")
    }
}
