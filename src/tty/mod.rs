//! Terminal page viewer with Kitty Graphics Protocol
//!
//! Layout:
//!   rows 0..term_rows-1 : image area, the viewer's viewport
//!   row term_rows-1     : status bar
//!
//! The viewport is virtualized by [`ViewerController`]: every page has a
//! slot of its final size from the start, and only slots near the viewport
//! are painted by the Typst worker. Each painted page that intersects the
//! viewport is uploaded once per layout generation and placed cropped to the
//! visible part of its slot.
//!
//! Kitty response suppression:
//!   All Kitty Graphics Protocol commands use `q=2` (suppress all responses).
//!   Without this, error responses (e.g. ENOENT from oversized images) are
//!   delivered as APC sequences that crossterm misparses as key events,
//!   causing phantom scrolling. `q=2` suppresses both OK and error responses.

mod input;
mod state;
mod terminal;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use crossterm::{
    event::{self, Event},
    terminal as crossterm_terminal,
};
use log::{debug, info};

use crate::config::Config;
use crate::document::TypstRasterizer;
use crate::viewer::{ViewerController, ViewerEvent, ViewportGeometry};
use crate::watch::FileWatcher;
use crate::world::FontCache;

use input::{Action, InputAccumulator, map_key_event};
use state::{Layout, LoadedPages, StatusInfo};

type Viewer = ViewerController<TypstRasterizer>;

/// Wake-up interval while idle, so finished paints and file changes are
/// picked up without input.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Run the terminal viewer on the Typst file at `path`.
pub fn run(
    path: PathBuf,
    config: Config,
    initial_page: Option<u32>,
    watch: bool,
) -> anyhow::Result<()> {
    let filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unknown")
        .to_string();
    let source = path.to_string_lossy().into_owned();

    terminal::check_tty()?;

    let winsize = crossterm_terminal::window_size()
        .map_err(|e| anyhow::anyhow!("failed to get terminal size: {e}"))?;
    if winsize.width == 0 || winsize.height == 0 {
        anyhow::bail!(
            "terminal pixel size {}x{} is zero; Kitty graphics requires non-zero pixel dimensions",
            winsize.width,
            winsize.height
        );
    }
    let mut layout = state::compute_layout(
        winsize.columns,
        winsize.rows,
        winsize.width,
        winsize.height,
    );

    let mut watcher = if watch {
        let w = FileWatcher::new(&path, config.viewer.watch_interval)
            .with_context(|| format!("failed to watch {}", path.display()))?;
        Some(w)
    } else {
        None
    };

    // Font scan happens once; every reload shares it.
    let fonts = Arc::new(FontCache::new());
    let rasterizer = TypstRasterizer::new(fonts, config.ppi);
    let (vp_w, vp_h) = layout.viewport_px();
    let mut viewer = ViewerController::new(rasterizer, config.viewer.options(vp_w, vp_h));
    let events = viewer.subscribe();

    let mut guard = terminal::RawGuard::enter()?;

    // A failed open leaves the viewer empty with the error in its state,
    // which the status bar shows until a reload succeeds.
    if let Err(e) = viewer.open(&source, initial_page) {
        debug!("initial open failed: {e}");
    }
    viewer.settle();

    let frame_budget = config.viewer.frame_budget;
    let mut loaded = LoadedPages::new();
    let mut acc = InputAccumulator::new();
    let mut flash: Option<String> = None;
    let mut dirty = true;
    let mut last_render = Instant::now();

    loop {
        if viewer.pump() > 0 {
            dirty = true;
        }
        for event in events.try_iter() {
            if let ViewerEvent::PageFailed { page, error } = &event {
                flash = Some(format!("page {page}: {error}"));
            }
            dirty = true;
        }
        if let Some(w) = watcher.as_mut()
            && w.has_changed()
        {
            reload(&mut viewer, &source);
            dirty = true;
        }

        let idle = watcher
            .as_ref()
            .and_then(FileWatcher::time_to_settle)
            .map_or(POLL_INTERVAL, |t| t.min(POLL_INTERVAL));
        let timeout = if dirty {
            frame_budget.saturating_sub(last_render.elapsed())
        } else {
            idle
        };

        if event::poll(timeout)? {
            let ev = event::read()?;
            debug!("event: {:?}", ev);

            // Clear flash message on any keypress
            let had_flash = flash.take().is_some();

            match ev {
                Event::Key(key_event) => {
                    let scroll_step = config.viewer.scroll_step as f64 * layout.cell_h as f64;
                    let half_page =
                        (layout.image_rows as f64 / 2.0).floor().max(1.0) * layout.cell_h as f64;
                    let total = viewer.total_pages();

                    match map_key_event(key_event, &mut acc) {
                        Some(Action::Quit) => break,

                        Some(Action::CancelInput) | Some(Action::Digit) => {
                            draw_status(&viewer, &layout, &filename, acc.peek(), None)?;
                        }

                        Some(Action::ScrollDown(count)) => {
                            viewer.scroll_by(count as f64 * scroll_step);
                            dirty = true;
                        }
                        Some(Action::ScrollUp(count)) => {
                            viewer.scroll_by(-(count as f64) * scroll_step);
                            dirty = true;
                        }
                        Some(Action::HalfPageDown(count)) => {
                            viewer.scroll_by(count as f64 * half_page);
                            dirty = true;
                        }
                        Some(Action::HalfPageUp(count)) => {
                            viewer.scroll_by(-(count as f64) * half_page);
                            dirty = true;
                        }

                        Some(Action::NextPage(count)) => {
                            if let Some(current) = viewer.current_page() {
                                viewer.go_to_page(current.saturating_add(count).min(total));
                            }
                            dirty = true;
                        }
                        Some(Action::PrevPage(count)) => {
                            if let Some(current) = viewer.current_page() {
                                viewer.go_to_page(current.saturating_sub(count).max(1));
                            }
                            dirty = true;
                        }
                        Some(Action::FirstPage) => {
                            viewer.first_page();
                            dirty = true;
                        }
                        Some(Action::LastPage) => {
                            viewer.last_page();
                            dirty = true;
                        }
                        Some(Action::GoToPage(n)) => {
                            if !viewer.go_to_page(n) {
                                flash = Some(format!("Page {n} out of range (1-{total})"));
                            }
                            dirty = true;
                        }

                        Some(Action::ZoomIn) => {
                            zoom(&mut viewer, Viewer::zoom_in);
                            dirty = true;
                        }
                        Some(Action::ZoomOut) => {
                            zoom(&mut viewer, Viewer::zoom_out);
                            dirty = true;
                        }
                        Some(Action::ResetZoom) => {
                            zoom(&mut viewer, Viewer::reset_zoom);
                            dirty = true;
                        }

                        None => {
                            // Unknown key: reset accumulator
                            if acc.is_active() || had_flash {
                                acc.reset();
                                draw_status(&viewer, &layout, &filename, None, None)?;
                            }
                        }
                    }
                }

                Event::Resize(new_cols, new_rows) => {
                    let new_winsize = crossterm_terminal::window_size()?;
                    layout = state::compute_layout(
                        new_cols,
                        new_rows,
                        new_winsize.width,
                        new_winsize.height,
                    );
                    let (w, h) = layout.viewport_px();
                    debug!("resize: {new_cols}x{new_rows} cells, viewport {w}x{h}px");
                    viewer.resize(w, h);
                    loaded.delete_placements()?;
                    terminal::clear_screen()?;
                    dirty = true;
                }

                _ => {}
            }
            continue;
        }

        // poll timeout → frame budget elapsed, execute redraw
        if dirty {
            // One more drain so pages finished during poll() are shown now.
            viewer.pump();
            redraw(&viewer, &mut loaded, &layout, &filename, acc.peek(), flash.as_deref())?;
            dirty = false;
        }
        last_render = Instant::now();
    }

    viewer.close();
    guard.cleanup();
    Ok(())
}

/// Zoom and apply the scroll restoration at once: the terminal has no
/// separate layout pass.
fn zoom(viewer: &mut Viewer, op: fn(&mut Viewer) -> bool) {
    if op(viewer) {
        viewer.settle();
    }
}

/// Reopen after a change on disk, at the same page and scale.
fn reload(viewer: &mut Viewer, source: &str) {
    let page = viewer.current_page();
    let scale = viewer.scale();
    info!("reload: {source} changed, reopening at page {page:?}");
    if viewer.open(source, page).is_ok() {
        viewer.set_scale(scale);
    }
    viewer.settle();
}

fn status_line(
    viewer: &Viewer,
    filename: &str,
    acc_peek: Option<u32>,
    flash: Option<&str>,
) -> String {
    let state = viewer.state();
    state::status_text(
        &StatusInfo {
            filename,
            current_page: state.current_page,
            total_pages: state.total_pages,
            scale: state.scale,
            loading: state.is_loading,
            error: state.last_error.as_ref(),
        },
        acc_peek,
        flash,
    )
}

fn draw_status(
    viewer: &Viewer,
    layout: &Layout,
    filename: &str,
    acc_peek: Option<u32>,
    flash: Option<&str>,
) -> std::io::Result<()> {
    terminal::draw_status_bar(layout, &status_line(viewer, filename, acc_peek, flash))
}

/// Full redraw: visible page images + status bar.
///
/// Ordering: upload (slow) → delete placements → place new (fast).
fn redraw(
    viewer: &Viewer,
    loaded: &mut LoadedPages,
    layout: &Layout,
    filename: &str,
    acc_peek: Option<u32>,
    flash: Option<&str>,
) -> anyhow::Result<()> {
    let start = Instant::now();
    loaded.sync(viewer.layout().generation())?;

    let viewport = viewer.viewport();
    let view = viewport.viewport_rect();
    let visible = viewer.visible_pages();

    // Phase 1: upload painted pages that are on screen.
    let mut placements = Vec::with_capacity(visible.len());
    for &page in &visible {
        let Some(surface) = viewer.layout().slot(page).and_then(|s| s.surface()) else {
            continue;
        };
        let Some(rect) = viewport.slot_rect(page) else {
            continue;
        };
        let Some(placement) =
            state::place_slot(rect, view, surface.width, surface.height, layout)
        else {
            continue;
        };
        let id = loaded.ensure_loaded(page, &surface.png)?;
        placements.push((id, placement));
    }

    // Phase 2: delete old placements, then place new ones.
    loaded.delete_placements()?;
    for (id, placement) in &placements {
        terminal::place_image(*id, placement)?;
    }
    loaded.evict_except(&visible)?;

    draw_status(viewer, layout, filename, acc_peek, flash)?;
    debug!(
        "redraw: {} page(s) placed in {:.1}ms",
        placements.len(),
        start.elapsed().as_secs_f64() * 1000.0
    );
    Ok(())
}

