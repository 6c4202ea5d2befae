//! Typst-backed [`PageRasterizer`].
//!
//! Each opened document gets its own paint worker thread. Requests travel
//! over one `mpsc` channel, finished pages come back over another that
//! [`TypstRasterizer::poll_completed`] drains without blocking. Closing a
//! document drops its request sender; the worker finishes the page it is on
//! and exits, and the viewer's generation guard discards that late result.

use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use log::{debug, error, warn};
use typst::layout::Page;

use crate::render::{self, RenderedPage};
use crate::viewer::{PageRasterizer, PageSize, PaintOutcome, PaintRequest, ViewerError};
use crate::world::{DocumentWorld, FontCache};

/// A compiled document and the channel to its paint worker.
pub struct TypstDocument {
    path: PathBuf,
    pages: Arc<[Page]>,
    requests: mpsc::Sender<PaintRequest>,
}

impl TypstDocument {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

pub struct TypstRasterizer {
    fonts: Arc<FontCache>,
    ppi: f32,
    done_tx: mpsc::Sender<PaintOutcome<RenderedPage>>,
    done_rx: mpsc::Receiver<PaintOutcome<RenderedPage>>,
}

impl TypstRasterizer {
    /// `ppi` is the resolution at scale 1.0.
    pub fn new(fonts: Arc<FontCache>, ppi: f32) -> Self {
        let (done_tx, done_rx) = mpsc::channel();
        Self {
            fonts,
            ppi,
            done_tx,
            done_rx,
        }
    }

    pub fn ppi(&self) -> f32 {
        self.ppi
    }

    fn spawn_worker(
        &self,
        path: &Path,
        pages: Arc<[Page]>,
    ) -> Result<mpsc::Sender<PaintRequest>, ViewerError> {
        let (req_tx, req_rx) = mpsc::channel::<PaintRequest>();
        let done = self.done_tx.clone();
        let ppi = self.ppi;
        let name = path.display().to_string();
        thread::Builder::new()
            .name("pageview-paint".into())
            .spawn(move || {
                debug!("paint worker: started for {name}");
                while let Ok(request) = req_rx.recv() {
                    let outcome = paint(&pages, ppi, &request);
                    if done.send(outcome).is_err() {
                        break;
                    }
                }
                debug!("paint worker: channel closed, exiting ({name})");
            })
            .map_err(|e| ViewerError::document_load(path.display().to_string(), e))?;
        Ok(req_tx)
    }
}

fn paint(pages: &[Page], ppi: f32, request: &PaintRequest) -> PaintOutcome<RenderedPage> {
    let Some(page) = (request.page as usize)
        .checked_sub(1)
        .and_then(|idx| pages.get(idx))
    else {
        return PaintOutcome::failed(
            request,
            ViewerError::page_render(request.page, "no such page"),
        );
    };
    let start = Instant::now();
    match render::render_page(page, render::pixel_per_pt(ppi, request.scale)) {
        Ok(rendered) => {
            debug!(
                "paint worker: page {} done in {:.1}ms",
                request.page,
                start.elapsed().as_secs_f64() * 1000.0
            );
            PaintOutcome::painted(request, rendered)
        }
        Err(e) => {
            error!("paint worker: page {} failed: {e:#}", request.page);
            PaintOutcome::failed(request, ViewerError::page_render(request.page, format!("{e:#}")))
        }
    }
}

impl PageRasterizer for TypstRasterizer {
    type Document = TypstDocument;
    type Surface = RenderedPage;

    fn open_document(&mut self, source: &str) -> Result<TypstDocument, ViewerError> {
        let path = PathBuf::from(source);
        let world = DocumentWorld::open(&path, Arc::clone(&self.fonts))
            .map_err(|e| ViewerError::document_load(source, format!("{e:#}")))?;
        let document = render::compile_document(&world)
            .map_err(|e| ViewerError::document_load(source, format!("{e:#}")))?;
        let pages: Arc<[Page]> = document.pages.into();
        let requests = self.spawn_worker(&path, Arc::clone(&pages))?;
        Ok(TypstDocument {
            path,
            pages,
            requests,
        })
    }

    fn page_count(&self, document: &TypstDocument) -> u32 {
        document.pages.len() as u32
    }

    fn page_size(
        &self,
        document: &TypstDocument,
        page: u32,
        scale: f32,
    ) -> Result<PageSize, ViewerError> {
        let frame = (page as usize)
            .checked_sub(1)
            .and_then(|idx| document.pages.get(idx))
            .ok_or_else(|| ViewerError::page_measure(page, "no such page"))?;
        let (w, h) = render::page_size_px(frame, render::pixel_per_pt(self.ppi, scale));
        Ok(PageSize::new(w, h))
    }

    fn render(&mut self, document: &TypstDocument, request: PaintRequest) {
        if document.requests.send(request).is_err() {
            warn!("paint worker for {} is gone", document.path.display());
            let _ = self.done_tx.send(PaintOutcome::failed(
                &request,
                ViewerError::page_render(request.page, "paint worker exited"),
            ));
        }
    }

    fn poll_completed(&mut self) -> Vec<PaintOutcome<RenderedPage>> {
        self.done_rx.try_iter().collect()
    }

    fn close_document(&mut self, document: TypstDocument) {
        debug!("document: closing {}", document.path.display());
        drop(document);
    }
}
