//! File watcher: monitors the open document via notify (inotify on Linux).
//!
//! notify::RecommendedWatcher runs callbacks on an internal thread.
//! FileWatcher bridges change notifications to the main thread via
//! mpsc::channel and reports a change only once the file has been quiet for
//! the debounce interval, so an editor's multi-step save triggers one reload.

use std::path::Path;
use std::sync::mpsc;
use std::time::{Duration, Instant};

use anyhow::Result;
use log::debug;
use notify::{RecommendedWatcher, RecursiveMode, Watcher};

pub struct FileWatcher {
    rx: mpsc::Receiver<()>,
    _watcher: RecommendedWatcher, // Drop stops watching
    debounce: Duration,
    last_event: Option<Instant>,
}

impl FileWatcher {
    /// Create a FileWatcher that monitors the given file for changes.
    ///
    /// Linux inotify loses the watch on rename (atomic save), so we watch
    /// the parent directory (NonRecursive) and filter events by path.
    pub fn new(path: &Path, debounce: Duration) -> Result<Self> {
        let canonical = path.canonicalize()?;
        let target = canonical.clone();
        let (tx, rx) = mpsc::channel();

        let mut watcher = RecommendedWatcher::new(
            move |res: Result<notify::Event, notify::Error>| {
                if let Ok(event) = res {
                    let ours = event.paths.iter().any(|p| p == &target);
                    if ours && (event.kind.is_modify() || event.kind.is_create()) {
                        let _ = tx.send(());
                    }
                }
            },
            notify::Config::default(),
        )?;
        let parent = canonical
            .parent()
            .ok_or_else(|| anyhow::anyhow!("cannot watch root path"))?;
        watcher.watch(parent, RecursiveMode::NonRecursive)?;
        debug!("watch: watching {}", canonical.display());

        Ok(Self {
            rx,
            _watcher: watcher,
            debounce,
            last_event: None,
        })
    }

    /// Return true once the file has changed and then stayed quiet for the
    /// debounce interval (non-blocking). A burst of notifications collapses
    /// into a single true.
    pub fn has_changed(&mut self) -> bool {
        let now = Instant::now();
        while self.rx.try_recv().is_ok() {
            self.last_event = Some(now);
        }
        settled(&mut self.last_event, now, self.debounce)
    }

    /// How long the caller may sleep before a pending change settles.
    pub fn time_to_settle(&self) -> Option<Duration> {
        self.last_event
            .map(|t| self.debounce.saturating_sub(t.elapsed()))
    }
}

fn settled(last_event: &mut Option<Instant>, now: Instant, debounce: Duration) -> bool {
    match *last_event {
        Some(t) if now.duration_since(t) >= debounce => {
            *last_event = None;
            true
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quiet_period_must_elapse() {
        let start = Instant::now();
        let debounce = Duration::from_millis(200);
        let mut last = Some(start);
        assert!(!settled(&mut last, start + Duration::from_millis(50), debounce));
        assert!(settled(&mut last, start + Duration::from_millis(250), debounce));
        assert!(last.is_none());
        assert!(!settled(&mut last, start + Duration::from_millis(900), debounce));
    }

    #[test]
    fn watcher_reports_a_write() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("doc.typ");
        std::fs::write(&file, "= One").unwrap();

        let mut watcher = FileWatcher::new(&file, Duration::ZERO).unwrap();
        assert!(!watcher.has_changed());
        std::fs::write(&file, "= Two").unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        let mut changed = false;
        while Instant::now() < deadline {
            if watcher.has_changed() {
                changed = true;
                break;
            }
            std::thread::sleep(Duration::from_millis(20));
        }
        assert!(changed);
    }
}
