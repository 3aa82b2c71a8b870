//! Source file watcher: resets the list when a file-backed source changes.
//!
//! notify::RecommendedWatcher runs callbacks on an internal thread.
//! FileWatcher bridges change notifications to the owner's thread via
//! mpsc::channel, where the viewer turns them into `Engine::reset_data`.

use std::path::Path;
use std::sync::mpsc;
use std::time::{Duration, Instant};

use anyhow::Result;
use log::debug;
use notify::{RecommendedWatcher, RecursiveMode, Watcher};

pub struct FileWatcher {
    rx: mpsc::Receiver<()>,
    _watcher: RecommendedWatcher, // Drop stops watching
    interval: Duration,
    last_check: Instant,
}

impl FileWatcher {
    /// Watch `path`, reporting changes at most once per `interval`.
    ///
    /// Linux inotify loses the watch on rename (atomic save), so we watch
    /// the parent directory (NonRecursive) and filter events by path.
    pub fn new(path: &Path, interval: Duration) -> Result<Self> {
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
            interval,
            last_check: Instant::now(),
        })
    }

    /// Return true if the file has changed since last check (non-blocking).
    ///
    /// Editors emit bursts of events per save; queued notifications are
    /// collapsed, and nothing is reported until `interval` has passed since
    /// the previous check.
    pub fn has_changed(&mut self) -> bool {
        if self.last_check.elapsed() < self.interval {
            return false;
        }
        self.last_check = Instant::now();
        let mut changed = false;
        while self.rx.try_recv().is_ok() {
            changed = true;
        }
        if changed {
            debug!("watch: change detected");
        }
        changed
    }
}
