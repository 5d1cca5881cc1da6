//! Live-reload file watching subsystem.
//!
//! # Data Flow
//! ```text
//! file streamer registers served parent dirs
//!     → WatchRegistry (notify watcher + watched set, one lock)
//!     → notify events over an unbounded channel
//!     → one background task (apply_event)
//!         create/modify/rename → LiveReload::notify(path)
//!         remove               → deregister the directory
//!     → broadcast channel → websocket clients (livereload.rs)
//! ```
//!
//! # Design Decisions
//! - Watching is per-directory, not per-file, to bound OS watch handles
//! - Event consumption happens on a single long-lived task so request
//!   handlers never touch the notify callback path
//! - Delivery to browsers is fire-and-forget; a lagging client just misses
//!   reload events

pub mod livereload;

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

pub use livereload::{livereload_handler, LiveReload};

/// Directories currently registered with the OS watcher.
///
/// Grows as new directories are served; an entry is removed only when the
/// directory itself is removed, so a recreated directory gets re-registered
/// by the next serve.
pub struct WatchRegistry {
    inner: Mutex<Inner>,
}

struct Inner {
    watcher: RecommendedWatcher,
    watching: HashSet<PathBuf>,
}

impl WatchRegistry {
    /// Create the registry and spawn its event-consumption task.
    pub fn new(reload: LiveReload) -> Result<Arc<Self>, notify::Error> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let watcher = RecommendedWatcher::new(
            move |result: notify::Result<Event>| match result {
                Ok(event) => {
                    let _ = tx.send(event);
                }
                Err(err) => tracing::warn!(error = %err, "watch error"),
            },
            notify::Config::default(),
        )?;

        let registry = Arc::new(Self {
            inner: Mutex::new(Inner {
                watcher,
                watching: HashSet::new(),
            }),
        });

        let consumer = registry.clone();
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                apply_event(&consumer, &reload, &event);
            }
        });

        Ok(registry)
    }

    /// Register a directory, idempotently. Already-watched directories are a
    /// no-op; the check-then-watch runs under the lock so concurrent serves
    /// of files in the same directory register it once.
    pub fn watch(&self, dir: &Path) {
        let dir = dir.canonicalize().unwrap_or_else(|_| dir.to_path_buf());
        let mut inner = self.inner.lock().unwrap();
        if inner.watching.contains(&dir) {
            return;
        }
        match inner.watcher.watch(&dir, RecursiveMode::NonRecursive) {
            Ok(()) => {
                tracing::debug!(dir = %dir.display(), "watching directory");
                inner.watching.insert(dir);
            }
            Err(err) => tracing::warn!(dir = %dir.display(), error = %err, "failed to watch"),
        }
    }

    /// Drop a watched directory after it was removed on disk.
    fn deregister(&self, path: &Path) {
        let mut inner = self.inner.lock().unwrap();
        if inner.watching.remove(path) {
            let _ = inner.watcher.unwatch(path);
            tracing::debug!(dir = %path.display(), "unwatched removed directory");
        }
    }

    pub fn is_watched(&self, dir: &Path) -> bool {
        self.inner.lock().unwrap().watching.contains(dir)
    }
}

/// Translate one filesystem event into reload notifications or watch-set
/// maintenance. Removes deregister; creates, writes and renames notify.
fn apply_event(registry: &WatchRegistry, reload: &LiveReload, event: &Event) {
    if event.kind.is_remove() {
        for path in &event.paths {
            registry.deregister(path);
        }
    } else if event.kind.is_create() || event.kind.is_modify() {
        for path in &event.paths {
            reload.notify(path);
        }
    }
}
