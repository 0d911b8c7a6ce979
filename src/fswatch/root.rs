//! One live watcher per root binding.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::UNIX_EPOCH;

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::routing::{RootBinding, RouteTable};

/// A filesystem notification translated to what the route table cares
/// about: a file now exists with this mtime, or it no longer exists.
enum FsEvent {
    Upsert { path: PathBuf, modified_ms: u64 },
    Remove { path: PathBuf },
}

/// A live watcher over one root binding, feeding the route table.
///
/// Created after the listening socket is bound; lives until shutdown.
/// Disposing it stops event emission and releases the OS watch handles.
pub struct WatchedRoot {
    watcher: RecommendedWatcher,
    apply_task: JoinHandle<()>,
}

impl WatchedRoot {
    /// Start watching the binding's directory and apply events to `table`.
    ///
    /// Events for this root are applied in emission order by a single task;
    /// no ordering is guaranteed across roots.
    pub fn spawn(binding: RootBinding, table: Arc<RouteTable>) -> Result<Self, notify::Error> {
        let (tx, mut rx) = mpsc::unbounded_channel();

        let event_tx = tx.clone();
        let mut watcher =
            notify::recommended_watcher(move |res: notify::Result<Event>| match res {
                Ok(event) => translate(&event, &event_tx),
                Err(e) => tracing::warn!(error = %e, "watch error"),
            })?;
        watcher.watch(binding.dir(), RecursiveMode::Recursive)?;

        // The watcher does not replay pre-existing files; synthesize add
        // events for the current tree. A live event may interleave with the
        // scan, which last-write-wins makes harmless.
        scan_tree(binding.dir(), &tx);
        drop(tx);

        tracing::debug!(dir = %binding.dir().display(), mount = binding.mount(), "watching root");

        let apply_task = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                apply(&binding, &table, event);
            }
        });

        Ok(Self { watcher, apply_task })
    }

    /// Stop watching and release OS resources.
    pub fn dispose(self) {
        // Dropping the watcher drops the callback's sender; the apply task
        // would drain and exit on its own, but shutdown doesn't wait for it.
        drop(self.watcher);
        self.apply_task.abort();
    }
}

fn apply(binding: &RootBinding, table: &RouteTable, event: FsEvent) {
    match event {
        FsEvent::Upsert { path, modified_ms } => {
            if let Some(server_path) = binding.server_path(&path) {
                table.upsert(server_path, &path, modified_ms);
            }
        }
        FsEvent::Remove { path } => {
            if let Some(server_path) = binding.server_path(&path) {
                table.remove(&server_path);
            }
        }
    }
}

/// Translate a raw notify event. Runs on the notify thread, where the
/// blocking `metadata` call is fine.
fn translate(event: &Event, tx: &mpsc::UnboundedSender<FsEvent>) {
    match event.kind {
        EventKind::Create(_) | EventKind::Modify(_) => {
            for path in &event.paths {
                match std::fs::metadata(path) {
                    Ok(meta) if meta.is_file() => {
                        let _ = tx.send(FsEvent::Upsert {
                            path: path.clone(),
                            modified_ms: mtime_ms(&meta),
                        });
                    }
                    // Directories register nothing themselves.
                    Ok(_) => {}
                    // The path raced a deletion or was renamed away.
                    Err(_) => {
                        let _ = tx.send(FsEvent::Remove { path: path.clone() });
                    }
                }
            }
        }
        EventKind::Remove(_) => {
            for path in &event.paths {
                let _ = tx.send(FsEvent::Remove { path: path.clone() });
            }
        }
        _ => {}
    }
}

/// Recursive walk emitting an upsert for every regular file.
fn scan_tree(dir: &Path, tx: &mpsc::UnboundedSender<FsEvent>) {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!(dir = %dir.display(), error = %e, "initial scan failed");
            return;
        }
    };
    for entry in entries.flatten() {
        let path = entry.path();
        match std::fs::metadata(&path) {
            Ok(meta) if meta.is_dir() => scan_tree(&path, tx),
            Ok(meta) if meta.is_file() => {
                let _ = tx.send(FsEvent::Upsert {
                    path,
                    modified_ms: mtime_ms(&meta),
                });
            }
            _ => {}
        }
    }
}

/// Modification time in milliseconds since the epoch.
pub fn mtime_ms(meta: &std::fs::Metadata) -> u64 {
    meta.modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
