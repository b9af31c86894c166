//! Debounced, non-recursive watch on the root directory.
//!
//! The watcher never touches files itself. Every created or modified
//! top-level path becomes a [`Task::ProcessFile`] on the worker queue.

use crate::worker::{Task, TaskSender};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode};
use notify_debouncer_full::{DebouncedEvent, Debouncer, RecommendedCache, new_debouncer};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum WatchError {
    #[error("failed to create watcher: {0}")]
    Create(#[source] notify::Error),
    #[error("failed to watch {}: {source}", .path.display())]
    Watch {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },
}

/// Live watch. Dropping it stops event delivery.
pub struct DirectoryWatcher {
    root: PathBuf,
    _debouncer: Debouncer<RecommendedWatcher, RecommendedCache>,
}

impl DirectoryWatcher {
    pub fn start(root: &Path, tasks: TaskSender, debounce: Duration) -> Result<Self, WatchError> {
        let event_root = root.to_path_buf();
        let mut debouncer = new_debouncer(
            debounce,
            None,
            move |result: Result<Vec<DebouncedEvent>, Vec<notify::Error>>| match result {
                Ok(events) => {
                    for event in events {
                        for path in paths_for_event(&event_root, &event) {
                            debug!("change detected: {}", path.display());
                            if tasks.submit(Task::ProcessFile(path)).is_err() {
                                debug!("worker is gone, dropping event");
                                return;
                            }
                        }
                    }
                }
                Err(errors) => {
                    for error in errors {
                        warn!("watcher error: {}", error);
                    }
                }
            },
        )
        .map_err(WatchError::Create)?;

        debouncer
            .watch(root, RecursiveMode::NonRecursive)
            .map_err(|e| WatchError::Watch {
                path: root.to_path_buf(),
                source: e,
            })?;

        info!("watching {}", root.display());
        Ok(Self {
            root: root.to_path_buf(),
            _debouncer: debouncer,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// Paths of a create or modify event that sit directly in `root`.
pub fn paths_for_event(root: &Path, event: &Event) -> Vec<PathBuf> {
    if !matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
        return Vec::new();
    }

    let mut paths: Vec<PathBuf> = event
        .paths
        .iter()
        .filter(|path| path.parent() == Some(root))
        .cloned()
        .collect();
    paths.dedup();
    paths
}
