//! Wires the worker, the watcher and the scheduler together for one root.

use crate::context::{AppContext, ContextError};
use crate::schedule::SchedulerHandle;
use crate::watcher::{DirectoryWatcher, WatchError};
use crate::worker::{TaskSender, Worker, WorkerError, WorkerEvent};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Context(#[from] ContextError),
    #[error(transparent)]
    Worker(#[from] WorkerError),
    #[error(transparent)]
    Watch(#[from] WatchError),
}

/// Which trigger sources to start besides the worker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServiceOptions {
    pub watch: bool,
    pub schedule: bool,
}

pub struct Service {
    root: PathBuf,
    worker: Worker,
    watcher: Option<DirectoryWatcher>,
    scheduler: Option<SchedulerHandle>,
}

impl Service {
    pub fn start(ctx: &AppContext, root: &Path, options: ServiceOptions) -> Result<Self, ServiceError> {
        let organizer = ctx.organizer(root)?;
        let root = organizer.root().to_path_buf();
        let worker = Worker::spawn(organizer)?;

        let watcher = if options.watch {
            Some(DirectoryWatcher::start(
                &root,
                worker.sender(),
                ctx.settings.watch.debounce(),
            )?)
        } else {
            None
        };

        let scheduler = if options.schedule {
            ctx.schedule().and_then(|config| {
                SchedulerHandle::spawn(
                    config.spec(),
                    worker.sender(),
                    ctx.settings.schedule.poll_interval(),
                )
            })
        } else {
            None
        };

        info!(
            "service started for {} (watching: {}, scheduled: {})",
            root.display(),
            watcher.is_some(),
            scheduler.is_some()
        );
        Ok(Self {
            root,
            worker,
            watcher,
            scheduler,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn tasks(&self) -> TaskSender {
        self.worker.sender()
    }

    pub fn events(&self) -> &flume::Receiver<WorkerEvent> {
        self.worker.events()
    }

    pub fn is_watching(&self) -> bool {
        self.watcher.is_some()
    }

    pub fn is_scheduled(&self) -> bool {
        self.scheduler.is_some()
    }

    /// Stops the trigger sources first, then lets the worker drain its queue.
    pub fn shutdown(self) {
        let Self {
            worker,
            watcher,
            scheduler,
            ..
        } = self;
        drop(watcher);
        if let Some(scheduler) = scheduler {
            scheduler.shutdown();
        }
        worker.shutdown();
        info!("service stopped");
    }
}
