//! Single-writer task queue.
//!
//! One worker thread owns the [`FileOrganizer`] and is the only code that
//! moves files. The watcher, the scheduler and the CLI just enqueue
//! [`Task`]s, so two triggers for the same file run one after the other:
//! the first moves it, the second finds it gone.

use crate::file_organizer::{FileOrganizer, FileOutcome, PassReport, PlannedMove, Progress};
use std::path::PathBuf;
use std::thread::{self, JoinHandle};
use thiserror::Error;
use tracing::{debug, error, warn};

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("worker has shut down")]
    Disconnected,
    #[error("failed to start worker thread: {0}")]
    Spawn(#[source] std::io::Error),
}

/// Unit of work for the worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Task {
    /// Organize every top-level file of the root.
    OrganizePass,
    /// Plan a pass without moving anything.
    DryRun,
    /// Handle one path reported by the watcher.
    ProcessFile(PathBuf),
    /// Stop after the tasks queued before this one.
    Shutdown,
}

/// What the worker reports back.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerEvent {
    Progress(Progress),
    PassFinished(PassReport),
    PassFailed(String),
    PlanReady(Vec<PlannedMove>),
    FileHandled { path: PathBuf, outcome: FileOutcome },
}

/// Cloneable handle for enqueueing tasks.
#[derive(Debug, Clone)]
pub struct TaskSender {
    tx: flume::Sender<Task>,
}

impl TaskSender {
    /// A sender and the receiving end a worker drains.
    pub fn channel() -> (Self, flume::Receiver<Task>) {
        let (tx, rx) = flume::unbounded();
        (Self { tx }, rx)
    }

    pub fn submit(&self, task: Task) -> Result<(), WorkerError> {
        self.tx.send(task).map_err(|_| WorkerError::Disconnected)
    }
}

/// The running worker thread.
pub struct Worker {
    tasks: TaskSender,
    events: flume::Receiver<WorkerEvent>,
    thread: Option<JoinHandle<()>>,
}

impl Worker {
    pub fn spawn(organizer: FileOrganizer) -> Result<Self, WorkerError> {
        let (tasks, queue) = TaskSender::channel();
        let (event_tx, events) = flume::unbounded();

        let thread = thread::Builder::new()
            .name("organizer".to_string())
            .spawn(move || run_worker(organizer, queue, event_tx))
            .map_err(WorkerError::Spawn)?;

        Ok(Self {
            tasks,
            events,
            thread: Some(thread),
        })
    }

    pub fn sender(&self) -> TaskSender {
        self.tasks.clone()
    }

    pub fn submit(&self, task: Task) -> Result<(), WorkerError> {
        self.tasks.submit(task)
    }

    pub fn events(&self) -> &flume::Receiver<WorkerEvent> {
        &self.events
    }

    /// Drains the tasks queued so far, then stops the thread.
    pub fn shutdown(mut self) {
        self.stop_and_join();
    }

    fn stop_and_join(&mut self) {
        let _ = self.tasks.submit(Task::Shutdown);
        if let Some(thread) = self.thread.take()
            && thread.join().is_err()
        {
            error!("worker thread panicked");
        }
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        self.stop_and_join();
    }
}

fn run_worker(
    organizer: FileOrganizer,
    queue: flume::Receiver<Task>,
    events: flume::Sender<WorkerEvent>,
) {
    debug!("worker started for {}", organizer.root().display());
    let emit = |event: WorkerEvent| {
        // nobody listening is fine
        let _ = events.send(event);
    };

    for task in queue.iter() {
        match task {
            Task::OrganizePass => {
                match organizer.organize_pass(|p| emit(WorkerEvent::Progress(p))) {
                    Ok(report) => emit(WorkerEvent::PassFinished(report)),
                    Err(e) => {
                        warn!("organize pass failed: {}", e);
                        emit(WorkerEvent::PassFailed(e.to_string()));
                    }
                }
            }
            Task::DryRun => match organizer.plan_pass() {
                Ok(plan) => emit(WorkerEvent::PlanReady(plan)),
                Err(e) => {
                    warn!("dry run failed: {}", e);
                    emit(WorkerEvent::PassFailed(e.to_string()));
                }
            },
            Task::ProcessFile(path) => {
                let outcome = organizer.process_file(&path);
                if outcome != FileOutcome::Ignored {
                    emit(WorkerEvent::FileHandled { path, outcome });
                }
            }
            Task::Shutdown => break,
        }
    }
    debug!("worker stopped");
}
