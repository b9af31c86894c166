//! Persisted cleanup schedule and the thread that fires it.
//!
//! The schedule file holds a single human string:
//!
//! ```json
//! {"schedule": "daily at 22:00"}
//! ```
//!
//! Only strings containing `daily at` followed by a valid `HH:MM` (or
//! `HH:MM:SS`) become a recurring trigger. Anything else is stored and shown
//! back to the user but never fires.

use crate::worker::{Task, TaskSender};
use chrono::{DateTime, Days, Local, NaiveTime, TimeZone};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("failed to write schedule file {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialize schedule: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// On-disk form of the schedule file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleConfig {
    pub schedule: String,
}

impl ScheduleConfig {
    pub fn new(schedule: impl Into<String>) -> Self {
        Self {
            schedule: schedule.into(),
        }
    }

    /// Reads the schedule file. Missing or corrupt files yield `None`.
    pub fn load(path: &Path) -> Option<Self> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                debug!("no schedule at {}: {}", path.display(), e);
                return None;
            }
        };
        match serde_json::from_str(&content) {
            Ok(config) => Some(config),
            Err(e) => {
                warn!("ignoring unreadable schedule file {}: {}", path.display(), e);
                None
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), ScheduleError> {
        let json = serde_json::to_string(self)?;
        fs::write(path, json).map_err(|e| ScheduleError::Write {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Removes the schedule file if present.
    pub fn clear(path: &Path) -> Result<(), ScheduleError> {
        match fs::remove_file(path) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(ScheduleError::Write {
                path: path.to_path_buf(),
                source: e,
            }),
            _ => Ok(()),
        }
    }

    pub fn spec(&self) -> ScheduleSpec {
        ScheduleSpec::parse(&self.schedule)
    }
}

/// Interpreted schedule string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduleSpec {
    /// Fire once a day at the given local time.
    Daily(NaiveTime),
    /// Stored but never fires.
    Inactive(String),
}

impl ScheduleSpec {
    /// ```
    /// use chrono::NaiveTime;
    /// use filesorter::schedule::ScheduleSpec;
    ///
    /// assert_eq!(
    ///     ScheduleSpec::parse("daily at 22:00"),
    ///     ScheduleSpec::Daily(NaiveTime::from_hms_opt(22, 0, 0).unwrap())
    /// );
    /// assert!(!ScheduleSpec::parse("every monday").is_active());
    /// ```
    pub fn parse(schedule: &str) -> Self {
        if !schedule.contains("daily at") {
            return ScheduleSpec::Inactive(schedule.to_string());
        }

        let time_str = schedule.rsplit("at ").next().unwrap_or_default().trim();
        match NaiveTime::parse_from_str(time_str, "%H:%M")
            .or_else(|_| NaiveTime::parse_from_str(time_str, "%H:%M:%S"))
        {
            Ok(time) => ScheduleSpec::Daily(time),
            Err(e) => {
                warn!("schedule '{}' has no usable time ({}), not activating it", schedule, e);
                ScheduleSpec::Inactive(schedule.to_string())
            }
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, ScheduleSpec::Daily(_))
    }

    /// First firing strictly after `now`.
    pub fn next_run<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Option<DateTime<Tz>> {
        let ScheduleSpec::Daily(time) = self else {
            return None;
        };
        let tz = now.timezone();
        let today = now.date_naive();
        [Some(today), today.checked_add_days(Days::new(1))]
            .into_iter()
            .flatten()
            .filter_map(|day| tz.from_local_datetime(&day.and_time(*time)).earliest())
            .find(|candidate| candidate > now)
    }
}

/// Running scheduler thread.
pub struct SchedulerHandle {
    stop: flume::Sender<()>,
    thread: Option<JoinHandle<()>>,
}

impl SchedulerHandle {
    /// Starts a thread that enqueues an organize pass every time `spec` is
    /// due. Returns `None` for inactive schedules.
    pub fn spawn(spec: ScheduleSpec, tasks: TaskSender, poll_interval: Duration) -> Option<Self> {
        if !spec.is_active() {
            info!("schedule is not active, no timer started");
            return None;
        }

        let (stop, stopped) = flume::bounded::<()>(1);
        let thread = thread::Builder::new()
            .name("scheduler".to_string())
            .spawn(move || run_scheduler(spec, tasks, stopped, poll_interval));

        match thread {
            Ok(thread) => Some(Self {
                stop,
                thread: Some(thread),
            }),
            Err(e) => {
                warn!("could not start scheduler thread: {}", e);
                None
            }
        }
    }

    /// Stops the thread and waits for it.
    pub fn shutdown(mut self) {
        self.stop_and_join();
    }

    fn stop_and_join(&mut self) {
        let _ = self.stop.try_send(());
        if let Some(thread) = self.thread.take()
            && thread.join().is_err()
        {
            warn!("scheduler thread panicked");
        }
    }
}

impl Drop for SchedulerHandle {
    fn drop(&mut self) {
        self.stop_and_join();
    }
}

fn run_scheduler(
    spec: ScheduleSpec,
    tasks: TaskSender,
    stopped: flume::Receiver<()>,
    poll_interval: Duration,
) {
    let mut next = spec.next_run(&Local::now());
    if let Some(next) = &next {
        info!("next scheduled cleanup at {}", next);
    }

    loop {
        match stopped.recv_timeout(poll_interval) {
            Err(flume::RecvTimeoutError::Timeout) => {}
            _ => break,
        }

        let now = Local::now();
        let Some(due) = next.as_ref() else { break };
        if now < *due {
            continue;
        }

        info!("starting scheduled cleanup");
        if tasks.submit(Task::OrganizePass).is_err() {
            debug!("worker is gone, stopping scheduler");
            break;
        }
        next = spec.next_run(&now);
    }
}
