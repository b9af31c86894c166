//! filesorter - sort a directory into category folders
//!
//! Top-level files of a root directory are classified by custom substring
//! rules, then by extension, and moved into `<root>/<Category>/`. Files whose
//! content matches an already organized file are moved to
//! `<root>/Duplicates/` instead. Passes run on demand, on filesystem events
//! and on a daily schedule, all serialized through one worker thread.

pub mod classifier;
pub mod cli;
pub mod config;
pub mod context;
pub mod duplicates;
pub mod file_category;
pub mod file_organizer;
pub mod mover;
pub mod output;
pub mod preview;
pub mod rules;
pub mod schedule;
pub mod secrets;
pub mod service;
pub mod watcher;
pub mod worker;

pub use classifier::Classifier;
pub use config::{CompiledFilters, ConfigError, Settings};
pub use context::{AppContext, AppPaths};
pub use duplicates::{ContentHash, DuplicateDetector};
pub use file_category::{Category, ExtensionTable};
pub use file_organizer::{FileOrganizer, FileOutcome, PassReport};
pub use rules::{ClassificationRule, RuleSet};
pub use service::{Service, ServiceOptions};
pub use worker::{Task, TaskSender, Worker, WorkerEvent};

pub use cli::{Cli, run_cli};
