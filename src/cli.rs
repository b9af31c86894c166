//! Command-line interface for filesorter.
//!
//! Parses arguments, builds the [`AppContext`] and dispatches to the
//! commands. Everything the user sees goes through [`OutputFormatter`].

use crate::context::{AppContext, AppPaths};
use crate::file_category::Category;
use crate::output::OutputFormatter;
use crate::schedule::ScheduleConfig;
use crate::secrets::KeyringStore;
use crate::service::{Service, ServiceOptions};
use crate::worker::{Task, WorkerEvent};
use chrono::Local;
use clap::{Parser, Subcommand};
use indicatif::ProgressBar;
use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Parser)]
#[command(name = "filesorter", version)]
#[command(about = "Sort files into category folders and quarantine duplicates", long_about = None)]
pub struct Cli {
    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Settings file (TOML) instead of ~/.config/filesorter/config.toml
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Custom rules file (JSON) instead of ~/.file_organizer_config.json
    #[arg(long, global = true)]
    pub rules: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Commands {
    /// Run one organize pass over a directory
    Organize {
        /// Directory to organize; defaults to the last one used
        dir: Option<PathBuf>,

        /// Show what would happen without moving anything
        #[arg(long)]
        dry_run: bool,
    },

    /// Organize new files as they appear, until Enter is pressed
    Watch {
        /// Directory to watch; defaults to the last one used
        dir: Option<PathBuf>,

        /// Do not start the daily schedule
        #[arg(long)]
        no_schedule: bool,
    },

    /// Print the category each file would go to
    Classify {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Write a thumbnail or text excerpt of a file
    Preview { file: PathBuf },

    /// Manage the daily cleanup schedule
    Schedule {
        #[command(subcommand)]
        action: ScheduleCommand,
    },

    /// List custom rules and built-in extensions
    Rules,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum ScheduleCommand {
    /// Store a schedule, e.g. "daily at 22:00"
    Set { schedule: String },
    /// Show the stored schedule and its next run
    Show,
    /// Remove the stored schedule
    Clear,
}

/// Builds the context from the user's home directory and runs `cli`.
pub fn run_cli(cli: Cli) -> Result<(), String> {
    let mut paths = AppPaths::discover().map_err(|e| e.to_string())?;
    if let Some(rules) = &cli.rules {
        paths.rules_file = rules.clone();
    }

    let ctx = AppContext::init(
        paths,
        cli.config.as_deref(),
        Box::new(KeyringStore::default()),
    )
    .map_err(|e| format!("Error loading configuration: {}", e))?;

    run_cli_with_context(&cli.command, &ctx)
}

/// Runs one command against an already initialized context.
pub fn run_cli_with_context(command: &Commands, ctx: &AppContext) -> Result<(), String> {
    match command {
        Commands::Organize { dir, dry_run } => organize(ctx, dir.as_deref(), *dry_run),
        Commands::Watch { dir, no_schedule } => watch(ctx, dir.as_deref(), !no_schedule),
        Commands::Classify { files } => {
            classify(ctx, files);
            Ok(())
        }
        Commands::Preview { file } => {
            let preview = ctx.preview_generator().generate(file);
            OutputFormatter::preview(file, &preview);
            Ok(())
        }
        Commands::Schedule { action } => schedule(ctx, action),
        Commands::Rules => {
            list_rules(ctx);
            Ok(())
        }
    }
}

fn organize(ctx: &AppContext, dir: Option<&Path>, dry_run: bool) -> Result<(), String> {
    let root = ctx.resolve_root(dir).map_err(|e| e.to_string())?;
    let service =
        Service::start(ctx, &root, ServiceOptions::default()).map_err(|e| e.to_string())?;

    if dry_run {
        OutputFormatter::dry_run_notice(&format!("Analyzing {}", service.root().display()));
    } else {
        OutputFormatter::info(&format!("Organizing {}", service.root().display()));
    }

    let task = if dry_run { Task::DryRun } else { Task::OrganizePass };
    service.tasks().submit(task).map_err(|e| e.to_string())?;

    let mut progress: Option<ProgressBar> = None;
    let result = loop {
        let event = match service.events().recv() {
            Ok(event) => event,
            Err(_) => break Err("worker stopped unexpectedly".to_string()),
        };
        match event {
            WorkerEvent::Progress(p) => {
                let pb = progress
                    .get_or_insert_with(|| OutputFormatter::create_progress_bar(p.total as u64));
                pb.set_position(p.processed as u64);
            }
            WorkerEvent::PassFinished(report) => {
                if let Some(pb) = progress.take() {
                    pb.finish_and_clear();
                }
                OutputFormatter::pass_report(&report);
                if report.is_clean() {
                    OutputFormatter::success("Organization complete!");
                } else {
                    OutputFormatter::warning("Some files could not be organized.");
                }
                break Ok(());
            }
            WorkerEvent::PlanReady(plan) => {
                OutputFormatter::plan(&plan);
                break Ok(());
            }
            WorkerEvent::PassFailed(reason) => break Err(reason),
            WorkerEvent::FileHandled { .. } => {}
        }
    };

    service.shutdown();
    result
}

fn watch(ctx: &AppContext, dir: Option<&Path>, with_schedule: bool) -> Result<(), String> {
    let root = ctx.resolve_root(dir).map_err(|e| e.to_string())?;
    let options = ServiceOptions {
        watch: true,
        schedule: with_schedule,
    };
    let service = Service::start(ctx, &root, options).map_err(|e| e.to_string())?;

    OutputFormatter::info(&format!("Watching {}", service.root().display()));
    if service.is_scheduled()
        && let Some(config) = ctx.schedule()
    {
        OutputFormatter::info(&format!("Scheduled cleanup: {}", config.schedule));
    }
    OutputFormatter::plain("Press Enter to stop.");

    let (stop_tx, stop_rx) = flume::bounded::<()>(1);
    thread::spawn(move || {
        if wait_for_enter(std::io::stdin().lock()) {
            let _ = stop_tx.send(());
            return;
        }
        debug!("stdin is closed, watching until the process is stopped");
        loop {
            thread::park();
        }
    });

    loop {
        if !stop_rx.is_empty() || stop_rx.is_disconnected() {
            break;
        }
        match service.events().recv_timeout(Duration::from_millis(200)) {
            Ok(WorkerEvent::FileHandled { path, outcome }) => {
                OutputFormatter::file_outcome(&path, &outcome)
            }
            Ok(WorkerEvent::PassFinished(report)) => OutputFormatter::pass_report(&report),
            Ok(WorkerEvent::PassFailed(reason)) => OutputFormatter::error(&reason),
            Ok(other) => debug!("ignoring {:?}", other),
            Err(flume::RecvTimeoutError::Timeout) => {}
            Err(flume::RecvTimeoutError::Disconnected) => break,
        }
    }

    service.shutdown();
    OutputFormatter::success("Stopped watching.");
    Ok(())
}

/// True once a line is read. End of input or a read error is not a request
/// to stop.
fn wait_for_enter<R: BufRead>(mut input: R) -> bool {
    let mut line = String::new();
    matches!(input.read_line(&mut line), Ok(n) if n > 0)
}

fn classify(ctx: &AppContext, files: &[PathBuf]) {
    let classifier = ctx.classifier();
    for file in files {
        let category = classifier.classify(file);
        OutputFormatter::classification(file, &category);
    }
}

fn schedule(ctx: &AppContext, action: &ScheduleCommand) -> Result<(), String> {
    let path = &ctx.paths.schedule_file;
    match action {
        ScheduleCommand::Set { schedule } => {
            let config = ScheduleConfig::new(schedule.as_str());
            config.save(path).map_err(|e| e.to_string())?;
            OutputFormatter::success(&format!("Schedule saved: {}", schedule));
            if !config.spec().is_active() {
                OutputFormatter::warning("Only \"daily at HH:MM\" schedules run automatically.");
            }
            show_next_run(&config);
        }
        ScheduleCommand::Show => match ctx.schedule() {
            Some(config) => {
                OutputFormatter::plain(&format!("Schedule: {}", config.schedule));
                show_next_run(&config);
            }
            None => OutputFormatter::info("No schedule set."),
        },
        ScheduleCommand::Clear => {
            ScheduleConfig::clear(path).map_err(|e| e.to_string())?;
            OutputFormatter::success("Schedule cleared.");
        }
    }
    Ok(())
}

fn show_next_run(config: &ScheduleConfig) {
    match config.spec().next_run(&Local::now()) {
        Some(next) => OutputFormatter::info(&format!(
            "Next run: {}",
            next.format("%Y-%m-%d %H:%M")
        )),
        None => OutputFormatter::info("Inactive."),
    }
}

fn list_rules(ctx: &AppContext) {
    OutputFormatter::header("Custom rules (first match wins)");
    if ctx.rules.is_empty() {
        OutputFormatter::plain("  none");
    }
    for rule in ctx.rules.iter() {
        OutputFormatter::rule(&rule.pattern, &rule.label);
    }

    OutputFormatter::header("Built-in extensions");
    let classifier = ctx.classifier();
    for category in Category::BUILTIN.iter() {
        let extensions = classifier.table().extensions_for(category);
        OutputFormatter::extension_row(category, &extensions);
    }
}
