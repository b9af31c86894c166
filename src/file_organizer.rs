/// Organize passes and single-file processing.
///
/// Every top-level file runs through the same pipeline: duplicate check,
/// classification, move. A pass reports `processed / total` after each file
/// and keeps going when files vanish or are locked mid-pass.
use crate::classifier::Classifier;
use crate::config::CompiledFilters;
use crate::duplicates::{ContentHash, DuplicateDetector, HashIndex, hash_file};
use crate::file_category::Category;
use crate::mover::{MoveOutcome, MoveRecord, Mover, SkipReason, skip_reason};
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors that stop a whole pass before it starts.
#[derive(Debug, Error)]
pub enum OrganizeError {
    /// The root directory is missing or not a directory.
    #[error("invalid root directory {}: {source}", .path.display())]
    InvalidRoot {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// The root directory could not be listed.
    #[error("error reading directory {}: {source}", .path.display())]
    ReadDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Result type for organize operations.
pub type OrganizeResult<T> = Result<T, OrganizeError>;

/// Progress of a running pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub processed: usize,
    pub total: usize,
}

impl Progress {
    /// Fraction of files handled, in `0.0..=1.0`.
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.processed as f64 / self.total as f64
        }
    }
}

/// What happened to one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    /// Moved into its category folder.
    Moved(MoveRecord),
    /// Moved into the duplicates folder.
    Quarantined(MoveRecord),
    /// Left in place for now.
    Skipped(SkipReason),
    /// Not a top-level regular file of the root, or filtered out.
    Ignored,
    /// Hard error, described.
    Failed(String),
}

/// What a pass would do with one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedMove {
    pub source: PathBuf,
    pub category: Category,
    /// Already organized file with the same content, for duplicates.
    pub duplicate_of: Option<PathBuf>,
}

impl PlannedMove {
    pub fn is_duplicate(&self) -> bool {
        self.duplicate_of.is_some()
    }
}

/// Summary of an organize pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassReport {
    pub moved: Vec<MoveRecord>,
    pub quarantined: Vec<MoveRecord>,
    pub skipped: Vec<(PathBuf, SkipReason)>,
    pub failed: Vec<(PathBuf, String)>,
}

impl PassReport {
    fn record(&mut self, path: &Path, outcome: FileOutcome) {
        match outcome {
            FileOutcome::Moved(record) => self.moved.push(record),
            FileOutcome::Quarantined(record) => self.quarantined.push(record),
            FileOutcome::Skipped(reason) => self.skipped.push((path.to_path_buf(), reason)),
            FileOutcome::Failed(reason) => self.failed.push((path.to_path_buf(), reason)),
            FileOutcome::Ignored => {}
        }
    }

    /// Number of files that changed place.
    pub fn total_moves(&self) -> usize {
        self.moved.len() + self.quarantined.len()
    }

    /// Files per destination folder, duplicates included.
    pub fn category_counts(&self) -> HashMap<String, usize> {
        let mut counts = HashMap::new();
        for record in self.moved.iter().chain(&self.quarantined) {
            *counts
                .entry(record.category.dir_name().to_string())
                .or_insert(0) += 1;
        }
        counts
    }

    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

struct Decision {
    category: Category,
    digest: ContentHash,
    duplicate_of: Option<PathBuf>,
}

/// Sorts the top-level files of one root directory.
#[derive(Debug, Clone)]
pub struct FileOrganizer {
    root: PathBuf,
    classifier: Classifier,
    detector: DuplicateDetector,
    mover: Mover,
    filters: CompiledFilters,
}

impl FileOrganizer {
    /// Creates an organizer for `root`, which must be an existing directory.
    pub fn new(
        root: &Path,
        classifier: Classifier,
        filters: CompiledFilters,
    ) -> OrganizeResult<Self> {
        let root = fs::canonicalize(root).map_err(|e| OrganizeError::InvalidRoot {
            path: root.to_path_buf(),
            source: e,
        })?;
        if !root.is_dir() {
            return Err(OrganizeError::InvalidRoot {
                path: root,
                source: io::Error::new(io::ErrorKind::InvalidInput, "not a directory"),
            });
        }

        Ok(Self {
            detector: DuplicateDetector::new(&root),
            mover: Mover::new(&root),
            root,
            classifier,
            filters,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    /// Top-level regular files eligible for organizing, sorted by name.
    pub fn pending_files(&self) -> OrganizeResult<Vec<PathBuf>> {
        let entries = fs::read_dir(&self.root).map_err(|e| OrganizeError::ReadDir {
            path: self.root.clone(),
            source: e,
        })?;

        let mut files: Vec<PathBuf> = entries
            .flatten()
            .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
            .map(|entry| entry.path())
            .filter(|path| self.filters.should_include(path))
            .collect();
        files.sort();
        Ok(files)
    }

    /// Runs one organize pass, calling `on_progress` after every file.
    pub fn organize_pass<F>(&self, mut on_progress: F) -> OrganizeResult<PassReport>
    where
        F: FnMut(Progress),
    {
        let files = self.pending_files()?;
        let total = files.len();
        if files.is_empty() {
            debug!("nothing to organize in {}", self.root.display());
            return Ok(PassReport::default());
        }
        info!("organizing {} files in {}", total, self.root.display());

        let mut index = HashIndex::build(&self.root);
        let mut report = PassReport::default();

        for (idx, path) in files.iter().enumerate() {
            let outcome = match self.decide(path, |p, d| index.find_match(p, d)) {
                Ok(decision) => {
                    let digest = decision.digest;
                    let outcome = self.apply(path, decision);
                    if let FileOutcome::Moved(record) = &outcome {
                        index.insert(digest, record.new_path.clone());
                    }
                    outcome
                }
                Err(outcome) => outcome,
            };
            report.record(path, outcome);
            on_progress(Progress {
                processed: idx + 1,
                total,
            });
        }

        info!(
            "pass done: {} moved, {} quarantined, {} skipped, {} failed",
            report.moved.len(),
            report.quarantined.len(),
            report.skipped.len(),
            report.failed.len()
        );
        Ok(report)
    }

    /// Computes what [`FileOrganizer::organize_pass`] would do without
    /// touching the filesystem.
    pub fn plan_pass(&self) -> OrganizeResult<Vec<PlannedMove>> {
        let files = self.pending_files()?;
        if files.is_empty() {
            return Ok(Vec::new());
        }
        let mut index = HashIndex::build(&self.root);
        let mut plan = Vec::new();

        for path in files {
            let Ok(decision) = self.decide(&path, |p, d| index.find_match(p, d)) else {
                continue;
            };
            if decision.duplicate_of.is_none() {
                index.insert(decision.digest, path.clone());
            }
            plan.push(PlannedMove {
                source: path,
                category: decision.category,
                duplicate_of: decision.duplicate_of,
            });
        }
        Ok(plan)
    }

    /// Runs the pipeline for one path, as reported by the watcher. Paths that
    /// are not top-level regular files of the root are ignored.
    pub fn process_file(&self, path: &Path) -> FileOutcome {
        if !self.is_top_level_file(path) {
            debug!("ignoring {}", path.display());
            return FileOutcome::Ignored;
        }
        if !self.filters.should_include(path) {
            debug!("{} is excluded by filters", path.display());
            return FileOutcome::Ignored;
        }

        match self.decide(path, |p, d| self.detector.find_match(p, d)) {
            Ok(decision) => self.apply(path, decision),
            Err(outcome) => outcome,
        }
    }

    fn is_top_level_file(&self, path: &Path) -> bool {
        let Some(parent) = path.parent() else {
            return false;
        };
        let same_parent = parent == self.root
            || fs::canonicalize(parent)
                .map(|p| p == self.root)
                .unwrap_or(false);
        same_parent
            && fs::symlink_metadata(path)
                .map(|m| m.file_type().is_file())
                .unwrap_or(false)
    }

    /// Hashes `path`, looks for an organized twin, classifies.
    fn decide<F>(&self, path: &Path, mut find_match: F) -> Result<Decision, FileOutcome>
    where
        F: FnMut(&Path, &ContentHash) -> Option<PathBuf>,
    {
        let digest = hash_file(path).map_err(|e| match skip_reason(&e) {
            Some(reason) => FileOutcome::Skipped(reason),
            None => FileOutcome::Failed(format!("could not hash {}: {}", path.display(), e)),
        })?;

        let duplicate_of = find_match(path, &digest);
        let category = if duplicate_of.is_some() {
            Category::Duplicates
        } else {
            self.classifier.classify(path)
        };

        Ok(Decision {
            category,
            digest,
            duplicate_of,
        })
    }

    fn apply(&self, path: &Path, decision: Decision) -> FileOutcome {
        let result = match &decision.duplicate_of {
            Some(original) => {
                debug!(
                    "{} duplicates {}",
                    path.display(),
                    original.display()
                );
                self.mover.quarantine(path)
            }
            None => self.mover.move_to_category(path, &decision.category),
        };

        match result {
            Ok(MoveOutcome::Moved(record)) if record.category.is_quarantine() => {
                FileOutcome::Quarantined(record)
            }
            Ok(MoveOutcome::Moved(record)) => FileOutcome::Moved(record),
            Ok(MoveOutcome::Skipped(reason)) => FileOutcome::Skipped(reason),
            Err(e) => {
                warn!("{}", e);
                FileOutcome::Failed(e.to_string())
            }
        }
    }
}
