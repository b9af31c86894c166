/// Moves files into category folders or the duplicates quarantine.
///
/// Category folders are created on demand directly under the root. A move
/// never overwrites: when the destination name is taken, a counter is put in
/// front of the extension (`report (1).pdf`). Duplicates get a unix
/// timestamp prefix (`1700000000_report.pdf`) before the same collision rule
/// applies.
use crate::file_category::Category;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// Errors that stop a single move. None of them is fatal to a pass.
#[derive(Debug, Error)]
pub enum MoveError {
    /// Failed to create a category directory.
    #[error("failed to create directory {}: {source}", .path.display())]
    DirectoryCreationFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// Failed to move a file to its category directory.
    #[error("failed to move {} to {}: {source}", .from.display(), .to.display())]
    FileMoveFailure {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },
    /// The path has no file name component.
    #[error("{} has no file name", .0.display())]
    NoFileName(PathBuf),
}

/// Result type for move operations.
pub type MoveResult<T> = Result<T, MoveError>;

/// Why a file was left where it was.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Another process holds the file; it is retried on the next event or pass.
    Locked,
    /// The file disappeared before it could be handled.
    Vanished,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::Locked => f.write_str("file is locked or in use"),
            SkipReason::Vanished => f.write_str("file no longer exists"),
        }
    }
}

/// A completed relocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveRecord {
    pub original_path: PathBuf,
    pub new_path: PathBuf,
    pub category: Category,
}

/// Outcome of one move attempt that did not hit a hard error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveOutcome {
    Moved(MoveRecord),
    Skipped(SkipReason),
}

/// Relocates files inside one root directory.
#[derive(Debug, Clone)]
pub struct Mover {
    root: PathBuf,
}

impl Mover {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Folder a category's files land in.
    pub fn category_dir(&self, category: &Category) -> PathBuf {
        self.root.join(category.dir_name())
    }

    /// Moves `file_path` into the folder of `category`, keeping its name.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use filesorter::file_category::Category;
    /// use filesorter::mover::{MoveOutcome, Mover};
    /// use std::path::Path;
    ///
    /// let mover = Mover::new("/home/me/Downloads");
    /// match mover.move_to_category(Path::new("/home/me/Downloads/a.pdf"), &Category::Documents) {
    ///     Ok(MoveOutcome::Moved(record)) => println!("-> {}", record.new_path.display()),
    ///     Ok(MoveOutcome::Skipped(reason)) => println!("skipped: {}", reason),
    ///     Err(e) => eprintln!("{}", e),
    /// }
    /// ```
    pub fn move_to_category(&self, file_path: &Path, category: &Category) -> MoveResult<MoveOutcome> {
        let file_name = file_name_of(file_path)?;
        self.relocate(file_path, category, &file_name)
    }

    /// Moves `file_path` into the quarantine folder as
    /// `<unix-timestamp>_<original-name>`.
    pub fn quarantine(&self, file_path: &Path) -> MoveResult<MoveOutcome> {
        let timestamp = chrono::Utc::now().timestamp();
        self.quarantine_at(file_path, timestamp)
    }

    /// [`Mover::quarantine`] with an explicit timestamp.
    pub fn quarantine_at(&self, file_path: &Path, timestamp: i64) -> MoveResult<MoveOutcome> {
        let file_name = file_name_of(file_path)?;
        let stamped = format!("{}_{}", timestamp, file_name);
        self.relocate(file_path, &Category::Duplicates, &stamped)
    }

    fn relocate(
        &self,
        file_path: &Path,
        category: &Category,
        file_name: &str,
    ) -> MoveResult<MoveOutcome> {
        if !file_path.exists() {
            return Ok(MoveOutcome::Skipped(SkipReason::Vanished));
        }

        let category_path = self.category_dir(category);
        let source = self.clear_category_path(file_path, &category_path)?;
        fs::create_dir_all(&category_path).map_err(|e| MoveError::DirectoryCreationFailed {
            path: category_path.clone(),
            source: e,
        })?;

        let destination_path = unique_destination(&category_path, file_name);

        match move_file(&source, &destination_path) {
            Ok(()) => {
                info!(
                    "moved {} -> {}",
                    file_path.display(),
                    destination_path.display()
                );
                Ok(MoveOutcome::Moved(MoveRecord {
                    original_path: file_path.to_path_buf(),
                    new_path: destination_path,
                    category: category.clone(),
                }))
            }
            Err(e) => match skip_reason(&e) {
                Some(reason) => {
                    debug!("leaving {} in place ({}): {}", file_path.display(), reason, e);
                    Ok(MoveOutcome::Skipped(reason))
                }
                None => Err(MoveError::FileMoveFailure {
                    from: source,
                    to: destination_path,
                    source: e,
                }),
            },
        }
    }

    /// A top-level file named like the category folder is renamed to a free
    /// `name (n)` so the folder can be created. Returns where `file_path` is
    /// now.
    fn clear_category_path(&self, file_path: &Path, category_path: &Path) -> MoveResult<PathBuf> {
        let blocked = fs::symlink_metadata(category_path)
            .map(|m| !m.is_dir())
            .unwrap_or(false);
        if !blocked {
            return Ok(file_path.to_path_buf());
        }

        let name = file_name_of(category_path)?;
        let parked = unique_destination(&self.root, &name);
        move_file(category_path, &parked).map_err(|e| MoveError::FileMoveFailure {
            from: category_path.to_path_buf(),
            to: parked.clone(),
            source: e,
        })?;
        debug!(
            "moved {} aside to {} to make room for the folder",
            category_path.display(),
            parked.display()
        );

        if file_path == category_path {
            Ok(parked)
        } else {
            Ok(file_path.to_path_buf())
        }
    }
}

/// Maps errors that mean "try again later" or "already gone" to a skip.
/// Everything else is a real failure.
pub fn skip_reason(err: &io::Error) -> Option<SkipReason> {
    match err.kind() {
        io::ErrorKind::NotFound => Some(SkipReason::Vanished),
        _ if is_locked(err) => Some(SkipReason::Locked),
        _ => None,
    }
}

/// Whether `err` says another process holds the file.
pub fn is_locked(err: &io::Error) -> bool {
    if err.kind() == io::ErrorKind::PermissionDenied {
        return true;
    }
    #[cfg(windows)]
    {
        const ERROR_SHARING_VIOLATION: i32 = 32;
        const ERROR_LOCK_VIOLATION: i32 = 33;
        if matches!(
            err.raw_os_error(),
            Some(ERROR_SHARING_VIOLATION | ERROR_LOCK_VIOLATION)
        ) {
            return true;
        }
    }
    false
}

fn file_name_of(file_path: &Path) -> MoveResult<String> {
    file_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| MoveError::NoFileName(file_path.to_path_buf()))
}

/// First free path for `file_name` in `dir`: the name itself, then
/// `stem (1).ext`, `stem (2).ext`, ...
pub fn unique_destination(dir: &Path, file_name: &str) -> PathBuf {
    let candidate = dir.join(file_name);
    if !candidate.exists() {
        return candidate;
    }

    let (stem, ext) = split_name(file_name);
    (1u32..)
        .map(|n| match ext {
            Some(ext) => dir.join(format!("{} ({}).{}", stem, n, ext)),
            None => dir.join(format!("{} ({})", stem, n)),
        })
        .find(|path| !path.exists())
        .unwrap_or(candidate)
}

/// Splits at the last dot, keeping leading-dot names (`.env`) whole.
fn split_name(file_name: &str) -> (&str, Option<&str>) {
    match file_name.rfind('.') {
        Some(idx) if idx > 0 => (&file_name[..idx], Some(&file_name[idx + 1..])),
        _ => (file_name, None),
    }
}

/// Renames, falling back to copy + remove across filesystems.
fn move_file(from: &Path, to: &Path) -> io::Result<()> {
    match fs::rename(from, to) {
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
            fs::copy(from, to)?;
            if let Err(remove_err) = fs::remove_file(from) {
                // keep exactly one copy
                let _ = fs::remove_file(to);
                return Err(remove_err);
            }
            Ok(())
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn moved(outcome: MoveOutcome) -> MoveRecord {
        match outcome {
            MoveOutcome::Moved(record) => record,
            other => panic!("expected a move, got {:?}", other),
        }
    }

    #[test]
    fn test_move_to_category_creates_directory() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let base_path = temp_dir.path();
        let file_path = base_path.join("test.txt");
        fs::write(&file_path, "test content").expect("Failed to write test file");

        let record = moved(
            Mover::new(base_path)
                .move_to_category(&file_path, &Category::Documents)
                .expect("Failed to move file"),
        );

        let category_dir = base_path.join("Documents");
        assert!(category_dir.is_dir());
        assert!(!file_path.exists());
        assert_eq!(record.new_path, category_dir.join("test.txt"));
        assert_eq!(record.category, Category::Documents);
    }

    #[test]
    fn test_move_to_category_uses_existing_directory() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let base_path = temp_dir.path();
        fs::create_dir(base_path.join("Images")).expect("Failed to create category directory");
        let file_path = base_path.join("test.png");
        fs::write(&file_path, "test content").expect("Failed to write test file");

        Mover::new(base_path)
            .move_to_category(&file_path, &Category::Images)
            .expect("Failed to move file");

        assert!(base_path.join("Images/test.png").exists());
    }

    #[test]
    fn test_name_collision_gets_counter_suffix() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let base_path = temp_dir.path();
        fs::create_dir(base_path.join("Documents")).unwrap();
        fs::write(base_path.join("Documents/notes.txt"), "old").unwrap();
        fs::write(base_path.join("Documents/notes (1).txt"), "older").unwrap();
        let file_path = base_path.join("notes.txt");
        fs::write(&file_path, "new").unwrap();

        let record = moved(
            Mover::new(base_path)
                .move_to_category(&file_path, &Category::Documents)
                .unwrap(),
        );

        assert_eq!(record.new_path, base_path.join("Documents/notes (2).txt"));
        assert_eq!(fs::read_to_string(base_path.join("Documents/notes.txt")).unwrap(), "old");
        assert_eq!(fs::read_to_string(&record.new_path).unwrap(), "new");
    }

    #[test]
    fn test_quarantine_prefixes_timestamp() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let base_path = temp_dir.path();
        let file_path = base_path.join("copy.pdf");
        fs::write(&file_path, "dup").unwrap();

        let record = moved(Mover::new(base_path).quarantine_at(&file_path, 1700000000).unwrap());

        assert_eq!(record.new_path, base_path.join("Duplicates/1700000000_copy.pdf"));
        assert_eq!(record.category, Category::Duplicates);
    }

    #[test]
    fn test_quarantine_same_second_does_not_overwrite() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let base_path = temp_dir.path();
        let mover = Mover::new(base_path);
        fs::write(base_path.join("a.txt"), "first").unwrap();
        mover.quarantine_at(&base_path.join("a.txt"), 42).unwrap();
        fs::write(base_path.join("a.txt"), "second").unwrap();

        let record = moved(mover.quarantine_at(&base_path.join("a.txt"), 42).unwrap());

        assert_eq!(record.new_path, base_path.join("Duplicates/42_a (1).txt"));
        assert_eq!(fs::read_to_string(base_path.join("Duplicates/42_a.txt")).unwrap(), "first");
    }

    #[test]
    fn test_missing_file_is_skipped() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let outcome = Mover::new(temp_dir.path())
            .move_to_category(&temp_dir.path().join("ghost.txt"), &Category::Documents)
            .unwrap();
        assert_eq!(outcome, MoveOutcome::Skipped(SkipReason::Vanished));
        assert!(!temp_dir.path().join("Documents").exists());
    }

    #[test]
    fn test_file_named_like_its_folder_is_moved_into_it() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let base_path = temp_dir.path();
        let file_path = base_path.join("Miscellaneous");
        fs::write(&file_path, "no extension").unwrap();

        let record = moved(
            Mover::new(base_path)
                .move_to_category(&file_path, &Category::Miscellaneous)
                .unwrap(),
        );

        assert!(base_path.join("Miscellaneous").is_dir());
        assert_eq!(record.new_path, base_path.join("Miscellaneous/Miscellaneous"));
        assert_eq!(fs::read_to_string(&record.new_path).unwrap(), "no extension");
        assert!(!base_path.join("Miscellaneous (1)").exists());
    }

    #[test]
    fn test_other_file_blocking_the_folder_is_set_aside() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let base_path = temp_dir.path();
        fs::write(base_path.join("Documents"), "in the way").unwrap();
        let file_path = base_path.join("a.txt");
        fs::write(&file_path, "a").unwrap();

        let record = moved(
            Mover::new(base_path)
                .move_to_category(&file_path, &Category::Documents)
                .unwrap(),
        );

        assert_eq!(record.new_path, base_path.join("Documents/a.txt"));
        assert_eq!(
            fs::read_to_string(base_path.join("Documents (1)")).unwrap(),
            "in the way"
        );
    }

    #[test]
    fn test_skip_reason_mapping() {
        let denied = io::Error::from(io::ErrorKind::PermissionDenied);
        let missing = io::Error::from(io::ErrorKind::NotFound);
        let other = io::Error::other("disk on fire");

        assert_eq!(skip_reason(&denied), Some(SkipReason::Locked));
        assert_eq!(skip_reason(&missing), Some(SkipReason::Vanished));
        assert_eq!(skip_reason(&other), None);
        assert!(!is_locked(&missing));
    }

    #[cfg(windows)]
    #[test]
    fn test_sharing_violation_counts_as_locked() {
        assert!(is_locked(&io::Error::from_raw_os_error(32)));
        assert!(is_locked(&io::Error::from_raw_os_error(33)));
        assert_eq!(
            skip_reason(&io::Error::from_raw_os_error(32)),
            Some(SkipReason::Locked)
        );
    }

    #[test]
    fn test_split_name() {
        assert_eq!(split_name("a.tar.gz"), ("a.tar", Some("gz")));
        assert_eq!(split_name("Makefile"), ("Makefile", None));
        assert_eq!(split_name(".env"), (".env", None));
    }

    #[test]
    fn test_unique_destination_without_extension() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        fs::write(temp_dir.path().join("LICENSE"), "x").unwrap();
        assert_eq!(
            unique_destination(temp_dir.path(), "LICENSE"),
            temp_dir.path().join("LICENSE (1)")
        );
    }
}
