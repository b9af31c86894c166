/// Integration tests for filesorter
///
/// End-to-end scenarios over a temporary directory:
/// 1. Basic organization workflows
/// 2. Duplicate quarantine
/// 3. Custom rules
/// 4. Dry-run mode and filters
/// 5. Queue ordering and concurrent triggers
/// 6. Edge cases
use filesorter::classifier::Classifier;
use filesorter::config::{CompiledFilters, Settings};
use filesorter::context::{AppContext, AppPaths};
use filesorter::file_organizer::{FileOrganizer, FileOutcome};
use filesorter::mover::SkipReason;
use filesorter::rules::RuleSet;
use filesorter::secrets::MemoryStore;
use filesorter::service::{Service, ServiceOptions};
use filesorter::worker::{Task, Worker, WorkerEvent};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::thread;
use tempfile::TempDir;

// ============================================================================
// Test Utilities
// ============================================================================

/// A temporary root directory plus helpers to populate and inspect it.
struct TestFixture {
    temp_dir: TempDir,
}

impl TestFixture {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        TestFixture { temp_dir }
    }

    fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    fn create_file(&self, name: &str, content: &[u8]) {
        let file_path = self.path().join(name);
        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent directory");
        }
        let mut file = File::create(&file_path).expect("Failed to create file");
        file.write_all(content).expect("Failed to write file content");
    }

    fn create_text_file(&self, name: &str, content: &str) {
        self.create_file(name, content.as_bytes());
    }

    fn create_files(&self, files: &[(&str, &[u8])]) {
        for (name, content) in files {
            self.create_file(name, content);
        }
    }

    fn organizer(&self) -> FileOrganizer {
        self.organizer_with(Classifier::default(), CompiledFilters::default())
    }

    fn organizer_with(&self, classifier: Classifier, filters: CompiledFilters) -> FileOrganizer {
        FileOrganizer::new(self.path(), classifier, filters).expect("Failed to create organizer")
    }

    fn assert_file_exists(&self, rel_path: &str) {
        let path = self.path().join(rel_path);
        assert!(path.is_file(), "File should exist: {}", path.display());
    }

    fn assert_file_not_exists(&self, rel_path: &str) {
        let path = self.path().join(rel_path);
        assert!(!path.exists(), "File should not exist: {}", path.display());
    }

    /// Regular files directly in the root.
    fn count_files(&self) -> usize {
        fs::read_dir(self.path())
            .expect("Failed to read directory")
            .flatten()
            .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
            .count()
    }

    /// File names inside a category folder, sorted.
    fn files_in(&self, dir: &str) -> Vec<String> {
        let Ok(entries) = fs::read_dir(self.path().join(dir)) else {
            return Vec::new();
        };
        let mut names: Vec<String> = entries
            .flatten()
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    fn canonical(&self, name: &str) -> PathBuf {
        fs::canonicalize(self.path())
            .expect("Failed to canonicalize root")
            .join(name)
    }
}

// ============================================================================
// Basic Organization Workflows
// ============================================================================

#[test]
fn test_basic_organization_by_extension() {
    let fixture = TestFixture::new();
    fixture.create_files(&[
        ("report.pdf", b"pdf"),
        ("photo.JPG", b"jpg"),
        ("clip.mkv", b"mkv"),
        ("backup.tar", b"tar"),
        ("main.rs", b"rs"),
    ]);

    let report = fixture.organizer().organize_pass(|_| {}).unwrap();

    assert_eq!(report.moved.len(), 5);
    fixture.assert_file_exists("Documents/report.pdf");
    fixture.assert_file_exists("Images/photo.JPG");
    fixture.assert_file_exists("Media/clip.mkv");
    fixture.assert_file_exists("Archives/backup.tar");
    fixture.assert_file_exists("Code/main.rs");
    assert_eq!(fixture.count_files(), 0);
}

#[test]
fn test_unknown_extension_goes_to_miscellaneous() {
    let fixture = TestFixture::new();
    fixture.create_text_file("data.xyz", "?");
    fixture.create_text_file("README", "no extension");

    fixture.organizer().organize_pass(|_| {}).unwrap();

    assert_eq!(fixture.files_in("Miscellaneous"), vec!["README", "data.xyz"]);
}

#[test]
fn test_second_pass_is_a_no_op() {
    let fixture = TestFixture::new();
    fixture.create_files(&[("a.txt", b"1"), ("b.txt", b"1"), ("c.png", b"3")]);
    let organizer = fixture.organizer();

    let first = organizer.organize_pass(|_| {}).unwrap();
    let second = organizer.organize_pass(|_| {}).unwrap();

    assert_eq!(first.total_moves(), 3);
    assert_eq!(second.total_moves(), 0);
    assert_eq!(fixture.files_in("Documents"), vec!["a.txt"]);
    assert_eq!(fixture.files_in("Duplicates").len(), 1);
}

#[test]
fn test_subdirectories_are_left_alone() {
    let fixture = TestFixture::new();
    fixture.create_text_file("projects/notes.txt", "nested");

    let report = fixture.organizer().organize_pass(|_| {}).unwrap();

    assert_eq!(report.total_moves(), 0);
    fixture.assert_file_exists("projects/notes.txt");
}

#[test]
fn test_name_collision_never_overwrites() {
    let fixture = TestFixture::new();
    fixture.create_text_file("Documents/notes.txt", "old notes");
    fixture.create_text_file("notes.txt", "new notes");

    fixture.organizer().organize_pass(|_| {}).unwrap();

    assert_eq!(fixture.files_in("Documents"), vec!["notes (1).txt", "notes.txt"]);
    assert_eq!(
        fs::read_to_string(fixture.path().join("Documents/notes.txt")).unwrap(),
        "old notes"
    );
}

// ============================================================================
// Duplicate Quarantine
// ============================================================================

#[test]
fn test_identical_files_keep_one_copy() {
    let fixture = TestFixture::new();
    for name in ["a.jpg", "b.jpg", "c.pdf", "d.bin"] {
        fixture.create_file(name, b"same bytes everywhere");
    }

    fixture.organizer().organize_pass(|_| {}).unwrap();

    let duplicates = fixture.files_in("Duplicates");
    assert_eq!(fixture.files_in("Images"), vec!["a.jpg"]);
    assert_eq!(duplicates.len(), 3);
    for name in &duplicates {
        let (stamp, _) = name.split_once('_').expect("timestamp prefix");
        assert!(stamp.parse::<i64>().is_ok(), "{name} has no timestamp");
    }
    let mut unique = duplicates.clone();
    unique.dedup();
    assert_eq!(unique.len(), duplicates.len());
}

#[test]
fn test_copy_of_organized_file_is_quarantined() {
    let fixture = TestFixture::new();
    fixture.create_text_file("Documents/contract.pdf", "signed");
    fixture.create_text_file("contract (copy).pdf", "signed");

    let report = fixture.organizer().organize_pass(|_| {}).unwrap();

    assert_eq!(report.quarantined.len(), 1);
    assert_eq!(fixture.files_in("Documents"), vec!["contract.pdf"]);
    assert!(fixture.files_in("Duplicates")[0].ends_with("_contract (copy).pdf"));
}

#[test]
fn test_quarantined_files_are_not_a_reference() {
    let fixture = TestFixture::new();
    fixture.create_text_file("Duplicates/1_old.txt", "content");
    fixture.create_text_file("old.txt", "content");

    fixture.organizer().organize_pass(|_| {}).unwrap();

    fixture.assert_file_exists("Documents/old.txt");
}

#[test]
fn test_empty_files_are_duplicates_of_each_other() {
    let fixture = TestFixture::new();
    fixture.create_files(&[("empty1.txt", b""), ("empty2.txt", b"")]);

    let report = fixture.organizer().organize_pass(|_| {}).unwrap();

    assert_eq!(report.moved.len(), 1);
    assert_eq!(report.quarantined.len(), 1);
}

// ============================================================================
// Custom Rules
// ============================================================================

#[test]
fn test_custom_rule_beats_extension() {
    let fixture = TestFixture::new();
    fixture.create_text_file("invoice_report.txt", "due");
    fixture.create_text_file("report.txt", "plain");
    let rules = RuleSet::parse(r#"{"invoice": "Finance"}"#).unwrap();

    fixture
        .organizer_with(Classifier::with_rules(rules), CompiledFilters::default())
        .organize_pass(|_| {})
        .unwrap();

    fixture.assert_file_exists("Finance/invoice_report.txt");
    fixture.assert_file_exists("Documents/report.txt");
}

#[test]
fn test_first_rule_in_file_order_wins() {
    let fixture = TestFixture::new();
    fixture.create_text_file("tax_invoice.pdf", "x");
    let rules = RuleSet::parse(r#"{"tax": "Taxes", "invoice": "Finance"}"#).unwrap();

    fixture
        .organizer_with(Classifier::with_rules(rules), CompiledFilters::default())
        .organize_pass(|_| {})
        .unwrap();

    fixture.assert_file_exists("Taxes/tax_invoice.pdf");
}

#[test]
fn test_rules_file_loaded_through_context() {
    let home = TestFixture::new();
    let root = TestFixture::new();
    home.create_text_file(".file_organizer_config.json", r#"{"SCAN": "Scans"}"#);
    root.create_text_file("scan_0001.png", "img");
    let ctx = AppContext::init(
        AppPaths::in_home(home.path()),
        None,
        Box::new(MemoryStore::default()),
    )
    .unwrap();

    ctx.organizer(root.path())
        .unwrap()
        .organize_pass(|_| {})
        .unwrap();

    root.assert_file_exists("Scans/scan_0001.png");
}

// ============================================================================
// Dry Run and Filters
// ============================================================================

#[test]
fn test_dry_run_moves_nothing() {
    let fixture = TestFixture::new();
    fixture.create_files(&[("a.txt", b"x"), ("b.txt", b"x"), ("c.mp3", b"y")]);

    let plan = fixture.organizer().plan_pass().unwrap();

    assert_eq!(plan.len(), 3);
    assert_eq!(plan.iter().filter(|p| p.is_duplicate()).count(), 1);
    assert_eq!(fixture.count_files(), 3);
    assert!(fixture.files_in("Documents").is_empty());
}

#[test]
fn test_filters_keep_excluded_files_in_place() {
    let fixture = TestFixture::new();
    fixture.create_text_file("movie.mp4.part", "partial");
    fixture.create_text_file("setup.tmp", "tmp");
    fixture.create_text_file("keep.tmp", "kept");
    fixture.create_text_file(".hidden.txt", "secret");
    fixture.create_text_file("song.mp3", "la");
    let settings = Settings::parse(
        r#"
        [filters]
        enable_hidden_files = false

        [filters.exclude]
        patterns = ["*.part"]
        extensions = ["tmp"]

        [filters.include]
        patterns = ["keep.*"]
        "#,
    )
    .unwrap();

    fixture
        .organizer_with(Classifier::default(), settings.compile_filters().unwrap())
        .organize_pass(|_| {})
        .unwrap();

    fixture.assert_file_exists("movie.mp4.part");
    fixture.assert_file_exists("setup.tmp");
    fixture.assert_file_exists(".hidden.txt");
    fixture.assert_file_exists("Miscellaneous/keep.tmp");
    fixture.assert_file_exists("Media/song.mp3");
}

#[test]
fn test_hidden_files_are_organized_by_default() {
    let fixture = TestFixture::new();
    fixture.create_text_file(".notes.txt", "dot");

    fixture.organizer().organize_pass(|_| {}).unwrap();

    fixture.assert_file_exists("Documents/.notes.txt");
}

// ============================================================================
// Queue Ordering and Concurrent Triggers
// ============================================================================

#[test]
fn test_concurrent_triggers_move_file_once() {
    let fixture = TestFixture::new();
    fixture.create_text_file("fresh.pdf", "new download");
    let file = fixture.canonical("fresh.pdf");
    let worker = Worker::spawn(fixture.organizer()).unwrap();

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let tasks = worker.sender();
            let file = file.clone();
            thread::spawn(move || tasks.submit(Task::ProcessFile(file)).unwrap())
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    worker.submit(Task::OrganizePass).unwrap();

    let mut handled = Vec::new();
    loop {
        match worker.events().recv().unwrap() {
            WorkerEvent::FileHandled { outcome, .. } => handled.push(outcome),
            WorkerEvent::PassFinished(report) => {
                assert_eq!(report.total_moves(), 0);
                break;
            }
            _ => {}
        }
    }
    worker.shutdown();

    // later triggers find the file already gone and are ignored
    assert_eq!(handled.len(), 1);
    assert!(matches!(handled[0], FileOutcome::Moved(_)));
    fixture.assert_file_exists("Documents/fresh.pdf");
    fixture.assert_file_not_exists("fresh.pdf");
    assert!(fixture.files_in("Duplicates").is_empty());
}

#[test]
fn test_vanished_file_is_skipped_not_failed() {
    let fixture = TestFixture::new();
    fixture.create_text_file("gone.txt", "bye");
    let organizer = fixture.organizer();
    let path = fixture.canonical("gone.txt");
    fs::remove_file(&path).unwrap();

    let plan = organizer.plan_pass().unwrap();

    assert!(plan.is_empty());
    assert!(!matches!(
        organizer.process_file(&path),
        FileOutcome::Skipped(SkipReason::Locked) | FileOutcome::Failed(_)
    ));
}

#[test]
fn test_service_pass_reports_progress() {
    let home = TestFixture::new();
    let root = TestFixture::new();
    root.create_files(&[("1.txt", b"1"), ("2.txt", b"2")]);
    let ctx = AppContext::init(
        AppPaths::in_home(home.path()),
        None,
        Box::new(MemoryStore::default()),
    )
    .unwrap();
    let service = Service::start(&ctx, root.path(), ServiceOptions::default()).unwrap();

    service.tasks().submit(Task::OrganizePass).unwrap();
    let mut last = None;
    loop {
        match service.events().recv().unwrap() {
            WorkerEvent::Progress(p) => last = Some(p),
            WorkerEvent::PassFinished(_) => break,
            other => panic!("unexpected event {:?}", other),
        }
    }
    service.shutdown();

    let last = last.expect("progress was reported");
    assert_eq!((last.processed, last.total), (2, 2));
    assert_eq!(root.files_in("Documents"), vec!["1.txt", "2.txt"]);
}

// ============================================================================
// Edge Cases
// ============================================================================

#[test]
fn test_empty_directory() {
    let fixture = TestFixture::new();
    let report = fixture.organizer().organize_pass(|_| {}).unwrap();
    assert_eq!(report.total_moves(), 0);
    assert!(report.is_clean());
}

#[test]
fn test_file_named_like_category_folder() {
    let fixture = TestFixture::new();
    fixture.create_text_file("Miscellaneous", "no extension");
    fixture.create_text_file("data.xyz", "?");

    let report = fixture.organizer().organize_pass(|_| {}).unwrap();

    assert!(report.is_clean());
    assert_eq!(report.moved.len(), 2);
    assert_eq!(
        fixture.files_in("Miscellaneous"),
        vec!["Miscellaneous", "data.xyz"]
    );
    assert_eq!(fixture.count_files(), 0);
}

#[test]
fn test_remembered_root_is_absolute() {
    let home = TestFixture::new();
    let root = TestFixture::new();
    root.create_text_file("inner/keep.txt", "x");
    let ctx = AppContext::init(
        AppPaths::in_home(home.path()),
        None,
        Box::new(MemoryStore::default()),
    )
    .unwrap();

    ctx.resolve_root(Some(&root.path().join("inner").join("..")))
        .unwrap();

    let recalled = ctx.resolve_root(None).unwrap();
    assert!(recalled.is_absolute());
    assert_eq!(recalled, fs::canonicalize(root.path()).unwrap());
}

#[test]
fn test_invalid_root_is_rejected() {
    let result = FileOrganizer::new(
        Path::new("/non/existent/path"),
        Classifier::default(),
        CompiledFilters::default(),
    );
    assert!(result.is_err());
}
