//! TOML settings: file filters, watcher debounce and scheduler polling.
//!
//! Filters decide which top-level files an organize pass touches at all. They
//! support several strategies:
//! - Exact filename matching
//! - Glob pattern matching
//! - File extension matching
//! - Regex pattern matching
//! - Include (whitelist) rules that override exclude rules
//!
//! # Configuration File Format
//!
//! ```toml
//! [filters]
//! enable_hidden_files = true
//!
//! [filters.exclude]
//! filenames = [".DS_Store", "Thumbs.db"]
//! patterns = ["*.part", "*.crdownload"]
//! extensions = ["tmp"]
//! regex = []
//!
//! [filters.include]
//! patterns = []
//!
//! [watch]
//! debounce_ms = 500
//!
//! [schedule]
//! poll_interval_secs = 60
//! ```
//!
//! Every section and key is optional.

use glob::Pattern;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Errors that can occur while loading or compiling settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration file not found at the specified path.
    #[error("configuration file not found: {}", .0.display())]
    ConfigNotFound(PathBuf),
    /// Invalid TOML syntax or structure.
    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),
    /// Invalid glob pattern provided.
    #[error("invalid glob pattern '{pattern}': {reason}")]
    InvalidGlobPattern { pattern: String, reason: String },
    /// Invalid regex pattern provided.
    #[error("invalid regex pattern '{pattern}': {reason}")]
    InvalidRegexPattern { pattern: String, reason: String },
    /// IO error while reading configuration.
    #[error("IO error reading configuration {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Root of the settings file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub filters: FilterRules,
    #[serde(default)]
    pub watch: WatchSettings,
    #[serde(default)]
    pub schedule: ScheduleSettings,
}

/// Which top-level files are eligible for organizing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterRules {
    /// Whether files starting with "." are organized. Defaults to true.
    #[serde(default = "default_enable_hidden_files")]
    pub enable_hidden_files: bool,

    #[serde(default)]
    pub exclude: ExcludeRules,

    /// Whitelist, overrides exclude rules.
    #[serde(default)]
    pub include: IncludeRules,
}

fn default_enable_hidden_files() -> bool {
    true
}

impl Default for FilterRules {
    fn default() -> Self {
        Self {
            enable_hidden_files: default_enable_hidden_files(),
            exclude: ExcludeRules::default(),
            include: IncludeRules::default(),
        }
    }
}

/// Rules for leaving files where they are.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExcludeRules {
    /// Exact filenames (e.g. "desktop.ini").
    #[serde(default)]
    pub filenames: Vec<String>,

    /// Glob patterns matched against the file name (e.g. "*.part").
    #[serde(default)]
    pub patterns: Vec<String>,

    /// Extensions without the dot, case-insensitive.
    #[serde(default)]
    pub extensions: Vec<String>,

    #[serde(default)]
    pub regex: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IncludeRules {
    #[serde(default)]
    pub patterns: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchSettings {
    /// Quiet period before a burst of filesystem events is delivered.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

fn default_debounce_ms() -> u64 {
    500
}

impl Default for WatchSettings {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
        }
    }
}

impl WatchSettings {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleSettings {
    /// How often the scheduler checks whether a run is due.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
}

fn default_poll_interval_secs() -> u64 {
    60
}

impl Default for ScheduleSettings {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
        }
    }
}

impl ScheduleSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }
}

impl Settings {
    /// Loads settings.
    ///
    /// An `explicit` path must exist and parse, otherwise an error is
    /// returned. Without one, `default_path` is tried; a missing or broken
    /// default file falls back to defaults with a warning.
    pub fn load(explicit: Option<&Path>, default_path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::load_from_file(path);
        }

        let Some(path) = default_path else {
            return Ok(Self::default());
        };
        if !path.exists() {
            debug!("no settings file at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        match Self::load_from_file(path) {
            Ok(settings) => Ok(settings),
            Err(e) => {
                warn!("{}; using default settings", e);
                Ok(Self::default())
            }
        }
    }

    /// Load settings from a specific file.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::ConfigNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::ConfigInvalid(e.to_string()))
    }

    /// Compiles the filter rules for matching.
    pub fn compile_filters(&self) -> Result<CompiledFilters, ConfigError> {
        CompiledFilters::new(&self.filters)
    }
}

/// Filter rules with every pattern pre-compiled.
#[derive(Debug, Clone)]
pub struct CompiledFilters {
    enable_hidden_files: bool,
    exclude_filenames: HashSet<String>,
    exclude_extensions: HashSet<String>,
    exclude_patterns: Vec<Pattern>,
    exclude_regexes: Vec<Regex>,
    include_patterns: Vec<Pattern>,
}

impl Default for CompiledFilters {
    /// Accepts every file.
    fn default() -> Self {
        Self {
            enable_hidden_files: true,
            exclude_filenames: HashSet::new(),
            exclude_extensions: HashSet::new(),
            exclude_patterns: Vec::new(),
            exclude_regexes: Vec::new(),
            include_patterns: Vec::new(),
        }
    }
}

fn compile_globs(patterns: &[String]) -> Result<Vec<Pattern>, ConfigError> {
    patterns
        .iter()
        .map(|pattern| {
            Pattern::new(pattern).map_err(|e| ConfigError::InvalidGlobPattern {
                pattern: pattern.clone(),
                reason: e.to_string(),
            })
        })
        .collect()
}

impl CompiledFilters {
    pub fn new(rules: &FilterRules) -> Result<Self, ConfigError> {
        let exclude_regexes = rules
            .exclude
            .regex
            .iter()
            .map(|pattern| {
                Regex::new(pattern).map_err(|e| ConfigError::InvalidRegexPattern {
                    pattern: pattern.clone(),
                    reason: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            enable_hidden_files: rules.enable_hidden_files,
            exclude_filenames: rules.exclude.filenames.iter().cloned().collect(),
            exclude_extensions: rules
                .exclude
                .extensions
                .iter()
                .map(|ext| ext.trim_start_matches('.').to_lowercase())
                .collect(),
            exclude_patterns: compile_globs(&rules.exclude.patterns)?,
            exclude_regexes,
            include_patterns: compile_globs(&rules.include.patterns)?,
        })
    }

    /// Whether the file at `file_path` should be organized.
    ///
    /// Checked in order, first decision wins:
    /// 1. Include patterns
    /// 2. Hidden file switch
    /// 3. Exact filename
    /// 4. Extension
    /// 5. Glob patterns
    /// 6. Regex patterns
    pub fn should_include(&self, file_path: &Path) -> bool {
        let file_name = file_path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default();

        if self.include_patterns.iter().any(|p| p.matches(&file_name)) {
            return true;
        }

        if !self.enable_hidden_files && file_name.starts_with('.') {
            return false;
        }

        if self.exclude_filenames.contains(file_name.as_ref()) {
            return false;
        }

        if let Some(ext) = file_path.extension()
            && self
                .exclude_extensions
                .contains(&ext.to_string_lossy().to_lowercase())
        {
            return false;
        }

        if self.exclude_patterns.iter().any(|p| p.matches(&file_name)) {
            return false;
        }

        !self.exclude_regexes.iter().any(|r| r.is_match(&file_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn compile(toml_text: &str) -> CompiledFilters {
        Settings::parse(toml_text)
            .expect("Failed to parse settings")
            .compile_filters()
            .expect("Failed to compile filters")
    }

    #[test]
    fn test_defaults_accept_everything() {
        let compiled = Settings::default().compile_filters().unwrap();
        assert!(compiled.should_include(Path::new("/r/.DS_Store")));
        assert!(compiled.should_include(Path::new("/r/photo.png")));
    }

    #[test]
    fn test_default_durations() {
        let settings = Settings::default();
        assert_eq!(settings.watch.debounce(), Duration::from_millis(500));
        assert_eq!(settings.schedule.poll_interval(), Duration::from_secs(60));
    }

    #[test]
    fn test_empty_document_is_valid() {
        let settings = Settings::parse("").unwrap();
        assert!(settings.filters.enable_hidden_files);
        assert_eq!(settings.watch.debounce_ms, 500);
    }

    #[test]
    fn test_hidden_files_can_be_disabled() {
        let compiled = compile("[filters]\nenable_hidden_files = false\n");
        assert!(!compiled.should_include(Path::new(".DS_Store")));
        assert!(compiled.should_include(Path::new("visible.txt")));
    }

    #[test]
    fn test_exclude_exact_filename() {
        let compiled = compile("[filters.exclude]\nfilenames = [\"Thumbs.db\"]\n");
        assert!(!compiled.should_include(Path::new("/r/Thumbs.db")));
        assert!(compiled.should_include(Path::new("/r/image.jpg")));
    }

    #[test]
    fn test_exclude_extensions_case_insensitive() {
        let compiled = compile("[filters.exclude]\nextensions = [\"part\", \".TMP\"]\n");
        assert!(!compiled.should_include(Path::new("movie.mp4.part")));
        assert!(!compiled.should_include(Path::new("file.PART")));
        assert!(!compiled.should_include(Path::new("file.tmp")));
        assert!(compiled.should_include(Path::new("file.txt")));
    }

    #[test]
    fn test_exclude_glob_matches_file_name_not_parent() {
        let compiled = compile("[filters.exclude]\npatterns = [\"*.crdownload\"]\n");
        assert!(!compiled.should_include(Path::new("/home/me/Downloads/x.crdownload")));
        assert!(compiled.should_include(Path::new("/home/me/x.crdownload.d/a.txt")));
    }

    #[test]
    fn test_exclude_regex() {
        let compiled = compile("[filters.exclude]\nregex = ['^~\\$']\n");
        assert!(!compiled.should_include(Path::new("~$budget.xlsx")));
        assert!(compiled.should_include(Path::new("budget.xlsx")));
    }

    #[test]
    fn test_include_overrides_exclude() {
        let compiled = compile(
            "[filters]\nenable_hidden_files = false\n[filters.include]\npatterns = [\".keep*\"]\n",
        );
        assert!(compiled.should_include(Path::new(".keepme")));
        assert!(!compiled.should_include(Path::new(".other")));
    }

    #[test]
    fn test_invalid_patterns_return_errors() {
        let bad_regex = Settings::parse("[filters.exclude]\nregex = [\"[invalid(\"]\n").unwrap();
        assert!(matches!(
            bad_regex.compile_filters(),
            Err(ConfigError::InvalidRegexPattern { .. })
        ));

        let bad_glob = Settings::parse("[filters.exclude]\npatterns = [\"[invalid\"]\n").unwrap();
        assert!(matches!(
            bad_glob.compile_filters(),
            Err(ConfigError::InvalidGlobPattern { .. })
        ));
    }

    #[test]
    fn test_invalid_toml_is_config_invalid() {
        assert!(matches!(
            Settings::parse("[filters"),
            Err(ConfigError::ConfigInvalid(_))
        ));
    }

    #[test]
    fn test_explicit_missing_file_is_an_error() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let missing = temp_dir.path().join("nope.toml");
        assert!(matches!(
            Settings::load(Some(&missing), None),
            Err(ConfigError::ConfigNotFound(_))
        ));
    }

    #[test]
    fn test_broken_default_file_falls_back() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("config.toml");
        fs::write(&path, "[watch]\ndebounce_ms = \"soon\"\n").unwrap();

        let settings = Settings::load(None, Some(&path)).unwrap();
        assert_eq!(settings.watch.debounce_ms, 500);
    }

    #[test]
    fn test_default_file_is_read() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("config.toml");
        fs::write(&path, "[schedule]\npoll_interval_secs = 5\n").unwrap();

        let settings = Settings::load(None, Some(&path)).unwrap();
        assert_eq!(settings.schedule.poll_interval(), Duration::from_secs(5));
    }
}
