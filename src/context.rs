//! Everything a run needs, loaded once at startup and passed explicitly.

use crate::classifier::Classifier;
use crate::config::{ConfigError, Settings};
use crate::file_organizer::{FileOrganizer, OrganizeError};
use crate::preview::PreviewGenerator;
use crate::rules::RuleSet;
use crate::schedule::ScheduleConfig;
use crate::secrets::SecretStore;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum ContextError {
    #[error("could not determine the home directory")]
    NoHome,
    #[error("no directory given and none remembered from a previous run")]
    NoRoot,
    #[error("{} is not a directory", .0.display())]
    NotADirectory(PathBuf),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Organize(#[from] OrganizeError),
}

/// Locations of the per-user files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppPaths {
    pub rules_file: PathBuf,
    pub schedule_file: PathBuf,
    pub settings_file: PathBuf,
    pub preview_dir: PathBuf,
}

impl AppPaths {
    /// Standard layout under `home`.
    pub fn in_home(home: &Path) -> Self {
        Self {
            rules_file: home.join(".file_organizer_config.json"),
            schedule_file: home.join(".file_organizer_schedule.json"),
            settings_file: home.join(".config").join("filesorter").join("config.toml"),
            preview_dir: home.join(".file_organizer_previews"),
        }
    }

    /// Standard layout under the current user's home directory.
    pub fn discover() -> Result<Self, ContextError> {
        dirs::home_dir()
            .map(|home| Self::in_home(&home))
            .ok_or(ContextError::NoHome)
    }
}

pub struct AppContext {
    pub paths: AppPaths,
    pub settings: Settings,
    pub rules: RuleSet,
    secrets: Box<dyn SecretStore>,
}

impl AppContext {
    /// Loads settings and custom rules. `explicit_config` must point to a
    /// valid settings file when given; the default one may be missing or
    /// broken.
    pub fn init(
        paths: AppPaths,
        explicit_config: Option<&Path>,
        secrets: Box<dyn SecretStore>,
    ) -> Result<Self, ContextError> {
        let settings = Settings::load(explicit_config, Some(&paths.settings_file))?;
        let rules = RuleSet::load(&paths.rules_file);
        debug!("{} custom rules active", rules.len());

        Ok(Self {
            paths,
            settings,
            rules,
            secrets,
        })
    }

    /// Picks the directory to work on: `requested` if given (and remembers
    /// it), otherwise the one remembered from a previous run.
    pub fn resolve_root(&self, requested: Option<&Path>) -> Result<PathBuf, ContextError> {
        let root = match requested {
            Some(path) => path.to_path_buf(),
            None => self.remembered_root().ok_or(ContextError::NoRoot)?,
        };

        if !root.is_dir() {
            return Err(ContextError::NotADirectory(root));
        }
        // remembered paths must not depend on the cwd
        let root = fs::canonicalize(&root).map_err(|_| ContextError::NotADirectory(root))?;

        if requested.is_some() {
            if let Err(e) = self.secrets.set(&root.to_string_lossy()) {
                warn!("could not remember {}: {}", root.display(), e);
            }
        } else {
            info!("using remembered directory {}", root.display());
        }
        Ok(root)
    }

    fn remembered_root(&self) -> Option<PathBuf> {
        match self.secrets.get() {
            Ok(value) => value.filter(|v| !v.is_empty()).map(PathBuf::from),
            Err(e) => {
                warn!("could not read remembered directory: {}", e);
                None
            }
        }
    }

    pub fn classifier(&self) -> Classifier {
        Classifier::with_rules(self.rules.clone())
    }

    pub fn organizer(&self, root: &Path) -> Result<FileOrganizer, ContextError> {
        let filters = self.settings.compile_filters()?;
        Ok(FileOrganizer::new(root, self.classifier(), filters)?)
    }

    pub fn schedule(&self) -> Option<ScheduleConfig> {
        ScheduleConfig::load(&self.paths.schedule_file)
    }

    pub fn preview_generator(&self) -> PreviewGenerator {
        PreviewGenerator::new(&self.paths.preview_dir)
    }
}
