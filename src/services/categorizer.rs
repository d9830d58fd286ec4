//! Routes files from FILES into category subfolders.
//!
//! A file whose move fails for any reason is escalated to Trash under the
//! same unique-naming scheme; nothing is propagated to the caller, the
//! outcome is returned and logged instead.

use super::error::LifecycleError;
use super::naming::{self, DirectoryLocks};
use crate::logging::LogArtifacts;
use crate::metrics::Metrics;
use crate::models::extension_of;
use crate::state::ConfigStore;
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;
use std::sync::{Arc, Mutex};

/// A file being routed: its path, lower-cased extension and parent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagedFile {
    pub path: Utf8PathBuf,
    pub extension: String,
    pub parent: Utf8PathBuf,
}

impl ManagedFile {
    /// `None` for paths without a file name or parent (e.g. `/`).
    pub fn new(path: &Utf8Path) -> Option<Self> {
        let file_name = path.file_name()?;
        let parent = path.parent()?;
        Some(Self {
            path: path.to_path_buf(),
            extension: extension_of(file_name),
            parent: parent.to_path_buf(),
        })
    }

    pub fn file_name(&self) -> &str {
        self.path.file_name().unwrap_or_default()
    }
}

/// What happened to one file.
#[derive(Debug)]
pub enum CategorizeOutcome {
    /// The organizer's own log (or a rotated backup); left in place
    SkippedLog,

    Moved {
        category: String,
        destination: Utf8PathBuf,
    },

    /// The category move failed and the file went to Trash instead
    Trashed {
        destination: Utf8PathBuf,
        error: LifecycleError,
    },

    /// Both the category move and the Trash escalation failed
    Unrouted {
        error: LifecycleError,
        trash_error: LifecycleError,
    },
}

impl CategorizeOutcome {
    pub fn is_moved(&self) -> bool {
        matches!(self, Self::Moved { .. })
    }

    pub fn is_trashed(&self) -> bool {
        matches!(self, Self::Trashed { .. })
    }
}

/// Result of a batch categorization.
#[derive(Debug, Default)]
pub struct CategorizeReport {
    pub outcomes: Vec<(Utf8PathBuf, CategorizeOutcome)>,

    /// Entries skipped because their names are not valid UTF-8
    pub non_utf8_entries: usize,
}

impl CategorizeReport {
    pub fn moved(&self) -> usize {
        self.outcomes.iter().filter(|(_, o)| o.is_moved()).count()
    }

    pub fn trashed(&self) -> usize {
        self.outcomes.iter().filter(|(_, o)| o.is_trashed()).count()
    }

    pub fn unrouted(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, o)| matches!(o, CategorizeOutcome::Unrouted { .. }))
            .count()
    }

    /// True when nothing was moved anywhere.
    pub fn is_noop(&self) -> bool {
        self.moved() == 0 && self.trashed() == 0 && self.unrouted() == 0
    }

    pub fn summary(&self) -> String {
        if self.is_noop() {
            return "Nothing to categorize".to_string();
        }

        let mut parts = vec![format!("{} moved", self.moved())];
        if self.trashed() > 0 {
            parts.push(format!("{} sent to trash", self.trashed()));
        }
        if self.unrouted() > 0 {
            parts.push(format!("{} could not be routed", self.unrouted()));
        }
        parts.join(", ")
    }
}

/// Moves files into `FILES/<category>`.
#[derive(Clone)]
pub struct Categorizer {
    store: ConfigStore,
    locks: Arc<DirectoryLocks>,
    metrics: Arc<Metrics>,

    /// Rebuilt only when the configured log path changes
    log_names: Arc<Mutex<LogArtifacts>>,
}

impl Categorizer {
    pub fn new(store: ConfigStore, locks: Arc<DirectoryLocks>, metrics: Arc<Metrics>) -> Self {
        let log_names = LogArtifacts::new(&store.base_dirs().log);
        Self {
            store,
            locks,
            metrics,
            log_names: Arc::new(Mutex::new(log_names)),
        }
    }

    fn is_log_artifact(&self, log_path: &Utf8Path, file_name: &str) -> bool {
        let mut log_names = self.log_names.lock().unwrap_or_else(|e| e.into_inner());
        if log_names.log_path() != log_path {
            *log_names = LogArtifacts::new(log_path);
        }
        log_names.matches(file_name)
    }

    /// Route one file to its category folder, or to Trash if that fails.
    pub fn move_to_category(&self, path: &Utf8Path) -> CategorizeOutcome {
        let dirs = self.store.base_dirs();

        if let Some(name) = path.file_name() {
            if self.is_log_artifact(&dirs.log, name) {
                return CategorizeOutcome::SkippedLog;
            }
        }

        let categories = self.store.categories();
        let dest_dir;
        let result = match ManagedFile::new(path) {
            Some(file) => {
                let category = categories.category_for(&file.extension).to_string();
                dest_dir = dirs.files.join(&category);
                naming::move_into(&self.locks, &file.path, &dest_dir)
                    .map(|destination| (category, destination))
            }
            None => {
                dest_dir = dirs.files.clone();
                Err(std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    "path has no file name",
                ))
            }
        };

        match result {
            Ok((category, destination)) => {
                tracing::info!(
                    "Moved {} to {}",
                    path.file_name().unwrap_or(path.as_str()),
                    category
                );
                self.metrics.record_categorized();
                CategorizeOutcome::Moved {
                    category,
                    destination,
                }
            }
            Err(source) => {
                let error = LifecycleError::Move {
                    path: path.to_path_buf(),
                    destination: dest_dir,
                    source,
                };
                tracing::error!("Category move error for {}: {}", path, error);
                self.escalate(path, error)
            }
        }
    }

    fn escalate(&self, path: &Utf8Path, error: LifecycleError) -> CategorizeOutcome {
        match self.move_to_trash(path) {
            Ok(destination) => {
                self.metrics.record_trashed();
                CategorizeOutcome::Trashed { destination, error }
            }
            Err(trash_error) => {
                tracing::error!("Trash move error for {}: {}", path, trash_error);
                self.metrics.record_unrouted();
                CategorizeOutcome::Unrouted { error, trash_error }
            }
        }
    }

    /// Move a file into TRASH under a unique name.
    pub fn move_to_trash(&self, path: &Utf8Path) -> Result<Utf8PathBuf, LifecycleError> {
        let trash = self.store.base_dirs().trash;

        let destination = naming::move_into(&self.locks, path, &trash).map_err(|source| {
            LifecycleError::Move {
                path: path.to_path_buf(),
                destination: trash.clone(),
                source,
            }
        })?;

        tracing::info!(
            "Moved to trash: {}",
            path.file_name().unwrap_or(path.as_str())
        );
        Ok(destination)
    }

    /// Categorize the stray top-level files of `dir` (FILES by default).
    ///
    /// Only direct children that are regular files are considered; category
    /// subfolders are never descended into, and a `dir` that is itself a
    /// category folder yields nothing.
    pub fn categorize_directory(
        &self,
        dir: Option<&Utf8Path>,
    ) -> Result<CategorizeReport, LifecycleError> {
        let dirs = self.store.base_dirs();
        let dir = dir.map(Utf8Path::to_path_buf).unwrap_or(dirs.files);
        let mut report = CategorizeReport::default();

        let categories = self.store.categories();
        if dir.file_name().is_some_and(|name| categories.contains(name)) {
            tracing::debug!("{} is a category folder, nothing to rescue", dir);
            return Ok(report);
        }

        let entries = fs::read_dir(&dir).map_err(|source| LifecycleError::Scan {
            path: dir.clone(),
            source,
        })?;

        let mut candidates = Vec::new();
        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!("Skipping unreadable entry in {}: {}", dir, e);
                    continue;
                }
            };

            let Ok(path) = Utf8PathBuf::from_path_buf(entry.path()) else {
                tracing::warn!("Skipping non UTF-8 file name in {}", dir);
                report.non_utf8_entries += 1;
                continue;
            };

            if !path.is_file() {
                continue;
            }
            if path
                .file_name()
                .is_some_and(|name| self.is_log_artifact(&dirs.log, name))
            {
                continue;
            }
            candidates.push(path);
        }
        candidates.sort();

        for path in candidates {
            let outcome = self.move_to_category(&path);
            report.outcomes.push((path, outcome));
        }

        if !report.is_noop() {
            tracing::info!("Categorized {}: {}", dir, report.summary());
        }
        Ok(report)
    }
}
