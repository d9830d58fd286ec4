use super::error::LifecycleError;
use crate::metrics::Metrics;
use crate::state::ConfigStore;
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

/// How long an entry stays in Trash before it may be purged
pub const TRASH_RETENTION: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Default)]
pub struct TrashReport {
    pub purged: Vec<Utf8PathBuf>,
    pub retained: usize,
    pub failures: Vec<(Utf8PathBuf, LifecycleError)>,
}

impl TrashReport {
    pub fn summary(&self) -> String {
        format!(
            "Trash: {} purged, {} retained, {} failed",
            self.purged.len(),
            self.retained,
            self.failures.len()
        )
    }
}

/// Whether an entry last modified at `modified` has outlived the retention
/// window. Timestamps in the future never qualify.
pub fn is_expired(modified: SystemTime, now: SystemTime) -> bool {
    now.duration_since(modified)
        .is_ok_and(|age| age > TRASH_RETENTION)
}

/// Permanently deletes expired Trash entries.
#[derive(Clone)]
pub struct TrashReaper {
    store: ConfigStore,
    metrics: Arc<Metrics>,
}

impl TrashReaper {
    pub fn new(store: ConfigStore, metrics: Arc<Metrics>) -> Self {
        Self { store, metrics }
    }

    /// Delete every direct Trash entry older than [`TRASH_RETENTION`].
    ///
    /// Directories are removed recursively. A failed deletion is recorded
    /// and the sweep moves on to the next entry.
    pub fn clean_trash(&self) -> Result<TrashReport, LifecycleError> {
        self.clean_trash_at(SystemTime::now())
    }

    /// [`clean_trash`](Self::clean_trash) against an explicit clock.
    pub fn clean_trash_at(&self, now: SystemTime) -> Result<TrashReport, LifecycleError> {
        let trash = self.store.base_dirs().trash;
        let entries = list_entries(&trash)?;
        Ok(self.purge(entries, now))
    }

    fn purge(&self, entries: Vec<TrashEntry>, now: SystemTime) -> TrashReport {
        let mut report = TrashReport::default();

        for entry in entries {
            let expired = entry.modified.is_some_and(|modified| is_expired(modified, now));
            if !expired {
                report.retained += 1;
                continue;
            }

            match remove_entry(&entry.path, entry.is_dir) {
                Ok(()) => {
                    tracing::info!(
                        "Deleted from trash: {}",
                        entry.path.file_name().unwrap_or(entry.path.as_str())
                    );
                    self.metrics.record_purged();
                    report.purged.push(entry.path);
                }
                Err(source) => {
                    let error = LifecycleError::Delete {
                        path: entry.path.clone(),
                        source,
                    };
                    tracing::error!("{}", error);
                    self.metrics.record_delete_failure();
                    report.failures.push((entry.path, error));
                }
            }
        }

        if !report.purged.is_empty() || !report.failures.is_empty() {
            tracing::info!("{}", report.summary());
        }
        report
    }
}

/// A direct child of TRASH as seen when the sweep listed it.
#[derive(Debug, Clone)]
struct TrashEntry {
    path: Utf8PathBuf,
    is_dir: bool,
    modified: Option<SystemTime>,
}

fn list_entries(trash: &Utf8Path) -> Result<Vec<TrashEntry>, LifecycleError> {
    let entries = fs::read_dir(trash).map_err(|source| LifecycleError::Scan {
        path: trash.to_path_buf(),
        source,
    })?;

    let mut listed = Vec::new();
    for entry in entries.flatten() {
        let Ok(path) = Utf8PathBuf::from_path_buf(entry.path()) else {
            tracing::warn!("Skipping non UTF-8 file name in {}", trash);
            continue;
        };

        // symlink_metadata: a link is judged and removed as itself
        let metadata = match path.symlink_metadata() {
            Ok(metadata) => metadata,
            Err(e) => {
                tracing::warn!("Cannot stat {}: {}", path, e);
                continue;
            }
        };

        listed.push(TrashEntry {
            is_dir: metadata.is_dir(),
            modified: metadata.modified().ok(),
            path,
        });
    }

    listed.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(listed)
}

fn remove_entry(path: &Utf8Path, is_dir: bool) -> std::io::Result<()> {
    if is_dir {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    }
}
