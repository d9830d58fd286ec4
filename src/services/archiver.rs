//! Archival sweep of the OLD directory.
//!
//! Stale files are appended one at a time to a ZIP container in OLD and the
//! original is removed only after its append session has been finished and
//! synced. Containers are only ever appended to.

use super::error::LifecycleError;
use super::naming;
use super::resource_gate::ResourceGate;
use crate::metrics::Metrics;
use crate::state::ConfigStore;
use camino::{Utf8Path, Utf8PathBuf};
use chrono::{Datelike, Local, Timelike};
use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::sync::{Arc, Mutex, TryLockError};
use std::time::{Duration, SystemTime};
use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// Extension that marks a file in OLD as a container
pub const CONTAINER_EXTENSION: &str = "zip";

const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

/// How a sweep ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveStatus {
    /// The resource gate refused; nothing was touched
    Deferred,

    /// Another sweep was already running
    Busy,

    /// No file in OLD was old enough
    NothingToArchive,

    /// The sweep ran against this container
    Completed { container: Utf8PathBuf },
}

#[derive(Debug)]
pub struct ArchiveReport {
    pub status: ArchiveStatus,

    /// Originals that were archived and removed, with their entry names
    pub archived: Vec<(Utf8PathBuf, String)>,

    /// Files left in OLD because their append or removal failed
    pub failures: Vec<(Utf8PathBuf, LifecycleError)>,
}

impl ArchiveReport {
    fn with_status(status: ArchiveStatus) -> Self {
        Self {
            status,
            archived: Vec::new(),
            failures: Vec::new(),
        }
    }

    pub fn container(&self) -> Option<&Utf8Path> {
        match &self.status {
            ArchiveStatus::Completed { container } => Some(container),
            _ => None,
        }
    }

    pub fn summary(&self) -> String {
        match &self.status {
            ArchiveStatus::Deferred => "Archival deferred by resource gate".to_string(),
            ArchiveStatus::Busy => "Archival already in progress".to_string(),
            ArchiveStatus::NothingToArchive => "Nothing to archive".to_string(),
            ArchiveStatus::Completed { container } => format!(
                "{} archived into {}, {} failed",
                self.archived.len(),
                container.file_name().unwrap_or(container.as_str()),
                self.failures.len()
            ),
        }
    }
}

/// Appends stale files from OLD to a growable container.
#[derive(Clone)]
pub struct Archiver {
    store: ConfigStore,
    gate: ResourceGate,
    metrics: Arc<Metrics>,
    sweep: Arc<Mutex<()>>,
}

impl Archiver {
    pub fn new(store: ConfigStore, gate: ResourceGate, metrics: Arc<Metrics>) -> Self {
        Self {
            store,
            gate,
            metrics,
            sweep: Arc::new(Mutex::new(())),
        }
    }

    /// Archive every file in OLD older than `days_threshold` whole days.
    ///
    /// Skipped entirely when the resource gate refuses, and when another
    /// sweep holds the lock. Listing OLD or opening a container are the only
    /// failures returned; per-file failures land in the report.
    pub fn archive_old(&self, days_threshold: u64) -> Result<ArchiveReport, LifecycleError> {
        let _guard = match self.sweep.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::Poisoned(e)) => e.into_inner(),
            Err(TryLockError::WouldBlock) => {
                tracing::debug!("Archival sweep already running, skipping");
                return Ok(ArchiveReport::with_status(ArchiveStatus::Busy));
            }
        };

        if !self.gate.can_perform_io() {
            tracing::info!("Archival deferred: system resources above limits");
            self.metrics.record_deferred();
            return Ok(ArchiveReport::with_status(ArchiveStatus::Deferred));
        }

        let old = self.store.base_dirs().old;
        let candidates = stale_files(&old, days_threshold, SystemTime::now())?;
        if candidates.is_empty() {
            return Ok(ArchiveReport::with_status(ArchiveStatus::NothingToArchive));
        }

        let max_bytes = self.store.schedule().max_archive_bytes;
        let (container, mut entry_names) = open_container(&old, max_bytes)?;
        tracing::info!("Archiving {} file(s) into {}", candidates.len(), container);

        let report = self.archive_into(container, entry_names, candidates);
        tracing::info!("{}", report.summary());
        Ok(report)
    }

    /// Append each candidate to `container`, removing originals that made it
    /// in. A failed file stays in OLD and the sweep continues.
    fn archive_into(
        &self,
        container: Utf8PathBuf,
        mut entry_names: HashSet<String>,
        candidates: Vec<Utf8PathBuf>,
    ) -> ArchiveReport {
        let mut report = ArchiveReport::with_status(ArchiveStatus::Completed {
            container: container.clone(),
        });

        for path in candidates {
            let Some(file_name) = path.file_name() else {
                continue;
            };
            let entry_name = naming::unique_name(file_name, |name| entry_names.contains(name));

            if let Err(source) = append_file(&container, &path, &entry_name) {
                let error = LifecycleError::ArchiveAppend {
                    path: path.clone(),
                    archive: container.clone(),
                    source,
                };
                tracing::error!("{}", error);
                self.metrics.record_archive_failure();
                report.failures.push((path, error));
                continue;
            }
            entry_names.insert(entry_name.clone());

            if let Err(source) = fs::remove_file(&path) {
                let error = LifecycleError::Delete {
                    path: path.clone(),
                    source,
                };
                tracing::error!("Archived but could not remove original: {}", error);
                self.metrics.record_delete_failure();
                report.failures.push((path, error));
                continue;
            }

            tracing::info!("Archived {} as {}", file_name, entry_name);
            self.metrics.record_archived();
            report.archived.push((path, entry_name));
        }

        report
    }
}

fn is_container(path: &Utf8Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case(CONTAINER_EXTENSION))
}

/// Whole days elapsed since `modified`; zero for future timestamps.
pub fn age_in_days(modified: SystemTime, now: SystemTime) -> u64 {
    now.duration_since(modified)
        .unwrap_or(Duration::ZERO)
        .as_secs()
        / SECONDS_PER_DAY
}

/// Regular files directly under `old` that are not containers and whose age
/// exceeds `days_threshold`, oldest first.
fn stale_files(
    old: &Utf8Path,
    days_threshold: u64,
    now: SystemTime,
) -> Result<Vec<Utf8PathBuf>, LifecycleError> {
    let entries = fs::read_dir(old).map_err(|source| LifecycleError::Scan {
        path: old.to_path_buf(),
        source,
    })?;

    let mut stale = Vec::new();
    for entry in entries.flatten() {
        let Ok(path) = Utf8PathBuf::from_path_buf(entry.path()) else {
            tracing::warn!("Skipping non UTF-8 file name in {}", old);
            continue;
        };
        if is_container(&path) {
            continue;
        }

        let Ok(metadata) = entry.metadata() else {
            continue;
        };
        if !metadata.is_file() {
            continue;
        }
        let Ok(modified) = metadata.modified() else {
            continue;
        };

        if age_in_days(modified, now) > days_threshold {
            stale.push((modified, path));
        }
    }

    stale.sort();
    Ok(stale.into_iter().map(|(_, path)| path).collect())
}

/// Most recently modified container in `old`, if any.
fn latest_container(old: &Utf8Path) -> Option<(Utf8PathBuf, fs::Metadata)> {
    fs::read_dir(old)
        .ok()?
        .flatten()
        .filter_map(|entry| {
            let path = Utf8PathBuf::from_path_buf(entry.path()).ok()?;
            let metadata = entry.metadata().ok()?;
            (metadata.is_file() && is_container(&path)).then_some((path, metadata))
        })
        .max_by_key(|(_, metadata)| metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH))
}

/// Pick the container for this sweep and the entry names it already holds.
///
/// Reuses the most recent container unless it has reached `max_bytes` or
/// cannot be read as a ZIP, in which case a new timestamped one is created.
fn open_container(
    old: &Utf8Path,
    max_bytes: Option<u64>,
) -> Result<(Utf8PathBuf, HashSet<String>), LifecycleError> {
    if let Some((path, metadata)) = latest_container(old) {
        let full = max_bytes.is_some_and(|cap| metadata.len() >= cap);
        if full {
            tracing::info!("{} reached the size cap, starting a new archive", path);
        } else {
            match entry_names(&path) {
                Ok(names) => return Ok((path, names)),
                Err(e) => tracing::warn!("Not reusing unreadable archive {}: {}", path, e),
            }
        }
    }

    let name = format!(
        "Archived_{}.{}",
        Local::now().format("%Y%m%d_%H%M%S"),
        CONTAINER_EXTENSION
    );
    let path = naming::unique_destination(old, &name);
    create_container(&path).map_err(|source| LifecycleError::ArchiveContainer {
        archive: path.clone(),
        source,
    })?;
    tracing::info!("Created archive {}", path);
    Ok((path, HashSet::new()))
}

fn entry_names(container: &Utf8Path) -> Result<HashSet<String>, ZipError> {
    let archive = ZipArchive::new(File::open(container)?)?;
    Ok(archive.file_names().map(str::to_string).collect())
}

fn create_container(path: &Utf8Path) -> Result<(), ZipError> {
    let file = OpenOptions::new().write(true).create_new(true).open(path)?;
    let file = ZipWriter::new(file).finish()?;
    file.sync_all()?;
    Ok(())
}

/// Append `path` to `container` as `entry_name` in its own session.
///
/// Returns only after the central directory has been rewritten and the
/// container synced to disk.
fn append_file(container: &Utf8Path, path: &Utf8Path, entry_name: &str) -> Result<(), ZipError> {
    let mut source = File::open(path)?;
    let metadata = source.metadata()?;
    if !metadata.is_file() {
        let message = format!("{path} is not a regular file");
        return Err(io::Error::new(io::ErrorKind::InvalidInput, message).into());
    }

    let file = OpenOptions::new().read(true).write(true).open(container)?;
    let mut writer = ZipWriter::new_append(file)?;

    writer.start_file(entry_name, entry_options(&metadata))?;
    if let Err(e) = io::copy(&mut source, &mut writer) {
        let _ = writer.abort_file();
        return Err(e.into());
    }

    let file = writer.finish()?;
    file.sync_all()?;
    Ok(())
}

fn entry_options(metadata: &fs::Metadata) -> SimpleFileOptions {
    let mut options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .large_file(metadata.len() >= u64::from(u32::MAX));

    if let Ok(modified) = metadata.modified() {
        let local: chrono::DateTime<Local> = modified.into();
        // ZIP timestamps cannot represent years before 1980
        if let Ok(stamp) = zip::DateTime::from_date_and_time(
            u16::try_from(local.year()).unwrap_or(1980),
            local.month() as u8,
            local.day() as u8,
            local.hour() as u8,
            local.minute() as u8,
            local.second() as u8,
        ) {
            options = options.last_modified_time(stamp);
        }
    }
    options
}
