//! Integration tests for the archival sweep of OLD
//!
//! These tests verify:
//! - Only files older than the threshold are archived and removed
//! - A second sweep appends to the same container
//! - Entry name collisions inside a container are numbered
//! - A refused resource gate leaves OLD untouched

use camino::{Utf8Path, Utf8PathBuf};
use filekeeper::services::archiver::ArchiveStatus;
use filekeeper::services::{ResourceSample, ResourceSampler};
use filekeeper::{BaseDirs, ConfigStore, LifecycleError, Organizer, OrganizerConfig};
use filetime::FileTime;
use std::fs::{self, File};
use std::io::Read;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tempfile::TempDir;
use zip::ZipArchive;

const DAY: Duration = Duration::from_secs(24 * 60 * 60);

struct FixedSampler {
    cpu_percent: f32,
}

impl ResourceSampler for FixedSampler {
    fn sample(&self) -> Result<ResourceSample, LifecycleError> {
        Ok(ResourceSample {
            cpu_percent: self.cpu_percent,
            ram_percent: 10.0,
        })
    }
}

fn setup_with(
    cpu_percent: f32,
    max_archive_bytes: Option<u64>,
) -> (TempDir, Organizer, Utf8PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let root = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
    let mut config = OrganizerConfig::default();
    config.base_dirs = BaseDirs::under(&root);
    config.schedule.max_archive_bytes = max_archive_bytes;

    let organizer = Organizer::with_sampler(
        ConfigStore::new(config),
        Arc::new(FixedSampler { cpu_percent }),
    );
    organizer.create_directories().unwrap();
    let old = organizer.store().base_dirs().old;
    (temp_dir, organizer, old)
}

fn setup() -> (TempDir, Organizer, Utf8PathBuf) {
    setup_with(5.0, None)
}

fn write_aged(path: &Utf8Path, contents: &str, age: Duration) {
    fs::write(path, contents).unwrap();
    let mtime = FileTime::from_system_time(SystemTime::now() - age);
    filetime::set_file_mtime(path, mtime).unwrap();
}

fn containers(old: &Utf8Path) -> Vec<Utf8PathBuf> {
    let mut found: Vec<Utf8PathBuf> = fs::read_dir(old)
        .unwrap()
        .map(|e| Utf8PathBuf::try_from(e.unwrap().path()).unwrap())
        .filter(|p| p.extension() == Some("zip"))
        .collect();
    found.sort();
    found
}

fn entry(container: &Utf8Path, name: &str) -> String {
    let mut archive = ZipArchive::new(File::open(container).unwrap()).unwrap();
    let mut file = archive.by_name(name).unwrap();
    let mut contents = String::new();
    file.read_to_string(&mut contents).unwrap();
    contents
}

#[test]
fn test_archives_only_stale_files() {
    let (_temp_dir, organizer, old) = setup();
    write_aged(&old.join("ancient.txt"), "ancient", DAY * 45);
    write_aged(&old.join("stale.log"), "stale", DAY * 31 + Duration::from_secs(60));
    write_aged(&old.join("recent.txt"), "recent", DAY * 2);

    let report = organizer.archive_old(30).unwrap();

    assert_eq!(report.archived.len(), 2);
    assert!(report.failures.is_empty());
    assert!(!old.join("ancient.txt").exists());
    assert!(!old.join("stale.log").exists());
    assert!(old.join("recent.txt").exists());

    let container = report.container().unwrap().to_path_buf();
    assert_eq!(containers(&old), vec![container.clone()]);
    assert!(container.file_name().unwrap().starts_with("Archived_"));
    assert_eq!(entry(&container, "ancient.txt"), "ancient");
    assert_eq!(entry(&container, "stale.log"), "stale");
}

#[test]
fn test_exactly_threshold_days_is_not_archived() {
    let (_temp_dir, organizer, old) = setup();
    write_aged(&old.join("borderline.txt"), "b", DAY * 30 + Duration::from_secs(60));

    let report = organizer.archive_old(30).unwrap();

    assert_eq!(report.status, ArchiveStatus::NothingToArchive);
    assert!(old.join("borderline.txt").exists());
    assert!(containers(&old).is_empty());
}

#[test]
fn test_second_sweep_reuses_container() {
    let (_temp_dir, organizer, old) = setup();
    write_aged(&old.join("first.txt"), "first", DAY * 40);
    let first = organizer.archive_old(30).unwrap();

    write_aged(&old.join("second.txt"), "second", DAY * 40);
    let second = organizer.archive_old(30).unwrap();

    assert_eq!(first.container(), second.container());
    let all = containers(&old);
    assert_eq!(all.len(), 1);
    assert_eq!(entry(&all[0], "first.txt"), "first");
    assert_eq!(entry(&all[0], "second.txt"), "second");
}

#[test]
fn test_duplicate_entry_names_are_numbered() {
    let (_temp_dir, organizer, old) = setup();
    write_aged(&old.join("notes.txt"), "v1", DAY * 40);
    organizer.archive_old(30).unwrap();

    write_aged(&old.join("notes.txt"), "v2", DAY * 40);
    let report = organizer.archive_old(30).unwrap();

    assert_eq!(report.archived[0].1, "notes_1.txt");
    let container = report.container().unwrap();
    assert_eq!(entry(container, "notes.txt"), "v1");
    assert_eq!(entry(container, "notes_1.txt"), "v2");
}

#[test]
fn test_existing_containers_are_not_archived() {
    let (_temp_dir, organizer, old) = setup();
    write_aged(&old.join("a.txt"), "a", DAY * 40);
    let first = organizer.archive_old(30).unwrap();
    let container = first.container().unwrap().to_path_buf();
    filetime::set_file_mtime(
        &container,
        FileTime::from_system_time(SystemTime::now() - DAY * 90),
    )
    .unwrap();

    write_aged(&old.join("b.txt"), "b", DAY * 40);
    let second = organizer.archive_old(30).unwrap();

    assert_eq!(second.archived.len(), 1);
    assert_eq!(second.container(), Some(container.as_path()));
    assert!(container.exists());
}

#[test]
fn test_size_cap_starts_new_container() {
    let (_temp_dir, organizer, old) = setup_with(5.0, Some(1));
    write_aged(&old.join("a.txt"), "a", DAY * 40);
    let first = organizer.archive_old(30).unwrap();

    write_aged(&old.join("b.txt"), "b", DAY * 40);
    let second = organizer.archive_old(30).unwrap();

    assert_ne!(first.container(), second.container());
    assert_eq!(containers(&old).len(), 2);
}

#[test]
fn test_gate_refusal_touches_nothing() {
    let (_temp_dir, organizer, old) = setup_with(95.0, None);
    write_aged(&old.join("ancient.txt"), "ancient", DAY * 45);

    let report = organizer.archive_old(30).unwrap();

    assert_eq!(report.status, ArchiveStatus::Deferred);
    assert!(old.join("ancient.txt").exists());
    assert!(containers(&old).is_empty());
}

#[test]
fn test_empty_old_is_noop() {
    let (_temp_dir, organizer, old) = setup();

    let report = organizer.archive_old(30).unwrap();

    assert_eq!(report.status, ArchiveStatus::NothingToArchive);
    assert!(containers(&old).is_empty());
}
