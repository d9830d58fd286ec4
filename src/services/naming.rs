//! Collision-safe naming and moving.
//!
//! Destination names follow `name.ext`, `name_1.ext`, `name_2.ext`, … and the
//! check-then-move step for one directory is serialized through
//! [`DirectoryLocks`].

use camino::{Utf8Path, Utf8PathBuf};
use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::{self, ErrorKind};
use std::sync::{Arc, Mutex, MutexGuard};

/// First free name for `file_name` according to `is_taken`.
///
/// The stem and extension split at the last dot, as
/// [`Path::file_stem`](std::path::Path::file_stem) does: `report.pdf` becomes
/// `report_1.pdf`, `archive.tar.gz` becomes `archive.tar_1.gz`, and
/// `.bashrc` becomes `.bashrc_1`.
pub fn unique_name<F>(file_name: &str, mut is_taken: F) -> String
where
    F: FnMut(&str) -> bool,
{
    if !is_taken(file_name) {
        return file_name.to_string();
    }

    let path = Utf8Path::new(file_name);
    let stem = path.file_stem().unwrap_or(file_name);
    let extension = path.extension();

    let mut counter: u64 = 1;
    loop {
        let candidate = match extension {
            Some(ext) => format!("{}_{}.{}", stem, counter, ext),
            None => format!("{}_{}", stem, counter),
        };
        if !is_taken(&candidate) {
            return candidate;
        }
        counter += 1;
    }
}

/// First free path for `file_name` inside `dir`.
///
/// Not atomic on its own; hold the directory's lock from [`DirectoryLocks`]
/// until the file has been placed.
pub fn unique_destination(dir: &Utf8Path, file_name: &str) -> Utf8PathBuf {
    let name = unique_name(file_name, |candidate| {
        // symlink_metadata so a dangling link still counts as taken
        dir.join(candidate).symlink_metadata().is_ok()
    });
    dir.join(name)
}

/// One mutex per destination directory.
#[derive(Debug, Default)]
pub struct DirectoryLocks {
    locks: Mutex<HashMap<Utf8PathBuf, Arc<Mutex<()>>>>,
}

impl DirectoryLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock handle for `dir`; lock it with [`DirectoryLock::lock`].
    pub fn for_dir(&self, dir: &Utf8Path) -> DirectoryLock {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        let lock = locks
            .entry(dir.to_path_buf())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        DirectoryLock { lock }
    }
}

/// Shared handle to one directory's mutex.
#[derive(Debug, Clone)]
pub struct DirectoryLock {
    lock: Arc<Mutex<()>>,
}

impl DirectoryLock {
    pub fn lock(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Move `src` into `dir` under the first free variant of its name and return
/// the final path.
///
/// Renames within a volume; across volumes the bytes are copied into a file
/// created with `create_new` (so an existing file is never overwritten), then
/// the source is removed.
pub fn move_into(
    locks: &DirectoryLocks,
    src: &Utf8Path,
    dir: &Utf8Path,
) -> io::Result<Utf8PathBuf> {
    let file_name = src.file_name().ok_or_else(|| {
        io::Error::new(
            ErrorKind::InvalidInput,
            format!("path has no file name: {}", src),
        )
    })?;

    let dir_lock = locks.for_dir(dir);
    let _guard = dir_lock.lock();

    let dest = unique_destination(dir, file_name);
    move_file(src, &dest)?;
    Ok(dest)
}

/// Rename `src` to `dest`, copying when the two are on different volumes.
pub fn move_file(src: &Utf8Path, dest: &Utf8Path) -> io::Result<()> {
    match fs::rename(src, dest) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::CrossesDevices => copy_then_remove(src, dest),
        Err(e) => Err(e),
    }
}

fn copy_then_remove(src: &Utf8Path, dest: &Utf8Path) -> io::Result<()> {
    if src.is_dir() {
        return Err(io::Error::new(
            ErrorKind::InvalidInput,
            format!("cannot copy a directory across volumes: {}", src),
        ));
    }

    let mut reader = fs::File::open(src)?;
    let mut writer = OpenOptions::new().write(true).create_new(true).open(dest)?;

    let copied = io::copy(&mut reader, &mut writer).and_then(|_| writer.sync_all());
    if let Err(e) = copied {
        let _ = fs::remove_file(dest);
        return Err(e);
    }

    if let Ok(meta) = fs::metadata(src) {
        let _ = fs::set_permissions(dest, meta.permissions());
    }

    fs::remove_file(src)
}
