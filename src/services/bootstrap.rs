use super::error::LifecycleError;
use crate::models::{BaseDirs, CategoryTable};
use camino::Utf8Path;
use std::fs;

/// Create the managed directory tree.
///
/// OLD, TRASH and FILES are created recursively, the LOG entry only gets its
/// parent, and FILES gets one subdirectory per category. Existing
/// directories are left alone, so this is safe to call again after a
/// settings change.
pub fn create_directories(
    dirs: &BaseDirs,
    categories: &CategoryTable,
) -> Result<(), LifecycleError> {
    for dir in dirs.directories() {
        ensure_dir(dir)?;
    }

    for category in categories.names() {
        ensure_dir(&dirs.files.join(category))?;
    }

    tracing::debug!(
        "Directory tree ready: old={}, trash={}, files={} ({} categories)",
        dirs.old,
        dirs.trash,
        dirs.files,
        categories.len()
    );
    Ok(())
}

fn ensure_dir(path: &Utf8Path) -> Result<(), LifecycleError> {
    fs::create_dir_all(path).map_err(|source| LifecycleError::Bootstrap {
        path: path.to_path_buf(),
        source,
    })
}
