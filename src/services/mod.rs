//! Services module - the file lifecycle engine.
//!
//! Everything here is synchronous filesystem work except the watcher, which
//! owns a tokio task. Services hold a [`ConfigStore`](crate::state::ConfigStore)
//! handle and re-read directories on every call.
//!
//! # Components
//!
//! - [`bootstrap`]: creates OLD, TRASH, FILES, the log parent and one folder
//!   per category.
//! - [`ResourceGate`]: system-wide CPU/RAM check in front of I/O-heavy work.
//! - [`Categorizer`]: moves a file to `FILES/<category>` under a unique name,
//!   escalating to Trash when the move fails.
//! - [`Archiver`]: appends stale files from OLD to a ZIP container, deleting
//!   each original only once its append is on disk.
//! - [`TrashReaper`]: purges Trash entries older than a day.
//! - [`EventWatcher`]: feeds newly created files in FILES to the categorizer.
//! - [`search`]: accent-insensitive file name search.
//!
//! Per-item failures are collected in the batch reports
//! ([`CategorizeReport`], [`ArchiveReport`], [`TrashReport`]); only
//! bootstrap failures are meant to stop the agent.

pub mod archiver;
pub mod bootstrap;
pub mod categorizer;
pub mod error;
pub mod naming;
pub mod resource_gate;
pub mod search;
pub mod trash;
pub mod watcher;

pub use archiver::{ArchiveReport, ArchiveStatus, Archiver};
pub use bootstrap::create_directories;
pub use categorizer::{CategorizeOutcome, CategorizeReport, Categorizer, ManagedFile};
pub use error::LifecycleError;
pub use naming::DirectoryLocks;
pub use resource_gate::{ResourceGate, ResourceSample, ResourceSampler, SystemSampler};
pub use trash::{TRASH_RETENTION, TrashReaper, TrashReport};
pub use watcher::{EventWatcher, WatchHandle};
