//! Data models for the FileKeeper agent.
//!
//! - [`OrganizerConfig`]: directories, resource limits and sweep schedule, persisted as YAML
//! - [`CategoryTable`]: the fixed category → extensions table and its derived extension index
//!
//! Both are owned by [`ConfigStore`](crate::state::ConfigStore); services read them
//! through the store for the duration of one operation only.

pub mod categories;
pub mod config;

pub use categories::{CategoryTable, FALLBACK_CATEGORY, extension_of};
pub use config::{BaseDirs, DEFAULT_LOG_FILE_NAME, OrganizerConfig, ResourceLimits, Schedule};
