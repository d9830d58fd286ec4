// FileKeeper - background file lifecycle agent
//
// This is the library crate containing the lifecycle engine and its
// configuration. The binary crate (main.rs) runs it as a long-lived agent.

pub mod agent;
pub mod config;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod organizer;
pub mod services;
pub mod state;

// Re-export commonly used types for convenience
pub use agent::{Agent, AgentHandle};
pub use config::ConfigManager;
pub use models::{BaseDirs, CategoryTable, OrganizerConfig};
pub use organizer::{Organizer, SweepReport};
pub use services::LifecycleError;
pub use state::{ConfigChange, ConfigStore};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
