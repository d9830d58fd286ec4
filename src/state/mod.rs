// Configuration store
//
// Wraps OrganizerConfig with thread-safe access using Arc<RwLock<T>> and emits
// change events so the agent can react to settings edits.

use crate::models::{BaseDirs, CategoryTable, OrganizerConfig, ResourceLimits, Schedule};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::broadcast;

/// Change events emitted when the configuration is modified
#[derive(Clone, Debug, PartialEq)]
pub enum ConfigChange {
    /// One or more of OLD/TRASH/FILES/LOG moved
    DirectoriesChanged,

    /// CPU or RAM ceiling changed
    ResourceLimitsChanged { max_cpu_percent: u8, max_ram_percent: u8 },

    /// Sweep interval, archive age or archive cap changed
    ScheduleChanged,

    /// Debug logging toggled
    DebugModeChanged { enabled: bool },
}

/// Single source of truth for paths, limits and categories.
///
/// - [`read()`](Self::read) / [`snapshot()`](Self::snapshot) for readers
/// - [`update()`](Self::update) is the only mutation entry point; it holds the
///   write lock for the whole closure, so readers never see a half-applied edit
/// - [`subscribe()`](Self::subscribe) for change notifications
///
/// Services call the accessors once per operation and never keep the
/// returned values beyond it.
pub struct ConfigStore {
    config: Arc<RwLock<OrganizerConfig>>,

    /// Built once; not editable at runtime
    categories: Arc<CategoryTable>,

    change_tx: broadcast::Sender<ConfigChange>,
}

impl ConfigStore {
    /// Create a store with the built-in category table
    pub fn new(config: OrganizerConfig) -> Self {
        Self::with_categories(config, CategoryTable::default())
    }

    pub fn with_categories(config: OrganizerConfig, categories: CategoryTable) -> Self {
        let (change_tx, _) = broadcast::channel(100);
        Self {
            config: Arc::new(RwLock::new(config)),
            categories: Arc::new(categories),
            change_tx,
        }
    }

    fn read_guard(&self) -> RwLockReadGuard<'_, OrganizerConfig> {
        // A panicking writer cannot leave a torn value behind: update() only
        // publishes after the closure returns, so the poisoned data is usable.
        self.config.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_guard(&self) -> RwLockWriteGuard<'_, OrganizerConfig> {
        self.config.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Clone of the whole configuration
    pub fn snapshot(&self) -> OrganizerConfig {
        self.read_guard().clone()
    }

    /// Execute a function with read access to the configuration
    pub fn read<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&OrganizerConfig) -> R,
    {
        let config = self.read_guard();
        f(&config)
    }

    pub fn base_dirs(&self) -> BaseDirs {
        self.read(|c| c.base_dirs.clone())
    }

    pub fn resource_limits(&self) -> ResourceLimits {
        self.read(|c| c.resource_limits)
    }

    pub fn schedule(&self) -> Schedule {
        self.read(|c| c.schedule)
    }

    pub fn categories(&self) -> Arc<CategoryTable> {
        Arc::clone(&self.categories)
    }

    /// Apply a mutation and emit change events
    ///
    /// The edit is applied to a copy and committed only if it still validates;
    /// a rejected edit leaves the store untouched and returns the reason.
    pub fn update<F>(&self, update_fn: F) -> Result<Vec<ConfigChange>, String>
    where
        F: FnOnce(&mut OrganizerConfig),
    {
        let mut config = self.write_guard();
        let mut edited = config.clone();

        update_fn(&mut edited);
        edited.validate()?;

        let changes = Self::detect_changes(&config, &edited);
        *config = edited;
        drop(config);

        for change in &changes {
            // No subscribers is fine
            let _ = self.change_tx.send(change.clone());
        }

        Ok(changes)
    }

    /// Replace the whole configuration, e.g. after reloading the settings file
    pub fn replace(&self, config: OrganizerConfig) -> Result<Vec<ConfigChange>, String> {
        self.update(move |current| *current = config)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ConfigChange> {
        self.change_tx.subscribe()
    }

    fn detect_changes(old: &OrganizerConfig, new: &OrganizerConfig) -> Vec<ConfigChange> {
        let mut changes = Vec::new();

        if old.base_dirs != new.base_dirs {
            changes.push(ConfigChange::DirectoriesChanged);
        }

        if old.resource_limits != new.resource_limits {
            changes.push(ConfigChange::ResourceLimitsChanged {
                max_cpu_percent: new.resource_limits.max_cpu_percent,
                max_ram_percent: new.resource_limits.max_ram_percent,
            });
        }

        if old.schedule != new.schedule {
            changes.push(ConfigChange::ScheduleChanged);
        }

        if old.debug_mode != new.debug_mode {
            changes.push(ConfigChange::DebugModeChanged {
                enabled: new.debug_mode,
            });
        }

        changes
    }
}

impl Default for ConfigStore {
    fn default() -> Self {
        Self::new(OrganizerConfig::default())
    }
}

// Clones share the same configuration and channel
impl Clone for ConfigStore {
    fn clone(&self) -> Self {
        Self {
            config: Arc::clone(&self.config),
            categories: Arc::clone(&self.categories),
            change_tx: self.change_tx.clone(),
        }
    }
}
