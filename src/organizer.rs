// Organizer facade
//
// The public operations callers (binary, scheduler, a settings front end)
// invoke. Wires one ConfigStore, one ResourceGate, one set of directory locks
// and one Metrics instance through every service.

use crate::metrics::Metrics;
use crate::models::OrganizerConfig;
use crate::services::search;
use crate::services::{
    ArchiveReport, Archiver, CategorizeOutcome, CategorizeReport, Categorizer, DirectoryLocks,
    EventWatcher, LifecycleError, ResourceGate, ResourceSampler, TrashReaper, TrashReport,
    create_directories,
};
use crate::state::{ConfigChange, ConfigStore};
use camino::{Utf8Path, Utf8PathBuf};
use std::sync::Arc;

/// Outcome of one scheduled maintenance sweep.
#[derive(Debug, Default)]
pub struct SweepReport {
    /// The gate refused and nothing ran
    pub deferred: bool,
    pub categorize: Option<CategorizeReport>,
    pub archive: Option<ArchiveReport>,
    pub trash: Option<TrashReport>,
}

#[derive(Clone)]
pub struct Organizer {
    store: ConfigStore,
    gate: ResourceGate,
    categorizer: Categorizer,
    archiver: Archiver,
    reaper: TrashReaper,
    metrics: Arc<Metrics>,
}

impl Organizer {
    /// Organizer gated on live system utilization.
    pub fn new(store: ConfigStore) -> Self {
        let gate = ResourceGate::system(store.clone());
        Self::with_gate(store, gate)
    }

    /// Organizer with a custom utilization source.
    pub fn with_sampler(store: ConfigStore, sampler: Arc<dyn ResourceSampler>) -> Self {
        let gate = ResourceGate::new(store.clone(), sampler);
        Self::with_gate(store, gate)
    }

    fn with_gate(store: ConfigStore, gate: ResourceGate) -> Self {
        let metrics = Arc::new(Metrics::new());
        let locks = Arc::new(DirectoryLocks::new());

        Self {
            categorizer: Categorizer::new(store.clone(), locks, Arc::clone(&metrics)),
            archiver: Archiver::new(store.clone(), gate.clone(), Arc::clone(&metrics)),
            reaper: TrashReaper::new(store.clone(), Arc::clone(&metrics)),
            store,
            gate,
            metrics,
        }
    }

    pub fn store(&self) -> &ConfigStore {
        &self.store
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    /// Ensure the managed directory tree exists.
    pub fn create_directories(&self) -> Result<(), LifecycleError> {
        create_directories(&self.store.base_dirs(), &self.store.categories())
    }

    /// Categorize stray files directly under `dir`, FILES when `None`.
    pub fn categorize_directory(
        &self,
        dir: Option<&Utf8Path>,
    ) -> Result<CategorizeReport, LifecycleError> {
        self.categorizer.categorize_directory(dir)
    }

    pub fn move_to_category(&self, path: &Utf8Path) -> CategorizeOutcome {
        self.categorizer.move_to_category(path)
    }

    /// Archive files in OLD older than `days_threshold` days. Always gated.
    pub fn archive_old(&self, days_threshold: u64) -> Result<ArchiveReport, LifecycleError> {
        self.archiver.archive_old(days_threshold)
    }

    pub fn clean_trash(&self) -> Result<TrashReport, LifecycleError> {
        self.reaper.clean_trash()
    }

    pub fn can_perform_io(&self) -> bool {
        self.gate.can_perform_io()
    }

    /// Search FILES recursively for names matching `query`.
    pub fn search(&self, query: &str) -> Vec<Utf8PathBuf> {
        search::search_files(&self.store.base_dirs().files, query)
    }

    /// Watcher wired to this organizer's categorizer and gate.
    pub fn watcher(&self) -> EventWatcher {
        EventWatcher::new(
            self.categorizer.clone(),
            self.gate.clone(),
            Arc::clone(&self.metrics),
        )
    }

    /// Apply a settings edit; a directory change re-runs bootstrap.
    pub fn update_config<F>(&self, update_fn: F) -> Result<Vec<ConfigChange>, LifecycleError>
    where
        F: FnOnce(&mut OrganizerConfig),
    {
        let changes = self
            .store
            .update(update_fn)
            .map_err(LifecycleError::ConfigInvalid)?;

        if changes.contains(&ConfigChange::DirectoriesChanged) {
            tracing::info!("Directories changed, recreating directory tree");
            self.create_directories()?;
        }
        Ok(changes)
    }

    /// One gated maintenance pass: catch-up categorization, archival and
    /// trash expiry.
    ///
    /// A refused gate defers the whole sweep. Failures of one step are
    /// logged and do not stop the next.
    pub fn sweep(&self) -> SweepReport {
        if !self.gate.can_perform_io() {
            tracing::info!("Sweep deferred: system resources above limits");
            self.metrics.record_deferred();
            return SweepReport {
                deferred: true,
                ..SweepReport::default()
            };
        }

        if let Err(e) = self.create_directories() {
            tracing::error!("Cannot recreate directory tree: {}", e);
        }

        let mut report = SweepReport::default();

        match self.categorize_directory(None) {
            Ok(categorized) => report.categorize = Some(categorized),
            Err(e) => tracing::error!("Catch-up categorization failed: {}", e),
        }

        match self.archive_old(self.store.schedule().archive_after_days) {
            Ok(archived) => report.archive = Some(archived),
            Err(e) => tracing::error!("Archival failed: {}", e),
        }

        match self.clean_trash() {
            Ok(trash) => report.trash = Some(trash),
            Err(e) => tracing::error!("Trash cleanup failed: {}", e),
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BaseDirs;
    use crate::services::ResourceSample;
    use crate::services::resource_gate::MockResourceSampler;
    use std::fs;
    use tempfile::TempDir;

    fn organizer(cpu: f32) -> (TempDir, Organizer) {
        let temp = TempDir::new().unwrap();
        let root = Utf8PathBuf::try_from(temp.path().to_path_buf()).unwrap();
        let mut config = OrganizerConfig::default();
        config.base_dirs = BaseDirs::under(&root);

        let mut sampler = MockResourceSampler::new();
        sampler.expect_sample().returning(move || {
            Ok(ResourceSample {
                cpu_percent: cpu,
                ram_percent: 10.0,
            })
        });

        let organizer = Organizer::with_sampler(ConfigStore::new(config), Arc::new(sampler));
        organizer.create_directories().unwrap();
        (temp, organizer)
    }

    #[test]
    fn test_sweep_deferred_when_busy() {
        let (_temp, organizer) = organizer(99.0);
        let stray = organizer.store().base_dirs().files.join("a.pdf");
        fs::write(&stray, "a").unwrap();

        let report = organizer.sweep();

        assert!(report.deferred);
        assert!(report.categorize.is_none());
        assert!(stray.exists());
    }

    #[test]
    fn test_sweep_runs_all_steps() {
        let (_temp, organizer) = organizer(5.0);
        let files = organizer.store().base_dirs().files;
        fs::write(files.join("a.pdf"), "a").unwrap();

        let report = organizer.sweep();

        assert!(!report.deferred);
        assert_eq!(report.categorize.unwrap().moved(), 1);
        assert!(report.archive.is_some());
        assert!(report.trash.is_some());
        assert!(files.join("Documents").join("a.pdf").exists());
    }

    #[test]
    fn test_update_config_recreates_tree() {
        let (temp, organizer) = organizer(5.0);
        let moved = Utf8PathBuf::try_from(temp.path().join("Elsewhere")).unwrap();

        let changes = organizer
            .update_config(|c| c.base_dirs = BaseDirs::under(&moved))
            .unwrap();

        assert_eq!(changes, vec![ConfigChange::DirectoriesChanged]);
        assert!(moved.join("Files").join("Music").is_dir());
    }

    #[test]
    fn test_update_config_rejects_invalid() {
        let (_temp, organizer) = organizer(5.0);

        let err = organizer
            .update_config(|c| c.resource_limits.max_cpu_percent = 150)
            .unwrap_err();

        assert!(matches!(err, LifecycleError::ConfigInvalid(_)));
        assert_eq!(organizer.store().resource_limits().max_cpu_percent, 50);
    }
}
