// Lifecycle metrics
//
// Lightweight counters for what the agent did over its lifetime

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Agent-wide counters
///
/// Uses atomic operations for thread-safe tracking without locks. Shared by
/// every service through an `Arc` and summarized on shutdown.
#[derive(Debug)]
pub struct Metrics {
    /// Files moved into a category folder
    pub files_categorized: AtomicU64,

    /// Files escalated to Trash after a failed move
    pub files_trashed: AtomicU64,

    /// Files whose move and trash escalation both failed
    pub files_unrouted: AtomicU64,

    /// Files appended to an archive and removed from OLD
    pub files_archived: AtomicU64,

    /// Per-file archive append failures
    pub archive_failures: AtomicU64,

    /// Trash entries permanently deleted
    pub trash_purged: AtomicU64,

    /// Per-entry delete failures
    pub delete_failures: AtomicU64,

    /// Sweeps or events deferred by the resource gate
    pub deferred_by_gate: AtomicU64,

    /// Creation events delivered by the watcher
    pub watcher_events: AtomicU64,

    start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            files_categorized: AtomicU64::new(0),
            files_trashed: AtomicU64::new(0),
            files_unrouted: AtomicU64::new(0),
            files_archived: AtomicU64::new(0),
            archive_failures: AtomicU64::new(0),
            trash_purged: AtomicU64::new(0),
            delete_failures: AtomicU64::new(0),
            deferred_by_gate: AtomicU64::new(0),
            watcher_events: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn record_categorized(&self) {
        self.files_categorized.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_trashed(&self) {
        self.files_trashed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_unrouted(&self) {
        self.files_unrouted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_archived(&self) {
        self.files_archived.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_archive_failure(&self) {
        self.archive_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_purged(&self) {
        self.trash_purged.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_delete_failure(&self) {
        self.delete_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_deferred(&self) {
        self.deferred_by_gate.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_watcher_event(&self) {
        self.watcher_events.fetch_add(1, Ordering::Relaxed);
    }

    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Share of moves that ended in Trash instead of a category, 0.0 when
    /// nothing has been routed yet
    pub fn trash_ratio(&self) -> f64 {
        let trashed = self.files_trashed.load(Ordering::Relaxed);
        let total = trashed + self.files_categorized.load(Ordering::Relaxed);
        if total > 0 {
            trashed as f64 / total as f64
        } else {
            0.0
        }
    }

    /// Log metrics summary
    pub fn log_summary(&self) {
        tracing::info!("=== FileKeeper Metrics Summary ===");
        tracing::info!("Uptime: {:.2}s", self.uptime().as_secs_f64());
        tracing::info!(
            "Files: {} categorized, {} trashed, {} unrouted ({} watcher events)",
            self.files_categorized.load(Ordering::Relaxed),
            self.files_trashed.load(Ordering::Relaxed),
            self.files_unrouted.load(Ordering::Relaxed),
            self.watcher_events.load(Ordering::Relaxed)
        );
        tracing::info!(
            "Archive: {} files archived, {} failures",
            self.files_archived.load(Ordering::Relaxed),
            self.archive_failures.load(Ordering::Relaxed)
        );
        tracing::info!(
            "Trash: {} entries purged, {} delete failures",
            self.trash_purged.load(Ordering::Relaxed),
            self.delete_failures.load(Ordering::Relaxed)
        );
        tracing::info!(
            "Deferred by resource gate: {}",
            self.deferred_by_gate.load(Ordering::Relaxed)
        );
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
