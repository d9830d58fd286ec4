// Background agent
//
// Runs the startup catch-up, keeps the FILES watcher alive, and drives the
// periodic maintenance sweep until shut down.

use crate::logging;
use crate::organizer::{Organizer, SweepReport};
use crate::services::{LifecycleError, WatchHandle};
use crate::state::ConfigChange;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};

type SweepRequest = oneshot::Sender<SweepReport>;

pub struct Agent {
    organizer: Organizer,
}

/// Handle to a running agent.
pub struct AgentHandle {
    cancel_tx: watch::Sender<bool>,
    sweep_tx: mpsc::Sender<SweepRequest>,
    task: JoinHandle<()>,
}

impl AgentHandle {
    /// Run a sweep now and wait for its report.
    ///
    /// `None` if the agent has already stopped.
    pub async fn sweep_now(&self) -> Option<SweepReport> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sweep_tx.send(reply_tx).await.ok()?;
        reply_rx.await.ok()
    }

    /// Stop ticks and events, wait for in-flight work, then return.
    pub async fn shutdown(self) {
        tracing::info!("Shutting down agent");
        let _ = self.cancel_tx.send(true);
        if let Err(e) = self.task.await {
            tracing::error!("Agent task ended abnormally: {}", e);
        }
    }
}

impl Agent {
    pub fn new(organizer: Organizer) -> Self {
        Self { organizer }
    }

    /// Catch up on anything that arrived while the agent was not running,
    /// then start watching and scheduling.
    ///
    /// Assumes the directory tree has already been bootstrapped.
    pub async fn start(self) -> Result<AgentHandle, LifecycleError> {
        let organizer = self.organizer;

        let catch_up = organizer.clone();
        if let Err(e) = tokio::task::spawn_blocking(move || startup_catch_up(&catch_up)).await {
            tracing::error!("Startup catch-up task failed: {}", e);
        }

        // Subscribe before returning so edits made right after start are seen
        let changes = organizer.store().subscribe();

        let files = organizer.store().base_dirs().files;
        let watch_handle = organizer.watcher().start(&files)?;

        let (cancel_tx, cancel_rx) = watch::channel(false);
        let (sweep_tx, sweep_rx) = mpsc::channel(4);
        let task = tokio::spawn(run(organizer, watch_handle, changes, cancel_rx, sweep_rx));

        Ok(AgentHandle {
            cancel_tx,
            sweep_tx,
            task,
        })
    }
}

fn startup_catch_up(organizer: &Organizer) {
    match organizer.categorize_directory(None) {
        Ok(report) => tracing::info!("Startup categorization: {}", report.summary()),
        Err(e) => tracing::error!("Startup categorization failed: {}", e),
    }

    let days = organizer.store().schedule().archive_after_days;
    match organizer.archive_old(days) {
        Ok(report) => tracing::info!("Startup archival: {}", report.summary()),
        Err(e) => tracing::error!("Startup archival failed: {}", e),
    }

    match organizer.clean_trash() {
        Ok(report) => tracing::info!("Startup {}", report.summary()),
        Err(e) => tracing::error!("Startup trash cleanup failed: {}", e),
    }
}

fn sweep_interval(organizer: &Organizer) -> Interval {
    let period = Duration::from_secs(organizer.store().schedule().sweep_interval_secs.max(1));
    let mut interval = tokio::time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

async fn run(
    organizer: Organizer,
    watch_handle: WatchHandle,
    mut changes: broadcast::Receiver<ConfigChange>,
    mut cancel_rx: watch::Receiver<bool>,
    mut sweep_rx: mpsc::Receiver<SweepRequest>,
) {
    let mut watch_handle = Some(watch_handle);
    let mut changes_open = true;
    let mut interval = sweep_interval(&organizer);

    loop {
        tokio::select! {
            biased;

            _ = cancel_rx.changed() => break,

            Some(reply) = sweep_rx.recv() => {
                let report = sweep(&organizer).await;
                let _ = reply.send(report);
            }

            _ = interval.tick() => {
                sweep(&organizer).await;
            }

            change = changes.recv(), if changes_open => match change {
                Ok(ConfigChange::DirectoriesChanged) | Err(RecvError::Lagged(_)) => {
                    if let Some(handle) = watch_handle.take() {
                        handle.stop().await;
                    }
                    watch_handle = restart_watcher(&organizer).await;
                }
                Ok(ConfigChange::ScheduleChanged) => {
                    interval = sweep_interval(&organizer);
                }
                Ok(ConfigChange::DebugModeChanged { enabled }) => {
                    logging::set_debug_mode(enabled);
                }
                Ok(_) => {}
                Err(RecvError::Closed) => changes_open = false,
            },
        }
    }

    if let Some(handle) = watch_handle {
        handle.stop().await;
    }
    tracing::info!("Agent stopped");
}

async fn sweep(organizer: &Organizer) -> SweepReport {
    let worker = organizer.clone();
    match tokio::task::spawn_blocking(move || worker.sweep()).await {
        Ok(report) => report,
        Err(e) => {
            tracing::error!("Sweep task failed: {}", e);
            SweepReport::default()
        }
    }
}

async fn restart_watcher(organizer: &Organizer) -> Option<WatchHandle> {
    let bootstrap = organizer.clone();
    match tokio::task::spawn_blocking(move || bootstrap.create_directories()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            tracing::error!("Cannot create new directory tree: {}", e);
            return None;
        }
        Err(e) => {
            tracing::error!("Bootstrap task failed: {}", e);
            return None;
        }
    }

    let files = organizer.store().base_dirs().files;
    let handle = match organizer.watcher().start(&files) {
        Ok(handle) => handle,
        Err(e) => {
            tracing::error!("{}", e);
            return None;
        }
    };

    // Files that landed in the new FILES before the watcher was up
    let catch_up = organizer.clone();
    let result = tokio::task::spawn_blocking(move || {
        if !catch_up.can_perform_io() {
            catch_up.metrics().record_deferred();
            return None;
        }
        Some(catch_up.categorize_directory(None))
    })
    .await;
    match result {
        Ok(Some(Ok(report))) if !report.is_noop() => {
            tracing::info!("Catch-up after directory change: {}", report.summary());
        }
        Ok(Some(Err(e))) => tracing::error!("Catch-up after directory change failed: {}", e),
        Ok(_) => {}
        Err(e) => tracing::error!("Catch-up task failed: {}", e),
    }

    Some(handle)
}
