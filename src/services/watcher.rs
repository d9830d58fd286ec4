//! Filesystem event subscription on the FILES directory.
//!
//! `notify` delivers events on its own thread; they are forwarded through a
//! bounded channel to a tokio task that categorizes one file at a time on the
//! blocking pool. Stopping drops the `notify` watcher and closes the channel
//! before the task returns, so nothing is delivered after [`WatchHandle::stop`].

use super::categorizer::{CategorizeOutcome, Categorizer};
use super::error::LifecycleError;
use super::resource_gate::ResourceGate;
use crate::metrics::Metrics;
use camino::{Utf8Path, Utf8PathBuf};
use notify::event::{CreateKind, ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

/// Events buffered between the notify thread and the watcher task
const EVENT_BUFFER: usize = 256;

/// Starts watch subscriptions that feed the categorizer.
#[derive(Clone)]
pub struct EventWatcher {
    categorizer: Categorizer,
    gate: ResourceGate,
    metrics: Arc<Metrics>,
}

/// A running subscription.
pub struct WatchHandle {
    dir: Utf8PathBuf,
    cancel_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl WatchHandle {
    pub fn dir(&self) -> &Utf8Path {
        &self.dir
    }

    /// Stop accepting events, let the file in flight finish, then return.
    pub async fn stop(self) {
        let _ = self.cancel_tx.send(true);
        if let Err(e) = self.task.await {
            tracing::error!("Watcher task for {} ended abnormally: {}", self.dir, e);
        }
    }
}

impl EventWatcher {
    pub fn new(categorizer: Categorizer, gate: ResourceGate, metrics: Arc<Metrics>) -> Self {
        Self {
            categorizer,
            gate,
            metrics,
        }
    }

    /// Subscribe to creation events in `dir` (non-recursive).
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self, dir: &Utf8Path) -> Result<WatchHandle, LifecycleError> {
        let (event_tx, event_rx) = mpsc::channel(EVENT_BUFFER);

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            // Runs on the notify thread; a closed channel means we are stopping
            let _ = event_tx.blocking_send(res);
        })
        .map_err(|source| LifecycleError::Watch {
            path: dir.to_path_buf(),
            source,
        })?;

        watcher
            .watch(dir.as_std_path(), RecursiveMode::NonRecursive)
            .map_err(|source| LifecycleError::Watch {
                path: dir.to_path_buf(),
                source,
            })?;

        let (cancel_tx, cancel_rx) = watch::channel(false);
        let task = tokio::spawn(self.clone().run(watcher, event_rx, cancel_rx, dir.to_path_buf()));

        tracing::info!("Watching {} for new files", dir);
        Ok(WatchHandle {
            dir: dir.to_path_buf(),
            cancel_tx,
            task,
        })
    }

    async fn run(
        self,
        watcher: RecommendedWatcher,
        mut events: mpsc::Receiver<notify::Result<Event>>,
        mut cancel_rx: watch::Receiver<bool>,
        dir: Utf8PathBuf,
    ) {
        loop {
            tokio::select! {
                biased;

                _ = cancel_rx.changed() => {
                    break;
                }

                event = events.recv() => {
                    match event {
                        Some(Ok(event)) => {
                            for path in created_paths(&event) {
                                self.handle(path).await;
                            }
                        }
                        Some(Err(e)) => tracing::warn!("Watch error on {}: {}", dir, e),
                        None => break,
                    }
                }
            }
        }

        drop(watcher);
        events.close();
        tracing::info!("Stopped watching {}", dir);
    }

    async fn handle(&self, path: Utf8PathBuf) {
        self.metrics.record_watcher_event();

        match path.symlink_metadata() {
            Ok(metadata) if metadata.is_dir() => return,
            Ok(_) => {}
            Err(_) => {
                tracing::debug!("{} vanished before it could be categorized", path);
                return;
            }
        }

        let categorizer = self.categorizer.clone();
        let gate = self.gate.clone();
        let metrics = Arc::clone(&self.metrics);

        let result = tokio::task::spawn_blocking(move || {
            if !gate.can_perform_io() {
                metrics.record_deferred();
                tracing::debug!("Deferred {} until the next sweep", path);
                return None;
            }
            Some(categorizer.move_to_category(&path))
        })
        .await;

        match result {
            Ok(Some(CategorizeOutcome::Unrouted { error, .. })) => {
                tracing::error!("Watcher could not route file: {}", error);
            }
            Ok(_) => {}
            Err(e) => tracing::error!("Categorize task failed: {}", e),
        }
    }
}

/// Paths that newly appeared in the watched directory, with non UTF-8 paths
/// dropped.
pub fn created_paths(event: &Event) -> Vec<Utf8PathBuf> {
    let paths: &[std::path::PathBuf] = match event.kind {
        EventKind::Create(CreateKind::Folder) => &[],
        EventKind::Create(_) => &event.paths,
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => &event.paths,
        // Both carries [from, to]
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            event.paths.last().map(std::slice::from_ref).unwrap_or(&[])
        }
        _ => &[],
    };

    paths
        .iter()
        .filter_map(|p| Utf8PathBuf::from_path_buf(p.clone()).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{DataChange, RemoveKind};
    use std::path::PathBuf;

    fn event(kind: EventKind, paths: &[&str]) -> Event {
        let mut event = Event::new(kind);
        for path in paths {
            event = event.add_path(PathBuf::from(path));
        }
        event
    }

    #[test]
    fn test_create_file_is_delivered() {
        let e = event(EventKind::Create(CreateKind::File), &["/files/a.pdf"]);
        assert_eq!(created_paths(&e), vec![Utf8PathBuf::from("/files/a.pdf")]);
    }

    #[test]
    fn test_create_folder_is_ignored() {
        let e = event(EventKind::Create(CreateKind::Folder), &["/files/new"]);
        assert!(created_paths(&e).is_empty());
    }

    #[test]
    fn test_rename_into_directory() {
        let to = event(
            EventKind::Modify(ModifyKind::Name(RenameMode::To)),
            &["/files/b.mp3"],
        );
        assert_eq!(created_paths(&to), vec![Utf8PathBuf::from("/files/b.mp3")]);

        let both = event(
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)),
            &["/elsewhere/b.mp3", "/files/b.mp3"],
        );
        assert_eq!(created_paths(&both), vec![Utf8PathBuf::from("/files/b.mp3")]);
    }

    #[test]
    fn test_other_events_ignored() {
        let from = event(
            EventKind::Modify(ModifyKind::Name(RenameMode::From)),
            &["/files/c.txt"],
        );
        let data = event(
            EventKind::Modify(ModifyKind::Data(DataChange::Content)),
            &["/files/c.txt"],
        );
        let removed = event(EventKind::Remove(RemoveKind::File), &["/files/c.txt"]);

        assert!(created_paths(&from).is_empty());
        assert!(created_paths(&data).is_empty());
        assert!(created_paths(&removed).is_empty());
    }
}
