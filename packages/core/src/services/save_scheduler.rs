//! Debounced Write-behind Persistence
//!
//! Provides background saving of the catalog to a `CatalogSink`:
//! - Event-driven: the task sleeps until an edit schedules a snapshot
//! - Debounced: every new snapshot restarts the quiet-period timer, so rapid
//!   edits coalesce into one save of the latest state
//! - Fire-and-forget: save failures are logged and never roll back in-memory state;
//!   the next scheduled snapshot is the retry
//!
//! ## Durability Trade-off
//!
//! Snapshots still waiting for their quiet period when the process exits are lost.
//! `SaveHandle::flush` and `SaveScheduler::shutdown` exist for callers that want
//! to save before exiting.

use crate::db::CatalogSink;
use crate::models::Node;
use crate::services::history::Snapshot;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

enum SaveCommand {
    Schedule(Snapshot),
    Flush(oneshot::Sender<()>),
    Shutdown,
}

/// Counters reported when the scheduler stops
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SaveStats {
    pub saves: usize,
    pub failures: usize,
    /// Snapshots replaced by a newer one before their timer fired
    pub coalesced: usize,
}

/// Handle used to schedule saves
///
/// This is a lightweight, cloneable handle; the editor keeps one and calls
/// `schedule` after every change.
#[derive(Debug, Clone)]
pub struct SaveHandle {
    tx: mpsc::UnboundedSender<SaveCommand>,
}

impl SaveHandle {
    /// Queue `snapshot` as the next state to save. Non-blocking.
    pub fn schedule(&self, snapshot: Snapshot) {
        if self.tx.send(SaveCommand::Schedule(snapshot)).is_err() {
            tracing::warn!("Save scheduler has shut down, snapshot dropped");
        }
    }

    /// Save any pending snapshot immediately and wait for it.
    ///
    /// Returns false if the scheduler is no longer running.
    pub async fn flush(&self) -> bool {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.tx.send(SaveCommand::Flush(ack_tx)).is_err() {
            return false;
        }
        ack_rx.await.is_ok()
    }
}

/// Background task owning the sink
pub struct SaveScheduler {
    handle: SaveHandle,
    task: JoinHandle<SaveStats>,
}

impl SaveScheduler {
    /// Spawn the background task. Must be called inside a tokio runtime.
    pub fn spawn(sink: Arc<dyn CatalogSink>, debounce: Duration) -> Self {
        tracing::info!(
            "SaveScheduler starting (debounce {}ms)",
            debounce.as_millis()
        );

        let (tx, mut rx) = mpsc::unbounded_channel::<SaveCommand>();

        let task = tokio::spawn(async move {
            let mut stats = SaveStats::default();
            let mut pending: Option<Snapshot> = None;

            loop {
                let command = if pending.is_some() {
                    tokio::select! {
                        biased;

                        command = rx.recv() => command,

                        _ = tokio::time::sleep(debounce) => {
                            if let Some(snapshot) = pending.take() {
                                save_snapshot(sink.as_ref(), snapshot, &mut stats).await;
                            }
                            continue;
                        }
                    }
                } else {
                    rx.recv().await
                };

                match command {
                    Some(SaveCommand::Schedule(snapshot)) => {
                        if pending.replace(snapshot).is_some() {
                            stats.coalesced += 1;
                        }
                    }
                    Some(SaveCommand::Flush(ack)) => {
                        if let Some(snapshot) = pending.take() {
                            save_snapshot(sink.as_ref(), snapshot, &mut stats).await;
                        }
                        let _ = ack.send(());
                    }
                    Some(SaveCommand::Shutdown) | None => {
                        if let Some(snapshot) = pending.take() {
                            save_snapshot(sink.as_ref(), snapshot, &mut stats).await;
                        }
                        tracing::info!("SaveScheduler shutting down");
                        break;
                    }
                }
            }

            stats
        });

        Self {
            handle: SaveHandle { tx },
            task,
        }
    }

    /// Get a cloneable handle for scheduling saves
    pub fn handle(&self) -> SaveHandle {
        self.handle.clone()
    }

    /// Save anything pending, stop the task, and report its counters
    pub async fn shutdown(self) -> SaveStats {
        let _ = self.handle.tx.send(SaveCommand::Shutdown);
        match self.task.await {
            Ok(stats) => stats,
            Err(e) => {
                tracing::error!("SaveScheduler task failed: {}", e);
                SaveStats::default()
            }
        }
    }
}

async fn save_snapshot(sink: &dyn CatalogSink, snapshot: Snapshot, stats: &mut SaveStats) {
    let records: Vec<Node> = Arc::try_unwrap(snapshot).unwrap_or_else(|shared| (*shared).clone());
    let count = records.len();

    match sink.save(records).await {
        Ok(()) => {
            stats.saves += 1;
            tracing::info!("Catalog saved ({} records)", count);
        }
        Err(e) => {
            stats.failures += 1;
            tracing::warn!("Catalog save failed, will retry on next change: {:#}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemorySink;

    fn snapshot(count: usize) -> Snapshot {
        Arc::new((0..count).map(|i| Node::new_root(format!("Root {}", i))).collect())
    }

    #[tokio::test]
    async fn test_rapid_schedules_coalesce_into_one_save() {
        let sink = Arc::new(MemorySink::new());
        let scheduler = SaveScheduler::spawn(sink.clone(), Duration::from_millis(50));
        let handle = scheduler.handle();

        for count in 1..=5 {
            handle.schedule(snapshot(count));
        }
        tokio::time::sleep(Duration::from_millis(300)).await;

        assert_eq!(sink.save_count(), 1);
        assert_eq!(sink.last_save().unwrap().len(), 5);

        let stats = scheduler.shutdown().await;
        assert_eq!(stats.saves, 1);
        assert_eq!(stats.coalesced, 4);
    }

    #[tokio::test]
    async fn test_flush_saves_without_waiting_for_debounce() {
        let sink = Arc::new(MemorySink::new());
        let scheduler = SaveScheduler::spawn(sink.clone(), Duration::from_secs(60));
        let handle = scheduler.handle();

        handle.schedule(snapshot(2));
        assert!(handle.flush().await);
        assert_eq!(sink.save_count(), 1);

        // Nothing pending: flush is a no-op
        assert!(handle.flush().await);
        assert_eq!(sink.save_count(), 1);

        scheduler.shutdown().await;
    }

    #[tokio::test]
    async fn test_failures_are_counted_not_fatal() {
        let sink = Arc::new(MemorySink::failing());
        let scheduler = SaveScheduler::spawn(sink, Duration::from_secs(60));
        let handle = scheduler.handle();

        handle.schedule(snapshot(1));
        assert!(handle.flush().await);
        handle.schedule(snapshot(1));

        let stats = scheduler.shutdown().await;
        assert_eq!(stats.failures, 2);
        assert_eq!(stats.saves, 0);
    }

    #[tokio::test]
    async fn test_handle_after_shutdown_reports_stopped() {
        let sink = Arc::new(MemorySink::new());
        let scheduler = SaveScheduler::spawn(sink, Duration::from_millis(10));
        let handle = scheduler.handle();

        scheduler.shutdown().await;
        assert!(!handle.flush().await);
        handle.schedule(snapshot(1));
    }
}
