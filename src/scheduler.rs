// src/scheduler.rs
use metrics::counter;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::tasks::{EntryPersisted, Tasks};

/// Run `ingest_feeds` on a fixed interval. The first tick fires immediately.
pub fn spawn_ingest_scheduler(tasks: Arc<Tasks>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            counter!("ingest_runs_total").increment(1);
            if let Err(e) = tasks.ingest_feeds().await {
                tracing::error!(target: "ingest", error = %e, "ingest run failed");
            }
        }
    })
}

/// Consume persist events and deliver each entry. Failed deliveries stay
/// undelivered in the store and are picked up by [`requeue_undelivered`] on
/// the next start.
pub fn spawn_notification_worker(
    tasks: Arc<Tasks>,
    mut rx: mpsc::Receiver<EntryPersisted>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(EntryPersisted { entry }) = rx.recv().await {
            match tasks.deliver_hazard(&entry).await {
                Ok(n) => tracing::info!(
                    target: "notify",
                    external_id = %entry.external_id,
                    recipients = n,
                    "hazard notification delivered"
                ),
                Err(e) => tracing::warn!(
                    target: "notify",
                    external_id = %entry.external_id,
                    error = %e,
                    "hazard notification failed"
                ),
            }
        }
        tracing::debug!(target: "notify", "persist channel closed; worker exiting");
    })
}

/// Queue entries stored earlier but never delivered. Returns how many.
pub async fn requeue_undelivered(tasks: &Tasks, tx: &mpsc::Sender<EntryPersisted>) -> usize {
    let pending = match tasks.store().undelivered_entries().await {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(error = %e, "cannot list undelivered entries");
            return 0;
        }
    };
    let mut queued = 0usize;
    for entry in pending {
        if tx.send(EntryPersisted { entry }).await.is_err() {
            break;
        }
        queued += 1;
    }
    queued
}
