// src/ingest/gate.rs
use metrics::counter;

use crate::store::{InsertOutcome, Store};
use crate::types::FeedEntry;

/// Persist `entry` unless its external id is already stored.
///
/// Returns true only when this call wrote the entry. A store outage is
/// logged and reported as false; the next poll picks the entry up again.
pub async fn try_persist(store: &dyn Store, entry: &FeedEntry) -> bool {
    match store.entry_exists(&entry.external_id).await {
        Ok(true) => {
            tracing::trace!(external_id = %entry.external_id, "entry already stored");
            return false;
        }
        Ok(false) => {}
        Err(e) => {
            tracing::warn!(external_id = %entry.external_id, error = %e, "dedup check skipped");
            return false;
        }
    }

    match store.insert_entry(entry).await {
        Ok(InsertOutcome::Inserted) => {
            counter!("feed_entries_persisted_total").increment(1);
            tracing::info!(
                external_id = %entry.external_id,
                severity = %entry.severity.title,
                "stored new hazard entry"
            );
            true
        }
        Ok(InsertOutcome::Duplicate) => {
            tracing::debug!(external_id = %entry.external_id, "lost insert race; entry exists");
            false
        }
        Err(e) => {
            tracing::warn!(external_id = %entry.external_id, error = %e, "entry insert skipped");
            false
        }
    }
}
