// src/store/mod.rs
//! Persistence seam. The backing store is external; everything in the
//! pipeline talks to it through [`Store`].

pub mod memory;

use async_trait::async_trait;
use thiserror::Error;

use crate::types::{FeedEntry, HazardSeverity, MessageTemplate};

pub use memory::{MemoryStore, StoreSeed};

#[derive(Debug, Error)]
pub enum StoreError {
    /// Backing store cannot be reached right now. Callers skip and retry later.
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("entry not found: {0}")]
    NotFound(String),
}

/// Result of an insert keyed by `external_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    Duplicate,
}

#[async_trait]
pub trait Store: Send + Sync {
    /// All known severities in insertion order.
    async fn severities(&self) -> Result<Vec<HazardSeverity>, StoreError>;

    async fn active_feed_urls(&self) -> Result<Vec<String>, StoreError>;

    async fn entry_exists(&self, external_id: &str) -> Result<bool, StoreError>;

    /// Insert must enforce uniqueness of `external_id` on its own; the
    /// exists-check in front of it is only a shortcut.
    async fn insert_entry(&self, entry: &FeedEntry) -> Result<InsertOutcome, StoreError>;

    async fn mark_delivered(&self, external_id: &str) -> Result<(), StoreError>;

    async fn undelivered_entries(&self) -> Result<Vec<FeedEntry>, StoreError>;

    async fn active_recipients(&self) -> Result<Vec<String>, StoreError>;

    async fn template(&self, title: &str) -> Result<Option<MessageTemplate>, StoreError>;
}
