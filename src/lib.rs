// src/lib.rs
// Public library surface for integration tests (and potential reuse).

pub mod api;
pub mod app;
pub mod classify;
pub mod compose;
pub mod config;
pub mod dispatch;
pub mod ingest;
pub mod metrics;
pub mod scheduler;
pub mod store;
pub mod tasks;
pub mod types;

// ---- Re-exports for stable public API ----
pub use crate::api::router;
pub use crate::config::HazardFeedConfig;
pub use crate::tasks::{EntryPersisted, IngestReport, TaskError, Tasks};
pub use crate::types::{ComposedMessage, FeedEntry, HazardSeverity};
