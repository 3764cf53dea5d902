// src/ingest/mod.rs
pub mod feed;
pub mod fetcher;
pub mod gate;
pub mod parser;
pub mod sources;

use metrics::{describe_counter, describe_gauge, describe_histogram};
use once_cell::sync::OnceCell;

pub use fetcher::{FeedFetcher, HttpFetcher, StaticFetcher};
pub use gate::try_persist;
pub use parser::{
    validate_feed_url, ClassificationPolicy, EntryRejection, FeedParser, ParseError, ParseOutcome,
    RejectReason,
};
pub use sources::resolve_feed_urls;

/// One-time metrics registration (so series show up on /metrics).
pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "feed_entries_parsed_total",
            "Items read from feed documents."
        );
        describe_counter!(
            "feed_entries_rejected_total",
            "Items dropped as unclassified or missing id/date."
        );
        describe_counter!("feed_invalid_urls_total", "Malformed feed URLs skipped.");
        describe_counter!(
            "feed_fetch_errors_total",
            "Feed fetch or XML parse failures."
        );
        describe_counter!(
            "feed_entries_persisted_total",
            "New entries written by the dedup gate."
        );
        describe_histogram!("feed_parse_ms", "Feed document parse time in milliseconds.");
        describe_gauge!("ingest_last_run_ts", "Unix ts when ingestion last ran.");
    });
}
