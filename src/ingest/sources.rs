// src/ingest/sources.rs
use crate::store::Store;

/// Active feed URLs from the store, or `[default_url]` when there are none.
/// An unreachable store falls back to the default as well.
pub async fn resolve_feed_urls(store: &dyn Store, default_url: &str) -> Vec<String> {
    let urls = match store.active_feed_urls().await {
        Ok(urls) => urls,
        Err(e) => {
            tracing::warn!(error = %e, "feed url list unavailable; using default");
            Vec::new()
        }
    };
    if urls.is_empty() {
        return vec![default_url.to_string()];
    }
    urls
}
