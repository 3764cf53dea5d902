// src/ingest/parser.rs
use metrics::counter;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use super::feed::{self, RawItem};
use super::fetcher::FeedFetcher;
use crate::classify::SeverityClassifier;
use crate::types::FeedEntry;

/// What to do with an entry no hazard level matches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassificationPolicy {
    /// Record it as rejected and keep going.
    #[default]
    Collect,
    /// Abort the whole call and drop everything parsed so far.
    FailFast,
}

#[derive(Debug, Error)]
pub enum InvalidUrl {
    #[error("not a url: {0}")]
    Parse(#[from] url::ParseError),
    #[error("unsupported scheme {0:?}")]
    Scheme(String),
    #[error("url has no host")]
    MissingHost,
}

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("no hazard level matches entry {external_id:?} from {url}")]
    Unclassified { url: String, external_id: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    Unclassified,
    MissingId,
    MissingPublishedAt,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryRejection {
    pub url: String,
    pub external_id: Option<String>,
    pub title: Option<String>,
    pub reason: RejectReason,
}

#[derive(Debug, Clone, Default)]
pub struct ParseOutcome {
    pub entries: Vec<FeedEntry>,
    pub rejected: Vec<EntryRejection>,
    /// URLs that were malformed, unreachable, or not a feed.
    pub skipped_urls: Vec<String>,
}

/// Accepts absolute `http`/`https` URLs with a host.
pub fn validate_feed_url(raw: &str) -> Result<Url, InvalidUrl> {
    let url = Url::parse(raw.trim())?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(InvalidUrl::Scheme(url.scheme().to_string()));
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(InvalidUrl::MissingHost);
    }
    Ok(url)
}

pub struct FeedParser<'a> {
    fetcher: &'a dyn FeedFetcher,
    classifier: &'a SeverityClassifier,
    policy: ClassificationPolicy,
}

impl<'a> FeedParser<'a> {
    pub fn new(fetcher: &'a dyn FeedFetcher, classifier: &'a SeverityClassifier) -> Self {
        Self {
            fetcher,
            classifier,
            policy: ClassificationPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: ClassificationPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Fetch and parse every URL in order. Bad URLs and broken feeds are
    /// skipped; only `FailFast` classification turns into an error.
    pub async fn parse_feeds(&self, urls: &[String]) -> Result<ParseOutcome, ParseError> {
        super::ensure_metrics_described();
        let mut out = ParseOutcome::default();

        for raw in urls {
            let url = match validate_feed_url(raw) {
                Ok(u) => u,
                Err(e) => {
                    tracing::warn!(url = %raw, error = %e, "skipping invalid feed url");
                    counter!("feed_invalid_urls_total").increment(1);
                    out.skipped_urls.push(raw.clone());
                    continue;
                }
            };

            let items = match self.fetch_items(&url).await {
                Ok(items) => items,
                Err(e) => {
                    tracing::warn!(url = %url, error = ?e, "feed fetch/parse failed");
                    counter!("feed_fetch_errors_total").increment(1);
                    out.skipped_urls.push(raw.clone());
                    continue;
                }
            };
            counter!("feed_entries_parsed_total").increment(items.len() as u64);

            for item in items {
                match self.build_entry(item) {
                    Ok(entry) => out.entries.push(entry),
                    Err((reason, external_id, title)) => {
                        if reason == RejectReason::Unclassified
                            && self.policy == ClassificationPolicy::FailFast
                        {
                            return Err(ParseError::Unclassified {
                                url: url.to_string(),
                                external_id: external_id.unwrap_or_default(),
                            });
                        }
                        tracing::warn!(
                            url = %url,
                            external_id = ?external_id,
                            reason = ?reason,
                            "feed entry rejected"
                        );
                        counter!("feed_entries_rejected_total").increment(1);
                        out.rejected.push(EntryRejection {
                            url: url.to_string(),
                            external_id,
                            title,
                            reason,
                        });
                    }
                }
            }
        }

        Ok(out)
    }

    async fn fetch_items(&self, url: &Url) -> anyhow::Result<Vec<RawItem>> {
        let body = self.fetcher.fetch(url).await?;
        Ok(feed::parse_document(&body)?)
    }

    #[allow(clippy::type_complexity)]
    fn build_entry(
        &self,
        item: RawItem,
    ) -> Result<FeedEntry, (RejectReason, Option<String>, Option<String>)> {
        let Some(external_id) = item.id else {
            return Err((RejectReason::MissingId, None, item.title));
        };
        let Some(published_at) = item.published_at else {
            return Err((RejectReason::MissingPublishedAt, Some(external_id), item.title));
        };
        let summary = item.summary.unwrap_or_default();
        let Some(severity) = self.classifier.classify(&summary) else {
            return Err((RejectReason::Unclassified, Some(external_id), item.title));
        };

        Ok(FeedEntry {
            external_id,
            published_at,
            title: item.title.unwrap_or_default(),
            link: item.link.unwrap_or_default(),
            summary,
            severity: severity.clone(),
            delivered: false,
        })
    }
}
