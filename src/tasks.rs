// src/tasks.rs
//! The three entry points the scheduler and HTTP triggers invoke.

use anyhow::Result;
use metrics::gauge;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::classify::{ClassifierError, SeverityClassifier};
use crate::compose::{ComposeError, MessageComposer, TemplateRenderer};
use crate::config::HazardFeedConfig;
use crate::dispatch::{DispatchError, Dispatcher};
use crate::ingest::{
    resolve_feed_urls, try_persist, ClassificationPolicy, EntryRejection, FeedFetcher,
    FeedParser, ParseError,
};
use crate::store::{Store, StoreError};
use crate::types::FeedEntry;

/// Emitted after an entry was durably inserted; consumed by the
/// notification worker.
#[derive(Debug, Clone)]
pub struct EntryPersisted {
    pub entry: FeedEntry,
}

#[derive(Debug, Error)]
pub enum TaskError {
    #[error(transparent)]
    Classifier(#[from] ClassifierError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Compose(#[from] ComposeError),
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestReport {
    pub sources: usize,
    pub parsed: usize,
    pub persisted: usize,
    /// Already stored, or skipped because the store was unavailable.
    pub not_persisted: usize,
    pub skipped_urls: Vec<String>,
    pub rejected: Vec<EntryRejection>,
}

pub struct Tasks {
    store: Arc<dyn Store>,
    fetcher: Arc<dyn FeedFetcher>,
    composer: MessageComposer,
    dispatcher: Arc<dyn Dispatcher>,
    default_feed_url: String,
    policy: ClassificationPolicy,
    persisted_tx: Option<mpsc::Sender<EntryPersisted>>,
}

impl Tasks {
    pub fn new(
        cfg: &HazardFeedConfig,
        store: Arc<dyn Store>,
        fetcher: Arc<dyn FeedFetcher>,
        renderer: Arc<dyn TemplateRenderer>,
        dispatcher: Arc<dyn Dispatcher>,
    ) -> Result<Self> {
        let composer = MessageComposer::new(
            store.clone(),
            renderer,
            cfg.sender_mailbox()?,
            cfg.tz()?,
        );
        Ok(Self {
            store,
            fetcher,
            composer,
            dispatcher,
            default_feed_url: cfg.default_feed_url.clone(),
            policy: cfg.classification_policy,
            persisted_tx: None,
        })
    }

    /// Publish an [`EntryPersisted`] event for every newly stored entry.
    pub fn with_persist_events(mut self, tx: mpsc::Sender<EntryPersisted>) -> Self {
        self.persisted_tx = Some(tx);
        self
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub fn composer(&self) -> &MessageComposer {
        &self.composer
    }

    /// Poll every feed source once and persist unseen entries.
    pub async fn ingest_feeds(&self) -> Result<IngestReport, TaskError> {
        let urls = resolve_feed_urls(self.store.as_ref(), &self.default_feed_url).await;
        let classifier = SeverityClassifier::load(self.store.as_ref()).await?;
        let outcome = FeedParser::new(self.fetcher.as_ref(), &classifier)
            .with_policy(self.policy)
            .parse_feeds(&urls)
            .await?;

        let mut report = IngestReport {
            sources: urls.len(),
            parsed: outcome.entries.len(),
            skipped_urls: outcome.skipped_urls,
            rejected: outcome.rejected,
            ..IngestReport::default()
        };

        for entry in outcome.entries {
            if !try_persist(self.store.as_ref(), &entry).await {
                report.not_persisted += 1;
                continue;
            }
            report.persisted += 1;
            if let Some(tx) = &self.persisted_tx {
                if tx.send(EntryPersisted { entry }).await.is_err() {
                    tracing::warn!("persist event receiver closed; notification not queued");
                }
            }
        }

        gauge!("ingest_last_run_ts").set(chrono::Utc::now().timestamp() as f64);
        tracing::info!(
            target: "ingest",
            sources = report.sources,
            parsed = report.parsed,
            persisted = report.persisted,
            rejected = report.rejected.len(),
            "ingest run finished"
        );
        Ok(report)
    }

    /// Mail a hazard entry to all active recipients. Returns how many
    /// recipients the message was addressed to.
    pub async fn notify_hazard(&self, entry: &FeedEntry) -> Result<usize, TaskError> {
        let recipients = self.store.active_recipients().await?;
        let message = self.composer.compose_hazard_alert(entry).await?;
        self.dispatcher.send(&message, &recipients).await?;
        Ok(recipients.len())
    }

    /// Mail a subscription (de)activation code to the given addresses.
    pub async fn notify_subscription_code(
        &self,
        code: &str,
        recipients: &[String],
        activate: bool,
    ) -> Result<(), TaskError> {
        let message = if activate {
            self.composer.compose_activation_code(code).await?
        } else {
            self.composer.compose_deactivation_code(code).await?
        };
        self.dispatcher.send(&message, recipients).await?;
        Ok(())
    }

    /// `notify_hazard` followed by flagging the entry as delivered.
    pub async fn deliver_hazard(&self, entry: &FeedEntry) -> Result<usize, TaskError> {
        let sent_to = self.notify_hazard(entry).await?;
        self.store.mark_delivered(&entry.external_id).await?;
        Ok(sent_to)
    }
}
