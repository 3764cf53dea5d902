// src/app.rs
//! Wires config, store, tasks, background workers and the HTTP surface.

use anyhow::{Context, Result};
use axum::Router;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::api::{self, AppState};
use crate::classify::SeverityClassifier;
use crate::compose::HandlebarsRenderer;
use crate::config::HazardFeedConfig;
use crate::dispatch::SmtpDispatcher;
use crate::ingest::HttpFetcher;
use crate::metrics::Metrics;
use crate::scheduler::{requeue_undelivered, spawn_ingest_scheduler, spawn_notification_worker};
use crate::store::{MemoryStore, Store};
use crate::tasks::Tasks;
use crate::types::{ACTIVATION_TEMPLATE, DEACTIVATION_TEMPLATE, WEATHER_TEMPLATE};

const PERSIST_QUEUE: usize = 256;

/// Seeded in-memory store, with the entry state file attached if configured.
pub fn open_store(cfg: &HazardFeedConfig) -> Result<Arc<MemoryStore>> {
    let store = match &cfg.store_seed_path {
        Some(p) => MemoryStore::load_seed(p)?,
        None => MemoryStore::new(),
    };
    let store = match &cfg.state_path {
        Some(p) => store.with_state_file(p.clone())?,
        None => store,
    };
    Ok(Arc::new(store))
}

/// Broken reference data is fatal at startup; missing templates only warn
/// here because composing surfaces them as errors anyway.
async fn check_reference_data(store: &dyn Store) -> Result<()> {
    let classifier = SeverityClassifier::load(store)
        .await
        .context("loading hazard levels")?;
    if classifier.is_empty() {
        tracing::warn!("no hazard levels configured; every feed entry will be rejected");
    }
    for name in [WEATHER_TEMPLATE, ACTIVATION_TEMPLATE, DEACTIVATION_TEMPLATE] {
        if matches!(store.template(name).await, Ok(None)) {
            tracing::warn!(template = name, "message template missing");
        }
    }
    Ok(())
}

/// Start background ingestion + notification and return the router.
pub async fn build(cfg: HazardFeedConfig) -> Result<Router> {
    let store = open_store(&cfg)?;
    check_reference_data(&*store).await?;

    let metrics = Metrics::init()?;
    let fetcher = Arc::new(HttpFetcher::new(Duration::from_secs(cfg.fetch_timeout_secs))?);
    let dispatcher = Arc::new(SmtpDispatcher::new(&cfg.smtp).context("smtp transport")?);

    let (tx, rx) = mpsc::channel(PERSIST_QUEUE);
    let tasks = Arc::new(
        Tasks::new(
            &cfg,
            store,
            fetcher,
            Arc::new(HandlebarsRenderer::new()),
            dispatcher,
        )?
        .with_persist_events(tx.clone()),
    );

    spawn_notification_worker(tasks.clone(), rx);
    let requeued = requeue_undelivered(&tasks, &tx).await;
    if requeued > 0 {
        tracing::info!(requeued, "queued undelivered hazard entries");
    }
    drop(tx);

    spawn_ingest_scheduler(tasks.clone(), Duration::from_secs(cfg.poll_interval_secs));
    tracing::info!(
        interval_secs = cfg.poll_interval_secs,
        default_feed = %cfg.default_feed_url,
        "hazard feed service started"
    );

    Ok(api::router(AppState { tasks }).merge(metrics.router()))
}
