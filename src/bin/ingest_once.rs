//! Runs one ingestion pass against the configured feeds and prints the report.
//! Nothing is mailed: notifications go to an in-memory dispatcher.

use std::sync::Arc;
use std::time::Duration;

use hazard_feed::compose::HandlebarsRenderer;
use hazard_feed::dispatch::RecordingDispatcher;
use hazard_feed::ingest::HttpFetcher;
use hazard_feed::Tasks;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt().with_target(false).init();

    let cfg = hazard_feed::config::load_default()?;
    let store = hazard_feed::app::open_store(&cfg)?;
    let tasks = Tasks::new(
        &cfg,
        store,
        Arc::new(HttpFetcher::new(Duration::from_secs(cfg.fetch_timeout_secs))?),
        Arc::new(HandlebarsRenderer::new()),
        Arc::new(RecordingDispatcher::new()),
    )?;

    let report = tasks.ingest_feeds().await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
