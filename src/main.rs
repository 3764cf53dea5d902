//! Hazard feed service — binary entrypoint.
//! Loads config, starts the poller and notification worker, serves the
//! task-trigger API.

use shuttle_axum::ShuttleAxum;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Compact logs filtered by RUST_LOG. No-op when the runtime already
/// installed a subscriber.
fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("hazard_feed=info,warn"));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .try_init();
}

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = hazard_feed::config::load_default()?;
    let router = hazard_feed::app::build(cfg).await?;

    Ok(router.into())
}
