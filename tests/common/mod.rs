// tests/common/mod.rs
#![allow(dead_code)]

use std::sync::Arc;

use hazard_feed::compose::HandlebarsRenderer;
use hazard_feed::dispatch::RecordingDispatcher;
use hazard_feed::ingest::StaticFetcher;
use hazard_feed::store::MemoryStore;
use hazard_feed::types::{HazardSeverity, ACTIVATION_TEMPLATE, DEACTIVATION_TEMPLATE, WEATHER_TEMPLATE};
use hazard_feed::{HazardFeedConfig, Tasks};

pub const DEFAULT_FEED: &str = "http://example.com/rss";
pub const RSS_FIXTURE: &str = include_str!("../fixtures/hazard_rss.xml");
pub const ATOM_FIXTURE: &str = include_str!("../fixtures/hazard_atom.xml");

pub const WEATHER_BODY: &str =
    "<h1>{{feed.title}}</h1><p>{{feed.summary}}</p><p>Issued {{date}}</p>";

pub fn config() -> HazardFeedConfig {
    let cfg: HazardFeedConfig = toml::from_str(&format!(
        r#"
sender = "Hazard Feed <alerts@example.com>"
default_feed_url = "{DEFAULT_FEED}"

[smtp]
host = "127.0.0.1"
"#
    ))
    .expect("parse test config");
    cfg.finalize().expect("valid test config")
}

/// Severities Severe/Moderate, all three templates, two active recipients
/// and one inactive.
pub fn seeded_store() -> Arc<MemoryStore> {
    let store = MemoryStore::new();
    store.add_severity(HazardSeverity::new("Severe")).unwrap();
    store.add_severity(HazardSeverity::new("Moderate")).unwrap();
    store.put_template(WEATHER_TEMPLATE, WEATHER_BODY).unwrap();
    store
        .put_template(ACTIVATION_TEMPLATE, "<p>Your code: <b>{{code}}</b></p>")
        .unwrap();
    store
        .put_template(DEACTIVATION_TEMPLATE, "<p>Unsubscribe code: {{code}}</p>")
        .unwrap();
    store.add_recipient("ops@example.com", true).unwrap();
    store.add_recipient("duty@example.com", true).unwrap();
    store.add_recipient("retired@example.com", false).unwrap();
    Arc::new(store)
}

pub fn tasks_with(
    store: Arc<MemoryStore>,
    fetcher: StaticFetcher,
    dispatcher: Arc<RecordingDispatcher>,
) -> Tasks {
    Tasks::new(
        &config(),
        store,
        Arc::new(fetcher),
        Arc::new(HandlebarsRenderer::new()),
        dispatcher,
    )
    .expect("build tasks")
}
