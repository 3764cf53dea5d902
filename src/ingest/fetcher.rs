// src/ingest/fetcher.rs
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use url::Url;

/// Fetches a feed document body.
#[async_trait]
pub trait FeedFetcher: Send + Sync {
    async fn fetch(&self, url: &Url) -> Result<String>;
}

pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("hazard-feed/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("building feed http client")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl FeedFetcher for HttpFetcher {
    async fn fetch(&self, url: &Url) -> Result<String> {
        self.client
            .get(url.clone())
            .send()
            .await
            .with_context(|| format!("feed get {url}"))?
            .error_for_status()
            .with_context(|| format!("feed status {url}"))?
            .text()
            .await
            .context("feed http .text()")
    }
}

/// Serves documents from memory, keyed by URL. Used by fixtures and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticFetcher {
    docs: HashMap<String, String>,
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(mut self, url: &str, body: impl Into<String>) -> Self {
        // Normalize through Url so lookups match what the parser passes in.
        let key = Url::parse(url)
            .map(|u| u.to_string())
            .unwrap_or_else(|_| url.to_string());
        self.docs.insert(key, body.into());
        self
    }
}

#[async_trait]
impl FeedFetcher for StaticFetcher {
    async fn fetch(&self, url: &Url) -> Result<String> {
        self.docs
            .get(url.as_str())
            .cloned()
            .ok_or_else(|| anyhow!("no document for {url}"))
    }
}
