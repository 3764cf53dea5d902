// src/store/memory.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use super::{InsertOutcome, Store, StoreError};
use crate::types::{FeedEntry, FeedUrl, HazardSeverity, MessageTemplate, Recipient};

/// Reference data the in-memory store starts from (JSON or TOML).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSeed {
    pub severities: Vec<HazardSeverity>,
    pub feed_urls: Vec<FeedUrl>,
    pub recipients: Vec<Recipient>,
    pub templates: Vec<MessageTemplate>,
    pub entries: Vec<FeedEntry>,
}

#[derive(Debug, Default)]
struct Inner {
    severities: Vec<HazardSeverity>,
    feed_urls: Vec<FeedUrl>,
    recipients: Vec<Recipient>,
    templates: HashMap<String, MessageTemplate>,
    entries: Vec<FeedEntry>,
    by_id: HashMap<String, usize>,
}

impl Inner {
    fn push_entry(&mut self, entry: FeedEntry) -> InsertOutcome {
        if self.by_id.contains_key(&entry.external_id) {
            return InsertOutcome::Duplicate;
        }
        self.by_id
            .insert(entry.external_id.clone(), self.entries.len());
        self.entries.push(entry);
        InsertOutcome::Inserted
    }
}

/// Process-local [`Store`]. Check-and-insert happens under one lock, so the
/// external id stays unique even with concurrent ingestion runs.
///
/// With a state file attached, entries are restored on startup and written
/// back after every mutation.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
    offline: AtomicBool,
    state_path: Option<PathBuf>,
    snapshot_lock: tokio::sync::Mutex<()>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_seed(seed: StoreSeed) -> Self {
        let mut inner = Inner {
            severities: seed.severities,
            feed_urls: seed.feed_urls,
            recipients: seed.recipients,
            templates: seed
                .templates
                .into_iter()
                .map(|t| (t.title.clone(), t))
                .collect(),
            ..Inner::default()
        };
        for e in seed.entries {
            inner.push_entry(e);
        }
        Self {
            inner: Mutex::new(inner),
            ..Self::default()
        }
    }

    /// Load a seed file; format is picked by extension (`.toml`, else JSON).
    pub fn load_seed(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading store seed from {}", path.display()))?;
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let seed: StoreSeed = if ext == "toml" {
            toml::from_str(&content).context("parsing toml store seed")?
        } else {
            serde_json::from_str(&content).context("parsing json store seed")?
        };
        Ok(Self::from_seed(seed))
    }

    /// Attach a JSON state file. Entries already in the file are restored.
    pub fn with_state_file(mut self, path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if path.exists() {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("reading entry state from {}", path.display()))?;
            let entries: Vec<FeedEntry> =
                serde_json::from_str(&raw).context("parsing entry state")?;
            let inner = self
                .inner
                .get_mut()
                .map_err(|_| anyhow::anyhow!("store mutex poisoned"))?;
            let mut restored = 0usize;
            for e in entries {
                if inner.push_entry(e) == InsertOutcome::Inserted {
                    restored += 1;
                }
            }
            tracing::info!(path = %path.display(), restored, "restored feed entries");
        }
        self.state_path = Some(path);
        Ok(self)
    }

    /// Simulate a backend outage: every query fails with `Unavailable`.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn add_severity(&self, severity: HazardSeverity) -> Result<(), StoreError> {
        self.lock()?.severities.push(severity);
        Ok(())
    }

    pub fn add_feed_url(&self, url: impl Into<String>, active: bool) -> Result<(), StoreError> {
        self.lock()?.feed_urls.push(FeedUrl {
            url: url.into(),
            active,
        });
        Ok(())
    }

    pub fn add_recipient(&self, email: impl Into<String>, active: bool) -> Result<(), StoreError> {
        self.lock()?.recipients.push(Recipient {
            email: email.into(),
            active,
        });
        Ok(())
    }

    pub fn put_template(&self, title: impl Into<String>, body: impl Into<String>) -> Result<(), StoreError> {
        let title = title.into();
        self.lock()?.templates.insert(
            title.clone(),
            MessageTemplate {
                title,
                body: body.into(),
            },
        );
        Ok(())
    }

    pub fn entries(&self) -> Result<Vec<FeedEntry>, StoreError> {
        Ok(self.lock()?.entries.clone())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("store is offline".into()));
        }
        self.inner
            .lock()
            .map_err(|_| StoreError::Unavailable("store mutex poisoned".into()))
    }

    async fn write_snapshot(&self) {
        let Some(path) = &self.state_path else {
            return;
        };
        let _guard = self.snapshot_lock.lock().await;
        let body = match self.lock() {
            Ok(inner) => serde_json::to_vec_pretty(&inner.entries),
            Err(e) => {
                tracing::warn!(error = %e, "entry snapshot skipped");
                return;
            }
        };
        let body = match body {
            Ok(b) => b,
            Err(e) => {
                tracing::warn!(error = %e, "entry snapshot not serializable; keeping previous state");
                return;
            }
        };
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            if let Err(e) = tokio::fs::create_dir_all(dir).await {
                tracing::warn!("state dir: {e:#}");
            }
        }
        // Write then rename so a crash never leaves a truncated state file.
        let tmp = path.with_extension("tmp");
        if let Err(e) = tokio::fs::write(&tmp, body).await {
            tracing::warn!("write entry state: {e:#}");
            return;
        }
        if let Err(e) = tokio::fs::rename(&tmp, path).await {
            tracing::warn!("replace entry state: {e:#}");
        }
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn severities(&self) -> Result<Vec<HazardSeverity>, StoreError> {
        Ok(self.lock()?.severities.clone())
    }

    async fn active_feed_urls(&self) -> Result<Vec<String>, StoreError> {
        Ok(self
            .lock()?
            .feed_urls
            .iter()
            .filter(|f| f.active)
            .map(|f| f.url.clone())
            .collect())
    }

    async fn entry_exists(&self, external_id: &str) -> Result<bool, StoreError> {
        Ok(self.lock()?.by_id.contains_key(external_id))
    }

    async fn insert_entry(&self, entry: &FeedEntry) -> Result<InsertOutcome, StoreError> {
        let outcome = self.lock()?.push_entry(entry.clone());
        if outcome == InsertOutcome::Inserted {
            self.write_snapshot().await;
        }
        Ok(outcome)
    }

    async fn mark_delivered(&self, external_id: &str) -> Result<(), StoreError> {
        {
            let mut inner = self.lock()?;
            let idx = *inner
                .by_id
                .get(external_id)
                .ok_or_else(|| StoreError::NotFound(external_id.to_string()))?;
            inner.entries[idx].delivered = true;
        }
        self.write_snapshot().await;
        Ok(())
    }

    async fn undelivered_entries(&self) -> Result<Vec<FeedEntry>, StoreError> {
        Ok(self
            .lock()?
            .entries
            .iter()
            .filter(|e| !e.delivered)
            .cloned()
            .collect())
    }

    async fn active_recipients(&self) -> Result<Vec<String>, StoreError> {
        Ok(self
            .lock()?
            .recipients
            .iter()
            .filter(|r| r.active)
            .map(|r| r.email.clone())
            .collect())
    }

    async fn template(&self, title: &str) -> Result<Option<MessageTemplate>, StoreError> {
        Ok(self.lock()?.templates.get(title).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn entry(id: &str) -> FeedEntry {
        FeedEntry {
            external_id: id.into(),
            published_at: Utc.with_ymd_and_hms(2025, 9, 6, 9, 0, 0).unwrap(),
            title: "Storm Warning".into(),
            link: "http://example.com/1".into(),
            summary: "Severe wind".into(),
            severity: HazardSeverity::new("Severe"),
            delivered: false,
        }
    }

    #[tokio::test]
    async fn insert_is_unique_by_external_id() {
        let store = MemoryStore::new();
        assert_eq!(store.insert_entry(&entry("a")).await.unwrap(), InsertOutcome::Inserted);
        assert_eq!(store.insert_entry(&entry("a")).await.unwrap(), InsertOutcome::Duplicate);
        assert_eq!(store.entries().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn only_active_rows_are_returned() {
        let store = MemoryStore::new();
        store.add_recipient("a@example.com", true).unwrap();
        store.add_recipient("b@example.com", false).unwrap();
        store.add_feed_url("http://example.com/rss", false).unwrap();
        assert_eq!(store.active_recipients().await.unwrap(), vec!["a@example.com"]);
        assert!(store.active_feed_urls().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn offline_store_reports_unavailable() {
        let store = MemoryStore::new();
        store.set_offline(true);
        assert!(matches!(
            store.entry_exists("a").await,
            Err(StoreError::Unavailable(_))
        ));
        store.set_offline(false);
        assert!(!store.entry_exists("a").await.unwrap());
    }

    #[tokio::test]
    async fn state_file_round_trips_entries_and_delivery() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("entries.json");

        let store = MemoryStore::new().with_state_file(&path).unwrap();
        store.insert_entry(&entry("a")).await.unwrap();
        store.insert_entry(&entry("b")).await.unwrap();
        store.mark_delivered("a").await.unwrap();

        let reopened = MemoryStore::new().with_state_file(&path).unwrap();
        let pending = reopened.undelivered_entries().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].external_id, "b");
        assert!(reopened.entry_exists("a").await.unwrap());
    }

    #[tokio::test]
    async fn state_file_is_replaced_whole_without_leftovers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("entries.json");

        let store = MemoryStore::new().with_state_file(&path).unwrap();
        store.insert_entry(&entry("a")).await.unwrap();
        store.insert_entry(&entry("b")).await.unwrap();

        assert!(!path.with_extension("tmp").exists());
        let raw = std::fs::read_to_string(&path).unwrap();
        let saved: Vec<FeedEntry> = serde_json::from_str(&raw).unwrap();
        assert_eq!(saved.len(), 2);
    }

    #[tokio::test]
    async fn mark_delivered_unknown_id_is_not_found() {
        let store = MemoryStore::new();
        assert!(matches!(
            store.mark_delivered("nope").await,
            Err(StoreError::NotFound(_))
        ));
    }
}
