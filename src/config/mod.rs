// src/config/mod.rs
pub mod smtp;

use anyhow::{anyhow, Context, Result};
use chrono_tz::Tz;
use lettre::message::Mailbox;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::ingest::{validate_feed_url, ClassificationPolicy};

pub use smtp::SmtpConfig;

pub const ENV_CONFIG_PATH: &str = "HAZARD_FEED_CONFIG_PATH";

fn default_time_zone() -> String {
    "UTC".to_string()
}
fn default_poll_interval_secs() -> u64 {
    600
}
fn default_fetch_timeout_secs() -> u64 {
    20
}

/// Everything the pipeline needs, loaded once and passed down explicitly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HazardFeedConfig {
    pub smtp: SmtpConfig,
    /// From address, e.g. `"Hazard Feed <alerts@example.com>"`.
    pub sender: String,
    /// Polled when the store has no active feed URLs.
    pub default_feed_url: String,
    /// IANA zone used for the date shown in hazard mails.
    #[serde(default = "default_time_zone")]
    pub time_zone: String,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
    #[serde(default)]
    pub classification_policy: ClassificationPolicy,
    /// Reference data (severities, templates, recipients, feed URLs).
    #[serde(default)]
    pub store_seed_path: Option<PathBuf>,
    /// JSON file the stored entries are written to and restored from.
    #[serde(default)]
    pub state_path: Option<PathBuf>,
}

impl HazardFeedConfig {
    pub fn sender_mailbox(&self) -> Result<Mailbox> {
        self.sender
            .parse()
            .with_context(|| format!("invalid sender address {:?}", self.sender))
    }

    pub fn tz(&self) -> Result<Tz> {
        self.time_zone
            .parse::<Tz>()
            .map_err(|e| anyhow!("unknown time zone {:?}: {e}", self.time_zone))
    }

    /// Resolve `"ENV"` secrets and check every field that can be checked
    /// without network access.
    pub fn finalize(mut self) -> Result<Self> {
        self.smtp.resolve_secrets()?;
        self.smtp.validate()?;
        self.sender_mailbox()?;
        self.tz()?;
        validate_feed_url(&self.default_feed_url)
            .with_context(|| format!("default_feed_url {:?}", self.default_feed_url))?;
        if self.poll_interval_secs == 0 {
            anyhow::bail!("poll_interval_secs must be non-zero");
        }
        if self.fetch_timeout_secs == 0 {
            anyhow::bail!("fetch_timeout_secs must be non-zero");
        }
        Ok(self)
    }
}

/// Load config from an explicit path. Supports TOML or JSON formats.
pub fn load_from(path: &Path) -> Result<HazardFeedConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading config from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    let cfg: HazardFeedConfig = match ext.as_str() {
        "json" => serde_json::from_str(&content).context("parsing json config")?,
        _ => toml::from_str(&content).context("parsing toml config")?,
    };
    cfg.finalize()
}

/// Load config using env var + fallbacks:
/// 1) $HAZARD_FEED_CONFIG_PATH
/// 2) config/hazard_feed.toml
/// 3) config/hazard_feed.json
pub fn load_default() -> Result<HazardFeedConfig> {
    if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return load_from(&pb);
        }
        return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
    }
    let toml_p = PathBuf::from("config/hazard_feed.toml");
    if toml_p.exists() {
        return load_from(&toml_p);
    }
    let json_p = PathBuf::from("config/hazard_feed.json");
    if json_p.exists() {
        return load_from(&json_p);
    }
    Err(anyhow!(
        "no config found; set {ENV_CONFIG_PATH} or add config/hazard_feed.toml"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
sender = "Hazard Feed <alerts@example.com>"
default_feed_url = "http://example.com/rss"

[smtp]
host = "smtp.example.com"
"#;

    #[test]
    fn defaults_fill_optional_fields() {
        let cfg: HazardFeedConfig = toml::from_str(MINIMAL).unwrap();
        let cfg = cfg.finalize().unwrap();
        assert_eq!(cfg.smtp.port, 25);
        assert!(!cfg.smtp.use_tls);
        assert_eq!(cfg.smtp.timeout_secs, 30);
        assert_eq!(cfg.time_zone, "UTC");
        assert_eq!(cfg.poll_interval_secs, 600);
        assert_eq!(cfg.classification_policy, ClassificationPolicy::Collect);
        assert!(cfg.state_path.is_none());
    }

    #[test]
    fn bad_values_are_rejected() {
        let mut cfg: HazardFeedConfig = toml::from_str(MINIMAL).unwrap();
        cfg.time_zone = "Mars/Olympus".into();
        assert!(cfg.clone().finalize().is_err());

        let mut cfg: HazardFeedConfig = toml::from_str(MINIMAL).unwrap();
        cfg.sender = "not a mailbox".into();
        assert!(cfg.finalize().is_err());

        let mut cfg: HazardFeedConfig = toml::from_str(MINIMAL).unwrap();
        cfg.default_feed_url = "rss please".into();
        assert!(cfg.finalize().is_err());

        let mut cfg: HazardFeedConfig = toml::from_str(MINIMAL).unwrap();
        cfg.fetch_timeout_secs = 0;
        let err = cfg.finalize().unwrap_err();
        assert!(err.to_string().contains("fetch_timeout_secs"));
    }
}
