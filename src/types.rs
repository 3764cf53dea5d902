// src/types.rs
use chrono::{DateTime, Utc};
use lettre::message::Mailbox;
use serde::{Deserialize, Serialize};

/// Template keys the composer looks up in the store.
pub const WEATHER_TEMPLATE: &str = "weather_mail";
pub const ACTIVATION_TEMPLATE: &str = "activation_code_mail";
pub const DEACTIVATION_TEMPLATE: &str = "deactivation_code_mail";

/// Known hazard level. The title is both the label and the match pattern.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct HazardSeverity {
    pub title: String,
}

impl HazardSeverity {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
        }
    }
}

/// One classified item from a hazard feed. `external_id` is the natural key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FeedEntry {
    pub external_id: String,
    pub published_at: DateTime<Utc>,
    pub title: String,
    pub link: String,
    pub summary: String,
    pub severity: HazardSeverity,
    #[serde(default)]
    pub delivered: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FeedUrl {
    pub url: String,
    #[serde(default = "default_true")]
    pub active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Recipient {
    pub email: String,
    #[serde(default = "default_true")]
    pub active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessageTemplate {
    pub title: String,
    pub body: String,
}

/// Rendered, ready-to-send notification. Built once by the composer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposedMessage {
    pub from: Mailbox,
    pub subject: String,
    pub text_body: String,
    pub html_body: String,
}
