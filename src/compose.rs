// src/compose.rs
//! Builds dual-form (text + HTML) notification messages from stored templates.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use handlebars::Handlebars;
use lettre::message::Mailbox;
use once_cell::sync::OnceCell;
use regex::Regex;
use serde_json::{json, Value};
use std::sync::Arc;
use thiserror::Error;

use crate::store::{Store, StoreError};
use crate::types::{
    ComposedMessage, FeedEntry, MessageTemplate, ACTIVATION_TEMPLATE, DEACTIVATION_TEMPLATE,
    WEATHER_TEMPLATE,
};

pub const ACTIVATION_SUBJECT: &str = "Код активации подписки";
pub const DEACTIVATION_SUBJECT: &str = "Код деактивации подписки";

/// Format of the `date` value handed to the hazard template.
const DATE_FORMAT: &str = "%d.%m.%Y %H:%M";

#[derive(Debug, Error)]
pub enum ComposeError {
    #[error("message template {0:?} is missing")]
    MissingTemplate(String),
    #[error("loading template: {0}")]
    Store(#[from] StoreError),
    #[error("rendering template {name:?} failed")]
    Render {
        name: String,
        #[source]
        source: anyhow::Error,
    },
}

/// Pure function from template source + context to HTML.
pub trait TemplateRenderer: Send + Sync {
    fn render(&self, source: &str, context: &Value) -> anyhow::Result<String>;
}

/// Handlebars renderer. Values are HTML-escaped unless the template uses
/// triple braces.
pub struct HandlebarsRenderer {
    registry: Handlebars<'static>,
}

impl HandlebarsRenderer {
    pub fn new() -> Self {
        let mut registry = Handlebars::new();
        registry.set_strict_mode(false);
        Self { registry }
    }
}

impl Default for HandlebarsRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateRenderer for HandlebarsRenderer {
    fn render(&self, source: &str, context: &Value) -> anyhow::Result<String> {
        Ok(self.registry.render_template(source, context)?)
    }
}

pub struct MessageComposer {
    store: Arc<dyn Store>,
    renderer: Arc<dyn TemplateRenderer>,
    sender: Mailbox,
    time_zone: Tz,
}

impl MessageComposer {
    pub fn new(
        store: Arc<dyn Store>,
        renderer: Arc<dyn TemplateRenderer>,
        sender: Mailbox,
        time_zone: Tz,
    ) -> Self {
        Self {
            store,
            renderer,
            sender,
            time_zone,
        }
    }

    pub async fn compose_hazard_alert(
        &self,
        entry: &FeedEntry,
    ) -> Result<ComposedMessage, ComposeError> {
        self.compose_hazard_alert_at(entry, Utc::now()).await
    }

    /// Same as [`Self::compose_hazard_alert`] with an explicit clock.
    pub async fn compose_hazard_alert_at(
        &self,
        entry: &FeedEntry,
        now: DateTime<Utc>,
    ) -> Result<ComposedMessage, ComposeError> {
        let template = self.load_template(WEATHER_TEMPLATE).await?;
        let local = now.with_timezone(&self.time_zone);
        let context = json!({
            "date": local.format(DATE_FORMAT).to_string(),
            "feed": entry,
        });
        self.build(&template, &context, entry.title.clone())
    }

    pub async fn compose_activation_code(&self, code: &str) -> Result<ComposedMessage, ComposeError> {
        let template = self.load_template(ACTIVATION_TEMPLATE).await?;
        self.build(&template, &json!({ "code": code }), ACTIVATION_SUBJECT.to_string())
    }

    pub async fn compose_deactivation_code(
        &self,
        code: &str,
    ) -> Result<ComposedMessage, ComposeError> {
        let template = self.load_template(DEACTIVATION_TEMPLATE).await?;
        self.build(&template, &json!({ "code": code }), DEACTIVATION_SUBJECT.to_string())
    }

    async fn load_template(&self, name: &str) -> Result<MessageTemplate, ComposeError> {
        self.store
            .template(name)
            .await?
            .ok_or_else(|| ComposeError::MissingTemplate(name.to_string()))
    }

    fn build(
        &self,
        template: &MessageTemplate,
        context: &Value,
        subject: String,
    ) -> Result<ComposedMessage, ComposeError> {
        let html_body = self
            .renderer
            .render(&template.body, context)
            .map_err(|source| ComposeError::Render {
                name: template.title.clone(),
                source,
            })?;
        Ok(ComposedMessage {
            from: self.sender.clone(),
            subject,
            text_body: strip_markup(&html_body),
            html_body,
        })
    }
}

/// Plain-text form of an HTML body: block closers and `<br>` become line
/// breaks, remaining tags are dropped, entities decoded, blank runs collapsed.
pub fn strip_markup(html: &str) -> String {
    static RE_HIDDEN: OnceCell<Regex> = OnceCell::new();
    static RE_BREAKS: OnceCell<Regex> = OnceCell::new();
    static RE_TAGS: OnceCell<Regex> = OnceCell::new();

    let re_hidden = RE_HIDDEN.get_or_init(|| {
        Regex::new(r"(?is)<!--.*?-->|<script\b[^>]*>.*?</script\s*>|<style\b[^>]*>.*?</style\s*>")
            .expect("hidden markup regex")
    });
    let re_breaks = RE_BREAKS.get_or_init(|| {
        Regex::new(r"(?i)<br\s*/?>|</(?:p|div|li|tr|h[1-6]|table|ul|ol|blockquote)\s*>")
            .expect("line break regex")
    });
    let re_tags = RE_TAGS.get_or_init(|| Regex::new(r"(?s)<[^>]*>").expect("tag regex"));

    let s = html.replace("\r\n", "\n");
    let s = re_hidden.replace_all(&s, "");
    let s = re_breaks.replace_all(&s, "\n");
    let s = re_tags.replace_all(&s, "");
    let s = html_escape::decode_html_entities(&s);

    let mut out = String::with_capacity(s.len());
    let mut blank_run = 0usize;
    for line in s.lines() {
        let line = line.trim();
        if line.is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        out.push_str(line);
        out.push('\n');
    }
    out.trim().to_string()
}
