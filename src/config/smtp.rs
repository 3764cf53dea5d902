// src/config/smtp.rs
use serde::{Deserialize, Serialize};
use std::env;

fn default_port() -> u16 {
    25
}
fn default_timeout_secs() -> u64 {
    30
}

/// Mail transport settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SmtpConfig {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Implicit TLS (SMTPS). Plain SMTP otherwise.
    #[serde(default)]
    pub use_tls: bool,
    #[serde(default)]
    pub username: String,
    /// "ENV" means: read from SMTP_PASSWORD
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl SmtpConfig {
    pub(crate) fn resolve_secrets(&mut self) -> anyhow::Result<()> {
        if self.password.trim().eq_ignore_ascii_case("env") {
            self.password = env::var("SMTP_PASSWORD")
                .map_err(|_| anyhow::anyhow!("Missing SMTP_PASSWORD env var"))?;
        }
        Ok(())
    }

    pub(crate) fn validate(&self) -> anyhow::Result<()> {
        if self.host.trim().is_empty() {
            anyhow::bail!("smtp.host is empty");
        }
        if self.port == 0 {
            anyhow::bail!("smtp.port must be non-zero");
        }
        Ok(())
    }
}
