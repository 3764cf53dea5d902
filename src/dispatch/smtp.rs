// src/dispatch/smtp.rs
use async_trait::async_trait;
use lettre::address::Envelope;
use lettre::message::{Message, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::AsyncSmtpTransport;
use lettre::{Address, AsyncTransport, Tokio1Executor};
use metrics::{counter, histogram};
use std::time::{Duration, Instant};

use super::{DispatchError, Dispatcher};
use crate::config::SmtpConfig;
use crate::types::ComposedMessage;

/// Authenticated SMTP submission. Implicit TLS when `use_tls` is set.
pub struct SmtpDispatcher {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    timeout: Duration,
}

impl SmtpDispatcher {
    /// Builds the transport only; no connection is opened until `send`.
    pub fn new(cfg: &SmtpConfig) -> Result<Self, DispatchError> {
        let timeout = Duration::from_secs(cfg.timeout_secs.max(1));
        let mut builder = if cfg.use_tls {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&cfg.host)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&cfg.host)
        };
        builder = builder.port(cfg.port).timeout(Some(timeout));
        if !cfg.username.is_empty() {
            builder = builder.credentials(Credentials::new(
                cfg.username.clone(),
                cfg.password.clone(),
            ));
        }
        Ok(Self {
            mailer: builder.build(),
            timeout,
        })
    }
}

/// Build the wire message: From/Subject headers, text + HTML alternative,
/// recipients only in the envelope.
pub fn build_email(message: &ComposedMessage, to: Vec<Address>) -> Result<Message, DispatchError> {
    let envelope = Envelope::new(Some(message.from.email.clone()), to)?;
    let email = Message::builder()
        .from(message.from.clone())
        .subject(message.subject.clone())
        .envelope(envelope)
        .multipart(MultiPart::alternative_plain_html(
            message.text_body.clone(),
            message.html_body.clone(),
        ))?;
    Ok(email)
}

fn parse_recipients(recipients: &[String]) -> Vec<Address> {
    recipients
        .iter()
        .filter_map(|r| match r.trim().parse::<Address>() {
            Ok(a) => Some(a),
            Err(e) => {
                tracing::warn!(recipient = %r, error = %e, "dropping invalid recipient");
                None
            }
        })
        .collect()
}

#[async_trait]
impl Dispatcher for SmtpDispatcher {
    async fn send(
        &self,
        message: &ComposedMessage,
        recipients: &[String],
    ) -> Result<(), DispatchError> {
        if recipients.is_empty() {
            tracing::debug!(subject = %message.subject, "no recipients; nothing to send");
            return Ok(());
        }
        let to = parse_recipients(recipients);
        if to.is_empty() {
            tracing::warn!(subject = %message.subject, "no valid recipients; nothing to send");
            return Ok(());
        }
        let count = to.len();
        let email = build_email(message, to)?;

        let t0 = Instant::now();
        let res = tokio::time::timeout(self.timeout, self.mailer.send(email)).await;
        histogram!("notify_dispatch_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);

        match res {
            Ok(Ok(_)) => {
                counter!("notify_dispatch_total").increment(1);
                tracing::info!(subject = %message.subject, recipients = count, "email sent");
                Ok(())
            }
            Ok(Err(e)) => {
                counter!("notify_dispatch_errors_total").increment(1);
                Err(e.into())
            }
            Err(_) => {
                counter!("notify_dispatch_errors_total").increment(1);
                Err(DispatchError::Timeout(self.timeout))
            }
        }
    }
}
