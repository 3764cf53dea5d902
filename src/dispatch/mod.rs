// src/dispatch/mod.rs
pub mod recording;
pub mod smtp;

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

use crate::types::ComposedMessage;

pub use recording::RecordingDispatcher;
pub use smtp::{build_email, SmtpDispatcher};

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("building email: {0}")]
    Build(#[from] lettre::error::Error),
    #[error("smtp transport: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),
    #[error("smtp send timed out after {0:?}")]
    Timeout(Duration),
    #[error("dispatch failed: {0}")]
    Other(String),
}

/// Delivers a composed message to a recipient list in one operation.
/// Implementations do not retry; the caller owns retry policy.
#[async_trait]
pub trait Dispatcher: Send + Sync {
    async fn send(&self, message: &ComposedMessage, recipients: &[String])
        -> Result<(), DispatchError>;
}
