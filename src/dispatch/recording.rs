// src/dispatch/recording.rs
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use super::{DispatchError, Dispatcher};
use crate::types::ComposedMessage;

/// In-memory dispatcher that records every send. Handy for dry runs and tests.
#[derive(Debug, Default)]
pub struct RecordingDispatcher {
    pub sent: Mutex<Vec<(ComposedMessage, Vec<String>)>>,
    failing: AtomicBool,
}

impl RecordingDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following send fail with a transport-like error.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<(ComposedMessage, Vec<String>)> {
        self.sent.lock().map(|v| v.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Dispatcher for RecordingDispatcher {
    async fn send(
        &self,
        message: &ComposedMessage,
        recipients: &[String],
    ) -> Result<(), DispatchError> {
        if recipients.is_empty() {
            return Ok(());
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(DispatchError::Other("recording dispatcher set to fail".into()));
        }
        self.sent
            .lock()
            .map_err(|_| DispatchError::Other("recording mutex poisoned".into()))?
            .push((message.clone(), recipients.to_vec()));
        Ok(())
    }
}
