//! Page-close save delivery.
//!
//! When the editing surface is torn down there is nobody left to show a
//! conflict to. The final save is posted to the regular update endpoint with
//! `unload` set, under a hard timeout, and the response is never read by the
//! caller. The server records any conflict itself.

use std::time::Duration;

use thiserror::Error;
use tokio::task::JoinHandle;

use crate::models::UpdateRequest;

/// Observed browser default for page-close requests
pub const DEFAULT_UNLOAD_TIMEOUT_MS: u64 = 5000;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("delivery timed out after {0:?}")]
    Timeout(Duration),

    #[error("delivery failed: {0}")]
    Request(#[source] reqwest::Error),

    #[error("server rejected unload save with status {0}")]
    Rejected(u16),
}

#[derive(Debug, Clone)]
pub struct UnloadSaveTransport {
    client: reqwest::Client,
    endpoint: String,
    timeout: Duration,
}

impl UnloadSaveTransport {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(TransportError::Request)?;

        Ok(Self {
            client,
            endpoint: format!("{}/document/update", base_url.trim_end_matches('/')),
            timeout,
        })
    }

    pub fn with_default_timeout(base_url: &str) -> Result<Self, TransportError> {
        Self::new(base_url, Duration::from_millis(DEFAULT_UNLOAD_TIMEOUT_MS))
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Fire and forget. Must be called inside a Tokio runtime; the handle only
    /// tells the host when the attempt is over, never how it went.
    pub fn dispatch(&self, mut request: UpdateRequest) -> JoinHandle<()> {
        request.unload = true;
        let transport = self.clone();

        tokio::spawn(async move {
            match transport.deliver(&request).await {
                Ok(()) => log::debug!("Unload save of {} delivered", request.id),
                // Tab is closing; nothing left to retry with
                Err(e) => log::warn!("Unload save of {} lost: {}", request.id, e),
            }
        })
    }

    async fn deliver(&self, request: &UpdateRequest) -> Result<(), TransportError> {
        let resp = self
            .client
            .post(&self.endpoint)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TransportError::Timeout(self.timeout)
                } else {
                    TransportError::Request(e)
                }
            })?;

        let status = resp.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(TransportError::Rejected(status.as_u16()))
        }
    }
}
