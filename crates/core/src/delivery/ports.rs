//! Port interface for outbound webhook requests

use async_trait::async_trait;
use healthhook_domain::{AttemptFailure, WebhookEndpoint};

/// Status line of a webhook response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookResponse {
    pub status: u16,
    pub reason: String,
}

impl WebhookResponse {
    pub fn new(status: u16, reason: impl Into<String>) -> Self {
        Self { status, reason: reason.into() }
    }

    /// 2xx-class status
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Trait for performing exactly one HTTP POST attempt.
///
/// Retries belong to the caller. Implementations attach
/// `Content-Type: application/json; charset=utf-8` and the endpoint's own
/// headers, and enforce the per-attempt timeout.
#[async_trait]
pub trait WebhookTransport: Send + Sync {
    async fn post_json(
        &self,
        endpoint: &WebhookEndpoint,
        body: &[u8],
    ) -> Result<WebhookResponse, AttemptFailure>;
}
