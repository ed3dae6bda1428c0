//! Webhook delivery with per-endpoint retry and stop-at-first-success.
//!
//! Endpoints are treated as alternatives, not a broadcast list: they are
//! tried in configured order and the first endpoint that accepts the
//! payload ends the call. Each endpoint gets up to `max_attempts` tries with
//! exponential backoff between them, and exactly one delivery log entry is
//! written when its attempt sequence concludes.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use healthhook_domain::constants::{INITIAL_RETRY_DELAY_MS, MAX_DELIVERY_ATTEMPTS};
use healthhook_domain::{
    AttemptFailure, DeliveryContext, DeliveryError, DeliveryLogEntry, WebhookEndpoint,
};
use tracing::{debug, info, instrument, warn};

use super::ports::{WebhookResponse, WebhookTransport};
use crate::sync::ports::DeliveryLogStore;

/// Retry budget for a single endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per endpoint (initial try included)
    pub max_attempts: u32,
    /// Delay after the first failed attempt; doubles after each further one
    pub initial_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: MAX_DELIVERY_ATTEMPTS,
            initial_delay: Duration::from_millis(INITIAL_RETRY_DELAY_MS),
        }
    }
}

impl RetryPolicy {
    /// Delay to wait after failed attempt number `attempt` (1-based).
    ///
    /// `initial_delay * 2^(attempt - 1)`: 1000 ms, then 2000 ms by default.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(16);
        self.initial_delay.saturating_mul(1u32 << shift)
    }
}

/// Final state of one endpoint's attempt sequence.
enum EndpointOutcome {
    Accepted(WebhookResponse),
    Exhausted(AttemptFailure),
}

/// Posts payloads to the configured endpoints and records the outcome.
pub struct DeliveryEngine {
    transport: Arc<dyn WebhookTransport>,
    log_store: Arc<dyn DeliveryLogStore>,
    policy: RetryPolicy,
}

impl DeliveryEngine {
    /// Create an engine with the default retry policy
    pub fn new(transport: Arc<dyn WebhookTransport>, log_store: Arc<dyn DeliveryLogStore>) -> Self {
        Self { transport, log_store, policy: RetryPolicy::default() }
    }

    /// Override the retry policy
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = RetryPolicy { max_attempts: policy.max_attempts.max(1), ..policy };
        self
    }

    /// Retry policy applied to every endpoint.
    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Deliver `payload` to the first endpoint that accepts it.
    ///
    /// # Errors
    ///
    /// - [`DeliveryError::NoEndpoints`] when `endpoints` is empty (no I/O).
    /// - [`DeliveryError::EndpointDeliveryFailed`] with the last endpoint's
    ///   last error when every endpoint exhausted its retries.
    #[instrument(
        skip(self, endpoints, payload),
        fields(endpoints = endpoints.len(), bytes = payload.len())
    )]
    pub async fn deliver(
        &self,
        endpoints: &[WebhookEndpoint],
        payload: &[u8],
        context: DeliveryContext,
    ) -> Result<(), DeliveryError> {
        if endpoints.is_empty() {
            return Err(DeliveryError::NoEndpoints);
        }

        let mut last_failure: Option<(String, AttemptFailure)> = None;

        for endpoint in endpoints {
            let started_at = Utc::now();
            match self.attempt_endpoint(endpoint, payload).await {
                EndpointOutcome::Accepted(response) => {
                    self.record(DeliveryLogEntry::success(
                        &endpoint.url,
                        started_at,
                        response.status,
                        context,
                    ))
                    .await;
                    info!(url = %endpoint.url, status = response.status, "webhook delivered");
                    return Ok(());
                }
                EndpointOutcome::Exhausted(failure) => {
                    self.record(DeliveryLogEntry::failure(
                        &endpoint.url,
                        started_at,
                        failure.status_code(),
                        failure.to_string(),
                        context,
                    ))
                    .await;
                    warn!(
                        url = %endpoint.url,
                        error = %failure,
                        "webhook endpoint exhausted retries"
                    );
                    last_failure = Some((endpoint.url.clone(), failure));
                }
            }
        }

        let (url, last_error) = last_failure.unwrap_or_else(|| {
            (String::new(), AttemptFailure::Transport("all webhook posts failed".into()))
        });
        Err(DeliveryError::EndpointDeliveryFailed { url, last_error })
    }

    async fn attempt_endpoint(
        &self,
        endpoint: &WebhookEndpoint,
        payload: &[u8],
    ) -> EndpointOutcome {
        let attempts = self.policy.max_attempts.max(1);
        let mut last_failure = AttemptFailure::Transport("max retries exceeded".into());

        for attempt in 1..=attempts {
            debug!(url = %endpoint.url, attempt, "posting webhook");

            match self.transport.post_json(endpoint, payload).await {
                Ok(response) if response.is_success() => {
                    return EndpointOutcome::Accepted(response);
                }
                Ok(response) => {
                    debug!(
                        url = %endpoint.url,
                        attempt,
                        status = response.status,
                        "webhook rejected"
                    );
                    last_failure =
                        AttemptFailure::Status { code: response.status, reason: response.reason };
                }
                Err(failure) => {
                    debug!(
                        url = %endpoint.url,
                        attempt,
                        error = %failure,
                        "webhook attempt failed"
                    );
                    last_failure = failure;
                }
            }

            if attempt < attempts {
                tokio::time::sleep(self.policy.delay_for(attempt)).await;
            }
        }

        EndpointOutcome::Exhausted(last_failure)
    }

    async fn record(&self, entry: DeliveryLogEntry) {
        if let Err(err) = self.log_store.append_delivery_log(entry).await {
            warn!(error = %err, "failed to append delivery log entry");
        }
    }
}
