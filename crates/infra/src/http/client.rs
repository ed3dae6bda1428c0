use std::time::Duration;

use async_trait::async_trait;
use healthhook_core::{WebhookResponse, WebhookTransport};
use healthhook_domain::constants::{HTTP_TIMEOUT_SECS, JSON_CONTENT_TYPE};
use healthhook_domain::{AttemptFailure, HealthHookError, HttpConfig, WebhookEndpoint};
use reqwest::header::CONTENT_TYPE;
use reqwest::Client as ReqwestClient;
use tracing::debug;

use crate::errors::InfraError;

/// Webhook transport on reqwest: one POST per call, no retries of its own.
///
/// Retry and backoff belong to the delivery engine; this type only turns a
/// single request into a [`WebhookResponse`] or an [`AttemptFailure`].
#[derive(Clone)]
pub struct ReqwestWebhookTransport {
    client: ReqwestClient,
}

impl ReqwestWebhookTransport {
    /// Start building a new transport.
    pub fn builder() -> ReqwestWebhookTransportBuilder {
        ReqwestWebhookTransportBuilder::default()
    }

    /// Convenience constructor with default configuration.
    pub fn new() -> Result<Self, HealthHookError> {
        Self::builder().build()
    }

    /// Transport configured from the engine's HTTP section.
    pub fn from_config(config: &HttpConfig) -> Result<Self, HealthHookError> {
        let mut builder = Self::builder().timeout(Duration::from_secs(config.timeout_secs));
        if let Some(agent) = &config.user_agent {
            builder = builder.user_agent(agent.clone());
        }
        builder.build()
    }
}

#[async_trait]
impl WebhookTransport for ReqwestWebhookTransport {
    async fn post_json(
        &self,
        endpoint: &WebhookEndpoint,
        body: &[u8],
    ) -> Result<WebhookResponse, AttemptFailure> {
        let mut request = self
            .client
            .post(&endpoint.url)
            .header(CONTENT_TYPE, JSON_CONTENT_TYPE)
            .body(body.to_vec());
        for (name, value) in &endpoint.headers {
            request = request.header(name.as_str(), value.as_str());
        }

        debug!(
            url = %endpoint.url,
            headers = endpoint.header_count(),
            bytes = body.len(),
            "sending webhook POST"
        );

        let response = request.send().await.map_err(attempt_failure)?;
        let status = response.status();
        debug!(url = %endpoint.url, %status, "received webhook response");

        Ok(WebhookResponse::new(status.as_u16(), status.canonical_reason().unwrap_or_default()))
    }
}

fn attempt_failure(err: reqwest::Error) -> AttemptFailure {
    if err.is_timeout() {
        return AttemptFailure::Timeout(err.to_string());
    }
    let message = if err.is_builder() {
        format!("invalid request: {err}")
    } else {
        HealthHookError::from(InfraError::from(err)).to_string()
    };
    AttemptFailure::Transport(message)
}

/// Builder for [`ReqwestWebhookTransport`].
#[derive(Debug)]
pub struct ReqwestWebhookTransportBuilder {
    timeout: Duration,
    connect_timeout: Duration,
    user_agent: Option<String>,
}

impl Default for ReqwestWebhookTransportBuilder {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(HTTP_TIMEOUT_SECS),
            connect_timeout: Duration::from_secs(HTTP_TIMEOUT_SECS),
            user_agent: None,
        }
    }
}

impl ReqwestWebhookTransportBuilder {
    /// Whole-request timeout per attempt. Also caps the connect phase.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self.connect_timeout = self.connect_timeout.min(timeout);
        self
    }

    /// TCP connect timeout, separate from the per-request timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Override the `User-Agent` header.
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    /// Build the transport. Fails when the TLS backend cannot be initialised.
    pub fn build(self) -> Result<ReqwestWebhookTransport, HealthHookError> {
        let mut builder = ReqwestClient::builder()
            .timeout(self.timeout)
            .connect_timeout(self.connect_timeout)
            .no_proxy();

        if let Some(agent) = self.user_agent {
            builder = builder.user_agent(agent);
        }

        let client = builder.build().map_err(|err| {
            let infra: InfraError = err.into();
            HealthHookError::from(infra)
        })?;

        Ok(ReqwestWebhookTransport { client })
    }
}
