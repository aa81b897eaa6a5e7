//! Webhook client for the automation backend.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use super::payload::RequestPayload;
use super::reply::DelegateReply;
use super::DelegateTarget;
use crate::config::WebhookConfig;
use crate::error::DelegateError;

/// Hands a dialog's collected work to an external flow.
#[async_trait]
pub trait Delegate: Send + Sync {
    async fn invoke(
        &self,
        target: DelegateTarget,
        payload: &RequestPayload,
    ) -> Result<DelegateReply, DelegateError>;
}

/// Posts payloads as JSON to one webhook per target.
pub struct WebhookDelegate {
    client: reqwest::Client,
    webhooks: WebhookConfig,
    timeout: Duration,
}

impl WebhookDelegate {
    pub fn new(webhooks: WebhookConfig, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            webhooks,
            timeout,
        }
    }

    fn url(&self, target: DelegateTarget) -> Option<&str> {
        let url = match target {
            DelegateTarget::Solicitud => &self.webhooks.solicitud,
            DelegateTarget::Candidato => &self.webhooks.candidato,
            DelegateTarget::Validacion => &self.webhooks.validacion,
            DelegateTarget::Vitae => &self.webhooks.vitae,
        };
        url.as_deref().filter(|u| !u.is_empty())
    }
}

#[async_trait]
impl Delegate for WebhookDelegate {
    async fn invoke(
        &self,
        target: DelegateTarget,
        payload: &RequestPayload,
    ) -> Result<DelegateReply, DelegateError> {
        let url = self.url(target).ok_or_else(|| DelegateError::NotConfigured {
            target: target.to_string(),
        })?;
        debug!(%target, payload = %serde_json::to_string(payload).unwrap_or_default(), "Calling delegate");

        let resp = self
            .client
            .post(url)
            .timeout(self.timeout)
            .json(payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    DelegateError::Timeout {
                        target: target.to_string(),
                        timeout: self.timeout,
                    }
                } else {
                    DelegateError::RequestFailed {
                        target: target.to_string(),
                        reason: e.to_string(),
                    }
                }
            })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(DelegateError::Status {
                target: target.to_string(),
                status: status.as_u16(),
            });
        }

        let body = resp.text().await.map_err(|e| {
            if e.is_timeout() {
                DelegateError::Timeout {
                    target: target.to_string(),
                    timeout: self.timeout,
                }
            } else {
                DelegateError::InvalidResponse {
                    target: target.to_string(),
                    reason: e.to_string(),
                }
            }
        })?;
        debug!(%target, %body, "Delegate response");

        // Non-JSON bodies are kept as a string and end up as the maintenance reply.
        let raw = serde_json::from_str(&body).unwrap_or(Value::String(body));
        Ok(DelegateReply::from_json(raw))
    }
}
