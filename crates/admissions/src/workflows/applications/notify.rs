use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::domain::{ApplicationId, ReferenceCode};

/// Payload posted to the admissions office when a payment slip arrives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentSlipNotice {
    pub applicant_name: String,
    pub reference: ReferenceCode,
    pub email: String,
    pub file_url: String,
    pub application_id: ApplicationId,
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("notification transport failed: {0}")]
    Transport(String),
    #[error("notification endpoint responded with status {0}")]
    Rejected(u16),
}

/// Outbound notification hook. Callers treat delivery as best-effort.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notice: &PaymentSlipNotice) -> Result<(), NotifyError>;
}

/// Posts notices as JSON to a configured HTTP endpoint.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    client: reqwest::Client,
    endpoint: String,
}

impl WebhookNotifier {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| NotifyError::Transport(err.to_string()))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, notice: &PaymentSlipNotice) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(notice)
            .send()
            .await
            .map_err(|err| NotifyError::Transport(err.to_string()))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(NotifyError::Rejected(status.as_u16()))
        }
    }
}

/// Used when no endpoint is configured: the notice only reaches the log.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, notice: &PaymentSlipNotice) -> Result<(), NotifyError> {
        info!(
            reference = %notice.reference,
            application_id = %notice.application_id,
            file_url = %notice.file_url,
            "payment slip received (no webhook configured)"
        );
        Ok(())
    }
}
