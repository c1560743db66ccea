use admissions::config::NotifyConfig;
use admissions::workflows::applications::{
    LocalObjectStore, LogNotifier, Notifier, NotifyError, PaymentSlipNotice, WebhookNotifier,
};
use async_trait::async_trait;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
    pub(crate) store: Arc<LocalObjectStore>,
}

/// Where payment-slip notices go: the configured webhook, or the log when none is set.
pub(crate) enum OfficeNotifier {
    Webhook(WebhookNotifier),
    Log(LogNotifier),
}

impl OfficeNotifier {
    pub(crate) fn from_config(config: &NotifyConfig) -> Result<Self, NotifyError> {
        match &config.webhook_url {
            Some(url) => {
                info!(endpoint = %url, "payment slip notices go to webhook");
                Ok(Self::Webhook(WebhookNotifier::new(url.clone(), config.timeout)?))
            }
            None => Ok(Self::Log(LogNotifier)),
        }
    }
}

#[async_trait]
impl Notifier for OfficeNotifier {
    async fn notify(&self, notice: &PaymentSlipNotice) -> Result<(), NotifyError> {
        match self {
            OfficeNotifier::Webhook(webhook) => webhook.notify(notice).await,
            OfficeNotifier::Log(log) => log.notify(notice).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn missing_webhook_falls_back_to_log() {
        let config = NotifyConfig {
            webhook_url: None,
            timeout: Duration::from_secs(5),
        };
        assert!(matches!(
            OfficeNotifier::from_config(&config),
            Ok(OfficeNotifier::Log(_))
        ));
    }

    #[test]
    fn webhook_url_selects_webhook() {
        let config = NotifyConfig {
            webhook_url: Some("http://127.0.0.1:9/hooks/payments".to_string()),
            timeout: Duration::from_secs(5),
        };
        assert!(matches!(
            OfficeNotifier::from_config(&config),
            Ok(OfficeNotifier::Webhook(_))
        ));
    }
}
