use crate::log_info;
use crate::modules::notifications::domain::{AnalysisNotification, Notifier};
use crate::shared::errors::{AppError, AppResult};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

/// POSTs the notification as JSON to a fixed URL
pub struct WebhookNotifier {
    client: Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: &str, timeout: Duration) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::ConfigError(format!("Failed to build webhook client: {}", e)))?;

        Ok(Self {
            client,
            url: url.to_string(),
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, notification: &AnalysisNotification) -> AppResult<()> {
        let response = self
            .client
            .post(&self.url)
            .json(notification)
            .send()
            .await
            .map_err(|e| AppError::NotificationError(format!("Webhook request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::NotificationError(format!(
                "Webhook returned HTTP {}",
                status
            )));
        }

        log_info!("Webhook notified for job {}", notification.job_id);
        Ok(())
    }
}
