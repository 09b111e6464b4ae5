/// Post-completion notifications (webhook or e-mail)
pub mod domain;
pub mod infrastructure;

pub use domain::{AnalysisNotification, GameSummary, Notifier, PlayerColor};
pub use infrastructure::{ResendEmailNotifier, WebhookNotifier};

use crate::shared::config::NotificationConfig;
use crate::shared::errors::AppResult;
use std::sync::Arc;

/// Build the configured notifier, if any
pub fn from_config(config: &NotificationConfig) -> AppResult<Option<Arc<dyn Notifier>>> {
    let notifier: Option<Arc<dyn Notifier>> = match config {
        NotificationConfig::Disabled => None,
        NotificationConfig::Webhook { url, timeout } => {
            Some(Arc::new(WebhookNotifier::new(url, *timeout)?))
        }
        NotificationConfig::Email {
            api_key,
            from,
            to,
            timeout,
        } => Some(Arc::new(ResendEmailNotifier::new(api_key, from, to, *timeout)?)),
    };
    Ok(notifier)
}
