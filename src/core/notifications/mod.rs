mod slack;

use anyhow::Result;
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::{NotificationChannelType, NotificationConfig};

pub use slack::SlackNotifier;

/// Events that trigger notifications
#[derive(Debug, Clone)]
pub enum PackageEvent {
    Started {
        product: String,
        go_version: String,
        targets: Vec<String>,
        destination: PathBuf,
    },
    Completed {
        product: String,
        archives: Vec<PathBuf>,
        duration_secs: u64,
    },
    Failed {
        product: String,
        error: String,
    },
}

/// Trait for notification channel implementations
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    async fn notify(&self, event: PackageEvent) -> Result<()>;
}

/// Build the configured notifier, if any.
pub fn create_notifier(config: &NotificationConfig) -> Option<Arc<dyn NotificationChannel>> {
    match &config.channel {
        NotificationChannelType::None => None,
        NotificationChannelType::Slack => {
            let webhook = config.slack_webhook.as_ref()?;
            if webhook.is_empty() {
                return None;
            }
            Some(Arc::new(SlackNotifier::new(webhook.clone())))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_notifier_without_channel_or_webhook() {
        assert!(create_notifier(&NotificationConfig::default()).is_none());

        let empty = NotificationConfig {
            channel: NotificationChannelType::Slack,
            slack_webhook: Some(String::new()),
        };
        assert!(create_notifier(&empty).is_none());

        let missing = NotificationConfig {
            channel: NotificationChannelType::Slack,
            slack_webhook: None,
        };
        assert!(create_notifier(&missing).is_none());
    }

    #[test]
    fn slack_notifier_when_webhook_set() {
        let config = NotificationConfig {
            channel: NotificationChannelType::Slack,
            slack_webhook: Some("https://hooks.slack.test/T000".to_string()),
        };
        assert!(create_notifier(&config).is_some());
    }
}
