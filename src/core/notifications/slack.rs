use super::{NotificationChannel, PackageEvent};
use anyhow::Result;
use async_trait::async_trait;
use serde_json::json;

pub struct SlackNotifier {
    webhook_url: String,
    client: reqwest::Client,
}

impl SlackNotifier {
    pub fn new(webhook_url: String) -> Self {
        Self {
            webhook_url,
            client: reqwest::Client::new(),
        }
    }

    fn format_message(&self, event: &PackageEvent) -> serde_json::Value {
        match event {
            PackageEvent::Started {
                product,
                go_version,
                targets,
                destination,
            } => json!({
                "blocks": [
                    header("Packaging Started"),
                    {
                        "type": "section",
                        "fields": [
                            field("Product", product),
                            field("Go", &format!("`{}`", go_version)),
                            field("Targets", &targets.join(", ")),
                            field("Destination", &format!("`{}`", destination.display()))
                        ]
                    }
                ]
            }),
            PackageEvent::Completed {
                product,
                archives,
                duration_secs,
            } => {
                let listing = archives
                    .iter()
                    .map(|a| format!("`{}`", a.display()))
                    .collect::<Vec<_>>()
                    .join("\n");
                json!({
                    "blocks": [
                        header("Packaging Complete"),
                        {
                            "type": "section",
                            "fields": [
                                field("Product", product),
                                field("Duration", &format!("{}s", duration_secs))
                            ]
                        },
                        {
                            "type": "section",
                            "text": {
                                "type": "mrkdwn",
                                "text": format!("*Archives:*\n{}", listing)
                            }
                        }
                    ]
                })
            }
            PackageEvent::Failed { product, error } => json!({
                "blocks": [
                    header("Packaging Failed"),
                    {
                        "type": "section",
                        "fields": [field("Product", product)]
                    },
                    {
                        "type": "section",
                        "text": {
                            "type": "mrkdwn",
                            "text": format!("*Error:*\n```{}```", error)
                        }
                    }
                ]
            }),
        }
    }
}

fn header(text: &str) -> serde_json::Value {
    json!({
        "type": "header",
        "text": {
            "type": "plain_text",
            "text": text,
            "emoji": true
        }
    })
}

fn field(label: &str, value: &str) -> serde_json::Value {
    json!({
        "type": "mrkdwn",
        "text": format!("*{}:*\n{}", label, value)
    })
}

#[async_trait]
impl NotificationChannel for SlackNotifier {
    async fn notify(&self, event: PackageEvent) -> Result<()> {
        let payload = self.format_message(&event);
        self.client
            .post(&self.webhook_url)
            .json(&payload)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn notifier() -> SlackNotifier {
        SlackNotifier::new("https://hooks.slack.test/T000".to_string())
    }

    #[test]
    fn started_message_lists_targets() {
        let message = notifier().format_message(&PackageEvent::Started {
            product: "DeimosC2".to_string(),
            go_version: "1.14.1".to_string(),
            targets: vec!["windows".to_string(), "linux".to_string()],
            destination: PathBuf::from("/dist"),
        });

        assert_eq!(message["blocks"][0]["text"]["text"], "Packaging Started");
        assert_eq!(
            message["blocks"][1]["fields"][2]["text"],
            "*Targets:*\nwindows, linux"
        );
    }

    #[test]
    fn completed_message_lists_archives() {
        let message = notifier().format_message(&PackageEvent::Completed {
            product: "DeimosC2".to_string(),
            archives: vec![
                PathBuf::from("/dist/DeimosC2_windows.zip"),
                PathBuf::from("/dist/DeimosC2_linux.zip"),
            ],
            duration_secs: 42,
        });

        assert_eq!(message["blocks"][1]["fields"][1]["text"], "*Duration:*\n42s");
        assert_eq!(
            message["blocks"][2]["text"]["text"],
            "*Archives:*\n`/dist/DeimosC2_windows.zip`\n`/dist/DeimosC2_linux.zip`"
        );
    }

    #[test]
    fn failed_message_quotes_error() {
        let message = notifier().format_message(&PackageEvent::Failed {
            product: "DeimosC2".to_string(),
            error: "git exited with 128".to_string(),
        });

        assert_eq!(message["blocks"][0]["text"]["text"], "Packaging Failed");
        assert_eq!(
            message["blocks"][2]["text"]["text"],
            "*Error:*\n```git exited with 128```"
        );
    }
}
