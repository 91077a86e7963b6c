use super::{post_json, Notification, Notifier};
use crate::config::DiscordConfig;
use crate::constants::alerts;
use crate::errors::NotifyError;
use crate::health::{AlertCategory, Severity};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

#[derive(Debug, Serialize)]
struct Embed<'a> {
    title: &'a str,
    description: &'a str,
    color: u32,
    timestamp: String,
}

#[derive(Debug, Serialize)]
struct WebhookBody<'a> {
    embeds: Vec<Embed<'a>>,
}

/// Secondary community channel: Discord webhook embeds
pub struct DiscordNotifier {
    client: Client,
    config: DiscordConfig,
}

impl DiscordNotifier {
    pub fn new(client: Client, config: DiscordConfig) -> Self {
        Self { client, config }
    }
}

pub fn embed_color(notification: &Notification) -> u32 {
    match (notification.category, notification.severity) {
        (Some(AlertCategory::ExtendedReport), _) => alerts::DISCORD_COLOR_REPORT,
        (_, Severity::Critical) => alerts::DISCORD_COLOR_CRITICAL,
        (_, Severity::Warning) => alerts::DISCORD_COLOR_WARNING,
        (_, Severity::Info) => alerts::DISCORD_COLOR_INFO,
    }
}

#[async_trait]
impl Notifier for DiscordNotifier {
    fn name(&self) -> &str {
        "discord"
    }

    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        let body = WebhookBody {
            embeds: vec![Embed {
                title: &notification.title,
                description: &notification.body,
                color: embed_color(notification),
                timestamp: notification.timestamp.to_rfc3339(),
            }],
        };
        post_json(&self.client, &self.config.webhook_url, &body, self.name()).await
    }
}
