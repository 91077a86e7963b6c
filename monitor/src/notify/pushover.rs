use super::{post_json, Notification, Notifier};
use crate::config::PushoverConfig;
use crate::constants::alerts;
use crate::errors::NotifyError;
use crate::health::Severity;
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

#[derive(Debug, Serialize)]
struct PushoverMessage<'a> {
    token: &'a str,
    user: &'a str,
    title: &'a str,
    message: &'a str,
    priority: i32,
    sound: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    retry: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    expire: Option<u32>,
}

/// Emergency channel: Pushover push that bypasses do-not-disturb for critical events
pub struct PushoverNotifier {
    client: Client,
    config: PushoverConfig,
}

impl PushoverNotifier {
    pub fn new(client: Client, config: PushoverConfig) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl Notifier for PushoverNotifier {
    fn name(&self) -> &str {
        "pushover"
    }

    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        let emergency = notification.severity == Severity::Critical;
        let message = PushoverMessage {
            token: &self.config.app_token,
            user: &self.config.user_key,
            title: &notification.title,
            message: &notification.body,
            priority: if emergency {
                alerts::PUSHOVER_EMERGENCY_PRIORITY
            } else {
                0
            },
            sound: &self.config.sound,
            retry: emergency.then_some(alerts::PUSHOVER_RETRY_SECONDS),
            expire: emergency.then_some(alerts::PUSHOVER_EXPIRE_SECONDS),
        };
        post_json(&self.client, &self.config.api_url, &message, self.name()).await
    }
}
