use super::{post_json, Notification, Notifier};
use crate::config::TelegramConfig;
use crate::errors::NotifyError;
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: String,
    parse_mode: &'static str,
}

/// Escape text for Telegram's HTML parse mode; only these three characters are special
fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn render(notification: &Notification) -> String {
    format!(
        "<b>{}</b>\n\n{}",
        escape_html(&notification.title),
        escape_html(&notification.body)
    )
}

/// Primary channel: Telegram bot `sendMessage`
pub struct TelegramNotifier {
    client: Client,
    config: TelegramConfig,
}

impl TelegramNotifier {
    pub fn new(client: Client, config: TelegramConfig) -> Self {
        Self { client, config }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/bot{}/sendMessage",
            self.config.api_url.trim_end_matches('/'),
            self.config.token
        )
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        let message = SendMessage {
            chat_id: &self.config.chat_id,
            text: render(notification),
            parse_mode: "HTML",
        };
        post_json(&self.client, &self.endpoint(), &message, self.name()).await
    }
}
