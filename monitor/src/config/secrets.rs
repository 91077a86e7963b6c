// File: monitor/src/config/secrets.rs
//! Secrets loader for notification channel credentials.
//!
//! Credentials live in a separate TOML file (config/secrets.toml) that should be
//! excluded from version control. Environment variables take precedence over
//! both the secrets file and main.toml.
//!
//! Example secrets.toml:
//! ```toml
//! [telegram]
//! token = "123456:ABC"
//! chat_id = "-1001234"
//!
//! [pushover]
//! user_key = "u-key"
//! app_token = "a-token"
//!
//! [discord]
//! webhook_url = "https://discord.com/api/webhooks/..."
//! ```

use super::Config;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use tracing::{debug, info};

pub const ENV_TELEGRAM_TOKEN: &str = "TELEGRAM_TOKEN";
pub const ENV_TELEGRAM_CHAT_ID: &str = "TELEGRAM_CHAT_ID";
pub const ENV_PUSHOVER_USER_KEY: &str = "PUSHOVER_USER_KEY";
pub const ENV_PUSHOVER_APP_TOKEN: &str = "PUSHOVER_APP_TOKEN";
pub const ENV_DISCORD_WEBHOOK_URL: &str = "DISCORD_WEBHOOK_URL";

#[derive(Debug, Deserialize, Default)]
pub struct TelegramSecrets {
    pub token: Option<String>,
    pub chat_id: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PushoverSecrets {
    pub user_key: Option<String>,
    pub app_token: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct DiscordSecrets {
    pub webhook_url: Option<String>,
}

/// Structure matching the secrets.toml file format
#[derive(Debug, Deserialize, Default)]
pub struct SecretsFile {
    #[serde(default)]
    pub telegram: TelegramSecrets,
    #[serde(default)]
    pub pushover: PushoverSecrets,
    #[serde(default)]
    pub discord: DiscordSecrets,
}

/// Loader for channel credentials from secrets.toml and the environment
pub struct SecretsLoader {
    secrets: SecretsFile,
}

impl SecretsLoader {
    /// Load secrets from the specified file path.
    /// Returns an empty loader if the file doesn't exist.
    pub fn load(secrets_path: &Path) -> Result<Self> {
        if !secrets_path.exists() {
            debug!("No secrets file at {:?}, relying on main.toml and environment", secrets_path);
            return Ok(Self {
                secrets: SecretsFile::default(),
            });
        }

        let content = std::fs::read_to_string(secrets_path)
            .with_context(|| format!("Failed to read secrets file: {:?}", secrets_path))?;

        let secrets: SecretsFile = toml::from_str(&content)
            .with_context(|| format!("Failed to parse secrets file: {:?}", secrets_path))?;

        info!("Loaded channel secrets from {:?}", secrets_path);

        Ok(Self { secrets })
    }

    /// Overlay file secrets, then environment variables, onto the channel config.
    pub fn apply(&self, config: &mut Config) {
        overlay(&mut config.telegram.token, self.secrets.telegram.token.as_deref());
        overlay(&mut config.telegram.chat_id, self.secrets.telegram.chat_id.as_deref());
        overlay(&mut config.pushover.user_key, self.secrets.pushover.user_key.as_deref());
        overlay(&mut config.pushover.app_token, self.secrets.pushover.app_token.as_deref());
        overlay(&mut config.discord.webhook_url, self.secrets.discord.webhook_url.as_deref());

        overlay_env(&mut config.telegram.token, ENV_TELEGRAM_TOKEN);
        overlay_env(&mut config.telegram.chat_id, ENV_TELEGRAM_CHAT_ID);
        overlay_env(&mut config.pushover.user_key, ENV_PUSHOVER_USER_KEY);
        overlay_env(&mut config.pushover.app_token, ENV_PUSHOVER_APP_TOKEN);
        overlay_env(&mut config.discord.webhook_url, ENV_DISCORD_WEBHOOK_URL);
    }
}

fn overlay(target: &mut String, value: Option<&str>) {
    if let Some(value) = value.filter(|v| !v.trim().is_empty()) {
        *target = value.trim().to_string();
    }
}

fn overlay_env(target: &mut String, var: &str) {
    if let Ok(value) = std::env::var(var) {
        if !value.trim().is_empty() {
            debug!("Using {} from environment", var);
            *target = value.trim().to_string();
        }
    }
}
