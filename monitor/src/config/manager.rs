// File: monitor/src/config/manager.rs
use super::{Config, SecretsLoader, ValidatorConfigFile};
use crate::constants::health;
use crate::errors::ConfigError;
use anyhow::Result;
use glob::glob;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tokio::fs;
use tracing::{debug, info, warn};

const MAIN_CONFIG_FILE: &str = "main.toml";
const SECRETS_FILE: &str = "secrets.toml";

pub struct ConfigManager {
    current_config: Arc<Config>,
}

impl ConfigManager {
    pub async fn new(config_dir: String) -> Result<Self> {
        let config = Self::load_configuration(&config_dir).await?;
        Ok(Self {
            current_config: Arc::new(config),
        })
    }

    pub fn get_current_config(&self) -> Arc<Config> {
        self.current_config.clone()
    }

    /// Read main.toml, every validator file and the secrets overlay, then validate.
    pub async fn load_configuration(config_dir: &str) -> Result<Config, ConfigError> {
        let main_config_path = format!("{}/{}", config_dir, MAIN_CONFIG_FILE);
        let main_config_content =
            fs::read_to_string(&main_config_path)
                .await
                .map_err(|e| ConfigError::LoadFailed {
                    path: main_config_path.clone(),
                    reason: e.to_string(),
                })?;

        let mut config: Config =
            toml::from_str(&main_config_content).map_err(|e| ConfigError::ParseError {
                path: main_config_path.clone(),
                reason: e.to_string(),
            })?;

        let secrets_path = format!("{}/{}", config_dir, SECRETS_FILE);
        let secrets = SecretsLoader::load(Path::new(&secrets_path)).map_err(|e| {
            ConfigError::ParseError {
                path: secrets_path.clone(),
                reason: format!("{:#}", e),
            }
        })?;
        secrets.apply(&mut config);

        let pattern = format!("{}/*.toml", config_dir);
        let mut all_validators = BTreeMap::new();

        let entries = glob(&pattern).map_err(|e| ConfigError::InvalidValue {
            field: "config_dir".to_string(),
            reason: e.to_string(),
        })?;

        for entry in entries {
            let path = entry.map_err(|e| ConfigError::LoadFailed {
                path: pattern.clone(),
                reason: e.to_string(),
            })?;
            let filename = path
                .file_name()
                .and_then(|name| name.to_str())
                .ok_or_else(|| ConfigError::LoadFailed {
                    path: path.display().to_string(),
                    reason: "invalid filename".to_string(),
                })?;

            if filename == MAIN_CONFIG_FILE || filename == SECRETS_FILE {
                continue;
            }

            debug!("Loading validator config: {}", path.display());

            let content = fs::read_to_string(&path)
                .await
                .map_err(|e| ConfigError::LoadFailed {
                    path: path.display().to_string(),
                    reason: e.to_string(),
                })?;

            let file: ValidatorConfigFile =
                toml::from_str(&content).map_err(|e| ConfigError::ParseError {
                    path: path.display().to_string(),
                    reason: e.to_string(),
                })?;

            if file.validators.is_empty() {
                warn!("{} declares no validators", path.display());
            }

            for (name, mut validator) in file.validators {
                if all_validators.contains_key(&name) {
                    return Err(ConfigError::DuplicateValidator { name });
                }
                validator.source_file = filename.to_string();
                all_validators.insert(name, validator);
            }
        }

        config.validators = all_validators;
        validate(&config)?;

        info!(
            "Loaded {} validators ({} enabled), check interval {}s, alert threshold {}",
            config.validators.len(),
            config.enabled_validators().count(),
            config.check_interval_seconds,
            config.alert_threshold
        );

        Ok(config)
    }
}

/// Startup validation; any error here stops the process.
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    if !(health::MIN_CHECK_INTERVAL_SECONDS..=health::MAX_CHECK_INTERVAL_SECONDS)
        .contains(&config.check_interval_seconds)
    {
        return Err(ConfigError::InvalidValue {
            field: "check_interval_seconds".to_string(),
            reason: format!(
                "must be between {} and {}, got {}",
                health::MIN_CHECK_INTERVAL_SECONDS,
                health::MAX_CHECK_INTERVAL_SECONDS,
                config.check_interval_seconds
            ),
        });
    }

    if config.probe_timeout_seconds == 0
        || config.probe_timeout_seconds >= config.check_interval_seconds
    {
        return Err(ConfigError::InvalidValue {
            field: "probe_timeout_seconds".to_string(),
            reason: "must be positive and shorter than the check interval".to_string(),
        });
    }

    if config.alert_threshold == 0 {
        return Err(ConfigError::InvalidValue {
            field: "alert_threshold".to_string(),
            reason: "must be at least 1".to_string(),
        });
    }

    if config.extended_report_interval_seconds < config.check_interval_seconds {
        return Err(ConfigError::InvalidValue {
            field: "extended_report_interval_seconds".to_string(),
            reason: "must not be shorter than the check interval".to_string(),
        });
    }

    let t = &config.thresholds;
    for (name, warning, critical) in [
        ("cpu", t.cpu_warning, t.cpu_critical),
        ("memory", t.memory_warning, t.memory_critical),
        ("disk", t.disk_warning, t.disk_critical),
    ] {
        if !(warning > 0.0 && critical <= 100.0 && warning < critical) {
            return Err(ConfigError::InvalidValue {
                field: format!("thresholds.{}", name),
                reason: format!(
                    "warning ({}) must be below critical ({}) and both within (0, 100]",
                    warning, critical
                ),
            });
        }
    }

    if config.telegram.enabled {
        if config.telegram.token.is_empty() {
            return Err(ConfigError::MissingRequired {
                field: "telegram.token".to_string(),
            });
        }
        if config.telegram.chat_id.is_empty() {
            return Err(ConfigError::MissingRequired {
                field: "telegram.chat_id".to_string(),
            });
        }
    }

    if config.pushover.enabled {
        if config.pushover.user_key.is_empty() {
            return Err(ConfigError::MissingRequired {
                field: "pushover.user_key".to_string(),
            });
        }
        if config.pushover.app_token.is_empty() {
            return Err(ConfigError::MissingRequired {
                field: "pushover.app_token".to_string(),
            });
        }
    }

    if config.discord.enabled && config.discord.webhook_url.is_empty() {
        return Err(ConfigError::MissingRequired {
            field: "discord.webhook_url".to_string(),
        });
    }

    if config.validators.is_empty() {
        return Err(ConfigError::MissingRequired {
            field: "validators".to_string(),
        });
    }

    for (name, validator) in &config.validators {
        if name.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "validators".to_string(),
                reason: "validator name must not be empty".to_string(),
            });
        }
        if validator.host.trim().is_empty() {
            return Err(ConfigError::MissingRequired {
                field: format!("validators.{}.host", name),
            });
        }
        if validator.metrics_port == 0 || validator.rpc_port == 0 {
            return Err(ConfigError::InvalidValue {
                field: format!("validators.{}", name),
                reason: "ports must be between 1 and 65535".to_string(),
            });
        }
        if validator.node_exporter_port == Some(0) {
            return Err(ConfigError::InvalidValue {
                field: format!("validators.{}.node_exporter_port", name),
                reason: "ports must be between 1 and 65535".to_string(),
            });
        }
        if !is_valid_public_key(&validator.normalized_key()) {
            return Err(ConfigError::InvalidValue {
                field: format!("validators.{}.validator_secp", name),
                reason: "expected 66 hex characters starting with 02 or 03".to_string(),
            });
        }
    }

    if !config.telegram.enabled && !config.pushover.enabled && !config.discord.enabled {
        warn!("No notification channel enabled, alerts will only be logged");
    }

    Ok(())
}

/// Compressed secp256k1 public key shape: 33 bytes hex encoded with 02/03 prefix.
pub fn is_valid_public_key(key: &str) -> bool {
    key.len() == 66
        && (key.starts_with("02") || key.starts_with("03"))
        && key.chars().all(|c| c.is_ascii_hexdigit())
}
