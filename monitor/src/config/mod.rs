// File: monitor/src/config/mod.rs
pub mod manager;
pub mod secrets;

use crate::constants::{
    alerts, cleanup, defaults, gmonads, health, huginn, reports, thresholds,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

pub use manager::ConfigManager;
pub use secrets::SecretsLoader;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_check_interval")]
    pub check_interval_seconds: u64,
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_seconds: u64,
    #[serde(default = "default_alert_threshold")]
    pub alert_threshold: u32,
    #[serde(default = "default_extended_report_interval")]
    pub extended_report_interval_seconds: u64,
    pub alert_cooldown_seconds: Option<u64>,
    #[serde(default = "default_emergency_cooldown")]
    pub emergency_cooldown_seconds: u64,
    #[serde(default = "default_state_dir")]
    pub state_dir: String,
    #[serde(default = "default_database_path")]
    pub database_path: String,
    #[serde(default = "default_history_retention_days")]
    pub history_retention_days: u32,
    #[serde(default = "default_dashboard_dir")]
    pub dashboard_dir: String,
    #[serde(default)]
    pub thresholds: ResourceThresholds,
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub pushover: PushoverConfig,
    #[serde(default)]
    pub discord: DiscordConfig,
    #[serde(default)]
    pub huginn: HuginnConfig,
    #[serde(default)]
    pub gmonads: GmonadsConfig,
    // Populated from the individual validator files
    #[serde(skip)]
    pub validators: BTreeMap<String, ValidatorConfig>,
}

impl Config {
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_seconds)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_seconds)
    }

    /// Cooldown between two primary-channel messages of the same category for one validator
    pub fn alert_cooldown(&self) -> chrono::Duration {
        let seconds = self.alert_cooldown_seconds.unwrap_or(
            self.check_interval_seconds * alerts::COOLDOWN_INTERVAL_MULTIPLIER,
        );
        chrono::Duration::seconds(seconds as i64)
    }

    pub fn emergency_cooldown(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.emergency_cooldown_seconds as i64)
    }

    pub fn enabled_validators(&self) -> impl Iterator<Item = (&String, &ValidatorConfig)> {
        self.validators.iter().filter(|(_, v)| v.enabled)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            check_interval_seconds: default_check_interval(),
            probe_timeout_seconds: default_probe_timeout(),
            alert_threshold: default_alert_threshold(),
            extended_report_interval_seconds: default_extended_report_interval(),
            alert_cooldown_seconds: None,
            emergency_cooldown_seconds: default_emergency_cooldown(),
            state_dir: default_state_dir(),
            database_path: default_database_path(),
            history_retention_days: default_history_retention_days(),
            dashboard_dir: default_dashboard_dir(),
            thresholds: ResourceThresholds::default(),
            telegram: TelegramConfig::default(),
            pushover: PushoverConfig::default(),
            discord: DiscordConfig::default(),
            huginn: HuginnConfig::default(),
            gmonads: GmonadsConfig::default(),
            validators: BTreeMap::new(),
        }
    }
}

fn default_host() -> String {
    defaults::SERVER_HOST.to_string()
}

fn default_port() -> u16 {
    defaults::SERVER_PORT
}

fn default_check_interval() -> u64 {
    health::DEFAULT_CHECK_INTERVAL_SECONDS
}

fn default_probe_timeout() -> u64 {
    health::DEFAULT_PROBE_TIMEOUT_SECONDS
}

fn default_alert_threshold() -> u32 {
    health::DEFAULT_ALERT_THRESHOLD
}

fn default_extended_report_interval() -> u64 {
    reports::DEFAULT_EXTENDED_REPORT_INTERVAL_SECONDS
}

fn default_emergency_cooldown() -> u64 {
    alerts::DEFAULT_EMERGENCY_COOLDOWN_SECONDS
}

fn default_state_dir() -> String {
    defaults::STATE_DIR.to_string()
}

fn default_database_path() -> String {
    defaults::DATABASE_PATH.to_string()
}

fn default_history_retention_days() -> u32 {
    cleanup::DEFAULT_HISTORY_RETENTION_DAYS
}

fn default_dashboard_dir() -> String {
    defaults::DASHBOARD_DIR.to_string()
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Testnet,
    Mainnet,
}

impl Network {
    pub fn as_str(&self) -> &'static str {
        match self {
            Network::Testnet => "testnet",
            Network::Mainnet => "mainnet",
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_network() -> Network {
    Network::Testnet
}

fn default_metrics_port() -> u16 {
    defaults::METRICS_PORT
}

fn default_rpc_port() -> u16 {
    defaults::RPC_PORT
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidatorConfig {
    pub host: String,
    #[serde(default = "default_network")]
    pub network: Network,
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,
    #[serde(default = "default_rpc_port")]
    pub rpc_port: u16,
    pub node_exporter_port: Option<u16>,
    pub validator_secp: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    // Name of the file the validator was declared in
    #[serde(skip)]
    pub source_file: String,
}

impl ValidatorConfig {
    pub fn metrics_url(&self) -> String {
        format!("http://{}:{}/metrics", self.host, self.metrics_port)
    }

    pub fn rpc_url(&self) -> String {
        format!("http://{}:{}", self.host, self.rpc_port)
    }

    pub fn node_exporter_url(&self) -> Option<String> {
        self.node_exporter_port
            .map(|port| format!("http://{}:{}/metrics", self.host, port))
    }

    /// Public key normalized for comparisons: lowercase, without 0x prefix
    pub fn normalized_key(&self) -> String {
        normalize_key(&self.validator_secp)
    }
}

pub fn normalize_key(key: &str) -> String {
    let trimmed = key.trim();
    let stripped = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    stripped.to_ascii_lowercase()
}

/// Per-validator entries of a validator file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidatorConfigFile {
    #[serde(default)]
    pub validators: BTreeMap<String, ValidatorConfig>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResourceThresholds {
    #[serde(default = "default_cpu_warning")]
    pub cpu_warning: f64,
    #[serde(default = "default_cpu_critical")]
    pub cpu_critical: f64,
    #[serde(default = "default_memory_warning")]
    pub memory_warning: f64,
    #[serde(default = "default_memory_critical")]
    pub memory_critical: f64,
    #[serde(default = "default_disk_warning")]
    pub disk_warning: f64,
    #[serde(default = "default_disk_critical")]
    pub disk_critical: f64,
}

impl Default for ResourceThresholds {
    fn default() -> Self {
        Self {
            cpu_warning: thresholds::CPU_WARNING,
            cpu_critical: thresholds::CPU_CRITICAL,
            memory_warning: thresholds::MEMORY_WARNING,
            memory_critical: thresholds::MEMORY_CRITICAL,
            disk_warning: thresholds::DISK_WARNING,
            disk_critical: thresholds::DISK_CRITICAL,
        }
    }
}

fn default_cpu_warning() -> f64 {
    thresholds::CPU_WARNING
}

fn default_cpu_critical() -> f64 {
    thresholds::CPU_CRITICAL
}

fn default_memory_warning() -> f64 {
    thresholds::MEMORY_WARNING
}

fn default_memory_critical() -> f64 {
    thresholds::MEMORY_CRITICAL
}

fn default_disk_warning() -> f64 {
    thresholds::DISK_WARNING
}

fn default_disk_critical() -> f64 {
    thresholds::DISK_CRITICAL
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub chat_id: String,
    #[serde(default = "default_telegram_api_url")]
    pub api_url: String,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            token: String::new(),
            chat_id: String::new(),
            api_url: default_telegram_api_url(),
        }
    }
}

fn default_telegram_api_url() -> String {
    crate::constants::channels::TELEGRAM_API_URL.to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushoverConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub user_key: String,
    #[serde(default)]
    pub app_token: String,
    #[serde(default = "default_pushover_api_url")]
    pub api_url: String,
    #[serde(default = "default_pushover_sound")]
    pub sound: String,
}

impl Default for PushoverConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            user_key: String::new(),
            app_token: String::new(),
            api_url: default_pushover_api_url(),
            sound: default_pushover_sound(),
        }
    }
}

fn default_pushover_api_url() -> String {
    crate::constants::channels::PUSHOVER_API_URL.to_string()
}

fn default_pushover_sound() -> String {
    "siren".to_string()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiscordConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub webhook_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HuginnConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_huginn_endpoints")]
    pub endpoints: BTreeMap<String, String>,
    #[serde(default = "default_huginn_cache_ttl")]
    pub check_interval_seconds: u64,
    #[serde(default = "default_provider_timeout")]
    pub timeout_seconds: u64,
}

impl Default for HuginnConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoints: default_huginn_endpoints(),
            check_interval_seconds: default_huginn_cache_ttl(),
            timeout_seconds: default_provider_timeout(),
        }
    }
}

impl HuginnConfig {
    pub fn endpoint(&self, network: Network) -> String {
        self.endpoints
            .get(network.as_str())
            .cloned()
            .unwrap_or_else(|| match network {
                Network::Testnet => huginn::DEFAULT_TESTNET_ENDPOINT.to_string(),
                Network::Mainnet => huginn::DEFAULT_MAINNET_ENDPOINT.to_string(),
            })
    }
}

fn default_huginn_endpoints() -> BTreeMap<String, String> {
    BTreeMap::from([
        ("testnet".to_string(), huginn::DEFAULT_TESTNET_ENDPOINT.to_string()),
        ("mainnet".to_string(), huginn::DEFAULT_MAINNET_ENDPOINT.to_string()),
    ])
}

fn default_huginn_cache_ttl() -> u64 {
    huginn::DEFAULT_CACHE_TTL_SECONDS
}

fn default_provider_timeout() -> u64 {
    crate::constants::http::REQUEST_TIMEOUT.as_secs()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GmonadsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_gmonads_base_url")]
    pub base_url: String,
    #[serde(default = "default_gmonads_cache_ttl")]
    pub check_interval_seconds: u64,
    #[serde(default = "default_provider_timeout")]
    pub timeout_seconds: u64,
}

impl Default for GmonadsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: default_gmonads_base_url(),
            check_interval_seconds: default_gmonads_cache_ttl(),
            timeout_seconds: default_provider_timeout(),
        }
    }
}

fn default_gmonads_base_url() -> String {
    gmonads::DEFAULT_BASE_URL.to_string()
}

fn default_gmonads_cache_ttl() -> u64 {
    gmonads::DEFAULT_CACHE_TTL_SECONDS
}
