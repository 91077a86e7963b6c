//! Health monitoring types shared by the reconciler, the state machine and the dispatcher

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Per-validator health verdict, ordered by severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthVerdict {
    Active,
    Warning,
    Inactive,
    Critical,
}

impl HealthVerdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthVerdict::Active => "active",
            HealthVerdict::Warning => "warning",
            HealthVerdict::Inactive => "inactive",
            HealthVerdict::Critical => "critical",
        }
    }

    pub fn is_healthy(&self) -> bool {
        matches!(self, HealthVerdict::Active)
    }

    /// Verdicts a recovery is reported from
    pub fn is_down(&self) -> bool {
        matches!(self, HealthVerdict::Inactive | HealthVerdict::Critical)
    }
}

impl fmt::Display for HealthVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AlertCategory {
    Down,
    Recovery,
    Resource,
    ActiveSet,
    ConsensusTimeout,
    ExtendedReport,
}

impl AlertCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertCategory::Down => "down",
            AlertCategory::Recovery => "recovery",
            AlertCategory::Resource => "resource",
            AlertCategory::ActiveSet => "active-set",
            AlertCategory::ConsensusTimeout => "consensus-timeout",
            AlertCategory::ExtendedReport => "extended-report",
        }
    }
}

impl fmt::Display for AlertCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Highest resource threshold currently breached
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceLevel {
    #[default]
    Normal,
    Warning,
    Critical,
}

impl ResourceLevel {
    pub fn as_verdict(&self) -> HealthVerdict {
        match self {
            ResourceLevel::Normal => HealthVerdict::Active,
            ResourceLevel::Warning => HealthVerdict::Warning,
            ResourceLevel::Critical => HealthVerdict::Critical,
        }
    }

    pub fn as_severity(&self) -> Option<Severity> {
        match self {
            ResourceLevel::Normal => None,
            ResourceLevel::Warning => Some(Severity::Warning),
            ResourceLevel::Critical => Some(Severity::Critical),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ResourceUsage {
    pub cpu_pct: Option<f64>,
    pub mem_pct: Option<f64>,
    pub disk_pct: Option<f64>,
}

impl ResourceUsage {
    pub fn is_empty(&self) -> bool {
        self.cpu_pct.is_none() && self.mem_pct.is_none() && self.disk_pct.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UptimeSource {
    Huginn,
    Gmonads,
}

/// How much the reconciled third-party fields can be trusted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    #[default]
    Low,
}

/// Third-party uptime figures after reconciliation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UptimeData {
    pub uptime_percent: Option<f64>,
    pub finalized_count: Option<u64>,
    pub timeout_count: Option<u64>,
    pub source: UptimeSource,
}

/// One normalized observation per validator per tick
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub reachable: bool,
    pub height: Option<u64>,
    pub peers: Option<u64>,
    pub height_advanced: bool,
    pub resources: ResourceUsage,
    pub uptime: Option<UptimeData>,
    pub in_active_set: Option<bool>,
    pub unverified: bool,
    pub confidence: Confidence,
    pub rpc_healthy: Option<bool>,
    pub execution_lagging: Option<u64>,
    pub ts_validation_fail: Option<u64>,
    pub timestamp: DateTime<Utc>,
}

impl Observation {
    /// Observation used when the whole probe could not complete
    pub fn unreachable(timestamp: DateTime<Utc>) -> Self {
        Self {
            reachable: false,
            height: None,
            peers: None,
            height_advanced: false,
            resources: ResourceUsage::default(),
            uptime: None,
            in_active_set: None,
            unverified: false,
            confidence: Confidence::Low,
            rpc_healthy: None,
            execution_lagging: None,
            ts_validation_fail: None,
            timestamp,
        }
    }
}

/// Window summary carried by extended-report events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtendedReport {
    pub window_started: DateTime<Utc>,
    pub window_ended: DateTime<Utc>,
    pub checks: u64,
    pub healthy_checks: u64,
    pub failed_checks: u64,
    pub down_episodes: u64,
    pub availability_percent: Option<f64>,
    pub verdict: HealthVerdict,
    pub consecutive_failures: u32,
    pub in_active_set: Option<bool>,
    pub uptime: Option<UptimeData>,
    pub resources: ResourceUsage,
}

/// Immutable event handed from the state machine to the dispatcher
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertEvent {
    pub validator: String,
    pub severity: Severity,
    pub category: AlertCategory,
    pub summary: String,
    pub height: Option<u64>,
    pub peers: Option<u64>,
    pub uptime_percent: Option<f64>,
    pub threshold_crossed: Option<String>,
    pub report: Option<ExtendedReport>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    Primary,
    Emergency,
    Secondary,
}

impl ChannelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelKind::Primary => "primary",
            ChannelKind::Emergency => "emergency",
            ChannelKind::Secondary => "secondary",
        }
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Critical event whose delivery failed on one channel, retried on later ticks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingAlert {
    pub channel: ChannelKind,
    pub event: AlertEvent,
    pub first_failed_at: DateTime<Utc>,
    pub attempts: u32,
}

/// Last successful delivery times, persisted with the validator state
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AlertLedger {
    #[serde(default)]
    pub last_sent: BTreeMap<ChannelKind, BTreeMap<AlertCategory, DateTime<Utc>>>,
    #[serde(default)]
    pub last_emergency: Option<DateTime<Utc>>,
    #[serde(default)]
    pub pending: Vec<PendingAlert>,
}

impl AlertLedger {
    pub fn last_sent_at(
        &self,
        channel: ChannelKind,
        category: AlertCategory,
    ) -> Option<DateTime<Utc>> {
        self.last_sent
            .get(&channel)
            .and_then(|by_category| by_category.get(&category))
            .copied()
    }

    pub fn record(&mut self, channel: ChannelKind, category: AlertCategory, at: DateTime<Utc>) {
        self.last_sent.entry(channel).or_default().insert(category, at);
    }

    /// Queue a failed critical delivery; a newer event replaces an older one of the same category
    pub fn queue_retry(&mut self, channel: ChannelKind, event: &AlertEvent, failed_at: DateTime<Utc>) {
        match self
            .pending
            .iter_mut()
            .find(|p| p.channel == channel && p.event.category == event.category)
        {
            Some(pending) => {
                pending.event = event.clone();
                pending.attempts += 1;
            }
            None => self.pending.push(PendingAlert {
                channel,
                event: event.clone(),
                first_failed_at: failed_at,
                attempts: 1,
            }),
        }
    }
}

/// Counters accumulated between two extended reports
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UptimeWindow {
    pub started_at: DateTime<Utc>,
    pub checks: u64,
    pub healthy_checks: u64,
    pub failed_checks: u64,
    pub down_episodes: u64,
}

impl UptimeWindow {
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            checks: 0,
            healthy_checks: 0,
            failed_checks: 0,
            down_episodes: 0,
        }
    }

    pub fn availability_percent(&self) -> Option<f64> {
        if self.checks == 0 {
            return None;
        }
        let pct = self.healthy_checks as f64 / self.checks as f64 * 100.0;
        Some((pct * 100.0).round() / 100.0)
    }
}

/// Persistent per-validator state, mutated only by the health state machine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidatorState {
    pub verdict: HealthVerdict,
    pub consecutive_failures: u32,
    pub last_height: Option<u64>,
    pub last_height_change: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_peers: Option<u64>,
    #[serde(default)]
    pub in_active_set: Option<bool>,
    pub last_observation: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_reachable: bool,
    #[serde(default)]
    pub resource_level: ResourceLevel,
    #[serde(default)]
    pub last_resources: ResourceUsage,
    #[serde(default)]
    pub last_timeout_count: Option<u64>,
    #[serde(default)]
    pub last_uptime: Option<UptimeData>,
    #[serde(default)]
    pub unverified: bool,
    #[serde(default)]
    pub confidence: Confidence,
    #[serde(default)]
    pub rpc_healthy: Option<bool>,
    #[serde(default)]
    pub down_since: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_execution_lagging: Option<u64>,
    #[serde(default)]
    pub last_ts_validation_fail: Option<u64>,
    /// Consecutive ticks without any resource figure
    #[serde(default)]
    pub resource_unknown_ticks: u32,
    /// Non-failing conditions seen on the latest tick
    #[serde(default)]
    pub notes: Vec<String>,
    #[serde(default)]
    pub alert_ledger: AlertLedger,
    pub window: UptimeWindow,
}

impl ValidatorState {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            verdict: HealthVerdict::Active,
            consecutive_failures: 0,
            last_height: None,
            last_height_change: None,
            last_peers: None,
            in_active_set: None,
            last_observation: None,
            last_reachable: false,
            resource_level: ResourceLevel::Normal,
            last_resources: ResourceUsage::default(),
            last_timeout_count: None,
            last_uptime: None,
            unverified: false,
            confidence: Confidence::Low,
            rpc_healthy: None,
            down_since: None,
            last_execution_lagging: None,
            last_ts_validation_fail: None,
            resource_unknown_ticks: 0,
            notes: Vec::new(),
            alert_ledger: AlertLedger::default(),
            window: UptimeWindow::new(now),
        }
    }
}

/// Uptime figures as exposed to the dashboard
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct HuginnData {
    pub uptime_percent: Option<f64>,
    pub finalized_count: Option<u64>,
    pub timeout_count: Option<u64>,
}

/// Read-only view of one validator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidatorSnapshot {
    pub state: String,
    pub healthy: bool,
    pub enabled: bool,
    pub network: String,
    pub host: String,
    pub fails: u32,
    pub height: Option<u64>,
    pub peers: Option<u64>,
    pub in_active_set: Option<bool>,
    pub unverified: bool,
    pub confidence: Confidence,
    pub rpc_healthy: Option<bool>,
    pub resources: ResourceUsage,
    pub huginn_data: HuginnData,
    pub notes: Vec<String>,
    pub last_check: Option<DateTime<Utc>>,
}

impl ValidatorSnapshot {
    pub fn disabled(network: String, host: String) -> Self {
        Self {
            state: "disabled".to_string(),
            healthy: false,
            enabled: false,
            network,
            host,
            fails: 0,
            height: None,
            peers: None,
            in_active_set: None,
            unverified: false,
            confidence: Confidence::Low,
            rpc_healthy: None,
            resources: ResourceUsage::default(),
            huginn_data: HuginnData::default(),
            notes: Vec::new(),
            last_check: None,
        }
    }

    /// Enabled validator that has not completed a check yet
    pub fn pending(network: String, host: String) -> Self {
        Self {
            state: "pending".to_string(),
            enabled: true,
            ..Self::disabled(network, host)
        }
    }

    pub fn from_state(network: String, host: String, state: &ValidatorState) -> Self {
        let huginn_data = state
            .last_uptime
            .as_ref()
            .map(|u| HuginnData {
                uptime_percent: u.uptime_percent,
                finalized_count: u.finalized_count,
                timeout_count: u.timeout_count,
            })
            .unwrap_or_default();

        Self {
            state: state.verdict.as_str().to_string(),
            healthy: state.verdict.is_healthy(),
            enabled: true,
            network,
            host,
            fails: state.consecutive_failures,
            height: state.last_height,
            peers: state.last_peers,
            in_active_set: state.in_active_set,
            unverified: state.unverified,
            confidence: state.confidence,
            rpc_healthy: state.rpc_healthy,
            resources: state.last_resources,
            huginn_data,
            notes: state.notes.clone(),
            last_check: state.last_observation,
        }
    }
}

/// Network-wide figures from the secondary indexer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkHealth {
    pub network: String,
    pub tps: f64,
    pub block_fullness_pct: f64,
    pub total_blocks: u64,
    pub active_validators: u64,
    pub fetched_at: DateTime<Utc>,
}

/// Read-only snapshot served by the health and dashboard endpoints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthSnapshot {
    pub validators: BTreeMap<String, ValidatorSnapshot>,
    /// Monitored network name; several networks are joined with a comma
    pub network: String,
    pub network_health: BTreeMap<String, NetworkHealth>,
    pub status: String,
    pub started_at: DateTime<Utc>,
    pub uptime_seconds: i64,
    pub persistence_ok: bool,
    pub last_tick: Option<DateTime<Utc>>,
}

impl HealthSnapshot {
    pub fn new(network: String, started_at: DateTime<Utc>) -> Self {
        Self {
            validators: BTreeMap::new(),
            network,
            network_health: BTreeMap::new(),
            status: "starting".to_string(),
            started_at,
            uptime_seconds: 0,
            persistence_ok: true,
            last_tick: None,
        }
    }

    /// True when every enabled validator is active
    pub fn all_healthy(&self) -> bool {
        self.validators
            .values()
            .filter(|v| v.enabled)
            .all(|v| v.healthy)
    }

    pub fn healthy_count(&self) -> usize {
        self.validators.values().filter(|v| v.enabled && v.healthy).count()
    }

    pub fn enabled_count(&self) -> usize {
        self.validators.values().filter(|v| v.enabled).count()
    }
}
