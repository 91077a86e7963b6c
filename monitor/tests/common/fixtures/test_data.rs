//! Common test data and constructors

use chrono::{DateTime, Utc};
use monitor::health::{Confidence, Observation, ResourceUsage, UptimeSource};
use monitor::probes::UptimeReport;
use monitor::{Network, ValidatorConfig};

/// Get current timestamp for testing
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Well-formed compressed secp256k1 public keys
pub mod keys {
    pub const VALIDATOR_1: &str =
        "02a1b2c3d4e5f60718293a4b5c6d7e8f90a1b2c3d4e5f60718293a4b5c6d7e8f90";
    pub const VALIDATOR_2: &str =
        "03ffeeddccbbaa99887766554433221100ffeeddccbbaa99887766554433221100";
}

/// Common test validator names
pub mod validators {
    pub const VAL_1: &str = "val-1";
    pub const VAL_2: &str = "val-2";
}

pub fn validator_config(host: &str, metrics_port: u16, rpc_port: u16) -> ValidatorConfig {
    ValidatorConfig {
        host: host.to_string(),
        network: Network::Testnet,
        metrics_port,
        rpc_port,
        node_exporter_port: None,
        validator_secp: keys::VALIDATOR_1.to_string(),
        enabled: true,
        source_file: "validators.toml".to_string(),
    }
}

/// Reachable, height advancing, no third-party data
pub fn healthy_observation(height: u64, at: DateTime<Utc>) -> Observation {
    Observation {
        reachable: true,
        height: Some(height),
        peers: Some(20),
        height_advanced: true,
        resources: ResourceUsage::default(),
        uptime: None,
        in_active_set: None,
        unverified: false,
        confidence: Confidence::Low,
        rpc_healthy: Some(true),
        execution_lagging: None,
        ts_validation_fail: None,
        timestamp: at,
    }
}

pub fn unreachable_observation(at: DateTime<Utc>) -> Observation {
    Observation::unreachable(at)
}

pub fn uptime_report(source: UptimeSource, in_active_set: Option<bool>, at: DateTime<Utc>) -> UptimeReport {
    UptimeReport {
        source,
        uptime_percent: Some(99.5),
        finalized_count: Some(995),
        timeout_count: Some(5),
        in_active_set,
        source_timestamp: at,
    }
}
