// File: monitor/src/web/metrics.rs
use crate::health::HealthSnapshot;
use prometheus::{Encoder, Gauge, GaugeVec, Opts, Registry, TextEncoder};

/// Prometheus view of the health snapshot, refreshed on every scrape
pub struct MonitorMetrics {
    validator_up: GaugeVec,
    consecutive_failures: GaugeVec,
    block_height: GaugeVec,
    peers: GaugeVec,
    in_active_set: GaugeVec,
    resource_usage: GaugeVec,
    uptime_percent: GaugeVec,
    persistence_ok: Gauge,
    uptime_seconds: Gauge,
    registry: Registry,
}

impl MonitorMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let validator_up = GaugeVec::new(
            Opts::new("monad_validator_up", "1 when the validator verdict is active"),
            &["validator", "network", "state"],
        )?;
        registry.register(Box::new(validator_up.clone()))?;

        let consecutive_failures = GaugeVec::new(
            Opts::new(
                "monad_validator_consecutive_failures",
                "Consecutive failed checks",
            ),
            &["validator", "network"],
        )?;
        registry.register(Box::new(consecutive_failures.clone()))?;

        let block_height = GaugeVec::new(
            Opts::new("monad_validator_block_height", "Last known block height"),
            &["validator", "network"],
        )?;
        registry.register(Box::new(block_height.clone()))?;

        let peers = GaugeVec::new(
            Opts::new("monad_validator_peers", "Last known peer count"),
            &["validator", "network"],
        )?;
        registry.register(Box::new(peers.clone()))?;

        let in_active_set = GaugeVec::new(
            Opts::new("monad_validator_in_active_set", "1 when in the active set"),
            &["validator", "network"],
        )?;
        registry.register(Box::new(in_active_set.clone()))?;

        let resource_usage = GaugeVec::new(
            Opts::new("monad_validator_resource_usage_percent", "Host resource usage"),
            &["validator", "network", "resource"],
        )?;
        registry.register(Box::new(resource_usage.clone()))?;

        let uptime_percent = GaugeVec::new(
            Opts::new(
                "monad_validator_uptime_percent",
                "Third-party reported uptime",
            ),
            &["validator", "network"],
        )?;
        registry.register(Box::new(uptime_percent.clone()))?;

        let persistence_ok = Gauge::new(
            "monad_monitor_persistence_ok",
            "1 when the last state writes succeeded",
        )?;
        registry.register(Box::new(persistence_ok.clone()))?;

        let uptime_seconds = Gauge::new("monad_monitor_uptime_seconds", "Monitor process uptime")?;
        registry.register(Box::new(uptime_seconds.clone()))?;

        Ok(Self {
            validator_up,
            consecutive_failures,
            block_height,
            peers,
            in_active_set,
            resource_usage,
            uptime_percent,
            persistence_ok,
            uptime_seconds,
            registry,
        })
    }

    /// Refresh every gauge from the snapshot and encode the registry
    pub fn render(&self, snapshot: &HealthSnapshot) -> Result<String, prometheus::Error> {
        for gauge in [
            &self.validator_up,
            &self.consecutive_failures,
            &self.block_height,
            &self.peers,
            &self.in_active_set,
            &self.resource_usage,
            &self.uptime_percent,
        ] {
            gauge.reset();
        }

        for (name, validator) in snapshot.validators.iter().filter(|(_, v)| v.enabled) {
            let labels = [name.as_str(), validator.network.as_str()];

            self.validator_up
                .with_label_values(&[name.as_str(), validator.network.as_str(), validator.state.as_str()])
                .set(if validator.healthy { 1.0 } else { 0.0 });
            self.consecutive_failures
                .with_label_values(&labels)
                .set(f64::from(validator.fails));

            if let Some(height) = validator.height {
                self.block_height.with_label_values(&labels).set(height as f64);
            }
            if let Some(peers) = validator.peers {
                self.peers.with_label_values(&labels).set(peers as f64);
            }
            if let Some(active) = validator.in_active_set {
                self.in_active_set
                    .with_label_values(&labels)
                    .set(if active { 1.0 } else { 0.0 });
            }
            if let Some(uptime) = validator.huginn_data.uptime_percent {
                self.uptime_percent.with_label_values(&labels).set(uptime);
            }
            for (resource, value) in [
                ("cpu", validator.resources.cpu_pct),
                ("memory", validator.resources.mem_pct),
                ("disk", validator.resources.disk_pct),
            ] {
                if let Some(value) = value {
                    self.resource_usage
                        .with_label_values(&[name.as_str(), validator.network.as_str(), resource])
                        .set(value);
                }
            }
        }

        self.persistence_ok
            .set(if snapshot.persistence_ok { 1.0 } else { 0.0 });
        self.uptime_seconds.set(snapshot.uptime_seconds as f64);

        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
