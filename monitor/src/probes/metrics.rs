// File: monitor/src/probes/metrics.rs
use super::prometheus::Exposition;
use super::{fetch_text, NodeMetrics};
use crate::errors::ProbeError;
use crate::health::ResourceUsage;
use reqwest::Client as HttpClient;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::debug;
use uuid::Uuid;

pub const BLOCK_HEIGHT_METRIC: &str = "monad_execution_ledger_block_num";
pub const PEERS_METRIC: &str = "monad_peer_disc_num_peers";
pub const EXECUTION_LAGGING_METRIC: &str = "monad_state_consensus_events_rx_execution_lagging";
pub const TS_VALIDATION_FAIL_METRIC: &str = "monad_state_consensus_events_failed_ts_validation";

const CPU_SECONDS_METRIC: &str = "node_cpu_seconds_total";
const MEM_TOTAL_METRIC: &str = "node_memory_MemTotal_bytes";
const MEM_AVAILABLE_METRIC: &str = "node_memory_MemAvailable_bytes";
const FS_SIZE_METRIC: &str = "node_filesystem_size_bytes";
const FS_AVAIL_METRIC: &str = "node_filesystem_avail_bytes";

#[derive(Debug, Clone, Copy, PartialEq)]
struct CpuSample {
    idle: f64,
    total: f64,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    result: Option<serde_json::Value>,
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    message: String,
}

/// Scrapes validator node metrics, node-exporter resources and the JSON-RPC endpoint
pub struct MetricsScraper {
    client: HttpClient,
    timeout: Duration,
    cpu_samples: Mutex<HashMap<String, CpuSample>>,
}

impl MetricsScraper {
    pub fn new(client: HttpClient, timeout: Duration) -> Self {
        Self {
            client,
            timeout,
            cpu_samples: Mutex::new(HashMap::new()),
        }
    }

    pub async fn node_metrics(&self, metrics_url: &str) -> Result<NodeMetrics, ProbeError> {
        let body = fetch_text(&self.client, metrics_url, "metrics", self.timeout).await?;
        let exposition = Exposition::parse(&body);
        if exposition.is_empty() {
            return Err(ProbeError::Malformed {
                source: "metrics".to_string(),
                reason: "no samples in response".to_string(),
            });
        }

        Ok(NodeMetrics {
            height: exposition.first(BLOCK_HEIGHT_METRIC).and_then(to_count),
            peers: exposition.first(PEERS_METRIC).and_then(to_count),
            execution_lagging: exposition.first(EXECUTION_LAGGING_METRIC).and_then(to_count),
            ts_validation_fail: exposition.first(TS_VALIDATION_FAIL_METRIC).and_then(to_count),
        })
    }

    /// Resource percentages; CPU uses the delta against the previous sample of this validator
    pub async fn resources(
        &self,
        validator: &str,
        exporter_url: &str,
    ) -> Result<ResourceUsage, ProbeError> {
        let body = fetch_text(&self.client, exporter_url, "node-exporter", self.timeout).await?;
        let exposition = Exposition::parse(&body);

        let cpu_pct = match cpu_sample(&exposition) {
            Some(current) => {
                let mut samples = self.cpu_samples.lock().await;
                let previous = samples.insert(validator.to_string(), current);
                cpu_percent(previous, current)
            }
            None => None,
        };

        let usage = ResourceUsage {
            cpu_pct,
            mem_pct: memory_percent(&exposition),
            disk_pct: disk_percent(&exposition),
        };
        debug!("Resources for {}: {:?}", validator, usage);
        Ok(usage)
    }

    /// `eth_blockNumber` round trip; healthy when the node answers with a result
    pub async fn rpc_healthy(&self, rpc_url: &str) -> Result<bool, ProbeError> {
        let request_body = serde_json::json!({
            "jsonrpc": "2.0",
            "method": "eth_blockNumber",
            "params": [],
            "id": Uuid::new_v4().to_string()
        });

        let response = timeout(self.timeout, self.client.post(rpc_url).json(&request_body).send())
            .await
            .map_err(|_| ProbeError::Timeout {
                source: "rpc".to_string(),
                seconds: self.timeout.as_secs(),
            })?
            .map_err(|e| ProbeError::Unreachable {
                source: "rpc".to_string(),
                reason: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(ProbeError::Unreachable {
                source: "rpc".to_string(),
                reason: format!("HTTP {}", response.status()),
            });
        }

        let rpc_response: RpcResponse =
            response.json().await.map_err(|e| ProbeError::Malformed {
                source: "rpc".to_string(),
                reason: e.to_string(),
            })?;

        if let Some(error) = rpc_response.error {
            debug!("RPC error from {}: {}", rpc_url, error.message);
            return Ok(false);
        }
        Ok(rpc_response.result.is_some())
    }
}

fn to_count(value: f64) -> Option<u64> {
    (value >= 0.0).then(|| value as u64)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn cpu_sample(exposition: &Exposition) -> Option<CpuSample> {
    let mut idle = 0.0;
    let mut total = 0.0;
    let mut seen = false;
    for sample in exposition.samples(CPU_SECONDS_METRIC) {
        let Some(value) = sample.value else { continue };
        seen = true;
        total += value;
        if sample.label("mode") == Some("idle") {
            idle += value;
        }
    }
    (seen && total > 0.0).then_some(CpuSample { idle, total })
}

fn cpu_percent(previous: Option<CpuSample>, current: CpuSample) -> Option<f64> {
    let (idle, total) = match previous {
        Some(prev) if current.total > prev.total && current.idle >= prev.idle => {
            (current.idle - prev.idle, current.total - prev.total)
        }
        // First sample or counter reset: fall back to the since-boot ratio
        _ => (current.idle, current.total),
    };
    if total <= 0.0 {
        return None;
    }
    Some(round2((100.0 - idle / total * 100.0).clamp(0.0, 100.0)))
}

fn memory_percent(exposition: &Exposition) -> Option<f64> {
    let total = exposition.first(MEM_TOTAL_METRIC)?;
    let available = exposition.first(MEM_AVAILABLE_METRIC)?;
    if total <= 0.0 {
        return None;
    }
    Some(round2(((total - available) / total * 100.0).clamp(0.0, 100.0)))
}

fn disk_percent(exposition: &Exposition) -> Option<f64> {
    let root = |name: &str| {
        exposition
            .with_label(name, "mountpoint", "/")
            .or_else(|| exposition.with_label(name, "mount", "/"))
    };
    let size = root(FS_SIZE_METRIC)?;
    let avail = root(FS_AVAIL_METRIC)?;
    if size <= 0.0 {
        return None;
    }
    Some(round2(((size - avail) / size * 100.0).clamp(0.0, 100.0)))
}
