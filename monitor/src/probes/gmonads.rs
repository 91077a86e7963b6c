//! gmonads public API client (secondary uptime source)
//!
//! Provides the epoch validator set, used both for active-set membership and
//! for picking a reference validator whose round represents the network round,
//! plus per-minute block buckets that summarize network health.

use super::{fetch_json, UptimeReport};
use crate::config::{normalize_key, GmonadsConfig, Network};
use crate::errors::ProbeError;
use crate::health::{NetworkHealth, UptimeSource};
use chrono::{DateTime, Duration, Utc};
use reqwest::Client as HttpClient;
use serde::Deserialize;
use std::collections::HashMap;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, warn};

const SOURCE: &str = "gmonads";

#[derive(Debug, Clone, Deserialize)]
pub struct EpochValidator {
    #[serde(default)]
    pub node_id: String,
    #[serde(default)]
    pub val_index: u64,
    #[serde(default = "default_set_type")]
    pub validator_set_type: String,
}

fn default_set_type() -> String {
    "unknown".to_string()
}

impl EpochValidator {
    pub fn is_active(&self) -> bool {
        self.validator_set_type == "active"
    }
}

#[derive(Debug, Deserialize)]
struct ListResponse<T> {
    #[serde(default = "Vec::new")]
    data: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct BlockBucket {
    blocks: Option<u64>,
    avg_tps: Option<f64>,
    avg_block_fullness_pct: Option<f64>,
}

#[derive(Debug, Clone)]
struct CachedEpoch {
    validators: Vec<EpochValidator>,
    fetched_at: DateTime<Utc>,
}

pub struct GmonadsClient {
    client: HttpClient,
    config: GmonadsConfig,
    epochs: Mutex<HashMap<Network, CachedEpoch>>,
    health: Mutex<HashMap<Network, NetworkHealth>>,
}

impl GmonadsClient {
    pub fn new(client: HttpClient, config: GmonadsConfig) -> Self {
        Self {
            client,
            config,
            epochs: Mutex::new(HashMap::new()),
            health: Mutex::new(HashMap::new()),
        }
    }

    fn ttl(&self) -> Duration {
        Duration::seconds(self.config.check_interval_seconds as i64)
    }

    fn request_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.config.timeout_seconds)
    }

    async fn epoch(&self, network: Network) -> Result<CachedEpoch, ProbeError> {
        let now = Utc::now();
        let cached = self.epochs.lock().await.get(&network).cloned();
        if let Some(cached) = &cached {
            if now - cached.fetched_at < self.ttl() {
                return Ok(cached.clone());
            }
        }

        let url = format!(
            "{}/validators/epoch?network={}",
            self.config.base_url.trim_end_matches('/'),
            network
        );
        match fetch_json::<ListResponse<EpochValidator>>(
            &self.client,
            &url,
            SOURCE,
            self.request_timeout(),
        )
        .await
        {
            Ok(response) => {
                let epoch = CachedEpoch {
                    validators: response.data,
                    fetched_at: now,
                };
                debug!(
                    "gmonads epoch for {}: {} validators",
                    network,
                    epoch.validators.len()
                );
                self.epochs.lock().await.insert(network, epoch.clone());
                Ok(epoch)
            }
            Err(e) => {
                warn!("gmonads epoch fetch failed for {}: {}", network, e);
                cached.ok_or(e)
            }
        }
    }

    /// Active-set membership for a validator key; not being listed means unknown
    pub async fn membership(
        &self,
        network: Network,
        validator_key: &str,
    ) -> Result<UptimeReport, ProbeError> {
        let epoch = self.epoch(network).await?;
        membership_in(&epoch, validator_key)
    }

    /// Membership lookup bounded by `deadline`; on expiry the last epoch is used whatever its age
    pub async fn membership_within(
        &self,
        network: Network,
        validator_key: &str,
        deadline: std::time::Duration,
    ) -> Result<UptimeReport, ProbeError> {
        match timeout(deadline, self.membership(network, validator_key)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    "gmonads lookup on {} exceeded {:.1}s",
                    network,
                    deadline.as_secs_f64()
                );
                let cached = self.epochs.lock().await.get(&network).cloned();
                match cached {
                    Some(epoch) => membership_in(&epoch, validator_key),
                    None => Err(ProbeError::Timeout {
                        source: SOURCE.to_string(),
                        seconds: deadline.as_secs(),
                    }),
                }
            }
        }
    }

    /// Index of some active validator, used as the network-round reference
    pub async fn reference_validator_index(&self, network: Network) -> Option<u64> {
        let epoch = self.epoch(network).await.ok()?;
        epoch
            .validators
            .iter()
            .find(|v| v.is_active())
            .map(|v| v.val_index)
    }

    pub async fn network_health(&self, network: Network) -> Result<NetworkHealth, ProbeError> {
        let now = Utc::now();
        let cached = self.health.lock().await.get(&network).cloned();
        if let Some(cached) = &cached {
            if now - cached.fetched_at < self.ttl() {
                return Ok(cached.clone());
            }
        }

        let url = format!(
            "{}/blocks/1m?network={}",
            self.config.base_url.trim_end_matches('/'),
            network
        );
        let buckets = match fetch_json::<ListResponse<BlockBucket>>(
            &self.client,
            &url,
            SOURCE,
            self.request_timeout(),
        )
        .await
        {
            Ok(response) if !response.data.is_empty() => response.data,
            Ok(_) => {
                return cached.ok_or_else(|| ProbeError::Malformed {
                    source: SOURCE.to_string(),
                    reason: "no block buckets".to_string(),
                })
            }
            Err(e) => {
                warn!("gmonads block metrics fetch failed for {}: {}", network, e);
                return cached.ok_or(e);
            }
        };

        let active_validators = match self.epoch(network).await {
            Ok(epoch) => epoch.validators.iter().filter(|v| v.is_active()).count() as u64,
            Err(_) => 0,
        };

        let health = aggregate_buckets(network, &buckets, active_validators, now);
        self.health.lock().await.insert(network, health.clone());
        Ok(health)
    }
}

fn aggregate_buckets(
    network: Network,
    buckets: &[BlockBucket],
    active_validators: u64,
    now: DateTime<Utc>,
) -> NetworkHealth {
    let count = buckets.len().max(1) as f64;
    let total_blocks = buckets.iter().filter_map(|b| b.blocks).sum();
    let tps: f64 = buckets.iter().filter_map(|b| b.avg_tps).sum::<f64>() / count;
    let fullness: f64 = buckets
        .iter()
        .filter_map(|b| b.avg_block_fullness_pct)
        .sum::<f64>()
        / count;

    NetworkHealth {
        network: network.to_string(),
        tps: (tps * 100.0).round() / 100.0,
        block_fullness_pct: (fullness * 100.0).round() / 100.0,
        total_blocks,
        active_validators,
        fetched_at: now,
    }
}

fn membership_in(epoch: &CachedEpoch, validator_key: &str) -> Result<UptimeReport, ProbeError> {
    let entry = epoch
        .validators
        .iter()
        .find(|v| keys_match(validator_key, &v.node_id))
        .ok_or_else(|| ProbeError::NotFound {
            source: SOURCE.to_string(),
            key: validator_key.to_string(),
        })?;

    Ok(UptimeReport {
        source: UptimeSource::Gmonads,
        uptime_percent: None,
        finalized_count: None,
        timeout_count: None,
        in_active_set: Some(entry.is_active()),
        source_timestamp: epoch.fetched_at,
    })
}

/// Compare a configured compressed key with an indexer node id that may be uncompressed
pub fn keys_match(configured: &str, node_id: &str) -> bool {
    let a = normalize_key(configured);
    let b = normalize_key(node_id);
    if a.len() < 64 || b.len() < 64 {
        return false;
    }
    if a == b {
        return true;
    }
    match (compress(&a), compress(&b)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

/// Compressed form of a hex secp256k1 public key; the prefix only depends on the parity of y
fn compress(key: &str) -> Option<String> {
    if !key.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let body = match key.len() {
        66 if key.starts_with("02") || key.starts_with("03") => return Some(key.to_string()),
        130 if key.starts_with("04") => &key[2..],
        128 => key,
        _ => return None,
    };
    let (x, y) = body.split_at(64);
    let last = y.chars().last()?.to_digit(16)?;
    let prefix = if last % 2 == 0 { "02" } else { "03" };
    Some(format!("{}{}", prefix, x))
}
