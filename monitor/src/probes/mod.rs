//! Probe adapters
//!
//! Fetch raw data for one validator from its own endpoints and from the two
//! third-party indexers. Every source runs concurrently under its own deadline,
//! a fraction of the probe timeout, so a slow indexer cannot discard node
//! metrics that already arrived. Failures are returned as [`ProbeError`]
//! values and never abort a tick.

pub mod circuit_breaker;
pub mod gmonads;
pub mod huginn;
pub mod metrics;
pub mod prometheus;

use crate::config::{Config, Network, ValidatorConfig};
use crate::constants::{health, http};
use crate::errors::ProbeError;
use crate::health::{NetworkHealth, ResourceUsage, UptimeSource};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client as HttpClient;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::debug;

pub use gmonads::GmonadsClient;
pub use huginn::{HuginnClient, RetryPolicy};
pub use metrics::MetricsScraper;

/// Figures from the validator's own metrics endpoint
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct NodeMetrics {
    pub height: Option<u64>,
    pub peers: Option<u64>,
    /// Cumulative count of rounds where execution lagged consensus
    pub execution_lagging: Option<u64>,
    /// Cumulative count of proposals rejected for a bad timestamp
    pub ts_validation_fail: Option<u64>,
}

/// Uptime and membership as reported by one third-party source
#[derive(Debug, Clone, PartialEq)]
pub struct UptimeReport {
    pub source: UptimeSource,
    pub uptime_percent: Option<f64>,
    pub finalized_count: Option<u64>,
    pub timeout_count: Option<u64>,
    pub in_active_set: Option<bool>,
    /// When the source data was fetched, not when it was served from cache
    pub source_timestamp: DateTime<Utc>,
}

/// Raw results of every adapter for one validator on one tick
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeBundle {
    pub node: Result<NodeMetrics, ProbeError>,
    /// `None` when no node exporter is configured
    pub resources: Option<Result<ResourceUsage, ProbeError>>,
    pub rpc: Option<Result<bool, ProbeError>>,
    pub primary: Option<Result<UptimeReport, ProbeError>>,
    pub secondary: Option<Result<UptimeReport, ProbeError>>,
    pub collected_at: DateTime<Utc>,
}

impl ProbeBundle {
    /// Bundle for a probe that exceeded the per-validator deadline
    pub fn timed_out(seconds: u64, collected_at: DateTime<Utc>) -> Self {
        Self {
            node: Err(ProbeError::Timeout {
                source: "probe".to_string(),
                seconds,
            }),
            resources: None,
            rpc: None,
            primary: None,
            secondary: None,
            collected_at,
        }
    }
}

#[async_trait]
pub trait ValidatorProber: Send + Sync {
    async fn probe(&self, name: &str, validator: &ValidatorConfig) -> ProbeBundle;

    async fn network_health(&self, network: Network) -> Option<NetworkHealth>;
}

/// Production prober over HTTP
pub struct HttpProber {
    scraper: MetricsScraper,
    huginn: Option<HuginnClient>,
    gmonads: Option<Arc<GmonadsClient>>,
    source_deadline: Duration,
}

/// Per-source deadline that leaves headroom under the whole-probe timeout
pub fn source_deadline(probe_timeout: Duration) -> Duration {
    probe_timeout.mul_f64(health::SOURCE_DEADLINE_SHARE)
}

impl HttpProber {
    pub fn new(config: &Config) -> Result<Self> {
        let client = HttpClient::builder()
            .timeout(http::REQUEST_TIMEOUT)
            .connect_timeout(http::CONNECT_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;

        let gmonads = config
            .gmonads
            .enabled
            .then(|| Arc::new(GmonadsClient::new(client.clone(), config.gmonads.clone())));
        let huginn = config.huginn.enabled.then(|| {
            HuginnClient::new(client.clone(), config.huginn.clone(), gmonads.clone())
        });

        let deadline = source_deadline(config.probe_timeout());
        Ok(Self::from_parts(MetricsScraper::new(client, deadline), huginn, gmonads)
            .with_source_deadline(deadline))
    }

    pub fn from_parts(
        scraper: MetricsScraper,
        huginn: Option<HuginnClient>,
        gmonads: Option<Arc<GmonadsClient>>,
    ) -> Self {
        Self {
            scraper,
            huginn,
            gmonads,
            source_deadline: source_deadline(Duration::from_secs(
                health::DEFAULT_PROBE_TIMEOUT_SECONDS,
            )),
        }
    }

    pub fn with_source_deadline(mut self, deadline: Duration) -> Self {
        self.source_deadline = deadline;
        self
    }
}

#[async_trait]
impl ValidatorProber for HttpProber {
    async fn probe(&self, name: &str, validator: &ValidatorConfig) -> ProbeBundle {
        let key = validator.normalized_key();
        let metrics_url = validator.metrics_url();
        let rpc_url = validator.rpc_url();
        let exporter_url = validator.node_exporter_url();

        let node = self.scraper.node_metrics(&metrics_url);
        let rpc = self.scraper.rpc_healthy(&rpc_url);
        let resources = async {
            match &exporter_url {
                Some(url) => Some(self.scraper.resources(name, url).await),
                None => None,
            }
        };
        let deadline = self.source_deadline;
        let primary = async {
            match &self.huginn {
                Some(client) => Some(client.uptime_within(validator.network, &key, deadline).await),
                None => None,
            }
        };
        let secondary = async {
            match &self.gmonads {
                Some(client) => Some(
                    client
                        .membership_within(validator.network, &key, deadline)
                        .await,
                ),
                None => None,
            }
        };

        let (node, rpc, resources, primary, secondary) =
            tokio::join!(node, rpc, resources, primary, secondary);

        debug!(
            "Probe for {}: node={:?} rpc={:?}",
            name,
            node.as_ref().map(|n| n.height),
            rpc
        );

        ProbeBundle {
            node,
            resources,
            rpc: Some(rpc),
            primary,
            secondary,
            collected_at: Utc::now(),
        }
    }

    async fn network_health(&self, network: Network) -> Option<NetworkHealth> {
        let gmonads = self.gmonads.as_ref()?;
        match gmonads.network_health(network).await {
            Ok(health) => Some(health),
            Err(e) => {
                debug!("Network health unavailable for {}: {}", network, e);
                None
            }
        }
    }
}

pub(crate) async fn fetch_text(
    client: &HttpClient,
    url: &str,
    source: &str,
    limit: Duration,
) -> Result<String, ProbeError> {
    let response = timeout(limit, client.get(url).send())
        .await
        .map_err(|_| ProbeError::Timeout {
            source: source.to_string(),
            seconds: limit.as_secs(),
        })?
        .map_err(|e| ProbeError::Unreachable {
            source: source.to_string(),
            reason: e.to_string(),
        })?;

    let status = response.status();
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        return Err(ProbeError::RateLimited {
            source: source.to_string(),
        });
    }
    if !status.is_success() {
        return Err(ProbeError::Unreachable {
            source: source.to_string(),
            reason: format!("HTTP {}", status),
        });
    }

    response.text().await.map_err(|e| ProbeError::Malformed {
        source: source.to_string(),
        reason: e.to_string(),
    })
}

pub(crate) async fn fetch_json<T: DeserializeOwned>(
    client: &HttpClient,
    url: &str,
    source: &str,
    limit: Duration,
) -> Result<T, ProbeError> {
    let body = fetch_text(client, url, source, limit).await?;
    serde_json::from_str(&body).map_err(|e| ProbeError::Malformed {
        source: source.to_string(),
        reason: e.to_string(),
    })
}
