//! Huginn validator API client (primary uptime source)
//!
//! Uptime reports are cached per (network, key) because the API allows only a
//! handful of lookups per hour. Membership is derived by comparing the
//! validator's last round with the network round of a known-active validator.

use super::circuit_breaker::CircuitBreaker;
use super::gmonads::GmonadsClient;
use super::UptimeReport;
use crate::config::{normalize_key, HuginnConfig, Network};
use crate::constants::huginn;
use crate::errors::ProbeError;
use crate::health::UptimeSource;
use chrono::{DateTime, Duration, Utc};
use reqwest::{Client as HttpClient, StatusCode};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

const SOURCE: &str = "huginn";

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: std::time::Duration,
    pub max_delay: std::time::Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: huginn::MAX_RETRIES,
            base_delay: std::time::Duration::from_millis(huginn::RETRY_BASE_DELAY_MS),
            max_delay: std::time::Duration::from_millis(huginn::RETRY_MAX_DELAY_MS),
        }
    }
}

impl RetryPolicy {
    fn delay(&self, attempt: u32) -> std::time::Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HuginnUptime {
    pub validator_id: Option<u64>,
    pub validator_name: Option<String>,
    #[serde(default)]
    pub total_events: u64,
    #[serde(default)]
    pub finalized_count: u64,
    #[serde(default)]
    pub timeout_count: u64,
    pub last_round: Option<u64>,
    pub last_block_height: Option<u64>,
}

impl HuginnUptime {
    pub fn uptime_percent(&self) -> f64 {
        if self.total_events == 0 {
            return 0.0;
        }
        let pct = self.finalized_count as f64 / self.total_events as f64 * 100.0;
        (pct * 100.0).round() / 100.0
    }

    /// Membership relative to the network round; a validator with no events never joined
    pub fn in_active_set(&self, network_round: Option<u64>) -> Option<bool> {
        if self.total_events == 0 {
            return Some(false);
        }
        match (network_round, self.last_round) {
            (Some(network), Some(own)) => {
                Some(network.saturating_sub(own) <= huginn::ACTIVE_SET_ROUND_THRESHOLD)
            }
            _ => None,
        }
    }
}

/// Responses come as `{success, uptime: {...}}`; older deployments return the bare object
fn parse_uptime(body: &str) -> Result<HuginnUptime, ProbeError> {
    let malformed = |reason: String| ProbeError::Malformed {
        source: SOURCE.to_string(),
        reason,
    };
    let value: serde_json::Value = serde_json::from_str(body).map_err(|e| malformed(e.to_string()))?;
    if value.get("success").and_then(|s| s.as_bool()) == Some(false) {
        return Err(malformed("success=false".to_string()));
    }
    let data = value.get("uptime").cloned().unwrap_or(value);
    if !data.is_object() {
        return Err(malformed("expected an uptime object".to_string()));
    }
    serde_json::from_value(data).map_err(|e| malformed(e.to_string()))
}

pub struct HuginnClient {
    client: HttpClient,
    config: HuginnConfig,
    gmonads: Option<Arc<GmonadsClient>>,
    retry: RetryPolicy,
    cache: Mutex<HashMap<String, UptimeReport>>,
    network_rounds: Mutex<HashMap<Network, (u64, DateTime<Utc>)>>,
    breakers: Mutex<HashMap<Network, CircuitBreaker>>,
}

impl HuginnClient {
    pub fn new(
        client: HttpClient,
        config: HuginnConfig,
        gmonads: Option<Arc<GmonadsClient>>,
    ) -> Self {
        Self {
            client,
            config,
            gmonads,
            retry: RetryPolicy::default(),
            cache: Mutex::new(HashMap::new()),
            network_rounds: Mutex::new(HashMap::new()),
            breakers: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn cache_ttl(&self) -> Duration {
        Duration::seconds(self.config.check_interval_seconds as i64)
    }

    async fn breaker_allows(&self, network: Network) -> bool {
        let mut breakers = self.breakers.lock().await;
        breakers
            .entry(network)
            .or_insert_with(|| new_breaker(network))
            .can_execute(Utc::now())
    }

    async fn record_outcome(&self, network: Network, success: bool) {
        let mut breakers = self.breakers.lock().await;
        let breaker = breakers.entry(network).or_insert_with(|| new_breaker(network));
        if success {
            breaker.record_success();
        } else {
            breaker.record_failure(Utc::now());
        }
    }

    /// GET with retries on 5xx and transport errors, guarded by the network's circuit breaker
    async fn fetch_with_retry(
        &self,
        url: &str,
        network: Network,
    ) -> Result<(StatusCode, String), ProbeError> {
        if !self.breaker_allows(network).await {
            return Err(ProbeError::CircuitOpen {
                source: format!("{}/{}", SOURCE, network),
            });
        }

        let request_timeout = std::time::Duration::from_secs(self.config.timeout_seconds);
        let mut last_error = None;

        for attempt in 0..self.retry.max_attempts.max(1) {
            if attempt > 0 {
                sleep(self.retry.delay(attempt - 1)).await;
            }

            match timeout(request_timeout, self.client.get(url).send()).await {
                Ok(Ok(response)) if response.status().is_server_error() => {
                    warn!(
                        "Huginn server error (HTTP {}) for {}, attempt {}/{}",
                        response.status(),
                        network,
                        attempt + 1,
                        self.retry.max_attempts
                    );
                    last_error = Some(ProbeError::Unreachable {
                        source: SOURCE.to_string(),
                        reason: format!("HTTP {}", response.status()),
                    });
                }
                Ok(Ok(response)) => {
                    let status = response.status();
                    let body = response.text().await.map_err(|e| ProbeError::Malformed {
                        source: SOURCE.to_string(),
                        reason: e.to_string(),
                    })?;
                    self.record_outcome(network, true).await;
                    return Ok((status, body));
                }
                Ok(Err(e)) => {
                    warn!(
                        "Huginn request failed for {}: {}, attempt {}/{}",
                        network,
                        e,
                        attempt + 1,
                        self.retry.max_attempts
                    );
                    last_error = Some(ProbeError::Unreachable {
                        source: SOURCE.to_string(),
                        reason: e.to_string(),
                    });
                }
                Err(_) => {
                    last_error = Some(ProbeError::Timeout {
                        source: SOURCE.to_string(),
                        seconds: self.config.timeout_seconds,
                    });
                }
            }
        }

        self.record_outcome(network, false).await;
        Err(last_error.unwrap_or(ProbeError::Unreachable {
            source: SOURCE.to_string(),
            reason: "no attempt made".to_string(),
        }))
    }

    async fn round_of(&self, base_url: &str, id: u64, network: Network) -> Option<u64> {
        let url = format!("{}/validator/uptime/{}", base_url, id);
        match self.fetch_with_retry(&url, network).await {
            Ok((status, body)) if status.is_success() => {
                parse_uptime(&body).ok().and_then(|u| u.last_round)
            }
            Ok((status, _)) => {
                debug!("Reference validator {} on {} returned {}", id, network, status);
                None
            }
            Err(e) => {
                debug!("Reference validator {} on {} failed: {}", id, network, e);
                None
            }
        }
    }

    /// Current network round; a stale cached round is used when every lookup fails
    pub async fn network_round(&self, network: Network) -> Option<u64> {
        let now = Utc::now();
        let cached = self.network_rounds.lock().await.get(&network).copied();
        if let Some((round, at)) = cached {
            if now - at < Duration::seconds(huginn::NETWORK_ROUND_TTL_SECONDS) {
                return Some(round);
            }
        }

        let base_url = self.config.endpoint(network);
        let base_url = base_url.trim_end_matches('/');

        let mut round = None;
        if let Some(gmonads) = &self.gmonads {
            if let Some(index) = gmonads.reference_validator_index(network).await {
                round = self.round_of(base_url, index, network).await;
            }
        }

        if round.is_none() {
            for id in huginn::REFERENCE_VALIDATOR_IDS {
                if let Some(r) = self.round_of(base_url, id, network).await {
                    round = Some(round.map_or(r, |best: u64| best.max(r)));
                }
            }
        }

        match round {
            Some(round) => {
                debug!("Network round for {}: {}", network, round);
                self.network_rounds.lock().await.insert(network, (round, now));
                Some(round)
            }
            None => {
                warn!("No reference round available for {}, using cached value", network);
                cached.map(|(round, _)| round)
            }
        }
    }

    /// Uptime lookup bounded by `deadline`, retries and reference rounds included.
    /// An expired deadline counts as a breaker failure and serves the cached
    /// report whatever its age.
    pub async fn uptime_within(
        &self,
        network: Network,
        validator_key: &str,
        deadline: std::time::Duration,
    ) -> Result<UptimeReport, ProbeError> {
        match timeout(deadline, self.uptime(network, validator_key)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    "Huginn lookup for {} on {} exceeded {:.1}s",
                    validator_key,
                    network,
                    deadline.as_secs_f64()
                );
                self.record_outcome(network, false).await;
                let cache_key = format!("{}:{}", network, normalize_key(validator_key));
                self.cache
                    .lock()
                    .await
                    .get(&cache_key)
                    .cloned()
                    .ok_or_else(|| ProbeError::Timeout {
                        source: SOURCE.to_string(),
                        seconds: deadline.as_secs(),
                    })
            }
        }
    }

    /// Uptime report for one validator; failures fall back to the last cached report
    pub async fn uptime(
        &self,
        network: Network,
        validator_key: &str,
    ) -> Result<UptimeReport, ProbeError> {
        let key = normalize_key(validator_key);
        let cache_key = format!("{}:{}", network, key);
        let now = Utc::now();

        let cached = self.cache.lock().await.get(&cache_key).cloned();
        if let Some(report) = &cached {
            if now - report.source_timestamp < self.cache_ttl() {
                return Ok(report.clone());
            }
        }

        let network_round = self.network_round(network).await;
        let base_url = self.config.endpoint(network);
        let url = format!("{}/validator/uptime/{}", base_url.trim_end_matches('/'), key);

        let fallback = |error: ProbeError| match &cached {
            Some(report) => {
                debug!("Serving cached Huginn report for {} after: {}", cache_key, error);
                Ok(report.clone())
            }
            None => Err(error),
        };

        let (status, body) = match self.fetch_with_retry(&url, network).await {
            Ok(response) => response,
            Err(e) => return fallback(e),
        };

        if status == StatusCode::TOO_MANY_REQUESTS {
            warn!("Huginn rate limited on {}", network);
            return fallback(ProbeError::RateLimited {
                source: SOURCE.to_string(),
            });
        }
        if status == StatusCode::NOT_FOUND {
            return fallback(ProbeError::NotFound {
                source: SOURCE.to_string(),
                key,
            });
        }
        if !status.is_success() {
            return fallback(ProbeError::Unreachable {
                source: SOURCE.to_string(),
                reason: format!("HTTP {}", status),
            });
        }

        let uptime = match parse_uptime(&body) {
            Ok(uptime) => uptime,
            Err(e) => return fallback(e),
        };

        let report = UptimeReport {
            source: UptimeSource::Huginn,
            uptime_percent: Some(uptime.uptime_percent()),
            finalized_count: Some(uptime.finalized_count),
            timeout_count: Some(uptime.timeout_count),
            in_active_set: uptime.in_active_set(network_round),
            source_timestamp: now,
        };
        self.cache.lock().await.insert(cache_key, report.clone());
        Ok(report)
    }
}

fn new_breaker(network: Network) -> CircuitBreaker {
    CircuitBreaker::new(
        format!("{}/{}", SOURCE, network),
        huginn::CIRCUIT_FAILURE_THRESHOLD,
        Duration::seconds(huginn::CIRCUIT_RECOVERY_SECONDS),
    )
}
