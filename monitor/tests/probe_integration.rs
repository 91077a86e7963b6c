//! Integration tests for the probe adapters and the full check pipeline
//!
//! Validator endpoints, the uptime providers and the Telegram API are all
//! served by wiremock.

mod common;

use common::fixtures::*;
use monitor::config::{GmonadsConfig, HuginnConfig};
use monitor::errors::ProbeError;
use monitor::health::{AlertCategory, ChannelKind, HealthVerdict, UptimeSource};
use monitor::probes::{GmonadsClient, HuginnClient, MetricsScraper, RetryPolicy};
use monitor::{AlertService, Config, HealthMonitor, HttpProber, Network, StateStore, ValidatorProber};
use reqwest::Client;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use tempfile::TempDir;
use tokio::sync::watch;
use wiremock::matchers::{method, path, path_regex, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TELEGRAM_ROUTE: &str = "/bottest-token/sendMessage";

fn scraper() -> MetricsScraper {
    MetricsScraper::new(Client::new(), std::time::Duration::from_secs(2))
}

fn no_retry() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 1,
        base_delay: std::time::Duration::from_millis(1),
        max_delay: std::time::Duration::from_millis(1),
    }
}

fn huginn_config(server: &MockServer, cache_seconds: u64) -> HuginnConfig {
    HuginnConfig {
        enabled: true,
        endpoints: BTreeMap::from([("testnet".to_string(), format!("{}/monad-api", server.uri()))]),
        check_interval_seconds: cache_seconds,
        timeout_seconds: 2,
    }
}

fn gmonads_config(server: &MockServer) -> GmonadsConfig {
    GmonadsConfig {
        enabled: true,
        base_url: server.uri(),
        check_interval_seconds: 120,
        timeout_seconds: 2,
    }
}

async fn mock_reference_rounds(server: &MockServer, round: u64) {
    Mock::given(method("GET"))
        .and(path_regex(r"^/monad-api/validator/uptime/[1-5]$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "uptime": { "total_events": 100, "finalized_count": 100, "timeout_count": 0, "last_round": round }
        })))
        .mount(server)
        .await;
}

fn uptime_path() -> String {
    format!("/monad-api/validator/uptime/{}", keys::VALIDATOR_1)
}

// === Validator endpoints ===

#[tokio::test]
async fn test_node_metrics_are_parsed() {
    let validator = MockValidatorServer::start().await;
    validator.mock_metrics(123_456, 42).await;

    let metrics = scraper()
        .node_metrics(&format!("{}/metrics", validator.base_url))
        .await
        .unwrap();

    assert_eq!(metrics.height, Some(123_456));
    assert_eq!(metrics.peers, Some(42));
}

#[tokio::test]
async fn test_node_fault_counters_are_parsed() {
    let validator = MockValidatorServer::start().await;
    validator.mock_metrics_counters_sequence(&[(77, 12, 3)]).await;

    let metrics = scraper()
        .node_metrics(&format!("{}/metrics", validator.base_url))
        .await
        .unwrap();

    assert_eq!(metrics.height, Some(77));
    assert_eq!(metrics.execution_lagging, Some(12));
    assert_eq!(metrics.ts_validation_fail, Some(3));
}

#[tokio::test]
async fn test_node_metrics_errors() {
    let validator = MockValidatorServer::start().await;
    validator.mock_metrics_down().await;
    let url = format!("{}/metrics", validator.base_url);

    assert!(matches!(
        scraper().node_metrics(&url).await,
        Err(ProbeError::Unreachable { .. })
    ));

    validator.reset().await;
    Mock::given(method("GET"))
        .and(path("/metrics"))
        .respond_with(ResponseTemplate::new(200).set_body_string("\n# only comments\n"))
        .mount(&validator.server)
        .await;
    assert!(matches!(
        scraper().node_metrics(&url).await,
        Err(ProbeError::Malformed { .. })
    ));
}

#[tokio::test]
async fn test_node_exporter_resources() {
    let exporter = MockValidatorServer::start().await;
    exporter.mock_node_exporter(900.0, 1000.0, 96.0).await;

    let usage = scraper()
        .resources(validators::VAL_1, &format!("{}/metrics", exporter.base_url))
        .await
        .unwrap();

    assert_eq!(usage.cpu_pct, Some(10.0));
    assert_eq!(usage.mem_pct, Some(50.0));
    assert_eq!(usage.disk_pct, Some(96.0));
}

#[tokio::test]
async fn test_rpc_health() {
    let validator = MockValidatorServer::start().await;
    validator.mock_rpc_healthy(100).await;
    assert_eq!(scraper().rpc_healthy(&validator.base_url).await, Ok(true));

    validator.reset().await;
    validator.mock_rpc_error().await;
    assert_eq!(scraper().rpc_healthy(&validator.base_url).await, Ok(false));

    assert!(scraper().rpc_healthy("http://127.0.0.1:1").await.is_err());
}

#[tokio::test]
async fn test_http_prober_collects_bundle() {
    let validator = MockValidatorServer::start().await;
    validator.mock_metrics(500, 9).await;
    validator.mock_rpc_healthy(500).await;
    let exporter = MockValidatorServer::start().await;
    exporter.mock_node_exporter(950.0, 1000.0, 40.0).await;

    let mut config = validator_config("127.0.0.1", validator.port(), validator.port());
    config.node_exporter_port = Some(exporter.port());
    let prober = HttpProber::from_parts(scraper(), None, None);

    let bundle = prober.probe(validators::VAL_1, &config).await;

    assert_eq!(bundle.node.unwrap().height, Some(500));
    assert_eq!(bundle.rpc, Some(Ok(true)));
    assert_eq!(bundle.resources.unwrap().unwrap().disk_pct, Some(40.0));
    assert!(bundle.primary.is_none());
    assert!(bundle.secondary.is_none());
    assert!(prober.network_health(Network::Testnet).await.is_none());
}

// === Uptime providers ===

#[tokio::test]
async fn test_huginn_uptime_and_membership() {
    let server = MockServer::start().await;
    mock_reference_rounds(&server, 5_100).await;
    Mock::given(method("GET"))
        .and(path(uptime_path()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "uptime": {
                "validator_id": 42,
                "total_events": 1000,
                "finalized_count": 990,
                "timeout_count": 10,
                "last_round": 5_000
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = HuginnClient::new(Client::new(), huginn_config(&server, 3600), None)
        .with_retry_policy(no_retry());

    let report = client.uptime(Network::Testnet, keys::VALIDATOR_1).await.unwrap();
    assert_eq!(report.source, UptimeSource::Huginn);
    assert_eq!(report.uptime_percent, Some(99.0));
    assert_eq!(report.timeout_count, Some(10));
    assert_eq!(report.in_active_set, Some(true));

    // Second lookup is served from the cache; `expect(1)` checks it on drop
    let cached = client.uptime(Network::Testnet, keys::VALIDATOR_1).await.unwrap();
    assert_eq!(cached, report);
}

#[tokio::test]
async fn test_huginn_far_behind_network_round_is_inactive() {
    let server = MockServer::start().await;
    mock_reference_rounds(&server, 100_000).await;
    Mock::given(method("GET"))
        .and(path(uptime_path()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "total_events": 50, "finalized_count": 25, "timeout_count": 25, "last_round": 1_000
        })))
        .mount(&server)
        .await;

    let client = HuginnClient::new(Client::new(), huginn_config(&server, 3600), None)
        .with_retry_policy(no_retry());

    let report = client.uptime(Network::Testnet, keys::VALIDATOR_1).await.unwrap();
    assert_eq!(report.in_active_set, Some(false));
    assert_eq!(report.uptime_percent, Some(50.0));
}

#[tokio::test]
async fn test_huginn_rate_limit_and_cached_fallback() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(uptime_path()))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;

    // Zero TTL: every lookup goes to the API
    let client = HuginnClient::new(Client::new(), huginn_config(&server, 0), None)
        .with_retry_policy(no_retry());

    assert!(matches!(
        client.uptime(Network::Testnet, keys::VALIDATOR_1).await,
        Err(ProbeError::RateLimited { .. })
    ));

    server.reset().await;
    Mock::given(method("GET"))
        .and(path(uptime_path()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "uptime": { "total_events": 10, "finalized_count": 10, "timeout_count": 0 }
        })))
        .mount(&server)
        .await;
    let fresh = client.uptime(Network::Testnet, keys::VALIDATOR_1).await.unwrap();

    server.reset().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    let fallback = client.uptime(Network::Testnet, keys::VALIDATOR_1).await.unwrap();
    assert_eq!(fallback, fresh);
}

#[tokio::test]
async fn test_huginn_deadline_serves_cached_report() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(uptime_path()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "uptime": { "total_events": 10, "finalized_count": 9, "timeout_count": 1 }
        })))
        .mount(&server)
        .await;

    let client = HuginnClient::new(Client::new(), huginn_config(&server, 0), None)
        .with_retry_policy(no_retry());
    let deadline = std::time::Duration::from_millis(500);
    let fresh = client
        .uptime_within(Network::Testnet, keys::VALIDATOR_1, deadline)
        .await
        .unwrap();

    server.reset().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(std::time::Duration::from_secs(30)))
        .mount(&server)
        .await;
    let started = std::time::Instant::now();
    let served = client
        .uptime_within(Network::Testnet, keys::VALIDATOR_1, deadline)
        .await
        .unwrap();
    assert!(started.elapsed() < std::time::Duration::from_secs(2));
    assert_eq!(served, fresh);

    // Nothing cached for another key: the deadline surfaces as a timeout
    assert!(matches!(
        client
            .uptime_within(Network::Testnet, keys::VALIDATOR_2, deadline)
            .await,
        Err(ProbeError::Timeout { .. })
    ));
}

#[tokio::test]
async fn test_gmonads_membership_and_network_health() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/validators/epoch"))
        .and(query_param("network", "testnet"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                { "node_id": keys::VALIDATOR_1, "val_index": 7, "validator_set_type": "active" },
                { "node_id": keys::VALIDATOR_2, "val_index": 8, "validator_set_type": "inactive" }
            ]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/blocks/1m"))
        .and(query_param("network", "testnet"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                { "blocks": 60, "avg_tps": 100.0, "avg_block_fullness_pct": 10.0 },
                { "blocks": 60, "avg_tps": 200.0, "avg_block_fullness_pct": 30.0 }
            ]
        })))
        .mount(&server)
        .await;

    let client = GmonadsClient::new(Client::new(), gmonads_config(&server));

    let active = client.membership(Network::Testnet, keys::VALIDATOR_1).await.unwrap();
    assert_eq!(active.source, UptimeSource::Gmonads);
    assert_eq!(active.in_active_set, Some(true));
    assert_eq!(active.uptime_percent, None);

    let inactive = client
        .membership(Network::Testnet, &format!("0x{}", keys::VALIDATOR_2.to_uppercase()))
        .await
        .unwrap();
    assert_eq!(inactive.in_active_set, Some(false));

    let unknown = "02".to_string() + &"ab".repeat(32);
    assert!(matches!(
        client.membership(Network::Testnet, &unknown).await,
        Err(ProbeError::NotFound { .. })
    ));

    assert_eq!(client.reference_validator_index(Network::Testnet).await, Some(7));

    let health = client.network_health(Network::Testnet).await.unwrap();
    assert_eq!(health.total_blocks, 120);
    assert_eq!(health.tps, 150.0);
    assert_eq!(health.block_fullness_pct, 20.0);
    assert_eq!(health.active_validators, 1);
}

// === Full pipeline ===

struct Pipeline {
    monitor: HealthMonitor,
    _state_dir: TempDir,
    _shutdown: watch::Sender<bool>,
}

async fn pipeline(config: Config, prober: Arc<dyn ValidatorProber>) -> Pipeline {
    let state_dir = TempDir::new().unwrap();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let alerts = Arc::new(AlertService::from_config(&config, Client::new()));
    let monitor = HealthMonitor::new(
        Arc::new(config),
        prober,
        alerts,
        StateStore::new(state_dir.path()),
        None,
        shutdown_rx,
    )
    .await;
    Pipeline {
        monitor,
        _state_dir: state_dir,
        _shutdown: shutdown_tx,
    }
}

fn pipeline_config(validator: &MockValidatorServer, telegram: &MockWebhookServer) -> Config {
    let mut config = Config::default();
    config.alert_threshold = 3;
    config.probe_timeout_seconds = 5;
    config.telegram.token = "test-token".to_string();
    config.telegram.chat_id = "-1001".to_string();
    config.telegram.api_url = telegram.base_url.clone();
    config.huginn.enabled = false;
    config.gmonads.enabled = false;
    config.validators.insert(
        validators::VAL_1.to_string(),
        validator_config("127.0.0.1", validator.port(), validator.port()),
    );
    config
}

#[tokio::test]
async fn test_outage_alerts_once_and_recovers() {
    let validator = MockValidatorServer::start().await;
    validator.mock_metrics_down().await;
    let telegram = MockWebhookServer::start().await;
    telegram.mock_success(TELEGRAM_ROUTE).await;

    let config = pipeline_config(&validator, &telegram);
    let prober = Arc::new(HttpProber::new(&config).unwrap());
    let p = pipeline(config, prober).await;

    for _ in 0..5 {
        p.monitor.check_all_validators().await;
    }

    let sent = telegram.requests_to(TELEGRAM_ROUTE);
    assert_eq!(sent.len(), 1);
    assert!(sent[0].body["text"].as_str().unwrap().contains("DOWN val-1"));
    let state = p.monitor.validator_state(validators::VAL_1).await.unwrap();
    assert_eq!(state.verdict, HealthVerdict::Critical);
    assert_eq!(state.consecutive_failures, 5);

    validator.reset().await;
    validator.mock_metrics(1_000, 12).await;
    validator.mock_rpc_healthy(1_000).await;
    let summary = p.monitor.check_all_validators().await;

    assert_eq!(summary.healthy, 1);
    let sent = telegram.requests_to(TELEGRAM_ROUTE);
    assert_eq!(sent.len(), 2);
    assert!(sent[1].body["text"].as_str().unwrap().contains("RECOVERED"));
    let snapshot = p.monitor.snapshot().await;
    assert_eq!(snapshot.status, "healthy");
    assert_eq!(snapshot.validators[validators::VAL_1].height, Some(1_000));
}

#[tokio::test]
async fn test_stalled_height_goes_down() {
    let validator = MockValidatorServer::start().await;
    validator.mock_metrics_sequence(&[10, 11]).await;
    validator.mock_metrics(11, 20).await;
    let telegram = MockWebhookServer::start().await;
    telegram.mock_success(TELEGRAM_ROUTE).await;

    let config = pipeline_config(&validator, &telegram);
    let prober = Arc::new(HttpProber::new(&config).unwrap());
    let p = pipeline(config, prober).await;

    // 10, 11 advance; then three ticks stuck on 11
    for _ in 0..5 {
        p.monitor.check_all_validators().await;
    }

    let sent = telegram.requests_to(TELEGRAM_ROUTE);
    assert_eq!(sent.len(), 1);
    assert!(sent[0].body["text"]
        .as_str()
        .unwrap()
        .contains("block height stalled at 11"));
}

#[tokio::test]
async fn test_probe_deadline_counts_as_failure() {
    let telegram = MockWebhookServer::start().await;
    let validator = MockValidatorServer::start().await;
    let mut config = pipeline_config(&validator, &telegram);
    config.telegram.enabled = false;
    config.probe_timeout_seconds = 1;

    let p = pipeline(config, ScriptedProber::slow(std::time::Duration::from_secs(3))).await;
    let started = std::time::Instant::now();
    let summary = p.monitor.check_all_validators().await;

    assert!(started.elapsed() < std::time::Duration::from_secs(3));
    assert_eq!(summary.checked, 1);
    let state = p.monitor.validator_state(validators::VAL_1).await.unwrap();
    assert_eq!(state.consecutive_failures, 1);
    assert!(!state.last_reachable);
}

#[tokio::test]
async fn test_resource_alert_through_pipeline() {
    let telegram = MockWebhookServer::start().await;
    telegram.mock_success(TELEGRAM_ROUTE).await;
    let validator = MockValidatorServer::start().await;
    let config = pipeline_config(&validator, &telegram);

    let prober = ScriptedProber::healthy();
    let p = pipeline(config, prober.clone()).await;

    p.monitor.check_all_validators().await;
    prober.set_disk(Some(96.0));
    p.monitor.check_all_validators().await;
    p.monitor.check_all_validators().await;

    let sent = telegram.requests_to(TELEGRAM_ROUTE);
    assert_eq!(sent.len(), 1);
    assert!(sent[0].body["text"].as_str().unwrap().contains("RESOURCES val-1"));
    let snapshot = p.monitor.snapshot().await;
    assert_eq!(snapshot.validators[validators::VAL_1].state, "critical");
    assert_eq!(snapshot.status, "degraded");

    let extended = p.monitor.send_extended_reports().await;
    assert_eq!(extended, 1);
    let state = p.monitor.validator_state(validators::VAL_1).await.unwrap();
    assert_eq!(state.window.checks, 0);
    assert!(state
        .alert_ledger
        .last_sent_at(ChannelKind::Primary, AlertCategory::ExtendedReport)
        .is_some());
}

#[tokio::test]
async fn test_slow_huginn_does_not_discard_node_metrics() {
    let huginn = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "success": true, "uptime": { "total_events": 1 } }))
                .set_delay(std::time::Duration::from_secs(30)),
        )
        .mount(&huginn)
        .await;
    let validator = MockValidatorServer::start().await;
    validator.mock_metrics_sequence(&[100, 101, 102]).await;
    validator.mock_rpc_healthy(100).await;
    let telegram = MockWebhookServer::start().await;
    telegram.mock_success(TELEGRAM_ROUTE).await;

    let mut config = pipeline_config(&validator, &telegram);
    config.probe_timeout_seconds = 3;
    config.huginn = huginn_config(&huginn, 3600);
    config.huginn.timeout_seconds = 5;
    let prober = Arc::new(HttpProber::new(&config).unwrap());
    let p = pipeline(config, prober).await;

    for _ in 0..3 {
        let started = std::time::Instant::now();
        p.monitor.check_all_validators().await;
        assert!(started.elapsed() < std::time::Duration::from_secs(3));
    }

    let state = p.monitor.validator_state(validators::VAL_1).await.unwrap();
    assert!(state.last_reachable);
    assert_eq!(state.consecutive_failures, 0);
    assert_eq!(state.last_height, Some(102));
    assert_eq!(state.verdict, HealthVerdict::Active);
    assert!(telegram.requests_to(TELEGRAM_ROUTE).is_empty());
}

#[tokio::test]
async fn test_failed_down_alert_is_resent_on_later_tick() {
    let validator = MockValidatorServer::start().await;
    validator.mock_metrics_down().await;
    let telegram = MockWebhookServer::start().await;
    telegram.mock_failure_once(TELEGRAM_ROUTE, 502).await;
    telegram.mock_success(TELEGRAM_ROUTE).await;

    let config = pipeline_config(&validator, &telegram);
    let prober = Arc::new(HttpProber::new(&config).unwrap());
    let p = pipeline(config, prober).await;

    for _ in 0..3 {
        p.monitor.check_all_validators().await;
    }
    assert!(telegram.requests_to(TELEGRAM_ROUTE).is_empty());
    let state = p.monitor.validator_state(validators::VAL_1).await.unwrap();
    assert_eq!(state.alert_ledger.pending.len(), 1);

    p.monitor.check_all_validators().await;
    p.monitor.check_all_validators().await;

    let sent = telegram.requests_to(TELEGRAM_ROUTE);
    assert_eq!(sent.len(), 1);
    assert!(sent[0].body["text"].as_str().unwrap().contains("DOWN val-1"));
    let state = p.monitor.validator_state(validators::VAL_1).await.unwrap();
    assert!(state.alert_ledger.pending.is_empty());
    assert!(state
        .alert_ledger
        .last_sent_at(ChannelKind::Primary, AlertCategory::Down)
        .is_some());
}

#[tokio::test]
async fn test_growing_execution_lagging_goes_down() {
    let validator = MockValidatorServer::start().await;
    validator
        .mock_metrics_counters_sequence(&[(100, 1, 0), (101, 3, 0), (102, 5, 0), (103, 7, 0)])
        .await;
    validator.mock_rpc_healthy(100).await;
    let telegram = MockWebhookServer::start().await;
    telegram.mock_success(TELEGRAM_ROUTE).await;

    let config = pipeline_config(&validator, &telegram);
    let prober = Arc::new(HttpProber::new(&config).unwrap());
    let p = pipeline(config, prober).await;

    p.monitor.check_all_validators().await;
    let snapshot = p.monitor.snapshot().await;
    assert!(snapshot.validators[validators::VAL_1]
        .notes
        .iter()
        .any(|n| n.contains("execution lagging detected: 1")));

    for _ in 0..3 {
        p.monitor.check_all_validators().await;
    }

    let sent = telegram.requests_to(TELEGRAM_ROUTE);
    assert_eq!(sent.len(), 1);
    assert!(sent[0].body["text"]
        .as_str()
        .unwrap()
        .contains("execution lagging increasing: +2 (total 7)"));
    let state = p.monitor.validator_state(validators::VAL_1).await.unwrap();
    assert_eq!(state.verdict, HealthVerdict::Critical);
}
