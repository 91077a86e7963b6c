//! Mock validator endpoints
//!
//! Serves Prometheus metrics on `/metrics` and JSON-RPC on `/`. A node
//! exporter is a second instance serving `mock_node_exporter` on `/metrics`.

use serde_json::json;
use wiremock::{
    matchers::{method, path},
    Mock, MockServer, ResponseTemplate,
};

pub struct MockValidatorServer {
    pub server: MockServer,
    pub base_url: String,
}

impl MockValidatorServer {
    pub async fn start() -> Self {
        let server = MockServer::start().await;
        let base_url = server.uri();
        Self { server, base_url }
    }

    /// Port the mock listens on, for `metrics_port`/`rpc_port` in configs
    pub fn port(&self) -> u16 {
        self.server.address().port()
    }

    pub async fn mock_metrics(&self, height: u64, peers: u64) {
        let body = format!(
            "# HELP monad_execution_ledger_block_num Latest block\n\
             # TYPE monad_execution_ledger_block_num gauge\n\
             monad_execution_ledger_block_num {}\n\
             monad_peer_disc_num_peers {}\n",
            height, peers
        );
        Mock::given(method("GET"))
            .and(path("/metrics"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(&self.server)
            .await;
    }

    /// Serve each height once, in order
    pub async fn mock_metrics_sequence(&self, heights: &[u64]) {
        for height in heights {
            Mock::given(method("GET"))
                .and(path("/metrics"))
                .respond_with(ResponseTemplate::new(200).set_body_string(format!(
                    "monad_execution_ledger_block_num {}\nmonad_peer_disc_num_peers 20\n",
                    height
                )))
                .up_to_n_times(1)
                .mount(&self.server)
                .await;
        }
    }

    /// Serve each (height, execution lagging, timestamp failures) sample once, in order
    pub async fn mock_metrics_counters_sequence(&self, samples: &[(u64, u64, u64)]) {
        for (height, lagging, ts_fails) in samples {
            Mock::given(method("GET"))
                .and(path("/metrics"))
                .respond_with(ResponseTemplate::new(200).set_body_string(format!(
                    "monad_execution_ledger_block_num {}\n\
                     monad_peer_disc_num_peers 20\n\
                     # TYPE monad_state_consensus_events_rx_execution_lagging counter\n\
                     monad_state_consensus_events_rx_execution_lagging {}\n\
                     monad_state_consensus_events_failed_ts_validation {}\n",
                    height, lagging, ts_fails
                )))
                .up_to_n_times(1)
                .mount(&self.server)
                .await;
        }
    }

    pub async fn mock_metrics_down(&self) {
        Mock::given(method("GET"))
            .and(path("/metrics"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&self.server)
            .await;
    }

    pub async fn mock_node_exporter(&self, idle_seconds: f64, total_seconds: f64, disk_used_pct: f64) {
        let disk_size = 1000.0;
        let disk_avail = disk_size * (100.0 - disk_used_pct) / 100.0;
        let body = format!(
            "node_cpu_seconds_total{{cpu=\"0\",mode=\"idle\"}} {}\n\
             node_cpu_seconds_total{{cpu=\"0\",mode=\"user\"}} {}\n\
             node_memory_MemTotal_bytes 1000\n\
             node_memory_MemAvailable_bytes 500\n\
             node_filesystem_size_bytes{{device=\"/dev/sda1\",mountpoint=\"/\"}} {}\n\
             node_filesystem_avail_bytes{{device=\"/dev/sda1\",mountpoint=\"/\"}} {}\n",
            idle_seconds,
            total_seconds - idle_seconds,
            disk_size,
            disk_avail
        );
        Mock::given(method("GET"))
            .and(path("/metrics"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(&self.server)
            .await;
    }

    pub async fn mock_rpc_error(&self) {
        Mock::given(method("POST"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0",
                "id": 1,
                "error": { "code": -32000, "message": "node is syncing" }
            })))
            .mount(&self.server)
            .await;
    }

    pub async fn reset(&self) {
        self.server.reset().await;
    }

    pub async fn mock_rpc_healthy(&self, height: u64) {
        Mock::given(method("POST"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0",
                "id": 1,
                "result": format!("0x{:x}", height)
            })))
            .mount(&self.server)
            .await;
    }
}
