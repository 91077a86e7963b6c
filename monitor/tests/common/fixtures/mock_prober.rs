//! In-process prober whose results are switched by the test

use async_trait::async_trait;
use chrono::Utc;
use monitor::errors::ProbeError;
use monitor::health::{NetworkHealth, ResourceUsage};
use monitor::probes::{NodeMetrics, ProbeBundle, ValidatorProber};
use monitor::{Network, ValidatorConfig};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Reports an advancing height while up, an unreachable node while down
pub struct ScriptedProber {
    height: AtomicU64,
    reachable: AtomicBool,
    disk_pct: std::sync::Mutex<Option<f64>>,
    delay: Option<Duration>,
}

impl ScriptedProber {
    pub fn healthy() -> Arc<Self> {
        Arc::new(Self::new(None))
    }

    /// Every probe sleeps first, for timeout and shutdown tests
    pub fn slow(delay: Duration) -> Arc<Self> {
        Arc::new(Self::new(Some(delay)))
    }

    fn new(delay: Option<Duration>) -> Self {
        Self {
            height: AtomicU64::new(1000),
            reachable: AtomicBool::new(true),
            disk_pct: std::sync::Mutex::new(None),
            delay,
        }
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    pub fn set_disk(&self, disk_pct: Option<f64>) {
        *self.disk_pct.lock().unwrap() = disk_pct;
    }
}

#[async_trait]
impl ValidatorProber for ScriptedProber {
    async fn probe(&self, _name: &str, _validator: &ValidatorConfig) -> ProbeBundle {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let node = if self.reachable.load(Ordering::SeqCst) {
            Ok(NodeMetrics {
                height: Some(self.height.fetch_add(1, Ordering::SeqCst) + 1),
                peers: Some(20),
                ..Default::default()
            })
        } else {
            Err(ProbeError::Unreachable {
                source: "metrics".to_string(),
                reason: "connection refused".to_string(),
            })
        };

        let resources = self.disk_pct.lock().unwrap().map(|disk| {
            Ok(ResourceUsage {
                cpu_pct: Some(10.0),
                mem_pct: Some(30.0),
                disk_pct: Some(disk),
            })
        });

        ProbeBundle {
            rpc: Some(Ok(node.is_ok())),
            node,
            resources,
            primary: None,
            secondary: None,
            collected_at: Utc::now(),
        }
    }

    async fn network_health(&self, _network: Network) -> Option<NetworkHealth> {
        None
    }
}
