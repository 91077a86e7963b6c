// File: monitor/src/health/monitor.rs
use super::reconciler::Reconciler;
use super::state_machine::HealthStateMachine;
use super::types::{HealthSnapshot, HealthVerdict, ValidatorSnapshot, ValidatorState};
use crate::config::{Config, Network, ValidatorConfig};
use crate::database::{CheckRecord, Database};
use crate::probes::{ProbeBundle, ValidatorProber};
use crate::services::AlertService;
use crate::state_store::StateStore;
use anyhow::{anyhow, Result};
use chrono::Utc;
use futures::future::join_all;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::{watch, Mutex, RwLock};
use tokio::time::timeout;
use tracing::{debug, error, info, instrument, warn};

type StateSlot = Arc<Mutex<Option<ValidatorState>>>;

/// Outcome of one validator's check
#[derive(Debug, Clone, PartialEq)]
pub enum CheckOutcome {
    Completed {
        verdict: HealthVerdict,
        events: usize,
        delivered: usize,
    },
    /// Shutdown arrived while probing; state left untouched
    Cancelled,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickSummary {
    pub checked: usize,
    pub healthy: usize,
    pub events: usize,
    pub delivered: usize,
    pub cancelled: usize,
    pub failed: usize,
}

/// Owns every validator's state and runs the probe, evaluate, dispatch and persist pipeline
#[derive(Clone)]
pub struct HealthMonitor {
    config: Arc<Config>,
    prober: Arc<dyn ValidatorProber>,
    reconciler: Reconciler,
    machine: HealthStateMachine,
    alerts: Arc<AlertService>,
    store: StateStore,
    database: Option<Arc<Database>>,
    states: Arc<HashMap<String, StateSlot>>,
    snapshot: Arc<RwLock<HealthSnapshot>>,
    persistence_failures: Arc<Mutex<BTreeSet<String>>>,
    shutdown: watch::Receiver<bool>,
}

impl HealthMonitor {
    /// Build the monitor and restore persisted state for every enabled validator
    pub async fn new(
        config: Arc<Config>,
        prober: Arc<dyn ValidatorProber>,
        alerts: Arc<AlertService>,
        store: StateStore,
        database: Option<Arc<Database>>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        let started_at = Utc::now();
        let mut states = HashMap::new();
        let mut snapshot = HealthSnapshot::new(network_name(&config), started_at);

        for (name, validator) in &config.validators {
            let network = validator.network.to_string();
            if !validator.enabled {
                snapshot.validators.insert(
                    name.clone(),
                    ValidatorSnapshot::disabled(network, validator.host.clone()),
                );
                continue;
            }

            let restored = store.restore(name).await;
            let entry = match &restored {
                Some(state) => ValidatorSnapshot::from_state(network, validator.host.clone(), state),
                None => ValidatorSnapshot::pending(network, validator.host.clone()),
            };
            snapshot.validators.insert(name.clone(), entry);
            states.insert(name.clone(), Arc::new(Mutex::new(restored)));
        }

        info!(
            "Health monitor tracking {} enabled validator(s), {} disabled",
            states.len(),
            config.validators.len() - states.len()
        );

        Self {
            machine: HealthStateMachine::new(config.alert_threshold, config.thresholds),
            config,
            prober,
            reconciler: Reconciler::new(),
            alerts,
            store,
            database,
            states: Arc::new(states),
            snapshot: Arc::new(RwLock::new(snapshot)),
            persistence_failures: Arc::new(Mutex::new(BTreeSet::new())),
            shutdown,
        }
    }

    /// Cloned snapshot with the uptime filled in
    pub async fn snapshot(&self) -> HealthSnapshot {
        let mut snapshot = self.snapshot.read().await.clone();
        snapshot.uptime_seconds = (Utc::now() - snapshot.started_at).num_seconds();
        snapshot
    }

    /// Copy of one validator's current state, for inspection and tests
    pub async fn validator_state(&self, name: &str) -> Option<ValidatorState> {
        match self.states.get(name) {
            Some(slot) => slot.lock().await.clone(),
            None => None,
        }
    }

    pub fn alerts(&self) -> Arc<AlertService> {
        self.alerts.clone()
    }

    pub async fn check_all_validators(&self) -> TickSummary {
        let mut tasks = Vec::new();

        for (name, validator) in self.config.enabled_validators() {
            let task = {
                let name = name.clone();
                let validator = validator.clone();
                let monitor = self.clone();
                tokio::spawn(async move { monitor.check_validator(&name, &validator).await })
            };
            tasks.push(task);
        }

        let mut summary = TickSummary::default();
        for result in join_all(tasks).await {
            match result {
                Ok(Ok(CheckOutcome::Completed {
                    verdict,
                    events,
                    delivered,
                })) => {
                    summary.checked += 1;
                    summary.events += events;
                    summary.delivered += delivered;
                    if verdict.is_healthy() {
                        summary.healthy += 1;
                    }
                }
                Ok(Ok(CheckOutcome::Cancelled)) => summary.cancelled += 1,
                Ok(Err(e)) => {
                    error!("Validator check failed: {}", e);
                    summary.failed += 1;
                }
                Err(e) => {
                    error!("Validator check task panicked: {}", e);
                    summary.failed += 1;
                }
            }
        }

        self.refresh_network_health().await;
        self.finish_tick().await;

        info!(
            "Check tick complete: {}/{} healthy, {} event(s), {} delivered",
            summary.healthy, summary.checked, summary.events, summary.delivered
        );
        summary
    }

    #[instrument(skip(self, validator), fields(network = %validator.network))]
    pub async fn check_validator(&self, name: &str, validator: &ValidatorConfig) -> Result<CheckOutcome> {
        let slot = self
            .states
            .get(name)
            .cloned()
            .ok_or_else(|| anyhow!("Validator {} is not tracked", name))?;

        let mut shutdown = self.shutdown.clone();
        if *shutdown.borrow() {
            return Ok(CheckOutcome::Cancelled);
        }

        let probe_timeout = self.config.probe_timeout();
        let bundle = tokio::select! {
            _ = shutdown_requested(&mut shutdown) => {
                debug!("Shutdown during probe of {}, skipping state update", name);
                return Ok(CheckOutcome::Cancelled);
            }
            result = timeout(probe_timeout, self.prober.probe(name, validator)) => match result {
                Ok(bundle) => bundle,
                Err(_) => {
                    warn!("Probe for {} exceeded {}s", name, probe_timeout.as_secs());
                    ProbeBundle::timed_out(probe_timeout.as_secs(), Utc::now())
                }
            }
        };

        // From here on the mutation runs to completion, shutdown or not
        let mut guard = slot.lock().await;
        let previous = guard.as_ref();
        let observation = self
            .reconciler
            .reconcile(name, &bundle, previous.and_then(|s| s.last_height));
        let transition = self.machine.evaluate(name, previous, &observation);

        let mut next = transition.state;
        if let Some(prev) = previous {
            if prev.verdict != next.verdict {
                info!("{}: {} -> {}", name, prev.verdict, next.verdict);
            }
        }

        let report = self.alerts.dispatch(&transition.events, &mut next.alert_ledger).await;
        self.persist(name, &next).await;
        self.record_history(name, &next).await;

        let verdict = next.verdict;
        {
            let mut snapshot = self.snapshot.write().await;
            snapshot.validators.insert(
                name.to_string(),
                ValidatorSnapshot::from_state(
                    validator.network.to_string(),
                    validator.host.clone(),
                    &next,
                ),
            );
        }
        *guard = Some(next);

        Ok(CheckOutcome::Completed {
            verdict,
            events: transition.events.len(),
            delivered: report.delivered.len(),
        })
    }

    /// Emit one extended report per observed validator and reset its window
    pub async fn send_extended_reports(&self) -> usize {
        let mut delivered = 0;

        for (name, _) in self.config.enabled_validators() {
            let Some(slot) = self.states.get(name) else {
                continue;
            };
            let mut guard = slot.lock().await;
            let Some(state) = guard.as_mut() else {
                debug!("No observations for {} yet, skipping extended report", name);
                continue;
            };

            let event = self.machine.extended_report(name, state, Utc::now());
            let report = self
                .alerts
                .dispatch(std::slice::from_ref(&event), &mut state.alert_ledger)
                .await;
            delivered += report.delivered.len();

            let state = state.clone();
            self.persist(name, &state).await;
        }

        info!("Extended reports sent: {} deliveries", delivered);
        delivered
    }

    /// Remove check history past the retention period
    pub async fn prune_history(&self) -> Result<u64> {
        let Some(database) = &self.database else {
            return Ok(0);
        };
        let cutoff = Utc::now() - chrono::Duration::days(i64::from(self.config.history_retention_days));
        database.prune_history(cutoff).await
    }

    async fn persist(&self, name: &str, state: &ValidatorState) {
        let mut failures = self.persistence_failures.lock().await;
        match self.store.save(name, state).await {
            Ok(()) => {
                failures.remove(name);
            }
            Err(e) => {
                error!("CRITICAL: failed to persist state for {}: {}", name, e);
                failures.insert(name.to_string());
            }
        }
        let ok = failures.is_empty();
        drop(failures);
        self.snapshot.write().await.persistence_ok = ok;
    }

    async fn record_history(&self, name: &str, state: &ValidatorState) {
        if let Some(database) = &self.database {
            let record = CheckRecord::from_state(name, state, state.last_observation.unwrap_or_else(Utc::now));
            if let Err(e) = database.store_check_record(&record).await {
                warn!("Failed to record check history for {}: {}", name, e);
            }
        }
    }

    async fn refresh_network_health(&self) {
        let networks: BTreeSet<Network> = self
            .config
            .enabled_validators()
            .map(|(_, v)| v.network)
            .collect();

        for network in networks {
            if let Some(health) = self.prober.network_health(network).await {
                self.snapshot
                    .write()
                    .await
                    .network_health
                    .insert(network.to_string(), health);
            }
        }
    }

    async fn finish_tick(&self) {
        let mut snapshot = self.snapshot.write().await;
        snapshot.last_tick = Some(Utc::now());
        snapshot.status = if snapshot.all_healthy() {
            "healthy".to_string()
        } else {
            "degraded".to_string()
        };
    }
}

/// Networks of the enabled validators, or of every validator when none is enabled
fn network_name(config: &Config) -> String {
    let enabled: BTreeSet<&str> = config
        .enabled_validators()
        .map(|(_, v)| v.network.as_str())
        .collect();
    let networks = if enabled.is_empty() {
        config.validators.values().map(|v| v.network.as_str()).collect()
    } else {
        enabled
    };
    networks.into_iter().collect::<Vec<_>>().join(",")
}

/// Resolves once shutdown is signalled; never resolves if the sender is gone
async fn shutdown_requested(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
