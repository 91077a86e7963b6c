//! Health state machine
//!
//! Applies the ordered transition rules to one validator's state and one
//! observation, producing the next state and the tick's alert events:
//!
//! 1. reachability, height progress and growing node fault counters drive the
//!    consecutive-failure counter
//! 2. reaching the alert threshold makes the validator critical (edge-triggered `down`)
//! 3. resource thresholds raise the verdict and fire `resource` on upward crossings
//! 4. active-set changes fire `active-set`; growing timeout counters fire `consensus-timeout`
//! 5. returning to `active` from `inactive`/`critical` fires `recovery`
//! 6. a non-zero counter below the threshold is a `warning`
//!
//! The verdict is the severity maximum of the failure, resource and membership
//! contributions. No I/O happens here.

use super::types::{
    AlertCategory, AlertEvent, ExtendedReport, HealthVerdict, Observation, ResourceLevel,
    ResourceUsage, Severity, UptimeWindow, ValidatorState,
};
use crate::config::ResourceThresholds;
use crate::constants::health::RESOURCE_STALE_TICKS;
use chrono::{DateTime, Duration, Utc};

/// Result of evaluating one observation
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub state: ValidatorState,
    pub events: Vec<AlertEvent>,
}

#[derive(Debug, Clone)]
pub struct HealthStateMachine {
    alert_threshold: u32,
    thresholds: ResourceThresholds,
}

impl HealthStateMachine {
    pub fn new(alert_threshold: u32, thresholds: ResourceThresholds) -> Self {
        Self {
            alert_threshold: alert_threshold.max(1),
            thresholds,
        }
    }

    pub fn evaluate(
        &self,
        validator: &str,
        previous: Option<&ValidatorState>,
        observation: &Observation,
    ) -> Transition {
        let prev = previous
            .cloned()
            .unwrap_or_else(|| ValidatorState::new(observation.timestamp));
        let mut next = prev.clone();
        let mut events = Vec::new();
        let now = observation.timestamp;

        // 1. Reachability, progress and node fault counters
        let stalled = observation.reachable && !observation.height_advanced;
        let lagging_increase =
            counter_increase(prev.last_execution_lagging, observation.execution_lagging);
        // Timestamp rejections only matter while the validator proposes blocks
        let member = observation.in_active_set.or(prev.in_active_set) == Some(true);
        let ts_increase = counter_increase(prev.last_ts_validation_fail, observation.ts_validation_fail)
            .filter(|_| member);
        let failed = !observation.reachable
            || stalled
            || lagging_increase.is_some()
            || ts_increase.is_some();
        next.consecutive_failures = if failed {
            prev.consecutive_failures.saturating_add(1)
        } else {
            0
        };
        if let Some(height) = observation.height {
            next.last_height = Some(height);
        }
        if observation.height_advanced {
            next.last_height_change = Some(now);
        }
        if observation.peers.is_some() {
            next.last_peers = observation.peers;
        }

        next.notes.clear();
        if observation.reachable && observation.rpc_healthy == Some(false) {
            next.notes.push("RPC endpoint not responding (metrics working)".to_string());
        }
        if let Some(lagging) = observation.execution_lagging {
            if prev.last_execution_lagging.is_none() && lagging > 0 {
                next.notes.push(format!("execution lagging detected: {} (monitoring)", lagging));
            }
            next.last_execution_lagging = Some(lagging);
        }
        if let Some(fails) = observation.ts_validation_fail {
            let inactive = observation.in_active_set.or(prev.in_active_set) == Some(false);
            if prev.last_ts_validation_fail.is_none() && fails > 0 && !inactive {
                next.notes.push(format!(
                    "timestamp validation failures detected: {} (monitoring)",
                    fails
                ));
            }
            next.last_ts_validation_fail = Some(fails);
        }

        // 2. Down determination
        let fails = next.consecutive_failures;
        let down_verdict = if fails >= self.alert_threshold {
            HealthVerdict::Critical
        } else if fails > 0 {
            HealthVerdict::Warning
        } else {
            HealthVerdict::Active
        };
        let went_down = prev.consecutive_failures < self.alert_threshold && fails >= self.alert_threshold;
        if went_down {
            next.down_since = Some(now);
            next.window.down_episodes += 1;
            let reason = if !observation.reachable {
                "metrics endpoint unreachable".to_string()
            } else if stalled {
                match next.last_height {
                    Some(height) => format!("block height stalled at {}", height),
                    None => "block height unavailable".to_string(),
                }
            } else if let (Some(increase), Some(total)) = (lagging_increase, observation.execution_lagging) {
                format!("execution lagging increasing: +{} (total {})", increase, total)
            } else {
                match (ts_increase, observation.ts_validation_fail) {
                    (Some(increase), Some(total)) => format!(
                        "timestamp validation failures increasing: +{} (total {})",
                        increase, total
                    ),
                    _ => "node health checks failing".to_string(),
                }
            };
            events.push(self.event(
                validator,
                &next,
                observation,
                Severity::Critical,
                AlertCategory::Down,
                format!("{} is DOWN: {} consecutive failed checks, {}", validator, fails, reason),
                Some(format!("{} >= {} failed checks", fails, self.alert_threshold)),
            ));
        }

        // 3. Resource thresholds; unknown usage keeps the recorded level until it goes stale
        let mut resources_expired = false;
        let resource_level = if observation.resources.is_empty() {
            next.resource_unknown_ticks = prev.resource_unknown_ticks.saturating_add(1);
            if next.resource_unknown_ticks >= RESOURCE_STALE_TICKS
                && prev.resource_level != ResourceLevel::Normal
            {
                resources_expired = true;
                next.last_resources = ResourceUsage::default();
                next.notes.push(format!(
                    "resource figures unavailable for {} checks, {} level cleared",
                    next.resource_unknown_ticks,
                    prev.resource_level.as_verdict()
                ));
                ResourceLevel::Normal
            } else {
                prev.resource_level
            }
        } else {
            next.resource_unknown_ticks = 0;
            let (level, breaches) = self.resource_level(&observation.resources);
            if level > prev.resource_level {
                if let Some(severity) = level.as_severity() {
                    events.push(self.event(
                        validator,
                        &next,
                        observation,
                        severity,
                        AlertCategory::Resource,
                        format!(
                            "{} resource usage {}: {}",
                            validator,
                            severity,
                            breaches.join(", ")
                        ),
                        Some(breaches.join(", ")),
                    ));
                }
            }
            next.last_resources = observation.resources;
            level
        };
        next.resource_level = resource_level;

        // 4. Active-set membership and consensus timeouts
        let membership_verdict = match observation.in_active_set {
            Some(false) => HealthVerdict::Inactive,
            _ => HealthVerdict::Active,
        };
        if let Some(active) = observation.in_active_set {
            if let Some(recorded) = prev.in_active_set {
                if recorded != active {
                    let summary = if active {
                        format!("{} entered the active set", validator)
                    } else {
                        format!("{} left the active set", validator)
                    };
                    events.push(self.event(
                        validator,
                        &next,
                        observation,
                        Severity::Info,
                        AlertCategory::ActiveSet,
                        summary,
                        None,
                    ));
                }
            }
            next.in_active_set = Some(active);
        }

        if let Some(uptime) = &observation.uptime {
            if let Some(current) = uptime.timeout_count {
                if let Some(recorded) = prev.last_timeout_count {
                    if current > recorded {
                        events.push(self.event(
                            validator,
                            &next,
                            observation,
                            Severity::Critical,
                            AlertCategory::ConsensusTimeout,
                            format!(
                                "{} missed {} consensus round(s), {} timeouts in total",
                                validator,
                                current - recorded,
                                current
                            ),
                            Some(format!("timeouts {} -> {}", recorded, current)),
                        ));
                    }
                }
                next.last_timeout_count = Some(current);
            }
            next.last_uptime = Some(uptime.clone());
        }
        next.unverified = observation.unverified;
        next.confidence = observation.confidence;
        next.rpc_healthy = observation.rpc_healthy;

        // 5/6. Combine and detect recovery
        next.verdict = down_verdict
            .max(resource_level.as_verdict())
            .max(membership_verdict);

        // Expired resource data says nothing about recovery
        if prev.verdict.is_down() && next.verdict == HealthVerdict::Active && !resources_expired {
            let summary = match prev.down_since {
                Some(since) => format!(
                    "{} RECOVERED after {}",
                    validator,
                    format_duration(now - since)
                ),
                None => format!("{} RECOVERED and is healthy again", validator),
            };
            events.push(self.event(
                validator,
                &next,
                observation,
                Severity::Info,
                AlertCategory::Recovery,
                summary,
                None,
            ));
        }
        if fails < self.alert_threshold {
            next.down_since = None;
        }

        next.last_observation = Some(now);
        next.last_reachable = observation.reachable;
        next.window.checks += 1;
        if next.verdict.is_healthy() {
            next.window.healthy_checks += 1;
        }
        if failed {
            next.window.failed_checks += 1;
        }

        Transition {
            state: next,
            events,
        }
    }

    /// Highest breached level plus a description of every breach
    pub fn resource_level(&self, usage: &ResourceUsage) -> (ResourceLevel, Vec<String>) {
        let t = &self.thresholds;
        let mut level = ResourceLevel::Normal;
        let mut breaches = Vec::new();

        for (name, value, warning, critical) in [
            ("cpu", usage.cpu_pct, t.cpu_warning, t.cpu_critical),
            ("memory", usage.mem_pct, t.memory_warning, t.memory_critical),
            ("disk", usage.disk_pct, t.disk_warning, t.disk_critical),
        ] {
            let Some(value) = value else { continue };
            let metric_level = if value >= critical {
                breaches.push(format!("{} {:.1}% >= {}%", name, value, critical));
                ResourceLevel::Critical
            } else if value >= warning {
                breaches.push(format!("{} {:.1}% >= {}%", name, value, warning));
                ResourceLevel::Warning
            } else {
                ResourceLevel::Normal
            };
            level = level.max(metric_level);
        }

        (level, breaches)
    }

    /// Summarize the accounting window and start a new one
    pub fn extended_report(
        &self,
        validator: &str,
        state: &mut ValidatorState,
        now: DateTime<Utc>,
    ) -> AlertEvent {
        let window = std::mem::replace(&mut state.window, UptimeWindow::new(now));
        let report = ExtendedReport {
            window_started: window.started_at,
            window_ended: now,
            checks: window.checks,
            healthy_checks: window.healthy_checks,
            failed_checks: window.failed_checks,
            down_episodes: window.down_episodes,
            availability_percent: window.availability_percent(),
            verdict: state.verdict,
            consecutive_failures: state.consecutive_failures,
            in_active_set: state.in_active_set,
            uptime: state.last_uptime.clone(),
            resources: state.last_resources,
        };

        let availability = report
            .availability_percent
            .map(|pct| format!("{:.2}%", pct))
            .unwrap_or_else(|| "n/a".to_string());

        AlertEvent {
            validator: validator.to_string(),
            severity: Severity::Info,
            category: AlertCategory::ExtendedReport,
            summary: format!(
                "{} report over {}: {} availability across {} checks, {} down episode(s), currently {}",
                validator,
                format_duration(now - window.started_at),
                availability,
                report.checks,
                report.down_episodes,
                state.verdict
            ),
            height: state.last_height,
            peers: state.last_peers,
            uptime_percent: state.last_uptime.as_ref().and_then(|u| u.uptime_percent),
            threshold_crossed: None,
            report: Some(report),
            timestamp: now,
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn event(
        &self,
        validator: &str,
        state: &ValidatorState,
        observation: &Observation,
        severity: Severity,
        category: AlertCategory,
        summary: String,
        threshold_crossed: Option<String>,
    ) -> AlertEvent {
        AlertEvent {
            validator: validator.to_string(),
            severity,
            category,
            summary,
            height: observation.height.or(state.last_height),
            peers: observation.peers,
            uptime_percent: observation
                .uptime
                .as_ref()
                .or(state.last_uptime.as_ref())
                .and_then(|u| u.uptime_percent),
            threshold_crossed,
            report: None,
            timestamp: observation.timestamp,
        }
    }
}

/// Growth of a cumulative counter; a drop means the node restarted and is not an increase
fn counter_increase(recorded: Option<u64>, current: Option<u64>) -> Option<u64> {
    match (recorded, current) {
        (Some(recorded), Some(current)) if current > recorded => Some(current - recorded),
        _ => None,
    }
}

pub fn format_duration(duration: Duration) -> String {
    let total = duration.num_seconds().max(0);
    let (hours, minutes, seconds) = (total / 3600, (total % 3600) / 60, total % 60);
    if hours > 0 {
        format!("{}h {}m", hours, minutes)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}
