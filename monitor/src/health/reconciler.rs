//! Reconciler: merges one tick of probe results into a single [`Observation`]

use super::types::{Confidence, Observation, ResourceUsage, UptimeData};
use crate::probes::{NodeMetrics, ProbeBundle, UptimeReport};
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct MembershipVerdict {
    pub in_active_set: Option<bool>,
    pub unverified: bool,
    pub confidence: Confidence,
}

#[derive(Debug, Clone, Default)]
pub struct Reconciler;

impl Reconciler {
    pub fn new() -> Self {
        Self
    }

    /// Never fails; every adapter error degrades the matching fields to unknown
    pub fn reconcile(
        &self,
        validator: &str,
        bundle: &ProbeBundle,
        previous_height: Option<u64>,
    ) -> Observation {
        let (reachable, node) = match &bundle.node {
            Ok(node) => (true, *node),
            Err(e) => {
                debug!("{}: node metrics unavailable: {}", validator, e);
                (false, NodeMetrics::default())
            }
        };
        let height = node.height;

        let height_advanced = match (height, previous_height) {
            (Some(current), Some(previous)) => current > previous,
            (Some(_), None) => true,
            (None, _) => false,
        };

        let resources = match &bundle.resources {
            Some(Ok(usage)) => *usage,
            Some(Err(e)) => {
                debug!("{}: resource metrics unavailable: {}", validator, e);
                ResourceUsage::default()
            }
            None => ResourceUsage::default(),
        };

        let rpc_healthy = match &bundle.rpc {
            Some(Ok(healthy)) => Some(*healthy),
            Some(Err(e)) => {
                debug!("{}: rpc health unknown: {}", validator, e);
                None
            }
            None => None,
        };

        let primary = usable(validator, bundle.primary.as_ref());
        let secondary = usable(validator, bundle.secondary.as_ref());

        let membership = merge_membership(primary, secondary);
        if membership.unverified {
            warn!(
                "{}: uptime sources disagree on active-set membership, using {:?}",
                validator, membership.in_active_set
            );
        }

        Observation {
            reachable,
            height,
            peers: node.peers,
            height_advanced,
            resources,
            uptime: merge_uptime(primary, secondary),
            in_active_set: membership.in_active_set,
            unverified: membership.unverified,
            confidence: membership.confidence,
            rpc_healthy,
            execution_lagging: node.execution_lagging,
            ts_validation_fail: node.ts_validation_fail,
            timestamp: bundle.collected_at,
        }
    }
}

fn usable<'a>(
    validator: &str,
    result: Option<&'a Result<UptimeReport, crate::errors::ProbeError>>,
) -> Option<&'a UptimeReport> {
    match result {
        Some(Ok(report)) => Some(report),
        Some(Err(e)) => {
            debug!("{}: {} unavailable: {}", validator, e.source_name(), e);
            None
        }
        None => None,
    }
}

/// Membership merge: agreement is verified, disagreement picks the fresher source (ties go to primary)
pub fn merge_membership(
    primary: Option<&UptimeReport>,
    secondary: Option<&UptimeReport>,
) -> MembershipVerdict {
    let known = |report: Option<&UptimeReport>| {
        report.and_then(|r| r.in_active_set.map(|value| (value, r.source_timestamp)))
    };

    match (known(primary), known(secondary)) {
        (Some((p, _)), Some((s, _))) if p == s => MembershipVerdict {
            in_active_set: Some(p),
            unverified: false,
            confidence: Confidence::High,
        },
        (Some((p, p_at)), Some((s, s_at))) => MembershipVerdict {
            in_active_set: Some(if s_at > p_at { s } else { p }),
            unverified: true,
            confidence: Confidence::Low,
        },
        (Some((value, _)), None) | (None, Some((value, _))) => MembershipVerdict {
            in_active_set: Some(value),
            unverified: false,
            confidence: Confidence::Medium,
        },
        (None, None) => MembershipVerdict {
            in_active_set: None,
            unverified: false,
            confidence: Confidence::Low,
        },
    }
}

/// Uptime figures come from the primary when it has any, otherwise from the secondary
pub fn merge_uptime(
    primary: Option<&UptimeReport>,
    secondary: Option<&UptimeReport>,
) -> Option<UptimeData> {
    let has_figures = |r: &&UptimeReport| {
        r.uptime_percent.is_some() || r.finalized_count.is_some() || r.timeout_count.is_some()
    };

    primary
        .filter(has_figures)
        .or_else(|| secondary.filter(has_figures))
        .map(|report| UptimeData {
            uptime_percent: report.uptime_percent,
            finalized_count: report.finalized_count,
            timeout_count: report.timeout_count,
            source: report.source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ProbeError;
    use crate::health::types::UptimeSource;
    use chrono::{Duration, Utc};

    fn report(source: UptimeSource, active: Option<bool>, age_seconds: i64) -> UptimeReport {
        UptimeReport {
            source,
            uptime_percent: (source == UptimeSource::Huginn).then_some(99.0),
            finalized_count: (source == UptimeSource::Huginn).then_some(990),
            timeout_count: (source == UptimeSource::Huginn).then_some(10),
            in_active_set: active,
            source_timestamp: Utc::now() - Duration::seconds(age_seconds),
        }
    }

    fn bundle(node: Result<NodeMetrics, ProbeError>) -> ProbeBundle {
        ProbeBundle {
            node,
            resources: None,
            rpc: None,
            primary: None,
            secondary: None,
            collected_at: Utc::now(),
        }
    }

    #[test]
    fn test_unreachable_node_leaves_height_unknown() {
        let reconciler = Reconciler::new();
        let observation = reconciler.reconcile(
            "val-1",
            &bundle(Err(ProbeError::Timeout {
                source: "metrics".to_string(),
                seconds: 10,
            })),
            Some(100),
        );

        assert!(!observation.reachable);
        assert_eq!(observation.height, None);
        assert_eq!(observation.peers, None);
        assert!(!observation.height_advanced);
        assert_eq!(observation.in_active_set, None);
        assert_eq!(observation.confidence, Confidence::Low);
    }

    #[test]
    fn test_height_advanced_needs_strict_increase() {
        let reconciler = Reconciler::new();
        let node = |height| {
            bundle(Ok(NodeMetrics {
                height,
                peers: Some(40),
                ..Default::default()
            }))
        };

        assert!(reconciler.reconcile("v", &node(Some(101)), Some(100)).height_advanced);
        assert!(!reconciler.reconcile("v", &node(Some(100)), Some(100)).height_advanced);
        assert!(reconciler.reconcile("v", &node(Some(1)), None).height_advanced);
        let no_height = reconciler.reconcile("v", &node(None), Some(100));
        assert!(no_height.reachable);
        assert!(!no_height.height_advanced);
    }

    #[test]
    fn test_disagreement_prefers_fresher_source_and_flags_unverified() {
        // Primary cached an hour ago, secondary fetched a minute ago
        let primary = report(UptimeSource::Huginn, Some(true), 3600);
        let secondary = report(UptimeSource::Gmonads, Some(false), 60);

        let merged = merge_membership(Some(&primary), Some(&secondary));
        assert_eq!(merged.in_active_set, Some(false));
        assert!(merged.unverified);
        assert_eq!(merged.confidence, Confidence::Low);

        let merged = merge_membership(Some(&secondary), Some(&primary));
        assert_eq!(merged.in_active_set, Some(false));
    }

    #[test]
    fn test_agreement_and_fallbacks() {
        let primary = report(UptimeSource::Huginn, Some(true), 10);
        let secondary = report(UptimeSource::Gmonads, Some(true), 10);
        let agreed = merge_membership(Some(&primary), Some(&secondary));
        assert_eq!(agreed.in_active_set, Some(true));
        assert!(!agreed.unverified);
        assert_eq!(agreed.confidence, Confidence::High);

        let unknown_primary = report(UptimeSource::Huginn, None, 10);
        let fallback = merge_membership(Some(&unknown_primary), Some(&secondary));
        assert_eq!(fallback.in_active_set, Some(true));
        assert_eq!(fallback.confidence, Confidence::Medium);

        let uptime = merge_uptime(Some(&unknown_primary), Some(&secondary)).unwrap();
        assert_eq!(uptime.source, UptimeSource::Huginn);
        assert_eq!(uptime.timeout_count, Some(10));
        assert!(merge_uptime(None, Some(&secondary)).is_none());
    }

    #[test]
    fn test_failed_sources_degrade_to_unknown() {
        let reconciler = Reconciler::new();
        let mut bundle = bundle(Ok(NodeMetrics {
            height: Some(5),
            peers: Some(3),
            ..Default::default()
        }));
        bundle.primary = Some(Err(ProbeError::RateLimited {
            source: "huginn".to_string(),
        }));
        bundle.secondary = Some(Ok(report(UptimeSource::Gmonads, Some(true), 0)));
        bundle.rpc = Some(Err(ProbeError::Unreachable {
            source: "rpc".to_string(),
            reason: "connection refused".to_string(),
        }));

        let observation = reconciler.reconcile("val-1", &bundle, None);
        assert!(observation.reachable);
        assert_eq!(observation.in_active_set, Some(true));
        assert_eq!(observation.confidence, Confidence::Medium);
        assert_eq!(observation.rpc_healthy, None);
        assert!(observation.uptime.is_none());

        bundle.rpc = Some(Err(ProbeError::Timeout {
            source: "rpc".to_string(),
            seconds: 5,
        }));
        assert_eq!(reconciler.reconcile("val-1", &bundle, None).rpc_healthy, None);

        // Only an answered JSON-RPC error counts as unhealthy
        bundle.rpc = Some(Ok(false));
        assert_eq!(reconciler.reconcile("val-1", &bundle, None).rpc_healthy, Some(false));
    }

    #[test]
    fn test_node_counters_pass_through() {
        let reconciler = Reconciler::new();
        let observation = reconciler.reconcile(
            "val-1",
            &bundle(Ok(NodeMetrics {
                height: Some(9),
                peers: Some(4),
                execution_lagging: Some(3),
                ts_validation_fail: Some(0),
            })),
            Some(8),
        );
        assert_eq!(observation.execution_lagging, Some(3));
        assert_eq!(observation.ts_validation_fail, Some(0));
        assert_eq!(observation.peers, Some(4));
    }
}
