//! Database record types.

use crate::health::ValidatorState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One row of `check_history`: the outcome of a single check tick for one validator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckRecord {
    pub validator: String,
    pub verdict: String,
    pub consecutive_failures: i64,
    pub height: Option<i64>,
    pub peers: Option<i64>,
    pub cpu_pct: Option<f64>,
    pub mem_pct: Option<f64>,
    pub disk_pct: Option<f64>,
    pub in_active_set: Option<bool>,
    pub timestamp: DateTime<Utc>,
}

impl CheckRecord {
    pub fn from_state(validator: &str, state: &ValidatorState, timestamp: DateTime<Utc>) -> Self {
        Self {
            validator: validator.to_string(),
            verdict: state.verdict.as_str().to_string(),
            consecutive_failures: i64::from(state.consecutive_failures),
            height: state.last_height.and_then(|h| i64::try_from(h).ok()),
            peers: state.last_peers.and_then(|p| i64::try_from(p).ok()),
            cpu_pct: state.last_resources.cpu_pct,
            mem_pct: state.last_resources.mem_pct,
            disk_pct: state.last_resources.disk_pct,
            in_active_set: state.in_active_set,
            timestamp,
        }
    }
}
