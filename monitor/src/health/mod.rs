//! Validator health evaluation
//!
//! Reconciles probe results, runs the per-validator state machine and owns
//! the shared health snapshot.

pub mod monitor;
pub mod reconciler;
pub mod state_machine;
pub mod types;

pub use monitor::{CheckOutcome, HealthMonitor, TickSummary};
pub use reconciler::Reconciler;
pub use state_machine::{HealthStateMachine, Transition};
pub use types::{
    AlertCategory, AlertEvent, AlertLedger, ChannelKind, Confidence, ExtendedReport,
    HealthSnapshot, HealthVerdict, HuginnData, NetworkHealth, Observation, PendingAlert, ResourceLevel,
    ResourceUsage, Severity, UptimeData, UptimeSource, UptimeWindow, ValidatorSnapshot,
    ValidatorState,
};
