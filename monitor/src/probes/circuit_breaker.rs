use chrono::{DateTime, Duration, Utc};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

/// Stops calling a failing provider until the recovery period has passed
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    name: String,
    failure_threshold: u32,
    recovery: Duration,
    failures: u32,
    state: CircuitState,
    last_failure: Option<DateTime<Utc>>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, failure_threshold: u32, recovery: Duration) -> Self {
        Self {
            name: name.into(),
            failure_threshold,
            recovery,
            failures: 0,
            state: CircuitState::Closed,
            last_failure: None,
        }
    }

    pub fn state(&self) -> CircuitState {
        self.state
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }

    /// Whether a request may go out; moves Open to HalfOpen once the recovery period elapsed
    pub fn can_execute(&mut self, now: DateTime<Utc>) -> bool {
        match self.state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let recovered = self
                    .last_failure
                    .map(|at| now - at >= self.recovery)
                    .unwrap_or(true);
                if recovered {
                    info!("Circuit breaker {}: open -> half-open", self.name);
                    self.state = CircuitState::HalfOpen;
                }
                recovered
            }
        }
    }

    pub fn record_success(&mut self) {
        if self.state != CircuitState::Closed {
            info!("Circuit breaker {}: {:?} -> closed", self.name, self.state);
        }
        self.failures = 0;
        self.state = CircuitState::Closed;
    }

    pub fn record_failure(&mut self, now: DateTime<Utc>) {
        self.failures = self.failures.saturating_add(1);
        self.last_failure = Some(now);

        // A failed half-open probe reopens immediately
        if self.failures >= self.failure_threshold || self.state == CircuitState::HalfOpen {
            if self.state != CircuitState::Open {
                warn!(
                    "Circuit breaker {}: opened after {} consecutive failures",
                    self.name, self.failures
                );
            }
            self.state = CircuitState::Open;
        }
    }
}
