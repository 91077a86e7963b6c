//! Custom error types for the validator monitor
//!
//! Each variant family maps to one failure class with its own handling rule:
//! configuration errors stop startup, probe errors degrade fields to unknown,
//! notification errors are logged, persistence errors are logged as critical.

use std::fmt;

/// Configuration error variants
#[derive(Debug)]
pub enum ConfigError {
    /// Failed to read a configuration file
    LoadFailed { path: String, reason: String },

    /// Failed to parse a configuration file
    ParseError { path: String, reason: String },

    /// Invalid configuration value
    InvalidValue { field: String, reason: String },

    /// Missing required configuration
    MissingRequired { field: String },

    /// Validator name declared in more than one file
    DuplicateValidator { name: String },
}

/// Probe error variants
#[derive(Debug, Clone, PartialEq)]
pub enum ProbeError {
    /// Request did not finish in time
    Timeout { source: String, seconds: u64 },

    /// Connection failed or endpoint answered with an error status
    Unreachable { source: String, reason: String },

    /// Response could not be interpreted
    Malformed { source: String, reason: String },

    /// Provider answered 429
    RateLimited { source: String },

    /// Circuit breaker is open for the provider
    CircuitOpen { source: String },

    /// Provider has no record for the requested key
    NotFound { source: String, key: String },
}

/// Notification error variants
#[derive(Debug, Clone, PartialEq)]
pub enum NotifyError {
    /// Transport failure while sending
    Delivery { channel: String, reason: String },

    /// Channel answered with a non-success status
    Rejected { channel: String, status: u16 },

    /// Channel did not answer in time
    Timeout { channel: String },
}

/// Persistence error variants
#[derive(Debug)]
pub enum PersistenceError {
    /// Could not write the state file
    WriteFailed { path: String, reason: String },

    /// Could not read the state file
    ReadFailed { path: String, reason: String },

    /// State file exists but does not deserialize
    Corrupt { path: String, reason: String },
}

impl ProbeError {
    /// Name of the probe source that failed
    pub fn source_name(&self) -> &str {
        match self {
            ProbeError::Timeout { source, .. }
            | ProbeError::Unreachable { source, .. }
            | ProbeError::Malformed { source, .. }
            | ProbeError::RateLimited { source }
            | ProbeError::CircuitOpen { source }
            | ProbeError::NotFound { source, .. } => source,
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::LoadFailed { path, reason } => {
                write!(f, "Failed to load config from '{}': {}", path, reason)
            }
            ConfigError::ParseError { path, reason } => {
                write!(f, "Failed to parse '{}': {}", path, reason)
            }
            ConfigError::InvalidValue { field, reason } => {
                write!(f, "Invalid value for '{}': {}", field, reason)
            }
            ConfigError::MissingRequired { field } => {
                write!(f, "Missing required configuration: '{}'", field)
            }
            ConfigError::DuplicateValidator { name } => {
                write!(f, "Validator '{}' is defined more than once", name)
            }
        }
    }
}

impl fmt::Display for ProbeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeError::Timeout { source, seconds } => {
                write!(f, "{} timed out after {}s", source, seconds)
            }
            ProbeError::Unreachable { source, reason } => {
                write!(f, "{} unreachable: {}", source, reason)
            }
            ProbeError::Malformed { source, reason } => {
                write!(f, "{} returned malformed data: {}", source, reason)
            }
            ProbeError::RateLimited { source } => write!(f, "{} rate limited", source),
            ProbeError::CircuitOpen { source } => write!(f, "{} circuit breaker open", source),
            ProbeError::NotFound { source, key } => {
                write!(f, "{} has no record for '{}'", source, key)
            }
        }
    }
}

impl fmt::Display for NotifyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotifyError::Delivery { channel, reason } => {
                write!(f, "{} delivery failed: {}", channel, reason)
            }
            NotifyError::Rejected { channel, status } => {
                write!(f, "{} rejected message with status {}", channel, status)
            }
            NotifyError::Timeout { channel } => write!(f, "{} delivery timed out", channel),
        }
    }
}

impl fmt::Display for PersistenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PersistenceError::WriteFailed { path, reason } => {
                write!(f, "Failed to write state '{}': {}", path, reason)
            }
            PersistenceError::ReadFailed { path, reason } => {
                write!(f, "Failed to read state '{}': {}", path, reason)
            }
            PersistenceError::Corrupt { path, reason } => {
                write!(f, "State file '{}' is corrupt: {}", path, reason)
            }
        }
    }
}

// Implement std::error::Error
impl std::error::Error for ConfigError {}
impl std::error::Error for ProbeError {}
impl std::error::Error for NotifyError {}
impl std::error::Error for PersistenceError {}
