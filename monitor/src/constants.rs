//! Application-wide constants for timeouts, limits, and configuration values
//!
//! Constants are grouped by the subsystem that consumes them so defaults used by
//! the config loader, the probes and the alert pipeline live in one place.

use std::time::Duration;

/// HTTP client timeout constants
pub mod http {
    use super::Duration;

    /// Timeout for a single request to a validator or third-party API
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

    /// Timeout for establishing HTTP connections
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

    /// Timeout for a single notification delivery
    pub const NOTIFY_TIMEOUT: Duration = Duration::from_secs(10);
}

/// Health evaluation defaults
pub mod health {
    /// Consecutive failed checks before a validator is declared down
    pub const DEFAULT_ALERT_THRESHOLD: u32 = 3;

    /// Seconds between check ticks
    pub const DEFAULT_CHECK_INTERVAL_SECONDS: u64 = 60;

    /// Lower bound accepted for check_interval_seconds
    pub const MIN_CHECK_INTERVAL_SECONDS: u64 = 10;

    /// Upper bound accepted for check_interval_seconds
    pub const MAX_CHECK_INTERVAL_SECONDS: u64 = 3600;

    /// Upper bound for a single validator probe
    pub const DEFAULT_PROBE_TIMEOUT_SECONDS: u64 = 10;

    /// Share of the probe timeout granted to each individual source
    pub const SOURCE_DEADLINE_SHARE: f64 = 0.75;

    /// Checks without any resource figure before a recorded resource level is dropped
    pub const RESOURCE_STALE_TICKS: u32 = 5;
}

/// Resource threshold defaults (percent)
pub mod thresholds {
    pub const CPU_WARNING: f64 = 90.0;
    pub const CPU_CRITICAL: f64 = 95.0;
    pub const MEMORY_WARNING: f64 = 90.0;
    pub const MEMORY_CRITICAL: f64 = 95.0;
    pub const DISK_WARNING: f64 = 90.0;
    pub const DISK_CRITICAL: f64 = 95.0;
}

/// Alert system constants
pub mod alerts {
    /// Primary cooldown is the check interval multiplied by this factor
    /// unless alert_cooldown_seconds is configured explicitly
    pub const COOLDOWN_INTERVAL_MULTIPLIER: u64 = 5;

    /// Minimum time between two emergency pushes for one validator
    pub const DEFAULT_EMERGENCY_COOLDOWN_SECONDS: u64 = 1800;

    /// Token bucket capacity per minute for the Telegram channel
    pub const TELEGRAM_MESSAGES_PER_MINUTE: u32 = 10;

    /// Seconds a failed critical alert keeps being resent
    pub const CRITICAL_RETRY_WINDOW_SECONDS: i64 = 3600;

    /// Token bucket capacity per minute for the Discord channel
    pub const DISCORD_MESSAGES_PER_MINUTE: u32 = 5;

    /// Pushover emergency priority (requires acknowledgement)
    pub const PUSHOVER_EMERGENCY_PRIORITY: i32 = 2;

    /// Seconds between Pushover re-notifications for emergency priority
    pub const PUSHOVER_RETRY_SECONDS: u32 = 30;

    /// Seconds after which Pushover stops re-notifying
    pub const PUSHOVER_EXPIRE_SECONDS: u32 = 3600;

    pub const DISCORD_COLOR_INFO: u32 = 0x3498db;
    pub const DISCORD_COLOR_WARNING: u32 = 0xf39c12;
    pub const DISCORD_COLOR_CRITICAL: u32 = 0xe74c3c;
    pub const DISCORD_COLOR_REPORT: u32 = 0x2ecc71;
}

/// Extended report constants
pub mod reports {
    /// Seconds between extended reports (6 hours)
    pub const DEFAULT_EXTENDED_REPORT_INTERVAL_SECONDS: u64 = 21600;
}

/// Third-party uptime provider constants
pub mod huginn {
    pub const DEFAULT_TESTNET_ENDPOINT: &str = "https://validator-api-testnet.huginn.tech/monad-api";
    pub const DEFAULT_MAINNET_ENDPOINT: &str = "https://validator-api.huginn.tech/monad-api";

    /// Cache lifetime for uptime reports; the API allows few calls per hour
    pub const DEFAULT_CACHE_TTL_SECONDS: u64 = 3600;

    /// Cache lifetime for the reference network round
    pub const NETWORK_ROUND_TTL_SECONDS: i64 = 300;

    /// A validator whose last round trails the network by more than this is out of the active set
    pub const ACTIVE_SET_ROUND_THRESHOLD: u64 = 10_000;

    /// Top validators by stake, queried for the network round when gmonads has no active entry
    pub const REFERENCE_VALIDATOR_IDS: [u64; 5] = [1, 2, 3, 4, 5];

    pub const MAX_RETRIES: u32 = 3;
    pub const RETRY_BASE_DELAY_MS: u64 = 1000;
    pub const RETRY_MAX_DELAY_MS: u64 = 5000;

    /// Consecutive failures before the circuit opens
    pub const CIRCUIT_FAILURE_THRESHOLD: u32 = 5;

    /// Seconds the circuit stays open before a probe request is allowed
    pub const CIRCUIT_RECOVERY_SECONDS: i64 = 60;
}

/// Secondary indexer constants
pub mod gmonads {
    pub const DEFAULT_BASE_URL: &str = "https://www.gmonads.com/api/v1/public";
    pub const DEFAULT_CACHE_TTL_SECONDS: u64 = 120;
}

/// Channel endpoints
pub mod channels {
    pub const TELEGRAM_API_URL: &str = "https://api.telegram.org";
    pub const PUSHOVER_API_URL: &str = "https://api.pushover.net/1/messages.json";
}

/// Validator endpoint defaults
pub mod defaults {
    pub const METRICS_PORT: u16 = 8889;
    pub const RPC_PORT: u16 = 8080;
    pub const SERVER_HOST: &str = "0.0.0.0";
    pub const SERVER_PORT: u16 = 8181;
    pub const CONFIG_DIR: &str = "config";
    pub const STATE_DIR: &str = "state";
    pub const DATABASE_PATH: &str = "data/history.db";
    pub const DASHBOARD_DIR: &str = "dashboard";
}

/// Cleanup constants
pub mod cleanup {
    /// Days of check history kept in the database
    pub const DEFAULT_HISTORY_RETENTION_DAYS: u32 = 7;

    /// Cron expression for the retention job (top of every hour)
    pub const HISTORY_CLEANUP_SCHEDULE: &str = "0 0 * * * *";

    /// Rows returned by the history endpoint when no limit is given
    pub const DEFAULT_HISTORY_LIMIT: u32 = 100;
}
