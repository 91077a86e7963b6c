pub mod config;
pub mod constants;
pub mod database;
pub mod errors;
pub mod health;
pub mod notify;
pub mod probes;
pub mod scheduler;
pub mod services;
pub mod state_store;
pub mod web;

// Re-export commonly used types
pub use config::{Config, ConfigManager, Network, ValidatorConfig};
pub use database::Database;
pub use health::{HealthMonitor, HealthStateMachine, Reconciler};
pub use probes::{HttpProber, ValidatorProber};
pub use services::AlertService;
pub use state_store::StateStore;
