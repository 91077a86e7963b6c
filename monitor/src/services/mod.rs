// File: monitor/src/services/mod.rs

pub mod alert_service;
pub mod rate_limiter;

pub use alert_service::{AlertService, DispatchReport};
pub use rate_limiter::TokenBucket;
