//! HTTP request handlers for the monitor API.
//!
//! - `common` - shared response envelope and query structs
//! - `health` - liveness, readiness, health and metrics endpoints
//! - `validators` - dashboard JSON endpoints

pub mod common;
pub mod health;
pub mod validators;

pub use health::*;
pub use validators::*;
