//! This module provides reusable test utilities:
//! - Mock HTTP servers (validator endpoints, notification channels)
//! - A scripted in-process prober
//! - Test configuration builders
//! - In-memory test databases
//! - Common test data

// Not every integration test uses every fixture
#![allow(dead_code)]
#![allow(unused_imports)]

pub mod mock_prober;
pub mod mock_validator;
pub mod mock_webhook;
pub mod test_config;
pub mod test_data;
pub mod test_database;

// Re-export commonly used items
pub use mock_prober::ScriptedProber;
pub use mock_validator::MockValidatorServer;
pub use mock_webhook::MockWebhookServer;
pub use test_config::TestConfigBuilder;
pub use test_data::*;
pub use test_database::TestDatabase;
