//! Shared integration test support

pub mod fixtures;
