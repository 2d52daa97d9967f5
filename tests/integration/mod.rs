//! Integration tests for the LIA context engine

mod builder_scenarios;
mod cache_behavior;
mod config_integration;
mod engine_admin;
mod metrics_collector;
mod test_utils;
