//! Shared helpers for integration tests.

#![allow(dead_code)]

use quarry::config::EngineConfig;
use quarry::SearchEngine;
use tracing_subscriber::EnvFilter;

/// Route engine logs to the test writer; set `RUST_LOG=quarry=debug` to see them
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    // Several tests in one binary race to install; only the first wins
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

/// Engine with logging set up
pub fn engine_with(config: EngineConfig) -> SearchEngine {
    init_tracing();
    SearchEngine::new(config).unwrap()
}
