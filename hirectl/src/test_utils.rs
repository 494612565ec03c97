//! Helpers for HTTP tests against the in-memory store.

use std::sync::Arc;

use axum_test::TestServer;

use crate::config::{AuthConfig, Config, DatabaseConfig};
use crate::credits::store::InMemoryPackStore;
use crate::types::UserId;
use crate::{AppState, build_router, build_state};

/// Default configuration with simulated purchases enabled.
pub fn create_test_config() -> Config {
    let mut config = Config {
        database: DatabaseConfig::InMemory,
        ..Default::default()
    };
    config.credits.allow_simulated_purchases = true;
    config
}

/// Server plus the state behind it, so tests can seed the ledger directly.
pub fn create_test_app(config: Config) -> (TestServer, AppState) {
    let state = build_state(config, Arc::new(InMemoryPackStore::new())).expect("Failed to build state");
    let router = build_router(&state);
    let server = TestServer::new(router).expect("Failed to create test server");
    (server, state)
}

pub fn user_header(user_id: UserId) -> (String, String) {
    (AuthConfig::default().user_header, user_id.to_string())
}

/// Headers for a fresh administrator.
pub fn admin_headers() -> Vec<(String, String)> {
    let auth = AuthConfig::default();
    vec![
        (auth.user_header, uuid::Uuid::new_v4().to_string()),
        (auth.admin_header, "true".to_string()),
    ]
}
