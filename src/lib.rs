//! vaultview: resolves a configured set of vault-held secrets on every page
//! request and renders them into a small HTML page.
//!
//! Library crate so integration tests in `tests/` exercise the same code as
//! the binary.

pub mod cli;
pub mod config;
pub mod credential;
pub mod errors;
pub mod resolver;
pub mod vault;
pub mod web;

use std::sync::Arc;

/// Shared application state passed to handlers.
pub struct AppState {
    pub config: Arc<config::Config>,
    pub resolver: resolver::SecretResolver,
}

impl AppState {
    pub fn new(config: config::Config) -> Arc<Self> {
        let config = Arc::new(config);
        Arc::new(Self {
            resolver: resolver::SecretResolver::new(config.clone()),
            config,
        })
    }
}
