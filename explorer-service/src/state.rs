//! Application state for explorer service.

use std::sync::Arc;

use common::config::AppConfig;
use common::errors::{AppError, AppResult};

use crate::explorer::ExplorerSet;
use crate::registry::ConnectionRegistry;
use crate::session_store::SessionStore;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub explorers: Arc<ExplorerSet>,
    pub sessions: Arc<SessionStore>,
    pub registry: Arc<ConnectionRegistry>,
}

impl AppState {
    /// Creates the state with the production drivers.
    pub fn new(config: AppConfig) -> AppResult<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("explorer-service/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {e}")))?;
        let explorers = ExplorerSet::with_defaults(&config, http_client);
        Ok(Self::with_explorers(config, explorers))
    }

    pub fn with_explorers(config: AppConfig, explorers: ExplorerSet) -> Self {
        Self {
            registry: Arc::new(ConnectionRegistry::new(config.connections_file.clone())),
            explorers: Arc::new(explorers),
            sessions: Arc::new(SessionStore::new()),
            config,
        }
    }
}
