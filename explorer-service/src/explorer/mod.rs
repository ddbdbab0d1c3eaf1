//! Schema exploration drivers.
//!
//! One [`SchemaExplorer`] per backend kind. A driver connects through a client
//! capability (see [`crate::clients`]), walks the backend's native metadata and
//! returns a normalized [`SchemaDescription`]. Connect failures abort the call;
//! every later per-table step degrades through [`partial::WarningLog`].

pub mod firestore;
pub mod mongo;
pub mod mysql;
pub mod partial;
pub mod postgres;
pub mod rest;
pub mod supabase;

#[cfg(test)]
pub(crate) mod testing;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use common::config::AppConfig;
use common::errors::{AppError, AppResult};
use common::models::{BackendKind, Credentials, SchemaDescription};

use crate::clients::{
    DocumentConnector, HttpFetcher, MongoConnector, MySqlConnector, PgConnector, ReqwestFetcher,
    SqlConnector,
};

pub use firestore::FirestoreExplorer;
pub use mongo::MongoExplorer;
pub use mysql::MySqlExplorer;
pub use partial::MetadataWarning;
pub use postgres::PostgresExplorer;
pub use rest::RestExplorer;
pub use supabase::SupabaseExplorer;

/// Result of a successful exploration.
#[derive(Debug)]
pub struct Exploration {
    pub description: SchemaDescription,
    /// Steps that degraded to defaults. Already logged.
    pub warnings: Vec<MetadataWarning>,
}

impl Exploration {
    pub fn new(description: SchemaDescription, warnings: Vec<MetadataWarning>) -> Self {
        Self {
            description,
            warnings,
        }
    }
}

/// Exploration protocol implemented by every backend driver.
#[async_trait]
pub trait SchemaExplorer: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// Connects, walks metadata and builds the description.
    async fn explore(
        &self,
        connection_string: &str,
        credentials: &Credentials,
    ) -> AppResult<Exploration>;

    /// Checks that the backend is reachable. HTTP backends have no cheaper
    /// check than the exploration request itself.
    async fn check_connection(&self, connection_string: &str, credentials: &Credentials) -> AppResult<()> {
        self.explore(connection_string, credentials).await.map(|_| ())
    }
}

/// Drivers keyed by the kind they handle.
#[derive(Clone, Default)]
pub struct ExplorerSet {
    explorers: HashMap<BackendKind, Arc<dyn SchemaExplorer>>,
}

impl ExplorerSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Production drivers over sqlx, mongodb and reqwest.
    pub fn with_defaults(config: &AppConfig, http_client: reqwest::Client) -> Self {
        let pg: Arc<dyn SqlConnector> = Arc::new(PgConnector::new(
            config.max_connections,
            config.connect_timeout(),
        ));
        let mysql: Arc<dyn SqlConnector> = Arc::new(MySqlConnector::new(
            config.max_connections,
            config.connect_timeout(),
        ));
        let mongo: Arc<dyn DocumentConnector> =
            Arc::new(MongoConnector::new(config.connect_timeout()));
        let http: Arc<dyn HttpFetcher> = Arc::new(ReqwestFetcher::new(http_client));

        Self::new()
            .register(PostgresExplorer::new(pg))
            .register(MySqlExplorer::new(mysql))
            .register(MongoExplorer::new(mongo))
            .register(FirestoreExplorer::new(http.clone(), config.connect_timeout()))
            .register(SupabaseExplorer::new(http.clone(), config.connect_timeout()))
            .register(RestExplorer::new(http, config.rest_timeout()))
    }

    /// Adds a driver, replacing any previous driver for the same kind.
    pub fn register(mut self, explorer: impl SchemaExplorer + 'static) -> Self {
        self.explorers.insert(explorer.kind(), Arc::new(explorer));
        self
    }

    pub fn get(&self, kind: BackendKind) -> AppResult<Arc<dyn SchemaExplorer>> {
        self.explorers
            .get(&kind)
            .cloned()
            .ok_or(AppError::UnsupportedBackend(kind))
    }

    pub fn kinds(&self) -> Vec<BackendKind> {
        self.explorers.keys().copied().collect()
    }
}
