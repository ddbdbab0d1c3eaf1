//! Backend client capabilities.
//!
//! Exploration drivers only see these traits. Each trait has one production
//! adapter (sqlx, mongodb, reqwest) and in-memory fakes under test.

pub mod document;
pub mod http;
pub mod sql;

pub use document::{DocumentClient, DocumentConnector, MongoConnector};
pub use http::{HttpFetcher, ReqwestFetcher};
pub use sql::{MySqlConnector, PgConnector, SqlClient, SqlConnector};

/// Failure reported by a backend client.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct ClientError(pub String);

impl ClientError {
    pub fn new(message: impl std::fmt::Display) -> Self {
        Self(message.to_string())
    }
}

pub type ClientResult<T> = Result<T, ClientError>;
