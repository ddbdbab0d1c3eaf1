//! Saved connection models.
//!
//! Contains models for the local registry of reusable connection strings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use super::backend::BackendKind;
use crate::utils::masking::mask_password;

/// A saved connection as persisted in the registry file.
///
/// `connection_string` holds the raw secret; `masked_password` is the
/// display form with the password segment redacted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    /// Unique connection identifier.
    pub id: String,
    /// Connection display name.
    pub name: String,
    /// Raw connection string.
    pub connection_string: String,
    /// Connection string with the password segment redacted.
    pub masked_password: String,
    /// Arbitrary caller-supplied tag (usually `{"dbType": ...}`).
    #[schema(value_type = Object)]
    pub metadata: serde_json::Value,
    /// Save timestamp.
    pub saved_at: DateTime<Utc>,
}

impl Connection {
    /// Builds a new entry, computing the masked form.
    pub fn new(
        id: String,
        name: String,
        connection_string: String,
        metadata: serde_json::Value,
    ) -> Self {
        Self {
            masked_password: mask_password(&connection_string),
            id,
            name,
            connection_string,
            metadata,
            saved_at: Utc::now(),
        }
    }

    /// Copy of this entry whose `connection_string` is replaced by the masked form.
    pub fn masked(&self) -> Self {
        Self {
            connection_string: self.masked_password.clone(),
            ..self.clone()
        }
    }
}

/// Listing entry (never carries the raw connection string).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionSummary {
    pub id: String,
    pub name: String,
    pub masked_password: String,
    pub saved_at: DateTime<Utc>,
}

impl From<&Connection> for ConnectionSummary {
    fn from(conn: &Connection) -> Self {
        Self {
            id: conn.id.clone(),
            name: conn.name.clone(),
            masked_password: conn.masked_password.clone(),
            saved_at: conn.saved_at,
        }
    }
}

/// Request body for saving a connection.
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SaveConnectionRequest {
    /// Connection display name.
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: String,
    /// Connection string to persist.
    #[validate(length(min = 1, message = "Connection string is required"))]
    pub connection_string: String,
    /// Backend kind; detected from the connection string when absent.
    pub db_type: Option<BackendKind>,
}

impl SaveConnectionRequest {
    /// Metadata tag stored alongside the connection.
    pub fn metadata(&self) -> serde_json::Value {
        let kind = self
            .db_type
            .unwrap_or_else(|| BackendKind::detect(&self.connection_string));
        serde_json::json!({ "dbType": kind })
    }
}
