//! Session/context models.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::backend::BackendKind;
use super::schema::SchemaDescription;
use crate::utils::masking::mask_password;

/// Credentials passed through to a backend, kept as the session's extra config.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Credentials {
    /// API key for serverless backends (never serialized).
    #[serde(skip_serializing, default)]
    pub api_key: Option<String>,
}

impl Credentials {
    pub fn api_key(api_key: impl Into<String>) -> Self {
        Self {
            api_key: Some(api_key.into()),
        }
    }
}

/// One completed exploration held by the session store.
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub session_id: String,
    pub connection_string: String,
    pub backend_kind: BackendKind,
    /// Shared, read-only exploration result.
    pub schema: Arc<SchemaDescription>,
    pub config: Credentials,
    pub created_at: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,
}

/// Listing entry for active sessions.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub session_id: String,
    pub backend_kind: BackendKind,
    pub created_at: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,
}

impl From<&SessionContext> for SessionSummary {
    fn from(ctx: &SessionContext) -> Self {
        Self {
            session_id: ctx.session_id.clone(),
            backend_kind: ctx.backend_kind,
            created_at: ctx.created_at,
            last_accessed: ctx.last_accessed,
        }
    }
}

/// Serializable view of a context with its connection string masked.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub session_id: String,
    pub connection_string: String,
    pub backend_kind: BackendKind,
    pub schema: SchemaDescription,
    pub created_at: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,
}

impl From<&SessionContext> for SessionView {
    fn from(ctx: &SessionContext) -> Self {
        Self {
            session_id: ctx.session_id.clone(),
            connection_string: mask_password(&ctx.connection_string),
            backend_kind: ctx.backend_kind,
            schema: ctx.schema.as_ref().clone(),
            created_at: ctx.created_at,
            last_accessed: ctx.last_accessed,
        }
    }
}
