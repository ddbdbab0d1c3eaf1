//! Backend kind classification.
//!
//! A connection string is classified once, by substring matching against a
//! fixed, ordered list of cues. The first cue that matches wins.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Category of data source behind a connection string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum BackendKind {
    /// Namespaced relational database (PostgreSQL).
    #[serde(rename = "PostgreSQL")]
    RelationalA,
    /// Flat relational database (MySQL).
    #[serde(rename = "MySQL")]
    RelationalB,
    /// Document store (MongoDB).
    #[serde(rename = "MongoDB")]
    Document,
    /// Firestore-like serverless backend.
    #[serde(rename = "Firebase")]
    ServerlessA,
    /// Supabase-like serverless backend.
    #[serde(rename = "Supabase")]
    ServerlessB,
    /// Any other HTTP(S) endpoint.
    #[serde(rename = "REST API")]
    GenericRest,
    /// Nothing matched.
    Unknown,
}

/// Ordered detection cues. Order is significant.
const SUBSTRING_CUES: [(&str, BackendKind); 5] = [
    ("mongo", BackendKind::Document),
    ("postgres", BackendKind::RelationalA),
    ("mysql", BackendKind::RelationalB),
    ("firestore.googleapis", BackendKind::ServerlessA),
    ("supabase", BackendKind::ServerlessB),
];

impl BackendKind {
    /// Classifies a connection string or URL. Never fails.
    pub fn detect(connection_string: &str) -> Self {
        SUBSTRING_CUES
            .iter()
            .find(|(cue, _)| connection_string.contains(cue))
            .map(|(_, kind)| *kind)
            .unwrap_or_else(|| {
                if connection_string.starts_with("http") {
                    BackendKind::GenericRest
                } else {
                    BackendKind::Unknown
                }
            })
    }

    /// Display label, identical to the serialized form.
    pub fn label(&self) -> &'static str {
        match self {
            BackendKind::RelationalA => "PostgreSQL",
            BackendKind::RelationalB => "MySQL",
            BackendKind::Document => "MongoDB",
            BackendKind::ServerlessA => "Firebase",
            BackendKind::ServerlessB => "Supabase",
            BackendKind::GenericRest => "REST API",
            BackendKind::Unknown => "Unknown",
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}
