//! Firestore driver over the REST API.
//!
//! Firestore rarely allows listing the root of the default database, so a
//! failed listing yields a single placeholder entry instead of an error.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use common::errors::{AppError, AppResult};
use common::models::{BackendKind, Credentials, SchemaDescription, SchemaPayload, TableDescription};

use super::partial::{MetadataStep, MetadataWarning, WarningLog};
use super::{Exploration, SchemaExplorer};
use crate::clients::HttpFetcher;

const KIND: BackendKind = BackendKind::ServerlessA;

static PROJECT_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"firestore\.googleapis\.com/v1/projects/([^/]+)").expect("valid project pattern")
});

const PLACEHOLDER_NAME: &str = "Note: Add collection names manually";
const PLACEHOLDER_NOTE: &str =
    "Firebase Firestore API restrictions prevent automatic collection discovery";

pub struct FirestoreExplorer {
    http: Arc<dyn HttpFetcher>,
    timeout: Duration,
}

impl FirestoreExplorer {
    pub fn new(http: Arc<dyn HttpFetcher>, timeout: Duration) -> Self {
        Self { http, timeout }
    }

    async fn list_root(&self, url: &str, credentials: &Credentials) -> Result<Vec<TableDescription>, String> {
        let headers: Vec<(String, String)> = credentials
            .api_key
            .iter()
            .map(|key| ("Authorization".to_string(), format!("Bearer {key}")))
            .collect();

        let response = self
            .http
            .get(url, &headers, self.timeout)
            .await
            .map_err(|e| e.to_string())?;
        if !response.is_success() {
            return Err(format!("HTTP {}", response.status));
        }
        Ok(documents(&response.body))
    }
}

/// Project id named in a Firestore REST URL.
pub fn project_id(url: &str) -> Option<&str> {
    PROJECT_PATTERN
        .captures(url)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

fn documents_url(project_id: &str) -> String {
    format!("https://firestore.googleapis.com/v1/projects/{project_id}/databases/(default)/documents")
}

fn documents(body: &Value) -> Vec<TableDescription> {
    body.get("documents")
        .and_then(Value::as_array)
        .map(|docs| {
            docs.iter()
                .filter_map(|doc| doc.get("name").and_then(Value::as_str))
                .map(|path| {
                    let mut entry = TableDescription::new(document_name(path), Vec::new());
                    entry.path = Some(path.to_string());
                    entry
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Document path below `/documents/`, e.g. `users/alice`. Paths without that
/// segment are kept whole.
fn document_name(path: &str) -> &str {
    path.split_once("/documents/").map_or(path, |(_, rest)| rest)
}

fn placeholder() -> TableDescription {
    let mut entry = TableDescription::new(PLACEHOLDER_NAME, Vec::new());
    entry.note = Some(PLACEHOLDER_NOTE.to_string());
    entry
}

#[async_trait]
impl SchemaExplorer for FirestoreExplorer {
    fn kind(&self) -> BackendKind {
        KIND
    }

    async fn explore(
        &self,
        connection_string: &str,
        credentials: &Credentials,
    ) -> AppResult<Exploration> {
        let project = project_id(connection_string)
            .ok_or_else(|| AppError::invalid_url(KIND, connection_string))?;

        let mut log = WarningLog::new();
        let tables = match self.list_root(&documents_url(project), credentials).await {
            Ok(tables) => tables,
            Err(message) => {
                log.push(MetadataWarning {
                    target: project.to_string(),
                    step: MetadataStep::Documents,
                    message,
                });
                vec![placeholder()]
            }
        };

        let description =
            SchemaDescription::new(KIND, SchemaPayload::Flat { tables }).with_project_id(project);
        tracing::info!(
            kind = %KIND,
            project_id = %project,
            collections = ?description.statistics().total_collections,
            "exploration finished"
        );
        Ok(Exploration::new(description, log.into_warnings()))
    }
}
