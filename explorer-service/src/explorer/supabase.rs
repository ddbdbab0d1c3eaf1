//! Supabase driver over the PostgREST root endpoint.
//!
//! Every top-level key of the root object is treated as a table; an array
//! value's length is its record count.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use common::errors::{AppError, AppResult};
use common::models::{BackendKind, Credentials, SchemaDescription, SchemaPayload, TableDescription};

use super::{Exploration, SchemaExplorer};
use crate::clients::HttpFetcher;

const KIND: BackendKind = BackendKind::ServerlessB;

static PROJECT_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"https://([a-z0-9]+)\.supabase\.co").expect("valid project pattern"));

pub struct SupabaseExplorer {
    http: Arc<dyn HttpFetcher>,
    timeout: Duration,
}

impl SupabaseExplorer {
    pub fn new(http: Arc<dyn HttpFetcher>, timeout: Duration) -> Self {
        Self { http, timeout }
    }
}

pub fn project_id(url: &str) -> Option<&str> {
    PROJECT_PATTERN
        .captures(url)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

fn rest_root(project_id: &str) -> String {
    format!("https://{project_id}.supabase.co/rest/v1/")
}

fn auth_headers(credentials: &Credentials) -> Vec<(String, String)> {
    match &credentials.api_key {
        Some(key) => vec![
            ("apikey".to_string(), key.clone()),
            ("Authorization".to_string(), format!("Bearer {key}")),
        ],
        None => Vec::new(),
    }
}

fn tables_from_root(body: &Value) -> Vec<TableDescription> {
    body.as_object()
        .map(|root| {
            root.iter()
                .map(|(name, value)| {
                    let count = value.as_array().map_or(0, |rows| rows.len() as u64);
                    TableDescription::new(name.as_str(), Vec::new()).with_row_count(count)
                })
                .collect()
        })
        .unwrap_or_default()
}

#[async_trait]
impl SchemaExplorer for SupabaseExplorer {
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

        let response = self
            .http
            .get(&rest_root(project), &auth_headers(credentials), self.timeout)
            .await
            .map_err(|e| AppError::connection(KIND, e))?;
        if !response.is_success() {
            return Err(AppError::connection(
                KIND,
                format!("Request failed with status code {}", response.status),
            ));
        }

        let tables = tables_from_root(&response.body);
        let description =
            SchemaDescription::new(KIND, SchemaPayload::Flat { tables }).with_project_id(project);
        tracing::info!(
            kind = %KIND,
            project_id = %project,
            tables = ?description.statistics().total_tables,
            "exploration finished"
        );
        Ok(Exploration::new(description, Vec::new()))
    }
}
