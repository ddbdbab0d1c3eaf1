//! Generic REST driver: one GET, one endpoint description.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use common::errors::{AppError, AppResult};
use common::models::{
    BackendKind, Credentials, EndpointDescription, FieldDescription, ResponseShape,
    SchemaDescription, SchemaPayload,
};

use super::{Exploration, SchemaExplorer};
use crate::clients::HttpFetcher;

const KIND: BackendKind = BackendKind::GenericRest;

pub struct RestExplorer {
    http: Arc<dyn HttpFetcher>,
    timeout: Duration,
}

impl RestExplorer {
    pub fn new(http: Arc<dyn HttpFetcher>, timeout: Duration) -> Self {
        Self { http, timeout }
    }
}

/// Infers the endpoint shape from a decoded body.
///
/// Arrays use their first element; an empty array or non-object elements
/// give no fields. Scalars give no fields.
pub fn describe_endpoint(url: &str, body: &Value) -> EndpointDescription {
    let (response_type, sample) = match body {
        Value::Array(items) => (ResponseShape::Array, items.first()),
        Value::Object(_) => (ResponseShape::Object, Some(body)),
        _ => (ResponseShape::Primitive, None),
    };
    let fields: Vec<FieldDescription> = sample
        .and_then(Value::as_object)
        .map(|object| {
            object
                .iter()
                .map(|(name, value)| FieldDescription::infer(name.as_str(), value))
                .collect()
        })
        .unwrap_or_default();

    EndpointDescription {
        path: url.to_string(),
        method: "GET".to_string(),
        response_type,
        fields,
    }
}

#[async_trait]
impl SchemaExplorer for RestExplorer {
    fn kind(&self) -> BackendKind {
        KIND
    }

    async fn explore(
        &self,
        connection_string: &str,
        _credentials: &Credentials,
    ) -> AppResult<Exploration> {
        let response = self
            .http
            .get(connection_string, &[], self.timeout)
            .await
            .map_err(|e| AppError::connection(KIND, e))?;
        if !response.is_success() {
            return Err(AppError::connection(
                KIND,
                format!("Request failed with status code {}", response.status),
            ));
        }

        let endpoint = describe_endpoint(connection_string, &response.body);
        tracing::info!(
            kind = %KIND,
            url = %connection_string,
            fields = endpoint.fields.len(),
            "exploration finished"
        );
        let description = SchemaDescription::new(
            KIND,
            SchemaPayload::Endpoints {
                endpoints: vec![endpoint],
            },
        );
        Ok(Exploration::new(description, Vec::new()))
    }
}
