//! MongoDB driver. Fields are inferred from one sample document per collection.

use std::sync::Arc;

use async_trait::async_trait;

use common::errors::{AppError, AppResult};
use common::models::{
    BackendKind, ColumnDescription, Credentials, Record, SchemaDescription, SchemaPayload,
    TableDescription,
};

use super::partial::{MetadataStep, WarningLog};
use super::{Exploration, SchemaExplorer};
use crate::clients::{DocumentClient, DocumentConnector};

const KIND: BackendKind = BackendKind::Document;

pub struct MongoExplorer {
    connector: Arc<dyn DocumentConnector>,
}

impl MongoExplorer {
    pub fn new(connector: Arc<dyn DocumentConnector>) -> Self {
        Self { connector }
    }

    async fn connect(&self, uri: &str) -> AppResult<Box<dyn DocumentClient>> {
        self.connector
            .connect(uri)
            .await
            .map_err(|e| AppError::connection(KIND, e))
    }
}

#[async_trait]
impl SchemaExplorer for MongoExplorer {
    fn kind(&self) -> BackendKind {
        KIND
    }

    async fn explore(
        &self,
        connection_string: &str,
        _credentials: &Credentials,
    ) -> AppResult<Exploration> {
        let client = self.connect(connection_string).await?;
        let mut log = WarningLog::new();
        let walked = walk_collections(client.as_ref(), &mut log).await;
        let database = client.database_name().to_string();
        client.close().await;
        let tables = walked?;

        let description =
            SchemaDescription::new(KIND, SchemaPayload::Flat { tables }).with_database(&database);

        tracing::info!(
            kind = %KIND,
            database = %database,
            collections = ?description.statistics().total_collections,
            warnings = log.count(),
            "exploration finished"
        );
        Ok(Exploration::new(description, log.into_warnings()))
    }

    async fn check_connection(&self, connection_string: &str, _credentials: &Credentials) -> AppResult<()> {
        let client = self.connect(connection_string).await?;
        client.close().await;
        Ok(())
    }
}

async fn walk_collections(
    client: &dyn DocumentClient,
    log: &mut WarningLog,
) -> AppResult<Vec<TableDescription>> {
    let mut names = client
        .list_collections()
        .await
        .map_err(|e| AppError::metadata_query(KIND, format!("listing collections: {e}")))?;
    names.sort();

    let mut collections = Vec::with_capacity(names.len());
    for name in names {
        let (count, sample) = tokio::join!(client.count_documents(&name), client.find_one(&name));
        let count = log.settle(&name, MetadataStep::DocumentCount, count);
        let sample = log.settle(&name, MetadataStep::SampleData, sample);
        collections.push(describe_collection(&name, count, sample));
    }
    Ok(collections)
}

/// No sample means no fields: there is no declared schema to fall back on.
fn describe_collection(name: &str, count: u64, sample: Option<Record>) -> TableDescription {
    let columns: Vec<ColumnDescription> = sample
        .as_ref()
        .map(|doc| {
            doc.iter()
                .map(|(field, value)| ColumnDescription::inferred(field.as_str(), value))
                .collect()
        })
        .unwrap_or_default();

    TableDescription::new(name, columns)
        .with_row_count(count)
        .with_samples(sample.into_iter().collect())
}
