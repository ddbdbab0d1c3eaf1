//! Document store client over the MongoDB driver.

use std::time::Duration;

use async_trait::async_trait;
use mongodb::bson::{doc, Bson, Document};
use mongodb::options::ClientOptions;
use mongodb::{Client, Database};
use serde_json::Value;

use common::models::Record;

use super::{ClientError, ClientResult};

/// Database used when the URI names none.
const FALLBACK_DATABASE: &str = "test";

/// A live document-store connection scoped to one database.
#[async_trait]
pub trait DocumentClient: Send + Sync {
    fn database_name(&self) -> &str;

    async fn list_collections(&self) -> ClientResult<Vec<String>>;

    async fn count_documents(&self, collection: &str) -> ClientResult<u64>;

    /// First document of the collection in natural order, as relaxed extended JSON.
    async fn find_one(&self, collection: &str) -> ClientResult<Option<Record>>;

    async fn close(&self);
}

#[async_trait]
pub trait DocumentConnector: Send + Sync {
    async fn connect(&self, uri: &str) -> ClientResult<Box<dyn DocumentClient>>;
}

pub struct MongoConnector {
    connect_timeout: Duration,
}

impl MongoConnector {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

#[async_trait]
impl DocumentConnector for MongoConnector {
    async fn connect(&self, uri: &str) -> ClientResult<Box<dyn DocumentClient>> {
        let mut options = ClientOptions::parse(uri).await.map_err(ClientError::new)?;
        options.connect_timeout = Some(self.connect_timeout);
        options.server_selection_timeout = Some(self.connect_timeout);
        let database_name = options
            .default_database
            .clone()
            .unwrap_or_else(|| FALLBACK_DATABASE.to_string());

        let client = Client::with_options(options).map_err(ClientError::new)?;
        let database = client.database(&database_name);

        // The driver connects lazily; ping so bad hosts and credentials fail here.
        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(ClientError::new)?;

        Ok(Box::new(MongoClient {
            client,
            database,
            database_name,
        }))
    }
}

struct MongoClient {
    client: Client,
    database: Database,
    database_name: String,
}

#[async_trait]
impl DocumentClient for MongoClient {
    fn database_name(&self) -> &str {
        &self.database_name
    }

    async fn list_collections(&self) -> ClientResult<Vec<String>> {
        self.database
            .list_collection_names()
            .await
            .map_err(ClientError::new)
    }

    async fn count_documents(&self, collection: &str) -> ClientResult<u64> {
        self.database
            .collection::<Document>(collection)
            .count_documents(doc! {})
            .await
            .map_err(ClientError::new)
    }

    async fn find_one(&self, collection: &str) -> ClientResult<Option<Record>> {
        let found = self
            .database
            .collection::<Document>(collection)
            .find_one(doc! {})
            .await
            .map_err(ClientError::new)?;
        Ok(found.map(document_to_record))
    }

    async fn close(&self) {
        self.client.clone().shutdown().await;
    }
}

fn document_to_record(document: Document) -> Record {
    match Bson::Document(document).into_relaxed_extjson() {
        Value::Object(map) => map,
        _ => Record::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::oid::ObjectId;
    use serde_json::json;

    #[test]
    fn test_document_to_record_uses_relaxed_json() {
        let oid = ObjectId::new();
        let record = document_to_record(doc! {
            "_id": oid,
            "name": "Ada",
            "age": 36_i32,
            "tags": ["x"],
        });
        assert_eq!(record["_id"], json!({ "$oid": oid.to_hex() }));
        assert_eq!(record["name"], json!("Ada"));
        assert_eq!(record["age"], json!(36));
        assert_eq!(record["tags"], json!(["x"]));
    }
}
