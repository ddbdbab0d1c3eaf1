//! Normalized schema description models.
//!
//! Every exploration driver, whatever its native metadata API, produces a
//! [`SchemaDescription`]. The backend-shaped part lives in [`SchemaPayload`],
//! a sum type with one variant per layout; aggregate [`Statistics`] are
//! always derived from the payload and never set independently.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use super::backend::BackendKind;

/// A raw record as returned by a backend: column/field name to JSON value.
pub type Record = serde_json::Map<String, Value>;

/// Upper bound on sample records kept per table or collection.
pub const MAX_SAMPLE_ROWS: usize = 3;

/// Connection outcome recorded on a description.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Connected,
    Failed,
}

/// Primitive kind inferred from a decoded sample value.
///
/// Best-effort only: document stores and REST endpoints declare no schema,
/// so the kind reflects a single observed value and is never authoritative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum InferredType {
    String,
    Number,
    Boolean,
    Null,
    Array,
    Object,
}

impl InferredType {
    /// Classifies a decoded value by its runtime representation.
    pub fn of(value: &Value) -> Self {
        match value {
            Value::String(_) => InferredType::String,
            Value::Number(_) => InferredType::Number,
            Value::Bool(_) => InferredType::Boolean,
            Value::Null => InferredType::Null,
            Value::Array(_) => InferredType::Array,
            Value::Object(_) => InferredType::Object,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            InferredType::String => "string",
            InferredType::Number => "number",
            InferredType::Boolean => "boolean",
            InferredType::Null => "null",
            InferredType::Array => "array",
            InferredType::Object => "object",
        }
    }
}

/// One column of a relational table, or one field of a sampled document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ColumnDescription {
    /// Column or field name.
    pub name: String,
    /// Declared native type, or the inferred kind for schemaless sources.
    pub data_type: String,
    pub nullable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub precision: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scale: Option<i64>,
    /// Native key tag (e.g. `PRI`, `UNI`, `MUL`) where the backend reports one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    /// Derived from the owning table's primary-key set.
    pub is_primary_key: bool,
    /// Observed value for inferred fields.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub example: Option<Value>,
}

impl ColumnDescription {
    /// Creates a column with a declared native type.
    pub fn declared(name: impl Into<String>, data_type: impl Into<String>, nullable: bool) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            nullable,
            default: None,
            max_length: None,
            precision: None,
            scale: None,
            key: None,
            is_primary_key: false,
            example: None,
        }
    }

    /// Creates a field whose type is inferred from a sample value.
    pub fn inferred(name: impl Into<String>, sample: &Value) -> Self {
        Self {
            example: Some(sample.clone()),
            ..Self::declared(name, InferredType::of(sample).as_str(), true)
        }
    }
}

/// A foreign-key edge from one column to a referenced table column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ForeignKey {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub column: String,
    pub referenced_table: String,
    pub referenced_column: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct IndexDescription {
    pub name: String,
    pub definition: String,
}

/// A table, collection, or collection placeholder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TableDescription {
    pub name: String,
    pub columns: Vec<ColumnDescription>,
    /// Best-effort count; 0 when uncountable.
    pub row_count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_keys: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub foreign_keys: Option<Vec<ForeignKey>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub indexes: Option<Vec<IndexDescription>>,
    #[schema(value_type = Vec<Object>)]
    pub sample_rows: Vec<Record>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub engine: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collation: Option<String>,
    /// Backend-side path of the entry (Firestore document name).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl TableDescription {
    pub fn new(name: impl Into<String>, columns: Vec<ColumnDescription>) -> Self {
        Self {
            name: name.into(),
            columns,
            row_count: 0,
            primary_keys: None,
            foreign_keys: None,
            indexes: None,
            sample_rows: Vec::new(),
            engine: None,
            collation: None,
            path: None,
            note: None,
        }
    }

    /// Sets the primary-key set and re-derives every column's `is_primary_key`.
    pub fn with_primary_keys(mut self, keys: Vec<String>) -> Self {
        for column in &mut self.columns {
            column.is_primary_key = keys.iter().any(|k| k == &column.name);
        }
        self.primary_keys = Some(keys);
        self
    }

    pub fn with_row_count(mut self, row_count: u64) -> Self {
        self.row_count = row_count;
        self
    }

    /// Keeps at most [`MAX_SAMPLE_ROWS`] records.
    pub fn with_samples(mut self, mut rows: Vec<Record>) -> Self {
        rows.truncate(MAX_SAMPLE_ROWS);
        self.sample_rows = rows;
        self
    }
}

/// A namespace (schema) of a namespaced relational database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SchemaGroup {
    pub name: String,
    pub tables: Vec<TableDescription>,
    pub total_tables: usize,
}

impl SchemaGroup {
    pub fn new(name: impl Into<String>, tables: Vec<TableDescription>) -> Self {
        Self {
            name: name.into(),
            total_tables: tables.len(),
            tables,
        }
    }
}

/// Top-level shape of an HTTP response body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ResponseShape {
    Array,
    Object,
    Primitive,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct FieldDescription {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: InferredType,
    #[schema(value_type = Object)]
    pub example: Value,
}

impl FieldDescription {
    pub fn infer(name: impl Into<String>, sample: &Value) -> Self {
        Self {
            name: name.into(),
            field_type: InferredType::of(sample),
            example: sample.clone(),
        }
    }
}

/// An HTTP endpoint and the fields inferred from one response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EndpointDescription {
    pub path: String,
    pub method: String,
    pub response_type: ResponseShape,
    pub fields: Vec<FieldDescription>,
}

/// Backend-shaped body of a description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "layout", rename_all = "camelCase")]
pub enum SchemaPayload {
    /// Schema groups containing tables.
    Namespaced { schemas: Vec<SchemaGroup> },
    /// A single list of tables or collections.
    Flat { tables: Vec<TableDescription> },
    /// HTTP endpoints.
    Endpoints { endpoints: Vec<EndpointDescription> },
}

/// Aggregate counts. Only the counters meaningful for a backend are present.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Statistics {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_schemas: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_tables: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_relationships: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_rows: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_collections: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_documents: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_endpoints: Option<usize>,
}

impl Statistics {
    /// Derives counters from a populated payload.
    pub fn compute(kind: BackendKind, payload: &SchemaPayload) -> Self {
        match payload {
            SchemaPayload::Namespaced { schemas } => {
                let tables = schemas.iter().flat_map(|s| s.tables.iter());
                Statistics {
                    total_schemas: Some(schemas.len()),
                    total_tables: Some(schemas.iter().map(|s| s.tables.len()).sum()),
                    total_relationships: Some(
                        tables
                            .map(|t| t.foreign_keys.as_ref().map_or(0, Vec::len))
                            .sum(),
                    ),
                    ..Default::default()
                }
            }
            SchemaPayload::Flat { tables } => {
                let rows: u64 = tables.iter().map(|t| t.row_count).sum();
                match kind {
                    BackendKind::Document => Statistics {
                        total_collections: Some(tables.len()),
                        total_documents: Some(rows),
                        ..Default::default()
                    },
                    BackendKind::ServerlessA => Statistics {
                        total_collections: Some(tables.len()),
                        ..Default::default()
                    },
                    _ => Statistics {
                        total_tables: Some(tables.len()),
                        total_rows: Some(rows),
                        ..Default::default()
                    },
                }
            }
            SchemaPayload::Endpoints { endpoints } => Statistics {
                total_endpoints: Some(endpoints.len()),
                ..Default::default()
            },
        }
    }
}

/// Root result of one exploration.
///
/// Built once from a fully populated payload; statistics are computed at
/// construction. There are no mutators after that point.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SchemaDescription {
    backend_kind: BackendKind,
    connection_status: ConnectionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    database: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    project_id: Option<String>,
    #[serde(flatten)]
    payload: SchemaPayload,
    statistics: Statistics,
    explored_at: DateTime<Utc>,
}

impl SchemaDescription {
    /// A connected description over `payload`.
    pub fn new(backend_kind: BackendKind, payload: SchemaPayload) -> Self {
        let statistics = Statistics::compute(backend_kind, &payload);
        Self {
            backend_kind,
            connection_status: ConnectionStatus::Connected,
            database: None,
            project_id: None,
            payload,
            statistics,
            explored_at: Utc::now(),
        }
    }

    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    pub fn with_project_id(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }

    pub fn backend_kind(&self) -> BackendKind {
        self.backend_kind
    }

    pub fn connection_status(&self) -> ConnectionStatus {
        self.connection_status
    }

    pub fn database(&self) -> Option<&str> {
        self.database.as_deref()
    }

    pub fn project_id(&self) -> Option<&str> {
        self.project_id.as_deref()
    }

    pub fn payload(&self) -> &SchemaPayload {
        &self.payload
    }

    pub fn statistics(&self) -> &Statistics {
        &self.statistics
    }

    pub fn explored_at(&self) -> DateTime<Utc> {
        self.explored_at
    }

    /// Finds a table by name: flat tables first, then each schema group in order.
    pub fn find_table(&self, name: &str) -> Option<&TableDescription> {
        match &self.payload {
            SchemaPayload::Flat { tables } => tables.iter().find(|t| t.name == name),
            SchemaPayload::Namespaced { schemas } => schemas
                .iter()
                .find_map(|s| s.tables.iter().find(|t| t.name == name)),
            SchemaPayload::Endpoints { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn users_table() -> TableDescription {
        TableDescription::new(
            "users",
            vec![
                ColumnDescription::declared("id", "integer", false),
                ColumnDescription::declared("name", "text", true),
            ],
        )
        .with_primary_keys(vec!["id".to_string()])
        .with_row_count(2)
    }

    #[test]
    fn test_primary_key_flags_follow_key_set() {
        let table = users_table();
        assert!(table.columns[0].is_primary_key);
        assert!(!table.columns[1].is_primary_key);

        let rekeyed = table.with_primary_keys(vec!["name".to_string()]);
        assert!(!rekeyed.columns[0].is_primary_key);
        assert!(rekeyed.columns[1].is_primary_key);
    }

    #[test]
    fn test_samples_are_capped() {
        let rows = (0..5)
            .map(|i| {
                let mut r = Record::new();
                r.insert("i".into(), json!(i));
                r
            })
            .collect();
        let table = TableDescription::new("t", vec![]).with_samples(rows);
        assert_eq!(table.sample_rows.len(), MAX_SAMPLE_ROWS);
        assert_eq!(table.sample_rows[2]["i"], json!(2));
    }

    #[test]
    fn test_inferred_types() {
        assert_eq!(InferredType::of(&json!("a")), InferredType::String);
        assert_eq!(InferredType::of(&json!(1.5)), InferredType::Number);
        assert_eq!(InferredType::of(&json!(false)), InferredType::Boolean);
        assert_eq!(InferredType::of(&json!(null)), InferredType::Null);
        assert_eq!(InferredType::of(&json!([1])), InferredType::Array);
        assert_eq!(InferredType::of(&json!({"$oid": "x"})), InferredType::Object);

        let column = ColumnDescription::inferred("age", &json!(42));
        assert_eq!(column.data_type, "number");
        assert_eq!(column.example, Some(json!(42)));
    }

    #[test]
    fn test_namespaced_statistics() {
        let payload = SchemaPayload::Namespaced {
            schemas: vec![
                SchemaGroup::new("public", vec![users_table()]),
                SchemaGroup::new("audit", vec![]),
            ],
        };
        let description = SchemaDescription::new(BackendKind::RelationalA, payload);
        let stats = description.statistics();
        assert_eq!(stats.total_schemas, Some(2));
        assert_eq!(stats.total_tables, Some(1));
        assert_eq!(stats.total_relationships, Some(0));
        assert_eq!(stats.total_collections, None);
    }

    #[test]
    fn test_document_statistics_sum_counts() {
        let payload = SchemaPayload::Flat {
            tables: vec![
                TableDescription::new("a", vec![]).with_row_count(3),
                TableDescription::new("b", vec![]).with_row_count(4),
            ],
        };
        let description = SchemaDescription::new(BackendKind::Document, payload);
        assert_eq!(description.statistics().total_collections, Some(2));
        assert_eq!(description.statistics().total_documents, Some(7));
        assert_eq!(description.statistics().total_tables, None);
    }

    #[test]
    fn test_serialized_shape() {
        let description = SchemaDescription::new(
            BackendKind::RelationalA,
            SchemaPayload::Namespaced {
                schemas: vec![SchemaGroup::new("public", vec![users_table()])],
            },
        );
        let value = serde_json::to_value(&description).unwrap();
        assert_eq!(value["backendKind"], json!("PostgreSQL"));
        assert_eq!(value["connectionStatus"], json!("connected"));
        assert_eq!(value["layout"], json!("namespaced"));
        assert_eq!(value["schemas"][0]["tables"][0]["rowCount"], json!(2));
        assert_eq!(value["schemas"][0]["tables"][0]["primaryKeys"], json!(["id"]));
        assert_eq!(
            value["schemas"][0]["tables"][0]["columns"][0]["isPrimaryKey"],
            json!(true)
        );
        assert_eq!(value["statistics"], json!({"totalSchemas": 1, "totalTables": 1, "totalRelationships": 0}));
    }

    #[test]
    fn test_find_table_searches_groups_in_order() {
        let description = SchemaDescription::new(
            BackendKind::RelationalA,
            SchemaPayload::Namespaced {
                schemas: vec![
                    SchemaGroup::new("audit", vec![TableDescription::new("log", vec![])]),
                    SchemaGroup::new("public", vec![users_table()]),
                ],
            },
        );
        assert_eq!(description.find_table("users").map(|t| t.row_count), Some(2));
        assert!(description.find_table("missing").is_none());
    }
}
