//! PostgreSQL driver: schemas, then tables, then per-table metadata.

use std::sync::Arc;

use async_trait::async_trait;

use common::errors::{AppError, AppResult};
use common::models::{
    BackendKind, ColumnDescription, Credentials, ForeignKey, IndexDescription, Record,
    SchemaDescription, SchemaGroup, SchemaPayload, TableDescription, MAX_SAMPLE_ROWS,
};

use super::partial::{MetadataStep, WarningLog};
use super::{Exploration, SchemaExplorer};
use crate::clients::sql::{fetch_count, quote_pg_ident, RecordExt};
use crate::clients::{ClientResult, SqlClient, SqlConnector};

const KIND: BackendKind = BackendKind::RelationalA;

const SCHEMAS_SQL: &str = "SELECT schema_name::text AS schema_name \
     FROM information_schema.schemata \
     WHERE schema_name <> 'information_schema' AND schema_name NOT LIKE 'pg\\_%' \
     ORDER BY schema_name";

const TABLES_SQL: &str = "SELECT table_name::text AS table_name \
     FROM information_schema.tables \
     WHERE table_schema = $1 AND table_type = 'BASE TABLE' \
     ORDER BY table_name";

const COLUMNS_SQL: &str = "SELECT column_name::text AS column_name, \
            data_type::text AS data_type, \
            is_nullable::text AS is_nullable, \
            column_default::text AS column_default, \
            character_maximum_length::bigint AS character_maximum_length, \
            numeric_precision::bigint AS numeric_precision, \
            numeric_scale::bigint AS numeric_scale \
     FROM information_schema.columns \
     WHERE table_schema = $1 AND table_name = $2 \
     ORDER BY ordinal_position";

const PRIMARY_KEYS_SQL: &str = "SELECT column_name::text AS column_name \
     FROM information_schema.constraint_column_usage \
     WHERE table_schema = $1 AND table_name = $2 \
       AND constraint_name IN ( \
         SELECT constraint_name FROM information_schema.table_constraints \
         WHERE table_schema = $1 AND table_name = $2 AND constraint_type = 'PRIMARY KEY')";

const FOREIGN_KEYS_SQL: &str = "SELECT kcu.constraint_name::text AS constraint_name, \
            kcu.column_name::text AS column_name, \
            ccu.table_name::text AS referenced_table, \
            ccu.column_name::text AS referenced_column \
     FROM information_schema.key_column_usage kcu \
     LEFT JOIN information_schema.constraint_column_usage ccu \
       ON kcu.constraint_name = ccu.constraint_name \
     JOIN information_schema.table_constraints tc \
       ON kcu.constraint_name = tc.constraint_name \
     WHERE tc.table_schema = $1 AND kcu.table_name = $2 \
       AND tc.constraint_type = 'FOREIGN KEY'";

const INDEXES_SQL: &str = "SELECT indexname::text AS indexname, indexdef \
     FROM pg_indexes \
     WHERE schemaname = $1 AND tablename = $2 \
     ORDER BY indexname";

pub struct PostgresExplorer {
    connector: Arc<dyn SqlConnector>,
}

impl PostgresExplorer {
    pub fn new(connector: Arc<dyn SqlConnector>) -> Self {
        Self { connector }
    }

    async fn connect(&self, connection_string: &str) -> AppResult<Box<dyn SqlClient>> {
        self.connector
            .connect(connection_string)
            .await
            .map_err(|e| AppError::connection(KIND, e))
    }
}

#[async_trait]
impl SchemaExplorer for PostgresExplorer {
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
        let walked = walk_schemas(client.as_ref(), &mut log).await;
        client.close().await;
        let schemas = walked?;

        let mut description = SchemaDescription::new(KIND, SchemaPayload::Namespaced { schemas });
        if let Some(database) = database_name(connection_string) {
            description = description.with_database(database);
        }

        tracing::info!(
            kind = %KIND,
            schemas = ?description.statistics().total_schemas,
            tables = ?description.statistics().total_tables,
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

async fn walk_schemas(client: &dyn SqlClient, log: &mut WarningLog) -> AppResult<Vec<SchemaGroup>> {
    let schema_names = client
        .query(SCHEMAS_SQL, &[])
        .await
        .map_err(|e| AppError::metadata_query(KIND, format!("listing schemas: {e}")))?
        .iter()
        .filter_map(|row| row.text("schema_name"))
        .filter(|name| !is_system_schema(name))
        .collect::<Vec<_>>();

    let mut schemas = Vec::with_capacity(schema_names.len());
    for schema in schema_names {
        let table_names = log.settle(&schema, MetadataStep::Tables, list_tables(client, &schema).await);
        let mut tables = Vec::with_capacity(table_names.len());
        for table in table_names {
            tables.push(describe_table(client, &schema, &table, log).await);
        }
        schemas.push(SchemaGroup::new(schema, tables));
    }
    Ok(schemas)
}

/// `information_schema` and every `pg_` schema (catalog, toast, temp).
fn is_system_schema(name: &str) -> bool {
    name == "information_schema" || name.starts_with("pg_")
}

async fn list_tables(client: &dyn SqlClient, schema: &str) -> ClientResult<Vec<String>> {
    let rows = client.query(TABLES_SQL, &[schema]).await?;
    Ok(rows.iter().filter_map(|row| row.text("table_name")).collect())
}

async fn describe_table(
    client: &dyn SqlClient,
    schema: &str,
    table: &str,
    log: &mut WarningLog,
) -> TableDescription {
    let target = format!("{schema}.{table}");
    let qualified = format!("{}.{}", quote_pg_ident(schema), quote_pg_ident(table));
    let count_sql = format!("SELECT COUNT(*) AS count FROM {qualified}");
    let sample_sql = format!("SELECT * FROM {qualified} LIMIT {MAX_SAMPLE_ROWS}");

    // Sub-queries are independent; the pool runs them side by side.
    let (columns, row_count, primary_keys, foreign_keys, indexes, samples) = tokio::join!(
        fetch_columns(client, schema, table),
        fetch_count(client, &count_sql),
        fetch_primary_keys(client, schema, table),
        fetch_foreign_keys(client, schema, table),
        fetch_indexes(client, schema, table),
        client.query(&sample_sql, &[]),
    );

    let columns = log.settle(&target, MetadataStep::Columns, columns);
    let row_count = log.settle(&target, MetadataStep::RowCount, row_count);
    let primary_keys = log.settle(&target, MetadataStep::PrimaryKeys, primary_keys);
    let foreign_keys = log.settle(&target, MetadataStep::ForeignKeys, foreign_keys);
    let indexes = log.settle(&target, MetadataStep::Indexes, indexes);
    let samples = log.settle(&target, MetadataStep::SampleData, samples);

    let mut description = TableDescription::new(table, columns)
        .with_primary_keys(primary_keys)
        .with_row_count(row_count)
        .with_samples(samples);
    description.foreign_keys = Some(foreign_keys);
    description.indexes = Some(indexes);
    description
}

async fn fetch_columns(
    client: &dyn SqlClient,
    schema: &str,
    table: &str,
) -> ClientResult<Vec<ColumnDescription>> {
    let rows = client.query(COLUMNS_SQL, &[schema, table]).await?;
    Ok(rows.iter().map(column_from_row).collect())
}

fn column_from_row(row: &Record) -> ColumnDescription {
    let mut column = ColumnDescription::declared(
        row.text("column_name").unwrap_or_default(),
        row.text("data_type").unwrap_or_default(),
        row.text("is_nullable").as_deref() == Some("YES"),
    );
    column.default = row.text("column_default");
    column.max_length = row.integer("character_maximum_length");
    column.precision = row.integer("numeric_precision");
    column.scale = row.integer("numeric_scale");
    column
}

async fn fetch_primary_keys(
    client: &dyn SqlClient,
    schema: &str,
    table: &str,
) -> ClientResult<Vec<String>> {
    let rows = client.query(PRIMARY_KEYS_SQL, &[schema, table]).await?;
    Ok(rows.iter().filter_map(|row| row.text("column_name")).collect())
}

async fn fetch_foreign_keys(
    client: &dyn SqlClient,
    schema: &str,
    table: &str,
) -> ClientResult<Vec<ForeignKey>> {
    let rows = client.query(FOREIGN_KEYS_SQL, &[schema, table]).await?;
    Ok(rows
        .iter()
        .map(|row| ForeignKey {
            name: row.text("constraint_name"),
            column: row.text("column_name").unwrap_or_default(),
            referenced_table: row.text("referenced_table").unwrap_or_default(),
            referenced_column: row.text("referenced_column").unwrap_or_default(),
        })
        .collect())
}

async fn fetch_indexes(
    client: &dyn SqlClient,
    schema: &str,
    table: &str,
) -> ClientResult<Vec<IndexDescription>> {
    let rows = client.query(INDEXES_SQL, &[schema, table]).await?;
    Ok(rows
        .iter()
        .map(|row| IndexDescription {
            name: row.text("indexname").unwrap_or_default(),
            definition: row.text("indexdef").unwrap_or_default(),
        })
        .collect())
}

/// Database named in a URL-form connection string.
fn database_name(connection_string: &str) -> Option<String> {
    let url = reqwest::Url::parse(connection_string).ok()?;
    let name = url.path().trim_start_matches('/');
    (!name.is_empty()).then(|| name.to_string())
}
