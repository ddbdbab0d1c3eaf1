//! MySQL driver: one flat list of tables from the connection's database.

use std::sync::Arc;

use async_trait::async_trait;

use common::errors::{AppError, AppResult};
use common::models::{
    BackendKind, ColumnDescription, Credentials, Record, SchemaDescription, SchemaPayload,
    TableDescription, MAX_SAMPLE_ROWS,
};

use super::partial::{MetadataStep, WarningLog};
use super::{Exploration, SchemaExplorer};
use crate::clients::sql::{fetch_count, quote_mysql_ident, RecordExt};
use crate::clients::{ClientResult, SqlClient, SqlConnector};

const KIND: BackendKind = BackendKind::RelationalB;

const TABLES_SQL: &str = "SELECT TABLE_NAME AS table_name \
     FROM INFORMATION_SCHEMA.TABLES \
     WHERE TABLE_SCHEMA = ? \
     ORDER BY TABLE_NAME";

const COLUMNS_SQL: &str = "SELECT COLUMN_NAME AS column_name, \
            COLUMN_TYPE AS column_type, \
            IS_NULLABLE AS is_nullable, \
            COLUMN_DEFAULT AS column_default, \
            COLUMN_KEY AS column_key \
     FROM INFORMATION_SCHEMA.COLUMNS \
     WHERE TABLE_SCHEMA = ? AND TABLE_NAME = ? \
     ORDER BY ORDINAL_POSITION";

const TABLE_INFO_SQL: &str = "SELECT ENGINE AS engine, TABLE_COLLATION AS table_collation \
     FROM INFORMATION_SCHEMA.TABLES \
     WHERE TABLE_SCHEMA = ? AND TABLE_NAME = ?";

/// Key tag MySQL reports for primary-key columns.
const PRIMARY_KEY_TAG: &str = "PRI";

/// Connection URL with a scheme and the database it names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MySqlTarget {
    pub url: String,
    pub database: String,
}

impl MySqlTarget {
    /// Accepts `mysql://user:pw@host/db` or the scheme-less `user:pw@host/db`.
    pub fn parse(connection_string: &str) -> AppResult<Self> {
        let url = if connection_string.contains("://") {
            connection_string.to_string()
        } else {
            format!("mysql://{connection_string}")
        };
        let invalid = || AppError::invalid_url(KIND, connection_string);

        let parsed = reqwest::Url::parse(&url).map_err(|_| invalid())?;
        let database = parsed.path().trim_start_matches('/').to_string();
        if database.is_empty() || database.contains('/') {
            return Err(invalid());
        }
        Ok(Self { url, database })
    }
}

pub struct MySqlExplorer {
    connector: Arc<dyn SqlConnector>,
}

impl MySqlExplorer {
    pub fn new(connector: Arc<dyn SqlConnector>) -> Self {
        Self { connector }
    }

    async fn connect(&self, target: &MySqlTarget) -> AppResult<Box<dyn SqlClient>> {
        self.connector
            .connect(&target.url)
            .await
            .map_err(|e| AppError::connection(KIND, e))
    }
}

#[async_trait]
impl SchemaExplorer for MySqlExplorer {
    fn kind(&self) -> BackendKind {
        KIND
    }

    async fn explore(
        &self,
        connection_string: &str,
        _credentials: &Credentials,
    ) -> AppResult<Exploration> {
        let target = MySqlTarget::parse(connection_string)?;
        let client = self.connect(&target).await?;
        let mut log = WarningLog::new();
        let walked = walk_tables(client.as_ref(), &target.database, &mut log).await;
        client.close().await;
        let tables = walked?;

        let description = SchemaDescription::new(KIND, SchemaPayload::Flat { tables })
            .with_database(&target.database);

        tracing::info!(
            kind = %KIND,
            database = %target.database,
            tables = ?description.statistics().total_tables,
            warnings = log.count(),
            "exploration finished"
        );
        Ok(Exploration::new(description, log.into_warnings()))
    }

    async fn check_connection(&self, connection_string: &str, _credentials: &Credentials) -> AppResult<()> {
        let target = MySqlTarget::parse(connection_string)?;
        let client = self.connect(&target).await?;
        client.close().await;
        Ok(())
    }
}

async fn walk_tables(
    client: &dyn SqlClient,
    database: &str,
    log: &mut WarningLog,
) -> AppResult<Vec<TableDescription>> {
    let names: Vec<String> = client
        .query(TABLES_SQL, &[database])
        .await
        .map_err(|e| AppError::metadata_query(KIND, format!("listing tables of {database}: {e}")))?
        .iter()
        .filter_map(|row| row.text("table_name"))
        .collect();

    let mut tables = Vec::with_capacity(names.len());
    for name in names {
        tables.push(describe_table(client, database, &name, log).await);
    }
    Ok(tables)
}

async fn describe_table(
    client: &dyn SqlClient,
    database: &str,
    table: &str,
    log: &mut WarningLog,
) -> TableDescription {
    let qualified = format!("{}.{}", quote_mysql_ident(database), quote_mysql_ident(table));
    let count_sql = format!("SELECT COUNT(*) AS count FROM {qualified}");
    let sample_sql = format!("SELECT * FROM {qualified} LIMIT {MAX_SAMPLE_ROWS}");

    let (columns, row_count, info, samples) = tokio::join!(
        fetch_columns(client, database, table),
        fetch_count(client, &count_sql),
        fetch_table_info(client, database, table),
        client.query(&sample_sql, &[]),
    );

    let columns = log.settle(table, MetadataStep::Columns, columns);
    let row_count = log.settle(table, MetadataStep::RowCount, row_count);
    let (engine, collation) = log.settle(table, MetadataStep::TableInfo, info);
    let samples = log.settle(table, MetadataStep::SampleData, samples);

    let primary_keys = columns
        .iter()
        .filter(|c| c.key.as_deref() == Some(PRIMARY_KEY_TAG))
        .map(|c| c.name.clone())
        .collect();

    let mut description = TableDescription::new(table, columns)
        .with_primary_keys(primary_keys)
        .with_row_count(row_count)
        .with_samples(samples);
    description.engine = engine;
    description.collation = collation;
    description
}

async fn fetch_columns(
    client: &dyn SqlClient,
    database: &str,
    table: &str,
) -> ClientResult<Vec<ColumnDescription>> {
    let rows = client.query(COLUMNS_SQL, &[database, table]).await?;
    Ok(rows.iter().map(column_from_row).collect())
}

fn column_from_row(row: &Record) -> ColumnDescription {
    let mut column = ColumnDescription::declared(
        row.text("column_name").unwrap_or_default(),
        row.text("column_type").unwrap_or_default(),
        row.text("is_nullable").as_deref() == Some("YES"),
    );
    column.default = row.text("column_default");
    column.key = row.text("column_key").filter(|k| !k.is_empty());
    column
}

async fn fetch_table_info(
    client: &dyn SqlClient,
    database: &str,
    table: &str,
) -> ClientResult<(Option<String>, Option<String>)> {
    let rows = client.query(TABLE_INFO_SQL, &[database, table]).await?;
    Ok(rows
        .first()
        .map(|row| (row.text("engine"), row.text("table_collation")))
        .unwrap_or_default())
}
