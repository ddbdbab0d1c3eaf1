//! Relational clients over sqlx pools.
//!
//! Rows are decoded into JSON records by inspecting each column's SQL type
//! name. Types without a mapping decode as text when possible and as `null`
//! otherwise; samples are best-effort.

use std::fmt::Display;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::mysql::{MySqlPoolOptions, MySqlRow};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{Column, MySqlPool, PgPool, Row, TypeInfo};

use common::models::Record;

use super::{ClientError, ClientResult};

/// A live relational connection.
#[async_trait]
pub trait SqlClient: Send + Sync {
    /// Runs a statement with positional text parameters.
    async fn query(&self, sql: &str, params: &[&str]) -> ClientResult<Vec<Record>>;

    async fn close(&self);
}

/// Opens [`SqlClient`]s from connection URLs.
#[async_trait]
pub trait SqlConnector: Send + Sync {
    async fn connect(&self, url: &str) -> ClientResult<Box<dyn SqlClient>>;
}

/// Typed access to decoded record fields.
pub trait RecordExt {
    fn text(&self, key: &str) -> Option<String>;
    fn integer(&self, key: &str) -> Option<i64>;
}

impl RecordExt for Record {
    fn text(&self, key: &str) -> Option<String> {
        match self.get(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Null => None,
            other => Some(other.to_string()),
        }
    }

    fn integer(&self, key: &str) -> Option<i64> {
        match self.get(key)? {
            Value::Number(n) => n.as_i64().or_else(|| n.as_u64().map(|v| v as i64)),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

/// Reads the `count` column of the first row; no rows or a negative value is 0.
pub async fn fetch_count(client: &dyn SqlClient, sql: &str) -> ClientResult<u64> {
    let rows = client.query(sql, &[]).await?;
    Ok(rows
        .first()
        .and_then(|row| row.integer("count"))
        .map_or(0, |n| n.max(0) as u64))
}

// ============== PostgreSQL ==============

pub struct PgConnector {
    max_connections: u32,
    connect_timeout: Duration,
}

impl PgConnector {
    pub fn new(max_connections: u32, connect_timeout: Duration) -> Self {
        Self {
            max_connections,
            connect_timeout,
        }
    }
}

#[async_trait]
impl SqlConnector for PgConnector {
    async fn connect(&self, url: &str) -> ClientResult<Box<dyn SqlClient>> {
        let pool = PgPoolOptions::new()
            .max_connections(self.max_connections)
            .acquire_timeout(self.connect_timeout)
            .connect(url)
            .await
            .map_err(ClientError::new)?;
        Ok(Box::new(PgClient { pool }))
    }
}

struct PgClient {
    pool: PgPool,
}

#[async_trait]
impl SqlClient for PgClient {
    async fn query(&self, sql: &str, params: &[&str]) -> ClientResult<Vec<Record>> {
        let mut query = sqlx::query(sql);
        for param in params {
            query = query.bind(param.to_string());
        }
        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(ClientError::new)?;
        Ok(rows.iter().map(pg_row_to_record).collect())
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

fn pg_row_to_record(row: &PgRow) -> Record {
    row.columns()
        .iter()
        .map(|col| {
            let value = pg_value(row, col.ordinal(), col.type_info().name());
            (col.name().to_string(), value)
        })
        .collect()
}

fn pg_value(row: &PgRow, idx: usize, type_name: &str) -> Value {
    match type_name {
        "BOOL" => json_of(row.try_get::<Option<bool>, _>(idx)),
        "INT2" => json_of(row.try_get::<Option<i16>, _>(idx)),
        "INT4" => json_of(row.try_get::<Option<i32>, _>(idx)),
        "INT8" => json_of(row.try_get::<Option<i64>, _>(idx)),
        "FLOAT4" => json_of(row.try_get::<Option<f32>, _>(idx)),
        "FLOAT8" => json_of(row.try_get::<Option<f64>, _>(idx)),
        "JSON" | "JSONB" => json_of(row.try_get::<Option<Value>, _>(idx)),
        "UUID" => display_of(row.try_get::<Option<uuid::Uuid>, _>(idx)),
        "TIMESTAMPTZ" => {
            display_of(row.try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(idx))
        }
        "TIMESTAMP" => display_of(row.try_get::<Option<chrono::NaiveDateTime>, _>(idx)),
        "DATE" => display_of(row.try_get::<Option<chrono::NaiveDate>, _>(idx)),
        "TIME" => display_of(row.try_get::<Option<chrono::NaiveTime>, _>(idx)),
        _ => json_of(row.try_get::<Option<String>, _>(idx)),
    }
}

// ============== MySQL ==============

pub struct MySqlConnector {
    max_connections: u32,
    connect_timeout: Duration,
}

impl MySqlConnector {
    pub fn new(max_connections: u32, connect_timeout: Duration) -> Self {
        Self {
            max_connections,
            connect_timeout,
        }
    }
}

#[async_trait]
impl SqlConnector for MySqlConnector {
    async fn connect(&self, url: &str) -> ClientResult<Box<dyn SqlClient>> {
        let pool = MySqlPoolOptions::new()
            .max_connections(self.max_connections)
            .acquire_timeout(self.connect_timeout)
            .connect(url)
            .await
            .map_err(ClientError::new)?;
        Ok(Box::new(MySqlClient { pool }))
    }
}

struct MySqlClient {
    pool: MySqlPool,
}

#[async_trait]
impl SqlClient for MySqlClient {
    async fn query(&self, sql: &str, params: &[&str]) -> ClientResult<Vec<Record>> {
        let mut query = sqlx::query(sql);
        for param in params {
            query = query.bind(param.to_string());
        }
        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(ClientError::new)?;
        Ok(rows.iter().map(mysql_row_to_record).collect())
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

fn mysql_row_to_record(row: &MySqlRow) -> Record {
    row.columns()
        .iter()
        .map(|col| {
            let value = mysql_value(row, col.ordinal(), col.type_info().name());
            (col.name().to_string(), value)
        })
        .collect()
}

fn mysql_value(row: &MySqlRow, idx: usize, type_name: &str) -> Value {
    match type_name {
        "BOOLEAN" => json_of(row.try_get::<Option<bool>, _>(idx)),
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" => {
            json_of(row.try_get::<Option<i64>, _>(idx))
        }
        "TINYINT UNSIGNED" | "SMALLINT UNSIGNED" | "MEDIUMINT UNSIGNED" | "INT UNSIGNED"
        | "BIGINT UNSIGNED" | "YEAR" => json_of(row.try_get::<Option<u64>, _>(idx)),
        "FLOAT" => json_of(row.try_get::<Option<f32>, _>(idx)),
        "DOUBLE" => json_of(row.try_get::<Option<f64>, _>(idx)),
        "JSON" => json_of(row.try_get::<Option<Value>, _>(idx)),
        "TIMESTAMP" => display_of(row.try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(idx)),
        "DATETIME" => display_of(row.try_get::<Option<chrono::NaiveDateTime>, _>(idx)),
        "DATE" => display_of(row.try_get::<Option<chrono::NaiveDate>, _>(idx)),
        "TIME" => display_of(row.try_get::<Option<chrono::NaiveTime>, _>(idx)),
        _ => mysql_text(row, idx),
    }
}

// information_schema columns may arrive as binary strings on MySQL 8, and
// DECIMAL/ENUM/SET travel as text on the wire.
fn mysql_text(row: &MySqlRow, idx: usize) -> Value {
    if let Ok(v) = row.try_get::<Option<String>, _>(idx) {
        return v.map(Value::String).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<Vec<u8>>, _>(idx) {
        return v
            .map(|bytes| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
            .unwrap_or(Value::Null);
    }
    json_of(row.try_get_unchecked::<Option<String>, _>(idx))
}

fn json_of<T: Into<Value>>(decoded: Result<Option<T>, sqlx::Error>) -> Value {
    decoded
        .ok()
        .flatten()
        .map(Into::into)
        .unwrap_or(Value::Null)
}

fn display_of<T: Display>(decoded: Result<Option<T>, sqlx::Error>) -> Value {
    decoded
        .ok()
        .flatten()
        .map(|v| Value::String(v.to_string()))
        .unwrap_or(Value::Null)
}

/// Quotes a PostgreSQL identifier.
pub fn quote_pg_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Quotes a MySQL identifier.
pub fn quote_mysql_ident(ident: &str) -> String {
    format!("`{}`", ident.replace('`', "``"))
}
