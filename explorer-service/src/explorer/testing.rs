//! In-memory client fakes for driver tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use common::models::Record;

use crate::clients::http::HttpResponse;
use crate::clients::{
    ClientError, ClientResult, DocumentClient, DocumentConnector, HttpFetcher, SqlClient,
    SqlConnector,
};

pub fn record(value: Value) -> Record {
    match value {
        Value::Object(map) => map,
        other => panic!("not an object: {other}"),
    }
}

fn records(rows: Vec<Value>) -> Vec<Record> {
    rows.into_iter().map(record).collect()
}

// ============== SQL ==============

struct SqlRule {
    needle: String,
    param: Option<String>,
    result: Result<Vec<Record>, String>,
}

#[derive(Default)]
struct SqlLog {
    urls: Vec<String>,
    queries: Vec<(String, Vec<String>)>,
    closed: usize,
}

/// Answers queries by substring rules, first match wins. Unmatched queries
/// return no rows.
#[derive(Default)]
pub struct FakeSql {
    rules: Arc<Vec<SqlRule>>,
    refuse: Option<String>,
    log: Arc<Mutex<SqlLog>>,
}

impl FakeSql {
    pub fn new() -> Self {
        Self::default()
    }

    /// Connect always fails with `message`.
    pub fn refusing(message: &str) -> Self {
        Self {
            refuse: Some(message.to_string()),
            ..Self::default()
        }
    }

    fn push(mut self, rule: SqlRule) -> Self {
        Arc::get_mut(&mut self.rules)
            .expect("rules are only added before use")
            .push(rule);
        self
    }

    pub fn on(self, needle: &str, rows: Vec<Value>) -> Self {
        self.push(SqlRule {
            needle: needle.to_string(),
            param: None,
            result: Ok(records(rows)),
        })
    }

    /// Like [`FakeSql::on`] but only when `param` is among the bound parameters.
    pub fn on_param(self, needle: &str, param: &str, rows: Vec<Value>) -> Self {
        self.push(SqlRule {
            needle: needle.to_string(),
            param: Some(param.to_string()),
            result: Ok(records(rows)),
        })
    }

    pub fn fail(self, needle: &str, message: &str) -> Self {
        self.push(SqlRule {
            needle: needle.to_string(),
            param: None,
            result: Err(message.to_string()),
        })
    }

    pub fn connected_urls(&self) -> Vec<String> {
        self.log.lock().unwrap().urls.clone()
    }

    pub fn queries(&self) -> Vec<(String, Vec<String>)> {
        self.log.lock().unwrap().queries.clone()
    }

    pub fn close_count(&self) -> usize {
        self.log.lock().unwrap().closed
    }
}

#[async_trait]
impl SqlConnector for FakeSql {
    async fn connect(&self, url: &str) -> ClientResult<Box<dyn SqlClient>> {
        self.log.lock().unwrap().urls.push(url.to_string());
        if let Some(message) = &self.refuse {
            return Err(ClientError::new(message));
        }
        Ok(Box::new(FakeSqlClient {
            rules: self.rules.clone(),
            log: self.log.clone(),
        }))
    }
}

struct FakeSqlClient {
    rules: Arc<Vec<SqlRule>>,
    log: Arc<Mutex<SqlLog>>,
}

#[async_trait]
impl SqlClient for FakeSqlClient {
    async fn query(&self, sql: &str, params: &[&str]) -> ClientResult<Vec<Record>> {
        self.log.lock().unwrap().queries.push((
            sql.to_string(),
            params.iter().map(|p| p.to_string()).collect(),
        ));
        let rule = self.rules.iter().find(|rule| {
            sql.contains(&rule.needle)
                && rule
                    .param
                    .as_deref()
                    .map_or(true, |p| params.contains(&p))
        });
        match rule {
            Some(rule) => rule.result.clone().map_err(ClientError),
            None => Ok(Vec::new()),
        }
    }

    async fn close(&self) {
        self.log.lock().unwrap().closed += 1;
    }
}

// ============== Documents ==============

#[derive(Clone)]
pub struct FakeCollection {
    pub name: String,
    pub count: Result<u64, String>,
    pub sample: Result<Option<Value>, String>,
}

impl FakeCollection {
    pub fn new(name: &str, count: u64, sample: Option<Value>) -> Self {
        Self {
            name: name.to_string(),
            count: Ok(count),
            sample: Ok(sample),
        }
    }
}

#[derive(Default)]
pub struct FakeDocs {
    database: String,
    collections: Vec<FakeCollection>,
    list_error: Option<String>,
    refuse: Option<String>,
    closed: Arc<Mutex<usize>>,
}

impl FakeDocs {
    pub fn new(database: &str, collections: Vec<FakeCollection>) -> Self {
        Self {
            database: database.to_string(),
            collections,
            ..Self::default()
        }
    }

    pub fn refusing(message: &str) -> Self {
        Self {
            refuse: Some(message.to_string()),
            ..Self::default()
        }
    }

    pub fn failing_listing(mut self, message: &str) -> Self {
        self.list_error = Some(message.to_string());
        self
    }

    pub fn close_count(&self) -> usize {
        *self.closed.lock().unwrap()
    }
}

#[async_trait]
impl DocumentConnector for FakeDocs {
    async fn connect(&self, _uri: &str) -> ClientResult<Box<dyn DocumentClient>> {
        if let Some(message) = &self.refuse {
            return Err(ClientError::new(message));
        }
        Ok(Box::new(FakeDocsClient {
            database: self.database.clone(),
            collections: self.collections.clone(),
            list_error: self.list_error.clone(),
            closed: self.closed.clone(),
        }))
    }
}

struct FakeDocsClient {
    database: String,
    collections: Vec<FakeCollection>,
    list_error: Option<String>,
    closed: Arc<Mutex<usize>>,
}

impl FakeDocsClient {
    fn collection(&self, name: &str) -> ClientResult<&FakeCollection> {
        self.collections
            .iter()
            .find(|c| c.name == name)
            .ok_or_else(|| ClientError::new(format!("ns not found: {name}")))
    }
}

#[async_trait]
impl DocumentClient for FakeDocsClient {
    fn database_name(&self) -> &str {
        &self.database
    }

    async fn list_collections(&self) -> ClientResult<Vec<String>> {
        match &self.list_error {
            Some(message) => Err(ClientError::new(message)),
            None => Ok(self.collections.iter().map(|c| c.name.clone()).collect()),
        }
    }

    async fn count_documents(&self, collection: &str) -> ClientResult<u64> {
        self.collection(collection)?.count.clone().map_err(ClientError)
    }

    async fn find_one(&self, collection: &str) -> ClientResult<Option<Record>> {
        let sample = self.collection(collection)?.sample.clone().map_err(ClientError)?;
        Ok(sample.map(record))
    }

    async fn close(&self) {
        *self.closed.lock().unwrap() += 1;
    }
}

// ============== HTTP ==============

#[derive(Debug, Clone)]
pub struct SentRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub timeout: Duration,
}

/// Serves canned responses by exact URL; any other URL is a transport error.
#[derive(Default)]
pub struct FakeHttp {
    responses: HashMap<String, ClientResult<HttpResponse>>,
    sent: Mutex<Vec<SentRequest>>,
}

impl FakeHttp {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(mut self, url: &str, status: u16, body: Value) -> Self {
        self.responses
            .insert(url.to_string(), Ok(HttpResponse { status, body }));
        self
    }

    pub fn fail(mut self, url: &str, message: &str) -> Self {
        self.responses
            .insert(url.to_string(), Err(ClientError::new(message)));
        self
    }

    pub fn sent(&self) -> Vec<SentRequest> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl HttpFetcher for FakeHttp {
    async fn get(
        &self,
        url: &str,
        headers: &[(String, String)],
        timeout: Duration,
    ) -> ClientResult<HttpResponse> {
        self.sent.lock().unwrap().push(SentRequest {
            url: url.to_string(),
            headers: headers.to_vec(),
            timeout,
        });
        self.responses
            .get(url)
            .cloned()
            .unwrap_or_else(|| Err(ClientError::new(format!("connection refused: {url}"))))
    }
}
