//! Saved connection registry.
//!
//! A single JSON object keyed by connection id. Every operation reads the
//! whole file; every mutation rewrites it through a temp file and a rename.
//! A mutex serializes load-modify-store cycles within the process.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tokio::sync::Mutex;

use common::errors::{AppError, AppResult};
use common::models::{Connection, ConnectionSummary};
use common::utils::IdGenerator;

type Entries = BTreeMap<String, Connection>;

pub struct ConnectionRegistry {
    path: PathBuf,
    lock: Mutex<()>,
}

impl ConnectionRegistry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Saves a connection and returns its id.
    pub async fn add(&self, name: &str, connection_string: &str, metadata: Value) -> AppResult<String> {
        let _guard = self.lock.lock().await;
        let mut entries = self.load().await?;

        let id = unique_id(&entries, IdGenerator::connection_id());
        let connection = Connection::new(
            id.clone(),
            name.to_string(),
            connection_string.to_string(),
            metadata,
        );
        entries.insert(id.clone(), connection);
        self.store(&entries).await?;

        tracing::info!(id = %id, name = %name, "connection saved");
        Ok(id)
    }

    /// Entry with its raw connection string.
    pub async fn get(&self, id: &str) -> AppResult<Option<Connection>> {
        let _guard = self.lock.lock().await;
        Ok(self.load().await?.remove(id))
    }

    /// Entry whose connection string is replaced by the masked form.
    pub async fn get_masked(&self, id: &str) -> AppResult<Option<Connection>> {
        Ok(self.get(id).await?.map(|conn| conn.masked()))
    }

    /// Masked summaries, oldest first.
    pub async fn list(&self) -> AppResult<Vec<ConnectionSummary>> {
        let _guard = self.lock.lock().await;
        let entries = self.load().await?;
        let mut summaries: Vec<ConnectionSummary> =
            entries.values().map(ConnectionSummary::from).collect();
        summaries.sort_by(|a, b| a.saved_at.cmp(&b.saved_at).then_with(|| a.id.cmp(&b.id)));
        Ok(summaries)
    }

    /// Removes an entry. Returns whether it existed.
    pub async fn delete(&self, id: &str) -> AppResult<bool> {
        let _guard = self.lock.lock().await;
        let mut entries = self.load().await?;
        if entries.remove(id).is_none() {
            return Ok(false);
        }
        self.store(&entries).await?;
        tracing::info!(id = %id, "connection deleted");
        Ok(true)
    }

    pub async fn count(&self) -> AppResult<usize> {
        let _guard = self.lock.lock().await;
        Ok(self.load().await?.len())
    }

    async fn load(&self) -> AppResult<Entries> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Entries::new()),
            Err(e) => return Err(storage_error(&self.path, e)),
        };
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Entries::new());
        }
        serde_json::from_slice(&bytes).map_err(|e| storage_error(&self.path, e))
    }

    async fn store(&self, entries: &Entries) -> AppResult<()> {
        let json = serde_json::to_vec_pretty(entries).map_err(|e| storage_error(&self.path, e))?;
        let tmp = temp_path(&self.path);
        tokio::fs::write(&tmp, json)
            .await
            .map_err(|e| storage_error(&tmp, e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| storage_error(&self.path, e))
    }
}

/// `conn_<millis>`, bumping the millis until the id is free.
fn unique_id(entries: &Entries, candidate: String) -> String {
    if !entries.contains_key(&candidate) {
        return candidate;
    }
    let mut millis: i64 = candidate
        .trim_start_matches("conn_")
        .parse()
        .unwrap_or_default();
    loop {
        millis += 1;
        let id = format!("conn_{millis}");
        if !entries.contains_key(&id) {
            return id;
        }
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

fn storage_error(path: &Path, err: impl std::fmt::Display) -> AppError {
    AppError::Storage(format!("{}: {}", path.display(), err))
}
