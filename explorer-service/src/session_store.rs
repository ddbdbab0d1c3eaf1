//! In-memory session/context store.
//!
//! Holds one entry per successful exploration until it is deleted or the
//! process exits. No TTL and no eviction.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;

use common::models::{BackendKind, Credentials, SchemaDescription, SessionContext, SessionSummary};
use common::utils::IdGenerator;

#[derive(Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, SessionContext>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a finished exploration and returns its session id.
    pub async fn create(
        &self,
        connection_string: String,
        backend_kind: BackendKind,
        schema: SchemaDescription,
        config: Credentials,
    ) -> String {
        let session_id = IdGenerator::session_id();
        let now = Utc::now();
        let context = SessionContext {
            session_id: session_id.clone(),
            connection_string,
            backend_kind,
            schema: Arc::new(schema),
            config,
            created_at: now,
            last_accessed: now,
        };
        self.sessions.write().await.insert(session_id.clone(), context);

        tracing::info!(session_id = %session_id, kind = %backend_kind, "session created");
        session_id
    }

    /// Returns a snapshot of the context and bumps its `last_accessed`.
    pub async fn get(&self, session_id: &str) -> Option<SessionContext> {
        let mut sessions = self.sessions.write().await;
        let context = sessions.get_mut(session_id)?;
        // Wall clock can step backwards; access time never does.
        context.last_accessed = context.last_accessed.max(Utc::now());
        Some(context.clone())
    }

    pub async fn exists(&self, session_id: &str) -> bool {
        self.sessions.read().await.contains_key(session_id)
    }

    pub async fn delete(&self, session_id: &str) -> bool {
        let removed = self.sessions.write().await.remove(session_id).is_some();
        if removed {
            tracing::info!(session_id = %session_id, "session closed");
        }
        removed
    }

    /// Summaries ordered by creation time.
    pub async fn list(&self) -> Vec<SessionSummary> {
        let sessions = self.sessions.read().await;
        let mut summaries: Vec<SessionSummary> = sessions.values().map(SessionSummary::from).collect();
        summaries.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.session_id.cmp(&b.session_id))
        });
        summaries
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::models::{SchemaPayload, TableDescription};

    fn schema() -> SchemaDescription {
        SchemaDescription::new(
            BackendKind::Document,
            SchemaPayload::Flat {
                tables: vec![TableDescription::new("users", vec![])],
            },
        )
    }

    #[tokio::test]
    async fn test_create_then_get() {
        let store = SessionStore::new();
        let id = store
            .create(
                "mongodb://localhost/app".into(),
                BackendKind::Document,
                schema(),
                Credentials::default(),
            )
            .await;
        assert!(id.starts_with("session_"));
        assert!(store.exists(&id).await);

        let first = store.get(&id).await.unwrap();
        assert!(first.last_accessed >= first.created_at);
        assert_eq!(first.connection_string, "mongodb://localhost/app");
        assert!(first.schema.find_table("users").is_some());

        let second = store.get(&id).await.unwrap();
        assert!(second.last_accessed >= first.last_accessed);
        assert_eq!(second.created_at, first.created_at);
    }

    #[tokio::test]
    async fn test_missing_and_deleted_sessions() {
        let store = SessionStore::new();
        assert!(store.get("session_0_abc").await.is_none());
        assert!(!store.delete("session_0_abc").await);

        let id = store
            .create("x".into(), BackendKind::Document, schema(), Credentials::default())
            .await;
        assert!(store.delete(&id).await);
        assert!(!store.exists(&id).await);
        assert!(store.get(&id).await.is_none());
    }

    #[tokio::test]
    async fn test_list_is_ordered_and_hides_secrets() {
        let store = SessionStore::new();
        let a = store
            .create("a".into(), BackendKind::Document, schema(), Credentials::api_key("k"))
            .await;
        let b = store
            .create("b".into(), BackendKind::GenericRest, schema(), Credentials::default())
            .await;

        let list = store.list().await;
        assert_eq!(list.len(), 2);
        let ids: Vec<_> = list.iter().map(|s| s.session_id.clone()).collect();
        assert!(ids.contains(&a) && ids.contains(&b));
        assert!(list[0].created_at <= list[1].created_at);
        assert!(!serde_json::to_string(&list).unwrap().contains("\"k\""));
    }

    #[tokio::test]
    async fn test_concurrent_creates_and_deletes() {
        let store = Arc::new(SessionStore::new());
        let creates: Vec<_> = (0..50)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move {
                    store
                        .create(format!("cs{i}"), BackendKind::Document, schema(), Credentials::default())
                        .await
                })
            })
            .collect();
        let mut ids = Vec::new();
        for handle in creates {
            ids.push(handle.await.unwrap());
        }
        assert_eq!(store.len().await, 50);

        let deletes: Vec<_> = ids
            .iter()
            .take(25)
            .cloned()
            .map(|id| {
                let store = store.clone();
                tokio::spawn(async move {
                    let read = store.get(&id).await;
                    let deleted = store.delete(&id).await;
                    (read.is_some(), deleted)
                })
            })
            .collect();
        for handle in deletes {
            assert_eq!(handle.await.unwrap(), (true, true));
        }
        assert_eq!(store.len().await, 25);
    }
}
