//! 结构探索服务模块
//!
//! Facade over the drivers, the session store and the saved-connection
//! registry. Explorations run without holding any store lock; the session
//! store is touched once, with the finished description.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use validator::Validate;

use common::errors::{AppError, AppResult};
use common::models::{
    BackendKind, Connection, ConnectionSummary, Credentials, SaveConnectionRequest,
    SchemaDescription, SessionContext, SessionSummary, TableDescription,
};

use crate::explorer::{Exploration, ExplorerSet};
use crate::registry::ConnectionRegistry;
use crate::session_store::SessionStore;
use crate::state::AppState;

/// A session created from a successful exploration.
#[derive(Debug, Clone)]
pub struct OpenedSession {
    pub session_id: String,
    pub backend_kind: BackendKind,
}

/// 结构探索服务 Trait
#[async_trait]
pub trait ExplorationServiceTrait: Send + Sync {
    /// 识别连接串对应的后端类型
    fn detect(&self, connection_string: &str) -> BackendKind;

    /// 测试连接（不创建会话），返回延迟毫秒数
    async fn check_connection(&self, connection_string: &str, credentials: &Credentials)
        -> AppResult<(BackendKind, u64)>;

    /// 探索并创建会话
    async fn open_session(
        &self,
        connection_string: &str,
        credentials: Credentials,
    ) -> AppResult<OpenedSession>;

    /// 使用已保存的连接创建会话
    async fn open_saved(&self, connection_id: &str) -> AppResult<OpenedSession>;

    /// 获取会话上下文
    async fn context(&self, session_id: &str) -> AppResult<SessionContext>;

    /// 在会话结构中查找表
    async fn find_table(&self, session_id: &str, table_name: &str) -> AppResult<TableDescription>;

    /// 关闭会话
    async fn close_session(&self, session_id: &str) -> AppResult<()>;

    /// 列出活跃会话
    async fn list_sessions(&self) -> Vec<SessionSummary>;

    /// 保存连接
    async fn save_connection(&self, req: SaveConnectionRequest) -> AppResult<String>;

    /// 列出已保存的连接（已脱敏）
    async fn list_connections(&self) -> AppResult<Vec<ConnectionSummary>>;

    /// 获取已保存的连接
    async fn get_connection(&self, id: &str, masked: bool) -> AppResult<Connection>;

    /// 删除已保存的连接
    async fn delete_connection(&self, id: &str) -> AppResult<()>;

    /// 推断任意 REST 接口结构（不创建会话）
    async fn infer_rest(&self, url: &str) -> AppResult<SchemaDescription>;
}

pub struct ExplorationService {
    explorers: Arc<ExplorerSet>,
    sessions: Arc<SessionStore>,
    registry: Arc<ConnectionRegistry>,
}

impl ExplorationService {
    pub fn new(
        explorers: Arc<ExplorerSet>,
        sessions: Arc<SessionStore>,
        registry: Arc<ConnectionRegistry>,
    ) -> Self {
        Self {
            explorers,
            sessions,
            registry,
        }
    }

    pub fn from_state(state: &AppState) -> Self {
        Self::new(
            state.explorers.clone(),
            state.sessions.clone(),
            state.registry.clone(),
        )
    }

    async fn explore(
        &self,
        connection_string: &str,
        credentials: &Credentials,
    ) -> AppResult<(BackendKind, Exploration)> {
        let kind = BackendKind::detect(connection_string);
        let explorer = self.explorers.get(kind)?;
        let exploration = explorer.explore(connection_string, credentials).await?;
        if !exploration.warnings.is_empty() {
            tracing::warn!(
                kind = %kind,
                warnings = exploration.warnings.len(),
                "exploration completed with degraded fields"
            );
        }
        Ok((kind, exploration))
    }
}

#[async_trait]
impl ExplorationServiceTrait for ExplorationService {
    fn detect(&self, connection_string: &str) -> BackendKind {
        BackendKind::detect(connection_string)
    }

    async fn check_connection(
        &self,
        connection_string: &str,
        credentials: &Credentials,
    ) -> AppResult<(BackendKind, u64)> {
        let kind = BackendKind::detect(connection_string);
        let explorer = self.explorers.get(kind)?;
        let started = Instant::now();
        explorer.check_connection(connection_string, credentials).await?;
        let latency_ms = started.elapsed().as_millis() as u64;
        tracing::info!(kind = %kind, latency_ms, "连接测试成功");
        Ok((kind, latency_ms))
    }

    async fn open_session(
        &self,
        connection_string: &str,
        credentials: Credentials,
    ) -> AppResult<OpenedSession> {
        let (backend_kind, exploration) = self.explore(connection_string, &credentials).await?;
        let session_id = self
            .sessions
            .create(
                connection_string.to_string(),
                backend_kind,
                exploration.description,
                credentials,
            )
            .await;
        Ok(OpenedSession {
            session_id,
            backend_kind,
        })
    }

    async fn open_saved(&self, connection_id: &str) -> AppResult<OpenedSession> {
        let connection = self
            .registry
            .get(connection_id)
            .await?
            .ok_or_else(|| AppError::ConnectionNotFound(connection_id.to_string()))?;
        tracing::info!(id = %connection_id, name = %connection.name, "使用已保存的连接");
        self.open_session(&connection.connection_string, Credentials::default())
            .await
    }

    async fn context(&self, session_id: &str) -> AppResult<SessionContext> {
        self.sessions
            .get(session_id)
            .await
            .ok_or_else(|| AppError::SessionNotFound(session_id.to_string()))
    }

    async fn find_table(&self, session_id: &str, table_name: &str) -> AppResult<TableDescription> {
        let context = self.context(session_id).await?;
        context
            .schema
            .find_table(table_name)
            .cloned()
            .ok_or_else(|| AppError::TableNotFound(table_name.to_string()))
    }

    async fn close_session(&self, session_id: &str) -> AppResult<()> {
        if !self.sessions.exists(session_id).await {
            return Err(AppError::SessionNotFound(session_id.to_string()));
        }
        if self.sessions.delete(session_id).await {
            Ok(())
        } else {
            Err(AppError::SessionNotFound(session_id.to_string()))
        }
    }

    async fn list_sessions(&self) -> Vec<SessionSummary> {
        self.sessions.list().await
    }

    async fn save_connection(&self, req: SaveConnectionRequest) -> AppResult<String> {
        req.validate()?;
        let metadata = req.metadata();
        self.registry
            .add(&req.name, &req.connection_string, metadata)
            .await
    }

    async fn list_connections(&self) -> AppResult<Vec<ConnectionSummary>> {
        self.registry.list().await
    }

    async fn get_connection(&self, id: &str, masked: bool) -> AppResult<Connection> {
        let found = if masked {
            self.registry.get_masked(id).await?
        } else {
            self.registry.get(id).await?
        };
        found.ok_or_else(|| AppError::ConnectionNotFound(id.to_string()))
    }

    async fn delete_connection(&self, id: &str) -> AppResult<()> {
        if self.registry.delete(id).await? {
            Ok(())
        } else {
            Err(AppError::ConnectionNotFound(id.to_string()))
        }
    }

    async fn infer_rest(&self, url: &str) -> AppResult<SchemaDescription> {
        let explorer = self.explorers.get(BackendKind::GenericRest)?;
        let exploration = explorer.explore(url, &Credentials::default()).await?;
        Ok(exploration.description)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::explorer::testing::{FakeHttp, FakeSql};
    use crate::explorer::{PostgresExplorer, RestExplorer};
    use serde_json::json;
    use std::time::Duration;

    const REST_URL: &str = "https://api.example.com/items";

    fn service() -> ExplorationService {
        let sql = FakeSql::new()
            .on("information_schema.schemata", vec![json!({"schema_name": "public"})])
            .on("information_schema.tables", vec![json!({"table_name": "users"})])
            .on("COUNT(*)", vec![json!({"count": 2})]);
        let http = FakeHttp::new().respond(REST_URL, 200, json!([{"id": 1, "title": "a"}]));
        let explorers = ExplorerSet::new()
            .register(PostgresExplorer::new(Arc::new(sql)))
            .register(RestExplorer::new(Arc::new(http), Duration::from_secs(5)));
        let path = std::env::temp_dir().join(format!("svc-{}.json", uuid::Uuid::new_v4()));
        ExplorationService::new(
            Arc::new(explorers),
            Arc::new(SessionStore::new()),
            Arc::new(ConnectionRegistry::new(path)),
        )
    }

    #[tokio::test]
    async fn test_session_lifecycle() {
        let service = service();
        let opened = service
            .open_session("postgres://user:pw@host/db", Credentials::default())
            .await
            .unwrap();
        assert_eq!(opened.backend_kind, BackendKind::RelationalA);

        let context = service.context(&opened.session_id).await.unwrap();
        assert_eq!(context.schema.statistics().total_tables, Some(1));
        assert_eq!(
            service.find_table(&opened.session_id, "users").await.unwrap().row_count,
            2
        );
        assert!(matches!(
            service.find_table(&opened.session_id, "nope").await,
            Err(AppError::TableNotFound(_))
        ));
        assert_eq!(service.list_sessions().await.len(), 1);

        service.close_session(&opened.session_id).await.unwrap();
        assert!(matches!(
            service.context(&opened.session_id).await,
            Err(AppError::SessionNotFound(_))
        ));
        assert!(matches!(
            service.close_session(&opened.session_id).await,
            Err(AppError::SessionNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_unsupported_kinds_create_nothing() {
        let service = service();
        let err = service
            .open_session("redis://localhost", Credentials::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::UnsupportedBackend(BackendKind::Unknown)));

        let err = service
            .open_session("mongodb://localhost/app", Credentials::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::UnsupportedBackend(BackendKind::Document)));
        assert!(service.list_sessions().await.is_empty());
    }

    #[tokio::test]
    async fn test_saved_connection_flow() {
        let service = service();
        let id = service
            .save_connection(SaveConnectionRequest {
                name: "pg".into(),
                connection_string: "postgres://u:p@h/db?password=hunter2".into(),
                db_type: None,
            })
            .await
            .unwrap();

        let masked = service.get_connection(&id, true).await.unwrap();
        assert!(!masked.connection_string.contains("hunter2"));
        let raw = service.get_connection(&id, false).await.unwrap();
        assert!(raw.connection_string.contains("hunter2"));
        assert_eq!(raw.metadata, json!({"dbType": "PostgreSQL"}));

        let opened = service.open_saved(&id).await.unwrap();
        assert_eq!(opened.backend_kind, BackendKind::RelationalA);

        service.delete_connection(&id).await.unwrap();
        assert!(matches!(
            service.open_saved(&id).await,
            Err(AppError::ConnectionNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_invalid_save_request() {
        let err = service()
            .save_connection(SaveConnectionRequest {
                name: String::new(),
                connection_string: "postgres://h/db".into(),
                db_type: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_check_connection_and_rest_inference() {
        let service = service();
        let (kind, _latency) = service
            .check_connection("postgres://host/db", &Credentials::default())
            .await
            .unwrap();
        assert_eq!(kind, BackendKind::RelationalA);

        let description = service.infer_rest(REST_URL).await.unwrap();
        assert_eq!(description.statistics().total_endpoints, Some(1));
        assert!(service.list_sessions().await.is_empty());
    }
}
