//! 数据库结构探索服务
//!
//! 提供多后端结构探索与会话管理功能，包括：
//! - 连接串类型识别与连接测试
//! - PostgreSQL / MySQL / MongoDB / Firestore / Supabase / REST 结构探索
//! - 探索结果会话管理
//! - 已保存连接管理

mod clients;
mod explorer;
mod handlers;
mod registry;
mod routes;
mod service;
mod session_store;
mod state;

use axum::{middleware, routing::get, Json, Router};
use common::config::{load_dotenv, AppConfig};
use common::middleware::request_id::request_id_middleware;
use state::AppState;
use tokio::net::TcpListener;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;

const SERVICE_NAME: &str = "explorer-service";

#[derive(OpenApi)]
#[openapi(
    info(
        title = "结构探索服务 API",
        version = "0.1.0",
        description = "多后端数据库结构探索与会话管理微服务"
    ),
    paths(
        handlers::detect,
        handlers::test_connection,
        handlers::confirm,
        handlers::current_context,
        handlers::list_contexts,
        handlers::explore,
        handlers::explore_table,
        handlers::close_context,
        handlers::save_connection,
        handlers::list_connections,
        handlers::get_connection,
        handlers::delete_connection,
        handlers::use_saved_connection,
        handlers::infer_rest,
        handlers::health_check,
    ),
    components(schemas(
        common::models::BackendKind,
        common::models::ColumnDescription,
        common::models::ConnectionStatus,
        common::models::EndpointDescription,
        common::models::FieldDescription,
        common::models::ForeignKey,
        common::models::IndexDescription,
        common::models::InferredType,
        common::models::ResponseShape,
        common::models::SchemaDescription,
        common::models::SchemaGroup,
        common::models::SchemaPayload,
        common::models::Statistics,
        common::models::TableDescription,
        common::models::Connection,
        common::models::ConnectionSummary,
        common::models::SaveConnectionRequest,
        common::models::SessionSummary,
        common::models::SessionView,
        handlers::ConnectionStringRequest,
        handlers::RestRequest,
        handlers::DetectResponse,
        handlers::ConnectionTestResult,
        handlers::SessionCreated,
        handlers::CurrentContext,
        handlers::ContextList,
        handlers::ExploreResult,
        handlers::SavedConnection,
        handlers::ConnectionList,
        handlers::HealthResponse,
    )),
    tags(
        (name = "detection", description = "类型识别与连接测试端点"),
        (name = "sessions", description = "探索会话端点"),
        (name = "connections", description = "已保存连接端点"),
        (name = "health", description = "健康检查端点")
    )
)]
struct ApiDoc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file (if present) before anything else
    load_dotenv();

    // 初始化日志追踪
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    // 加载配置
    let config = AppConfig::load_with_service(SERVICE_NAME);

    // 创建应用状态
    let state = AppState::new(config.clone())?;
    info!(
        file = %state.registry.path().display(),
        kinds = state.explorers.kinds().len(),
        "已加载探索驱动与连接存储"
    );

    // 创建路由
    let app = create_router(state);

    // 启动服务
    let addr = config.bind_address();
    info!(service = SERVICE_NAME, address = %addr, "启动服务");

    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(routes::router())
        .route("/api-docs/openapi.json", get(openapi_json))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(cors)
        .with_state(state)
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::explorer::testing::{FakeHttp, FakeSql};
    use crate::explorer::{ExplorerSet, PostgresExplorer, RestExplorer};

    const REST_URL: &str = "https://api.example.com/todos";

    fn test_state() -> AppState {
        let config = AppConfig {
            connections_file: std::env::temp_dir()
                .join(format!("router-{}.json", uuid::Uuid::new_v4())),
            ..AppConfig::default()
        };
        let sql = FakeSql::new()
            .on("information_schema.schemata", vec![json!({"schema_name": "public"})])
            .on("information_schema.tables", vec![json!({"table_name": "users"})])
            .on(
                "information_schema.columns",
                vec![json!({"column_name": "id", "data_type": "integer", "is_nullable": "NO"})],
            )
            .on("COUNT(*)", vec![json!({"count": 3})]);
        let http = FakeHttp::new().respond(REST_URL, 200, json!([{"id": 1, "done": false}]));
        let explorers = ExplorerSet::new()
            .register(PostgresExplorer::new(Arc::new(sql)))
            .register(RestExplorer::new(Arc::new(http), Duration::from_secs(5)));
        AppState::with_explorers(config, explorers)
    }

    async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(req).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn post(uri: &str, body: Value) -> Request<Body> {
        Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::get(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_health_reports_counts() {
        let app = create_router(test_state());
        let response = app.clone().oneshot(get("/api/health")).await.unwrap();
        assert!(response.headers().contains_key("x-request-id"));

        let request = Request::get("/api/health")
            .header("x-request-id", "req-42")
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.headers()["x-request-id"], "req-42");

        let (status, body) = send(&app, get("/api/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["sessions"], 0);
        assert_eq!(body["savedConnections"], 0);
    }

    #[tokio::test]
    async fn test_detect_masks_secret() {
        let app = create_router(test_state());
        let (status, body) = send(
            &app,
            post(
                "/api/database/detect",
                json!({"connectionString": "mysql://db/shop?user=root&password=hunter2"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["dbType"], "MySQL");
        assert!(!body["data"]["connectionString"]
            .as_str()
            .unwrap()
            .contains("hunter2"));

        let (status, body) = send(
            &app,
            post("/api/database/detect", json!({"connectionString": ""})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_confirm_then_browse_session() {
        let app = create_router(test_state());
        let (status, body) = send(
            &app,
            post(
                "/api/database/confirm",
                json!({"connectionString": "postgresql://app:pw@db:5432/main"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["dbType"], "PostgreSQL");
        let session_id = body["data"]["sessionId"].as_str().unwrap().to_string();

        let request = Request::get("/api/database/context/current")
            .header("x-db-session", &session_id)
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["sessionId"], session_id);

        let (status, body) = send(
            &app,
            get(&format!("/api/database/context/current?sessionId={session_id}")),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["sessionId"], session_id);

        let (status, body) = send(&app, get(&format!("/api/database/explore/{session_id}"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["schema"]["statistics"]["totalTables"], 1);

        let (status, body) = send(
            &app,
            get(&format!("/api/database/explore/table/{session_id}/users")),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["rowCount"], 3);

        let (_, body) = send(&app, get("/api/database/contexts")).await;
        assert_eq!(body["data"]["count"], 1);

        let request = Request::delete(format!("/api/database/context/{session_id}"))
            .body(Body::empty())
            .unwrap();
        let (status, _) = send(&app, request).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = send(&app, get(&format!("/api/database/explore/{session_id}"))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "SESSION_NOT_FOUND");
    }

    #[tokio::test]
    async fn test_session_lookup_errors() {
        let app = create_router(test_state());
        let (status, body) = send(&app, get("/api/database/context/current")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

        let (status, _) = send(&app, get("/api/database/explore/session_0_missing")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = send(
            &app,
            post("/api/database/confirm", json!({"connectionString": "redis://localhost"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "UNSUPPORTED_BACKEND");
        assert_eq!(body["error"]["details"]["dbType"], "Unknown");
    }

    #[tokio::test]
    async fn test_saved_connection_endpoints() {
        let state = test_state();
        let file = state.registry.path().to_path_buf();
        let app = create_router(state);

        let (status, body) = send(
            &app,
            post(
                "/api/database/save-connection",
                json!({"name": "main", "connectionString": "postgres://db/main?user=app&password=s3cret"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let id = body["data"]["id"].as_str().unwrap().to_string();

        let (_, body) = send(&app, get("/api/database/list-connections")).await;
        assert_eq!(body["data"]["count"], 1);
        assert!(!body.to_string().contains("s3cret"));

        let (_, body) = send(&app, get(&format!("/api/database/get-connection/{id}"))).await;
        assert_eq!(body["data"]["connectionString"], "postgres://db/main?user=app&password=s3cret");
        let (_, body) = send(
            &app,
            get(&format!("/api/database/get-connection/{id}?masked=true")),
        )
        .await;
        assert!(!body.to_string().contains("s3cret"));

        let request = Request::post(format!("/api/database/use-saved-connection/{id}"))
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["dbType"], "PostgreSQL");

        let request = Request::delete(format!("/api/database/delete-connection/{id}"))
            .body(Body::empty())
            .unwrap();
        let (status, _) = send(&app, request).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = send(&app, get(&format!("/api/database/get-connection/{id}"))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "CONNECTION_NOT_FOUND");
        let _ = std::fs::remove_file(file);
    }

    #[tokio::test]
    async fn test_check_connection_and_rest_inference() {
        let app = create_router(test_state());
        let (status, body) = send(
            &app,
            post("/api/database/test", json!({"connectionString": "postgres://db/main"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["success"], true);

        let (status, body) = send(
            &app,
            post("/api/database/test", json!({"connectionString": "redis://localhost"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["success"], false);
        assert!(body["data"]["error"].is_string());

        let (status, body) = send(&app, post("/api/database/rest", json!({"url": REST_URL}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["statistics"]["totalEndpoints"], 1);

        let (_, body) = send(&app, get("/api/database/contexts")).await;
        assert_eq!(body["data"]["count"], 0);
    }

    #[tokio::test]
    async fn test_openapi_document_is_served() {
        let app = create_router(test_state());
        let (status, body) = send(&app, get("/api-docs/openapi.json")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["paths"]["/api/database/confirm"].is_object());
    }
}
