//! Handler模块

use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use common::errors::{AppError, AppResult};
use common::models::{
    BackendKind, Connection, ConnectionSummary, Credentials, SaveConnectionRequest,
    SchemaDescription, SessionSummary, SessionView, TableDescription,
};
use common::response::ApiResponse;
use common::utils::mask_password;

use crate::service::{ExplorationService, ExplorationServiceTrait};
use crate::state::AppState;

/// Header carrying the session id for context lookups.
pub const SESSION_HEADER: &str = "x-db-session";

/// 连接串请求体
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionStringRequest {
    /// 连接串或 URL
    #[validate(length(min = 1, message = "Missing connectionString"))]
    pub connection_string: String,
    /// Firebase / Supabase API key
    pub api_key: Option<String>,
}

impl ConnectionStringRequest {
    fn credentials(&self) -> Credentials {
        Credentials {
            api_key: self.api_key.clone(),
        }
    }
}

/// REST 推断请求体
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RestRequest {
    #[validate(length(min = 1, message = "Missing URL"))]
    pub url: String,
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct SessionQuery {
    /// 会话 ID（未提供 X-DB-Session 头时使用）
    pub session_id: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ConnectionQuery {
    /// 返回脱敏后的连接串
    #[serde(default)]
    pub masked: bool,
}

/// 类型识别结果
#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DetectResponse {
    pub db_type: BackendKind,
    /// 脱敏后的连接串
    pub connection_string: String,
}

/// 连接测试结果
#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionTestResult {
    pub db_type: BackendKind,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// 会话创建结果
#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SessionCreated {
    pub session_id: String,
    pub db_type: BackendKind,
    pub message: String,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CurrentContext {
    pub session_id: String,
    pub context: SessionView,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ContextList {
    pub active_contexts: Vec<SessionSummary>,
    pub count: usize,
}

/// 会话中的完整结构
#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExploreResult {
    pub session_id: String,
    pub db_type: BackendKind,
    pub schema: SchemaDescription,
}

#[derive(Serialize, ToSchema)]
pub struct SavedConnection {
    pub id: String,
    pub message: String,
}

#[derive(Serialize, ToSchema)]
pub struct ConnectionList {
    pub connections: Vec<ConnectionSummary>,
    pub count: usize,
}

/// 健康检查响应
#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    pub timestamp: DateTime<Utc>,
    /// 活跃会话数
    pub sessions: usize,
    /// 已保存连接数
    pub saved_connections: usize,
}

/// Session id from the `X-DB-Session` header, else the `sessionId` query parameter.
pub fn resolve_session_id(headers: &HeaderMap, query: &SessionQuery) -> AppResult<String> {
    headers
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(String::from)
        .or_else(|| query.session_id.clone().filter(|v| !v.is_empty()))
        .ok_or_else(|| {
            AppError::Validation(
                "Missing session ID: provide it via X-DB-Session header or sessionId query param"
                    .to_string(),
            )
        })
}

/// 识别数据库类型
#[utoipa::path(
    post,
    path = "/api/database/detect",
    tag = "detection",
    request_body = ConnectionStringRequest,
    responses(
        (status = 200, description = "识别结果", body = ApiResponse<DetectResponse>),
        (status = 400, description = "缺少连接串")
    )
)]
pub async fn detect(
    State(state): State<AppState>,
    Json(req): Json<ConnectionStringRequest>,
) -> Result<Json<ApiResponse<DetectResponse>>, AppError> {
    req.validate()?;
    let service = ExplorationService::from_state(&state);
    let data = DetectResponse {
        db_type: service.detect(&req.connection_string),
        connection_string: mask_password(&req.connection_string),
    };
    Ok(Json(ApiResponse::ok_with_service(data, state.config.service_name)))
}

/// 测试连接（不创建会话）
#[utoipa::path(
    post,
    path = "/api/database/test",
    tag = "detection",
    request_body = ConnectionStringRequest,
    responses(
        (status = 200, description = "连接测试结果", body = ApiResponse<ConnectionTestResult>)
    )
)]
pub async fn test_connection(
    State(state): State<AppState>,
    Json(req): Json<ConnectionStringRequest>,
) -> Result<Json<ApiResponse<ConnectionTestResult>>, AppError> {
    req.validate()?;
    let service = ExplorationService::from_state(&state);
    let db_type = service.detect(&req.connection_string);
    let result = match service.check_connection(&req.connection_string, &req.credentials()).await {
        Ok((_, latency_ms)) => ConnectionTestResult {
            db_type,
            success: true,
            latency_ms: Some(latency_ms),
            error: None,
        },
        Err(e) => ConnectionTestResult {
            db_type,
            success: false,
            latency_ms: None,
            error: Some(e.to_string()),
        },
    };
    Ok(Json(ApiResponse::ok_with_service(result, state.config.service_name)))
}

/// 测试连接、探索结构并创建会话
#[utoipa::path(
    post,
    path = "/api/database/confirm",
    tag = "sessions",
    request_body = ConnectionStringRequest,
    responses(
        (status = 200, description = "会话已创建", body = ApiResponse<SessionCreated>),
        (status = 400, description = "不支持的类型或无效 URL"),
        (status = 502, description = "连接失败")
    )
)]
pub async fn confirm(
    State(state): State<AppState>,
    Json(req): Json<ConnectionStringRequest>,
) -> Result<Json<ApiResponse<SessionCreated>>, AppError> {
    req.validate()?;
    let service = ExplorationService::from_state(&state);
    let opened = service
        .open_session(&req.connection_string, req.credentials())
        .await?;
    let data = SessionCreated {
        session_id: opened.session_id,
        db_type: opened.backend_kind,
        message: "Session created successfully".to_string(),
    };
    Ok(Json(ApiResponse::ok_with_service(data, state.config.service_name)))
}

/// 获取当前会话上下文
#[utoipa::path(
    get,
    path = "/api/database/context/current",
    tag = "sessions",
    params(
        SessionQuery,
        ("X-DB-Session" = Option<String>, Header, description = "会话 ID")
    ),
    responses(
        (status = 200, description = "会话上下文", body = ApiResponse<CurrentContext>),
        (status = 400, description = "缺少会话 ID"),
        (status = 404, description = "会话未找到")
    )
)]
pub async fn current_context(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<SessionQuery>,
) -> Result<Json<ApiResponse<CurrentContext>>, AppError> {
    let session_id = resolve_session_id(&headers, &query)?;
    let service = ExplorationService::from_state(&state);
    let context = service.context(&session_id).await?;
    let data = CurrentContext {
        session_id,
        context: SessionView::from(&context),
    };
    Ok(Json(ApiResponse::ok_with_service(data, state.config.service_name)))
}

/// 列出所有活跃会话
#[utoipa::path(
    get,
    path = "/api/database/contexts",
    tag = "sessions",
    responses(
        (status = 200, description = "会话列表", body = ApiResponse<ContextList>)
    )
)]
pub async fn list_contexts(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<ContextList>>, AppError> {
    let service = ExplorationService::from_state(&state);
    let active_contexts = service.list_sessions().await;
    let data = ContextList {
        count: active_contexts.len(),
        active_contexts,
    };
    Ok(Json(ApiResponse::ok_with_service(data, state.config.service_name)))
}

/// 获取会话中的完整结构
#[utoipa::path(
    get,
    path = "/api/database/explore/{session_id}",
    tag = "sessions",
    params(
        ("session_id" = String, Path, description = "会话 ID")
    ),
    responses(
        (status = 200, description = "完整结构", body = ApiResponse<ExploreResult>),
        (status = 404, description = "会话未找到")
    )
)]
pub async fn explore(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<ApiResponse<ExploreResult>>, AppError> {
    let service = ExplorationService::from_state(&state);
    let context = service.context(&session_id).await?;
    let data = ExploreResult {
        session_id,
        db_type: context.backend_kind,
        schema: context.schema.as_ref().clone(),
    };
    Ok(Json(ApiResponse::ok_with_service(data, state.config.service_name)))
}

/// 获取会话中指定表的详情
#[utoipa::path(
    get,
    path = "/api/database/explore/table/{session_id}/{table_name}",
    tag = "sessions",
    params(
        ("session_id" = String, Path, description = "会话 ID"),
        ("table_name" = String, Path, description = "表名")
    ),
    responses(
        (status = 200, description = "表详情", body = ApiResponse<TableDescription>),
        (status = 404, description = "会话或表未找到")
    )
)]
pub async fn explore_table(
    State(state): State<AppState>,
    Path((session_id, table_name)): Path<(String, String)>,
) -> Result<Json<ApiResponse<TableDescription>>, AppError> {
    let service = ExplorationService::from_state(&state);
    let table = service.find_table(&session_id, &table_name).await?;
    Ok(Json(ApiResponse::ok_with_service(table, state.config.service_name)))
}

/// 关闭会话
#[utoipa::path(
    delete,
    path = "/api/database/context/{session_id}",
    tag = "sessions",
    params(
        ("session_id" = String, Path, description = "会话 ID")
    ),
    responses(
        (status = 200, description = "会话已关闭", body = ApiResponse<bool>),
        (status = 404, description = "会话未找到")
    )
)]
pub async fn close_context(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<ApiResponse<bool>>, AppError> {
    let service = ExplorationService::from_state(&state);
    service.close_session(&session_id).await?;
    Ok(Json(ApiResponse::ok_with_service(true, state.config.service_name)))
}

/// 保存连接
#[utoipa::path(
    post,
    path = "/api/database/save-connection",
    tag = "connections",
    request_body = SaveConnectionRequest,
    responses(
        (status = 200, description = "连接已保存", body = ApiResponse<SavedConnection>),
        (status = 400, description = "参数校验失败")
    )
)]
pub async fn save_connection(
    State(state): State<AppState>,
    Json(req): Json<SaveConnectionRequest>,
) -> Result<Json<ApiResponse<SavedConnection>>, AppError> {
    let service = ExplorationService::from_state(&state);
    let id = service.save_connection(req).await?;
    let data = SavedConnection {
        id,
        message: "Connection saved".to_string(),
    };
    Ok(Json(ApiResponse::ok_with_service(data, state.config.service_name)))
}

/// 列出已保存的连接
#[utoipa::path(
    get,
    path = "/api/database/list-connections",
    tag = "connections",
    responses(
        (status = 200, description = "连接列表", body = ApiResponse<ConnectionList>)
    )
)]
pub async fn list_connections(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<ConnectionList>>, AppError> {
    let service = ExplorationService::from_state(&state);
    let connections = service.list_connections().await?;
    let data = ConnectionList {
        count: connections.len(),
        connections,
    };
    Ok(Json(ApiResponse::ok_with_service(data, state.config.service_name)))
}

/// 根据 ID 获取已保存的连接
#[utoipa::path(
    get,
    path = "/api/database/get-connection/{id}",
    tag = "connections",
    params(
        ("id" = String, Path, description = "连接 ID"),
        ConnectionQuery
    ),
    responses(
        (status = 200, description = "连接详情", body = ApiResponse<Connection>),
        (status = 404, description = "连接未找到")
    )
)]
pub async fn get_connection(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<ConnectionQuery>,
) -> Result<Json<ApiResponse<Connection>>, AppError> {
    let service = ExplorationService::from_state(&state);
    let data = service.get_connection(&id, query.masked).await?;
    Ok(Json(ApiResponse::ok_with_service(data, state.config.service_name)))
}

/// 删除已保存的连接
#[utoipa::path(
    delete,
    path = "/api/database/delete-connection/{id}",
    tag = "connections",
    params(
        ("id" = String, Path, description = "连接 ID")
    ),
    responses(
        (status = 200, description = "连接已删除", body = ApiResponse<bool>),
        (status = 404, description = "连接未找到")
    )
)]
pub async fn delete_connection(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<bool>>, AppError> {
    let service = ExplorationService::from_state(&state);
    service.delete_connection(&id).await?;
    Ok(Json(ApiResponse::ok_with_service(true, state.config.service_name)))
}

/// 使用已保存的连接创建会话
#[utoipa::path(
    post,
    path = "/api/database/use-saved-connection/{id}",
    tag = "connections",
    params(
        ("id" = String, Path, description = "连接 ID")
    ),
    responses(
        (status = 200, description = "会话已创建", body = ApiResponse<SessionCreated>),
        (status = 404, description = "连接未找到")
    )
)]
pub async fn use_saved_connection(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<SessionCreated>>, AppError> {
    let service = ExplorationService::from_state(&state);
    let opened = service.open_saved(&id).await?;
    let data = SessionCreated {
        session_id: opened.session_id,
        db_type: opened.backend_kind,
        message: "Saved connection loaded".to_string(),
    };
    Ok(Json(ApiResponse::ok_with_service(data, state.config.service_name)))
}

/// 推断任意 REST 接口的结构
#[utoipa::path(
    post,
    path = "/api/database/rest",
    tag = "detection",
    request_body = RestRequest,
    responses(
        (status = 200, description = "推断结果", body = ApiResponse<SchemaDescription>),
        (status = 502, description = "请求失败")
    )
)]
pub async fn infer_rest(
    State(state): State<AppState>,
    Json(req): Json<RestRequest>,
) -> Result<Json<ApiResponse<SchemaDescription>>, AppError> {
    req.validate()?;
    let service = ExplorationService::from_state(&state);
    let data = service.infer_rest(&req.url).await?;
    Ok(Json(ApiResponse::ok_with_service(data, state.config.service_name)))
}

/// 健康检查端点
#[utoipa::path(
    get,
    path = "/api/health",
    tag = "health",
    responses(
        (status = 200, description = "服务运行正常", body = HealthResponse)
    )
)]
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let saved_connections = match state.registry.count().await {
        Ok(count) => count,
        Err(e) => {
            tracing::warn!(error = %e, "无法读取已保存的连接");
            0
        }
    };
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: state.config.service_name.clone(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now(),
        sessions: state.sessions.len().await,
        saved_connections,
    })
}
