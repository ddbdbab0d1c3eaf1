//! 结构探索服务路由模块

use axum::{
    routing::{delete, get, post},
    Router,
};

use crate::handlers;
use crate::state::AppState;

/// 创建结构探索与连接管理路由
pub fn router() -> Router<AppState> {
    Router::new()
        .nest("/api/database", database_routes())
        .route("/api/health", get(handlers::health_check))
}

fn database_routes() -> Router<AppState> {
    Router::new()
        .route("/detect", post(handlers::detect))
        .route("/test", post(handlers::test_connection))
        .route("/confirm", post(handlers::confirm))
        .route("/rest", post(handlers::infer_rest))
        .route("/context/current", get(handlers::current_context))
        .route("/context/{session_id}", delete(handlers::close_context))
        .route("/contexts", get(handlers::list_contexts))
        .route("/explore/{session_id}", get(handlers::explore))
        .route(
            "/explore/table/{session_id}/{table_name}",
            get(handlers::explore_table),
        )
        .route("/save-connection", post(handlers::save_connection))
        .route("/list-connections", get(handlers::list_connections))
        .route("/get-connection/{id}", get(handlers::get_connection))
        .route("/delete-connection/{id}", delete(handlers::delete_connection))
        .route(
            "/use-saved-connection/{id}",
            post(handlers::use_saved_connection),
        )
}
