// routes.rs
use std::sync::Arc;

use axum::{middleware, routing::get, Extension, Json, Router};
use serde_json::json;
use tower_http::trace::TraceLayer;

use crate::{
    handler::{
        auth::auth_handler, notifications::notification_handler, realtime::realtime_handler,
        tickets::ticket_handler, users::users_handler,
    },
    middleware::auth,
    AppState,
};

// Health check handler
async fn health_check(Extension(app_state): Extension<Arc<AppState>>) -> Json<serde_json::Value> {
    let (connections, idle) = app_state.db_client.pool_status();
    Json(json!({
        "status": "ok",
        "message": "Server is running",
        "db_connections": connections,
        "db_idle": idle
    }))
}

pub fn create_router(app_state: Arc<AppState>) -> Router {
    // Everything except login/logout needs a resolved user
    let protected_routes = Router::new()
        .merge(ticket_handler())
        .merge(notification_handler())
        .merge(users_handler())
        .merge(realtime_handler())
        .layer(middleware::from_fn(auth));

    let api_route = Router::new()
        .nest("/auth", auth_handler())
        .merge(protected_routes)
        .layer(TraceLayer::new_for_http());

    Router::new()
        .route("/health", get(health_check))
        .nest("/api", api_route)
        .layer(Extension(app_state))
}
