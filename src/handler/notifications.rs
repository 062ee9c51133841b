use std::sync::Arc;

use axum::{
    extract::{Path, Query},
    response::IntoResponse,
    routing::{delete, get, post},
    Extension, Json, Router,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dtos::{ticketdtos::FcmTokenDto, userdtos::RequestQueryDto},
    error::HttpError,
    middleware::JWTAuthMiddeware,
    AppState,
};

pub fn notification_handler() -> Router {
    Router::new()
        .route("/notifications", get(get_notifications))
        .route("/notifications/clear", post(clear_notifications))
        .route("/notifications/:notification_id", delete(acknowledge_notification))
        .route("/fcm-token", post(register_fcm_token))
}

pub async fn get_notifications(
    Query(query_params): Query<RequestQueryDto>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
) -> Result<impl IntoResponse, HttpError> {
    query_params
        .validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let notifications = app_state
        .notification_service
        .list(
            &auth.user,
            query_params.page.unwrap_or(1),
            query_params.limit.unwrap_or(20),
        )
        .await?;

    Ok(Json(serde_json::json!({
        "status": "success",
        "data": notifications,
        "results": notifications.len()
    })))
}

/// Reading a notification removes it; the client opens `ticket_id`.
pub async fn acknowledge_notification(
    Path(notification_id): Path<Uuid>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
) -> Result<impl IntoResponse, HttpError> {
    let ticket_id = app_state
        .notification_service
        .acknowledge(&auth.user, notification_id)
        .await?;

    Ok(Json(serde_json::json!({
        "status": "success",
        "ticket_id": ticket_id
    })))
}

pub async fn clear_notifications(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
) -> Result<impl IntoResponse, HttpError> {
    let removed = app_state.notification_service.clear(&auth.user).await?;

    Ok(Json(serde_json::json!({
        "status": "success",
        "removed": removed
    })))
}

pub async fn register_fcm_token(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Json(body): Json<FcmTokenDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    app_state
        .notification_service
        .register_device_token(&auth.user, body.token, body.device_type)
        .await?;

    Ok(Json(serde_json::json!({
        "status": "success",
        "message": "Device registered for notifications"
    })))
}
