use std::sync::Arc;

use axum::{
    middleware,
    response::IntoResponse,
    routing::get,
    Extension, Json, Router,
};

use crate::{
    db::userdb::UserExt,
    dtos::userdtos::{FilterUserDto, UserData},
    error::HttpError,
    middleware::{role_check, JWTAuthMiddeware},
    models::usermodel::UserRole,
    AppState,
};

pub fn users_handler() -> Router {
    Router::new()
        .route("/users/me", get(get_me))
        .route(
            "/customers",
            get(get_customers).layer(middleware::from_fn(|state, req, next| {
                role_check(state, req, next, vec![UserRole::Supporter, UserRole::Admin])
            })),
        )
}

pub async fn get_me(
    Extension(auth): Extension<JWTAuthMiddeware>,
) -> Result<impl IntoResponse, HttpError> {
    Ok(Json(serde_json::json!({
        "status": "success",
        "data": UserData {
            user: FilterUserDto::filter_user(&auth.user),
        }
    })))
}

/// Directory used by supporters to pick the customer of a new ticket.
pub async fn get_customers(
    Extension(app_state): Extension<Arc<AppState>>,
) -> Result<impl IntoResponse, HttpError> {
    let customers = app_state
        .db_client
        .get_customers()
        .await
        .map_err(|e| HttpError::server_error(e.to_string()))?;

    Ok(Json(serde_json::json!({
        "status": "success",
        "data": customers,
        "results": customers.len()
    })))
}
