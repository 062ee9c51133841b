use std::sync::Arc;

use axum::{
    extract::{Path, Query},
    http::header,
    response::IntoResponse,
    routing::{get, patch, post, put},
    Extension, Json, Router,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dtos::ticketdtos::{
        decode_attachment, CreateTicketDto, SendMessageDto, SyncTagsDto, TickTimeDto,
        TicketData, TicketFilterDto, TicketListResponseDto, TicketMessageDto,
        TicketResponseDto, UpdateTicketStatusDto,
    },
    error::HttpError,
    middleware::JWTAuthMiddeware,
    models::ticketmodel::TicketWithMessages,
    service::{attachment_service::content_type, ticket_service::NewTicket},
    AppState,
};

pub fn ticket_handler() -> Router {
    Router::new()
        .route("/tickets", get(list_tickets).post(create_ticket))
        .route("/tickets/:ticket_id", get(get_ticket).delete(delete_ticket))
        .route("/tickets/:ticket_id/assign", post(assign_ticket))
        .route("/tickets/:ticket_id/status", patch(update_ticket_status))
        .route("/tickets/:ticket_id/messages", post(send_message))
        .route("/tickets/:ticket_id/tick", post(tick_time))
        .route("/tickets/:ticket_id/tags", put(sync_tags))
        .route("/tickets/:ticket_id/attachments/:reference", get(download_attachment))
        .route("/dashboard", get(dashboard))
}

fn ticket_response(view: TicketWithMessages) -> TicketResponseDto {
    TicketResponseDto {
        status: "success".to_string(),
        data: TicketData {
            ticket: view.ticket,
            tags: view.tags,
            messages: view.messages.into_iter().map(TicketMessageDto::from).collect(),
        },
    }
}

pub async fn list_tickets(
    Query(query_params): Query<TicketFilterDto>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
) -> Result<impl IntoResponse, HttpError> {
    query_params
        .validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let page = query_params.page.unwrap_or(1);
    let limit = query_params.limit.unwrap_or(10);
    let query = query_params.to_query()?;

    let tickets = app_state
        .ticket_service
        .list_tickets(&auth.user, query, page, limit)
        .await?;

    Ok(Json(TicketListResponseDto {
        status: "success".to_string(),
        results: tickets.len(),
        tickets,
    }))
}

pub async fn create_ticket(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Json(body): Json<CreateTicketDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let new_ticket = NewTicket {
        title: body.title,
        message: body.message,
        attachment: decode_attachment(body.attachment)?,
        customer_id: body.customer_id,
        tag_ids: body.tag_ids,
    };

    let created = app_state
        .ticket_service
        .create_ticket(&auth.user, new_ticket)
        .await?;

    Ok((axum::http::StatusCode::CREATED, Json(ticket_response(created))))
}

pub async fn get_ticket(
    Path(ticket_id): Path<Uuid>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
) -> Result<impl IntoResponse, HttpError> {
    let view = app_state
        .ticket_service
        .get_ticket(&auth.user, ticket_id)
        .await?;

    Ok(Json(ticket_response(view)))
}

pub async fn delete_ticket(
    Path(ticket_id): Path<Uuid>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
) -> Result<impl IntoResponse, HttpError> {
    app_state
        .ticket_service
        .delete_ticket(&auth.user, ticket_id)
        .await?;

    Ok(Json(serde_json::json!({
        "status": "success",
        "message": "Ticket deleted"
    })))
}

pub async fn assign_ticket(
    Path(ticket_id): Path<Uuid>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
) -> Result<impl IntoResponse, HttpError> {
    let ticket = app_state
        .ticket_service
        .assign_ticket(&auth.user, ticket_id)
        .await?;

    Ok(Json(serde_json::json!({
        "status": "success",
        "data": ticket
    })))
}

pub async fn update_ticket_status(
    Path(ticket_id): Path<Uuid>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Json(body): Json<UpdateTicketStatusDto>,
) -> Result<impl IntoResponse, HttpError> {
    let ticket = app_state
        .ticket_service
        .update_status(&auth.user, ticket_id, body.status)
        .await?;

    Ok(Json(serde_json::json!({
        "status": "success",
        "data": ticket
    })))
}

pub async fn send_message(
    Path(ticket_id): Path<Uuid>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Json(body): Json<SendMessageDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let attachment = decode_attachment(body.attachment)?;
    let message = app_state
        .ticket_service
        .send_message(&auth.user, ticket_id, &body.message, attachment)
        .await?;

    Ok((
        axum::http::StatusCode::CREATED,
        Json(serde_json::json!({
            "status": "success",
            "data": TicketMessageDto::from(message)
        })),
    ))
}

/// Heartbeat. The body is optional; the configured interval is deducted
/// when it is absent.
pub async fn tick_time(
    Path(ticket_id): Path<Uuid>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    body: Option<Json<TickTimeDto>>,
) -> Result<impl IntoResponse, HttpError> {
    let body = body.map(|Json(body)| body).unwrap_or_default();
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let seconds = body.seconds.unwrap_or(app_state.env.heartbeat_seconds);
    let outcome = app_state
        .ticket_service
        .tick_time(&auth.user, ticket_id, seconds)
        .await?;

    Ok(Json(outcome))
}

pub async fn sync_tags(
    Path(ticket_id): Path<Uuid>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Json(body): Json<SyncTagsDto>,
) -> Result<impl IntoResponse, HttpError> {
    let tags = app_state
        .ticket_service
        .sync_tags(&auth.user, ticket_id, body.tags)
        .await?;

    Ok(Json(serde_json::json!({
        "status": "success",
        "data": tags
    })))
}

pub async fn download_attachment(
    Path((ticket_id, reference)): Path<(Uuid, String)>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
) -> Result<impl IntoResponse, HttpError> {
    let bytes = app_state
        .ticket_service
        .open_attachment(&auth.user, ticket_id, &reference)
        .await?;

    Ok(([(header::CONTENT_TYPE, content_type(&reference))], bytes))
}

pub async fn dashboard(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
) -> Result<impl IntoResponse, HttpError> {
    let metrics = app_state.ticket_service.dashboard(&auth.user).await?;

    Ok(Json(serde_json::json!({
        "status": "success",
        "data": metrics
    })))
}
