use thiserror::Error;
use uuid::Uuid;
use axum::http::StatusCode;

use crate::error::HttpError;

/// The rule that blocked an actor. Clients switch on `code()` to decide what
/// to show (a claim button, a closed banner, a time-exhausted banner).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Denial {
    SupportersOnly,
    NotAssignee,
    NotTicketOwner,
    CustomerMayOnlyResolve,
    TicketNotInProgress,
    SupportTimeExhausted,
    TicketClosed,
    InvalidTransition,
}

impl Denial {
    pub fn code(&self) -> &'static str {
        match self {
            Denial::SupportersOnly => "supporters_only",
            Denial::NotAssignee => "not_assignee",
            Denial::NotTicketOwner => "not_ticket_owner",
            Denial::CustomerMayOnlyResolve => "customer_may_only_resolve",
            Denial::TicketNotInProgress => "ticket_not_in_progress",
            Denial::SupportTimeExhausted => "support_time_exhausted",
            Denial::TicketClosed => "ticket_closed",
            Denial::InvalidTransition => "invalid_transition",
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            Denial::SupportersOnly => "Only supporters can perform this action.",
            Denial::NotAssignee => "You must claim this ticket before working on it.",
            Denial::NotTicketOwner => "You do not have access to this ticket.",
            Denial::CustomerMayOnlyResolve => "Customers can only mark tickets as resolved.",
            Denial::TicketNotInProgress => "The ticket must be in progress to exchange messages.",
            Denial::SupportTimeExhausted => "No support time available.",
            Denial::TicketClosed => "This ticket is already resolved or closed.",
            Denial::InvalidTransition => "Ticket status can only move forward.",
        }
    }
}

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("{field}: {message}")]
    Validation { field: &'static str, message: String },

    #[error("{}", .0.message())]
    Forbidden(Denial),

    #[error("Ticket {0} not found")]
    TicketNotFound(Uuid),

    #[error("User {0} not found")]
    UserNotFound(Uuid),

    #[error("Notification {0} not found")]
    NotificationNotFound(Uuid),

    #[error("Attachment {0} not found")]
    AttachmentNotFound(String),

    #[error("Attachment error: {0}")]
    Attachment(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl ServiceError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        ServiceError::Validation {
            field,
            message: message.into(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::Validation { .. } => StatusCode::BAD_REQUEST,

            ServiceError::Forbidden(_) => StatusCode::FORBIDDEN,

            ServiceError::TicketNotFound(_)
            | ServiceError::UserNotFound(_)
            | ServiceError::NotificationNotFound(_)
            | ServiceError::AttachmentNotFound(_) => StatusCode::NOT_FOUND,

            ServiceError::Attachment(_)
            | ServiceError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ServiceError> for HttpError {
    fn from(error: ServiceError) -> Self {
        match error {
            ServiceError::Forbidden(denial) => {
                HttpError::forbidden(denial.message()).with_code(denial.code())
            }
            ServiceError::Validation { .. } => {
                HttpError::bad_request(error.to_string()).with_code("validation_error")
            }
            ServiceError::TicketNotFound(_)
            | ServiceError::UserNotFound(_)
            | ServiceError::NotificationNotFound(_)
            | ServiceError::AttachmentNotFound(_) => HttpError::not_found(error.to_string()),
            ServiceError::Database(ref e) => {
                tracing::error!("Database error: {}", e);
                HttpError::server_error("Server Error. Please try again later")
            }
            _ => HttpError::new(error.to_string(), error.status_code()),
        }
    }
}
