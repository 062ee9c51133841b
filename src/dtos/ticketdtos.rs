use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::{
    models::ticketmodel::{Tag, Ticket, TicketMessage, TicketStatus},
    service::{
        attachment_service::AttachmentUpload, error::ServiceError, ticket_service::TicketQuery,
    },
};

/// Base64 file payload, optionally as a `data:` URL.
#[derive(Validate, Debug, Clone, Serialize, Deserialize)]
pub struct AttachmentDto {
    #[validate(length(min = 1, max = 255, message = "File name is required"))]
    pub file_name: String,
    #[validate(length(min = 1, message = "Attachment data is required"))]
    pub data: String,
}

impl AttachmentDto {
    pub fn into_upload(self) -> Result<AttachmentUpload, ServiceError> {
        AttachmentUpload::from_base64(&self.file_name, &self.data)
    }
}

pub fn decode_attachment(
    attachment: Option<AttachmentDto>,
) -> Result<Option<AttachmentUpload>, ServiceError> {
    attachment.map(AttachmentDto::into_upload).transpose()
}

#[derive(Validate, Debug, Clone, Serialize, Deserialize)]
pub struct CreateTicketDto {
    #[validate(length(min = 1, max = 255, message = "Title must be between 1 and 255 characters"))]
    pub title: String,
    #[serde(default)]
    pub message: String,
    #[validate]
    pub attachment: Option<AttachmentDto>,
    pub customer_id: Option<Uuid>,
    #[serde(default)]
    pub tag_ids: Vec<Uuid>,
}

#[derive(Validate, Debug, Clone, Serialize, Deserialize)]
pub struct SendMessageDto {
    #[serde(default)]
    #[validate(length(max = 10000, message = "Message is too long"))]
    pub message: String,
    #[validate]
    pub attachment: Option<AttachmentDto>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateTicketStatusDto {
    pub status: TicketStatus,
}

/// `GET /tickets` query string. List values are comma-separated.
#[derive(Validate, Debug, Clone, Default, Serialize, Deserialize)]
pub struct TicketFilterDto {
    #[validate(range(min = 1))]
    pub page: Option<u32>,
    #[validate(range(min = 1, max = 50))]
    pub limit: Option<usize>,
    #[validate(length(max = 255, message = "Search is too long"))]
    pub search: Option<String>,
    pub status: Option<String>,
    pub customers: Option<String>,
    /// `unassigned` and/or `me`.
    pub assignees: Option<String>,
    pub tags: Option<String>,
}

impl TicketFilterDto {
    pub fn to_query(&self) -> Result<TicketQuery, ServiceError> {
        let status = match self.status.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(parse_status(raw)?),
        };

        let assignees = split_list(self.assignees.as_deref());

        Ok(TicketQuery {
            search: self.search.clone(),
            status,
            customer_ids: parse_ids("customers", self.customers.as_deref())?,
            unassigned: assignees.contains(&"unassigned"),
            assigned_to_me: assignees.contains(&"me"),
            tag_ids: parse_ids("tags", self.tags.as_deref())?,
        })
    }
}

fn split_list(raw: Option<&str>) -> Vec<&str> {
    raw.unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .collect()
}

fn parse_ids(field: &'static str, raw: Option<&str>) -> Result<Vec<Uuid>, ServiceError> {
    split_list(raw)
        .into_iter()
        .map(|id| {
            Uuid::parse_str(id)
                .map_err(|_| ServiceError::validation(field, format!("Invalid id: {}", id)))
        })
        .collect()
}

fn parse_status(raw: &str) -> Result<TicketStatus, ServiceError> {
    serde_json::from_value(serde_json::Value::String(raw.to_lowercase()))
        .map_err(|_| ServiceError::validation("status", format!("Unknown status: {}", raw)))
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncTagsDto {
    #[serde(default)]
    pub tags: Vec<Uuid>,
}

#[derive(Validate, Debug, Clone, Default, Serialize, Deserialize)]
pub struct TickTimeDto {
    #[validate(range(min = 1, max = 60, message = "Seconds must be between 1 and 60"))]
    pub seconds: Option<i32>,
}

#[derive(Validate, Debug, Clone, Serialize, Deserialize)]
pub struct FcmTokenDto {
    #[validate(length(min = 1, max = 4096, message = "Token is required"))]
    pub token: String,
    pub device_type: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TicketResponseDto {
    pub status: String,
    pub data: TicketData,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TicketData {
    pub ticket: Ticket,
    pub tags: Vec<Tag>,
    pub messages: Vec<TicketMessageDto>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketMessageDto {
    #[serde(flatten)]
    pub message: TicketMessage,
    pub attachment_url: Option<String>,
}

impl From<TicketMessage> for TicketMessageDto {
    fn from(message: TicketMessage) -> Self {
        let attachment_url = message.attachment_path.as_ref().map(|reference| {
            format!("/api/tickets/{}/attachments/{}", message.ticket_id, reference)
        });

        Self {
            message,
            attachment_url,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TicketListResponseDto {
    pub status: String,
    pub tickets: Vec<Ticket>,
    pub results: usize,
}
