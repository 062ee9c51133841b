// models/ticketmodel.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::Type;
use uuid::Uuid;

pub const MAX_TITLE_LENGTH: usize = 255;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Type, PartialEq, Eq)]
#[sqlx(type_name = "ticket_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    Open,
    InProgress,
    Resolved,
    Closed,
}

impl TicketStatus {
    pub fn label(&self) -> &str {
        match self {
            TicketStatus::Open => "OPEN",
            TicketStatus::InProgress => "IN_PROGRESS",
            TicketStatus::Resolved => "RESOLVED",
            TicketStatus::Closed => "CLOSED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TicketStatus::Resolved | TicketStatus::Closed)
    }

    fn rank(&self) -> u8 {
        match self {
            TicketStatus::Open => 0,
            TicketStatus::InProgress => 1,
            TicketStatus::Resolved | TicketStatus::Closed => 2,
        }
    }

    /// Forward-only: OPEN -> IN_PROGRESS -> {RESOLVED, CLOSED}. Re-setting the
    /// current non-terminal status is accepted as a no-op.
    pub fn can_transition_to(&self, next: TicketStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        *self == next || next.rank() > self.rank()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Ticket {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub assigned_to: Option<Uuid>,
    pub title: String,
    pub status: TicketStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Ticket {
    pub fn is_assigned_to(&self, user_id: Uuid) -> bool {
        self.assigned_to == Some(user_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct TicketMessage {
    pub id: Uuid,
    pub ticket_id: Uuid,
    pub user_id: Uuid,
    pub message: String,
    pub attachment_path: Option<String>,
    pub is_system: bool,
    pub created_at: DateTime<Utc>,
}

/// A message about to be persisted.
#[derive(Debug, Clone)]
pub struct NewTicketMessage {
    pub user_id: Uuid,
    pub message: String,
    pub attachment_path: Option<String>,
    pub is_system: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, PartialEq)]
pub struct Tag {
    pub id: Uuid,
    pub name: String,
    pub color: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketWithMessages {
    pub ticket: Ticket,
    pub tags: Vec<Tag>,
    pub messages: Vec<TicketMessage>,
}

/// Narrows a ticket listing. Unset fields match every ticket; the assignee
/// conditions are OR-ed with each other.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TicketFilter {
    pub customer_id: Option<Uuid>,
    pub search: Option<String>,
    /// Also match `search` against the customer's name.
    pub search_customer_name: bool,
    pub status: Option<TicketStatus>,
    pub customer_ids: Vec<Uuid>,
    pub unassigned: bool,
    pub assignee: Option<Uuid>,
    /// Tickets carrying any of these tags.
    pub tag_ids: Vec<Uuid>,
}

impl TicketFilter {
    pub fn has_assignee_condition(&self) -> bool {
        self.unassigned || self.assignee.is_some()
    }

    pub fn matches(&self, ticket: &Ticket, customer_name: &str, tag_ids: &[Uuid]) -> bool {
        if self.customer_id.is_some_and(|id| ticket.customer_id != id) {
            return false;
        }
        if let Some(search) = &self.search {
            let needle = search.to_lowercase();
            let by_title = ticket.title.to_lowercase().contains(&needle);
            let by_name =
                self.search_customer_name && customer_name.to_lowercase().contains(&needle);
            if !by_title && !by_name {
                return false;
            }
        }
        if self.status.is_some_and(|status| ticket.status != status) {
            return false;
        }
        if !self.customer_ids.is_empty() && !self.customer_ids.contains(&ticket.customer_id) {
            return false;
        }
        if self.has_assignee_condition() {
            let unassigned = self.unassigned && ticket.assigned_to.is_none();
            let held = self.assignee.is_some() && ticket.assigned_to == self.assignee;
            if !unassigned && !held {
                return false;
            }
        }
        if !self.tag_ids.is_empty() && !tag_ids.iter().any(|id| self.tag_ids.contains(id)) {
            return false;
        }
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, sqlx::FromRow)]
pub struct StatusCount {
    pub status: TicketStatus,
    pub count: i64,
}
