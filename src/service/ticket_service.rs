// service/ticket_service.rs
use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use crate::{
    db::HelpdeskDb,
    mail::mails::sanitize_html,
    models::{
        ticketmodel::{
            NewTicketMessage, Tag, Ticket, TicketFilter, TicketMessage, TicketStatus,
            TicketWithMessages, MAX_TITLE_LENGTH,
        },
        usermodel::{User, DEFAULT_DAILY_SUPPORT_SECONDS},
    },
    service::{
        attachment_service::{AttachmentStore, AttachmentUpload},
        authorization,
        error::{Denial, ServiceError},
        observers::TicketObservers,
        realtime::{ticket_topic, RealtimeBus, RealtimeEvent},
        support_time::SupportTimeMeter,
    },
};

#[derive(Debug, Clone)]
pub struct NewTicket {
    pub title: String,
    pub message: String,
    pub attachment: Option<AttachmentUpload>,
    /// Required when a supporter opens the ticket; ignored for customers.
    pub customer_id: Option<Uuid>,
    pub tag_ids: Vec<Uuid>,
}

/// Listing filters as the caller asked for them. Customer-only and
/// supporter-only conditions are settled by `list_tickets`.
#[derive(Debug, Clone, Default)]
pub struct TicketQuery {
    pub search: Option<String>,
    pub status: Option<TicketStatus>,
    pub customer_ids: Vec<Uuid>,
    pub unassigned: bool,
    pub assigned_to_me: bool,
    pub tag_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum DashboardMetrics {
    Supporter {
        active_tickets: i64,
        resolved_tickets: i64,
        total_customers: i64,
    },
    Customer {
        open_tickets: i64,
        resolved_tickets: i64,
        remaining_seconds: i32,
        total_daily_limit: i32,
    },
}

/// Result of a heartbeat. `NotInProgress` is a normal answer that tells a
/// polling client to back off, not a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TickOutcome {
    Deducted { remaining_seconds: i32 },
    NotInProgress,
}

#[derive(Debug, Clone)]
pub struct TicketService {
    db: Arc<dyn HelpdeskDb>,
    attachments: Arc<dyn AttachmentStore>,
    meter: SupportTimeMeter,
    bus: RealtimeBus,
    observers: TicketObservers,
    emit_noop_status_message: bool,
    daily_support_seconds: i32,
}

impl TicketService {
    pub fn new(
        db: Arc<dyn HelpdeskDb>,
        attachments: Arc<dyn AttachmentStore>,
        meter: SupportTimeMeter,
        bus: RealtimeBus,
        observers: TicketObservers,
    ) -> Self {
        Self {
            db,
            attachments,
            meter,
            bus,
            observers,
            emit_noop_status_message: true,
            daily_support_seconds: DEFAULT_DAILY_SUPPORT_SECONDS,
        }
    }

    /// Whether setting a ticket to the status it already has still writes
    /// a system message.
    pub fn with_noop_status_messages(mut self, emit: bool) -> Self {
        self.emit_noop_status_message = emit;
        self
    }

    /// The allowance reported on the customer dashboard.
    pub fn with_daily_allowance(mut self, seconds: i32) -> Self {
        self.daily_support_seconds = seconds;
        self
    }

    pub async fn create_ticket(
        &self,
        actor: &User,
        new_ticket: NewTicket,
    ) -> Result<TicketWithMessages, ServiceError> {
        let title = new_ticket.title.trim().to_string();
        if title.is_empty() {
            return Err(ServiceError::validation("title", "Title is required"));
        }
        if title.chars().count() > MAX_TITLE_LENGTH {
            return Err(ServiceError::validation(
                "title",
                format!("Title must be at most {} characters", MAX_TITLE_LENGTH),
            ));
        }

        let body = clean_body(&new_ticket.message);
        if body.is_empty() && new_ticket.attachment.is_none() {
            return Err(ServiceError::validation(
                "message",
                "A message or an attachment is required",
            ));
        }

        let (customer_id, assigned_to) = if actor.is_supporter() {
            let customer_id = new_ticket.customer_id.ok_or_else(|| {
                ServiceError::validation("customer_id", "Select the customer this ticket is for")
            })?;
            let customer = self
                .db
                .get_user(Some(customer_id), None)
                .await?
                .ok_or(ServiceError::UserNotFound(customer_id))?;
            if !customer.is_customer() {
                return Err(ServiceError::validation(
                    "customer_id",
                    "Tickets can only be opened for customers",
                ));
            }
            (customer.id, Some(actor.id))
        } else {
            (actor.id, None)
        };

        let attachment_path = self.attachments.store(new_ticket.attachment).await?;

        let (ticket, message) = self
            .db
            .create_ticket(
                customer_id,
                assigned_to,
                title,
                new_ticket.tag_ids,
                NewTicketMessage {
                    user_id: actor.id,
                    message: body,
                    attachment_path,
                    is_system: false,
                },
            )
            .await?;

        tracing::info!(
            "Ticket {} opened by {} for customer {}",
            ticket.id,
            actor.id,
            ticket.customer_id
        );

        self.publish_message(&message).await;
        self.observers.message_created(&ticket, &message).await;

        let tags = self.db.get_ticket_tags(ticket.id).await?;

        Ok(TicketWithMessages {
            ticket,
            tags,
            messages: vec![message],
        })
    }

    /// Claims the ticket for `actor`. A ticket held by another supporter is
    /// taken over.
    pub async fn assign_ticket(&self, actor: &User, ticket_id: Uuid) -> Result<Ticket, ServiceError> {
        if !actor.is_supporter() {
            return Err(ServiceError::Forbidden(Denial::SupportersOnly));
        }

        let ticket = self.load_ticket(ticket_id).await?;
        if ticket.status.is_terminal() {
            return Err(ServiceError::Forbidden(Denial::TicketClosed));
        }

        if let Some(previous) = ticket.assigned_to.filter(|id| *id != actor.id) {
            tracing::info!(
                "Ticket {} taken over by {} from {}",
                ticket.id,
                actor.id,
                previous
            );
        }

        let ticket = match self.db.assign_ticket(ticket.id, actor.id).await? {
            Some(ticket) => ticket,
            None => return Err(self.stale_write(ticket.id).await),
        };
        tracing::info!("Ticket {} assigned to {}", ticket.id, actor.id);

        Ok(ticket)
    }

    pub async fn update_status(
        &self,
        actor: &User,
        ticket_id: Uuid,
        new_status: TicketStatus,
    ) -> Result<Ticket, ServiceError> {
        let ticket = self.load_ticket(ticket_id).await?;

        ensure_can_update(actor, &ticket)?;
        if actor.is_customer() && new_status != TicketStatus::Resolved {
            return Err(ServiceError::Forbidden(Denial::CustomerMayOnlyResolve));
        }
        if ticket.status.is_terminal() {
            return Err(ServiceError::Forbidden(Denial::TicketClosed));
        }
        if !ticket.status.can_transition_to(new_status) {
            return Err(ServiceError::Forbidden(Denial::InvalidTransition));
        }

        let previous = ticket.status;
        let unchanged = previous == new_status;
        if unchanged && !self.emit_noop_status_message {
            return Ok(ticket);
        }

        let updated = if unchanged {
            ticket
        } else {
            match self
                .db
                .update_ticket_status(ticket.id, previous, new_status)
                .await?
            {
                Some(updated) => updated,
                None => return Err(self.stale_write(ticket.id).await),
            }
        };

        let message = self
            .db
            .add_ticket_message(
                updated.id,
                NewTicketMessage {
                    user_id: actor.id,
                    message: format!("Ticket status changed to: {}", new_status.label()),
                    attachment_path: None,
                    is_system: true,
                },
            )
            .await?;

        tracing::info!(
            "Ticket {} status {} -> {} by {}",
            updated.id,
            previous.label(),
            new_status.label(),
            actor.id
        );

        self.publish_message(&message).await;
        self.observers.message_created(&updated, &message).await;
        self.observers.status_changed(&updated, previous, actor.id).await;

        Ok(updated)
    }

    pub async fn send_message(
        &self,
        actor: &User,
        ticket_id: Uuid,
        body: &str,
        attachment: Option<AttachmentUpload>,
    ) -> Result<TicketMessage, ServiceError> {
        let ticket = self.load_ticket(ticket_id).await?;

        if ticket.status != TicketStatus::InProgress {
            return Err(ServiceError::Forbidden(Denial::TicketNotInProgress));
        }
        ensure_can_update(actor, &ticket)?;

        if actor.is_customer() {
            let remaining = self
                .db
                .get_support_seconds(actor.id)
                .await?
                .ok_or(ServiceError::UserNotFound(actor.id))?;
            if remaining <= 0 {
                return Err(ServiceError::Forbidden(Denial::SupportTimeExhausted));
            }
        }

        let body = clean_body(body);
        if body.is_empty() && attachment.is_none() {
            return Err(ServiceError::validation(
                "message",
                "A message or an attachment is required",
            ));
        }

        let attachment_path = self.attachments.store(attachment).await?;

        let message = self
            .db
            .add_ticket_message(
                ticket.id,
                NewTicketMessage {
                    user_id: actor.id,
                    message: body,
                    attachment_path,
                    is_system: false,
                },
            )
            .await?;

        self.publish_message(&message).await;
        self.observers.message_created(&ticket, &message).await;

        Ok(message)
    }

    /// Heartbeat from the assignee's open chat view.
    pub async fn tick_time(
        &self,
        actor: &User,
        ticket_id: Uuid,
        seconds: i32,
    ) -> Result<TickOutcome, ServiceError> {
        if seconds <= 0 {
            return Err(ServiceError::validation("seconds", "Seconds must be positive"));
        }
        if !actor.is_supporter() {
            return Err(ServiceError::Forbidden(Denial::SupportersOnly));
        }

        let ticket = self.load_ticket(ticket_id).await?;
        if !ticket.is_assigned_to(actor.id) {
            return Err(ServiceError::Forbidden(Denial::NotAssignee));
        }
        if ticket.status != TicketStatus::InProgress {
            return Ok(TickOutcome::NotInProgress);
        }

        let remaining_seconds = self.meter.deduct_time(&ticket, seconds).await?;
        Ok(TickOutcome::Deducted { remaining_seconds })
    }

    pub async fn delete_ticket(&self, actor: &User, ticket_id: Uuid) -> Result<(), ServiceError> {
        let ticket = self.load_ticket(ticket_id).await?;
        if !authorization::can_delete(actor, &ticket) {
            return Err(ServiceError::Forbidden(Denial::SupportersOnly));
        }

        if !self.db.delete_ticket(ticket.id).await? {
            return Err(ServiceError::TicketNotFound(ticket.id));
        }
        self.bus.close_topic(&ticket_topic(ticket.id)).await;

        tracing::info!("Ticket {} deleted by {}", ticket.id, actor.id);
        Ok(())
    }

    /// Replaces the ticket's tags with exactly `tag_ids`.
    pub async fn sync_tags(
        &self,
        actor: &User,
        ticket_id: Uuid,
        mut tag_ids: Vec<Uuid>,
    ) -> Result<Vec<Tag>, ServiceError> {
        if !actor.is_supporter() {
            return Err(ServiceError::Forbidden(Denial::SupportersOnly));
        }

        let ticket = self.load_ticket(ticket_id).await?;

        tag_ids.sort();
        tag_ids.dedup();
        let known = self.db.get_tags(&tag_ids).await?;
        if known.len() != tag_ids.len() {
            return Err(ServiceError::validation("tags", "One or more tags do not exist"));
        }

        let tags = self.db.sync_ticket_tags(ticket.id, tag_ids).await?;
        tracing::info!("Ticket {} tagged with {} tags by {}", ticket.id, tags.len(), actor.id);

        Ok(tags)
    }

    /// Bytes of an attachment carried by one of the ticket's messages.
    pub async fn open_attachment(
        &self,
        actor: &User,
        ticket_id: Uuid,
        reference: &str,
    ) -> Result<Vec<u8>, ServiceError> {
        let ticket = self.load_ticket(ticket_id).await?;
        if !authorization::can_view(actor, &ticket) {
            return Err(ServiceError::Forbidden(Denial::NotTicketOwner));
        }

        let not_found = || ServiceError::AttachmentNotFound(reference.to_string());
        self.db
            .get_message_by_attachment(ticket.id, reference)
            .await?
            .ok_or_else(not_found)?;

        self.attachments.open(reference).await?.ok_or_else(not_found)
    }

    pub async fn dashboard(&self, actor: &User) -> Result<DashboardMetrics, ServiceError> {
        if actor.is_supporter() {
            let counts = self.db.count_tickets_by_status(None).await?;
            let count = |wanted: &[TicketStatus]| -> i64 {
                counts
                    .iter()
                    .filter(|c| wanted.contains(&c.status))
                    .map(|c| c.count)
                    .sum()
            };

            return Ok(DashboardMetrics::Supporter {
                active_tickets: count(&[TicketStatus::Open, TicketStatus::InProgress]),
                resolved_tickets: count(&[TicketStatus::Resolved]),
                total_customers: self.db.count_customers().await?,
            });
        }

        let counts = self.db.count_tickets_by_status(Some(actor.id)).await?;
        let (open_tickets, resolved_tickets) =
            counts.iter().fold((0, 0), |(open, done), c| {
                if c.status.is_terminal() {
                    (open, done + c.count)
                } else {
                    (open + c.count, done)
                }
            });
        let remaining_seconds = self
            .db
            .get_support_seconds(actor.id)
            .await?
            .ok_or(ServiceError::UserNotFound(actor.id))?;

        Ok(DashboardMetrics::Customer {
            open_tickets,
            resolved_tickets,
            remaining_seconds,
            total_daily_limit: self.daily_support_seconds,
        })
    }

    pub async fn get_ticket(
        &self,
        actor: &User,
        ticket_id: Uuid,
    ) -> Result<TicketWithMessages, ServiceError> {
        let ticket = self.load_ticket(ticket_id).await?;
        if !authorization::can_view(actor, &ticket) {
            return Err(ServiceError::Forbidden(Denial::NotTicketOwner));
        }

        let tags = self.db.get_ticket_tags(ticket.id).await?;
        let messages = self.db.get_ticket_messages(ticket.id).await?;

        Ok(TicketWithMessages {
            ticket,
            tags,
            messages,
        })
    }

    /// Supporters see every ticket, customers only their own. Customer and
    /// assignee filters apply to supporters only. Newest first.
    pub async fn list_tickets(
        &self,
        actor: &User,
        query: TicketQuery,
        page: u32,
        limit: usize,
    ) -> Result<Vec<Ticket>, ServiceError> {
        let search = query
            .search
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        let filter = if actor.is_supporter() {
            TicketFilter {
                customer_id: None,
                search,
                search_customer_name: true,
                status: query.status,
                customer_ids: query.customer_ids,
                unassigned: query.unassigned,
                assignee: query.assigned_to_me.then_some(actor.id),
                tag_ids: query.tag_ids,
            }
        } else {
            TicketFilter {
                customer_id: Some(actor.id),
                search,
                status: query.status,
                tag_ids: query.tag_ids,
                ..Default::default()
            }
        };

        let offset = (page.max(1) - 1) as i64 * limit as i64;
        Ok(self.db.get_tickets(&filter, limit as i64, offset).await?)
    }

    async fn load_ticket(&self, ticket_id: Uuid) -> Result<Ticket, ServiceError> {
        self.db
            .get_ticket(ticket_id)
            .await?
            .ok_or(ServiceError::TicketNotFound(ticket_id))
    }

    /// Explains a conditional write that matched no row: the ticket was
    /// deleted or its status moved since it was loaded.
    async fn stale_write(&self, ticket_id: Uuid) -> ServiceError {
        match self.db.get_ticket(ticket_id).await {
            Ok(Some(current)) if current.status.is_terminal() => {
                ServiceError::Forbidden(Denial::TicketClosed)
            }
            Ok(Some(_)) => ServiceError::Forbidden(Denial::InvalidTransition),
            Ok(None) => ServiceError::TicketNotFound(ticket_id),
            Err(e) => e.into(),
        }
    }

    async fn publish_message(&self, message: &TicketMessage) {
        self.bus
            .publish(
                &ticket_topic(message.ticket_id),
                RealtimeEvent::MessageCreated {
                    message: message.clone(),
                },
            )
            .await;
    }
}

fn ensure_can_update(actor: &User, ticket: &Ticket) -> Result<(), ServiceError> {
    if authorization::can_update(actor, ticket) {
        return Ok(());
    }

    let denial = if actor.is_supporter() {
        Denial::NotAssignee
    } else {
        Denial::NotTicketOwner
    };
    Err(ServiceError::Forbidden(denial))
}

fn clean_body(body: &str) -> String {
    sanitize_html(body.trim()).trim().to_string()
}
