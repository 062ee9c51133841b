// service/observers.rs
use std::sync::Arc;

use uuid::Uuid;

use crate::{
    db::HelpdeskDb,
    models::{
        notificationmodel::{Notification, NotificationKind},
        ticketmodel::{Ticket, TicketMessage, TicketStatus},
    },
    service::notification_service::NotificationService,
};

/// The other side of the conversation: the assignee when the customer
/// wrote, otherwise the customer.
pub fn message_recipient(ticket: &Ticket, author_id: Uuid) -> Option<Uuid> {
    if author_id == ticket.customer_id {
        ticket.assigned_to
    } else {
        Some(ticket.customer_id)
    }
}

/// Customer and assignee, minus whoever made the change.
pub fn status_change_recipients(ticket: &Ticket, actor_id: Uuid) -> Vec<Uuid> {
    let mut recipients = Vec::with_capacity(2);

    if ticket.customer_id != actor_id {
        recipients.push(ticket.customer_id);
    }
    if let Some(assignee) = ticket.assigned_to {
        if assignee != actor_id && assignee != ticket.customer_id {
            recipients.push(assignee);
        }
    }

    recipients
}

/// Post-commit hooks, called explicitly by the ticket service once a write
/// has been persisted. They never fail the caller.
#[derive(Debug, Clone)]
pub struct TicketObservers {
    db: Arc<dyn HelpdeskDb>,
    notifications: NotificationService,
}

impl TicketObservers {
    pub fn new(db: Arc<dyn HelpdeskDb>, notifications: NotificationService) -> Self {
        Self { db, notifications }
    }

    pub async fn message_created(&self, ticket: &Ticket, message: &TicketMessage) -> Vec<Notification> {
        let Some(recipient_id) = message_recipient(ticket, message.user_id) else {
            return Vec::new();
        };

        let title = format!("New message on ticket #{}", short_id(ticket.id));
        let body = if message.message.is_empty() {
            "Sent an attachment".to_string()
        } else {
            preview(&message.message)
        };

        self.dispatch(&[recipient_id], ticket, NotificationKind::NewMessage, title, body)
            .await
    }

    pub async fn status_changed(
        &self,
        ticket: &Ticket,
        previous: TicketStatus,
        actor_id: Uuid,
    ) -> Vec<Notification> {
        if ticket.status == previous {
            return Vec::new();
        }

        let recipients = status_change_recipients(ticket, actor_id);
        let title = format!("Ticket #{} updated", short_id(ticket.id));
        let body = format!("Ticket \"{}\" changed to {}", ticket.title, ticket.status.label());

        self.dispatch(&recipients, ticket, NotificationKind::StatusChange, title, body)
            .await
    }

    async fn dispatch(
        &self,
        recipients: &[Uuid],
        ticket: &Ticket,
        kind: NotificationKind,
        title: String,
        body: String,
    ) -> Vec<Notification> {
        let mut sent = Vec::new();

        for recipient_id in recipients {
            let recipient = match self.db.get_user(Some(*recipient_id), None).await {
                Ok(Some(user)) => user,
                Ok(None) => {
                    tracing::warn!("Notification recipient {} no longer exists", recipient_id);
                    continue;
                }
                Err(e) => {
                    tracing::warn!("Failed to load notification recipient {}: {}", recipient_id, e);
                    continue;
                }
            };

            if let Some(notification) = self
                .notifications
                .notify(&recipient, ticket, kind, title.clone(), body.clone())
                .await
            {
                sent.push(notification);
            }
        }

        sent
    }
}

fn short_id(id: Uuid) -> String {
    id.simple().to_string()[..8].to_string()
}

fn preview(text: &str) -> String {
    const MAX_CHARS: usize = 120;
    if text.chars().count() <= MAX_CHARS {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(MAX_CHARS).collect();
    cut.push_str("...");
    cut
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        db::{memory::MemoryDb, ticketdb::TicketExt},
        models::{ticketmodel::NewTicketMessage, usermodel::{User, UserRole}},
        service::realtime::RealtimeBus,
    };
    use chrono::Utc;

    fn ticket(customer_id: Uuid, assigned_to: Option<Uuid>) -> Ticket {
        Ticket {
            id: Uuid::new_v4(),
            customer_id,
            assigned_to,
            title: "Broken login".to_string(),
            status: TicketStatus::InProgress,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_message_recipient() {
        let customer = Uuid::new_v4();
        let supporter = Uuid::new_v4();

        assert_eq!(message_recipient(&ticket(customer, Some(supporter)), customer), Some(supporter));
        assert_eq!(message_recipient(&ticket(customer, Some(supporter)), supporter), Some(customer));
        assert_eq!(message_recipient(&ticket(customer, None), customer), None);
    }

    #[test]
    fn test_status_change_recipients_skip_actor() {
        let customer = Uuid::new_v4();
        let supporter = Uuid::new_v4();
        let t = ticket(customer, Some(supporter));

        assert_eq!(status_change_recipients(&t, supporter), vec![customer]);
        assert_eq!(status_change_recipients(&t, customer), vec![supporter]);
        assert_eq!(status_change_recipients(&ticket(customer, None), customer), Vec::<Uuid>::new());
    }

    async fn setup() -> (Arc<MemoryDb>, TicketObservers, User, User, Ticket) {
        let db = Arc::new(MemoryDb::new());
        let customer = db.insert_user("Carol", UserRole::Customer, 1800);
        let supporter = db.insert_user("Sam", UserRole::Supporter, 0);
        let (ticket, _) = db
            .create_ticket(
                customer.id,
                Some(supporter.id),
                "Broken login".to_string(),
                vec![],
                NewTicketMessage {
                    user_id: customer.id,
                    message: "It broke".to_string(),
                    attachment_path: None,
                    is_system: false,
                },
            )
            .await
            .unwrap();
        db.set_status(ticket.id, TicketStatus::InProgress);
        let ticket = db.get_ticket(ticket.id).await.unwrap().unwrap();

        let notifications = NotificationService::new(db.clone(), RealtimeBus::new(), String::new());
        let observers = TicketObservers::new(db.clone(), notifications);
        (db, observers, customer, supporter, ticket)
    }

    #[tokio::test]
    async fn test_customer_message_notifies_assignee_only() {
        let (db, observers, customer, supporter, ticket) = setup().await;
        let message = db
            .add_ticket_message(
                ticket.id,
                NewTicketMessage {
                    user_id: customer.id,
                    message: "Any news?".to_string(),
                    attachment_path: None,
                    is_system: false,
                },
            )
            .await
            .unwrap();

        observers.message_created(&ticket, &message).await;

        let to_supporter = db.notifications_for(supporter.id);
        assert_eq!(to_supporter.len(), 1);
        assert_eq!(to_supporter[0].kind, NotificationKind::NewMessage);
        assert_eq!(to_supporter[0].body, "Any news?");
        assert!(db.notifications_for(customer.id).is_empty());
    }

    #[tokio::test]
    async fn test_unchanged_status_sends_nothing() {
        let (db, observers, customer, supporter, ticket) = setup().await;

        let sent = observers
            .status_changed(&ticket, TicketStatus::InProgress, supporter.id)
            .await;
        assert!(sent.is_empty());

        let sent = observers.status_changed(&ticket, TicketStatus::Open, supporter.id).await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].user_id, customer.id);
        assert!(db.notifications_for(supporter.id).is_empty());
    }

    #[test]
    fn test_preview_truncates() {
        let long = "x".repeat(200);
        assert_eq!(preview(&long).chars().count(), 123);
        assert_eq!(preview("short"), "short");
    }
}
