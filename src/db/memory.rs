// db/memory.rs
//! In-process stand-in for Postgres used by the service tests.
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::Error;
use uuid::Uuid;

use super::{notificationdb::NotificationExt, ticketdb::TicketExt, userdb::UserExt};
use crate::models::{
    notificationmodel::{Notification, NotificationKind},
    ticketmodel::*,
    usermodel::{CustomerSummary, FcmToken, User, UserRole},
};

#[derive(Debug, Default)]
struct State {
    users: Vec<User>,
    tickets: Vec<Ticket>,
    messages: Vec<TicketMessage>,
    tags: Vec<Tag>,
    ticket_tags: Vec<(Uuid, Uuid)>,
    notifications: Vec<Notification>,
    fcm_tokens: Vec<FcmToken>,
}

#[derive(Debug, Default)]
pub struct MemoryDb {
    state: Mutex<State>,
}

impl MemoryDb {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_user(&self, name: &str, role: UserRole, remaining_support_seconds: i32) -> User {
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            name: name.to_string(),
            email: format!("{}@example.com", name.to_lowercase()),
            password: String::new(),
            role,
            remaining_support_seconds,
            created_at: now,
            updated_at: now,
        };
        self.state.lock().unwrap().users.push(user.clone());
        user
    }

    pub fn insert_tag(&self, name: &str) -> Tag {
        let tag = Tag {
            id: Uuid::new_v4(),
            name: name.to_string(),
            color: "#e5e7eb".to_string(),
        };
        self.state.lock().unwrap().tags.push(tag.clone());
        tag
    }

    pub fn balance(&self, user_id: Uuid) -> i32 {
        self.state
            .lock()
            .unwrap()
            .users
            .iter()
            .find(|u| u.id == user_id)
            .map(|u| u.remaining_support_seconds)
            .unwrap_or_default()
    }

    pub fn set_status(&self, ticket_id: Uuid, status: TicketStatus) {
        let mut state = self.state.lock().unwrap();
        if let Some(ticket) = state.tickets.iter_mut().find(|t| t.id == ticket_id) {
            ticket.status = status;
        }
    }

    pub fn notifications_for(&self, user_id: Uuid) -> Vec<Notification> {
        self.state
            .lock()
            .unwrap()
            .notifications
            .iter()
            .filter(|n| n.user_id == user_id)
            .cloned()
            .collect()
    }

    pub fn message_count(&self, ticket_id: Uuid) -> usize {
        self.state
            .lock()
            .unwrap()
            .messages
            .iter()
            .filter(|m| m.ticket_id == ticket_id)
            .count()
    }

    fn build_message(ticket_id: Uuid, message: NewTicketMessage) -> TicketMessage {
        TicketMessage {
            id: Uuid::new_v4(),
            ticket_id,
            user_id: message.user_id,
            message: message.message,
            attachment_path: message.attachment_path,
            is_system: message.is_system,
            created_at: Utc::now(),
        }
    }
}

#[async_trait]
impl UserExt for MemoryDb {
    async fn get_user(
        &self,
        user_id: Option<Uuid>,
        email: Option<&str>,
    ) -> Result<Option<User>, Error> {
        let state = self.state.lock().unwrap();
        let user = match (user_id, email) {
            (Some(id), _) => state.users.iter().find(|u| u.id == id),
            (None, Some(email)) => state.users.iter().find(|u| u.email == email),
            (None, None) => None,
        };
        Ok(user.cloned())
    }

    async fn get_customers(&self) -> Result<Vec<CustomerSummary>, Error> {
        let state = self.state.lock().unwrap();
        Ok(state
            .users
            .iter()
            .filter(|u| u.role == UserRole::Customer)
            .map(|u| CustomerSummary {
                id: u.id,
                name: u.name.clone(),
                email: u.email.clone(),
            })
            .collect())
    }

    async fn count_customers(&self) -> Result<i64, Error> {
        let state = self.state.lock().unwrap();
        Ok(state.users.iter().filter(|u| u.role == UserRole::Customer).count() as i64)
    }

    async fn save_user(
        &self,
        name: &str,
        email: &str,
        password: &str,
        role: UserRole,
    ) -> Result<User, Error> {
        let mut state = self.state.lock().unwrap();
        if state.users.iter().any(|u| u.email == email) {
            return Err(Error::RowNotFound);
        }
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            name: name.to_string(),
            email: email.to_string(),
            password: password.to_string(),
            role,
            remaining_support_seconds: crate::models::usermodel::DEFAULT_DAILY_SUPPORT_SECONDS,
            created_at: now,
            updated_at: now,
        };
        state.users.push(user.clone());
        Ok(user)
    }

    async fn get_support_seconds(&self, user_id: Uuid) -> Result<Option<i32>, Error> {
        let state = self.state.lock().unwrap();
        Ok(state
            .users
            .iter()
            .find(|u| u.id == user_id)
            .map(|u| u.remaining_support_seconds))
    }

    async fn deduct_support_seconds(
        &self,
        user_id: Uuid,
        seconds: i32,
    ) -> Result<Option<i32>, Error> {
        let mut state = self.state.lock().unwrap();
        let user = state
            .users
            .iter_mut()
            .find(|u| u.id == user_id && u.remaining_support_seconds > 0);

        Ok(user.map(|u| {
            u.remaining_support_seconds = (u.remaining_support_seconds - seconds).max(0);
            u.updated_at = Utc::now();
            u.remaining_support_seconds
        }))
    }

    async fn reset_customer_support_time(&self, seconds: i32) -> Result<u64, Error> {
        let mut state = self.state.lock().unwrap();
        let mut touched = 0;
        for user in state.users.iter_mut().filter(|u| u.role == UserRole::Customer) {
            user.remaining_support_seconds = seconds;
            touched += 1;
        }
        Ok(touched)
    }
}

#[async_trait]
impl TicketExt for MemoryDb {
    async fn create_ticket(
        &self,
        customer_id: Uuid,
        assigned_to: Option<Uuid>,
        title: String,
        tag_ids: Vec<Uuid>,
        first_message: NewTicketMessage,
    ) -> Result<(Ticket, TicketMessage), Error> {
        let mut state = self.state.lock().unwrap();
        let now = Utc::now();
        let ticket = Ticket {
            id: Uuid::new_v4(),
            customer_id,
            assigned_to,
            title,
            status: TicketStatus::Open,
            created_at: now,
            updated_at: now,
        };

        for tag_id in tag_ids {
            let known = state.tags.iter().any(|t| t.id == tag_id);
            let linked = state.ticket_tags.contains(&(ticket.id, tag_id));
            if known && !linked {
                state.ticket_tags.push((ticket.id, tag_id));
            }
        }

        let message = Self::build_message(ticket.id, first_message);
        state.tickets.push(ticket.clone());
        state.messages.push(message.clone());

        Ok((ticket, message))
    }

    async fn get_ticket(&self, ticket_id: Uuid) -> Result<Option<Ticket>, Error> {
        let state = self.state.lock().unwrap();
        Ok(state.tickets.iter().find(|t| t.id == ticket_id).cloned())
    }

    async fn get_tickets(
        &self,
        filter: &TicketFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Ticket>, Error> {
        let state = self.state.lock().unwrap();
        Ok(state
            .tickets
            .iter()
            .rev()
            .filter(|t| {
                let customer_name = state
                    .users
                    .iter()
                    .find(|u| u.id == t.customer_id)
                    .map(|u| u.name.as_str())
                    .unwrap_or_default();
                let tag_ids: Vec<Uuid> = state
                    .ticket_tags
                    .iter()
                    .filter(|(ticket_id, _)| *ticket_id == t.id)
                    .map(|(_, tag_id)| *tag_id)
                    .collect();
                filter.matches(t, customer_name, &tag_ids)
            })
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn get_ticket_tags(&self, ticket_id: Uuid) -> Result<Vec<Tag>, Error> {
        let state = self.state.lock().unwrap();
        Ok(state
            .ticket_tags
            .iter()
            .filter(|(t, _)| *t == ticket_id)
            .filter_map(|(_, tag_id)| state.tags.iter().find(|tag| tag.id == *tag_id).cloned())
            .collect())
    }

    async fn get_tags(&self, tag_ids: &[Uuid]) -> Result<Vec<Tag>, Error> {
        let state = self.state.lock().unwrap();
        Ok(state
            .tags
            .iter()
            .filter(|tag| tag_ids.contains(&tag.id))
            .cloned()
            .collect())
    }

    async fn sync_ticket_tags(&self, ticket_id: Uuid, tag_ids: Vec<Uuid>) -> Result<Vec<Tag>, Error> {
        {
            let mut state = self.state.lock().unwrap();
            state.ticket_tags.retain(|(t, _)| *t != ticket_id);
            for tag_id in tag_ids {
                let known = state.tags.iter().any(|t| t.id == tag_id);
                let linked = state.ticket_tags.contains(&(ticket_id, tag_id));
                if known && !linked {
                    state.ticket_tags.push((ticket_id, tag_id));
                }
            }
        }
        self.get_ticket_tags(ticket_id).await
    }

    async fn count_tickets_by_status(
        &self,
        customer_id: Option<Uuid>,
    ) -> Result<Vec<StatusCount>, Error> {
        let state = self.state.lock().unwrap();
        let mut counts: Vec<StatusCount> = Vec::new();
        for ticket in state
            .tickets
            .iter()
            .filter(|t| customer_id.map_or(true, |id| t.customer_id == id))
        {
            match counts.iter_mut().find(|c| c.status == ticket.status) {
                Some(count) => count.count += 1,
                None => counts.push(StatusCount {
                    status: ticket.status,
                    count: 1,
                }),
            }
        }
        Ok(counts)
    }

    async fn get_message_by_attachment(
        &self,
        ticket_id: Uuid,
        attachment_path: &str,
    ) -> Result<Option<TicketMessage>, Error> {
        let state = self.state.lock().unwrap();
        Ok(state
            .messages
            .iter()
            .find(|m| m.ticket_id == ticket_id && m.attachment_path.as_deref() == Some(attachment_path))
            .cloned())
    }

    async fn get_ticket_messages(&self, ticket_id: Uuid) -> Result<Vec<TicketMessage>, Error> {
        let state = self.state.lock().unwrap();
        Ok(state
            .messages
            .iter()
            .filter(|m| m.ticket_id == ticket_id)
            .cloned()
            .collect())
    }

    async fn assign_ticket(&self, ticket_id: Uuid, assigned_to: Uuid) -> Result<Option<Ticket>, Error> {
        let mut state = self.state.lock().unwrap();
        Ok(state
            .tickets
            .iter_mut()
            .find(|t| t.id == ticket_id && !t.status.is_terminal())
            .map(|ticket| {
                ticket.assigned_to = Some(assigned_to);
                ticket.updated_at = Utc::now();
                ticket.clone()
            }))
    }

    async fn update_ticket_status(
        &self,
        ticket_id: Uuid,
        expected: TicketStatus,
        status: TicketStatus,
    ) -> Result<Option<Ticket>, Error> {
        let mut state = self.state.lock().unwrap();
        Ok(state
            .tickets
            .iter_mut()
            .find(|t| t.id == ticket_id && t.status == expected)
            .map(|ticket| {
                ticket.status = status;
                ticket.updated_at = Utc::now();
                ticket.clone()
            }))
    }

    async fn add_ticket_message(
        &self,
        ticket_id: Uuid,
        message: NewTicketMessage,
    ) -> Result<TicketMessage, Error> {
        let mut state = self.state.lock().unwrap();
        if !state.tickets.iter().any(|t| t.id == ticket_id) {
            return Err(Error::RowNotFound);
        }
        let message = Self::build_message(ticket_id, message);
        state.messages.push(message.clone());
        Ok(message)
    }

    async fn delete_ticket(&self, ticket_id: Uuid) -> Result<bool, Error> {
        let mut state = self.state.lock().unwrap();
        let before = state.tickets.len();
        state.tickets.retain(|t| t.id != ticket_id);
        state.messages.retain(|m| m.ticket_id != ticket_id);
        state.ticket_tags.retain(|(t, _)| *t != ticket_id);
        state.notifications.retain(|n| n.ticket_id != ticket_id);
        Ok(state.tickets.len() < before)
    }
}

#[async_trait]
impl NotificationExt for MemoryDb {
    async fn store_notification(
        &self,
        user_id: Uuid,
        ticket_id: Uuid,
        kind: NotificationKind,
        title: String,
        body: String,
    ) -> Result<Notification, Error> {
        let notification = Notification {
            id: Uuid::new_v4(),
            user_id,
            ticket_id,
            kind,
            title,
            body,
            created_at: Utc::now(),
        };
        self.state.lock().unwrap().notifications.push(notification.clone());
        Ok(notification)
    }

    async fn get_user_notifications(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Notification>, Error> {
        let state = self.state.lock().unwrap();
        Ok(state
            .notifications
            .iter()
            .rev()
            .filter(|n| n.user_id == user_id)
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn delete_notification(
        &self,
        notification_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Notification>, Error> {
        let mut state = self.state.lock().unwrap();
        let position = state
            .notifications
            .iter()
            .position(|n| n.id == notification_id && n.user_id == user_id);
        Ok(position.map(|i| state.notifications.remove(i)))
    }

    async fn clear_notifications(&self, user_id: Uuid) -> Result<u64, Error> {
        let mut state = self.state.lock().unwrap();
        let before = state.notifications.len();
        state.notifications.retain(|n| n.user_id != user_id);
        Ok((before - state.notifications.len()) as u64)
    }

    async fn upsert_fcm_token(
        &self,
        user_id: Uuid,
        token: String,
        device_type: String,
    ) -> Result<FcmToken, Error> {
        let mut state = self.state.lock().unwrap();
        let now = Utc::now();
        if let Some(existing) = state.fcm_tokens.iter_mut().find(|t| t.token == token) {
            existing.user_id = user_id;
            existing.device_type = device_type;
            existing.updated_at = now;
            return Ok(existing.clone());
        }
        let record = FcmToken {
            id: Uuid::new_v4(),
            user_id,
            token,
            device_type,
            created_at: now,
            updated_at: now,
        };
        state.fcm_tokens.push(record.clone());
        Ok(record)
    }

    async fn get_fcm_tokens(&self, user_id: Uuid) -> Result<Vec<String>, Error> {
        let state = self.state.lock().unwrap();
        Ok(state
            .fcm_tokens
            .iter()
            .filter(|t| t.user_id == user_id)
            .map(|t| t.token.clone())
            .collect())
    }

    async fn delete_fcm_token(&self, token: &str) -> Result<(), Error> {
        self.state.lock().unwrap().fcm_tokens.retain(|t| t.token != token);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opening(user_id: Uuid) -> NewTicketMessage {
        NewTicketMessage {
            user_id,
            message: "Help".to_string(),
            attachment_path: None,
            is_system: false,
        }
    }

    #[tokio::test]
    async fn test_status_write_with_stale_expectation_is_refused() {
        let db = MemoryDb::new();
        let customer = db.insert_user("Carol", UserRole::Customer, 1800);
        let (ticket, _) = db
            .create_ticket(customer.id, None, "T".to_string(), vec![], opening(customer.id))
            .await
            .unwrap();

        let moved = db
            .update_ticket_status(ticket.id, TicketStatus::Open, TicketStatus::InProgress)
            .await
            .unwrap();
        assert_eq!(moved.map(|t| t.status), Some(TicketStatus::InProgress));

        db.set_status(ticket.id, TicketStatus::Resolved);
        let stale = db
            .update_ticket_status(ticket.id, TicketStatus::InProgress, TicketStatus::Open)
            .await
            .unwrap();
        assert!(stale.is_none());
        assert_eq!(
            db.get_ticket(ticket.id).await.unwrap().unwrap().status,
            TicketStatus::Resolved
        );

        let missing = db
            .update_ticket_status(Uuid::new_v4(), TicketStatus::Open, TicketStatus::InProgress)
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_assign_skips_terminal_and_missing_tickets() {
        let db = MemoryDb::new();
        let customer = db.insert_user("Carol", UserRole::Customer, 1800);
        let supporter = db.insert_user("Sam", UserRole::Supporter, 0);
        let (ticket, _) = db
            .create_ticket(customer.id, None, "T".to_string(), vec![], opening(customer.id))
            .await
            .unwrap();

        db.set_status(ticket.id, TicketStatus::Closed);
        assert!(db.assign_ticket(ticket.id, supporter.id).await.unwrap().is_none());
        assert!(db.assign_ticket(Uuid::new_v4(), supporter.id).await.unwrap().is_none());
        assert_eq!(db.get_ticket(ticket.id).await.unwrap().unwrap().assigned_to, None);
    }
}
