// service/realtime.rs
use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{broadcast, RwLock};
use uuid::Uuid;

use crate::{
    models::{
        notificationmodel::Notification,
        ticketmodel::{Ticket, TicketMessage},
        usermodel::User,
    },
    service::{
        authorization,
        error::{Denial, ServiceError},
    },
};

const TOPIC_CAPACITY: usize = 256;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RealtimeEvent {
    MessageCreated {
        message: TicketMessage,
    },
    SupportTimeUpdated {
        ticket_id: Uuid,
        remaining_seconds: i32,
    },
    Notification {
        notification: Notification,
    },
}

pub fn ticket_topic(ticket_id: Uuid) -> String {
    format!("ticket.{}", ticket_id)
}

pub fn user_topic(user_id: Uuid) -> String {
    format!("user.{}", user_id)
}

/// Fire-and-forget topic fan-out. Events reach whoever is subscribed at
/// publish time; nothing is retained for late or disconnected listeners.
/// A single topic delivers events in publish order.
#[derive(Debug, Clone, Default)]
pub struct RealtimeBus {
    channels: Arc<RwLock<HashMap<String, broadcast::Sender<RealtimeEvent>>>>,
}

impl RealtimeBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns how many live subscribers received the event.
    pub async fn publish(&self, topic: &str, event: RealtimeEvent) -> usize {
        let mut channels = self.channels.write().await;

        let Some(sender) = channels.get(topic) else {
            return 0;
        };

        match sender.send(event) {
            Ok(receivers) => receivers,
            Err(_) => {
                // every receiver went away
                channels.remove(topic);
                0
            }
        }
    }

    pub async fn subscribe(&self, topic: &str) -> broadcast::Receiver<RealtimeEvent> {
        let mut channels = self.channels.write().await;

        channels
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(TOPIC_CAPACITY).0)
            .subscribe()
    }

    /// Joins `ticket.<id>` only if the subscriber may view the ticket.
    pub async fn subscribe_ticket(
        &self,
        subscriber: &User,
        ticket: &Ticket,
    ) -> Result<broadcast::Receiver<RealtimeEvent>, ServiceError> {
        if !authorization::can_view(subscriber, ticket) {
            return Err(ServiceError::Forbidden(Denial::NotTicketOwner));
        }

        Ok(self.subscribe(&ticket_topic(ticket.id)).await)
    }

    /// Drops the topic once its last subscriber is gone.
    pub async fn prune(&self, topic: &str) -> bool {
        let mut channels = self.channels.write().await;

        match channels.get(topic) {
            Some(sender) if sender.receiver_count() == 0 => {
                channels.remove(topic);
                true
            }
            _ => false,
        }
    }

    /// Removes the topic outright. Live subscribers see the channel close.
    pub async fn close_topic(&self, topic: &str) {
        self.channels.write().await.remove(topic);
    }

    pub async fn topic_count(&self) -> usize {
        self.channels.read().await.len()
    }
}
