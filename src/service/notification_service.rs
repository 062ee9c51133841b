// services/notification_service.rs
use std::sync::Arc;

use uuid::Uuid;

use crate::{
    db::HelpdeskDb,
    mail::{
        mails::{create_ticket_link, ticket_notification_email},
        sendmail::MailSender,
    },
    models::{
        notificationmodel::{Notification, NotificationKind},
        ticketmodel::Ticket,
        usermodel::{FcmToken, User},
    },
    service::{
        error::ServiceError,
        push::{PushError, PushMessage, PushSender},
        realtime::{user_topic, RealtimeBus, RealtimeEvent},
    },
};

/// Delivers a notification to one user over every configured channel:
/// inbox row, `user.<id>` realtime topic, device push, email. A failing
/// channel is logged and skipped; callers never see delivery errors.
#[derive(Debug, Clone)]
pub struct NotificationService {
    db: Arc<dyn HelpdeskDb>,
    bus: RealtimeBus,
    push: Option<Arc<dyn PushSender>>,
    mailer: Option<Arc<dyn MailSender>>,
    app_url: String,
}

impl NotificationService {
    pub fn new(db: Arc<dyn HelpdeskDb>, bus: RealtimeBus, app_url: String) -> Self {
        Self {
            db,
            bus,
            push: None,
            mailer: None,
            app_url,
        }
    }

    pub fn with_push(mut self, push: Arc<dyn PushSender>) -> Self {
        self.push = Some(push);
        self
    }

    pub fn with_mailer(mut self, mailer: Arc<dyn MailSender>) -> Self {
        self.mailer = Some(mailer);
        self
    }

    pub async fn notify(
        &self,
        recipient: &User,
        ticket: &Ticket,
        kind: NotificationKind,
        title: String,
        body: String,
    ) -> Option<Notification> {
        tracing::info!(
            "Notifying user {} ({}) about ticket {}",
            recipient.id,
            kind.to_str(),
            ticket.id
        );

        let stored = match self
            .db
            .store_notification(recipient.id, ticket.id, kind, title.clone(), body.clone())
            .await
        {
            Ok(notification) => Some(notification),
            Err(e) => {
                tracing::warn!("Failed to store notification for {}: {}", recipient.id, e);
                None
            }
        };

        if let Some(notification) = &stored {
            self.bus
                .publish(
                    &user_topic(recipient.id),
                    RealtimeEvent::Notification {
                        notification: notification.clone(),
                    },
                )
                .await;
        }

        if self.push.is_some() {
            let this = self.clone();
            let user_id = recipient.id;
            let message = PushMessage {
                title: title.clone(),
                body: body.clone(),
                ticket_id: ticket.id.to_string(),
                kind: kind.to_str().to_string(),
            };
            tokio::spawn(async move {
                this.deliver_push(user_id, &message).await;
            });
        }

        if let Some(mailer) = self.mailer.clone() {
            let link = create_ticket_link(&self.app_url, &ticket.id.to_string());
            let (subject, html) =
                ticket_notification_email(&recipient.name, &title, &body, &ticket.title, &link);
            let to_email = recipient.email.clone();
            tokio::spawn(async move {
                if let Err(e) = mailer.send(&to_email, &subject, &html).await {
                    tracing::warn!("Notification email to {} failed: {}", to_email, e);
                }
            });
        }

        stored
    }

    /// Sends to every device of `user_id`. Tokens the provider reports as
    /// unregistered are deleted. Returns how many sends succeeded.
    pub async fn deliver_push(&self, user_id: Uuid, message: &PushMessage) -> usize {
        let Some(push) = &self.push else {
            return 0;
        };

        let tokens = match self.db.get_fcm_tokens(user_id).await {
            Ok(tokens) => tokens,
            Err(e) => {
                tracing::warn!("Failed to load device tokens for {}: {}", user_id, e);
                return 0;
            }
        };

        let mut delivered = 0;
        for token in tokens {
            match push.send(&token, message).await {
                Ok(()) => delivered += 1,
                Err(PushError::Unregistered) => {
                    tracing::info!("Removing unregistered device token for user {}", user_id);
                    if let Err(e) = self.db.delete_fcm_token(&token).await {
                        tracing::warn!("Failed to delete device token: {}", e);
                    }
                }
                Err(e) => tracing::warn!("Push to user {} failed: {}", user_id, e),
            }
        }

        delivered
    }

    pub async fn list(
        &self,
        user: &User,
        page: u32,
        limit: usize,
    ) -> Result<Vec<Notification>, ServiceError> {
        let offset = (page.max(1) - 1) as i64 * limit as i64;
        let notifications = self
            .db
            .get_user_notifications(user.id, limit as i64, offset)
            .await?;
        Ok(notifications)
    }

    /// Acknowledging deletes the entry. Returns the ticket it pointed at so
    /// the client can navigate there.
    pub async fn acknowledge(&self, user: &User, notification_id: Uuid) -> Result<Uuid, ServiceError> {
        let removed = self
            .db
            .delete_notification(notification_id, user.id)
            .await?
            .ok_or(ServiceError::NotificationNotFound(notification_id))?;

        Ok(removed.ticket_id)
    }

    pub async fn clear(&self, user: &User) -> Result<u64, ServiceError> {
        Ok(self.db.clear_notifications(user.id).await?)
    }

    pub async fn register_device_token(
        &self,
        user: &User,
        token: String,
        device_type: Option<String>,
    ) -> Result<FcmToken, ServiceError> {
        let token = token.trim().to_string();
        if token.is_empty() {
            return Err(ServiceError::validation("token", "Device token is required"));
        }

        let device_type = device_type
            .map(|d| d.trim().to_lowercase())
            .filter(|d| !d.is_empty())
            .unwrap_or_else(|| "web".to_string());

        Ok(self.db.upsert_fcm_token(user.id, token, device_type).await?)
    }
}
