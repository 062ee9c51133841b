// db/notificationdb.rs
use async_trait::async_trait;
use sqlx::Error;
use uuid::Uuid;

use super::db::DBClient;
use crate::models::{
    notificationmodel::{Notification, NotificationKind},
    usermodel::FcmToken,
};

#[async_trait]
pub trait NotificationExt {
    async fn store_notification(
        &self,
        user_id: Uuid,
        ticket_id: Uuid,
        kind: NotificationKind,
        title: String,
        body: String,
    ) -> Result<Notification, Error>;

    async fn get_user_notifications(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Notification>, Error>;

    /// Removes one inbox entry owned by `user_id`, returning what was removed.
    async fn delete_notification(
        &self,
        notification_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Notification>, Error>;

    async fn clear_notifications(
        &self,
        user_id: Uuid,
    ) -> Result<u64, Error>;

    /// Registers a device token, moving it to `user_id` if another account
    /// had it (shared device).
    async fn upsert_fcm_token(
        &self,
        user_id: Uuid,
        token: String,
        device_type: String,
    ) -> Result<FcmToken, Error>;

    async fn get_fcm_tokens(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<String>, Error>;

    async fn delete_fcm_token(
        &self,
        token: &str,
    ) -> Result<(), Error>;
}

#[async_trait]
impl NotificationExt for DBClient {
    async fn store_notification(
        &self,
        user_id: Uuid,
        ticket_id: Uuid,
        kind: NotificationKind,
        title: String,
        body: String,
    ) -> Result<Notification, Error> {
        sqlx::query_as::<_, Notification>(
            r#"
            INSERT INTO notifications (user_id, ticket_id, kind, title, body, created_at)
            VALUES ($1, $2, $3, $4, $5, NOW())
            RETURNING id, user_id, ticket_id, kind, title, body, created_at
            "#
        )
        .bind(user_id)
        .bind(ticket_id)
        .bind(kind)
        .bind(title)
        .bind(body)
        .fetch_one(&self.pool)
        .await
    }

    async fn get_user_notifications(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Notification>, Error> {
        sqlx::query_as::<_, Notification>(
            r#"
            SELECT id, user_id, ticket_id, kind, title, body, created_at
            FROM notifications
            WHERE user_id = $1
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#
        )
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
    }

    async fn delete_notification(
        &self,
        notification_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Notification>, Error> {
        sqlx::query_as::<_, Notification>(
            r#"
            DELETE FROM notifications
            WHERE id = $1 AND user_id = $2
            RETURNING id, user_id, ticket_id, kind, title, body, created_at
            "#
        )
        .bind(notification_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn clear_notifications(
        &self,
        user_id: Uuid,
    ) -> Result<u64, Error> {
        let result = sqlx::query("DELETE FROM notifications WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn upsert_fcm_token(
        &self,
        user_id: Uuid,
        token: String,
        device_type: String,
    ) -> Result<FcmToken, Error> {
        sqlx::query_as::<_, FcmToken>(
            r#"
            INSERT INTO fcm_tokens (user_id, token, device_type)
            VALUES ($1, $2, $3)
            ON CONFLICT (token) DO UPDATE
            SET user_id = EXCLUDED.user_id,
                device_type = EXCLUDED.device_type,
                updated_at = NOW()
            RETURNING id, user_id, token, device_type, created_at, updated_at
            "#
        )
        .bind(user_id)
        .bind(token)
        .bind(device_type)
        .fetch_one(&self.pool)
        .await
    }

    async fn get_fcm_tokens(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<String>, Error> {
        sqlx::query_scalar::<_, String>(
            "SELECT token FROM fcm_tokens WHERE user_id = $1"
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
    }

    async fn delete_fcm_token(
        &self,
        token: &str,
    ) -> Result<(), Error> {
        sqlx::query("DELETE FROM fcm_tokens WHERE token = $1")
            .bind(token)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
