// db/ticketdb.rs
use async_trait::async_trait;
use sqlx::{Error, Postgres, QueryBuilder};
use uuid::Uuid;

use super::db::DBClient;
use crate::models::ticketmodel::*;

const TICKET_COLUMNS: &str = r#"
    id, customer_id, assigned_to, title, status, created_at, updated_at
"#;

const MESSAGE_COLUMNS: &str = r#"
    id, ticket_id, user_id, message, attachment_path, is_system, created_at
"#;

#[async_trait]
pub trait TicketExt {
    /// Inserts the ticket, links its tags and writes the opening message in
    /// one transaction.
    async fn create_ticket(
        &self,
        customer_id: Uuid,
        assigned_to: Option<Uuid>,
        title: String,
        tag_ids: Vec<Uuid>,
        first_message: NewTicketMessage,
    ) -> Result<(Ticket, TicketMessage), Error>;

    async fn get_ticket(
        &self,
        ticket_id: Uuid,
    ) -> Result<Option<Ticket>, Error>;

    /// Newest first.
    async fn get_tickets(
        &self,
        filter: &TicketFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Ticket>, Error>;

    async fn get_ticket_tags(
        &self,
        ticket_id: Uuid,
    ) -> Result<Vec<Tag>, Error>;

    /// The subset of `tag_ids` that exist.
    async fn get_tags(
        &self,
        tag_ids: &[Uuid],
    ) -> Result<Vec<Tag>, Error>;

    /// Replaces the ticket's tag links with exactly `tag_ids`.
    async fn sync_ticket_tags(
        &self,
        ticket_id: Uuid,
        tag_ids: Vec<Uuid>,
    ) -> Result<Vec<Tag>, Error>;

    /// Ticket counts grouped by status, optionally for one customer.
    async fn count_tickets_by_status(
        &self,
        customer_id: Option<Uuid>,
    ) -> Result<Vec<StatusCount>, Error>;

    /// Messages in the order they were persisted.
    async fn get_ticket_messages(
        &self,
        ticket_id: Uuid,
    ) -> Result<Vec<TicketMessage>, Error>;

    /// The message on this ticket that carries `attachment_path`.
    async fn get_message_by_attachment(
        &self,
        ticket_id: Uuid,
        attachment_path: &str,
    ) -> Result<Option<TicketMessage>, Error>;

    /// Sets the assignee unless the ticket is resolved or closed. `None`
    /// when the ticket is gone or already terminal.
    async fn assign_ticket(
        &self,
        ticket_id: Uuid,
        assigned_to: Uuid,
    ) -> Result<Option<Ticket>, Error>;

    /// Moves the ticket to `status` only while it still has `expected`.
    /// `None` when the ticket is gone or its status changed underneath.
    async fn update_ticket_status(
        &self,
        ticket_id: Uuid,
        expected: TicketStatus,
        status: TicketStatus,
    ) -> Result<Option<Ticket>, Error>;

    async fn add_ticket_message(
        &self,
        ticket_id: Uuid,
        message: NewTicketMessage,
    ) -> Result<TicketMessage, Error>;

    /// Hard delete; messages, tag links and notifications cascade.
    async fn delete_ticket(
        &self,
        ticket_id: Uuid,
    ) -> Result<bool, Error>;
}

#[async_trait]
impl TicketExt for DBClient {
    async fn create_ticket(
        &self,
        customer_id: Uuid,
        assigned_to: Option<Uuid>,
        title: String,
        tag_ids: Vec<Uuid>,
        first_message: NewTicketMessage,
    ) -> Result<(Ticket, TicketMessage), Error> {
        let mut tx = self.pool.begin().await?;

        let ticket = sqlx::query_as::<_, Ticket>(&format!(
            r#"
            INSERT INTO tickets (customer_id, assigned_to, title, status)
            VALUES ($1, $2, $3, $4)
            RETURNING {}
            "#,
            TICKET_COLUMNS
        ))
        .bind(customer_id)
        .bind(assigned_to)
        .bind(title)
        .bind(TicketStatus::Open)
        .fetch_one(&mut *tx)
        .await?;

        if !tag_ids.is_empty() {
            sqlx::query(
                r#"
                INSERT INTO ticket_tags (ticket_id, tag_id)
                SELECT $1, t.id FROM tags t WHERE t.id = ANY($2)
                ON CONFLICT DO NOTHING
                "#
            )
            .bind(ticket.id)
            .bind(&tag_ids)
            .execute(&mut *tx)
            .await?;
        }

        let message = sqlx::query_as::<_, TicketMessage>(&format!(
            r#"
            INSERT INTO ticket_messages (ticket_id, user_id, message, attachment_path, is_system)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {}
            "#,
            MESSAGE_COLUMNS
        ))
        .bind(ticket.id)
        .bind(first_message.user_id)
        .bind(first_message.message)
        .bind(first_message.attachment_path)
        .bind(first_message.is_system)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok((ticket, message))
    }

    async fn get_ticket(
        &self,
        ticket_id: Uuid,
    ) -> Result<Option<Ticket>, Error> {
        sqlx::query_as::<_, Ticket>(&format!(
            "SELECT {} FROM tickets WHERE id = $1",
            TICKET_COLUMNS
        ))
        .bind(ticket_id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn get_tickets(
        &self,
        filter: &TicketFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Ticket>, Error> {
        let mut query = QueryBuilder::<Postgres>::new(format!(
            "SELECT {} FROM tickets WHERE TRUE",
            TICKET_COLUMNS
        ));

        if let Some(customer_id) = filter.customer_id {
            query.push(" AND customer_id = ").push_bind(customer_id);
        }

        if let Some(search) = &filter.search {
            let pattern = format!("%{}%", search);
            query.push(" AND (title ILIKE ").push_bind(pattern.clone());
            if filter.search_customer_name {
                query
                    .push(" OR EXISTS (SELECT 1 FROM users u WHERE u.id = tickets.customer_id AND u.name ILIKE ")
                    .push_bind(pattern)
                    .push(")");
            }
            query.push(")");
        }

        if let Some(status) = filter.status {
            query.push(" AND status = ").push_bind(status);
        }

        if !filter.customer_ids.is_empty() {
            query
                .push(" AND customer_id = ANY(")
                .push_bind(filter.customer_ids.clone())
                .push(")");
        }

        if filter.has_assignee_condition() {
            query.push(" AND (FALSE");
            if filter.unassigned {
                query.push(" OR assigned_to IS NULL");
            }
            if let Some(assignee) = filter.assignee {
                query.push(" OR assigned_to = ").push_bind(assignee);
            }
            query.push(")");
        }

        if !filter.tag_ids.is_empty() {
            query
                .push(" AND EXISTS (SELECT 1 FROM ticket_tags tt WHERE tt.ticket_id = tickets.id AND tt.tag_id = ANY(")
                .push_bind(filter.tag_ids.clone())
                .push("))");
        }

        query
            .push(" ORDER BY created_at DESC LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);

        query
            .build_query_as::<Ticket>()
            .fetch_all(&self.pool)
            .await
    }

    async fn get_ticket_tags(
        &self,
        ticket_id: Uuid,
    ) -> Result<Vec<Tag>, Error> {
        sqlx::query_as::<_, Tag>(
            r#"
            SELECT t.id, t.name, t.color
            FROM tags t
            JOIN ticket_tags tt ON tt.tag_id = t.id
            WHERE tt.ticket_id = $1
            ORDER BY t.name ASC
            "#
        )
        .bind(ticket_id)
        .fetch_all(&self.pool)
        .await
    }

    async fn get_tags(
        &self,
        tag_ids: &[Uuid],
    ) -> Result<Vec<Tag>, Error> {
        sqlx::query_as::<_, Tag>(
            r#"
            SELECT id, name, color
            FROM tags
            WHERE id = ANY($1)
            ORDER BY name ASC
            "#
        )
        .bind(tag_ids)
        .fetch_all(&self.pool)
        .await
    }

    async fn sync_ticket_tags(
        &self,
        ticket_id: Uuid,
        tag_ids: Vec<Uuid>,
    ) -> Result<Vec<Tag>, Error> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM ticket_tags WHERE ticket_id = $1")
            .bind(ticket_id)
            .execute(&mut *tx)
            .await?;

        if !tag_ids.is_empty() {
            sqlx::query(
                r#"
                INSERT INTO ticket_tags (ticket_id, tag_id)
                SELECT $1, t.id FROM tags t WHERE t.id = ANY($2)
                ON CONFLICT DO NOTHING
                "#
            )
            .bind(ticket_id)
            .bind(&tag_ids)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query("UPDATE tickets SET updated_at = CURRENT_TIMESTAMP WHERE id = $1")
            .bind(ticket_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        self.get_ticket_tags(ticket_id).await
    }

    async fn count_tickets_by_status(
        &self,
        customer_id: Option<Uuid>,
    ) -> Result<Vec<StatusCount>, Error> {
        sqlx::query_as::<_, StatusCount>(
            r#"
            SELECT status, COUNT(*) AS count
            FROM tickets
            WHERE ($1::uuid IS NULL OR customer_id = $1)
            GROUP BY status
            "#
        )
        .bind(customer_id)
        .fetch_all(&self.pool)
        .await
    }

    async fn get_ticket_messages(
        &self,
        ticket_id: Uuid,
    ) -> Result<Vec<TicketMessage>, Error> {
        sqlx::query_as::<_, TicketMessage>(&format!(
            r#"
            SELECT {} FROM ticket_messages
            WHERE ticket_id = $1
            ORDER BY seq ASC
            "#,
            MESSAGE_COLUMNS
        ))
        .bind(ticket_id)
        .fetch_all(&self.pool)
        .await
    }

    async fn get_message_by_attachment(
        &self,
        ticket_id: Uuid,
        attachment_path: &str,
    ) -> Result<Option<TicketMessage>, Error> {
        sqlx::query_as::<_, TicketMessage>(&format!(
            r#"
            SELECT {} FROM ticket_messages
            WHERE ticket_id = $1 AND attachment_path = $2
            LIMIT 1
            "#,
            MESSAGE_COLUMNS
        ))
        .bind(ticket_id)
        .bind(attachment_path)
        .fetch_optional(&self.pool)
        .await
    }

    async fn assign_ticket(
        &self,
        ticket_id: Uuid,
        assigned_to: Uuid,
    ) -> Result<Option<Ticket>, Error> {
        sqlx::query_as::<_, Ticket>(&format!(
            r#"
            UPDATE tickets
            SET assigned_to = $1, updated_at = CURRENT_TIMESTAMP
            WHERE id = $2 AND status NOT IN ('resolved', 'closed')
            RETURNING {}
            "#,
            TICKET_COLUMNS
        ))
        .bind(assigned_to)
        .bind(ticket_id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn update_ticket_status(
        &self,
        ticket_id: Uuid,
        expected: TicketStatus,
        status: TicketStatus,
    ) -> Result<Option<Ticket>, Error> {
        sqlx::query_as::<_, Ticket>(&format!(
            r#"
            UPDATE tickets
            SET status = $1, updated_at = CURRENT_TIMESTAMP
            WHERE id = $2 AND status = $3
            RETURNING {}
            "#,
            TICKET_COLUMNS
        ))
        .bind(status)
        .bind(ticket_id)
        .bind(expected)
        .fetch_optional(&self.pool)
        .await
    }

    async fn add_ticket_message(
        &self,
        ticket_id: Uuid,
        message: NewTicketMessage,
    ) -> Result<TicketMessage, Error> {
        sqlx::query_as::<_, TicketMessage>(&format!(
            r#"
            INSERT INTO ticket_messages (ticket_id, user_id, message, attachment_path, is_system)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {}
            "#,
            MESSAGE_COLUMNS
        ))
        .bind(ticket_id)
        .bind(message.user_id)
        .bind(message.message)
        .bind(message.attachment_path)
        .bind(message.is_system)
        .fetch_one(&self.pool)
        .await
    }

    async fn delete_ticket(
        &self,
        ticket_id: Uuid,
    ) -> Result<bool, Error> {
        let result = sqlx::query("DELETE FROM tickets WHERE id = $1")
            .bind(ticket_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
