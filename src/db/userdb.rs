// db/userdb.rs
use async_trait::async_trait;
use sqlx::Error;
use uuid::Uuid;

use super::db::DBClient;
use crate::models::usermodel::{CustomerSummary, User, UserRole};

const USER_COLUMNS: &str = r#"
    id, name, email, password, role, remaining_support_seconds, created_at, updated_at
"#;

#[async_trait]
pub trait UserExt {
    async fn get_user(
        &self,
        user_id: Option<Uuid>,
        email: Option<&str>,
    ) -> Result<Option<User>, Error>;

    async fn get_customers(&self) -> Result<Vec<CustomerSummary>, Error>;

    async fn count_customers(&self) -> Result<i64, Error>;

    async fn save_user(
        &self,
        name: &str,
        email: &str,
        password: &str,
        role: UserRole,
    ) -> Result<User, Error>;

    async fn get_support_seconds(&self, user_id: Uuid) -> Result<Option<i32>, Error>;

    /// Atomically lowers the balance by `seconds`, flooring at zero. Returns
    /// `None` when the balance was already exhausted (or the user is gone),
    /// in which case nothing was written.
    async fn deduct_support_seconds(
        &self,
        user_id: Uuid,
        seconds: i32,
    ) -> Result<Option<i32>, Error>;

    /// Overwrites every customer's balance. Returns the number of rows touched.
    async fn reset_customer_support_time(&self, seconds: i32) -> Result<u64, Error>;
}

#[async_trait]
impl UserExt for DBClient {
    async fn get_user(
        &self,
        user_id: Option<Uuid>,
        email: Option<&str>,
    ) -> Result<Option<User>, Error> {
        let mut user: Option<User> = None;

        if let Some(user_id) = user_id {
            user = sqlx::query_as::<_, User>(&format!(
                "SELECT {} FROM users WHERE id = $1",
                USER_COLUMNS
            ))
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        } else if let Some(email) = email {
            user = sqlx::query_as::<_, User>(&format!(
                "SELECT {} FROM users WHERE email = $1",
                USER_COLUMNS
            ))
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        }

        Ok(user)
    }

    async fn get_customers(&self) -> Result<Vec<CustomerSummary>, Error> {
        sqlx::query_as::<_, CustomerSummary>(
            r#"
            SELECT id, name, email
            FROM users
            WHERE role = $1
            ORDER BY name ASC
            "#
        )
        .bind(UserRole::Customer)
        .fetch_all(&self.pool)
        .await
    }

    async fn count_customers(&self) -> Result<i64, Error> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE role = $1")
            .bind(UserRole::Customer)
            .fetch_one(&self.pool)
            .await
    }

    async fn save_user(
        &self,
        name: &str,
        email: &str,
        password: &str,
        role: UserRole,
    ) -> Result<User, Error> {
        sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (name, email, password, role)
            VALUES ($1, $2, $3, $4)
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(name)
        .bind(email)
        .bind(password)
        .bind(role)
        .fetch_one(&self.pool)
        .await
    }

    async fn get_support_seconds(&self, user_id: Uuid) -> Result<Option<i32>, Error> {
        sqlx::query_scalar::<_, i32>(
            r#"
            SELECT remaining_support_seconds FROM users WHERE id = $1
            "#
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn deduct_support_seconds(
        &self,
        user_id: Uuid,
        seconds: i32,
    ) -> Result<Option<i32>, Error> {
        // Single statement: the row lock taken by UPDATE serialises concurrent ticks.
        sqlx::query_scalar::<_, i32>(
            r#"
            UPDATE users
            SET remaining_support_seconds = GREATEST(0, remaining_support_seconds - $2),
                updated_at = NOW()
            WHERE id = $1 AND remaining_support_seconds > 0
            RETURNING remaining_support_seconds
            "#
        )
        .bind(user_id)
        .bind(seconds)
        .fetch_optional(&self.pool)
        .await
    }

    async fn reset_customer_support_time(&self, seconds: i32) -> Result<u64, Error> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET remaining_support_seconds = $1, updated_at = NOW()
            WHERE role = $2
            "#
        )
        .bind(seconds)
        .bind(UserRole::Customer)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
