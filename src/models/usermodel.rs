// models/usermodel.rs
use chrono::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Full daily support allowance, in seconds (30 minutes).
pub const DEFAULT_DAILY_SUPPORT_SECONDS: i32 = 1800;

#[derive(Debug, Deserialize, Serialize, Clone, Copy, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "user_role", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Customer,
    Supporter,
    Admin,
}

impl UserRole {
    pub fn to_str(&self) -> &str {
        match self {
            UserRole::Customer => "customer",
            UserRole::Supporter => "supporter",
            UserRole::Admin => "admin",
        }
    }

    /// Staff roles work tickets: claim, reply as agent, meter time, delete.
    pub fn is_supporter(&self) -> bool {
        match self {
            UserRole::Supporter | UserRole::Admin => true,
            UserRole::Customer => false,
        }
    }

    pub fn is_customer(&self) -> bool {
        matches!(self, UserRole::Customer)
    }
}

#[derive(Debug, Deserialize, Serialize, sqlx::FromRow, Clone)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub role: UserRole,
    pub remaining_support_seconds: i32,

    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,

    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn is_supporter(&self) -> bool {
        self.role.is_supporter()
    }

    pub fn is_customer(&self) -> bool {
        self.role.is_customer()
    }
}

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct CustomerSummary {
    pub id: Uuid,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct FcmToken {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token: String,
    pub device_type: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
