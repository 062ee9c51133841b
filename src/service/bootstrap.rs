// service/bootstrap.rs
use crate::{
    db::HelpdeskDb,
    models::usermodel::{User, UserRole},
    service::error::ServiceError,
    utils::password,
};

/// Creates the first admin account if no user owns `email` yet. Returns the
/// new user, or `None` when the account already exists.
pub async fn ensure_admin_user(
    db: &dyn HelpdeskDb,
    email: &str,
    plain_password: &str,
) -> Result<Option<User>, ServiceError> {
    let email = email.trim().to_lowercase();
    if !email.contains('@') {
        return Err(ServiceError::validation("email", "Admin email is invalid"));
    }

    if db.get_user(None, Some(&email)).await?.is_some() {
        return Ok(None);
    }

    let hashed = password::hash(plain_password)
        .map_err(|e| ServiceError::validation("password", e.to_string()))?;

    let user = db.save_user("Administrator", &email, &hashed, UserRole::Admin).await?;
    tracing::info!("Created admin account {}", user.email);

    Ok(Some(user))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::MemoryDb;

    #[tokio::test]
    async fn test_creates_admin_once() {
        let db = MemoryDb::new();

        let created = ensure_admin_user(&db, " Admin@Example.com ", "s3cret")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(created.email, "admin@example.com");
        assert_eq!(created.role, UserRole::Admin);
        assert!(password::compare("s3cret", &created.password).unwrap());

        let again = ensure_admin_user(&db, "admin@example.com", "other").await.unwrap();
        assert!(again.is_none());
    }

    #[tokio::test]
    async fn test_rejects_empty_password() {
        let db = MemoryDb::new();
        let err = ensure_admin_user(&db, "admin@example.com", "").await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation { field: "password", .. }));
    }
}
