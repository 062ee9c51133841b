// config.rs
use crate::models::usermodel::DEFAULT_DAILY_SUPPORT_SECONDS;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub app_url: String,
    pub jwt_secret: String,
    pub jwt_maxage: i64,
    pub port: u16,
    pub allowed_origins: Vec<String>,
    // Support time metering
    pub daily_support_seconds: i32,
    pub heartbeat_seconds: i32,
    pub emit_noop_status_message: bool,
    // Attachments
    pub attachment_dir: String,
    // Push / mail channels, disabled when unset
    pub fcm_project_id: Option<String>,
    pub fcm_access_token: Option<String>,
    pub resend_api_key: Option<String>,
    pub smtp_host: Option<String>,
    pub smtp_port: u16,
    pub smtp_username: String,
    pub smtp_password: String,
    pub from_email: String,
    // First admin account, created at startup when both are set
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
}

impl Config {
    pub fn init() -> Config {
        let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
        let jwt_secret = std::env::var("JWT_SECRET_KEY").expect("JWT_SECRET_KEY must be set");
        let jwt_maxage = std::env::var("JWT_MAXAGE").expect("JWT_MAXAGE must be set");
        let app_url = std::env::var("APP_URL")
            .unwrap_or_else(|_| "http://localhost:5173".to_string());

        let port = std::env::var("PORT")
            .ok()
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(8000);

        let allowed_origins = std::env::var("ALLOWED_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173,http://localhost:8000".to_string())
            .split(',')
            .map(|origin| origin.trim().to_string())
            .filter(|origin| !origin.is_empty())
            .collect();

        let daily_support_seconds = std::env::var("DAILY_SUPPORT_SECONDS")
            .ok()
            .and_then(|s| s.parse::<i32>().ok())
            .filter(|s| *s >= 0)
            .unwrap_or(DEFAULT_DAILY_SUPPORT_SECONDS);
        let heartbeat_seconds = std::env::var("HEARTBEAT_SECONDS")
            .ok()
            .and_then(|s| s.parse::<i32>().ok())
            .filter(|s| *s > 0)
            .unwrap_or(5);
        let emit_noop_status_message = std::env::var("EMIT_NOOP_STATUS_MESSAGE")
            .map(|v| v != "false" && v != "0")
            .unwrap_or(true);

        let attachment_dir = std::env::var("ATTACHMENT_DIR")
            .unwrap_or_else(|_| "storage/attachments".to_string());

        let fcm_project_id = std::env::var("FCM_PROJECT_ID").ok().filter(|v| !v.is_empty());
        let fcm_access_token = std::env::var("FCM_ACCESS_TOKEN").ok().filter(|v| !v.is_empty());

        // Email service configurations (with defaults)
        let resend_api_key = std::env::var("RESEND_API_KEY").ok().filter(|v| !v.is_empty());
        let smtp_host = std::env::var("SMTP_HOST").ok().filter(|v| !v.is_empty());
        let smtp_port = std::env::var("SMTP_PORT")
            .ok()
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(587);
        let smtp_username = std::env::var("SMTP_USERNAME")
            .unwrap_or_else(|_| "".to_string());
        let smtp_password = std::env::var("SMTP_PASSWORD")
            .unwrap_or_else(|_| "".to_string());
        let from_email = std::env::var("FROM_EMAIL")
            .unwrap_or_else(|_| "Helpdesk <noreply@helpdesk.local>".to_string());

        let admin_email = std::env::var("ADMIN_EMAIL").ok().filter(|v| !v.is_empty());
        let admin_password = std::env::var("ADMIN_PASSWORD").ok().filter(|v| !v.is_empty());

        Config {
            database_url,
            app_url,
            jwt_secret,
            jwt_maxage: jwt_maxage.parse::<i64>().expect("JWT_MAXAGE must be a number of minutes"),
            port,
            allowed_origins,
            daily_support_seconds,
            heartbeat_seconds,
            emit_noop_status_message,
            attachment_dir,
            fcm_project_id,
            fcm_access_token,
            resend_api_key,
            smtp_host,
            smtp_port,
            smtp_username,
            smtp_password,
            from_email,
            admin_email,
            admin_password,
        }
    }
}
