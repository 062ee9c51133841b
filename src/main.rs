mod config;
mod db;
mod dtos;
mod error;
mod handler;
mod mail;
mod middleware;
mod models;
mod routes;
mod service;
mod utils;

use std::sync::Arc;

use axum::http::{header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE}, HeaderValue, Method};
use config::Config;
use db::{db::DBClient, HelpdeskDb};
use dotenv::dotenv;
use routes::create_router;
use sqlx::postgres::PgPoolOptions;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing_subscriber::filter::LevelFilter;

use mail::sendmail::{MailSender, ResendMailer, SmtpMailer};
use service::{
    attachment_service::LocalAttachmentStore,
    background_jobs::start_daily_reset_job,
    bootstrap::ensure_admin_user,
    notification_service::NotificationService,
    observers::TicketObservers,
    push::FcmPushSender,
    realtime::RealtimeBus,
    support_time::SupportTimeMeter,
    ticket_service::TicketService,
};

#[derive(Debug, Clone)]
pub struct AppState {
    pub env: Config,
    pub db_client: Arc<DBClient>,
    // Services
    pub ticket_service: TicketService,
    pub notification_service: NotificationService,
    pub realtime: RealtimeBus,
    pub support_time: SupportTimeMeter,
}

impl AppState {
    pub fn new(db_client: DBClient, config: Config) -> Self {
        let db_client = Arc::new(db_client);
        let db: Arc<dyn HelpdeskDb> = db_client.clone();

        let realtime = RealtimeBus::new();
        let support_time = SupportTimeMeter::new(db.clone(), realtime.clone());

        let mut notification_service =
            NotificationService::new(db.clone(), realtime.clone(), config.app_url.clone());

        match (&config.fcm_project_id, &config.fcm_access_token) {
            (Some(project_id), Some(access_token)) => {
                notification_service = notification_service.with_push(Arc::new(
                    FcmPushSender::new(project_id.clone(), access_token.clone()),
                ));
                tracing::info!("Push notifications enabled for project {}", project_id);
            }
            _ => tracing::warn!("FCM not configured, push notifications disabled"),
        }

        let mailer: Option<Arc<dyn MailSender>> = if let Some(api_key) = &config.resend_api_key {
            tracing::info!("Using Resend for notification emails");
            Some(Arc::new(ResendMailer::new(api_key.clone(), config.from_email.clone())))
        } else if let Some(host) = &config.smtp_host {
            tracing::info!("Using SMTP {}:{} for notification emails", host, config.smtp_port);
            Some(Arc::new(SmtpMailer::new(
                host.clone(),
                config.smtp_port,
                config.smtp_username.clone(),
                config.smtp_password.clone(),
                config.from_email.clone(),
            )))
        } else {
            tracing::warn!("No mail provider configured, notification emails disabled");
            None
        };
        if let Some(mailer) = mailer {
            notification_service = notification_service.with_mailer(mailer);
        }

        let observers = TicketObservers::new(db.clone(), notification_service.clone());
        let attachments = Arc::new(LocalAttachmentStore::new(config.attachment_dir.clone()));

        let ticket_service = TicketService::new(
            db,
            attachments,
            support_time.clone(),
            realtime.clone(),
            observers,
        )
        .with_noop_status_messages(config.emit_noop_status_message)
        .with_daily_allowance(config.daily_support_seconds);

        Self {
            env: config,
            db_client,
            ticket_service,
            notification_service,
            realtime,
            support_time,
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_max_level(LevelFilter::DEBUG)
        .init();

    dotenv().ok();

    let config = Config::init();

    let pool = match PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await
    {
        Ok(pool) => {
            tracing::info!("✅Connection to the database is successful!");
            pool
        }
        Err(err) => {
            tracing::error!("🔥 Failed to connect to the database: {:?}", err);
            std::process::exit(1);
        }
    };

    let allowed_origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid origin {}", origin);
                None
            }
        })
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed_origins))
        .allow_headers([AUTHORIZATION, ACCEPT, CONTENT_TYPE])
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::PATCH, Method::DELETE]);

    let app_state = Arc::new(AppState::new(DBClient::new(pool), config.clone()));

    if let (Some(email), Some(password)) = (&config.admin_email, &config.admin_password) {
        if let Err(err) = ensure_admin_user(app_state.db_client.as_ref(), email, password).await {
            tracing::error!("🔥 Failed to create admin account: {}", err);
        }
    }

    tokio::spawn(start_daily_reset_job(app_state.clone()));

    let app = create_router(app_state).layer(cors);

    tracing::info!("🚀 Server is running on http://localhost:{}", config.port);

    let listener = match tokio::net::TcpListener::bind(format!("0.0.0.0:{}", &config.port)).await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!("🔥 Failed to bind port {}: {:?}", config.port, err);
            std::process::exit(1);
        }
    };

    if let Err(err) = axum::serve(listener, app).await {
        tracing::error!("Server error: {:?}", err);
    }
}
