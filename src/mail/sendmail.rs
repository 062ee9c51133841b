use async_trait::async_trait;
use serde_json::json;
use thiserror::Error;
use tokio::time::{sleep, Duration};

const MAX_RETRIES: u32 = 3;
const RETRY_DELAY_MS: u64 = 1000;

#[derive(Error, Debug)]
pub enum MailError {
    #[error("Invalid email address: {0}")]
    InvalidRecipient(String),

    #[error("Mail provider error: {0}")]
    Provider(String),
}

#[async_trait]
pub trait MailSender: Send + Sync + std::fmt::Debug {
    async fn send(&self, to_email: &str, subject: &str, html_body: &str) -> Result<(), MailError>;
}

fn validate_recipient(to_email: &str) -> Result<(), MailError> {
    if to_email.is_empty() || !to_email.contains('@') {
        return Err(MailError::InvalidRecipient(to_email.to_string()));
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct ResendMailer {
    client: reqwest::Client,
    api_key: String,
    from_email: String,
    retry_delay_ms: u64,
}

impl ResendMailer {
    pub fn new(api_key: String, from_email: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            from_email,
            retry_delay_ms: RETRY_DELAY_MS,
        }
    }

    async fn send_via_resend(
        &self,
        to_email: &str,
        subject: &str,
        html_body: &str,
    ) -> Result<String, String> {
        let request_body = json!({
            "from": self.from_email,
            "to": to_email,
            "subject": subject,
            "html": html_body,
        });

        let response = self
            .client
            .post("https://api.resend.com/emails")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request_body)
            .send()
            .await
            .map_err(|e| format!("Network error: {}", e))?;

        let status = response.status();
        let response_text = response
            .text()
            .await
            .unwrap_or_else(|_| "No response body".to_string());

        if !status.is_success() {
            return Err(format!(
                "Resend API error ({}): {}",
                status.as_u16(),
                response_text
            ));
        }

        let email_id = serde_json::from_str::<serde_json::Value>(&response_text)
            .ok()
            .and_then(|body| body.get("id").and_then(|v| v.as_str()).map(str::to_string))
            .unwrap_or_else(|| "success".to_string());

        Ok(email_id)
    }
}

#[async_trait]
impl MailSender for ResendMailer {
    async fn send(&self, to_email: &str, subject: &str, html_body: &str) -> Result<(), MailError> {
        validate_recipient(to_email)?;

        let mut last_error = None;

        for attempt in 1..=MAX_RETRIES {
            match self.send_via_resend(to_email, subject, html_body).await {
                Ok(email_id) => {
                    tracing::info!("Email sent to {} (id: {})", to_email, email_id);
                    return Ok(());
                }
                Err(e) => {
                    last_error = Some(e);
                    if attempt < MAX_RETRIES {
                        let delay = self.retry_delay_ms * (2_u64.pow(attempt - 1));
                        tracing::warn!(
                            "Email send attempt {} failed for {}. Retrying in {}ms...",
                            attempt,
                            to_email,
                            delay
                        );
                        sleep(Duration::from_millis(delay)).await;
                    }
                }
            }
        }

        let error_msg = last_error
            .map(|e| format!("Failed after {} retries: {}", MAX_RETRIES, e))
            .unwrap_or_else(|| "Unknown email sending error".to_string());

        Err(MailError::Provider(error_msg))
    }
}

#[derive(Debug, Clone)]
pub struct SmtpMailer {
    host: String,
    port: u16,
    username: String,
    password: String,
    from_email: String,
}

impl SmtpMailer {
    pub fn new(host: String, port: u16, username: String, password: String, from_email: String) -> Self {
        Self {
            host,
            port,
            username,
            password,
            from_email,
        }
    }
}

#[async_trait]
impl MailSender for SmtpMailer {
    async fn send(&self, to_email: &str, subject: &str, html_body: &str) -> Result<(), MailError> {
        use lettre::{
            message::{header::ContentType, MultiPart, SinglePart},
            transport::smtp::authentication::Credentials,
            Message, SmtpTransport, Transport,
        };

        validate_recipient(to_email)?;

        let email = Message::builder()
            .from(
                self.from_email
                    .parse()
                    .map_err(|e| MailError::Provider(format!("Invalid sender: {}", e)))?,
            )
            .to(to_email
                .parse()
                .map_err(|_| MailError::InvalidRecipient(to_email.to_string()))?)
            .subject(subject)
            .multipart(
                MultiPart::alternative().singlepart(
                    SinglePart::builder()
                        .header(ContentType::TEXT_HTML)
                        .body(html_body.to_string()),
                ),
            )
            .map_err(|e| MailError::Provider(e.to_string()))?;

        let creds = Credentials::new(self.username.clone(), self.password.clone());
        let mailer = SmtpTransport::relay(&self.host)
            .map_err(|e| MailError::Provider(e.to_string()))?
            .port(self.port)
            .credentials(creds)
            .build();

        // lettre's SmtpTransport blocks
        tokio::task::spawn_blocking(move || mailer.send(&email))
            .await
            .map_err(|e| MailError::Provider(e.to_string()))?
            .map_err(|e| MailError::Provider(e.to_string()))?;

        tracing::info!("Email sent via SMTP to {}", to_email);
        Ok(())
    }
}
