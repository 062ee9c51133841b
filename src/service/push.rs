// service/push.rs
use async_trait::async_trait;
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PushError {
    /// The provider no longer knows this device; the token should be dropped.
    #[error("Device token is no longer registered")]
    Unregistered,

    #[error("Push provider rejected the message ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("Push transport error: {0}")]
    Transport(String),
}

#[derive(Debug, Clone)]
pub struct PushMessage {
    pub title: String,
    pub body: String,
    pub ticket_id: String,
    pub kind: String,
}

#[async_trait]
pub trait PushSender: Send + Sync + std::fmt::Debug {
    async fn send(&self, device_token: &str, message: &PushMessage) -> Result<(), PushError>;
}

/// Firebase Cloud Messaging HTTP v1. The access token is a short-lived
/// OAuth2 bearer minted outside this process.
#[derive(Debug, Clone)]
pub struct FcmPushSender {
    client: reqwest::Client,
    project_id: String,
    access_token: String,
}

impl FcmPushSender {
    pub fn new(project_id: String, access_token: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            project_id,
            access_token,
        }
    }
}

#[async_trait]
impl PushSender for FcmPushSender {
    async fn send(&self, device_token: &str, message: &PushMessage) -> Result<(), PushError> {
        let url = format!(
            "https://fcm.googleapis.com/v1/projects/{}/messages:send",
            self.project_id
        );

        let payload = json!({
            "message": {
                "token": device_token,
                "notification": {
                    "title": message.title,
                    "body": message.body,
                },
                "data": {
                    "ticket_id": message.ticket_id,
                    "type": message.kind,
                },
            }
        });

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(&payload)
            .send()
            .await
            .map_err(|e| PushError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "No response body".to_string());

        if is_unregistered(&body) {
            return Err(PushError::Unregistered);
        }

        Err(PushError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}

fn is_unregistered(body: &str) -> bool {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.pointer("/error/details/0/errorCode")
                .and_then(|c| c.as_str())
                .map(|c| c == "UNREGISTERED")
        })
        .unwrap_or(false)
}
