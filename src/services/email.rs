use async_trait::async_trait;
use base64::{engine::general_purpose, Engine};
use reqwest::StatusCode;
use serde_json::json;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::config::EmailConfig;
use crate::errors::ServiceError;

/// Transport-level email failures, split so the delivery-failure governor can
/// tell a quota exhaustion (retrying will not help) from everything else.
#[derive(Debug, Error)]
pub enum EmailError {
    #[error("transport quota exceeded: {0}")]
    Quota(String),
    #[error("transport failure: {0}")]
    Transport(String),
}

impl From<EmailError> for ServiceError {
    fn from(err: EmailError) -> Self {
        match err {
            EmailError::Quota(msg) => ServiceError::TransportQuotaExceeded(msg),
            EmailError::Transport(msg) => ServiceError::TransportFailed(msg),
        }
    }
}

#[derive(Debug, Clone)]
pub struct EmailAttachment {
    pub filename: String,
    pub content_type: String,
    pub content: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct OutboundEmail {
    pub to: String,
    pub subject: String,
    pub html_body: String,
    pub attachments: Vec<EmailAttachment>,
}

/// Seam for the transactional email provider. The HTTP implementation below
/// is the production transport; tests substitute recording/failing doubles.
#[async_trait]
pub trait EmailTransport: Send + Sync {
    async fn send(&self, message: &OutboundEmail) -> Result<(), EmailError>;
}

/// Email provider client speaking a JSON-over-HTTP message API.
#[derive(Clone)]
pub struct HttpEmailTransport {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    from_address: String,
}

impl HttpEmailTransport {
    pub fn new(cfg: &EmailConfig) -> Result<Self, ServiceError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()
            .map_err(|e| ServiceError::InternalError(format!("email client build failed: {e}")))?;

        Ok(Self {
            http,
            base_url: cfg.api_base_url.trim_end_matches('/').to_string(),
            api_key: cfg.api_key.clone(),
            from_address: cfg.from_address.clone(),
        })
    }
}

#[async_trait]
impl EmailTransport for HttpEmailTransport {
    async fn send(&self, message: &OutboundEmail) -> Result<(), EmailError> {
        let attachments: Vec<serde_json::Value> = message
            .attachments
            .iter()
            .map(|a| {
                json!({
                    "filename": a.filename,
                    "content_type": a.content_type,
                    "content": general_purpose::STANDARD.encode(&a.content),
                })
            })
            .collect();

        let response = self
            .http
            .post(format!("{}/messages", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&json!({
                "from": self.from_address,
                "to": message.to,
                "subject": message.subject,
                "html": message.html_body,
                "attachments": attachments,
            }))
            .send()
            .await
            .map_err(|e| EmailError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            debug!(to = %message.to, subject = %message.subject, "email accepted by transport");
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        if status == StatusCode::TOO_MANY_REQUESTS || body.contains("quota") {
            return Err(EmailError::Quota(format!("{status}: {body}")));
        }

        Err(EmailError::Transport(format!("{status}: {body}")))
    }
}
