use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

use crate::config::IdentityConfig;
use crate::errors::ServiceError;

#[derive(Debug, Deserialize)]
struct AdminUser {
    email: Option<String>,
}

/// Identity-provider admin client. The fulfillment pipeline only needs one
/// privileged read: a buyer's account email when the profile record has none.
#[derive(Clone)]
pub struct IdentityClient {
    http: reqwest::Client,
    base_url: String,
    service_token: String,
}

impl IdentityClient {
    pub fn new(cfg: &IdentityConfig) -> Result<Self, ServiceError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()
            .map_err(|e| ServiceError::InternalError(format!("identity client build failed: {e}")))?;

        Ok(Self {
            http,
            base_url: cfg.api_base_url.trim_end_matches('/').to_string(),
            service_token: cfg.service_token.clone(),
        })
    }

    /// Looks up the account email for a user. `Ok(None)` when the account
    /// does not exist or carries no email.
    pub async fn email_for_user(&self, user_id: Uuid) -> Result<Option<String>, ServiceError> {
        let response = self
            .http
            .get(format!("{}/admin/users/{}", self.base_url, user_id))
            .bearer_auth(&self.service_token)
            .send()
            .await
            .map_err(|e| ServiceError::ExternalServiceError(format!("identity provider: {e}")))?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let user: AdminUser = response.json().await.map_err(|e| {
                    ServiceError::ExternalServiceError(format!("identity provider payload: {e}"))
                })?;
                debug!(user_id = %user_id, has_email = user.email.is_some(), "identity lookup completed");
                Ok(user.email)
            }
            status => Err(ServiceError::ExternalServiceError(format!(
                "identity provider returned {status}"
            ))),
        }
    }
}
