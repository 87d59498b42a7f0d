//! HTTP email API client.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{NotifyError, NotifyResult};
use crate::templates::EmailMessage;

/// Email API configuration.
#[derive(Debug, Clone)]
pub struct EmailConfig {
    /// API root, e.g. `https://api.resend.com`
    pub api_base: String,
    pub api_key: String,
    /// Sender address, e.g. `Vidgen <noreply@example.com>`
    pub from: String,
    pub timeout: Duration,
}

#[derive(Debug, Serialize)]
struct SendRequest<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    html: &'a str,
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    id: Option<String>,
}

/// Sends transactional email through an HTTP API.
#[derive(Clone)]
pub struct EmailClient {
    http: Client,
    config: EmailConfig,
}

impl EmailClient {
    pub fn new(config: EmailConfig) -> NotifyResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("vidgen-notify/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { http, config })
    }

    /// Send one message, returning the provider's message ID if given.
    pub async fn send(&self, message: &EmailMessage) -> NotifyResult<Option<String>> {
        if !message.to.contains('@') {
            return Err(NotifyError::InvalidRecipient(message.to.clone()));
        }

        let url = format!("{}/emails", self.config.api_base.trim_end_matches('/'));
        let body = SendRequest {
            from: &self.config.from,
            to: [message.to.as_str()],
            subject: &message.subject,
            html: &message.html,
        };

        debug!(to = %message.to, subject = %message.subject, "Sending email");
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(NotifyError::rejected(status.as_u16(), text));
        }

        let id = response
            .json::<SendResponse>()
            .await
            .ok()
            .and_then(|r| r.id);
        info!(to = %message.to, id = ?id, "Email sent");
        Ok(id)
    }
}
