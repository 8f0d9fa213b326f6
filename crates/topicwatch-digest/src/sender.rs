//! Email transport seam.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Serialize;
use topicwatch_core::BrevoConfig;

use crate::error::DigestError;

const DEFAULT_BREVO_BASE_URL: &str = "https://api.brevo.com/";
const SEND_TIMEOUT_SECS: u64 = 30;

/// Delivers one HTML message to one recipient.
#[async_trait]
pub trait EmailSender: Send + Sync {
    /// # Errors
    ///
    /// Returns [`DigestError`] when the message could not be handed off.
    async fn send(&self, to: &str, subject: &str, html: &str) -> Result<(), DigestError>;
}

/// Brevo transactional email API (`POST /v3/smtp/email`).
pub struct BrevoSender {
    client: Client,
    api_key: String,
    from_email: String,
    from_name: String,
    endpoint: Url,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BrevoMessage<'a> {
    sender: BrevoAddress<'a>,
    to: [BrevoAddress<'a>; 1],
    subject: &'a str,
    html_content: &'a str,
}

#[derive(Serialize)]
struct BrevoAddress<'a> {
    email: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
}

impl BrevoSender {
    /// # Errors
    ///
    /// Returns [`DigestError::Http`] if the HTTP client cannot be built.
    pub fn new(config: &BrevoConfig) -> Result<Self, DigestError> {
        Self::with_base_url(config, DEFAULT_BREVO_BASE_URL)
    }

    /// Points the sender at another API root (for wiremock in tests).
    ///
    /// # Errors
    ///
    /// Returns [`DigestError::Http`] if the HTTP client cannot be built, or
    /// [`DigestError::InvalidBaseUrl`] if `base_url` does not parse.
    pub fn with_base_url(config: &BrevoConfig, base_url: &str) -> Result<Self, DigestError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(SEND_TIMEOUT_SECS))
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        let normalised = format!("{}/", base_url.trim_end_matches('/'));
        let endpoint = Url::parse(&normalised)
            .and_then(|base| base.join("v3/smtp/email"))
            .map_err(|e| DigestError::InvalidBaseUrl(format!("'{base_url}': {e}")))?;

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            from_email: config.from_email.clone(),
            from_name: config.from_name.clone(),
            endpoint,
        })
    }
}

#[async_trait]
impl EmailSender for BrevoSender {
    async fn send(&self, to: &str, subject: &str, html: &str) -> Result<(), DigestError> {
        let message = BrevoMessage {
            sender: BrevoAddress {
                email: &self.from_email,
                name: Some(&self.from_name),
            },
            to: [BrevoAddress {
                email: to,
                name: None,
            }],
            subject,
            html_content: html,
        };

        let response = self
            .client
            .post(self.endpoint.clone())
            .header("api-key", &self.api_key)
            .header("accept", "application/json")
            .json(&message)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = %status, "digest: brevo rejected message");
            return Err(DigestError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        tracing::debug!(to, "digest: brevo accepted message");
        Ok(())
    }
}

/// Logs messages instead of sending them; used when no transport is set up.
pub struct LogSender;

#[async_trait]
impl EmailSender for LogSender {
    async fn send(&self, to: &str, subject: &str, html: &str) -> Result<(), DigestError> {
        tracing::info!(
            to,
            subject,
            bytes = html.len(),
            "digest: no email transport configured; message logged only"
        );
        Ok(())
    }
}
