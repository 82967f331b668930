//! Outgoing mail through the Resend HTTP API. Without an API key, mails are written to the log
//! instead so local setups keep working.

use reqwest::Client;
use serde_json::json;
use tracing::info;

use crate::{config::Config, error::AppError};

pub struct Mailer {
    http: Client,
    api_url: String,
    api_key: Option<String>,
    from: String,
}

impl Mailer {
    pub fn new(config: &Config, http: Client) -> Self {
        Self {
            http,
            api_url: config.mail_api_url.clone(),
            api_key: config.mail_api_key.clone(),
            from: config.mail_from.clone(),
        }
    }

    /// Returns whether the mail was handed to the provider (`false` means logged only).
    pub async fn send(&self, to: &str, subject: &str, html: &str) -> Result<bool, AppError> {
        let Some(api_key) = &self.api_key else {
            info!("Mail API key not set, logging mail instead. To: {to}, Subject: {subject}\n{html}");
            return Ok(false);
        };

        let response = self
            .http
            .post(&self.api_url)
            .bearer_auth(api_key)
            .json(&json!({
                "from": self.from,
                "to": [to],
                "subject": subject,
                "html": html,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Upstream(format!(
                "Mail provider responded {status}: {body}"
            )));
        }

        info!("Sent mail to {to}: {subject}");
        Ok(true)
    }
}
