//! Contact form intake.
//!
//! Submissions are validated, forwarded to the automation webhook with request metadata, and
//! kept as a lead for the admin back office.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tracing::info;

use crate::{
    config::Config,
    error::AppError,
    utils::{is_email, parse_date, present, require},
};

pub const BOARDING: &str = "hundepension";
const WEBHOOK_SECRET_HEADER: &str = "x-webhook-secret";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactForm {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub message: Option<String>,
    pub availability: Option<String>,
    pub service: Option<String>,
    pub hunde_name: Option<String>,
    pub hunderasse: Option<String>,
    pub hunde_alter: Option<String>,
    pub konkreter_urlaub: Option<String>,
    pub urlaub_von: Option<String>,
    pub urlaub_bis: Option<String>,
    /// Anything else the form sends is passed through untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ContactForm {
    pub fn validate(&self) -> Result<(), AppError> {
        require(&self.name, "name")?;
        let email = require(&self.email, "email")?;
        require(&self.message, "message")?;
        require(&self.availability, "availability")?;

        if !is_email(email) {
            return Err(AppError::bad_request("email is invalid"));
        }

        if present(&self.service) == Some(BOARDING) {
            self.validate_boarding()?;
        }

        Ok(())
    }

    fn validate_boarding(&self) -> Result<(), AppError> {
        require(&self.hunde_name, "hundeName")?;
        require(&self.hunderasse, "hunderasse")?;
        require(&self.hunde_alter, "hundeAlter")?;

        match require(&self.konkreter_urlaub, "konkreterUrlaub")? {
            "nein" => Ok(()),
            "ja" => {
                let from = parse_date(require(&self.urlaub_von, "urlaubVon")?, "urlaubVon")?;
                let until = parse_date(require(&self.urlaub_bis, "urlaubBis")?, "urlaubBis")?;

                if until < from {
                    return Err(AppError::bad_request(
                        "urlaubBis must not be before urlaubVon",
                    ));
                }
                Ok(())
            }
            _ => Err(AppError::bad_request("konkreterUrlaub must be ja or nein")),
        }
    }
}

/// Request metadata appended to the forwarded payload.
pub struct Submission {
    pub submitted_at: DateTime<Utc>,
    pub client_ip: String,
    pub user_agent: String,
}

pub fn webhook_payload(form: &ContactForm, submission: &Submission) -> Result<Value, AppError> {
    let mut payload =
        serde_json::to_value(form).map_err(|e| AppError::InternalError(e.to_string()))?;

    if let Value::Object(object) = &mut payload {
        object.retain(|_, value| !value.is_null());
        object.insert("submittedAt".to_string(), json!(submission.submitted_at));
        object.insert("clientIp".to_string(), json!(submission.client_ip));
        object.insert("userAgent".to_string(), json!(submission.user_agent));
    }

    Ok(payload)
}

pub async fn forward(
    http: &reqwest::Client,
    config: &Config,
    payload: &Value,
) -> Result<(), AppError> {
    let Some(webhook_url) = &config.webhook_url else {
        info!("Contact webhook not configured, submission: {payload}");
        return Ok(());
    };

    let mut request = http.post(webhook_url).json(payload);
    if let Some(secret) = &config.webhook_secret {
        request = request.header(WEBHOOK_SECRET_HEADER, secret);
    }

    let response = request.send().await?;

    if !response.status().is_success() {
        return Err(AppError::Upstream(format!(
            "Webhook responded {}",
            response.status()
        )));
    }

    Ok(())
}
