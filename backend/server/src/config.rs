use std::{env, fmt::Display, fs::read_to_string, str::FromStr, time::Duration};

use reqwest::Url;
use thiserror::Error;
use tracing::{info, warn};

const GOOGLE_PLACES_URL: &str = "https://maps.googleapis.com/maps/api/place/details/json";
const RESEND_URL: &str = "https://api.resend.com/emails";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("Invalid {key} value: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub production: bool,
    pub platform_url: String,
    pub platform_anon_key: String,
    pub platform_service_key: String,
    pub project_ref: String,
    pub cors_origin: Option<String>,
    pub webhook_url: Option<String>,
    pub webhook_secret: Option<String>,
    pub places_api_key: Option<String>,
    pub place_id: Option<String>,
    pub places_url: String,
    pub reviews_ttl: Duration,
    pub redis_url: Option<String>,
    pub mail_api_key: Option<String>,
    pub mail_api_url: String,
    pub mail_from: String,
    pub site_url: String,
    pub invite_ttl_days: i64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            production: false,
            platform_url: "http://localhost:54321".to_string(),
            platform_anon_key: String::new(),
            platform_service_key: String::new(),
            project_ref: "localhost".to_string(),
            cors_origin: None,
            webhook_url: None,
            webhook_secret: None,
            places_api_key: None,
            place_id: None,
            places_url: GOOGLE_PLACES_URL.to_string(),
            reviews_ttl: Duration::from_secs(6 * 60 * 60),
            redis_url: None,
            mail_api_key: None,
            mail_api_url: RESEND_URL.to_string(),
            mail_from: "PawCare <noreply@pawcare.local>".to_string(),
            site_url: "http://localhost:3000".to_string(),
            invite_ttl_days: 7,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        let platform_url = var("PLATFORM_URL").ok_or(ConfigError::Missing("PLATFORM_URL"))?;
        let project_ref = match var("PLATFORM_PROJECT_REF") {
            Some(project_ref) => project_ref,
            None => project_ref(&platform_url)?,
        };

        Ok(Self {
            port: try_load("RUST_PORT", "8080")?,
            production: try_load::<String>("APP_ENV", "development")? == "production",
            platform_anon_key: required_secret("PLATFORM_ANON_KEY")?,
            platform_service_key: required_secret("PLATFORM_SERVICE_KEY")?,
            project_ref,
            platform_url,
            cors_origin: var("CORS_ORIGIN"),
            webhook_url: var("CONTACT_WEBHOOK_URL"),
            webhook_secret: read_secret("CONTACT_WEBHOOK_SECRET"),
            places_api_key: read_secret("GOOGLE_PLACES_API_KEY"),
            place_id: var("GOOGLE_PLACE_ID"),
            places_url: try_load("GOOGLE_PLACES_URL", GOOGLE_PLACES_URL)?,
            reviews_ttl: Duration::from_secs(try_load("REVIEWS_CACHE_TTL_SECS", "21600")?),
            redis_url: var("REDIS_URL"),
            mail_api_key: read_secret("RESEND_API_KEY"),
            mail_api_url: try_load("MAIL_API_URL", RESEND_URL)?,
            mail_from: try_load("MAIL_FROM", "PawCare <noreply@pawcare.local>")?,
            site_url: try_load("SITE_URL", "http://localhost:3000")?,
            invite_ttl_days: try_load("INVITE_TTL_DAYS", "7")?,
        })
    }

    /// Name of the cookie the platform's browser client keeps its session in.
    pub fn session_cookie(&self) -> String {
        format!("sb-{}-auth-token", self.project_ref)
    }
}

fn var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn try_load<T: FromStr>(key: &'static str, default: &str) -> Result<T, ConfigError>
where
    T::Err: Display,
{
    var(key)
        .unwrap_or_else(|| {
            info!("{key} not set, using default: {default}");
            default.to_string()
        })
        .parse()
        .map_err(|e: T::Err| ConfigError::Invalid {
            key,
            reason: e.to_string(),
        })
}

/// Environment first, then the mounted secret file.
fn read_secret(secret_name: &str) -> Option<String> {
    if let Some(value) = var(secret_name) {
        return Some(value);
    }

    let path = format!("/run/secrets/{secret_name}");

    read_to_string(&path)
        .map(|s| s.trim().to_string())
        .ok()
        .filter(|s| !s.is_empty())
}

fn required_secret(secret_name: &'static str) -> Result<String, ConfigError> {
    read_secret(secret_name).ok_or_else(|| {
        warn!("Failed to read {secret_name} from environment or secrets");
        ConfigError::Missing(secret_name)
    })
}

fn project_ref(platform_url: &str) -> Result<String, ConfigError> {
    let url = Url::parse(platform_url).map_err(|e| ConfigError::Invalid {
        key: "PLATFORM_URL",
        reason: e.to_string(),
    })?;

    url.host_str()
        .and_then(|host| host.split('.').next())
        .map(str::to_string)
        .ok_or(ConfigError::Invalid {
            key: "PLATFORM_URL",
            reason: "missing host".to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_ref() {
        assert_eq!(project_ref("https://abcdxyz.supabase.co").unwrap(), "abcdxyz");
        assert_eq!(project_ref("http://localhost:54321").unwrap(), "localhost");
        assert!(project_ref("not a url").is_err());
    }

    #[test]
    fn test_session_cookie() {
        let config = Config {
            project_ref: "abcdxyz".to_string(),
            ..Config::default()
        };

        assert_eq!(config.session_cookie(), "sb-abcdxyz-auth-token");
    }
}
