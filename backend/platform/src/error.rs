use reqwest::StatusCode;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PlatformError {
    #[error("Invalid login credentials")]
    InvalidCredentials,

    #[error("{message}")]
    Api { status: u16, message: String },

    #[error("Platform request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Malformed platform response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl PlatformError {
    pub fn api(status: StatusCode, message: impl Into<String>) -> Self {
        PlatformError::Api {
            status: status.as_u16(),
            message: message.into(),
        }
    }

    /// True when the platform rejected the caller's token or credentials.
    pub fn is_auth_rejection(&self) -> bool {
        match self {
            PlatformError::InvalidCredentials => true,
            PlatformError::Api { status, .. } => *status == 401 || *status == 403,
            _ => false,
        }
    }
}
