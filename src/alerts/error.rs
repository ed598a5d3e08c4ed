//! Alert error types

/// Raised while building an alert from its configuration
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigurationError {
    #[error("Alert configuration missing '{0}'")]
    MissingField(&'static str),

    #[error("{0} must be provided")]
    MissingSetting(&'static str),

    #[error("Unsupported alert type provided: {0}")]
    UnsupportedType(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Raised by a data source while fetching the value an alert evaluates
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request failed with status {code}: {body}")]
    Status { code: u16, body: String },

    #[error("Decode error: {0}")]
    Decode(String),
}

impl FetchError {
    /// HTTP status carried by the error, if any
    pub fn status_code(&self) -> Option<u16> {
        match self {
            FetchError::Status { code, .. } => Some(*code),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status_code() == Some(404)
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            FetchError::Decode(e.to_string())
        } else {
            FetchError::Network(e.to_string())
        }
    }
}

/// Raised by a notification handler
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Notification rejected with status {status}")]
    Rejected { status: u16 },
}
