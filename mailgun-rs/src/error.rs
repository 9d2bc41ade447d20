use crate::smtp::AuthError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MailgunError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Max number of recipients exceeded: {count} > {max}")]
    RecipientLimitExceeded { count: usize, max: usize },

    #[error("No API key registered for domain {0}")]
    UnknownDomain(String),

    #[error("Unauthenticated webhook: {0}")]
    UnauthenticatedWebhook(String),

    /// Network, timeout or non-success provider response
    #[error("Transport error: {message}")]
    Transport {
        message: String,
        status: Option<u16>,
    },

    /// A send failed after the message id was already known, so the
    /// caller can correlate a possibly partial delivery.
    #[error("Message {message_id} not delivered: {source}")]
    Undelivered {
        message_id: String,
        #[source]
        source: Box<MailgunError>,
    },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Malformed signature: {0}")]
    SignatureDecode(#[from] hex::FromHexError),

    #[error("SMTP protocol error: {0}")]
    Protocol(#[from] AuthError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl MailgunError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            status: None,
        }
    }

    /// Transport error carrying the provider's status code and response body
    pub fn provider_status(status: u16, body: impl AsRef<str>) -> Self {
        Self::Transport {
            message: format!("provider returned {}: {}", status, body.as_ref()),
            status: Some(status),
        }
    }

    /// Wrap this error with the id of the message that failed
    pub fn undelivered(self, message_id: impl Into<String>) -> Self {
        Self::Undelivered {
            message_id: message_id.into(),
            source: Box::new(self),
        }
    }

    /// Message id known at the time of failure, if any
    pub fn message_id(&self) -> Option<&str> {
        match self {
            Self::Undelivered { message_id, .. } => Some(message_id),
            _ => None,
        }
    }

    /// HTTP or SMTP status code from the remote side, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Transport { status, .. } => *status,
            Self::Undelivered { source, .. } => source.status(),
            _ => None,
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::Validation(_) | Self::RecipientLimitExceeded { .. }
        )
    }

    pub fn is_parse(&self) -> bool {
        matches!(self, Self::Parse(_) | Self::SignatureDecode(_))
    }
}

impl From<reqwest::Error> for MailgunError {
    fn from(e: reqwest::Error) -> Self {
        Self::Transport {
            message: e.to_string(),
            status: e.status().map(|s| s.as_u16()),
        }
    }
}

pub type Result<T> = std::result::Result<T, MailgunError>;
