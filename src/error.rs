use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConsoleError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to reach {url}: {message}")]
    Transport { url: String, message: String },

    #[error("Typesense Error ({http_code}): {message}")]
    Api { http_code: u16, message: String },

    #[error("HTTP {status}: {reason}")]
    Http { status: u16, reason: String },

    #[error("Failed to index documents: {status} {reason}")]
    Import { status: u16, reason: String },

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("{0}")]
    Precondition(String),
}

pub type Result<T> = std::result::Result<T, ConsoleError>;

impl From<serde_json::Error> for ConsoleError {
    fn from(e: serde_json::Error) -> Self {
        ConsoleError::Decode(e.to_string())
    }
}

impl ConsoleError {
    /// Whether a failed attempt with this error may be retried on another node.
    ///
    /// Transport failures and non-2xx statuses retry. A decode failure means the
    /// service already answered, so a retry is not assumed safe.
    pub fn is_retryable(&self) -> bool {
        match self {
            ConsoleError::Transport { .. } => true,
            ConsoleError::Api { .. } => true,
            ConsoleError::Http { .. } => true,
            ConsoleError::Import { .. } => false,
            ConsoleError::Config(_) => false,
            ConsoleError::Decode(_) => false,
            ConsoleError::Precondition(_) => false,
        }
    }

    /// HTTP status reported by the service, if the error came from a response.
    pub fn status(&self) -> Option<u16> {
        match self {
            ConsoleError::Api { http_code, .. } => Some(*http_code),
            ConsoleError::Http { status, .. } => Some(*status),
            ConsoleError::Import { status, .. } => Some(*status),
            _ => None,
        }
    }
}
