use thiserror::Error;

/// Compressio client errors
#[derive(Debug, Error)]
pub enum CompressioError {
    /// Configuration file errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File rejected before any network call
    #[error("Validation error: {0}")]
    Validation(String),

    /// Non-2xx response from the compression API
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Local key-value store errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Mutex poison error
    #[error("Lock poisoned: {0}")]
    LockPoisoned(String),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, CompressioError>;

impl CompressioError {
    /// Message suitable for showing to the user, without the category prefix
    pub fn user_message(&self) -> String {
        match self {
            CompressioError::Api { message, .. } => message.clone(),
            CompressioError::Validation(msg) | CompressioError::Other(msg) => msg.clone(),
            other => other.to_string(),
        }
    }
}

/// Helper trait for adding context to errors
pub trait ErrorContext<T> {
    fn context(self, msg: &str) -> Result<T>;
}

impl<T, E: Into<CompressioError>> ErrorContext<T> for std::result::Result<T, E> {
    fn context(self, msg: &str) -> Result<T> {
        self.map_err(|e| {
            let err: CompressioError = e.into();
            match err {
                CompressioError::Other(s) => CompressioError::Other(format!("{}: {}", msg, s)),
                CompressioError::Config(s) => CompressioError::Config(format!("{}: {}", msg, s)),
                CompressioError::Validation(s) => {
                    CompressioError::Validation(format!("{}: {}", msg, s))
                }
                CompressioError::Storage(s) => {
                    CompressioError::Storage(format!("{}: {}", msg, s))
                }
                CompressioError::Api { status, message } => CompressioError::Api {
                    status,
                    message: format!("{}: {}", msg, message),
                },
                CompressioError::LockPoisoned(s) => {
                    CompressioError::LockPoisoned(format!("{}: {}", msg, s))
                }
                other => other,
            }
        })
    }
}
