//! Error types for mailsort-core.

use thiserror::Error;

/// Result type alias using mailsort-core's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for mailsort-core operations.
///
/// Store errors carry the operation name and the target (message identity or
/// folder name) so a caller can retry without re-resolving anything.
#[derive(Debug, Error)]
pub enum Error {
    /// Operation attempted before `initialize()` succeeded.
    #[error("{op} {target}: mail store not initialized")]
    NotInitialized { op: &'static str, target: String },

    /// The mail application could not be reached.
    #[error("connection error: {0}")]
    Connection(String),

    /// No folder with that display name exists under the store root.
    /// `target` is the message being moved, or the folder itself.
    #[error("{op} {target}: folder not found: {name}")]
    FolderNotFound {
        op: &'static str,
        target: String,
        name: String,
    },

    /// Message identity is invalid or the object has gone away.
    #[error("{op} {target}: not found: {detail}")]
    NotFound {
        op: &'static str,
        target: String,
        detail: String,
    },

    /// The mail store denied access.
    #[error("{op} {target}: access denied: {detail}")]
    Access {
        op: &'static str,
        target: String,
        detail: String,
    },

    /// Busy or otherwise retryable failure.
    #[error("{op} {target}: transient failure: {detail}")]
    Transient {
        op: &'static str,
        target: String,
        detail: String,
    },

    /// Category label has no entry in the classification mapping.
    #[error("apply_classification {id}: unknown category '{label}'")]
    UnknownCategory { id: String, label: String },

    /// The binding rejected the shape of an argument. This is a bug in the
    /// caller, not a property of the mail store.
    #[error("{op}: invalid argument: {detail}")]
    InvalidArgument { op: &'static str, detail: String },

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Path discovery error.
    #[error("path error: {0}")]
    Path(String),

    /// HTTP/service error.
    #[error("service error: {0}")]
    Service(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Whether retrying the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Transient { .. })
    }

    /// Point a folder lookup failure at the message it was looked up for.
    pub(crate) fn for_message(self, id: &str) -> Self {
        match self {
            Error::FolderNotFound { op, name, .. } => Error::FolderNotFound {
                op,
                target: id.to_string(),
                name,
            },
            other => other,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Service(err.to_string())
    }
}

impl From<config::ConfigError> for Error {
    fn from(err: config::ConfigError) -> Self {
        Error::Config(err.to_string())
    }
}
