//! Error types for credman.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    // Authentication errors
    #[error("Authentication failed: {0}")]
    Authentication(String),

    // Retrieval errors
    #[error("Secret not found: {0}")]
    SecretNotFound(String),

    #[error("Field '{field}' not found in secret '{service}'")]
    FieldNotFound { service: String, field: String },

    #[error("Multiple items match '{0}', expected exactly one")]
    AmbiguousItem(String),

    // Factory errors
    #[error("Unsupported secrets manager: {0}")]
    UnsupportedManager(String),

    // Backend infrastructure errors
    #[error("External tool error: {0}")]
    ExternalTool(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Shorthand for a `FieldNotFound` with owned names.
    pub fn field_not_found(service: &str, field: &str) -> Self {
        Error::FieldNotFound {
            service: service.to_string(),
            field: field.to_string(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        // Non-parseable backend output is an external tool defect.
        Error::ExternalTool(format!("Invalid JSON response: {}", err))
    }
}
