//! Error types for backend operations.

use std::fmt;

/// Errors that can occur while talking to a backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The remote call failed (connectivity, permissions, throttling, ...).
    #[error("{backend} error: {message}")]
    Backend {
        /// Which backend reported the failure (`"s3"`, `"sqs"`, `"dynamodb"`).
        backend: &'static str,
        /// Rendered error chain from the client library.
        message: String,
    },

    /// A table item is missing its key attribute.
    #[error("item has no {attribute} attribute")]
    MissingKey {
        /// Name of the expected key attribute.
        attribute: &'static str,
    },
}

impl StoreError {
    /// Wrap a client error from the named backend.
    pub fn backend(backend: &'static str, err: impl fmt::Display) -> Self {
        Self::Backend {
            backend,
            message: err.to_string(),
        }
    }
}
