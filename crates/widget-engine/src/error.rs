//! Error types for the engine.

/// Errors that can occur while consuming and applying requests.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// A backend call failed.
    #[error("store error: {0}")]
    Store(#[from] widget_store::StoreError),

    /// A widget could not be encoded for storage.
    #[error("encode error: {0}")]
    Encode(#[from] serde_json::Error),

    /// A stored record could not be decoded back into a widget.
    #[error("corrupt record at {key}: {reason}")]
    CorruptRecord {
        /// Document key or table key of the record.
        key: String,
        /// What was wrong with it.
        reason: String,
    },
}
