//! Error types for the recruiting bot.

use std::time::Duration;

/// Top-level error type for turn processing.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Dialog error: {0}")]
    Dialog(#[from] DialogError),

    #[error("Delegate error: {0}")]
    Delegate(#[from] DelegateError),

    #[error("Document error: {0}")]
    Document(#[from] DocumentError),

    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Conversation/profile store errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Concurrent update on {namespace}/{key}: expected etag {expected}, found {found}")]
    Conflict {
        namespace: String,
        key: String,
        expected: u64,
        found: u64,
    },
}

/// Waterfall sequencing errors.
#[derive(Debug, thiserror::Error)]
pub enum DialogError {
    #[error("Dialog {0} is not registered")]
    UnknownDialog(String),

    #[error("Dialog {id} has no step {index}")]
    StepOutOfRange { id: String, index: usize },

    #[error("Dialog {id} cannot move from {from} to {to}")]
    InvalidTransition { id: String, from: String, to: String },

    #[error("Dialog {0} is already active in this conversation")]
    AlreadyActive(String),

    #[error("Dialog {id} could not be built: {reason}")]
    Definition { id: String, reason: String },
}

/// External webhook invocation errors.
#[derive(Debug, thiserror::Error)]
pub enum DelegateError {
    #[error("No endpoint configured for {target}")]
    NotConfigured { target: String },

    #[error("Request to {target} failed: {reason}")]
    RequestFailed { target: String, reason: String },

    #[error("Request to {target} timed out after {timeout:?}")]
    Timeout { target: String, timeout: Duration },

    #[error("{target} answered with HTTP {status}")]
    Status { target: String, status: u16 },

    #[error("Invalid response body from {target}: {reason}")]
    InvalidResponse { target: String, reason: String },
}

/// Document (PDF) field-extraction errors.
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("Document processing is not configured")]
    NotConfigured,

    #[error("Attachment {name} has no download URL")]
    MissingUrl { name: String },

    #[error("Text service failed: {0}")]
    TextService(String),

    #[error("No text could be extracted from the document")]
    EmptyText,

    #[error("AI service failed: {0}")]
    Ai(String),

    #[error("{stage} did not answer within {timeout:?}")]
    Timeout {
        stage: &'static str,
        timeout: std::time::Duration,
    },

    #[error("AI reply is not a JSON object: {0}")]
    InvalidAiReply(String),
}

/// Inbound/outbound channel errors.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Invalid activity: {0}")]
    InvalidActivity(String),

    #[error("Failed to send reply on channel {name}: {reason}")]
    SendFailed { name: String, reason: String },
}

/// Result type alias for the bot.
pub type Result<T> = std::result::Result<T, Error>;
