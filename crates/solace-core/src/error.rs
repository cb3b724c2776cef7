//! Error types for the session orchestration core

use thiserror::Error;

/// Result type alias for core operations
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors from the completion client, blueprint synthesizer, and persistence.
#[derive(Error, Debug)]
pub enum CoreError {
    /// No provider credential configured at call time. Recoverable: fixing
    /// the configuration takes effect on the next call.
    #[error("no API credential configured")]
    CredentialMissing,

    /// The provider returned a response with no usable text.
    #[error("provider returned an empty completion")]
    EmptyCompletion,

    /// The remote call exceeded the configured request timeout.
    #[error("provider request timed out")]
    ProviderTimeout,

    /// Any other provider or network failure, surfaced with status and body.
    #[error("provider error: {0}")]
    Provider(String),

    /// The structured blueprint payload was missing fields or not valid JSON.
    #[error("malformed blueprint payload: {0}")]
    MalformedBlueprint(String),

    #[error("storage error: {0}")]
    Storage(#[from] sled::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}
