//! Common error types and aliases.
//!
//! `GenerationError` is the workflow-level taxonomy; every variant maps to a
//! user-facing message that ends up in the `{ success: false, error }`
//! envelope. `StoreError` covers datastore and object-storage access.
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("backend error: {0}")]
    Backend(String),
    #[error("http client error: {0}")]
    HttpClient(#[from] reqwest::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Event credits exhausted")]
    CreditsExhausted,
    #[error("Unknown event: {0}")]
    UnknownEvent(String),
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("Image upload failed (primary: {primary}; fallback: {fallback})")]
    Upload { primary: String, fallback: String },
    #[error("Insufficient balance on the generation account")]
    InsufficientBalance,
    #[error("Generation API credential rejected")]
    CredentialRejected,
    #[error("Generation API error: {0}")]
    Provider(String),
    #[error("Generation failed: {0}")]
    TaskFailed(String),
    #[error("Datastore error: {0}")]
    Store(#[from] StoreError),
    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),
}

pub type AppResult<T> = Result<T, GenerationError>;
