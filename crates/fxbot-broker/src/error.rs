//! Broker error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("Response parse error: {0}")]
    Parse(String),

    #[error("Invalid quote: {0}")]
    InvalidQuote(String),

    #[error("Signing error: {0}")]
    Signing(String),

    #[error("Credential not available: {0}")]
    MissingCredential(String),

    #[error("Invalid order: {0}")]
    InvalidOrder(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type BrokerResult<T> = Result<T, BrokerError>;
