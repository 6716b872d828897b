//! Executor error types.

use fxbot_position::PositionError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("Price feed error: {0}")]
    Feed(String),

    #[error("Order rejected (HTTP {status}): {message}")]
    OrderRejected { status: u16, message: String },

    #[error("Order submission failed: {0}")]
    Submission(String),

    #[error("{context} timed out after {ms}ms")]
    Timeout { context: &'static str, ms: u64 },

    #[error("Sizing error: {0}")]
    Sizing(String),

    /// Closing leg filled, opening leg failed; the position is now flat.
    #[error("Reversal incomplete, position closed but not reopened: {0}")]
    ReversalIncomplete(String),

    #[error("Position changed during execution")]
    StaleState,

    #[error(transparent)]
    Position(#[from] PositionError),
}

pub type ExecutorResult<T> = Result<T, ExecutorError>;
