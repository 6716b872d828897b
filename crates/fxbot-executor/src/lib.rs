//! Signal execution for fxbot.
//!
//! [`TradeEngine`] converts buy/sell signals into market orders and commits
//! the resulting position; it also implements
//! [`fxbot_position::Liquidator`] for the loss-cut monitor.

pub mod engine;
pub mod error;
pub mod sizing;

pub use engine::{EngineConfig, ExecutionOutcome, TradeEngine, DEFAULT_CALL_TIMEOUT};
pub use error::{ExecutorError, ExecutorResult};
pub use sizing::{OrderSizing, DEFAULT_SIZE_DECIMALS};
