//! Position management for fxbot.
//!
//! Tracks the single open position and enforces the loss-cut rule.
//!
//! # Key Components
//!
//! - [`Position`]: Side, quantity and entry price of the current exposure
//! - [`PositionStore`]: Synchronized owner of the position
//! - [`LossCut`]: Strict unrealized-P&L threshold
//! - [`Liquidator`]: Trait through which the monitor closes the position
//! - [`LossCutMonitor`]: Background task evaluating the position on an interval

pub mod error;
pub mod loss_cut;
pub mod position;
pub mod store;

pub use error::{PositionError, PositionResult};
pub use loss_cut::{
    DynLiquidator, LiquidationResult, Liquidator, LossCut, LossCutConfig, LossCutMonitor,
    TickOutcome, DEFAULT_CALL_TIMEOUT, DEFAULT_CHECK_INTERVAL,
};
pub use position::{Position, PositionSide};
pub use store::PositionStore;
