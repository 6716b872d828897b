//! Core domain types for the fxbot signal trading agent.
//!
//! This crate provides the types shared by every other crate:
//! - `Price`, `Size`: Precision-safe numeric types
//! - `OrderSide`, `TimeInForce`, `ClientOrderId`: Order vocabulary
//! - `Signal`: Normalized inbound webhook instruction
//! - `Quote`: Reference price as reported by a brokerage

pub mod decimal;
pub mod error;
pub mod order;
pub mod quote;
pub mod signal;

use std::future::Future;
use std::pin::Pin;

pub use decimal::{Price, Size};
pub use error::{CoreError, Result};
pub use order::{ClientOrderId, OrderSide, TimeInForce};
pub use quote::{Quote, TimedQuote};
pub use signal::Signal;

/// Boxed future for dyn-compatible async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
