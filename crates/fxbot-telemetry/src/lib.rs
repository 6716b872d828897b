//! Prometheus metrics and structured logging for fxbot.
//!
//! - Structured logging with tracing (JSON in production)
//! - Prometheus metrics for signals, orders, loss-cuts and open P&L

pub mod error;
pub mod logging;
pub mod metrics;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::init_logging;
pub use metrics::Metrics;
