//! fxbot: webhook-driven signal trading agent.
//!
//! Orchestrates:
//! - Webhook server receiving buy/sell signals
//! - Trade engine placing market orders through the configured broker
//! - Loss-cut monitor liquidating the position past the loss threshold

pub mod app;
pub mod config;
pub mod error;
pub mod webhook;

pub use app::{build_adapters, Application};
pub use config::{AppConfig, BrokerKind};
pub use error::{AppError, AppResult};
pub use webhook::{create_router, AppState};
