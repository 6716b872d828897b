//! Prometheus metrics for fxbot.
//!
//! # Panics
//!
//! Metric registration uses `unwrap()` intentionally. A registration failure
//! means duplicate metric names, a fatal configuration error that should
//! crash at first use rather than fail silently.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_gauge, register_int_counter, CounterVec, Encoder, Gauge,
    IntCounter, TextEncoder,
};

use crate::error::{TelemetryError, TelemetryResult};

/// Inbound signals accepted by the webhook.
/// Labels: signal (buy/sell)
pub static SIGNALS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!("fxbot_signals_total", "Accepted trading signals", &["signal"]).unwrap()
});

/// Webhook requests rejected before reaching the engine.
pub static INVALID_SIGNALS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "fxbot_invalid_signals_total",
        "Webhook payloads with a missing or unknown signal"
    )
    .unwrap()
});

/// Market orders submitted to the broker.
/// Labels: side (buy/sell), result (accepted/rejected/error)
pub static ORDERS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "fxbot_orders_total",
        "Market orders submitted",
        &["side", "result"]
    )
    .unwrap()
});

/// Completed loss-cut liquidations.
pub static LOSS_CUTS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!("fxbot_loss_cuts_total", "Loss-cut liquidations executed").unwrap()
});

/// Price feed failures.
/// Labels: context (execute/monitor)
pub static FEED_ERRORS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "fxbot_feed_errors_total",
        "Price feed failures",
        &["context"]
    )
    .unwrap()
});

/// Last unrealized P&L observed by the monitor (quote currency).
pub static UNREALIZED_PNL: Lazy<Gauge> = Lazy::new(|| {
    register_gauge!("fxbot_unrealized_pnl", "Unrealized P&L of the open position").unwrap()
});

/// Current position side (1 = long, -1 = short, 0 = flat).
pub static POSITION_SIDE: Lazy<Gauge> = Lazy::new(|| {
    register_gauge!("fxbot_position_side", "Position side (1=long, -1=short, 0=flat)").unwrap()
});

/// Metrics facade for easy access.
pub struct Metrics;

impl Metrics {
    /// Record an accepted signal.
    pub fn signal_received(signal: &str) {
        SIGNALS_TOTAL.with_label_values(&[signal]).inc();
    }

    /// Record a rejected webhook payload.
    pub fn invalid_signal() {
        INVALID_SIGNALS_TOTAL.inc();
    }

    /// Record an order submission outcome.
    pub fn order_submitted(side: &str, result: &str) {
        ORDERS_TOTAL.with_label_values(&[side, result]).inc();
    }

    /// Record a completed liquidation.
    pub fn loss_cut() {
        LOSS_CUTS_TOTAL.inc();
    }

    /// Record a price feed failure.
    pub fn feed_error(context: &str) {
        FEED_ERRORS_TOTAL.with_label_values(&[context]).inc();
    }

    /// Record the latest unrealized P&L.
    pub fn unrealized_pnl(pnl: f64) {
        UNREALIZED_PNL.set(pnl);
    }

    /// Record the committed position side as -1, 0 or 1.
    pub fn position_side(sign: i8) {
        POSITION_SIDE.set(f64::from(sign));
    }

    /// Render all registered metrics in Prometheus text format.
    pub fn render() -> TelemetryResult<String> {
        let encoder = TextEncoder::new();
        let mut buf = Vec::new();
        encoder
            .encode(&prometheus::gather(), &mut buf)
            .map_err(|e| TelemetryError::Metrics(e.to_string()))?;
        String::from_utf8(buf).map_err(|e| TelemetryError::Metrics(e.to_string()))
    }
}
