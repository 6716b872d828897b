//! Brokerage contracts: price feed and market-order submission.
//!
//! Both traits are dyn-compatible so the application can select the
//! signed-REST or bearer-token variant at startup and hand the same
//! `Arc<dyn ...>` to the trade engine and the loss-cut monitor.

use std::sync::Arc;

use fxbot_core::{BoxFuture, ClientOrderId, OrderSide, Quote, Size};

use crate::error::BrokerResult;

/// A market order for the configured instrument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderRequest {
    /// Direction of the order.
    pub side: OrderSide,
    /// Unsigned quantity; direction is carried by `side`.
    pub size: Size,
    /// Correlation id for logs (and for the broker when it supports one).
    pub client_order_id: ClientOrderId,
}

impl OrderRequest {
    pub fn market(side: OrderSide, size: Size) -> Self {
        Self {
            side,
            size,
            client_order_id: ClientOrderId::new(),
        }
    }
}

/// Broker verdict on a submitted order.
///
/// Transport failures are reported as `Err(BrokerError)` instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderResult {
    /// Order accepted; carries the exchange order id.
    Accepted { order_id: String },
    /// Order refused by the broker.
    Rejected { status: u16, message: String },
}

impl OrderResult {
    /// Metric/log label for this result.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Accepted { .. } => "accepted",
            Self::Rejected { .. } => "rejected",
        }
    }
}

/// Source of the current reference price for the instrument.
pub trait PriceFeed: Send + Sync {
    /// Fetch the current quote. Failures are explicit errors, never a
    /// substituted constant.
    fn fetch_quote(&self) -> BoxFuture<'_, BrokerResult<Quote>>;
}

/// Authenticated market-order submission.
///
/// Implementations never retry; retry policy belongs to the caller.
pub trait BrokerAdapter: Send + Sync {
    /// Submit a market order.
    fn submit_market_order(&self, order: OrderRequest) -> BoxFuture<'_, BrokerResult<OrderResult>>;

    /// Short name of the adapter variant, for logs.
    fn name(&self) -> &'static str;
}

/// Arc wrapper for PriceFeed trait objects.
pub type DynPriceFeed = Arc<dyn PriceFeed>;

/// Arc wrapper for BrokerAdapter trait objects.
pub type DynBroker = Arc<dyn BrokerAdapter>;
