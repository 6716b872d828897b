//! Reference price quotes.
//!
//! Brokerages report either a single last-traded price or a best bid/ask
//! pair. Both shapes are carried by `Quote` so the trading core does not
//! care which variant is configured.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{OrderSide, Price};

/// Current reference price for the traded instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Quote {
    /// Single last-traded price (ticker endpoints).
    Last { price: Price },
    /// Best bid and ask (pricing endpoints).
    BidAsk { bid: Price, ask: Price },
}

impl Quote {
    pub fn last(price: Price) -> Self {
        Self::Last { price }
    }

    pub fn bid_ask(bid: Price, ask: Price) -> Self {
        Self::BidAsk { bid, ask }
    }

    /// Price relevant to `side`: ask for buys, bid for sells.
    ///
    /// A last-price quote returns the same price for both sides.
    pub fn price_for(&self, side: OrderSide) -> Price {
        match (self, side) {
            (Self::Last { price }, _) => *price,
            (Self::BidAsk { ask, .. }, OrderSide::Buy) => *ask,
            (Self::BidAsk { bid, .. }, OrderSide::Sell) => *bid,
        }
    }

    /// True when every price in the quote is strictly positive.
    pub fn is_valid(&self) -> bool {
        match self {
            Self::Last { price } => price.is_positive(),
            Self::BidAsk { bid, ask } => bid.is_positive() && ask.is_positive(),
        }
    }
}

/// A quote together with the time it was observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimedQuote {
    pub quote: Quote,
    pub received_at: DateTime<Utc>,
}

impl TimedQuote {
    pub fn now(quote: Quote) -> Self {
        Self {
            quote,
            received_at: Utc::now(),
        }
    }

    /// Age of this quote in milliseconds.
    pub fn age_ms(&self) -> i64 {
        (Utc::now() - self.received_at).num_milliseconds()
    }
}
