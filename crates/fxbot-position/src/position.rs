//! The single tracked position.

use fxbot_core::{OrderSide, Price, Quote, Size};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::error::{PositionError, PositionResult};

// ============================================================================
// PositionSide
// ============================================================================

/// Directional exposure of the agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionSide {
    #[default]
    Flat,
    Long,
    Short,
}

impl PositionSide {
    /// Side produced by filling an order of `side` from flat.
    pub fn from_order_side(side: OrderSide) -> Self {
        match side {
            OrderSide::Buy => Self::Long,
            OrderSide::Sell => Self::Short,
        }
    }

    /// 1 for long, -1 for short, 0 for flat.
    pub fn sign(&self) -> i8 {
        match self {
            Self::Flat => 0,
            Self::Long => 1,
            Self::Short => -1,
        }
    }
}

// ============================================================================
// Position
// ============================================================================

/// Current position. `side == Flat` if and only if `quantity == 0`.
///
/// Fields are private so that invariant holds for every value in
/// circulation; construct with [`Position::flat`] or [`Position::open`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Position {
    side: PositionSide,
    quantity: Size,
    entry_price: Price,
}

impl Default for Position {
    fn default() -> Self {
        Self::flat()
    }
}

impl Position {
    /// `{Flat, 0, 0}`.
    pub const fn flat() -> Self {
        Self {
            side: PositionSide::Flat,
            quantity: Size::ZERO,
            entry_price: Price::ZERO,
        }
    }

    /// Position resulting from a filled order of `side`.
    pub fn open(side: OrderSide, quantity: Size, entry_price: Price) -> PositionResult<Self> {
        if !quantity.is_positive() {
            return Err(PositionError::InvalidState(format!(
                "open position requires positive quantity, got {quantity}"
            )));
        }
        if !entry_price.is_positive() {
            return Err(PositionError::InvalidState(format!(
                "open position requires positive entry price, got {entry_price}"
            )));
        }
        Ok(Self {
            side: PositionSide::from_order_side(side),
            quantity,
            entry_price,
        })
    }

    #[must_use]
    pub fn side(&self) -> PositionSide {
        self.side
    }

    #[must_use]
    pub fn quantity(&self) -> Size {
        self.quantity
    }

    #[must_use]
    pub fn entry_price(&self) -> Price {
        self.entry_price
    }

    #[must_use]
    pub fn is_flat(&self) -> bool {
        self.side == PositionSide::Flat
    }

    /// True if an order of `side` would add to this position.
    #[must_use]
    pub fn is_same_direction(&self, side: OrderSide) -> bool {
        self.side == PositionSide::from_order_side(side)
    }

    /// Direction of the order that closes this position.
    pub fn closing_side(&self) -> Option<OrderSide> {
        match self.side {
            PositionSide::Flat => None,
            PositionSide::Long => Some(OrderSide::Sell),
            PositionSide::Short => Some(OrderSide::Buy),
        }
    }

    /// Reference price used to value this position: ask for a long,
    /// bid for a short, or the last price.
    pub fn mark_price(&self, quote: &Quote) -> Option<Price> {
        match self.side {
            PositionSide::Flat => None,
            PositionSide::Long => Some(quote.price_for(OrderSide::Buy)),
            PositionSide::Short => Some(quote.price_for(OrderSide::Sell)),
        }
    }

    /// `(current - entry) * quantity`, negated for shorts. `None` when flat.
    pub fn unrealized_pnl(&self, current: Price) -> Option<Decimal> {
        let diff = current.inner() - self.entry_price.inner();
        match self.side {
            PositionSide::Flat => None,
            PositionSide::Long => Some(diff * self.quantity.inner()),
            PositionSide::Short => Some(-diff * self.quantity.inner()),
        }
    }
}
