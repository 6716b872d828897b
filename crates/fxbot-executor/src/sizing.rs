//! Order quantity calculation.

use fxbot_core::{Price, Size};
use rust_decimal::Decimal;

use crate::error::{ExecutorError, ExecutorResult};

/// Fractional digits kept by notional sizing.
pub const DEFAULT_SIZE_DECIMALS: u32 = 8;

/// How many units a new position opens with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderSizing {
    /// `budget / price`, truncated toward zero to `size_decimals` places.
    Notional { budget: Decimal, size_decimals: u32 },
    /// Same quantity regardless of price.
    FixedUnits { units: Size },
}

impl OrderSizing {
    pub fn notional(budget: Decimal) -> Self {
        Self::Notional {
            budget,
            size_decimals: DEFAULT_SIZE_DECIMALS,
        }
    }

    pub fn fixed_units(units: Size) -> Self {
        Self::FixedUnits { units }
    }

    /// Quantity to order at `price`.
    pub fn quantity(&self, price: Price) -> ExecutorResult<Size> {
        if !price.is_positive() {
            return Err(ExecutorError::Sizing(format!("non-positive price {price}")));
        }

        let quantity = match *self {
            Self::Notional {
                budget,
                size_decimals,
            } => {
                let raw = budget
                    .checked_div(price.inner())
                    .ok_or_else(|| ExecutorError::Sizing(format!("{budget} / {price} overflowed")))?;
                Size::new(raw).truncate_to(size_decimals)
            }
            Self::FixedUnits { units } => units,
        };

        if !quantity.is_positive() {
            return Err(ExecutorError::Sizing(format!(
                "quantity {quantity} at price {price} is not tradable"
            )));
        }
        Ok(quantity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_notional_exact() {
        let qty = OrderSizing::notional(dec!(1000))
            .quantity(Price::new(dec!(8000000)))
            .unwrap();
        assert_eq!(qty, Size::new(dec!(0.000125)));
    }

    #[test]
    fn test_notional_truncates_toward_zero() {
        // 1000 / 3 = 333.333...; 1000 / 7_000_000 = 0.000142857142...
        let sizing = OrderSizing::notional(dec!(1000));
        assert_eq!(
            sizing.quantity(Price::new(dec!(7000000))).unwrap(),
            Size::new(dec!(0.00014285))
        );
        let coarse = OrderSizing::Notional {
            budget: dec!(1000),
            size_decimals: 0,
        };
        assert_eq!(coarse.quantity(Price::new(dec!(3))).unwrap(), Size::new(dec!(333)));
    }

    #[test]
    fn test_notional_below_one_step_is_error() {
        let sizing = OrderSizing::notional(dec!(1));
        let err = sizing.quantity(Price::new(dec!(1000000000000))).unwrap_err();
        assert!(matches!(err, ExecutorError::Sizing(_)));
    }

    #[test]
    fn test_fixed_units_ignore_price() {
        let sizing = OrderSizing::fixed_units(Size::new(dec!(1000)));
        assert_eq!(
            sizing.quantity(Price::new(dec!(110.5))).unwrap(),
            Size::new(dec!(1000))
        );
    }

    #[test]
    fn test_non_positive_price_is_error() {
        let sizing = OrderSizing::notional(dec!(1000));
        assert!(sizing.quantity(Price::ZERO).is_err());
        assert!(sizing.quantity(Price::new(dec!(-1))).is_err());
    }
}
