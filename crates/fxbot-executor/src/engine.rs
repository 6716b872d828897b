//! Trade engine: turns signals into orders and committed positions.
//!
//! # Execution Order (Strict)
//!
//! 1. Acquire the execution lock (held until commit)
//! 2. Snapshot position; same direction → Unchanged, no order
//! 3. Fetch quote, size the order
//! 4. Opposite position → closing order (leg 1), then opening order (leg 2)
//! 5. Commit the new position only after every submitted leg is accepted
//!
//! Liquidation takes the same lock, so a loss-cut never interleaves with
//! a signal.

use std::time::Duration;

use fxbot_broker::{DynBroker, DynPriceFeed, OrderRequest, OrderResult};
use fxbot_core::{BoxFuture, OrderSide, Quote, Signal, Size};
use fxbot_position::{LiquidationResult, Liquidator, Position, PositionStore};
use fxbot_telemetry::Metrics;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::error::{ExecutorError, ExecutorResult};
use crate::sizing::OrderSizing;

/// Default bound on a single feed or broker call.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    pub sizing: OrderSizing,
    pub call_timeout: Duration,
}

impl EngineConfig {
    pub fn new(sizing: OrderSizing) -> Self {
        Self {
            sizing,
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }
}

// ============================================================================
// ExecutionOutcome
// ============================================================================

/// Result of a successful `execute`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionOutcome {
    /// Flat → Long/Short with one order.
    Opened { position: Position, order_id: String },
    /// Long ↔ Short with a closing order followed by an opening order.
    Reversed {
        closed: Position,
        opened: Position,
        close_order_id: String,
        open_order_id: String,
    },
    /// Already positioned in the signal's direction.
    Unchanged { position: Position },
}

impl ExecutionOutcome {
    /// Short label for responses and logs.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Opened { .. } => "opened",
            Self::Reversed { .. } => "reversed",
            Self::Unchanged { .. } => "unchanged",
        }
    }

    /// Position after execution.
    pub fn position(&self) -> Position {
        match self {
            Self::Opened { position, .. } | Self::Unchanged { position } => *position,
            Self::Reversed { opened, .. } => *opened,
        }
    }
}

// ============================================================================
// TradeEngine
// ============================================================================

pub struct TradeEngine {
    config: EngineConfig,
    feed: DynPriceFeed,
    broker: DynBroker,
    store: PositionStore,
    /// Serializes execute and liquidate across their network calls.
    exec_lock: Mutex<()>,
}

impl TradeEngine {
    pub fn new(
        config: EngineConfig,
        feed: DynPriceFeed,
        broker: DynBroker,
        store: PositionStore,
    ) -> Self {
        Self {
            config,
            feed,
            broker,
            store,
            exec_lock: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &PositionStore {
        &self.store
    }

    fn timeout_ms(&self) -> u64 {
        u64::try_from(self.config.call_timeout.as_millis()).unwrap_or(u64::MAX)
    }

    /// Act on `signal`. On error the committed position is unchanged,
    /// except for [`ExecutorError::ReversalIncomplete`] which leaves it flat.
    pub async fn execute(&self, signal: Signal) -> ExecutorResult<ExecutionOutcome> {
        let _guard = self.exec_lock.lock().await;

        let current = self.store.snapshot();
        let side = signal.order_side();

        if current.is_same_direction(side) {
            info!(signal = %signal, position = ?current, "Already positioned, no order");
            return Ok(ExecutionOutcome::Unchanged { position: current });
        }

        let quote = self.fetch_quote().await?;
        let price = quote.price_for(side);
        let quantity = self.config.sizing.quantity(price)?;
        let target = Position::open(side, quantity, price)?;

        debug!(
            signal = %signal,
            price = %price,
            quantity = %quantity,
            current = ?current,
            "Executing signal"
        );

        let Some(closing_side) = current.closing_side() else {
            let order_id = self.submit(side, quantity).await?;
            self.commit(&current, target)?;
            info!(position = ?target, order_id = %order_id, "Position opened");
            return Ok(ExecutionOutcome::Opened {
                position: target,
                order_id,
            });
        };

        // Reversal. Leg 1 failure leaves everything untouched.
        let close_order_id = self.submit(closing_side, current.quantity()).await?;

        match self.submit(side, quantity).await {
            Ok(open_order_id) => {
                self.commit(&current, target)?;
                info!(
                    closed = ?current,
                    opened = ?target,
                    close_order_id = %close_order_id,
                    open_order_id = %open_order_id,
                    "Position reversed"
                );
                Ok(ExecutionOutcome::Reversed {
                    closed: current,
                    opened: target,
                    close_order_id,
                    open_order_id,
                })
            }
            Err(e) => {
                self.commit(&current, Position::flat())?;
                error!(
                    closed = ?current,
                    close_order_id = %close_order_id,
                    error = %e,
                    "Reversal opening leg failed, position is flat"
                );
                Err(ExecutorError::ReversalIncomplete(e.to_string()))
            }
        }
    }

    async fn fetch_quote(&self) -> ExecutorResult<Quote> {
        match tokio::time::timeout(self.config.call_timeout, self.feed.fetch_quote()).await {
            Ok(Ok(quote)) => Ok(quote),
            Ok(Err(e)) => {
                warn!(error = %e, "Price fetch failed");
                Metrics::feed_error("execute");
                Err(ExecutorError::Feed(e.to_string()))
            }
            Err(_) => {
                warn!(timeout_ms = self.timeout_ms(), "Price fetch timed out");
                Metrics::feed_error("execute");
                Err(ExecutorError::Timeout {
                    context: "price fetch",
                    ms: self.timeout_ms(),
                })
            }
        }
    }

    /// Submit one market order; only an accepted order is `Ok`.
    async fn submit(&self, side: OrderSide, size: Size) -> ExecutorResult<String> {
        let order = OrderRequest::market(side, size);
        let cloid = order.client_order_id.clone();
        let side_label = side.to_string();

        let result =
            tokio::time::timeout(self.config.call_timeout, self.broker.submit_market_order(order))
                .await;

        match result {
            Ok(Ok(verdict)) => {
                Metrics::order_submitted(&side_label, verdict.label());
                match verdict {
                    OrderResult::Accepted { order_id } => {
                        debug!(cloid = %cloid, order_id = %order_id, side = %side, size = %size, "Order accepted");
                        Ok(order_id)
                    }
                    OrderResult::Rejected { status, message } => {
                        warn!(cloid = %cloid, status, message = %message, "Order rejected");
                        Err(ExecutorError::OrderRejected { status, message })
                    }
                }
            }
            Ok(Err(e)) => {
                Metrics::order_submitted(&side_label, "error");
                warn!(cloid = %cloid, broker = self.broker.name(), error = %e, "Order submission failed");
                Err(ExecutorError::Submission(e.to_string()))
            }
            Err(_) => {
                Metrics::order_submitted(&side_label, "error");
                warn!(cloid = %cloid, timeout_ms = self.timeout_ms(), "Order submission timed out");
                Err(ExecutorError::Timeout {
                    context: "order submission",
                    ms: self.timeout_ms(),
                })
            }
        }
    }

    fn commit(&self, expected: &Position, new: Position) -> ExecutorResult<()> {
        if self.store.compare_and_set(expected, new) {
            Ok(())
        } else {
            Err(ExecutorError::StaleState)
        }
    }

    async fn close_position(&self, expected: Position) -> LiquidationResult {
        let _guard = self.exec_lock.lock().await;

        let current = self.store.snapshot();
        if current != expected {
            return LiquidationResult::Skipped {
                reason: format!("position changed since evaluation: {current:?}"),
            };
        }
        let Some(closing_side) = current.closing_side() else {
            return LiquidationResult::Skipped {
                reason: "already flat".to_string(),
            };
        };

        match self.submit(closing_side, current.quantity()).await {
            Ok(order_id) => match self.commit(&expected, Position::flat()) {
                Ok(()) => LiquidationResult::Liquidated { order_id },
                Err(e) => LiquidationResult::Failed {
                    reason: e.to_string(),
                },
            },
            Err(e) => LiquidationResult::Failed {
                reason: e.to_string(),
            },
        }
    }
}

impl Liquidator for TradeEngine {
    fn liquidate(&self, expected: Position) -> BoxFuture<'_, LiquidationResult> {
        Box::pin(self.close_position(expected))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fxbot_broker::{MockBroker, MockPriceFeed, MockResponse};
    use fxbot_core::Price;
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    struct Harness {
        feed: Arc<MockPriceFeed>,
        broker: Arc<MockBroker>,
        store: PositionStore,
        engine: TradeEngine,
    }

    fn harness(quote: Quote) -> Harness {
        let feed = Arc::new(MockPriceFeed::new(quote));
        let broker = Arc::new(MockBroker::new());
        let store = PositionStore::new();
        let engine = TradeEngine::new(
            EngineConfig::new(OrderSizing::notional(dec!(1000))),
            feed.clone(),
            broker.clone(),
            store.clone(),
        );
        Harness {
            feed,
            broker,
            store,
            engine,
        }
    }

    fn last(price: rust_decimal::Decimal) -> Quote {
        Quote::last(Price::new(price))
    }

    fn sides_and_sizes(broker: &MockBroker) -> Vec<(OrderSide, Size)> {
        broker.orders().iter().map(|o| (o.side, o.size)).collect()
    }

    #[tokio::test]
    async fn test_flat_to_long_single_order() {
        let h = harness(last(dec!(8000000)));

        let outcome = h.engine.execute(Signal::Buy).await.unwrap();

        let expected = Position::open(
            OrderSide::Buy,
            Size::new(dec!(0.000125)),
            Price::new(dec!(8000000)),
        )
        .unwrap();
        assert_eq!(outcome.label(), "opened");
        assert_eq!(outcome.position(), expected);
        assert_eq!(h.store.snapshot(), expected);
        assert_eq!(
            sides_and_sizes(&h.broker),
            vec![(OrderSide::Buy, Size::new(dec!(0.000125)))]
        );
    }

    #[tokio::test]
    async fn test_reversal_closes_then_opens() {
        let h = harness(last(dec!(8000000)));
        h.engine.execute(Signal::Buy).await.unwrap();
        h.broker.clear_orders();

        h.feed.set_quote(last(dec!(5000000)));
        let outcome = h.engine.execute(Signal::Sell).await.unwrap();

        assert_eq!(outcome.label(), "reversed");
        assert_eq!(
            sides_and_sizes(&h.broker),
            vec![
                (OrderSide::Sell, Size::new(dec!(0.000125))),
                (OrderSide::Sell, Size::new(dec!(0.0002))),
            ]
        );
        assert_eq!(
            h.store.snapshot(),
            Position::open(OrderSide::Sell, Size::new(dec!(0.0002)), Price::new(dec!(5000000)))
                .unwrap()
        );
    }

    #[tokio::test]
    async fn test_rejected_open_commits_nothing() {
        let h = harness(last(dec!(8000000)));
        h.broker.push_response(MockResponse::Reject {
            status: 400,
            message: "insufficient margin".to_string(),
        });

        let err = h.engine.execute(Signal::Buy).await.unwrap_err();

        assert!(matches!(err, ExecutorError::OrderRejected { status: 400, .. }));
        assert_eq!(h.store.snapshot(), Position::flat());
    }

    #[tokio::test]
    async fn test_failed_close_leg_skips_open_leg() {
        let h = harness(last(dec!(8000000)));
        h.engine.execute(Signal::Buy).await.unwrap();
        let before = h.store.snapshot();
        h.broker.clear_orders();
        h.broker.push_response(MockResponse::Error("connection reset".to_string()));

        let err = h.engine.execute(Signal::Sell).await.unwrap_err();

        assert!(matches!(err, ExecutorError::Submission(_)));
        assert_eq!(h.broker.order_count(), 1);
        assert_eq!(h.store.snapshot(), before);
    }

    #[tokio::test]
    async fn test_failed_open_leg_leaves_flat() {
        let h = harness(last(dec!(8000000)));
        h.engine.execute(Signal::Buy).await.unwrap();
        h.broker.clear_orders();
        h.broker.push_response(MockResponse::Accept);
        h.broker.push_response(MockResponse::Reject {
            status: 400,
            message: "market closed".to_string(),
        });

        let err = h.engine.execute(Signal::Sell).await.unwrap_err();

        assert!(matches!(err, ExecutorError::ReversalIncomplete(_)));
        assert_eq!(h.broker.order_count(), 2);
        assert_eq!(h.store.snapshot(), Position::flat());
    }

    #[tokio::test]
    async fn test_same_direction_is_unchanged() {
        let h = harness(last(dec!(8000000)));
        h.engine.execute(Signal::Buy).await.unwrap();
        let before = h.store.snapshot();

        let outcome = h.engine.execute(Signal::Buy).await.unwrap();

        assert_eq!(outcome, ExecutionOutcome::Unchanged { position: before });
        assert_eq!(h.broker.order_count(), 1);
        assert_eq!(h.feed.call_count(), 1);
    }

    #[tokio::test]
    async fn test_feed_failure_submits_nothing() {
        let h = harness(last(dec!(8000000)));
        h.feed.set_error("ticker down");

        let err = h.engine.execute(Signal::Buy).await.unwrap_err();

        assert!(matches!(err, ExecutorError::Feed(_)));
        assert_eq!(h.broker.order_count(), 0);
        assert!(h.store.snapshot().is_flat());
    }

    #[tokio::test]
    async fn test_order_timeout_commits_nothing() {
        let feed = Arc::new(MockPriceFeed::new(last(dec!(8000000))));
        let broker = Arc::new(MockBroker::new());
        broker.set_delay(Duration::from_millis(200));
        let store = PositionStore::new();
        let mut config = EngineConfig::new(OrderSizing::notional(dec!(1000)));
        config.call_timeout = Duration::from_millis(20);
        let engine = TradeEngine::new(config, feed, broker, store.clone());

        let err = engine.execute(Signal::Buy).await.unwrap_err();

        assert!(matches!(err, ExecutorError::Timeout { ms: 20, .. }));
        assert!(store.snapshot().is_flat());
    }

    #[tokio::test]
    async fn test_entry_uses_side_of_book() {
        let h = harness(Quote::bid_ask(Price::new(dec!(4000000)), Price::new(dec!(5000000))));

        h.engine.execute(Signal::Buy).await.unwrap();
        assert_eq!(h.store.snapshot().entry_price(), Price::new(dec!(5000000)));
        assert_eq!(h.store.snapshot().quantity(), Size::new(dec!(0.0002)));

        h.engine.execute(Signal::Sell).await.unwrap();
        assert_eq!(h.store.snapshot().entry_price(), Price::new(dec!(4000000)));
        assert_eq!(h.store.snapshot().quantity(), Size::new(dec!(0.00025)));
    }

    #[tokio::test]
    async fn test_liquidate_clears_position() {
        let h = harness(last(dec!(8000000)));
        h.engine.execute(Signal::Buy).await.unwrap();
        let pos = h.store.snapshot();
        h.broker.clear_orders();

        let result = h.engine.liquidate(pos).await;

        assert!(matches!(result, LiquidationResult::Liquidated { .. }));
        assert_eq!(
            sides_and_sizes(&h.broker),
            vec![(OrderSide::Sell, Size::new(dec!(0.000125)))]
        );
        assert!(h.store.snapshot().is_flat());
    }

    #[tokio::test]
    async fn test_liquidate_skips_changed_position() {
        let h = harness(last(dec!(8000000)));
        h.engine.execute(Signal::Buy).await.unwrap();
        let stale = h.store.snapshot();
        h.engine.execute(Signal::Sell).await.unwrap();
        h.broker.clear_orders();

        let result = h.engine.liquidate(stale).await;

        assert!(matches!(result, LiquidationResult::Skipped { .. }));
        assert_eq!(h.broker.order_count(), 0);
        assert!(!h.store.snapshot().is_flat());
    }

    #[tokio::test]
    async fn test_liquidate_failure_keeps_position() {
        let h = harness(last(dec!(8000000)));
        h.engine.execute(Signal::Buy).await.unwrap();
        let pos = h.store.snapshot();
        h.broker.push_response(MockResponse::Error("timeout".to_string()));

        let result = h.engine.liquidate(pos).await;

        assert!(matches!(result, LiquidationResult::Failed { .. }));
        assert_eq!(h.store.snapshot(), pos);
    }
}
