//! Loss-cut rule and the background monitor that enforces it.
//!
//! Provides:
//! - `LossCut`: strict threshold check on unrealized P&L
//! - `Liquidator`: seam through which the monitor closes the position
//! - `LossCutMonitor`: periodic task evaluating the open position
//!
//! The monitor never writes the store itself; clearing happens inside the
//! liquidator after the closing order is confirmed.

use std::sync::Arc;
use std::time::Duration;

use fxbot_broker::DynPriceFeed;
use fxbot_core::BoxFuture;
use fxbot_telemetry::Metrics;
use rust_decimal::Decimal;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::position::Position;
use crate::store::PositionStore;

/// Default monitor interval: 30 seconds.
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(30);

/// Default bound on a single price fetch.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(15);

// ============================================================================
// LossCut
// ============================================================================

/// Liquidate when unrealized P&L falls strictly below `threshold`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LossCut {
    threshold: Decimal,
}

impl LossCut {
    #[must_use]
    pub fn new(threshold: Decimal) -> Self {
        Self { threshold }
    }

    #[must_use]
    pub fn threshold(&self) -> Decimal {
        self.threshold
    }

    /// `pnl < threshold`. A P&L exactly at the threshold is not a breach.
    #[must_use]
    pub fn is_breached(&self, pnl: Decimal) -> bool {
        pnl < self.threshold
    }
}

// ============================================================================
// Liquidator
// ============================================================================

/// Outcome of a liquidation attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LiquidationResult {
    /// Closing order accepted and the position cleared.
    Liquidated { order_id: String },
    /// Nothing submitted; the position no longer matches the snapshot.
    Skipped { reason: String },
    /// Closing order failed; the position is unchanged.
    Failed { reason: String },
}

/// Closes the whole position described by `expected`.
///
/// Implementations must serialize with other position writers and must
/// leave the store untouched unless the closing order is confirmed.
pub trait Liquidator: Send + Sync {
    fn liquidate(&self, expected: Position) -> BoxFuture<'_, LiquidationResult>;
}

/// Arc wrapper for Liquidator trait objects.
pub type DynLiquidator = Arc<dyn Liquidator>;

// ============================================================================
// LossCutMonitor
// ============================================================================

#[derive(Debug, Clone, Copy)]
pub struct LossCutConfig {
    pub threshold: Decimal,
    pub check_interval: Duration,
    /// Bound on the price fetch of one tick.
    pub call_timeout: Duration,
}

impl LossCutConfig {
    #[must_use]
    pub fn new(threshold: Decimal) -> Self {
        Self {
            threshold,
            check_interval: DEFAULT_CHECK_INTERVAL,
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }
}

/// What one monitor tick did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// No open position.
    Flat,
    /// Position held; P&L within threshold.
    Holding { pnl: Decimal },
    /// Price could not be obtained.
    FeedError(String),
    Liquidated { pnl: Decimal, order_id: String },
    Skipped { pnl: Decimal, reason: String },
    LiquidationFailed { pnl: Decimal, reason: String },
}

/// Background monitor for loss-cut liquidation.
///
/// Every failure is confined to its tick; the loop only ends on shutdown.
pub struct LossCutMonitor {
    rule: LossCut,
    config: LossCutConfig,
    store: PositionStore,
    feed: DynPriceFeed,
    liquidator: DynLiquidator,
}

impl LossCutMonitor {
    pub fn new(
        config: LossCutConfig,
        store: PositionStore,
        feed: DynPriceFeed,
        liquidator: DynLiquidator,
    ) -> Self {
        Self {
            rule: LossCut::new(config.threshold),
            config,
            store,
            feed,
            liquidator,
        }
    }

    /// Evaluate the current position once.
    pub async fn tick(&self) -> TickOutcome {
        let position = self.store.snapshot();
        if position.is_flat() {
            return TickOutcome::Flat;
        }

        let quote = match tokio::time::timeout(self.config.call_timeout, self.feed.fetch_quote())
            .await
        {
            Ok(Ok(quote)) => quote,
            Ok(Err(e)) => {
                warn!(error = %e, "LossCut: price fetch failed, skipping tick");
                Metrics::feed_error("monitor");
                return TickOutcome::FeedError(e.to_string());
            }
            Err(_) => {
                let ms = self.config.call_timeout.as_millis();
                warn!(timeout_ms = %ms, "LossCut: price fetch timed out, skipping tick");
                Metrics::feed_error("monitor");
                return TickOutcome::FeedError(format!("timed out after {ms}ms"));
            }
        };

        let Some(mark) = position.mark_price(&quote) else {
            return TickOutcome::Flat;
        };
        let Some(pnl) = position.unrealized_pnl(mark) else {
            return TickOutcome::Flat;
        };

        self.store.record_pnl(&position, pnl);

        if !self.rule.is_breached(pnl) {
            debug!(
                side = ?position.side(),
                entry = %position.entry_price(),
                mark = %mark,
                pnl = %pnl,
                "LossCut: position within threshold"
            );
            return TickOutcome::Holding { pnl };
        }

        warn!(
            side = ?position.side(),
            quantity = %position.quantity(),
            entry = %position.entry_price(),
            mark = %mark,
            pnl = %pnl,
            threshold = %self.rule.threshold(),
            "LossCut: threshold breached, liquidating"
        );

        match self.liquidator.liquidate(position).await {
            LiquidationResult::Liquidated { order_id } => {
                info!(order_id = %order_id, pnl = %pnl, "LossCut: position liquidated");
                Metrics::loss_cut();
                TickOutcome::Liquidated { pnl, order_id }
            }
            LiquidationResult::Skipped { reason } => {
                info!(reason = %reason, "LossCut: liquidation skipped");
                TickOutcome::Skipped { pnl, reason }
            }
            LiquidationResult::Failed { reason } => {
                error!(reason = %reason, "LossCut: liquidation failed, position still open");
                TickOutcome::LiquidationFailed { pnl, reason }
            }
        }
    }

    /// Run until `shutdown` is cancelled.
    ///
    /// A tick already in progress completes before the loop exits.
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            threshold = %self.rule.threshold(),
            interval_secs = self.config.check_interval.as_secs_f64(),
            "LossCutMonitor started"
        );

        let mut ticker = tokio::time::interval(self.config.check_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    self.tick().await;
                }
            }
        }

        info!("LossCutMonitor stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fxbot_broker::MockPriceFeed;
    use fxbot_core::{OrderSide, Price, Quote, Size};
    use parking_lot::Mutex;
    use rust_decimal_macros::dec;

    /// Clears the store on success, like the trade engine does.
    struct RecordingLiquidator {
        store: PositionStore,
        calls: Mutex<Vec<Position>>,
        fail: Mutex<Option<String>>,
    }

    impl RecordingLiquidator {
        fn new(store: PositionStore) -> Self {
            Self {
                store,
                calls: Mutex::new(Vec::new()),
                fail: Mutex::new(None),
            }
        }

        fn calls(&self) -> usize {
            self.calls.lock().len()
        }
    }

    impl Liquidator for RecordingLiquidator {
        fn liquidate(&self, expected: Position) -> BoxFuture<'_, LiquidationResult> {
            Box::pin(async move {
                self.calls.lock().push(expected);
                if let Some(reason) = self.fail.lock().clone() {
                    return LiquidationResult::Failed { reason };
                }
                if self.store.compare_and_set(&expected, Position::flat()) {
                    LiquidationResult::Liquidated {
                        order_id: "close-1".to_string(),
                    }
                } else {
                    LiquidationResult::Skipped {
                        reason: "moved".to_string(),
                    }
                }
            })
        }
    }

    struct Harness {
        store: PositionStore,
        feed: Arc<MockPriceFeed>,
        liquidator: Arc<RecordingLiquidator>,
        monitor: LossCutMonitor,
    }

    fn harness(price: Decimal) -> Harness {
        let store = PositionStore::new();
        let feed = Arc::new(MockPriceFeed::new(Quote::last(Price::new(price))));
        let liquidator = Arc::new(RecordingLiquidator::new(store.clone()));
        let monitor = LossCutMonitor::new(
            LossCutConfig::new(dec!(-200)),
            store.clone(),
            feed.clone(),
            liquidator.clone(),
        );
        Harness {
            store,
            feed,
            liquidator,
            monitor,
        }
    }

    fn open_long(store: &PositionStore) -> Position {
        let pos = Position::open(
            OrderSide::Buy,
            Size::new(dec!(0.000125)),
            Price::new(dec!(8000000)),
        )
        .unwrap();
        store.update(|_| pos);
        pos
    }

    #[test]
    fn test_threshold_is_strict() {
        let rule = LossCut::new(dec!(-200));
        assert!(!rule.is_breached(dec!(-200)));
        assert!(rule.is_breached(dec!(-200.000001)));
        assert!(!rule.is_breached(dec!(15)));
    }

    #[tokio::test]
    async fn test_flat_tick_does_not_fetch_price() {
        let h = harness(dec!(8000000));
        assert_eq!(h.monitor.tick().await, TickOutcome::Flat);
        assert_eq!(h.feed.call_count(), 0);
    }

    #[tokio::test]
    async fn test_holding_within_threshold() {
        let h = harness(dec!(7999000));
        open_long(&h.store);

        assert_eq!(
            h.monitor.tick().await,
            TickOutcome::Holding {
                pnl: dec!(-125.000)
            }
        );
        assert_eq!(h.liquidator.calls(), 0);
        assert_eq!(h.store.snapshot_with_pnl().1, Some(dec!(-125)));
    }

    #[tokio::test]
    async fn test_pnl_at_threshold_does_not_liquidate() {
        let h = harness(dec!(6400000));
        open_long(&h.store);

        assert_eq!(
            h.monitor.tick().await,
            TickOutcome::Holding { pnl: dec!(-200) }
        );
        assert_eq!(h.liquidator.calls(), 0);
    }

    #[tokio::test]
    async fn test_breach_liquidates_and_clears() {
        let h = harness(dec!(6000000));
        let pos = open_long(&h.store);

        let outcome = h.monitor.tick().await;
        assert_eq!(
            outcome,
            TickOutcome::Liquidated {
                pnl: dec!(-250),
                order_id: "close-1".to_string()
            }
        );
        assert_eq!(h.liquidator.calls.lock().as_slice(), &[pos]);
        assert!(h.store.snapshot().is_flat());

        // Cleared position: further ticks are inert.
        assert_eq!(h.monitor.tick().await, TickOutcome::Flat);
        assert_eq!(h.liquidator.calls(), 1);
    }

    #[tokio::test]
    async fn test_failed_liquidation_keeps_position() {
        let h = harness(dec!(6000000));
        let pos = open_long(&h.store);
        *h.liquidator.fail.lock() = Some("broker down".to_string());

        let outcome = h.monitor.tick().await;
        assert!(matches!(outcome, TickOutcome::LiquidationFailed { .. }));
        assert_eq!(h.store.snapshot(), pos);

        // Next tick retries.
        *h.liquidator.fail.lock() = None;
        assert!(matches!(h.monitor.tick().await, TickOutcome::Liquidated { .. }));
    }

    #[tokio::test]
    async fn test_feed_error_skips_tick() {
        let h = harness(dec!(6000000));
        let pos = open_long(&h.store);
        h.feed.set_error("ticker down");

        assert!(matches!(h.monitor.tick().await, TickOutcome::FeedError(_)));
        assert_eq!(h.store.snapshot(), pos);
        assert_eq!(h.liquidator.calls(), 0);
    }

    #[tokio::test]
    async fn test_run_stops_on_cancel() {
        let h = harness(dec!(6000000));
        open_long(&h.store);

        let token = CancellationToken::new();
        let mut config = LossCutConfig::new(dec!(-200));
        config.check_interval = Duration::from_millis(10);
        let monitor = LossCutMonitor::new(config, h.store.clone(), h.feed.clone(), h.liquidator.clone());

        let task = tokio::spawn(monitor.run(token.clone()));
        tokio::time::sleep(Duration::from_millis(50)).await;
        token.cancel();

        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("monitor did not stop")
            .unwrap();

        assert!(h.store.snapshot().is_flat());
        assert_eq!(h.liquidator.calls(), 1);
    }
}
