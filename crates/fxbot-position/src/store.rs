//! Synchronized owner of the single [`Position`].
//!
//! Every read and write passes through one mutex. The lock is only ever
//! held for a copy or a compare-and-set; callers perform network calls
//! first and commit afterwards.

use std::sync::Arc;

use fxbot_telemetry::Metrics;
use parking_lot::Mutex;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tracing::{debug, warn};

use crate::position::Position;

#[derive(Debug, Default)]
struct StoreState {
    position: Position,
    /// Last unrealized P&L computed by the monitor.
    last_pnl: Option<Decimal>,
}

impl StoreState {
    /// Install `new`; returns true when it replaced a different position,
    /// whose P&L no longer applies.
    fn replace(&mut self, new: Position) -> bool {
        let changed = self.position != new;
        self.position = new;
        if changed {
            self.last_pnl = None;
        }
        changed
    }
}

fn publish(new: &Position, changed: bool) {
    Metrics::position_side(new.side().sign());
    if changed {
        Metrics::unrealized_pnl(0.0);
    }
}

/// Cloneable handle to the shared position.
#[derive(Debug, Clone, Default)]
pub struct PositionStore {
    state: Arc<Mutex<StoreState>>,
}

impl PositionStore {
    /// Store starting at `{Flat, 0, 0}`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Consistent copy of the current position.
    pub fn snapshot(&self) -> Position {
        self.state.lock().position
    }

    /// Replace the position with `new` only if it still equals `expected`.
    ///
    /// Returns false, leaving the store untouched, when another writer got
    /// there first.
    pub fn compare_and_set(&self, expected: &Position, new: Position) -> bool {
        let mut state = self.state.lock();
        if state.position != *expected {
            warn!(
                expected = ?expected,
                actual = ?state.position,
                "Position changed concurrently, commit refused"
            );
            return false;
        }
        let changed = state.replace(new);
        drop(state);

        debug!(position = ?new, "Position committed");
        publish(&new, changed);
        true
    }

    /// Apply `f` atomically and return the resulting position.
    pub fn update<F>(&self, f: F) -> Position
    where
        F: FnOnce(&Position) -> Position,
    {
        let (new, changed) = {
            let mut state = self.state.lock();
            let new = f(&state.position);
            (new, state.replace(new))
        };
        publish(&new, changed);
        new
    }

    /// Record the P&L of the current position as evaluated at `position`.
    ///
    /// Ignored if the position moved on since the evaluation.
    pub fn record_pnl(&self, position: &Position, pnl: Decimal) {
        let mut state = self.state.lock();
        if state.position == *position {
            state.last_pnl = Some(pnl);
            drop(state);
            Metrics::unrealized_pnl(pnl.to_f64().unwrap_or_default());
        }
    }

    /// Position together with its last evaluated P&L.
    pub fn snapshot_with_pnl(&self) -> (Position, Option<Decimal>) {
        let state = self.state.lock();
        (state.position, state.last_pnl)
    }
}
