//! In-memory adapters for tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use fxbot_core::{BoxFuture, Quote};
use parking_lot::Mutex;

use crate::adapter::{BrokerAdapter, OrderRequest, OrderResult, PriceFeed};
use crate::error::{BrokerError, BrokerResult};

// =============================================================================
// MockPriceFeed
// =============================================================================

/// Price feed returning a settable quote or error.
#[derive(Debug)]
pub struct MockPriceFeed {
    next: Mutex<Result<Quote, String>>,
    calls: AtomicUsize,
}

impl MockPriceFeed {
    pub fn new(quote: Quote) -> Self {
        Self {
            next: Mutex::new(Ok(quote)),
            calls: AtomicUsize::new(0),
        }
    }

    /// Feed that fails until a quote is set.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            next: Mutex::new(Err(message.into())),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn set_quote(&self, quote: Quote) {
        *self.next.lock() = Ok(quote);
    }

    pub fn set_error(&self, message: impl Into<String>) {
        *self.next.lock() = Err(message.into());
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl PriceFeed for MockPriceFeed {
    fn fetch_quote(&self) -> BoxFuture<'_, BrokerResult<Quote>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.next.lock().clone().map_err(BrokerError::HttpClient)
        })
    }
}

// =============================================================================
// MockBroker
// =============================================================================

/// Scripted response for one [`MockBroker`] submission.
#[derive(Debug, Clone)]
pub enum MockResponse {
    Accept,
    Reject { status: u16, message: String },
    /// Transport failure.
    Error(String),
}

/// Broker that records orders and answers from a script.
///
/// Submissions beyond the script are accepted.
#[derive(Debug, Default)]
pub struct MockBroker {
    orders: Mutex<Vec<OrderRequest>>,
    script: Mutex<VecDeque<MockResponse>>,
    delay: Mutex<Option<Duration>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the response for the next unanswered submission.
    pub fn push_response(&self, response: MockResponse) {
        self.script.lock().push_back(response);
    }

    /// Hold every submission for `delay` before answering.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }

    /// Recorded submissions, in arrival order.
    pub fn orders(&self) -> Vec<OrderRequest> {
        self.orders.lock().clone()
    }

    pub fn order_count(&self) -> usize {
        self.orders.lock().len()
    }

    pub fn clear_orders(&self) {
        self.orders.lock().clear();
    }

    /// Highest number of submissions observed in flight at once.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn answer(&self, order: OrderRequest) -> BrokerResult<OrderResult> {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        let seq = {
            let mut orders = self.orders.lock();
            orders.push(order);
            orders.len()
        };
        let response = self.script.lock().pop_front().unwrap_or(MockResponse::Accept);
        let delay = *self.delay.lock();

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match response {
            MockResponse::Accept => Ok(OrderResult::Accepted {
                order_id: format!("mock-{seq}"),
            }),
            MockResponse::Reject { status, message } => {
                Ok(OrderResult::Rejected { status, message })
            }
            MockResponse::Error(message) => Err(BrokerError::HttpClient(message)),
        }
    }
}

impl BrokerAdapter for MockBroker {
    fn submit_market_order(&self, order: OrderRequest) -> BoxFuture<'_, BrokerResult<OrderResult>> {
        Box::pin(self.answer(order))
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
