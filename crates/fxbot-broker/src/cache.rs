//! Last-known-good price cache.
//!
//! Wraps a [`PriceFeed`] and, when the inner feed fails, serves the most
//! recent successful quote as long as it is younger than `max_age`.
//! A zero `max_age` disables the fallback entirely.

use std::time::Duration;

use fxbot_core::{BoxFuture, Quote, TimedQuote};
use parking_lot::Mutex;
use tracing::warn;

use crate::adapter::{DynPriceFeed, PriceFeed};
use crate::error::BrokerResult;

pub struct CachedPriceFeed {
    inner: DynPriceFeed,
    max_age: Duration,
    last_good: Mutex<Option<TimedQuote>>,
}

impl CachedPriceFeed {
    pub fn new(inner: DynPriceFeed, max_age: Duration) -> Self {
        Self {
            inner,
            max_age,
            last_good: Mutex::new(None),
        }
    }

    /// Most recent successful quote, regardless of age.
    pub fn last_good(&self) -> Option<TimedQuote> {
        *self.last_good.lock()
    }

    fn usable_cached(&self) -> Option<TimedQuote> {
        if self.max_age.is_zero() {
            return None;
        }
        let cached = (*self.last_good.lock())?;
        let age_ms = cached.age_ms();
        (age_ms >= 0 && (age_ms as u128) <= self.max_age.as_millis()).then_some(cached)
    }

    async fn fetch(&self) -> BrokerResult<Quote> {
        match self.inner.fetch_quote().await {
            Ok(quote) => {
                *self.last_good.lock() = Some(TimedQuote::now(quote));
                Ok(quote)
            }
            Err(e) => match self.usable_cached() {
                Some(cached) => {
                    warn!(
                        error = %e,
                        age_ms = cached.age_ms(),
                        "Price feed failed, serving cached quote"
                    );
                    Ok(cached.quote)
                }
                None => Err(e),
            },
        }
    }
}

impl PriceFeed for CachedPriceFeed {
    fn fetch_quote(&self) -> BoxFuture<'_, BrokerResult<Quote>> {
        Box::pin(self.fetch())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BrokerError;
    use crate::mock::MockPriceFeed;
    use fxbot_core::Price;
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    fn quote() -> Quote {
        Quote::last(Price::new(dec!(8000000)))
    }

    #[tokio::test]
    async fn test_serves_cached_quote_within_max_age() {
        let inner = Arc::new(MockPriceFeed::new(quote()));
        let feed = CachedPriceFeed::new(inner.clone(), Duration::from_secs(60));

        assert_eq!(feed.fetch_quote().await.unwrap(), quote());

        inner.set_error("ticker down");
        assert_eq!(feed.fetch_quote().await.unwrap(), quote());
    }

    #[tokio::test]
    async fn test_disabled_cache_propagates_error() {
        let inner = Arc::new(MockPriceFeed::new(quote()));
        let feed = CachedPriceFeed::new(inner.clone(), Duration::ZERO);

        feed.fetch_quote().await.unwrap();
        inner.set_error("ticker down");

        let err = feed.fetch_quote().await.unwrap_err();
        assert!(matches!(err, BrokerError::HttpClient(_)));
    }

    #[tokio::test]
    async fn test_stale_cache_propagates_error() {
        let inner = Arc::new(MockPriceFeed::new(quote()));
        let feed = CachedPriceFeed::new(inner.clone(), Duration::from_millis(20));

        feed.fetch_quote().await.unwrap();
        inner.set_error("ticker down");
        tokio::time::sleep(Duration::from_millis(60)).await;

        assert!(feed.fetch_quote().await.is_err());
        assert!(feed.last_good().is_some());
    }

    #[tokio::test]
    async fn test_no_quote_ever_is_error() {
        let inner = Arc::new(MockPriceFeed::failing("never up"));
        let feed = CachedPriceFeed::new(inner, Duration::from_secs(60));
        assert!(feed.fetch_quote().await.is_err());
    }
}
