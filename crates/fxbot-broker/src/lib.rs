//! Brokerage adapters for fxbot.
//!
//! Two interchangeable variants implement [`PriceFeed`] and
//! [`BrokerAdapter`]:
//! - [`SignedRestClient`]: HMAC-signed REST (ticker last price, child orders)
//! - [`BearerClient`]: bearer-token REST (bid/ask pricing, signed units)
//!
//! [`CachedPriceFeed`] adds an optional last-known-good fallback, and the
//! `mock` module provides in-memory adapters for tests.

pub mod adapter;
pub mod bearer;
pub mod cache;
pub mod error;
pub mod mock;
pub mod signed_rest;
pub mod signer;

pub use adapter::{BrokerAdapter, DynBroker, DynPriceFeed, OrderRequest, OrderResult, PriceFeed};
pub use bearer::{BearerClient, BearerConfig};
pub use cache::CachedPriceFeed;
pub use error::{BrokerError, BrokerResult};
pub use mock::{MockBroker, MockPriceFeed, MockResponse};
pub use signed_rest::{SignedRestClient, SignedRestConfig, DEFAULT_REQUEST_TIMEOUT};
pub use signer::{BearerToken, HmacSigner, SecretSource, SignedHeaders};
