//! Signed-REST brokerage variant.
//!
//! - Price: `GET /v1/ticker?product_code=...` returning a last-traded
//!   price field `ltp`.
//! - Orders: `POST /v1/me/sendchildorder` with a MARKET child order,
//!   authenticated by `ACCESS-KEY` / `ACCESS-TIMESTAMP` / `ACCESS-SIGN`
//!   headers (HMAC-SHA256, see [`HmacSigner`]).

use std::time::Duration;

use fxbot_core::{BoxFuture, Price, Quote, TimeInForce};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::adapter::{BrokerAdapter, OrderRequest, OrderResult, PriceFeed};
use crate::error::{BrokerError, BrokerResult};
use crate::signer::HmacSigner;

const TICKER_PATH: &str = "/v1/ticker";
const SEND_ORDER_PATH: &str = "/v1/me/sendchildorder";

/// Default timeout for API requests.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Settings for the signed-REST variant.
#[derive(Debug, Clone)]
pub struct SignedRestConfig {
    /// API base URL (no trailing slash).
    pub base_url: String,
    /// Instrument code, e.g. `FX_BTC_JPY`.
    pub product_code: String,
    /// Order expiry window in minutes.
    pub minute_to_expire: u32,
    pub time_in_force: TimeInForce,
    pub request_timeout: Duration,
}

impl Default for SignedRestConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.bitflyer.com".to_string(),
            product_code: "FX_BTC_JPY".to_string(),
            minute_to_expire: 10_000,
            time_in_force: TimeInForce::GoodTilCancelled,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TickerResponse {
    ltp: Decimal,
}

/// Wire body of a child order. Field order is part of the signed payload.
#[derive(Debug, Serialize)]
struct ChildOrderBody<'a> {
    product_code: &'a str,
    child_order_type: &'static str,
    side: &'static str,
    #[serde(with = "rust_decimal::serde::float")]
    size: Decimal,
    minute_to_expire: u32,
    time_in_force: TimeInForce,
}

#[derive(Debug, Deserialize)]
struct ChildOrderResponse {
    child_order_acceptance_id: Option<String>,
}

/// Signed-REST client implementing both [`PriceFeed`] and [`BrokerAdapter`].
pub struct SignedRestClient {
    client: Client,
    config: SignedRestConfig,
    signer: HmacSigner,
}

impl SignedRestClient {
    pub fn new(config: SignedRestConfig, signer: HmacSigner) -> BrokerResult<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| BrokerError::HttpClient(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            config,
            signer,
        })
    }

    async fn fetch_ticker(&self) -> BrokerResult<Quote> {
        let url = format!("{}{}", self.config.base_url, TICKER_PATH);
        let response = self
            .client
            .get(&url)
            .query(&[("product_code", self.config.product_code.as_str())])
            .send()
            .await
            .map_err(|e| BrokerError::HttpClient(format!("ticker request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BrokerError::HttpStatus {
                status: status.as_u16(),
                body,
            });
        }

        let ticker: TickerResponse = response
            .json()
            .await
            .map_err(|e| BrokerError::Parse(format!("ticker: {e}")))?;

        let quote = Quote::last(Price::new(ticker.ltp));
        if !quote.is_valid() {
            return Err(BrokerError::InvalidQuote(format!("ltp={}", ticker.ltp)));
        }
        debug!(ltp = %ticker.ltp, product = %self.config.product_code, "Ticker fetched");
        Ok(quote)
    }

    fn order_body(&self, order: &OrderRequest) -> BrokerResult<String> {
        let body = ChildOrderBody {
            product_code: &self.config.product_code,
            child_order_type: "MARKET",
            side: order.side.as_wire(),
            size: order.size.inner(),
            minute_to_expire: self.config.minute_to_expire,
            time_in_force: self.config.time_in_force,
        };
        Ok(serde_json::to_string(&body)?)
    }

    async fn send_child_order(&self, order: OrderRequest) -> BrokerResult<OrderResult> {
        let body = self.order_body(&order)?;
        let headers = self.signer.sign("POST", SEND_ORDER_PATH, &body)?;
        let url = format!("{}{}", self.config.base_url, SEND_ORDER_PATH);

        info!(
            cloid = %order.client_order_id,
            side = %order.side,
            size = %order.size,
            product = %self.config.product_code,
            "Submitting market order"
        );

        let response = self
            .client
            .post(&url)
            .header("ACCESS-KEY", headers.access_key)
            .header("ACCESS-TIMESTAMP", headers.timestamp)
            .header("ACCESS-SIGN", headers.signature)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| BrokerError::HttpClient(format!("order request failed: {e}")))?;

        let status = response.status();
        let text = response.text().await.unwrap_or_default();

        if !status.is_success() {
            warn!(cloid = %order.client_order_id, status = status.as_u16(), body = %text, "Order rejected");
            return Ok(OrderResult::Rejected {
                status: status.as_u16(),
                message: text,
            });
        }

        let parsed: ChildOrderResponse = serde_json::from_str(&text)
            .map_err(|e| BrokerError::Parse(format!("order response: {e}")))?;

        match parsed.child_order_acceptance_id {
            Some(order_id) => {
                info!(cloid = %order.client_order_id, order_id = %order_id, "Order accepted");
                Ok(OrderResult::Accepted { order_id })
            }
            None => {
                warn!(cloid = %order.client_order_id, body = %text, "Order response without acceptance id");
                Ok(OrderResult::Rejected {
                    status: status.as_u16(),
                    message: text,
                })
            }
        }
    }
}

impl PriceFeed for SignedRestClient {
    fn fetch_quote(&self) -> BoxFuture<'_, BrokerResult<Quote>> {
        Box::pin(self.fetch_ticker())
    }
}

impl BrokerAdapter for SignedRestClient {
    fn submit_market_order(&self, order: OrderRequest) -> BoxFuture<'_, BrokerResult<OrderResult>> {
        Box::pin(self.send_child_order(order))
    }

    fn name(&self) -> &'static str {
        "signed_rest"
    }
}
