//! Bearer-token brokerage variant.
//!
//! - Price: `GET /v3/accounts/{account}/pricing?instruments=...` returning
//!   bid/ask price arrays; the top of each array is used.
//! - Orders: `POST /v3/accounts/{account}/orders` with a MARKET order whose
//!   `units` sign encodes direction (positive = buy, negative = sell).
//! - Auth: `Authorization: Bearer <token>`.

use std::time::Duration;

use fxbot_core::{BoxFuture, Price, Quote};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::adapter::{BrokerAdapter, OrderRequest, OrderResult, PriceFeed};
use crate::error::{BrokerError, BrokerResult};
use crate::signed_rest::DEFAULT_REQUEST_TIMEOUT;
use crate::signer::BearerToken;

/// Settings for the bearer-token variant.
#[derive(Debug, Clone)]
pub struct BearerConfig {
    /// API base URL (no trailing slash).
    pub base_url: String,
    pub account_id: String,
    /// Instrument name, e.g. `USD_JPY`.
    pub instrument: String,
    /// Position-fill policy sent with every order.
    pub position_fill: String,
    pub request_timeout: Duration,
}

impl Default for BearerConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api-fxtrade.oanda.com".to_string(),
            account_id: String::new(),
            instrument: "USD_JPY".to_string(),
            position_fill: "DEFAULT".to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

#[derive(Debug, Deserialize)]
struct PriceBucket {
    price: Decimal,
}

#[derive(Debug, Deserialize)]
struct InstrumentPrice {
    instrument: String,
    #[serde(default)]
    bids: Vec<PriceBucket>,
    #[serde(default)]
    asks: Vec<PriceBucket>,
}

#[derive(Debug, Deserialize)]
struct PricingResponse {
    prices: Vec<InstrumentPrice>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MarketOrder<'a> {
    instrument: &'a str,
    units: String,
    #[serde(rename = "type")]
    order_type: &'static str,
    position_fill: &'a str,
    client_extensions: ClientExtensions<'a>,
}

#[derive(Debug, Serialize)]
struct ClientExtensions<'a> {
    id: &'a str,
}

#[derive(Debug, Serialize)]
struct OrderEnvelope<'a> {
    order: MarketOrder<'a>,
}

#[derive(Debug, Deserialize)]
struct Transaction {
    id: Option<String>,
    reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderCreateResponse {
    order_create_transaction: Option<Transaction>,
    order_fill_transaction: Option<Transaction>,
    order_cancel_transaction: Option<Transaction>,
}

/// Bearer-token client implementing both [`PriceFeed`] and [`BrokerAdapter`].
pub struct BearerClient {
    client: Client,
    config: BearerConfig,
    token: BearerToken,
}

impl BearerClient {
    pub fn new(config: BearerConfig, token: BearerToken) -> BrokerResult<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| BrokerError::HttpClient(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            config,
            token,
        })
    }

    fn account_url(&self, suffix: &str) -> String {
        format!(
            "{}/v3/accounts/{}/{}",
            self.config.base_url, self.config.account_id, suffix
        )
    }

    async fn fetch_pricing(&self) -> BrokerResult<Quote> {
        let response = self
            .client
            .get(self.account_url("pricing"))
            .query(&[("instruments", self.config.instrument.as_str())])
            .header(
                reqwest::header::AUTHORIZATION,
                self.token.header_value().as_str(),
            )
            .send()
            .await
            .map_err(|e| BrokerError::HttpClient(format!("pricing request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BrokerError::HttpStatus {
                status: status.as_u16(),
                body,
            });
        }

        let pricing: PricingResponse = response
            .json()
            .await
            .map_err(|e| BrokerError::Parse(format!("pricing: {e}")))?;

        let entry = pricing
            .prices
            .into_iter()
            .find(|p| p.instrument == self.config.instrument)
            .ok_or_else(|| {
                BrokerError::InvalidQuote(format!("no price for {}", self.config.instrument))
            })?;

        let (bid, ask) = match (entry.bids.first(), entry.asks.first()) {
            (Some(bid), Some(ask)) => (bid.price, ask.price),
            _ => {
                return Err(BrokerError::InvalidQuote(format!(
                    "empty bid/ask for {}",
                    self.config.instrument
                )))
            }
        };

        let quote = Quote::bid_ask(Price::new(bid), Price::new(ask));
        if !quote.is_valid() {
            return Err(BrokerError::InvalidQuote(format!("bid={bid} ask={ask}")));
        }
        debug!(%bid, %ask, instrument = %self.config.instrument, "Pricing fetched");
        Ok(quote)
    }

    /// Signed integer unit count: positive buys, negative sells.
    fn signed_units(order: &OrderRequest) -> BrokerResult<String> {
        let size = order.size.inner();
        if !size.fract().is_zero() {
            return Err(BrokerError::InvalidOrder(format!(
                "units must be a whole number, got {size}"
            )));
        }
        let units = size.trunc() * Decimal::from(order.side.sign());
        Ok(units.normalize().to_string())
    }

    fn order_body(&self, order: &OrderRequest, units: String) -> BrokerResult<String> {
        let envelope = OrderEnvelope {
            order: MarketOrder {
                instrument: &self.config.instrument,
                units,
                order_type: "MARKET",
                position_fill: &self.config.position_fill,
                client_extensions: ClientExtensions {
                    id: order.client_order_id.as_str(),
                },
            },
        };
        Ok(serde_json::to_string(&envelope)?)
    }

    async fn create_order(&self, order: OrderRequest) -> BrokerResult<OrderResult> {
        let units = Self::signed_units(&order)?;

        info!(
            cloid = %order.client_order_id,
            side = %order.side,
            units = %units,
            instrument = %self.config.instrument,
            "Submitting market order"
        );
        let body = self.order_body(&order, units)?;

        let response = self
            .client
            .post(self.account_url("orders"))
            .header(
                reqwest::header::AUTHORIZATION,
                self.token.header_value().as_str(),
            )
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

        let parsed: OrderCreateResponse = serde_json::from_str(&text)
            .map_err(|e| BrokerError::Parse(format!("order response: {e}")))?;

        // A created-then-cancelled market order did not fill.
        if let Some(cancel) = parsed.order_cancel_transaction {
            let reason = cancel.reason.unwrap_or_else(|| "cancelled".to_string());
            warn!(cloid = %order.client_order_id, reason = %reason, "Order cancelled by broker");
            return Ok(OrderResult::Rejected {
                status: status.as_u16(),
                message: reason,
            });
        }

        let order_id = parsed
            .order_fill_transaction
            .and_then(|t| t.id)
            .or_else(|| parsed.order_create_transaction.and_then(|t| t.id));

        match order_id {
            Some(order_id) => {
                info!(cloid = %order.client_order_id, order_id = %order_id, "Order accepted");
                Ok(OrderResult::Accepted { order_id })
            }
            None => Ok(OrderResult::Rejected {
                status: status.as_u16(),
                message: text,
            }),
        }
    }
}

impl PriceFeed for BearerClient {
    fn fetch_quote(&self) -> BoxFuture<'_, BrokerResult<Quote>> {
        Box::pin(self.fetch_pricing())
    }
}

impl BrokerAdapter for BearerClient {
    fn submit_market_order(&self, order: OrderRequest) -> BoxFuture<'_, BrokerResult<OrderResult>> {
        Box::pin(self.create_order(order))
    }

    fn name(&self) -> &'static str {
        "bearer_token"
    }
}
