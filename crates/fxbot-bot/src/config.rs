//! Application configuration.

use std::path::Path;
use std::time::Duration;

use fxbot_broker::{BearerConfig, SecretSource, SignedRestConfig};
use fxbot_core::{Size, TimeInForce};
use fxbot_executor::{EngineConfig, OrderSizing};
use fxbot_position::LossCutConfig;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

/// Which brokerage variant to trade through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BrokerKind {
    /// HMAC-signed REST (ticker last price).
    #[default]
    SignedRest,
    /// Bearer-token REST (bid/ask pricing).
    BearerToken,
}

// ============================================================================
// [server]
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    /// Listen port. Overridden by the `PORT` environment variable.
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    10_000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

// ============================================================================
// [broker]
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    #[serde(default)]
    pub kind: BrokerKind,
    /// API base URL. Defaults to the production endpoint of `kind`.
    #[serde(default)]
    pub base_url: Option<String>,
    /// Signed-REST instrument code.
    #[serde(default = "default_product_code")]
    pub product_code: String,
    /// Bearer-token account identifier.
    #[serde(default)]
    pub account_id: String,
    /// Bearer-token instrument name.
    #[serde(default = "default_instrument")]
    pub instrument: String,
    #[serde(default = "default_minute_to_expire")]
    pub minute_to_expire: u32,
    #[serde(default)]
    pub time_in_force: TimeInForce,
    #[serde(default = "default_position_fill")]
    pub position_fill: String,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Environment variable holding the signed-REST API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    /// Environment variable holding the signed-REST API secret.
    #[serde(default = "default_api_secret_env")]
    pub api_secret_env: String,
    /// Environment variable holding the bearer token.
    #[serde(default = "default_token_env")]
    pub token_env: String,
}

fn default_product_code() -> String {
    "FX_BTC_JPY".to_string()
}

fn default_instrument() -> String {
    "USD_JPY".to_string()
}

fn default_minute_to_expire() -> u32 {
    10_000
}

fn default_position_fill() -> String {
    "DEFAULT".to_string()
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

fn default_api_key_env() -> String {
    "BITFLYER_API_KEY".to_string()
}

fn default_api_secret_env() -> String {
    "BITFLYER_API_SECRET".to_string()
}

fn default_token_env() -> String {
    "OANDA_API_TOKEN".to_string()
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            kind: BrokerKind::default(),
            base_url: None,
            product_code: default_product_code(),
            account_id: String::new(),
            instrument: default_instrument(),
            minute_to_expire: default_minute_to_expire(),
            time_in_force: TimeInForce::default(),
            position_fill: default_position_fill(),
            request_timeout_ms: default_request_timeout_ms(),
            api_key_env: default_api_key_env(),
            api_secret_env: default_api_secret_env(),
            token_env: default_token_env(),
        }
    }
}

impl BrokerConfig {
    fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn signed_rest_config(&self) -> SignedRestConfig {
        let defaults = SignedRestConfig::default();
        SignedRestConfig {
            base_url: self.base_url.clone().unwrap_or(defaults.base_url),
            product_code: self.product_code.clone(),
            minute_to_expire: self.minute_to_expire,
            time_in_force: self.time_in_force,
            request_timeout: self.request_timeout(),
        }
    }

    pub fn bearer_config(&self) -> BearerConfig {
        let defaults = BearerConfig::default();
        BearerConfig {
            base_url: self.base_url.clone().unwrap_or(defaults.base_url),
            account_id: self.account_id.clone(),
            instrument: self.instrument.clone(),
            position_fill: self.position_fill.clone(),
            request_timeout: self.request_timeout(),
        }
    }

    pub fn api_key_source(&self) -> SecretSource {
        SecretSource::env(&self.api_key_env)
    }

    pub fn api_secret_source(&self) -> SecretSource {
        SecretSource::env(&self.api_secret_env)
    }

    pub fn token_source(&self) -> SecretSource {
        SecretSource::env(&self.token_env)
    }
}

// ============================================================================
// [trading]
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradingConfig {
    /// Quote-currency budget per new position.
    #[serde(default = "default_order_notional")]
    pub order_notional: Decimal,
    /// Fixed units per new position; takes precedence over `order_notional`.
    #[serde(default)]
    pub order_units: Option<Decimal>,
    #[serde(default = "default_size_decimals")]
    pub size_decimals: u32,
    /// Liquidate when unrealized P&L falls strictly below this value.
    #[serde(default = "default_loss_cut_threshold")]
    pub loss_cut_threshold: Decimal,
    #[serde(default = "default_check_interval_secs")]
    pub check_interval_secs: u64,
    /// Bound on each price fetch and order submission.
    #[serde(default = "default_call_timeout_ms")]
    pub call_timeout_ms: u64,
    /// Serve the last good quote for this long after a feed failure.
    /// 0 disables the cache.
    #[serde(default)]
    pub price_cache_max_age_ms: u64,
}

fn default_order_notional() -> Decimal {
    Decimal::from(1000)
}

fn default_size_decimals() -> u32 {
    fxbot_executor::DEFAULT_SIZE_DECIMALS
}

fn default_loss_cut_threshold() -> Decimal {
    Decimal::from(-200)
}

fn default_check_interval_secs() -> u64 {
    30
}

fn default_call_timeout_ms() -> u64 {
    15_000
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            order_notional: default_order_notional(),
            order_units: None,
            size_decimals: default_size_decimals(),
            loss_cut_threshold: default_loss_cut_threshold(),
            check_interval_secs: default_check_interval_secs(),
            call_timeout_ms: default_call_timeout_ms(),
            price_cache_max_age_ms: 0,
        }
    }
}

impl TradingConfig {
    pub fn sizing(&self) -> OrderSizing {
        match self.order_units {
            Some(units) => OrderSizing::fixed_units(Size::new(units)),
            None => OrderSizing::Notional {
                budget: self.order_notional,
                size_decimals: self.size_decimals,
            },
        }
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            sizing: self.sizing(),
            call_timeout: self.call_timeout(),
        }
    }

    pub fn loss_cut_config(&self) -> LossCutConfig {
        LossCutConfig {
            threshold: self.loss_cut_threshold,
            check_interval: Duration::from_secs(self.check_interval_secs),
            call_timeout: self.call_timeout(),
        }
    }

    /// `None` when the cache is disabled.
    pub fn price_cache_max_age(&self) -> Option<Duration> {
        (self.price_cache_max_age_ms > 0).then(|| Duration::from_millis(self.price_cache_max_age_ms))
    }
}

// ============================================================================
// [telemetry]
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Default log filter; `RUST_LOG` takes precedence.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_level() -> String {
    "info,fxbot=debug".to_string()
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

// ============================================================================
// AppConfig
// ============================================================================

/// Main application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub broker: BrokerConfig,
    #[serde(default)]
    pub trading: TradingConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &str) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("Failed to read config: {e}")))?;

        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> AppResult<Self> {
        toml::from_str(content).map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))
    }

    /// Load from `path` if it exists, defaults otherwise, then apply the
    /// `PORT` override and validate.
    pub fn load(path: &str) -> AppResult<Self> {
        let mut config = if Path::new(path).exists() {
            Self::from_file(path)?
        } else {
            Self::default()
        };
        config.apply_port_override(std::env::var("PORT").ok().as_deref())?;
        config.validate()?;
        Ok(config)
    }

    pub fn apply_port_override(&mut self, port: Option<&str>) -> AppResult<()> {
        if let Some(port) = port {
            self.server.port = port
                .trim()
                .parse()
                .map_err(|e| AppError::Config(format!("Invalid PORT {port:?}: {e}")))?;
        }
        Ok(())
    }

    pub fn validate(&self) -> AppResult<()> {
        let trading = &self.trading;
        match trading.order_units {
            Some(units) if units <= Decimal::ZERO => {
                return Err(AppError::Config(format!(
                    "trading.order_units must be positive, got {units}"
                )));
            }
            None if trading.order_notional <= Decimal::ZERO => {
                return Err(AppError::Config(format!(
                    "trading.order_notional must be positive, got {}",
                    trading.order_notional
                )));
            }
            _ => {}
        }
        if trading.check_interval_secs == 0 {
            return Err(AppError::Config(
                "trading.check_interval_secs must be at least 1".to_string(),
            ));
        }
        if trading.call_timeout_ms == 0 {
            return Err(AppError::Config(
                "trading.call_timeout_ms must be positive".to_string(),
            ));
        }
        if self.broker.kind == BrokerKind::BearerToken && self.broker.account_id.trim().is_empty() {
            return Err(AppError::Config(
                "broker.account_id is required for bearer_token".to_string(),
            ));
        }
        if self.broker.kind == BrokerKind::BearerToken {
            match trading.order_units {
                Some(units) if units.fract().is_zero() => {}
                Some(units) => {
                    return Err(AppError::Config(format!(
                        "trading.order_units must be a whole number for bearer_token, got {units}"
                    )));
                }
                None => {
                    return Err(AppError::Config(
                        "trading.order_units is required for bearer_token".to_string(),
                    ));
                }
            }
        }
        Ok(())
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
