//! Main application orchestration.
//!
//! Wires the configured brokerage variant into the trade engine, the
//! loss-cut monitor and the webhook server, and runs them until Ctrl-C.

use std::sync::Arc;

use axum::Router;
use fxbot_broker::{
    BearerClient, BearerToken, CachedPriceFeed, DynBroker, DynPriceFeed, HmacSigner,
    SignedRestClient,
};
use fxbot_executor::TradeEngine;
use fxbot_position::{LossCutMonitor, PositionStore};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::config::{AppConfig, BrokerConfig, BrokerKind};
use crate::error::{AppError, AppResult};
use crate::webhook::{create_router, AppState};

/// Build the price feed and order adapter for the configured variant.
///
/// Secrets are read from the environment here, once.
pub fn build_adapters(config: &BrokerConfig) -> AppResult<(DynPriceFeed, DynBroker)> {
    match config.kind {
        BrokerKind::SignedRest => {
            let signer = HmacSigner::load(&config.api_key_source(), &config.api_secret_source())?;
            let client = Arc::new(SignedRestClient::new(config.signed_rest_config(), signer)?);
            let feed: DynPriceFeed = client.clone();
            let broker: DynBroker = client;
            Ok((feed, broker))
        }
        BrokerKind::BearerToken => {
            let token = BearerToken::load(&config.token_source())?;
            let client = Arc::new(BearerClient::new(config.bearer_config(), token)?);
            let feed: DynPriceFeed = client.clone();
            let broker: DynBroker = client;
            Ok((feed, broker))
        }
    }
}

/// Main application.
pub struct Application {
    config: AppConfig,
    store: PositionStore,
    engine: Arc<TradeEngine>,
    monitor: LossCutMonitor,
}

impl Application {
    /// Create the application with adapters for `config.broker`.
    pub fn new(config: AppConfig) -> AppResult<Self> {
        config.validate()?;
        let (feed, broker) = build_adapters(&config.broker)?;
        Ok(Self::with_adapters(config, feed, broker))
    }

    /// Create the application around the given adapters.
    pub fn with_adapters(config: AppConfig, feed: DynPriceFeed, broker: DynBroker) -> Self {
        let feed: DynPriceFeed = match config.trading.price_cache_max_age() {
            Some(max_age) => Arc::new(CachedPriceFeed::new(feed, max_age)),
            None => feed,
        };

        let store = PositionStore::new();
        let engine = Arc::new(TradeEngine::new(
            config.trading.engine_config(),
            feed.clone(),
            broker,
            store.clone(),
        ));
        let monitor = LossCutMonitor::new(
            config.trading.loss_cut_config(),
            store.clone(),
            feed,
            engine.clone(),
        );

        Self {
            config,
            store,
            engine,
            monitor,
        }
    }

    pub fn store(&self) -> &PositionStore {
        &self.store
    }

    /// Router serving the webhook and status endpoints.
    pub fn router(&self) -> Router {
        create_router(AppState::new(self.engine.clone(), self.store.clone()))
    }

    /// Serve until Ctrl-C, then stop the monitor and wait for it.
    pub async fn run(self) -> AppResult<()> {
        let router = self.router();
        let addr = self.config.listen_addr();

        let listener = tokio::net::TcpListener::bind(&addr).await?;
        info!(addr = %addr, broker = ?self.config.broker.kind, "Webhook server listening");

        let shutdown = CancellationToken::new();
        let monitor_handle = tokio::spawn(self.monitor.run(shutdown.clone()));

        let served = axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await;

        shutdown.cancel();
        monitor_handle
            .await
            .map_err(|e| AppError::Server(format!("monitor task failed: {e}")))?;

        served.map_err(|e| AppError::Server(e.to_string()))?;
        info!(position = ?self.store.snapshot(), "Shutdown complete");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for Ctrl-C, serving until killed");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
