//! Webhook HTTP server using axum.
//!
//! Routes:
//! - `POST /webhook`: buy/sell signal in field `action` (or `signal`),
//!   JSON or form-encoded
//! - `GET /health`: liveness
//! - `GET /position`: current position and last evaluated P&L
//! - `GET /metrics`: Prometheus text exposition

use std::collections::HashMap;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use fxbot_core::Signal;
use fxbot_executor::TradeEngine;
use fxbot_position::PositionStore;
use fxbot_telemetry::Metrics;
use serde_json::{json, Value};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

/// Field names accepted for the signal, in lookup order.
const SIGNAL_FIELDS: [&str; 2] = ["action", "signal"];

/// Shared state for axum handlers.
#[derive(Clone)]
pub struct AppState {
    engine: Arc<TradeEngine>,
    store: PositionStore,
}

impl AppState {
    pub fn new(engine: Arc<TradeEngine>, store: PositionStore) -> Self {
        Self { engine, store }
    }
}

/// Create the axum router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/webhook", post(handle_webhook))
        .route("/health", get(health))
        .route("/position", get(get_position))
        .route("/metrics", get(get_metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Raw signal text from a JSON object, or failing that a form body.
fn extract_signal(body: &[u8]) -> Option<String> {
    if let Ok(Value::Object(map)) = serde_json::from_slice::<Value>(body) {
        return SIGNAL_FIELDS
            .iter()
            .find_map(|field| map.get(*field).and_then(Value::as_str))
            .map(str::to_string);
    }

    let form: HashMap<String, String> = serde_urlencoded::from_bytes(body).ok()?;
    SIGNAL_FIELDS
        .iter()
        .find_map(|field| form.get(*field).cloned())
}

async fn handle_webhook(State(state): State<AppState>, body: Bytes) -> Response {
    let raw = extract_signal(&body);
    let signal = match raw.as_deref().map(str::parse::<Signal>) {
        Some(Ok(signal)) => signal,
        Some(Err(_)) | None => {
            warn!(raw = ?raw, "Rejected webhook with invalid action");
            Metrics::invalid_signal();
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "status": "invalid action" })),
            )
                .into_response();
        }
    };

    info!(signal = %signal, "Signal received");
    Metrics::signal_received(signal.as_str());

    match state.engine.execute(signal).await {
        Ok(outcome) => (
            StatusCode::OK,
            Json(json!({
                "status": "ok",
                "outcome": outcome.label(),
                "position": outcome.position(),
            })),
        )
            .into_response(),
        Err(e) => {
            error!(signal = %signal, error = %e, "Signal execution failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "status": "error", "message": e.to_string() })),
            )
                .into_response()
        }
    }
}

async fn health() -> &'static str {
    "ok"
}

async fn get_position(State(state): State<AppState>) -> Json<Value> {
    let (position, pnl) = state.store.snapshot_with_pnl();
    Json(json!({ "position": position, "unrealized_pnl": pnl }))
}

async fn get_metrics() -> Response {
    match Metrics::render() {
        Ok(text) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Failed to render metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_from_json_action() {
        assert_eq!(
            extract_signal(br#"{"action":"buy"}"#),
            Some("buy".to_string())
        );
    }

    #[test]
    fn test_extract_prefers_action_over_signal() {
        assert_eq!(
            extract_signal(br#"{"signal":"sell","action":"buy"}"#),
            Some("buy".to_string())
        );
        assert_eq!(
            extract_signal(br#"{"signal":"sell"}"#),
            Some("sell".to_string())
        );
    }

    #[test]
    fn test_extract_from_form() {
        assert_eq!(extract_signal(b"action=SELL"), Some("SELL".to_string()));
        assert_eq!(extract_signal(b"signal=buy&x=1"), Some("buy".to_string()));
    }

    #[test]
    fn test_extract_missing_or_non_string() {
        assert_eq!(extract_signal(br#"{"action":1}"#), None);
        assert_eq!(extract_signal(br#"{"other":"buy"}"#), None);
        assert_eq!(extract_signal(b""), None);
    }
}
