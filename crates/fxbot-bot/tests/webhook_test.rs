//! Webhook router integration tests.
//!
//! Drives the full router (engine, store, mock broker) with in-process
//! requests.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use fxbot_bot::{AppConfig, Application};
use fxbot_broker::{MockBroker, MockPriceFeed, MockResponse};
use fxbot_core::{OrderSide, Price, Quote, Size};
use rust_decimal_macros::dec;
use serde_json::Value;
use tower::ServiceExt;

struct TestApp {
    app: Application,
    broker: Arc<MockBroker>,
}

impl TestApp {
    fn new() -> Self {
        let feed = Arc::new(MockPriceFeed::new(Quote::last(Price::new(dec!(8000000)))));
        let broker = Arc::new(MockBroker::new());
        let app = Application::with_adapters(AppConfig::default(), feed, broker.clone());
        Self { app, broker }
    }

    fn router(&self) -> Router {
        self.app.router()
    }
}

async fn send(router: Router, request: Request<Body>) -> (StatusCode, String) {
    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}

fn post_json(body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/webhook")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn post_form(body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/webhook")
        .header("content-type", "application/x-www-form-urlencoded")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_buy_opens_long() {
    let t = TestApp::new();

    let (status, body) = send(t.router(), post_json(r#"{"action":"buy"}"#)).await;

    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["status"], "ok");
    assert_eq!(json["outcome"], "opened");
    assert_eq!(json["position"]["side"], "long");
    assert_eq!(json["position"]["quantity"], "0.000125");

    let orders = t.broker.orders();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].side, OrderSide::Buy);
    assert_eq!(orders[0].size, Size::new(dec!(0.000125)));
}

#[tokio::test]
async fn test_form_signal_reverses() {
    let t = TestApp::new();
    send(t.router(), post_json(r#"{"signal":"BUY"}"#)).await;

    let (status, body) = send(t.router(), post_form("action=sell")).await;

    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["outcome"], "reversed");
    assert_eq!(json["position"]["side"], "short");
    assert_eq!(t.broker.order_count(), 3);
}

#[tokio::test]
async fn test_same_side_signal_is_unchanged() {
    let t = TestApp::new();
    send(t.router(), post_json(r#"{"action":"buy"}"#)).await;

    let (status, body) = send(t.router(), post_json(r#"{"action":" Buy "}"#)).await;

    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["outcome"], "unchanged");
    assert_eq!(t.broker.order_count(), 1);
}

#[tokio::test]
async fn test_invalid_action_rejected() {
    let t = TestApp::new();

    for body in [r#"{"action":"hold"}"#, r#"{"foo":"buy"}"#, "not json"] {
        let (status, text) = send(t.router(), post_json(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "body: {body}");
        let json: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(json["status"], "invalid action");
    }

    assert_eq!(t.broker.order_count(), 0);
    assert!(t.app.store().snapshot().is_flat());
}

#[tokio::test]
async fn test_broker_rejection_is_500_and_server_keeps_serving() {
    let t = TestApp::new();
    t.broker.push_response(MockResponse::Reject {
        status: 400,
        message: "insufficient margin".to_string(),
    });

    let (status, body) = send(t.router(), post_json(r#"{"action":"buy"}"#)).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let json: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["status"], "error");
    assert!(json["message"]
        .as_str()
        .unwrap()
        .contains("insufficient margin"));
    assert!(t.app.store().snapshot().is_flat());

    let (status, _) = send(t.router(), post_json(r#"{"action":"buy"}"#)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_health() {
    let t = TestApp::new();
    let (status, body) = send(t.router(), get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "ok");
}

#[tokio::test]
async fn test_position_endpoint() {
    let t = TestApp::new();

    let (_, body) = send(t.router(), get("/position")).await;
    let json: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["position"]["side"], "flat");
    assert!(json["unrealized_pnl"].is_null());

    send(t.router(), post_json(r#"{"action":"sell"}"#)).await;

    let (status, body) = send(t.router(), get("/position")).await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["position"]["side"], "short");
    assert_eq!(json["position"]["entry_price"], "8000000");
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let t = TestApp::new();
    send(t.router(), post_json(r#"{"action":"buy"}"#)).await;

    let (status, body) = send(t.router(), get("/metrics")).await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("fxbot_signals_total"));
    assert!(body.contains("fxbot_orders_total"));
}
