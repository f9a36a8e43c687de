//! HTTP API Integration Tests
//!
//! Drives the router with `tower::ServiceExt::oneshot` over a shared
//! store and a manually advanced clock.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use report_engine::{
    AppState, Clock, ManualClock, MetadataStore, MockMarketData, ModelRegistry, NewsSignal,
    ReportAssembler, create_router,
};
use rust_decimal_macros::dec;
use serde_json::Value;
use tower::ServiceExt;

struct Harness {
    app: Router,
    clock: Arc<ManualClock>,
}

fn harness() -> Harness {
    let provider = MockMarketData::new();
    provider.set_price("AAPL", dec!(222.22));
    provider.push_news("AAPL", NewsSignal::new("wire", "Apple beats estimates", 0.7));

    let assembler = ReportAssembler::new(
        Arc::new(MetadataStore::new()),
        Arc::new(ModelRegistry::with_defaults()),
        Arc::new(provider),
    );
    let clock = Arc::new(ManualClock::new(1_000));
    let shared: Arc<dyn Clock> = clock.clone();
    let state = AppState::new(Arc::new(assembler), shared);

    Harness {
        app: create_router(Arc::new(state)),
        clock,
    }
}

async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(body.map_or_else(Body::empty, |b| Body::from(b.to_string())))
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

#[tokio::test]
async fn live_report_over_http() {
    let h = harness();

    let (status, body) = call(&h.app, "GET", "/v1/reports/aapl", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["report"]["symbol"], "AAPL");
    assert_eq!(body["report"]["current_price"], "222.22");
    assert_eq!(body["report"]["mode"], "live");
    assert_eq!(body["warnings"], serde_json::json!([]));

    let (status, slot) = call(&h.app, "GET", "/v1/cache/AAPL/sentiment", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(slot["history"].as_array().unwrap().len(), 1);
    assert_eq!(slot["latest"]["value"]["signal_count"], 1);
}

#[tokio::test]
async fn slot_goes_stale_after_its_override() {
    let h = harness();

    let (status, body) = call(
        &h.app,
        "PUT",
        "/v1/cache/MSFT/target-consensus/interval",
        Some(serde_json::json!({ "ms": 2_000 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["refresh_interval_ms"], 2_000);

    call(&h.app, "GET", "/v1/reports/MSFT?mode=cached&price=300", None).await;

    let (_, slot) = call(&h.app, "GET", "/v1/cache/MSFT/target-consensus", None).await;
    assert_eq!(slot["stale"], false);
    assert_eq!(slot["refresh_interval_ms"], 2_000);

    h.clock.advance(2_000);
    let (_, slot) = call(&h.app, "GET", "/v1/cache/MSFT/target-consensus", None).await;
    assert_eq!(slot["stale"], true);

    call(&h.app, "GET", "/v1/reports/MSFT?mode=cached&price=300", None).await;
    let (_, slot) = call(&h.app, "GET", "/v1/cache/MSFT/target-consensus", None).await;
    assert_eq!(slot["history"].as_array().unwrap().len(), 2);

    // Sentiment still runs on the 60s global interval
    let (_, sentiment) = call(&h.app, "GET", "/v1/cache/MSFT/sentiment", None).await;
    assert_eq!(sentiment["history"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn health_lists_tracked_symbols() {
    let h = harness();
    call(&h.app, "GET", "/v1/reports/NVDA?mode=cached&price=120", None).await;

    let (status, body) = call(&h.app, "GET", "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["tracked_symbols"], serde_json::json!(["NVDA"]));
    assert_eq!(body["provider"], "mock");
}

#[tokio::test]
async fn cached_mode_without_price_is_rejected() {
    let h = harness();

    let (status, body) = call(&h.app, "GET", "/v1/reports/AAPL?mode=cached", None).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "mode cached requires a price");
}

#[tokio::test]
async fn metrics_route_answers() {
    let h = harness();
    let response = h
        .app
        .clone()
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();

    // Either rendered or "not initialized", never a routing miss
    assert!(matches!(
        response.status(),
        StatusCode::OK | StatusCode::SERVICE_UNAVAILABLE
    ));
}
