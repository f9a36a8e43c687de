//! HTTP API
//!
//! JSON API over the report assembler and the metadata cache, plus the
//! health and Prometheus endpoints.
//!
//! # Endpoints
//!
//! - `GET /health` - JSON health status
//! - `GET /healthz` - liveness probe (simple OK)
//! - `GET /metrics` - Prometheus metrics in text format
//! - `GET /v1/models` - registered fundamental and entry models
//! - `GET /v1/reports/{symbol}` - build a report (`mode`, `price`, `fundamental_model`, `entry_model`)
//! - `GET /v1/cache` - full cache snapshot
//! - `GET /v1/cache/{symbol}/{key}` - one slot with its history
//! - `PUT /v1/cache/interval` - set the global refresh interval
//! - `PUT /v1/cache/{symbol}/{key}/interval` - set a per-slot override

use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, put};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::application::ports::MarketDataPort;
use crate::application::services::ReportAssembler;
use crate::domain::clock::{Clock, Millis};
use crate::domain::metadata::{CacheError, CacheHistoryRecord, CacheRecord, StoreSnapshot};
use crate::domain::models::ModelInfo;
use crate::domain::report::{LiveReport, ReportMode, ReportOptions};
use crate::domain::symbol::Symbol;
use crate::infrastructure::metrics::{get_metrics_handle, set_tracked_symbols};

/// Longest accepted ticker symbol.
const MAX_SYMBOL_LEN: usize = 12;

// =============================================================================
// State
// =============================================================================

/// Shared state for the API handlers.
pub struct AppState<P>
where
    P: MarketDataPort,
{
    assembler: Arc<ReportAssembler<P>>,
    clock: Arc<dyn Clock>,
    version: String,
    started_at: Instant,
}

impl<P> AppState<P>
where
    P: MarketDataPort,
{
    /// Create new API state.
    #[must_use]
    pub fn new(assembler: Arc<ReportAssembler<P>>, clock: Arc<dyn Clock>) -> Self {
        Self {
            assembler,
            clock,
            version: env!("CARGO_PKG_VERSION").to_string(),
            started_at: Instant::now(),
        }
    }

    /// The assembler behind the API.
    #[must_use]
    pub const fn assembler(&self) -> &Arc<ReportAssembler<P>> {
        &self.assembler
    }
}

// =============================================================================
// Server
// =============================================================================

/// Build the API router.
pub fn create_router<P>(state: Arc<AppState<P>>) -> Router
where
    P: MarketDataPort + 'static,
{
    Router::new()
        .route("/health", get(health_handler::<P>))
        .route("/healthz", get(liveness_handler))
        .route("/metrics", get(metrics_handler))
        .route("/v1/models", get(models_handler::<P>))
        .route("/v1/reports/{symbol}", get(report_handler::<P>))
        .route("/v1/cache", get(cache_dump_handler::<P>))
        .route("/v1/cache/interval", put(global_interval_handler::<P>))
        .route("/v1/cache/{symbol}/{key}", get(cache_slot_handler::<P>))
        .route(
            "/v1/cache/{symbol}/{key}/interval",
            put(slot_interval_handler::<P>),
        )
        .with_state(state)
}

/// HTTP API server.
pub struct ApiServer<P>
where
    P: MarketDataPort,
{
    port: u16,
    state: Arc<AppState<P>>,
    cancel: CancellationToken,
}

impl<P> ApiServer<P>
where
    P: MarketDataPort + 'static,
{
    /// Create a new API server.
    #[must_use]
    pub const fn new(port: u16, state: Arc<AppState<P>>, cancel: CancellationToken) -> Self {
        Self {
            port,
            state,
            cancel,
        }
    }

    /// Run the server until cancelled.
    ///
    /// # Errors
    ///
    /// Returns `ApiServerError` if binding fails or the HTTP server
    /// encounters a fatal error while running.
    pub async fn run(self) -> Result<(), ApiServerError> {
        let app = create_router(self.state);

        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ApiServerError::BindFailed(self.port, e.to_string()))?;

        tracing::info!(port = self.port, "API server listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(self.cancel.cancelled_owned())
            .await
            .map_err(|e| ApiServerError::ServerFailed(e.to_string()))?;

        tracing::info!("API server stopped");
        Ok(())
    }
}

/// API server errors.
#[derive(Debug, thiserror::Error)]
pub enum ApiServerError {
    /// Failed to bind to port.
    #[error("failed to bind to port {0}: {1}")]
    BindFailed(u16, String),
    /// Server error.
    #[error("server error: {0}")]
    ServerFailed(String),
}

// =============================================================================
// Request / Response Types
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Always "healthy" once the server answers.
    pub status: &'static str,
    /// Engine version.
    pub version: String,
    /// Server uptime in seconds.
    pub uptime_secs: u64,
    /// Current time.
    pub current_time: DateTime<Utc>,
    /// Active market data provider.
    pub provider: &'static str,
    /// Symbols with cache state.
    pub tracked_symbols: Vec<Symbol>,
    /// Process-wide default refresh interval.
    pub global_refresh_interval_ms: Millis,
}

/// Registered models.
#[derive(Debug, Clone, Serialize)]
pub struct ModelsResponse {
    /// Fundamental models, default first.
    pub fundamental: Vec<ModelInfo>,
    /// Entry models, default first.
    pub entry: Vec<ModelInfo>,
}

/// Query string for report builds. Every field arrives as text and is
/// validated by the handler.
#[derive(Debug, Default, Deserialize)]
pub struct ReportQuery {
    /// `live` (default), `cached` or `fresh`.
    pub mode: Option<String>,
    /// Spot price; required for `cached` and `fresh`, fallback for `live`.
    pub price: Option<String>,
    /// Fundamental model id.
    pub fundamental_model: Option<String>,
    /// Entry model id.
    pub entry_model: Option<String>,
}

/// One cache slot.
#[derive(Debug, Clone, Serialize)]
pub struct SlotResponse {
    /// Symbol.
    pub symbol: Symbol,
    /// Metric key.
    pub key: String,
    /// Effective refresh interval.
    pub refresh_interval_ms: Millis,
    /// Whether the slot is due for recomputation now.
    pub stale: bool,
    /// Latest record.
    pub latest: Option<CacheRecord<Value>>,
    /// History, oldest first.
    pub history: Vec<CacheHistoryRecord<Value>>,
}

/// Interval update body.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct IntervalRequest {
    /// Requested interval; values below the floor are clamped.
    pub ms: Millis,
}

/// Interval actually stored.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct IntervalResponse {
    /// Stored (clamped) interval.
    pub refresh_interval_ms: Millis,
}

// =============================================================================
// Handlers
// =============================================================================

async fn health_handler<P>(State(state): State<Arc<AppState<P>>>) -> impl IntoResponse
where
    P: MarketDataPort + 'static,
{
    let store = state.assembler.store();
    Json(HealthResponse {
        status: "healthy",
        version: state.version.clone(),
        uptime_secs: state.started_at.elapsed().as_secs(),
        current_time: Utc::now(),
        provider: state.assembler.provider().name(),
        tracked_symbols: store.tracked_symbols(),
        global_refresh_interval_ms: store.global_refresh_interval(),
    })
}

async fn liveness_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

async fn metrics_handler() -> impl IntoResponse {
    get_metrics_handle().map_or_else(
        || {
            (
                StatusCode::SERVICE_UNAVAILABLE,
                [("content-type", "text/plain")],
                "Metrics not initialized".to_string(),
            )
        },
        |handle| {
            (
                StatusCode::OK,
                [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
                handle.render(),
            )
        },
    )
}

async fn models_handler<P>(State(state): State<Arc<AppState<P>>>) -> impl IntoResponse
where
    P: MarketDataPort + 'static,
{
    let models = state.assembler.models();
    Json(ModelsResponse {
        fundamental: models.fundamental_models(),
        entry: models.entry_models(),
    })
}

async fn report_handler<P>(
    State(state): State<Arc<AppState<P>>>,
    Path(symbol): Path<String>,
    Query(query): Query<ReportQuery>,
) -> Result<Json<LiveReport>, ApiError>
where
    P: MarketDataPort + 'static,
{
    let symbol = parse_symbol(&symbol)?;
    let mode = query.mode.as_deref().map_or(Ok(ReportMode::Live), parse_mode)?;
    let price = query.price.as_deref().map(parse_price).transpose()?;

    let mut options = ReportOptions::default();
    if let Some(id) = query.fundamental_model {
        options = options.with_fundamental_model(id);
    }
    if let Some(id) = query.entry_model {
        options = options.with_entry_model(id);
    }

    let now = state.clock.now_ms();
    tracing::info!(symbol = %symbol, mode = mode.as_str(), "Building report");

    let assembler = &state.assembler;
    let response = match mode {
        ReportMode::Live => {
            if let Some(price) = price {
                options = options.with_fallback_price(price);
            }
            assembler.build_report_live(&symbol, &options, now).await
        }
        ReportMode::Cached => LiveReport {
            report: assembler.build_report_cached(&symbol, require_price(price, mode)?, &options, now),
            warnings: Vec::new(),
        },
        ReportMode::Fresh => LiveReport {
            report: assembler.build_report(&symbol, require_price(price, mode)?, &options),
            warnings: Vec::new(),
        },
    };

    set_tracked_symbols(assembler.store().tracked_symbols().len());
    Ok(Json(response))
}

async fn cache_dump_handler<P>(State(state): State<Arc<AppState<P>>>) -> Json<StoreSnapshot>
where
    P: MarketDataPort + 'static,
{
    Json(state.assembler.store().dump())
}

async fn cache_slot_handler<P>(
    State(state): State<Arc<AppState<P>>>,
    Path((symbol, key)): Path<(String, String)>,
) -> Result<Json<SlotResponse>, ApiError>
where
    P: MarketDataPort + 'static,
{
    let symbol = parse_symbol(&symbol)?;
    let store = state.assembler.store();

    let latest = store.get_latest::<Value>(symbol.as_str(), &key)?;
    let history = store.get_history::<Value>(symbol.as_str(), &key)?;
    if latest.is_none() && history.is_empty() {
        return Err(ApiError::NotFound(format!("no cached value for {symbol}/{key}")));
    }

    Ok(Json(SlotResponse {
        refresh_interval_ms: store.refresh_interval(symbol.as_str(), &key),
        stale: store.should_refresh(symbol.as_str(), &key, state.clock.now_ms()),
        symbol,
        key,
        latest,
        history,
    }))
}

async fn global_interval_handler<P>(
    State(state): State<Arc<AppState<P>>>,
    body: Result<Json<IntervalRequest>, JsonRejection>,
) -> Result<Json<IntervalResponse>, ApiError>
where
    P: MarketDataPort + 'static,
{
    let Json(request) = body?;
    let stored = state.assembler.store().set_global_refresh_interval(request.ms);
    tracing::info!(requested = request.ms, stored, "Global refresh interval updated");

    Ok(Json(IntervalResponse {
        refresh_interval_ms: stored,
    }))
}

async fn slot_interval_handler<P>(
    State(state): State<Arc<AppState<P>>>,
    Path((symbol, key)): Path<(String, String)>,
    body: Result<Json<IntervalRequest>, JsonRejection>,
) -> Result<Json<IntervalResponse>, ApiError>
where
    P: MarketDataPort + 'static,
{
    let symbol = parse_symbol(&symbol)?;
    let Json(request) = body?;
    let store = state.assembler.store();
    let stored = store.set_ticker_refresh_interval(symbol.as_str(), &key, request.ms);
    set_tracked_symbols(store.tracked_symbols().len());
    tracing::info!(symbol = %symbol, key = %key, stored, "Slot refresh interval updated");

    Ok(Json(IntervalResponse {
        refresh_interval_ms: stored,
    }))
}

// =============================================================================
// Parsing
// =============================================================================

fn parse_symbol(raw: &str) -> Result<Symbol, ApiError> {
    let symbol = Symbol::new(raw);
    let text = symbol.as_str();
    let valid_chars = text
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '^' | '='));

    if text.is_empty() || text.len() > MAX_SYMBOL_LEN || !valid_chars {
        return Err(ApiError::BadRequest(format!("invalid symbol: {raw:?}")));
    }
    Ok(symbol)
}

fn parse_mode(raw: &str) -> Result<ReportMode, ApiError> {
    match raw.to_ascii_lowercase().as_str() {
        "live" => Ok(ReportMode::Live),
        "cached" => Ok(ReportMode::Cached),
        "fresh" => Ok(ReportMode::Fresh),
        _ => Err(ApiError::BadRequest(format!(
            "invalid mode {raw:?}: expected live, cached or fresh"
        ))),
    }
}

fn parse_price(raw: &str) -> Result<Decimal, ApiError> {
    Decimal::from_str(raw.trim())
        .ok()
        .filter(|p| *p > Decimal::ZERO)
        .ok_or_else(|| ApiError::BadRequest(format!("invalid price {raw:?}: expected a positive number")))
}

fn require_price(price: Option<Decimal>, mode: ReportMode) -> Result<Decimal, ApiError> {
    price.ok_or_else(|| ApiError::BadRequest(format!("mode {} requires a price", mode.as_str())))
}

// =============================================================================
// Errors
// =============================================================================

/// API error rendered as `{"error": "..."}`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Malformed request.
    #[error("{0}")]
    BadRequest(String),
    /// Nothing at this address.
    #[error("{0}")]
    NotFound(String),
    /// The cache could not serve the request.
    #[error(transparent)]
    Cache(#[from] CacheError),
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Cache(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::{MockMarketDataPort, ProviderError};
    use crate::domain::clock::ManualClock;
    use crate::domain::metadata::MetadataStore;
    use crate::domain::models::ModelRegistry;
    use axum::body::Body;
    use axum::http::Request;
    use rust_decimal_macros::dec;
    use test_case::test_case;
    use tower::ServiceExt;

    fn offline_provider() -> MockMarketDataPort {
        let mut provider = MockMarketDataPort::new();
        provider.expect_name().return_const("mock");
        provider
            .expect_fetch_price()
            .returning(|_| Err(ProviderError::Unavailable));
        provider.expect_fetch_consensus().returning(|_| Ok(None));
        provider.expect_fetch_news().returning(|_| Ok(Vec::new()));
        provider
    }

    fn app() -> Router {
        let assembler = ReportAssembler::new(
            Arc::new(MetadataStore::new()),
            Arc::new(ModelRegistry::with_defaults()),
            Arc::new(offline_provider()),
        );
        let state = AppState::new(Arc::new(assembler), Arc::new(ManualClock::new(10_000)));
        create_router(Arc::new(state))
    }

    async fn send(app: &Router, method: &str, uri: &str, body: Option<&str>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if body.is_some() {
            builder = builder.header("content-type", "application/json");
        }
        let request = builder
            .body(body.map_or_else(Body::empty, |b| Body::from(b.to_string())))
            .unwrap();

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    #[tokio::test]
    async fn health_reports_provider_and_interval() {
        let (status, body) = send(&app(), "GET", "/health", None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["provider"], "mock");
        assert_eq!(body["global_refresh_interval_ms"], 60_000);
    }

    #[tokio::test]
    async fn liveness_is_ok() {
        let response = app()
            .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn models_lists_defaults_first() {
        let (status, body) = send(&app(), "GET", "/v1/models", None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["fundamental"][0]["id"], "dcf-core");
        assert_eq!(body["entry"][0]["id"], "momentum-breakout");
    }

    #[tokio::test]
    async fn cached_report_then_slot_lookup() {
        let app = app();
        let (status, body) =
            send(&app, "GET", "/v1/reports/msft?mode=cached&price=410.50", None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["report"]["symbol"], "MSFT");
        assert_eq!(body["report"]["mode"], "cached");
        assert_eq!(body["warnings"].as_array().unwrap().len(), 0);

        let (status, slot) = send(&app, "GET", "/v1/cache/MSFT/sentiment", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(slot["stale"], false);
        assert_eq!(slot["history"].as_array().unwrap().len(), 1);
        assert_eq!(slot["latest"]["computed_at"], 10_000);
    }

    #[tokio::test]
    async fn live_report_uses_fallback_price_with_warnings() {
        let (status, body) = send(&app(), "GET", "/v1/reports/AAPL?price=190", None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["report"]["mode"], "live");
        assert_eq!(body["report"]["current_price"], "190");
        assert!(!body["warnings"].as_array().unwrap().is_empty());
    }

    #[test_case("/v1/reports/AAPL?mode=cached" ; "cached without price")]
    #[test_case("/v1/reports/AAPL?mode=fresh" ; "fresh without price")]
    #[test_case("/v1/reports/AAPL?mode=bogus&price=10" ; "unknown mode")]
    #[test_case("/v1/reports/AAPL?mode=fresh&price=-3" ; "negative price")]
    #[test_case("/v1/reports/AAPL?mode=fresh&price=abc" ; "non numeric price")]
    #[test_case("/v1/reports/BAD%20SYMBOL?mode=fresh&price=10" ; "invalid symbol")]
    #[tokio::test]
    async fn bad_report_requests_are_rejected(uri: &str) {
        let (status, body) = send(&app(), "GET", uri, None).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn fresh_report_leaves_cache_empty() {
        let app = app();
        let (status, _) = send(&app, "GET", "/v1/reports/NVDA?mode=fresh&price=100", None).await;
        assert_eq!(status, StatusCode::OK);

        let (_, dump) = send(&app, "GET", "/v1/cache", None).await;
        assert!(dump["tickers"].as_object().unwrap().is_empty());

        let (status, body) = send(&app, "GET", "/v1/cache/NVDA/sentiment", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].as_str().unwrap().contains("NVDA/sentiment"));
    }

    #[tokio::test]
    async fn interval_updates_are_clamped() {
        let app = app();

        let (status, body) = send(&app, "PUT", "/v1/cache/interval", Some(r#"{"ms": 10}"#)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["refresh_interval_ms"], 1_000);

        let (status, body) = send(
            &app,
            "PUT",
            "/v1/cache/tsla/sentiment/interval",
            Some(r#"{"ms": 5000}"#),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["refresh_interval_ms"], 5_000);

        let (_, dump) = send(&app, "GET", "/v1/cache", None).await;
        assert_eq!(dump["global_refresh_interval_ms"], 1_000);
        assert_eq!(dump["tickers"]["TSLA"]["intervals"]["sentiment"], 5_000);
    }

    #[tokio::test]
    async fn malformed_interval_body_is_bad_request() {
        let (status, body) =
            send(&app(), "PUT", "/v1/cache/interval", Some(r#"{"ms": "soon"}"#)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
    }

    #[test]
    fn parse_price_accepts_decimal_text() {
        assert_eq!(parse_price(" 222.22 ").unwrap(), dec!(222.22));
        assert!(parse_price("0").is_err());
    }

    #[tokio::test]
    async fn cache_errors_render_as_internal_error() {
        let error = ApiError::from(CacheError::PayloadMismatch {
            key: "sentiment".to_string(),
            message: "invalid type".to_string(),
        });

        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert!(body["error"].as_str().unwrap().contains("sentiment"));
    }
}
