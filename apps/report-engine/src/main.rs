//! Report Engine Binary
//!
//! Starts the report engine HTTP API after warming the cache for the
//! configured watchlist.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin report-engine
//! ```
//!
//! # Environment Variables
//!
//! - `REPORT_ENGINE_HTTP_PORT`: HTTP API port (default: 8090)
//! - `REPORT_ENGINE_METRICS_ENABLED`: Install the Prometheus recorder (default: true)
//! - `REPORT_ENGINE_PROVIDER`: mock | yahoo (default: mock)
//! - `REPORT_ENGINE_PROVIDER_TIMEOUT_MS`: Provider request timeout (default: 5000)
//! - `REPORT_ENGINE_YAHOO_BASE_URL`: Yahoo Finance base URL
//! - `REPORT_ENGINE_MOCK_SEED`: Seed for the simulated provider (default: 42)
//! - `REPORT_ENGINE_REFRESH_INTERVAL_MS`: Global refresh interval (default: 60000)
//! - `REPORT_ENGINE_INTERVAL_OVERRIDES`: `key=ms` pairs applied to every watchlist symbol
//! - `REPORT_ENGINE_WATCHLIST`: Comma-separated symbols (default: AAPL,MSFT,NVDA,TSLA)
//! - `OTEL_ENABLED`: Enable OpenTelemetry (default: true)
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: OTLP endpoint (default: <http://localhost:4317>)
//! - `OTEL_SERVICE_NAME`: Service name (default: report-engine)
//! - `RUST_LOG`: Log filter

use std::sync::Arc;

use anyhow::Context;
use report_engine::domain::report::ReportOptions;
use report_engine::infrastructure::http::{ApiServer, AppState};
use report_engine::infrastructure::metrics::set_tracked_symbols;
use report_engine::infrastructure::providers::{AnyProvider, MockMarketData, YahooConfig, YahooMarketData};
use report_engine::infrastructure::telemetry;
use report_engine::{
    Clock, EngineConfig, MetadataStore, ModelRegistry, ProviderKind, ReportAssembler, SystemClock,
    init_metrics,
};
use tokio::signal;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv();

    // Keep the guard alive so spans are flushed on exit
    let _telemetry_guard = telemetry::init().context("failed to initialize telemetry")?;

    tracing::info!("Starting Report Engine");

    let config = EngineConfig::from_env().context("invalid configuration")?;
    log_config(&config);

    let _metrics_handle = if config.server.metrics_enabled {
        Some(init_metrics().context("failed to install Prometheus recorder")?)
    } else {
        None
    };

    let store = Arc::new(MetadataStore::with_global_refresh_interval(
        config.cache.refresh_interval_ms,
    ));
    for symbol in &config.watchlist {
        for over in &config.cache.interval_overrides {
            store.set_ticker_refresh_interval(symbol.as_str(), &over.key, over.ms);
        }
    }

    let provider = Arc::new(build_provider(&config).context("failed to build market data provider")?);
    let assembler = Arc::new(ReportAssembler::new(
        Arc::clone(&store),
        Arc::new(ModelRegistry::with_defaults()),
        provider,
    ));
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    warm_up(&assembler, &config, clock.as_ref()).await;

    let shutdown_token = CancellationToken::new();
    let state = Arc::new(AppState::new(Arc::clone(&assembler), clock));
    let server = ApiServer::new(config.server.http_port, state, shutdown_token.clone());

    let server_handle = tokio::spawn(async move {
        if let Err(e) = server.run().await {
            tracing::error!(error = %e, "API server error");
        }
    });

    tracing::info!("Report engine ready");

    await_shutdown(shutdown_token).await;
    server_handle.await.context("API server task panicked")?;

    tracing::info!("Report engine stopped");
    Ok(())
}

fn build_provider(config: &EngineConfig) -> anyhow::Result<AnyProvider> {
    let provider = match config.provider.kind {
        ProviderKind::Mock => AnyProvider::Mock(MockMarketData::simulated(config.provider.mock_seed)),
        ProviderKind::Yahoo => AnyProvider::Yahoo(YahooMarketData::new(&YahooConfig {
            base_url: config.provider.yahoo_base_url.clone(),
            timeout: config.provider.timeout,
        })?),
    };
    Ok(provider)
}

/// Build one live report per watchlist symbol so the cache starts warm.
async fn warm_up(assembler: &ReportAssembler<AnyProvider>, config: &EngineConfig, clock: &dyn Clock) {
    let options = ReportOptions::default();

    for symbol in &config.watchlist {
        let live = assembler
            .build_report_live(symbol, &options, clock.now_ms())
            .await;
        for warning in &live.warnings {
            tracing::warn!(symbol = %symbol, warning = %warning, "Warm-up degraded");
        }
        tracing::info!(
            symbol = %symbol,
            price = %live.report.current_price,
            rating = %live.report.target_consensus.rating,
            sentiment = %live.report.sentiment.label,
            "Warmed cache"
        );
    }

    set_tracked_symbols(assembler.store().tracked_symbols().len());
}

/// Log the parsed configuration.
fn log_config(config: &EngineConfig) {
    tracing::info!(
        http_port = config.server.http_port,
        metrics_enabled = config.server.metrics_enabled,
        provider = config.provider.kind.as_str(),
        refresh_interval_ms = config.cache.refresh_interval_ms,
        overrides = config.cache.interval_overrides.len(),
        watchlist = config.watchlist.len(),
        "Configuration loaded"
    );
}

/// Load .env file from current directory or any ancestor directory.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Wait for shutdown signal (SIGTERM or SIGINT).
#[allow(clippy::expect_used)]
async fn await_shutdown(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("signal handler installation is critical for graceful shutdown");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler installation is critical for graceful shutdown")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }

    shutdown_token.cancel();
    tracing::info!("Graceful shutdown started");
}
