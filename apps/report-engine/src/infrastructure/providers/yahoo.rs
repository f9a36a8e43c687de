//! Yahoo Finance market data adapter.
//!
//! Uses the public chart, search and quoteSummary endpoints. No API key is
//! required. A 404 is read as "no data for this symbol", not as a failure.

use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::application::ports::{MarketDataPort, ProviderError};
use crate::domain::models::{rating_for_upside, upside_pct};
use crate::domain::report::{NewsSignal, TargetConsensus};
use crate::domain::symbol::Symbol;

/// Default public endpoint.
pub const DEFAULT_YAHOO_BASE_URL: &str = "https://query1.finance.yahoo.com";

/// Confidence assigned to Yahoo news headlines.
const NEWS_CONFIDENCE: f64 = 0.6;

const NEWS_COUNT: &str = "8";

/// Yahoo adapter configuration.
#[derive(Debug, Clone)]
pub struct YahooConfig {
    /// API base URL, without trailing slash.
    pub base_url: String,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl Default for YahooConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_YAHOO_BASE_URL.to_string(),
            timeout: Duration::from_secs(5),
        }
    }
}

// =============================================================================
// Wire types
// =============================================================================

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartBody,
}

#[derive(Debug, Deserialize)]
struct ChartBody {
    #[serde(default)]
    result: Option<Vec<ChartResult>>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    meta: ChartMeta,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    regular_market_price: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    news: Vec<SearchNews>,
}

#[derive(Debug, Deserialize)]
struct SearchNews {
    title: String,
    #[serde(default)]
    publisher: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteSummaryResponse {
    quote_summary: QuoteSummaryBody,
}

#[derive(Debug, Deserialize)]
struct QuoteSummaryBody {
    #[serde(default)]
    result: Option<Vec<QuoteSummaryResult>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteSummaryResult {
    financial_data: Option<FinancialData>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FinancialData {
    current_price: Option<RawValue>,
    target_mean_price: Option<RawValue>,
    target_high_price: Option<RawValue>,
    target_low_price: Option<RawValue>,
    number_of_analyst_opinions: Option<RawValue>,
    recommendation_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawValue {
    raw: Option<f64>,
}

fn raw(value: Option<&RawValue>) -> Option<f64> {
    value.and_then(|v| v.raw).filter(|v| v.is_finite())
}

fn decimal(value: f64) -> Result<Decimal, ProviderError> {
    Decimal::try_from(value)
        .map(|d| d.round_dp(2))
        .map_err(|e| ProviderError::Parse(format!("invalid number {value}: {e}")))
}

// =============================================================================
// Adapter
// =============================================================================

/// Yahoo Finance adapter implementing `MarketDataPort`.
#[derive(Debug)]
pub struct YahooMarketData {
    client: reqwest::Client,
    base_url: String,
}

impl YahooMarketData {
    /// Create a new adapter.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &YahooConfig) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("report-engine/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// GET a JSON document. `Ok(None)` on 404.
    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<Option<T>, ProviderError> {
        let url = format!("{}{path}", self.base_url);

        let response = self
            .client
            .get(&url)
            .query(query)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        response
            .json()
            .await
            .map(Some)
            .map_err(|e| ProviderError::Parse(e.to_string()))
    }
}

#[async_trait]
impl MarketDataPort for YahooMarketData {
    fn name(&self) -> &'static str {
        "yahoo"
    }

    async fn fetch_price(&self, symbol: &Symbol) -> Result<Option<Decimal>, ProviderError> {
        let path = format!("/v8/finance/chart/{symbol}");
        let Some(response) = self
            .get_json::<ChartResponse>(&path, &[("interval", "1d"), ("range", "1d")])
            .await?
        else {
            return Ok(None);
        };

        let price = response
            .chart
            .result
            .unwrap_or_default()
            .into_iter()
            .find_map(|r| r.meta.regular_market_price)
            .filter(|p| p.is_finite() && *p > 0.0);

        price.map(decimal).transpose()
    }

    async fn fetch_consensus(
        &self,
        symbol: &Symbol,
    ) -> Result<Option<TargetConsensus>, ProviderError> {
        let path = format!("/v10/finance/quoteSummary/{symbol}");
        let Some(response) = self
            .get_json::<QuoteSummaryResponse>(&path, &[("modules", "financialData")])
            .await?
        else {
            return Ok(None);
        };

        let Some(data) = response
            .quote_summary
            .result
            .unwrap_or_default()
            .into_iter()
            .find_map(|r| r.financial_data)
        else {
            return Ok(None);
        };

        let Some(mean) = raw(data.target_mean_price.as_ref()) else {
            return Ok(None);
        };
        let mean_target = decimal(mean)?;
        let high_target = decimal(raw(data.target_high_price.as_ref()).unwrap_or(mean))?;
        let low_target = decimal(raw(data.target_low_price.as_ref()).unwrap_or(mean))?;

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let analyst_count = raw(data.number_of_analyst_opinions.as_ref())
            .map_or(0, |n| n.max(0.0).round() as u32);

        let upside = match raw(data.current_price.as_ref()) {
            Some(price) => upside_pct(mean_target, decimal(price)?),
            None => 0.0,
        };
        let rating = data
            .recommendation_key
            .filter(|k| !k.is_empty() && k != "none")
            .unwrap_or_else(|| rating_for_upside(upside).to_string());

        Ok(Some(TargetConsensus {
            mean_target,
            high_target,
            low_target,
            analyst_count,
            rating,
            upside_pct: upside,
        }))
    }

    async fn fetch_news(&self, symbol: &Symbol) -> Result<Vec<NewsSignal>, ProviderError> {
        let response = self
            .get_json::<SearchResponse>(
                "/v1/finance/search",
                &[
                    ("q", symbol.as_str()),
                    ("quotesCount", "0"),
                    ("newsCount", NEWS_COUNT),
                ],
            )
            .await?;

        Ok(response
            .map(|r| r.news)
            .unwrap_or_default()
            .into_iter()
            .filter(|n| !n.title.trim().is_empty())
            .map(|n| {
                NewsSignal::new(
                    n.publisher.unwrap_or_else(|| "yahoo".to_string()),
                    n.title,
                    NEWS_CONFIDENCE,
                )
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn adapter(server: &MockServer) -> YahooMarketData {
        YahooMarketData::new(&YahooConfig {
            base_url: server.uri(),
            timeout: Duration::from_secs(2),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn fetch_price_reads_regular_market_price() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v8/finance/chart/AAPL"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "chart": {
                    "result": [{ "meta": { "symbol": "AAPL", "regularMarketPrice": 222.22 } }],
                    "error": null
                }
            })))
            .mount(&server)
            .await;

        let price = adapter(&server).fetch_price(&Symbol::new("aapl")).await.unwrap();

        assert_eq!(price, Some(dec!(222.22)));
    }

    #[tokio::test]
    async fn fetch_price_not_found_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v8/finance/chart/ZZZZ"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let price = adapter(&server).fetch_price(&Symbol::new("ZZZZ")).await.unwrap();

        assert_eq!(price, None);
    }

    #[tokio::test]
    async fn server_error_maps_to_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v8/finance/chart/AAPL"))
            .respond_with(ResponseTemplate::new(429).set_body_string("Too Many Requests"))
            .mount(&server)
            .await;

        let err = adapter(&server)
            .fetch_price(&Symbol::new("AAPL"))
            .await
            .unwrap_err();

        assert_eq!(
            err,
            ProviderError::Api {
                status: 429,
                message: "Too Many Requests".to_string()
            }
        );
    }

    #[tokio::test]
    async fn malformed_body_maps_to_parse_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v8/finance/chart/AAPL"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let err = adapter(&server)
            .fetch_price(&Symbol::new("AAPL"))
            .await
            .unwrap_err();

        assert!(matches!(err, ProviderError::Parse(_)));
    }

    #[tokio::test]
    async fn fetch_consensus_reads_financial_data() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v10/finance/quoteSummary/MSFT"))
            .and(query_param("modules", "financialData"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "quoteSummary": {
                    "result": [{
                        "financialData": {
                            "currentPrice": { "raw": 400.0, "fmt": "400.00" },
                            "targetMeanPrice": { "raw": 480.0, "fmt": "480.00" },
                            "targetHighPrice": { "raw": 600.0, "fmt": "600.00" },
                            "targetLowPrice": { "raw": 390.0, "fmt": "390.00" },
                            "numberOfAnalystOpinions": { "raw": 45, "fmt": "45" },
                            "recommendationKey": "strong_buy"
                        }
                    }],
                    "error": null
                }
            })))
            .mount(&server)
            .await;

        let consensus = adapter(&server)
            .fetch_consensus(&Symbol::new("MSFT"))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(consensus.mean_target, dec!(480));
        assert_eq!(consensus.high_target, dec!(600));
        assert_eq!(consensus.low_target, dec!(390));
        assert_eq!(consensus.analyst_count, 45);
        assert_eq!(consensus.rating, "strong_buy");
        assert!((consensus.upside_pct - 20.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn fetch_consensus_without_targets_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v10/finance/quoteSummary/SPY"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "quoteSummary": { "result": [{ "financialData": {} }], "error": null }
            })))
            .mount(&server)
            .await;

        let consensus = adapter(&server)
            .fetch_consensus(&Symbol::new("SPY"))
            .await
            .unwrap();

        assert!(consensus.is_none());
    }

    #[tokio::test]
    async fn fetch_news_maps_titles_and_publishers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/finance/search"))
            .and(query_param("q", "NVDA"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "news": [
                    { "title": "Nvidia beats estimates", "publisher": "Reuters" },
                    { "title": "Chip stocks slump" },
                    { "title": "   " }
                ]
            })))
            .mount(&server)
            .await;

        let news = adapter(&server).fetch_news(&Symbol::new("nvda")).await.unwrap();

        assert_eq!(news.len(), 2);
        assert_eq!(news[0].source, "Reuters");
        assert_eq!(news[0].text, "Nvidia beats estimates");
        assert_eq!(news[1].source, "yahoo");
        assert!((news[1].confidence - NEWS_CONFIDENCE).abs() < f64::EPSILON);
    }
}
