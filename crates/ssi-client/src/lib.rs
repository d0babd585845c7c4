//! SSI iBoard-style market data adapter.
//!
//! Speaks the paginated `stock-info` JSON endpoint: daily OHLCV plus
//! foreign buy/sell aggregates, dd/mm/yyyy dates, field names that vary
//! between API revisions. Everything provider-specific (alias precedence,
//! "empty body means no data", rate limiting, secondary fetch strategy)
//! lives here behind the `MarketDataProvider` trait.

mod parse;

pub use parse::{parse_stock_info_items, RowAliases};

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use tokio::sync::Mutex;
use tokio::time::Instant;

use market_core::{DailyFetch, DataSource, MarketDataProvider, MarketError, TradingCalendar};

const DEFAULT_BASE_URL: &str = "https://iboard-api.ssi.com.vn/statistics/company/stock-info";

/// Sliding-window rate limiter: at most `max_requests` per `window`.
#[derive(Clone)]
struct RateLimiter {
    timestamps: Arc<Mutex<VecDeque<Instant>>>,
    max_requests: usize,
    window: Duration,
}

impl RateLimiter {
    fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            timestamps: Arc::new(Mutex::new(VecDeque::new())),
            max_requests,
            window,
        }
    }

    async fn acquire(&self) {
        loop {
            let mut ts = self.timestamps.lock().await;
            let now = Instant::now();

            while let Some(&front) = ts.front() {
                if now.duration_since(front) >= self.window {
                    ts.pop_front();
                } else {
                    break;
                }
            }

            if ts.len() < self.max_requests {
                ts.push_back(now);
                return;
            }

            let wait_until = ts.front().unwrap().checked_add(self.window).unwrap();
            let sleep_dur = wait_until.duration_since(now) + Duration::from_millis(50);
            drop(ts);
            tracing::debug!(
                "rate limiter: waiting {:.1}s for an upstream slot",
                sleep_dur.as_secs_f64()
            );
            tokio::time::sleep(sleep_dur).await;
        }
    }
}

/// Secondary fetch strategy tried when the plain HTTP round-trip keeps
/// failing (an alternate endpoint, a headless-browser bridge, ...).
#[async_trait]
pub trait FallbackFetch: Send + Sync {
    async fn fetch_json(
        &self,
        url: &str,
        params: &[(String, String)],
    ) -> Result<serde_json::Value, MarketError>;
}

#[derive(Debug, Clone)]
pub struct SsiClientConfig {
    pub base_url: String,
    pub page_size: usize,
    pub max_attempts: u32,
    pub requests_per_minute: usize,
    pub timeout: Duration,
}

impl Default for SsiClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            page_size: 1_000,
            max_attempts: 3,
            requests_per_minute: 60,
            timeout: Duration::from_secs(30),
        }
    }
}

pub struct SsiClient {
    config: SsiClientConfig,
    client: Client,
    rate_limiter: RateLimiter,
    calendar: TradingCalendar,
    fallback: Option<Arc<dyn FallbackFetch>>,
}

impl SsiClient {
    pub fn new(config: SsiClientConfig) -> Self {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_else(|_| Client::new());
        let rate_limiter =
            RateLimiter::new(config.requests_per_minute, Duration::from_secs(60));

        Self {
            config,
            client,
            rate_limiter,
            calendar: TradingCalendar::hose(),
            fallback: None,
        }
    }

    pub fn with_fallback(mut self, fallback: Arc<dyn FallbackFetch>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    fn format_date(date: NaiveDate) -> String {
        date.format("%d/%m/%Y").to_string()
    }

    /// One GET with rate limiting, exponential backoff on transient
    /// statuses, and decode-error tolerance: responses the endpoint emits
    /// for out-of-range windows (empty or binary bodies) read as "no
    /// data", not failure.
    async fn get_json(
        &self,
        params: &[(String, String)],
    ) -> Result<serde_json::Value, MarketError> {
        let mut backoff = Duration::from_millis(500);
        let mut last_err: Option<MarketError> = None;

        for attempt in 0..self.config.max_attempts {
            self.rate_limiter.acquire().await;

            let response = self
                .client
                .get(&self.config.base_url)
                .query(params)
                .send()
                .await;

            match response {
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    if resp.status().is_success() {
                        let body = resp
                            .bytes()
                            .await
                            .map_err(|e| MarketError::transport(None, e.to_string()))?;
                        if body.is_empty() {
                            return Ok(serde_json::json!({"code": "SUCCESS", "data": []}));
                        }
                        match serde_json::from_slice::<serde_json::Value>(&body) {
                            Ok(value) => return Ok(value),
                            Err(e) => {
                                // Out-of-range windows come back as junk bodies.
                                tracing::debug!(
                                    attempt,
                                    "undecodable body treated as empty window: {e}"
                                );
                                return Ok(serde_json::json!({"code": "SUCCESS", "data": []}));
                            }
                        }
                    }

                    let err = MarketError::transport(
                        Some(status),
                        format!("GET {} -> {status}", self.config.base_url),
                    );
                    if !err.is_transient() {
                        return Err(err);
                    }
                    tracing::warn!(status, attempt, "transient upstream error, backing off");
                    last_err = Some(err);
                }
                Err(e) => {
                    tracing::warn!(attempt, "request error: {e}");
                    last_err = Some(MarketError::transport(
                        e.status().map(|s| s.as_u16()),
                        e.to_string(),
                    ));
                }
            }

            tokio::time::sleep(backoff).await;
            backoff *= 2;
        }

        if let Some(fallback) = &self.fallback {
            tracing::info!("primary fetch exhausted, trying secondary strategy");
            return fallback.fetch_json(&self.config.base_url, params).await;
        }

        Err(last_err
            .unwrap_or_else(|| MarketError::transport(None, "exhausted retries".to_string())))
    }
}

#[async_trait]
impl MarketDataProvider for SsiClient {
    async fn fetch_daily(
        &self,
        symbol: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<DailyFetch, MarketError> {
        let symbol = symbol.to_uppercase();
        let mut items: Vec<serde_json::Value> = Vec::new();
        let mut page = 1usize;

        loop {
            let params = vec![
                ("symbol".to_string(), symbol.clone()),
                ("page".to_string(), page.to_string()),
                ("pageSize".to_string(), self.config.page_size.to_string()),
                ("fromDate".to_string(), Self::format_date(from)),
                ("toDate".to_string(), Self::format_date(to)),
            ];

            let value = self.get_json(&params).await?;

            let code = value.get("code").and_then(|c| c.as_str()).unwrap_or("");
            if code != "SUCCESS" {
                return Err(MarketError::Validation(format!(
                    "unexpected response code {code:?} for {symbol}"
                )));
            }

            let page_items = value
                .get("data")
                .and_then(|d| d.as_array())
                .cloned()
                .unwrap_or_default();
            let page_len = page_items.len();
            items.extend(page_items);

            if page_len < self.config.page_size {
                break;
            }
            page += 1;
        }

        tracing::debug!(symbol = %symbol, rows = items.len(), %from, %to, "fetched daily rows");
        Ok(parse_stock_info_items(&items, &self.calendar))
    }

    fn source(&self) -> DataSource {
        DataSource::Ssi
    }
}
