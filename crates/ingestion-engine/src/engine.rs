use std::sync::Arc;
use std::time::Instant;

use chrono::{Duration, NaiveDate, Utc};

use market_core::{
    DailyFetch, MarketDataProvider, MarketError, TradingCalendar, Watermark,
};
use market_store::{ForeignFlowRepository, PriceRepository, TrackingRepository};

use crate::sanitize::{sanitize_bars, sanitize_foreign};

/// Knobs for the incremental fetch walk.
#[derive(Debug, Clone)]
pub struct IngestionConfig {
    /// Watermarks are created at this date the first time a symbol is
    /// touched.
    pub genesis: NaiveDate,
    /// Stride of the backward walk through provider history.
    pub window_days: i64,
    /// Consecutive empty windows before concluding no further history
    /// exists.
    pub max_empty_windows: u32,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            genesis: NaiveDate::from_ymd_opt(2010, 1, 1).expect("valid genesis"),
            window_days: 365,
            max_empty_windows: 3,
        }
    }
}

/// Result of one symbol ingestion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestOutcome {
    pub fetched: u64,
    pub stored: u64,
    pub new_last_date: NaiveDate,
}

/// Watermark-driven incremental ingestion: compute the fetch window,
/// walk the provider, sanitize, upsert, then advance the watermark. The
/// watermark only moves after the upserts commit.
pub struct IngestionEngine {
    provider: Arc<dyn MarketDataProvider>,
    prices: PriceRepository,
    foreign: ForeignFlowRepository,
    tracking: TrackingRepository,
    calendar: TradingCalendar,
    config: IngestionConfig,
}

impl IngestionEngine {
    pub fn new(
        provider: Arc<dyn MarketDataProvider>,
        prices: PriceRepository,
        foreign: ForeignFlowRepository,
        tracking: TrackingRepository,
        calendar: TradingCalendar,
        config: IngestionConfig,
    ) -> Self {
        Self {
            provider,
            prices,
            foreign,
            tracking,
            calendar,
            config,
        }
    }

    pub fn config(&self) -> &IngestionConfig {
        &self.config
    }

    /// Ingest everything between the watermark and `target_end`.
    pub async fn ingest(
        &self,
        symbol: &str,
        target_end: NaiveDate,
    ) -> Result<IngestOutcome, MarketError> {
        let source = self.provider.source();
        let started = Instant::now();
        let effective = self.calendar.effective_end(Utc::now(), target_end);

        let watermark = self
            .tracking
            .get_or_create(symbol, source, self.config.genesis)
            .await
            .map_err(persistence)?;

        let start = self.fetch_start(symbol, &watermark).await?;
        if start > effective {
            tracing::info!(symbol, %effective, "already up to date");
            return Ok(IngestOutcome {
                fetched: 0,
                stored: 0,
                new_last_date: watermark.last_updated_date,
            });
        }

        let fetch = match self.walk_windows(symbol, start, effective).await {
            Ok(fetch) => fetch,
            Err(e) => {
                self.tracking
                    .fail(symbol, source, &e.to_string())
                    .await
                    .map_err(persistence)?;
                return Err(e);
            }
        };

        let fetched = fetch.bars.len() as u64;
        let bars = sanitize_bars(symbol, source, &fetch.bars);
        let flows = sanitize_foreign(symbol, source, &fetch.foreign);

        if bars.is_empty() {
            // Explicit empty range (or nothing survived repair): success
            // with zero rows, the date stays put and retries tomorrow.
            tracing::info!(symbol, %start, %effective, fetched, "no storable bars in range");
            self.tracking
                .advance(
                    symbol,
                    source,
                    watermark.last_updated_date,
                    0,
                    started.elapsed().as_secs() as i64,
                )
                .await
                .map_err(persistence)?;
            return Ok(IngestOutcome {
                fetched,
                stored: 0,
                new_last_date: watermark.last_updated_date,
            });
        }

        let store_result: Result<u64, sqlx::Error> = async {
            let stored = self.prices.upsert_bars(&bars).await?;
            self.foreign.upsert_flows(&flows).await?;
            Ok(stored)
        }
        .await;

        let stored = match store_result {
            Ok(stored) => stored,
            Err(e) => {
                let err = persistence(e);
                self.tracking
                    .fail(symbol, source, &err.to_string())
                    .await
                    .map_err(persistence)?;
                return Err(err);
            }
        };

        let new_last_date = bars
            .iter()
            .map(|b| b.time.date_naive())
            .max()
            .unwrap_or(watermark.last_updated_date);

        self.tracking
            .advance(
                symbol,
                source,
                new_last_date,
                stored as i64,
                started.elapsed().as_secs() as i64,
            )
            .await
            .map_err(persistence)?;

        tracing::info!(symbol, fetched, stored, %new_last_date, "ingestion complete");
        Ok(IngestOutcome {
            fetched,
            stored,
            new_last_date,
        })
    }

    /// Window start: the day after the watermark, pushed forward past any
    /// manually backfilled rows already in the price store.
    async fn fetch_start(
        &self,
        symbol: &str,
        watermark: &Watermark,
    ) -> Result<NaiveDate, MarketError> {
        let mut start =
            (watermark.last_updated_date + Duration::days(1)).max(self.config.genesis);

        if let Some(db_last) = self
            .prices
            .latest_time(symbol)
            .await
            .map_err(persistence)?
        {
            let next_after_db = db_last.date_naive() + Duration::days(1);
            if next_after_db > start {
                tracing::debug!(symbol, %db_last, "price store is ahead of the watermark");
                start = next_after_db;
            }
        }

        Ok(start)
    }

    /// Walk backwards from `effective` in `window_days` strides until the
    /// range is covered or `max_empty_windows` consecutive windows come
    /// back empty. When a window has data the walk jumps to just before
    /// the oldest row found.
    async fn walk_windows(
        &self,
        symbol: &str,
        start: NaiveDate,
        effective: NaiveDate,
    ) -> Result<DailyFetch, MarketError> {
        let mut merged = DailyFetch::default();
        let mut cur_to = effective;
        let mut empty_windows = 0u32;

        while cur_to >= start && empty_windows < self.config.max_empty_windows {
            let cur_from = start.max(cur_to - Duration::days(self.config.window_days - 1));
            let fetch = self.provider.fetch_daily(symbol, cur_from, cur_to).await?;

            if fetch.is_empty() {
                empty_windows += 1;
                tracing::debug!(
                    symbol,
                    %cur_from,
                    %cur_to,
                    empty_windows,
                    "empty window, stepping back"
                );
                cur_to = cur_to - Duration::days(self.config.window_days);
                continue;
            }

            empty_windows = 0;
            let oldest = fetch.bars.iter().map(|b| b.time.date_naive()).min();
            merged.bars.extend(fetch.bars);
            merged.foreign.extend(fetch.foreign);

            cur_to = match oldest {
                Some(date) => date - Duration::days(1),
                None => cur_to - Duration::days(self.config.window_days),
            };
        }

        if empty_windows >= self.config.max_empty_windows {
            tracing::info!(
                symbol,
                limit = self.config.max_empty_windows,
                "stopping walk: no further history upstream"
            );
        }

        Ok(merged)
    }
}

fn persistence(e: sqlx::Error) -> MarketError {
    MarketError::Persistence(e.to_string())
}
