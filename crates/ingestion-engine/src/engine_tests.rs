#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;
    use chrono::{NaiveDate, Utc};

    use market_core::{
        DailyFetch, DataSource, MarketDataProvider, MarketError, RawBar, RawForeignRow,
        TradingCalendar, UpdateStatus,
    };
    use market_store::{
        ForeignFlowRepository, MarketDb, PriceRepository, TrackingRepository,
    };

    use crate::engine::{IngestionConfig, IngestionEngine};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn raw_bar(d: NaiveDate, open: f64, high: f64, low: f64, close: f64, volume: f64) -> RawBar {
        RawBar {
            time: TradingCalendar::hose().session_close(d),
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// Provider serving a fixed set of rows, filtered by requested range.
    struct FixtureProvider {
        bars: Vec<RawBar>,
        foreign: Vec<RawForeignRow>,
        calls: AtomicU32,
        fail_always: bool,
    }

    impl FixtureProvider {
        fn with_bars(bars: Vec<RawBar>) -> Self {
            Self {
                bars,
                foreign: vec![],
                calls: AtomicU32::new(0),
                fail_always: false,
            }
        }

        fn failing() -> Self {
            Self {
                bars: vec![],
                foreign: vec![],
                calls: AtomicU32::new(0),
                fail_always: true,
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::Relaxed)
        }
    }

    #[async_trait]
    impl MarketDataProvider for FixtureProvider {
        async fn fetch_daily(
            &self,
            _symbol: &str,
            from: NaiveDate,
            to: NaiveDate,
        ) -> Result<DailyFetch, MarketError> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            if self.fail_always {
                return Err(MarketError::transport(Some(503), "upstream down"));
            }

            let in_range = |d: NaiveDate| d >= from && d <= to;
            Ok(DailyFetch {
                bars: self
                    .bars
                    .iter()
                    .filter(|b| in_range(b.time.date_naive()))
                    .cloned()
                    .collect(),
                foreign: self
                    .foreign
                    .iter()
                    .filter(|f| in_range(f.time.date_naive()))
                    .cloned()
                    .collect(),
            })
        }

        fn source(&self) -> DataSource {
            DataSource::Ssi
        }
    }

    struct Fixture {
        db: MarketDb,
        engine: IngestionEngine,
        provider: Arc<FixtureProvider>,
    }

    async fn fixture(provider: FixtureProvider) -> Fixture {
        let db = MarketDb::in_memory().await.unwrap();
        let provider = Arc::new(provider);
        let engine = IngestionEngine::new(
            provider.clone(),
            PriceRepository::new(db.pool().clone()),
            ForeignFlowRepository::new(db.pool().clone()),
            TrackingRepository::new(db.pool().clone()),
            TradingCalendar::hose(),
            IngestionConfig::default(),
        );
        Fixture {
            db,
            engine,
            provider,
        }
    }

    fn scenario_a_bars() -> Vec<RawBar> {
        vec![
            raw_bar(date(2024, 1, 2), 10.0, 11.0, 9.0, 10.5, 1000.0),
            raw_bar(date(2024, 1, 3), 10.5, 10.6, 10.2, 10.4, 800.0),
        ]
    }

    #[tokio::test]
    async fn cold_start_stores_sparse_history() {
        let fx = fixture(FixtureProvider::with_bars(scenario_a_bars())).await;

        let outcome = fx.engine.ingest("ACB", date(2024, 1, 5)).await.unwrap();
        assert_eq!(outcome.fetched, 2);
        assert_eq!(outcome.stored, 2);
        assert_eq!(outcome.new_last_date, date(2024, 1, 3));

        let mark = TrackingRepository::new(fx.db.pool().clone())
            .get("ACB", DataSource::Ssi)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(mark.last_updated_date, date(2024, 1, 3));
        assert_eq!(mark.total_records, 2);
        assert_eq!(mark.last_update_status, UpdateStatus::Success);

        let bars = PriceRepository::new(fx.db.pool().clone())
            .bars_for_symbol("ACB")
            .await
            .unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].close, 10.5);
    }

    #[tokio::test]
    async fn rerun_without_new_data_is_idempotent() {
        let fx = fixture(FixtureProvider::with_bars(scenario_a_bars())).await;

        fx.engine.ingest("ACB", date(2024, 1, 5)).await.unwrap();
        let prices = PriceRepository::new(fx.db.pool().clone());
        let before = prices.rows_for_symbol("ACB").await.unwrap();

        let second = fx.engine.ingest("ACB", date(2024, 1, 5)).await.unwrap();
        assert_eq!(second.stored, 0);
        assert_eq!(second.new_last_date, date(2024, 1, 3));

        let after = prices.rows_for_symbol("ACB").await.unwrap();
        assert_eq!(before.len(), after.len());
        for (a, b) in before.iter().zip(&after) {
            assert_eq!(a.created_at, b.created_at);
            assert_eq!(a.close, b.close);
        }

        let mark = TrackingRepository::new(fx.db.pool().clone())
            .get("ACB", DataSource::Ssi)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(mark.last_updated_date, date(2024, 1, 3));
        assert_eq!(mark.total_records, 2);
    }

    #[tokio::test]
    async fn broken_bar_is_rejected_not_stored() {
        // Scenario: O=10 H=9 L=11 C=0 V=-5 stays invalid after repair.
        let fx = fixture(FixtureProvider::with_bars(vec![raw_bar(
            date(2024, 1, 2),
            10.0,
            9.0,
            11.0,
            0.0,
            -5.0,
        )]))
        .await;

        let outcome = fx.engine.ingest("ACB", date(2024, 1, 5)).await.unwrap();
        assert_eq!(outcome.fetched, 1);
        assert_eq!(outcome.stored, 0);

        let count = PriceRepository::new(fx.db.pool().clone())
            .count_for_symbol("ACB")
            .await
            .unwrap();
        assert_eq!(count, 0);

        // Treated as data-unavailable: success status, date untouched.
        let mark = TrackingRepository::new(fx.db.pool().clone())
            .get("ACB", DataSource::Ssi)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(mark.last_update_status, UpdateStatus::Success);
        assert_eq!(mark.last_updated_date, date(2010, 1, 1));
    }

    #[tokio::test]
    async fn incremental_run_stores_only_the_new_bar() {
        let fx = fixture(FixtureProvider::with_bars(scenario_a_bars())).await;
        fx.engine.ingest("ACB", date(2024, 1, 5)).await.unwrap();

        let prices = PriceRepository::new(fx.db.pool().clone());
        let before = prices.rows_for_symbol("ACB").await.unwrap();

        // The provider now also has Jan 4.
        let mut bars = scenario_a_bars();
        bars.push(raw_bar(date(2024, 1, 4), 10.4, 10.8, 10.3, 10.7, 900.0));
        let fx2 = Fixture {
            engine: IngestionEngine::new(
                Arc::new(FixtureProvider::with_bars(bars)),
                prices.clone(),
                ForeignFlowRepository::new(fx.db.pool().clone()),
                TrackingRepository::new(fx.db.pool().clone()),
                TradingCalendar::hose(),
                IngestionConfig::default(),
            ),
            db: fx.db,
            provider: fx.provider,
        };

        let outcome = fx2.engine.ingest("ACB", date(2024, 1, 4)).await.unwrap();
        assert_eq!(outcome.stored, 1);
        assert_eq!(outcome.new_last_date, date(2024, 1, 4));

        let after = prices.rows_for_symbol("ACB").await.unwrap();
        assert_eq!(after.len(), 3);
        // Previously stored rows are untouched.
        for old in &before {
            let still = after.iter().find(|r| r.time == old.time).unwrap();
            assert_eq!(still.created_at, old.created_at);
        }

        let mark = TrackingRepository::new(fx2.db.pool().clone())
            .get("ACB", DataSource::Ssi)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(mark.last_updated_date, date(2024, 1, 4));
    }

    #[tokio::test]
    async fn provider_outage_marks_watermark_error_and_preserves_date() {
        let fx = fixture(FixtureProvider::failing()).await;
        let tracking = TrackingRepository::new(fx.db.pool().clone());

        let err = fx.engine.ingest("ACB", date(2024, 1, 5)).await.unwrap_err();
        assert!(matches!(err, MarketError::Transport { .. }));

        let mark = tracking.get("ACB", DataSource::Ssi).await.unwrap().unwrap();
        assert_eq!(mark.last_update_status, UpdateStatus::Error);
        assert!(mark
            .last_error_message
            .as_deref()
            .unwrap()
            .contains("upstream down"));
        assert_eq!(mark.last_updated_date, date(2010, 1, 1));

        // The next run retries from the same watermark.
        let err = fx.engine.ingest("ACB", date(2024, 1, 5)).await.unwrap_err();
        assert!(matches!(err, MarketError::Transport { .. }));
        let mark = tracking.get("ACB", DataSource::Ssi).await.unwrap().unwrap();
        assert_eq!(mark.last_updated_date, date(2010, 1, 1));
    }

    #[tokio::test]
    async fn walk_gives_up_after_consecutive_empty_windows() {
        let fx = fixture(FixtureProvider::with_bars(vec![])).await;

        let outcome = fx.engine.ingest("ACB", date(2024, 1, 5)).await.unwrap();
        assert_eq!(outcome.fetched, 0);
        assert_eq!(outcome.stored, 0);
        // Genesis 2010 leaves thousands of candidate days, but the walk
        // stops after max_empty_windows strides.
        assert_eq!(fx.provider.calls(), 3);
    }

    #[tokio::test]
    async fn manual_backfill_pushes_the_fetch_start_forward() {
        let fx = fixture(FixtureProvider::with_bars(scenario_a_bars())).await;
        fx.engine.ingest("ACB", date(2024, 1, 5)).await.unwrap();

        // Someone backfills Jan 10 directly into the store; the watermark
        // still says Jan 3.
        let prices = PriceRepository::new(fx.db.pool().clone());
        prices
            .upsert_bars(&[market_core::Bar {
                symbol: "ACB".into(),
                time: TradingCalendar::hose().session_close(date(2024, 1, 10)),
                open: 11.0,
                high: 11.5,
                low: 10.8,
                close: 11.2,
                volume: 700,
                source: DataSource::Ssi,
            }])
            .await
            .unwrap();

        let calls_before = fx.provider.calls();
        let outcome = fx.engine.ingest("ACB", date(2024, 1, 10)).await.unwrap();
        // Start moved past the backfilled row: nothing left to fetch, no
        // provider round-trip.
        assert_eq!(outcome.stored, 0);
        assert_eq!(fx.provider.calls(), calls_before);
    }

    #[tokio::test]
    async fn already_up_to_date_is_a_noop() {
        let fx = fixture(FixtureProvider::with_bars(scenario_a_bars())).await;
        let tracking = TrackingRepository::new(fx.db.pool().clone());
        tracking
            .get_or_create("ACB", DataSource::Ssi, date(2010, 1, 1))
            .await
            .unwrap();
        tracking
            .advance("ACB", DataSource::Ssi, date(2024, 1, 5), 10, 1)
            .await
            .unwrap();

        let outcome = fx.engine.ingest("ACB", date(2024, 1, 5)).await.unwrap();
        assert_eq!(outcome.fetched, 0);
        assert_eq!(outcome.new_last_date, date(2024, 1, 5));
        assert_eq!(fx.provider.calls(), 0);
    }

    #[tokio::test]
    async fn foreign_rows_are_stored_with_nets() {
        let mut provider = FixtureProvider::with_bars(scenario_a_bars());
        provider.foreign = vec![RawForeignRow {
            time: TradingCalendar::hose().session_close(date(2024, 1, 2)),
            buy_volume: 500.0,
            sell_volume: 200.0,
            buy_value: 5_000.0,
            sell_value: 2_000.0,
        }];
        let fx = fixture(provider).await;

        fx.engine.ingest("ACB", date(2024, 1, 5)).await.unwrap();

        let flows = ForeignFlowRepository::new(fx.db.pool().clone())
            .flows_for_symbol("ACB")
            .await
            .unwrap();
        assert_eq!(flows.len(), 1);
        assert_eq!(flows[0].net_volume(), 300);
    }
}
