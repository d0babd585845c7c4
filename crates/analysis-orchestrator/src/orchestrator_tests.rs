#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::NaiveDate;

    use ingestion_engine::{IngestionConfig, IngestionEngine};
    use market_core::{
        DailyFetch, DataSource, MarketDataProvider, MarketError, RawBar, StaticUniverse,
        TradingCalendar,
    };
    use market_store::{
        AnalysisRepository, ForeignFlowRepository, MarketDb, PriceRepository,
        TrackingRepository,
    };
    use signal_engine::{AnalysisConfig, ScoringConfig};
    use technical_indicators::IndicatorConfig;

    use crate::{Orchestrator, OrchestratorConfig};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    /// 100 rising daily bars starting 2024-01-02: long enough for the
    /// Ichimoku spans to warm up and fire the cloud rules.
    fn fixture_bars() -> Vec<RawBar> {
        let calendar = TradingCalendar::hose();
        let start = date(2024, 1, 2);
        (0..100)
            .map(|i| {
                let close = 100.0 + 0.5 * i as f64;
                RawBar {
                    time: calendar.session_close(start + chrono::Duration::days(i)),
                    open: close - 0.1,
                    high: close + 0.5,
                    low: close - 0.5,
                    close,
                    volume: 1_000.0,
                }
            })
            .collect()
    }

    struct FixtureProvider {
        bars: Vec<RawBar>,
        fail_symbol: Option<String>,
    }

    #[async_trait]
    impl MarketDataProvider for FixtureProvider {
        async fn fetch_daily(
            &self,
            symbol: &str,
            from: NaiveDate,
            to: NaiveDate,
        ) -> Result<DailyFetch, MarketError> {
            if self.fail_symbol.as_deref() == Some(symbol) {
                return Err(MarketError::transport(Some(503), "upstream down"));
            }
            Ok(DailyFetch {
                bars: self
                    .bars
                    .iter()
                    .filter(|b| {
                        let d = b.time.date_naive();
                        d >= from && d <= to
                    })
                    .cloned()
                    .collect(),
                foreign: vec![],
            })
        }

        fn source(&self) -> DataSource {
            DataSource::Ssi
        }
    }

    fn target() -> NaiveDate {
        // Last fixture bar date.
        date(2024, 4, 10)
    }

    async fn orchestrator(
        db: &MarketDb,
        symbols: &[&str],
        fail_symbol: Option<&str>,
    ) -> Orchestrator {
        let provider = Arc::new(FixtureProvider {
            bars: fixture_bars(),
            fail_symbol: fail_symbol.map(String::from),
        });
        let ingestion = IngestionEngine::new(
            provider,
            PriceRepository::new(db.pool().clone()),
            ForeignFlowRepository::new(db.pool().clone()),
            TrackingRepository::new(db.pool().clone()),
            TradingCalendar::hose(),
            IngestionConfig {
                genesis: date(2023, 12, 1),
                ..IngestionConfig::default()
            },
        );

        Orchestrator::new(
            db,
            Arc::new(StaticUniverse::new(symbols.iter().copied())),
            ingestion,
            IndicatorConfig::default(),
            ScoringConfig::default(),
            AnalysisConfig::default(),
            OrchestratorConfig {
                batch_size: 2,
                symbol_delay: Duration::ZERO,
                batch_delay: Duration::ZERO,
            },
        )
    }

    #[tokio::test]
    async fn full_run_ingests_analyzes_and_persists() {
        let db = MarketDb::in_memory().await.unwrap();
        let orch = orchestrator(&db, &["ACB", "VCB"], None).await;

        let report = orch.run(target()).await.unwrap();
        assert!(!report.cancelled);
        assert_eq!(report.outcomes.len(), 2);
        assert_eq!(report.failed(), 0);
        assert_eq!(report.total_stored(), 200);
        assert!(report.total_signals() > 0);

        for outcome in &report.outcomes {
            let result_id = outcome.analysis_result_id.expect("analysis persisted");
            let analysis = AnalysisRepository::new(db.pool().clone());
            let row = analysis.get_result(result_id).await.unwrap().unwrap();
            assert_eq!(row.total_signals as usize, outcome.signals);
            assert!(row.indicator_calculation_id.is_some());

            let signals = analysis.signals_for_result(result_id).await.unwrap();
            assert_eq!(signals.len(), outcome.signals);
        }

        // Three config rows, one per type.
        let count: i64 = sqlx_scalar(&db, "SELECT COUNT(*) FROM analysis_configurations").await;
        assert_eq!(count, 3);
    }

    #[tokio::test]
    async fn rerun_reuses_configs_and_skips_unchanged_symbols() {
        let db = MarketDb::in_memory().await.unwrap();
        let orch = orchestrator(&db, &["ACB"], None).await;

        let first = orch.run(target()).await.unwrap();
        assert_eq!(first.total_stored(), 100);

        let second = orch.run(target()).await.unwrap();
        assert_eq!(second.total_stored(), 0);
        assert_eq!(second.total_signals(), 0);
        assert!(second.outcomes[0].analysis_result_id.is_none());

        let configs: i64 = sqlx_scalar(&db, "SELECT COUNT(*) FROM analysis_configurations").await;
        assert_eq!(configs, 3);
        let results: i64 = sqlx_scalar(&db, "SELECT COUNT(*) FROM analysis_results").await;
        assert_eq!(results, 1);
    }

    #[tokio::test]
    async fn one_failing_symbol_does_not_abort_the_batch() {
        let db = MarketDb::in_memory().await.unwrap();
        let orch = orchestrator(&db, &["ACB", "HPG"], Some("HPG")).await;

        let report = orch.run(target()).await.unwrap();
        assert_eq!(report.outcomes.len(), 2);
        assert_eq!(report.succeeded(), 1);
        assert_eq!(report.failed(), 1);

        let failed = report.outcomes.iter().find(|o| !o.is_ok()).unwrap();
        assert_eq!(failed.symbol, "HPG");
        assert!(failed.error.as_deref().unwrap().contains("503"));

        // The healthy symbol still got its analysis.
        let ok = report.outcomes.iter().find(|o| o.is_ok()).unwrap();
        assert!(ok.analysis_result_id.is_some());
    }

    #[tokio::test]
    async fn cancellation_stops_before_the_next_symbol() {
        let db = MarketDb::in_memory().await.unwrap();
        let orch = orchestrator(&db, &["ACB", "VCB"], None).await;

        orch.cancel_handle()
            .store(true, std::sync::atomic::Ordering::Relaxed);
        let report = orch.run(target()).await.unwrap();

        assert!(report.cancelled);
        assert!(report.outcomes.is_empty());

        // Nothing was ingested, so the next run starts from scratch.
        let prices: i64 = sqlx_scalar(&db, "SELECT COUNT(*) FROM stock_prices").await;
        assert_eq!(prices, 0);
    }

    async fn sqlx_scalar(db: &MarketDb, sql: &str) -> i64 {
        sqlx::query_scalar(sql).fetch_one(db.pool()).await.unwrap()
    }
}
