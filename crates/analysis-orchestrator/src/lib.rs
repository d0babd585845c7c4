//! Batched pipeline driver: universe resolution, config bookkeeping,
//! ingestion, then the indicator/scoring/signal pipeline per symbol,
//! with inter-symbol and inter-batch pacing to respect upstream rate
//! budgets.

pub mod report;

#[cfg(test)]
mod orchestrator_tests;

pub use report::{RunReport, SymbolOutcome};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{NaiveDate, Utc};

use ingestion_engine::IngestionEngine;
use market_core::{
    ConfigType, MarketError, SymbolUniverseProvider, TradingCalendar,
};
use market_store::{
    AnalysisRepository, ConfigRepository, DataInfo, MarketDb, NewAnalysisResult,
    NewIndicatorCalculation, PriceRepository, UniverseRepository,
};
use signal_engine::{AnalysisConfig, ScoringConfig, ScoringEngine, SignalEngine, SignalSummary};
use technical_indicators::{IndicatorConfig, IndicatorEngine};

/// Pacing and batching knobs.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub batch_size: usize,
    pub symbol_delay: Duration,
    pub batch_delay: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            batch_size: 5,
            symbol_delay: Duration::from_secs(2),
            batch_delay: Duration::from_secs(5),
        }
    }
}

/// Resolved configuration row ids for one run.
#[derive(Debug, Clone, Copy)]
struct ConfigIds {
    indicator: i64,
    scoring: i64,
    analysis: i64,
}

pub struct Orchestrator {
    universe: Arc<dyn SymbolUniverseProvider>,
    ingestion: IngestionEngine,
    signal_engine: SignalEngine,
    prices: PriceRepository,
    configs: ConfigRepository,
    analysis: AnalysisRepository,
    stocks: UniverseRepository,
    calendar: TradingCalendar,
    indicator_config: IndicatorConfig,
    scoring_config: ScoringConfig,
    analysis_config: AnalysisConfig,
    config: OrchestratorConfig,
    stop: Arc<AtomicBool>,
}

impl Orchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        db: &MarketDb,
        universe: Arc<dyn SymbolUniverseProvider>,
        ingestion: IngestionEngine,
        indicator_config: IndicatorConfig,
        scoring_config: ScoringConfig,
        analysis_config: AnalysisConfig,
        config: OrchestratorConfig,
    ) -> Self {
        let signal_engine = SignalEngine::new(
            IndicatorEngine::new(indicator_config.clone()),
            ScoringEngine::new(scoring_config.clone()),
        );

        Self {
            universe,
            ingestion,
            signal_engine,
            prices: PriceRepository::new(db.pool().clone()),
            configs: ConfigRepository::new(db.pool().clone()),
            analysis: AnalysisRepository::new(db.pool().clone()),
            stocks: UniverseRepository::new(db.pool().clone()),
            calendar: TradingCalendar::hose(),
            indicator_config,
            scoring_config,
            analysis_config,
            config,
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Flag checked between symbols; in-flight transactions roll back on
    /// drop and watermarks are left untouched, so a cancelled run resumes
    /// cleanly.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        self.stop.clone()
    }

    /// Drive ingestion and analysis across the universe.
    pub async fn run(&self, target_end: NaiveDate) -> Result<RunReport, MarketError> {
        let started_at = Utc::now();
        let effective_end = self.calendar.effective_end(started_at, target_end);

        let entries = self.universe.active_symbols().await?;
        let symbols: Vec<String> = entries.iter().map(|e| e.symbol.clone()).collect();
        tracing::info!(universe = symbols.len(), %target_end, %effective_end, "starting run");

        let config_ids = self.ensure_configs().await?;

        let mut outcomes = Vec::with_capacity(symbols.len());
        let mut cancelled = false;

        'batches: for (batch_index, batch) in symbols.chunks(self.config.batch_size).enumerate()
        {
            if batch_index > 0 {
                tokio::time::sleep(self.config.batch_delay).await;
            }
            tracing::info!(batch = batch_index + 1, size = batch.len(), "processing batch");

            for (i, symbol) in batch.iter().enumerate() {
                if self.stop.load(Ordering::Relaxed) {
                    tracing::warn!("cancellation requested, stopping run");
                    cancelled = true;
                    break 'batches;
                }
                if i > 0 {
                    tokio::time::sleep(self.config.symbol_delay).await;
                }

                let outcome = self
                    .process_symbol(symbol, target_end, effective_end, config_ids)
                    .await;
                if let Some(err) = &outcome.error {
                    tracing::warn!(symbol, error = %err, "symbol failed, continuing");
                }
                outcomes.push(outcome);
            }
        }

        let report = RunReport {
            target_end,
            effective_end,
            started_at,
            finished_at: Utc::now(),
            cancelled,
            outcomes,
        };
        tracing::info!(
            succeeded = report.succeeded(),
            failed = report.failed(),
            stored = report.total_stored(),
            signals = report.total_signals(),
            "run finished"
        );
        Ok(report)
    }

    /// Find-or-create the three config rows by content hash. Failures
    /// here are fatal for the run.
    async fn ensure_configs(&self) -> Result<ConfigIds, MarketError> {
        let indicator = serde_json::to_value(&self.indicator_config)
            .map_err(|e| MarketError::ConfigResolution(e.to_string()))?;
        let scoring = serde_json::to_value(&self.scoring_config)
            .map_err(|e| MarketError::ConfigResolution(e.to_string()))?;
        let analysis = serde_json::to_value(&self.analysis_config)
            .map_err(|e| MarketError::ConfigResolution(e.to_string()))?;

        self.scoring_config
            .validate()
            .map_err(MarketError::ConfigResolution)?;

        let indicator = self
            .configs
            .ensure("default-indicator", ConfigType::Indicator, None, &indicator)
            .await
            .map_err(|e| MarketError::ConfigResolution(e.to_string()))?;
        let scoring = self
            .configs
            .ensure("default-scoring", ConfigType::Scoring, None, &scoring)
            .await
            .map_err(|e| MarketError::ConfigResolution(e.to_string()))?;
        let analysis = self
            .configs
            .ensure("default-analysis", ConfigType::Analysis, None, &analysis)
            .await
            .map_err(|e| MarketError::ConfigResolution(e.to_string()))?;

        Ok(ConfigIds {
            indicator: indicator.id,
            scoring: scoring.id,
            analysis: analysis.id,
        })
    }

    async fn process_symbol(
        &self,
        symbol: &str,
        target_end: NaiveDate,
        effective_end: NaiveDate,
        config_ids: ConfigIds,
    ) -> SymbolOutcome {
        if let Err(e) = self.stocks.ensure_stock(symbol).await {
            return SymbolOutcome::failed(symbol, e.to_string());
        }

        let ingest = match self.ingestion.ingest(symbol, target_end).await {
            Ok(outcome) => outcome,
            Err(e) => return SymbolOutcome::failed(symbol, e.to_string()),
        };

        let mut outcome = SymbolOutcome {
            symbol: symbol.to_string(),
            fetched: ingest.fetched,
            stored: ingest.stored,
            signals: 0,
            analysis_result_id: None,
            error: None,
        };

        // Analysis only runs over fresh data; an unchanged symbol keeps
        // its previous results.
        if ingest.stored == 0 {
            tracing::debug!(symbol, "no new bars, skipping analysis");
            return outcome;
        }

        match self
            .analyze_symbol(symbol, effective_end, config_ids)
            .await
        {
            Ok(Some((result_id, signal_count))) => {
                outcome.analysis_result_id = Some(result_id);
                outcome.signals = signal_count;
            }
            Ok(None) => {
                tracing::debug!(symbol, "not enough history for analysis");
            }
            Err(e) => outcome.error = Some(e.to_string()),
        }

        outcome
    }

    /// Indicator -> scoring -> signal pipeline over the last
    /// `lookback_days`, persisted in a single transaction.
    async fn analyze_symbol(
        &self,
        symbol: &str,
        effective_end: NaiveDate,
        config_ids: ConfigIds,
    ) -> Result<Option<(i64, usize)>, MarketError> {
        let bars = self
            .prices
            .bars_for_symbol(symbol)
            .await
            .map_err(|e| MarketError::Persistence(e.to_string()))?;

        let calc_started = Instant::now();
        let frame = match self.signal_engine.indicator_engine().compute(&bars) {
            Ok(frame) => frame,
            Err(MarketError::InsufficientData(_)) => return Ok(None),
            Err(e) => return Err(e),
        };
        let calc_duration = calc_started.elapsed().as_millis() as i64;

        // Scan only the analysis window; earlier bars exist for warm-up.
        let window_start =
            effective_end - chrono::Duration::days(self.analysis_config.lookback_days);
        let start_index = bars
            .iter()
            .position(|b| b.time.date_naive() >= window_start)
            .unwrap_or(bars.len());

        let scan_started = Instant::now();
        let signals = self.signal_engine.scan_frame(
            &frame,
            start_index,
            self.analysis_config.min_score_threshold,
        );
        let scan_duration = scan_started.elapsed().as_millis() as i64;

        let summary = SignalSummary::from_signals(&signals);
        let snapshot = frame.snapshot(frame.len() - 1);
        let data_info = DataInfo {
            total_rows: bars.len() as i64,
            start_date: bars.first().map(|b| b.time),
            end_date: bars.last().map(|b| b.time),
            data_source: bars
                .first()
                .map(|b| b.source.as_str().to_string())
                .unwrap_or_default(),
        };

        let result_id = self
            .analysis
            .persist_analysis(
                NewIndicatorCalculation {
                    symbol,
                    calculation_date: effective_end,
                    config_id: config_ids.indicator,
                    indicators: &snapshot,
                    data_points: frame.len() as i64,
                    start_date: bars.first().map(|b| b.time.date_naive()),
                    end_date: bars.last().map(|b| b.time.date_naive()),
                    duration_ms: calc_duration,
                },
                NewAnalysisResult {
                    symbol,
                    analysis_date: effective_end,
                    indicator_calculation_id: None,
                    indicator_config_id: config_ids.indicator,
                    scoring_config_id: config_ids.scoring,
                    analysis_config_id: config_ids.analysis,
                    summary: &summary,
                    duration_ms: scan_duration,
                    data_info: &data_info,
                },
                &signals,
            )
            .await
            .map_err(|e| MarketError::Persistence(e.to_string()))?;

        Ok(Some((result_id, signals.len())))
    }
}
