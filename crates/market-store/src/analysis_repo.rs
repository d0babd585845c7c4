use chrono::NaiveDate;
use sqlx::{Sqlite, SqlitePool, Transaction};

use market_core::TradingSignal;

use crate::models::{
    AnalysisResultRow, IndicatorCalculationRow, NewAnalysisResult, NewIndicatorCalculation,
    SignalRow,
};

/// Persistence of calculation runs, analysis results and signals, all
/// cross-referenced to the configuration rows that produced them.
#[derive(Clone)]
pub struct AnalysisRepository {
    pool: SqlitePool,
}

impl AnalysisRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Store one symbol's analysis output in a single transaction:
    /// indicator calculation, analysis result, and the individual
    /// signals. Returns the analysis result id.
    pub async fn persist_analysis(
        &self,
        calculation: NewIndicatorCalculation<'_>,
        result: NewAnalysisResult<'_>,
        signals: &[TradingSignal],
    ) -> Result<i64, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let calculation_id = Self::upsert_calculation(&mut tx, &calculation).await?;
        let result = NewAnalysisResult {
            indicator_calculation_id: Some(calculation_id),
            ..result
        };
        let result_id = Self::upsert_result(&mut tx, &result).await?;
        Self::replace_signals(&mut tx, result_id, signals).await?;

        tx.commit().await?;
        Ok(result_id)
    }

    async fn upsert_calculation(
        tx: &mut Transaction<'_, Sqlite>,
        calc: &NewIndicatorCalculation<'_>,
    ) -> Result<i64, sqlx::Error> {
        let indicators = serde_json::to_string(calc.indicators).unwrap_or_else(|_| "{}".into());

        let (id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO indicator_calculations
                (symbol, calculation_date, config_id, indicators, data_points, start_date, end_date, calculation_duration_ms)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(symbol, calculation_date, config_id) DO UPDATE SET
                indicators = excluded.indicators,
                data_points = excluded.data_points,
                start_date = excluded.start_date,
                end_date = excluded.end_date,
                calculation_duration_ms = excluded.calculation_duration_ms
            RETURNING id
            "#,
        )
        .bind(calc.symbol)
        .bind(calc.calculation_date)
        .bind(calc.config_id)
        .bind(indicators)
        .bind(calc.data_points)
        .bind(calc.start_date)
        .bind(calc.end_date)
        .bind(calc.duration_ms)
        .fetch_one(&mut **tx)
        .await?;

        Ok(id)
    }

    async fn upsert_result(
        tx: &mut Transaction<'_, Sqlite>,
        result: &NewAnalysisResult<'_>,
    ) -> Result<i64, sqlx::Error> {
        let summary = serde_json::to_string(result.summary).unwrap_or_else(|_| "{}".into());
        let data_info = serde_json::to_string(result.data_info).unwrap_or_else(|_| "{}".into());

        let (id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO analysis_results
                (symbol, analysis_date, indicator_calculation_id, indicator_config_id,
                 scoring_config_id, analysis_config_id,
                 total_signals, buy_signals, sell_signals, hold_signals,
                 avg_score, max_score, min_score,
                 analysis_duration_ms, data_info, summary)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(symbol, analysis_date, indicator_config_id, scoring_config_id, analysis_config_id)
            DO UPDATE SET
                indicator_calculation_id = excluded.indicator_calculation_id,
                total_signals = excluded.total_signals,
                buy_signals = excluded.buy_signals,
                sell_signals = excluded.sell_signals,
                hold_signals = excluded.hold_signals,
                avg_score = excluded.avg_score,
                max_score = excluded.max_score,
                min_score = excluded.min_score,
                analysis_duration_ms = excluded.analysis_duration_ms,
                data_info = excluded.data_info,
                summary = excluded.summary
            RETURNING id
            "#,
        )
        .bind(result.symbol)
        .bind(result.analysis_date)
        .bind(result.indicator_calculation_id)
        .bind(result.indicator_config_id)
        .bind(result.scoring_config_id)
        .bind(result.analysis_config_id)
        .bind(result.summary.total_signals)
        .bind(result.summary.buy_signals)
        .bind(result.summary.sell_signals)
        .bind(result.summary.hold_signals)
        .bind(result.summary.avg_score)
        .bind(result.summary.max_score)
        .bind(result.summary.min_score)
        .bind(result.duration_ms)
        .bind(data_info)
        .bind(summary)
        .fetch_one(&mut **tx)
        .await?;

        Ok(id)
    }

    /// Re-running an analysis replaces its signal rows wholesale, so a
    /// result never accumulates duplicates.
    async fn replace_signals(
        tx: &mut Transaction<'_, Sqlite>,
        analysis_result_id: i64,
        signals: &[TradingSignal],
    ) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM signal_results WHERE analysis_result_id = ?")
            .bind(analysis_result_id)
            .execute(&mut **tx)
            .await?;

        for signal in signals {
            sqlx::query(
                r#"
                INSERT INTO signal_results
                    (analysis_result_id, symbol, signal_date, signal_time, action, strength,
                     score, description, triggered_rules, context, indicators_at_signal, metadata)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(analysis_result_id)
            .bind(&signal.symbol)
            .bind(signal.time.date_naive())
            .bind(signal.time)
            .bind(signal.action.as_str())
            .bind(signal.strength.as_str())
            .bind(signal.score)
            .bind(&signal.description)
            .bind(serde_json::to_string(&signal.triggered_rules).unwrap_or_else(|_| "[]".into()))
            .bind(serde_json::to_string(&signal.context).unwrap_or_else(|_| "{}".into()))
            .bind(serde_json::to_string(&signal.indicators).unwrap_or_else(|_| "{}".into()))
            .bind(serde_json::to_string(&signal.metadata).unwrap_or_else(|_| "{}".into()))
            .execute(&mut **tx)
            .await?;
        }

        Ok(())
    }

    pub async fn get_result(&self, id: i64) -> Result<Option<AnalysisResultRow>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM analysis_results WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    /// Analysis history for a symbol, most recent first.
    pub async fn results_for_symbol(
        &self,
        symbol: &str,
        limit: i64,
    ) -> Result<Vec<AnalysisResultRow>, sqlx::Error> {
        sqlx::query_as(
            "SELECT * FROM analysis_results WHERE symbol = ? ORDER BY analysis_date DESC LIMIT ?",
        )
        .bind(symbol)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
    }

    pub async fn calculations_for_symbol(
        &self,
        symbol: &str,
        limit: i64,
    ) -> Result<Vec<IndicatorCalculationRow>, sqlx::Error> {
        sqlx::query_as(
            "SELECT * FROM indicator_calculations WHERE symbol = ? ORDER BY calculation_date DESC LIMIT ?",
        )
        .bind(symbol)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
    }

    /// Signal history for a symbol in `[from, to]`, ascending.
    pub async fn signals_for_symbol(
        &self,
        symbol: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<SignalRow>, sqlx::Error> {
        sqlx::query_as(
            r#"
            SELECT * FROM signal_results
            WHERE symbol = ? AND signal_date >= ? AND signal_date <= ?
            ORDER BY signal_time ASC
            "#,
        )
        .bind(symbol)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await
    }

    pub async fn signals_for_result(
        &self,
        analysis_result_id: i64,
    ) -> Result<Vec<SignalRow>, sqlx::Error> {
        sqlx::query_as(
            "SELECT * FROM signal_results WHERE analysis_result_id = ? ORDER BY signal_time ASC",
        )
        .bind(analysis_result_id)
        .fetch_all(&self.pool)
        .await
    }

    /// Signal counts by action, for the run report.
    pub async fn signal_counts(&self) -> Result<(i64, i64, i64), sqlx::Error> {
        let buy: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM signal_results WHERE action = 'BUY'")
                .fetch_one(&self.pool)
                .await?;
        let sell: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM signal_results WHERE action = 'SELL'")
                .fetch_one(&self.pool)
                .await?;
        let hold: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM signal_results WHERE action = 'HOLD'")
                .fetch_one(&self.pool)
                .await?;
        Ok((buy, sell, hold))
    }
}
