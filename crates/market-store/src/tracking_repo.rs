use chrono::{NaiveDate, Utc};
use sqlx::SqlitePool;

use market_core::{DataSource, Watermark};

use crate::models::TrackingRow;

/// Watermark store over `stock_update_tracking`.
///
/// `last_updated_date` is monotonic non-decreasing under `advance`;
/// `fail` records the error without touching the date, so the next run
/// retries the same window.
#[derive(Clone)]
pub struct TrackingRepository {
    pool: SqlitePool,
}

impl TrackingRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Fetch the watermark, creating it at `genesis` with PENDING status
    /// the first time a (symbol, source) pair is touched.
    pub async fn get_or_create(
        &self,
        symbol: &str,
        source: DataSource,
        genesis: NaiveDate,
    ) -> Result<Watermark, sqlx::Error> {
        let symbol = symbol.to_uppercase();

        sqlx::query(
            r#"
            INSERT INTO stock_update_tracking (symbol, source, last_updated_date, total_records, last_update_status, updated_at)
            VALUES (?, ?, ?, 0, 'PENDING', ?)
            ON CONFLICT(symbol, source) DO NOTHING
            "#,
        )
        .bind(&symbol)
        .bind(source.as_str())
        .bind(genesis)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        let row: TrackingRow = sqlx::query_as(
            "SELECT * FROM stock_update_tracking WHERE symbol = ? AND source = ?",
        )
        .bind(&symbol)
        .bind(source.as_str())
        .fetch_one(&self.pool)
        .await?;

        Ok(row.to_watermark())
    }

    /// Record a successful update: the date never moves backwards, the
    /// record count accumulates, the error is cleared.
    pub async fn advance(
        &self,
        symbol: &str,
        source: DataSource,
        last_date: NaiveDate,
        records: i64,
        duration_seconds: i64,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE stock_update_tracking SET
                last_updated_date = MAX(last_updated_date, ?),
                total_records = total_records + ?,
                last_update_status = 'SUCCESS',
                last_error_message = NULL,
                last_update_duration_seconds = ?,
                updated_at = ?
            WHERE symbol = ? AND source = ?
            "#,
        )
        .bind(last_date)
        .bind(records)
        .bind(duration_seconds)
        .bind(Utc::now())
        .bind(symbol.to_uppercase())
        .bind(source.as_str())
        .execute(&self.pool)
        .await?;

        tracing::debug!(symbol, source = source.as_str(), %last_date, records, "watermark advanced");
        Ok(())
    }

    /// Record a failed update. The date stays put.
    pub async fn fail(
        &self,
        symbol: &str,
        source: DataSource,
        message: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE stock_update_tracking SET
                last_update_status = 'ERROR',
                last_error_message = ?,
                updated_at = ?
            WHERE symbol = ? AND source = ?
            "#,
        )
        .bind(message)
        .bind(Utc::now())
        .bind(symbol.to_uppercase())
        .bind(source.as_str())
        .execute(&self.pool)
        .await?;

        tracing::warn!(symbol, source = source.as_str(), message, "watermark marked ERROR");
        Ok(())
    }

    pub async fn get(
        &self,
        symbol: &str,
        source: DataSource,
    ) -> Result<Option<Watermark>, sqlx::Error> {
        let row: Option<TrackingRow> = sqlx::query_as(
            "SELECT * FROM stock_update_tracking WHERE symbol = ? AND source = ?",
        )
        .bind(symbol.to_uppercase())
        .bind(source.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.to_watermark()))
    }

    /// Every watermark, optionally restricted to one source. Feeds the
    /// run report.
    pub async fn list(&self, source: Option<DataSource>) -> Result<Vec<Watermark>, sqlx::Error> {
        let rows: Vec<TrackingRow> = match source {
            Some(src) => {
                sqlx::query_as(
                    "SELECT * FROM stock_update_tracking WHERE source = ? ORDER BY symbol",
                )
                .bind(src.as_str())
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as("SELECT * FROM stock_update_tracking ORDER BY symbol, source")
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        Ok(rows.iter().map(TrackingRow::to_watermark).collect())
    }
}
