use chrono::{DateTime, NaiveDate, Utc};
use sqlx::SqlitePool;

use market_core::Bar;

use crate::models::PriceRow;

/// Upserts and queries over `stock_prices`. Rows are keyed by
/// `(symbol, time)`; re-ingesting a bar overwrites the numeric fields and
/// bumps `updated_at` while `created_at` stays put.
#[derive(Clone)]
pub struct PriceRepository {
    pool: SqlitePool,
}

impl PriceRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Upsert a batch of sanitized bars in one transaction.
    /// Returns the number of rows written.
    pub async fn upsert_bars(&self, bars: &[Bar]) -> Result<u64, sqlx::Error> {
        if bars.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        let now = Utc::now();
        for bar in bars {
            sqlx::query(
                r#"
                INSERT INTO stock_prices (symbol, time, open, high, low, close, volume, value, source, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(symbol, time) DO UPDATE SET
                    open = excluded.open,
                    high = excluded.high,
                    low = excluded.low,
                    close = excluded.close,
                    volume = excluded.volume,
                    value = excluded.value,
                    source = excluded.source,
                    updated_at = excluded.updated_at
                "#,
            )
            .bind(&bar.symbol)
            .bind(bar.time)
            .bind(bar.open)
            .bind(bar.high)
            .bind(bar.low)
            .bind(bar.close)
            .bind(bar.volume)
            .bind(bar.value())
            .bind(bar.source.as_str())
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        Ok(bars.len() as u64)
    }

    /// Latest stored bar time for a symbol, if any.
    pub async fn latest_time(&self, symbol: &str) -> Result<Option<DateTime<Utc>>, sqlx::Error> {
        sqlx::query_scalar("SELECT MAX(time) FROM stock_prices WHERE symbol = ?")
            .bind(symbol)
            .fetch_one(&self.pool)
            .await
    }

    /// Bars in `[from, to]` ascending by time.
    pub async fn bars_between(
        &self,
        symbol: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Bar>, sqlx::Error> {
        let rows: Vec<PriceRow> = sqlx::query_as(
            "SELECT * FROM stock_prices WHERE symbol = ? AND time >= ? AND time <= ? ORDER BY time ASC",
        )
        .bind(symbol)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(PriceRow::to_bar).collect())
    }

    /// All bars for a symbol ascending by time.
    pub async fn bars_for_symbol(&self, symbol: &str) -> Result<Vec<Bar>, sqlx::Error> {
        let rows: Vec<PriceRow> =
            sqlx::query_as("SELECT * FROM stock_prices WHERE symbol = ? ORDER BY time ASC")
                .bind(symbol)
                .fetch_all(&self.pool)
                .await?;

        Ok(rows.iter().map(PriceRow::to_bar).collect())
    }

    /// Raw rows including bookkeeping columns, ascending by time.
    pub async fn rows_for_symbol(&self, symbol: &str) -> Result<Vec<PriceRow>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM stock_prices WHERE symbol = ? ORDER BY time ASC")
            .bind(symbol)
            .fetch_all(&self.pool)
            .await
    }

    pub async fn count_for_symbol(&self, symbol: &str) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM stock_prices WHERE symbol = ?")
            .bind(symbol)
            .fetch_one(&self.pool)
            .await
    }

    /// Explicit retention: drop bars strictly before `cutoff`.
    pub async fn purge_before(
        &self,
        symbol: &str,
        cutoff: NaiveDate,
    ) -> Result<u64, sqlx::Error> {
        let cutoff_time = cutoff
            .and_hms_opt(0, 0, 0)
            .expect("midnight is always valid")
            .and_utc();
        let result = sqlx::query("DELETE FROM stock_prices WHERE symbol = ? AND time < ?")
            .bind(symbol)
            .bind(cutoff_time)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MarketDb;
    use chrono::TimeZone;
    use market_core::DataSource;

    fn bar(symbol: &str, day: u32, close: f64) -> Bar {
        Bar {
            symbol: symbol.into(),
            time: Utc.with_ymd_and_hms(2024, 1, day, 8, 0, 0).unwrap(),
            open: close - 0.5,
            high: close + 1.0,
            low: close - 1.0,
            close,
            volume: 1_000,
            source: DataSource::Ssi,
        }
    }

    #[tokio::test]
    async fn upsert_then_query_round_trips() {
        let db = MarketDb::in_memory().await.unwrap();
        let repo = PriceRepository::new(db.pool().clone());

        let bars = vec![bar("ACB", 2, 10.5), bar("ACB", 3, 10.4)];
        assert_eq!(repo.upsert_bars(&bars).await.unwrap(), 2);

        let stored = repo.bars_for_symbol("ACB").await.unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].close, 10.5);
        assert!((stored[0].value() - 10_500.0).abs() < 1e-9);

        let latest = repo.latest_time("ACB").await.unwrap().unwrap();
        assert_eq!(latest, bars[1].time);
    }

    #[tokio::test]
    async fn reupsert_overwrites_values_but_keeps_created_at() {
        let db = MarketDb::in_memory().await.unwrap();
        let repo = PriceRepository::new(db.pool().clone());

        repo.upsert_bars(&[bar("ACB", 2, 10.5)]).await.unwrap();
        let before = repo.rows_for_symbol("ACB").await.unwrap();

        let mut updated = bar("ACB", 2, 11.0);
        updated.volume = 2_000;
        repo.upsert_bars(&[updated]).await.unwrap();

        let after = repo.rows_for_symbol("ACB").await.unwrap();
        assert_eq!(after.len(), 1);
        assert_eq!(after[0].close, 11.0);
        assert_eq!(after[0].volume, 2_000);
        assert_eq!(after[0].created_at, before[0].created_at);
    }

    #[tokio::test]
    async fn latest_time_is_none_for_unknown_symbol() {
        let db = MarketDb::in_memory().await.unwrap();
        let repo = PriceRepository::new(db.pool().clone());
        assert!(repo.latest_time("VCB").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn purge_before_drops_old_rows_only() {
        let db = MarketDb::in_memory().await.unwrap();
        let repo = PriceRepository::new(db.pool().clone());

        repo.upsert_bars(&[bar("ACB", 2, 10.0), bar("ACB", 10, 11.0)])
            .await
            .unwrap();
        let purged = repo
            .purge_before("ACB", NaiveDate::from_ymd_opt(2024, 1, 5).unwrap())
            .await
            .unwrap();

        assert_eq!(purged, 1);
        assert_eq!(repo.count_for_symbol("ACB").await.unwrap(), 1);
    }
}
