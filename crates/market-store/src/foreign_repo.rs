use chrono::Utc;
use sqlx::SqlitePool;

use market_core::ForeignFlow;

use crate::models::ForeignTradeRow;

/// Upserts and queries over `foreign_trades`, keyed by `(symbol, time)`.
/// Net columns are derived on write so readers never recompute them.
#[derive(Clone)]
pub struct ForeignFlowRepository {
    pool: SqlitePool,
}

impl ForeignFlowRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn upsert_flows(&self, flows: &[ForeignFlow]) -> Result<u64, sqlx::Error> {
        if flows.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        let now = Utc::now();
        for flow in flows {
            sqlx::query(
                r#"
                INSERT INTO foreign_trades
                    (symbol, time, buy_volume, sell_volume, net_volume, buy_value, sell_value, net_value, source, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(symbol, time) DO UPDATE SET
                    buy_volume = excluded.buy_volume,
                    sell_volume = excluded.sell_volume,
                    net_volume = excluded.net_volume,
                    buy_value = excluded.buy_value,
                    sell_value = excluded.sell_value,
                    net_value = excluded.net_value,
                    source = excluded.source,
                    updated_at = excluded.updated_at
                "#,
            )
            .bind(&flow.symbol)
            .bind(flow.time)
            .bind(flow.buy_volume)
            .bind(flow.sell_volume)
            .bind(flow.net_volume())
            .bind(flow.buy_value)
            .bind(flow.sell_value)
            .bind(flow.net_value())
            .bind(flow.source.as_str())
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        Ok(flows.len() as u64)
    }

    pub async fn flows_for_symbol(&self, symbol: &str) -> Result<Vec<ForeignFlow>, sqlx::Error> {
        let rows: Vec<ForeignTradeRow> =
            sqlx::query_as("SELECT * FROM foreign_trades WHERE symbol = ? ORDER BY time ASC")
                .bind(symbol)
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.iter().map(ForeignTradeRow::to_flow).collect())
    }

    pub async fn rows_for_symbol(
        &self,
        symbol: &str,
    ) -> Result<Vec<ForeignTradeRow>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM foreign_trades WHERE symbol = ? ORDER BY time ASC")
            .bind(symbol)
            .fetch_all(&self.pool)
            .await
    }

    pub async fn count_for_symbol(&self, symbol: &str) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM foreign_trades WHERE symbol = ?")
            .bind(symbol)
            .fetch_one(&self.pool)
            .await
    }
}
