use async_trait::async_trait;
use sqlx::SqlitePool;

use market_core::{MarketError, SymbolUniverseProvider, UniverseEntry};

use crate::models::{StockRow, UniverseRow};

/// Universe membership over `universe_entries`, plus the `stocks`
/// metadata rows each member references.
#[derive(Clone)]
pub struct UniverseRepository {
    pool: SqlitePool,
}

impl UniverseRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn upsert_entries(&self, entries: &[UniverseEntry]) -> Result<u64, sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        for entry in entries {
            sqlx::query(
                r#"
                INSERT INTO universe_entries
                    (symbol, rank, sector, tier, status, first_appeared, weeks_active, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, datetime('now'))
                ON CONFLICT(symbol) DO UPDATE SET
                    rank = excluded.rank,
                    sector = excluded.sector,
                    tier = excluded.tier,
                    status = excluded.status,
                    weeks_active = excluded.weeks_active,
                    updated_at = excluded.updated_at
                "#,
            )
            .bind(&entry.symbol)
            .bind(entry.rank)
            .bind(&entry.sector)
            .bind(&entry.tier)
            .bind(entry.status.as_str())
            .bind(entry.first_appeared)
            .bind(entry.weeks_active)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(entries.len() as u64)
    }

    /// Members currently eligible for processing (NEW or ACTIVE), rank
    /// order first.
    pub async fn active_entries(&self) -> Result<Vec<UniverseEntry>, sqlx::Error> {
        let rows: Vec<UniverseRow> = sqlx::query_as(
            r#"
            SELECT * FROM universe_entries
            WHERE status IN ('NEW', 'ACTIVE')
            ORDER BY rank IS NULL, rank, symbol
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(UniverseRow::to_entry).collect())
    }

    pub async fn all_entries(&self) -> Result<Vec<UniverseEntry>, sqlx::Error> {
        let rows: Vec<UniverseRow> =
            sqlx::query_as("SELECT * FROM universe_entries ORDER BY symbol")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.iter().map(UniverseRow::to_entry).collect())
    }

    /// Flag symbols that dropped out of the latest membership snapshot.
    pub async fn mark_inactive_except(&self, keep: &[String]) -> Result<u64, sqlx::Error> {
        let placeholders = if keep.is_empty() {
            "''".to_string()
        } else {
            vec!["?"; keep.len()].join(", ")
        };
        let sql = format!(
            "UPDATE universe_entries SET status = 'INACTIVE', updated_at = datetime('now') \
             WHERE symbol NOT IN ({placeholders}) AND status != 'INACTIVE'"
        );

        let mut query = sqlx::query(&sql);
        for symbol in keep {
            query = query.bind(symbol);
        }
        let result = query.execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    /// Minimal `stocks` row so price rows always have a parent symbol.
    pub async fn ensure_stock(&self, symbol: &str) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO stocks (symbol, name) VALUES (?, ?)
            ON CONFLICT(symbol) DO NOTHING
            "#,
        )
        .bind(symbol.to_uppercase())
        .bind(symbol.to_uppercase())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn upsert_stock(
        &self,
        symbol: &str,
        name: &str,
        exchange: &str,
        sector: Option<&str>,
        tier: Option<&str>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO stocks (symbol, name, exchange, sector, tier, updated_at)
            VALUES (?, ?, ?, ?, ?, datetime('now'))
            ON CONFLICT(symbol) DO UPDATE SET
                name = excluded.name,
                exchange = excluded.exchange,
                sector = excluded.sector,
                tier = excluded.tier,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(symbol.to_uppercase())
        .bind(name)
        .bind(exchange)
        .bind(sector)
        .bind(tier)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_stock(&self, symbol: &str) -> Result<Option<StockRow>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM stocks WHERE symbol = ?")
            .bind(symbol.to_uppercase())
            .fetch_optional(&self.pool)
            .await
    }
}

/// Universe provider backed by the `universe_entries` table.
pub struct DbUniverse {
    repo: UniverseRepository,
}

impl DbUniverse {
    pub fn new(repo: UniverseRepository) -> Self {
        Self { repo }
    }
}

#[async_trait]
impl SymbolUniverseProvider for DbUniverse {
    async fn active_symbols(&self) -> Result<Vec<UniverseEntry>, MarketError> {
        self.repo
            .active_entries()
            .await
            .map_err(|e| MarketError::Persistence(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MarketDb;
    use market_core::UniverseStatus;

    fn entry(symbol: &str, rank: i64, status: UniverseStatus) -> UniverseEntry {
        UniverseEntry {
            rank: Some(rank),
            status,
            ..UniverseEntry::new(symbol)
        }
    }

    #[tokio::test]
    async fn active_entries_filters_and_orders_by_rank() {
        let db = MarketDb::in_memory().await.unwrap();
        let repo = UniverseRepository::new(db.pool().clone());

        repo.upsert_entries(&[
            entry("VCB", 2, UniverseStatus::Active),
            entry("ACB", 1, UniverseStatus::Active),
            entry("XYZ", 3, UniverseStatus::Inactive),
            entry("HPG", 4, UniverseStatus::New),
        ])
        .await
        .unwrap();

        let active = repo.active_entries().await.unwrap();
        let symbols: Vec<&str> = active.iter().map(|e| e.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["ACB", "VCB", "HPG"]);
    }

    #[tokio::test]
    async fn mark_inactive_except_flags_dropped_members() {
        let db = MarketDb::in_memory().await.unwrap();
        let repo = UniverseRepository::new(db.pool().clone());

        repo.upsert_entries(&[
            entry("ACB", 1, UniverseStatus::Active),
            entry("VCB", 2, UniverseStatus::Active),
        ])
        .await
        .unwrap();

        let flagged = repo
            .mark_inactive_except(&["ACB".to_string()])
            .await
            .unwrap();
        assert_eq!(flagged, 1);

        let active = repo.active_entries().await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].symbol, "ACB");
    }

    #[tokio::test]
    async fn db_universe_serves_active_entries() {
        let db = MarketDb::in_memory().await.unwrap();
        let repo = UniverseRepository::new(db.pool().clone());
        repo.upsert_entries(&[entry("ACB", 1, UniverseStatus::Active)])
            .await
            .unwrap();

        let provider = DbUniverse::new(repo);
        let entries = provider.active_symbols().await.unwrap();
        assert_eq!(entries.len(), 1);
    }

    #[tokio::test]
    async fn ensure_stock_is_idempotent() {
        let db = MarketDb::in_memory().await.unwrap();
        let repo = UniverseRepository::new(db.pool().clone());

        repo.ensure_stock("acb").await.unwrap();
        repo.upsert_stock("ACB", "Asia Commercial Bank", "HOSE", Some("Banking"), None)
            .await
            .unwrap();
        repo.ensure_stock("ACB").await.unwrap();

        let stock = repo.get_stock("ACB").await.unwrap().unwrap();
        assert_eq!(stock.name, "Asia Commercial Bank");
    }
}
