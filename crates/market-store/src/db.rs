use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;

/// Shared SQLite handle. Bootstraps the schema on connect.
#[derive(Clone)]
pub struct MarketDb {
    pool: SqlitePool,
}

impl MarketDb {
    /// Connect (creating the file if missing) and initialize the schema.
    /// The orchestrator sizes the pool at batch size + 2.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        // WAL lets ingestion writers and analysis readers coexist; both
        // pragmas are per-connection, so they belong in the options.
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.init_schema().await?;
        Ok(db)
    }

    /// In-memory database for tests. Single connection so every query
    /// sees the same store.
    pub async fn in_memory() -> Result<Self, sqlx::Error> {
        Self::connect("sqlite::memory:", 1).await
    }

    async fn init_schema(&self) -> Result<(), sqlx::Error> {
        let schema = include_str!("../../../schema.sql");

        // sqlx executes one statement per query; split on the terminator.
        for statement in schema.split(';') {
            let stmt = statement.trim();
            if !stmt.is_empty() {
                sqlx::query(stmt).execute(&self.pool).await?;
            }
        }

        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn schema_bootstraps_on_connect() {
        let db = MarketDb::in_memory().await.unwrap();
        let tables: Vec<(String,)> = sqlx::query_as(
            "SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name",
        )
        .fetch_all(db.pool())
        .await
        .unwrap();

        let names: Vec<&str> = tables.iter().map(|(n,)| n.as_str()).collect();
        for expected in [
            "analysis_configurations",
            "analysis_results",
            "foreign_trades",
            "indicator_calculations",
            "signal_results",
            "stock_prices",
            "stock_update_tracking",
            "stocks",
            "universe_entries",
        ] {
            assert!(names.contains(&expected), "missing table {expected}");
        }
    }
}
