use async_trait::async_trait;
use chrono::NaiveDate;

use crate::{DailyFetch, DataSource, MarketError, UniverseEntry};

/// Abstract upstream source of daily bars and foreign-flow aggregates.
///
/// Implementations may paginate or window internally; callers consume the
/// merged result. An empty `DailyFetch` is a valid answer for ranges with
/// no sessions.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    async fn fetch_daily(
        &self,
        symbol: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<DailyFetch, MarketError>;

    fn source(&self) -> DataSource;
}

/// Yields the active symbol universe. Must be stable for the duration of
/// one orchestrator run.
#[async_trait]
pub trait SymbolUniverseProvider: Send + Sync {
    async fn active_symbols(&self) -> Result<Vec<UniverseEntry>, MarketError>;
}

/// Fixed in-memory universe, used by the CLI `--symbols` path and tests.
pub struct StaticUniverse {
    entries: Vec<UniverseEntry>,
}

impl StaticUniverse {
    pub fn new<I, S>(symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            entries: symbols.into_iter().map(UniverseEntry::new).collect(),
        }
    }
}

#[async_trait]
impl SymbolUniverseProvider for StaticUniverse {
    async fn active_symbols(&self) -> Result<Vec<UniverseEntry>, MarketError> {
        Ok(self.entries.clone())
    }
}
