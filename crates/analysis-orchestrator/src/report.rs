use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Per-symbol outcome of one run. Failures carry the error message so
/// the report stays useful after the run ends.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolOutcome {
    pub symbol: String,
    pub fetched: u64,
    pub stored: u64,
    pub signals: usize,
    pub analysis_result_id: Option<i64>,
    pub error: Option<String>,
}

impl SymbolOutcome {
    pub fn failed(symbol: &str, error: impl Into<String>) -> Self {
        Self {
            symbol: symbol.to_string(),
            fetched: 0,
            stored: 0,
            signals: 0,
            analysis_result_id: None,
            error: Some(error.into()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Aggregate result of one orchestrator run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub target_end: NaiveDate,
    pub effective_end: NaiveDate,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub cancelled: bool,
    pub outcomes: Vec<SymbolOutcome>,
}

impl RunReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    pub fn total_stored(&self) -> u64 {
        self.outcomes.iter().map(|o| o.stored).sum()
    }

    pub fn total_signals(&self) -> usize {
        self.outcomes.iter().map(|o| o.signals).sum()
    }
}
