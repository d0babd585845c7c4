use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::env;

/// Process configuration, assembled from the environment. Every knob has
/// a conservative default so a bare `market-agent` run works against a
/// local SQLite file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    // Database
    pub database_url: String,

    // Universe: explicit list, or empty to use the universe table
    pub symbols: Vec<String>,

    // Ingestion
    pub genesis_date: NaiveDate,       // 2010-01-01
    pub window_days: i64,              // 365-day backward stride
    pub max_empty_windows: u32,        // stop after 3 empty windows

    // Upstream client
    pub ssi_base_url: Option<String>,
    pub requests_per_minute: usize,    // 60

    // Orchestration
    pub batch_size: usize,             // 5
    pub symbol_delay_seconds: u64,     // 2
    pub batch_delay_seconds: u64,      // 5

    // Analysis
    pub min_score_threshold: f64,      // 10.0
    pub lookback_days: i64,            // 60
}

impl AgentConfig {
    pub fn from_env() -> Result<Self> {
        let config = Self {
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite:stockvn.db".to_string()),

            symbols: env::var("SYMBOLS")
                .unwrap_or_default()
                .split(',')
                .map(|s| s.trim().to_uppercase())
                .filter(|s| !s.is_empty())
                .collect(),

            genesis_date: env::var("GENESIS_DATE")
                .unwrap_or_else(|_| "2010-01-01".to_string())
                .parse()
                .context("GENESIS_DATE must be YYYY-MM-DD")?,
            window_days: env::var("FETCH_WINDOW_DAYS")
                .unwrap_or_else(|_| "365".to_string())
                .parse()?,
            max_empty_windows: env::var("MAX_EMPTY_WINDOWS")
                .unwrap_or_else(|_| "3".to_string())
                .parse()?,

            ssi_base_url: env::var("SSI_BASE_URL").ok(),
            requests_per_minute: env::var("SSI_RATE_LIMIT")
                .unwrap_or_else(|_| "60".to_string())
                .parse()?,

            batch_size: env::var("BATCH_SIZE")
                .unwrap_or_else(|_| "5".to_string())
                .parse()?,
            symbol_delay_seconds: env::var("SYMBOL_DELAY_SECONDS")
                .unwrap_or_else(|_| "2".to_string())
                .parse()?,
            batch_delay_seconds: env::var("BATCH_DELAY_SECONDS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()?,

            min_score_threshold: env::var("MIN_SCORE_THRESHOLD")
                .unwrap_or_else(|_| "10.0".to_string())
                .parse()?,
            lookback_days: env::var("ANALYSIS_LOOKBACK_DAYS")
                .unwrap_or_else(|_| "60".to_string())
                .parse()?,
        };

        Ok(config)
    }
}
