use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use market_core::{
    Bar, DataSource, ForeignFlow, IndicatorSnapshot, SignalSummary, UniverseEntry, UniverseStatus,
    UpdateStatus, Watermark,
};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct StockRow {
    pub symbol: String,
    pub name: String,
    pub exchange: String,
    pub sector: Option<String>,
    pub industry: Option<String>,
    pub tier: Option<String>,
    pub is_active: bool,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PriceRow {
    pub id: i64,
    pub symbol: String,
    pub time: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: i64,
    pub value: f64,
    pub source: String,
    pub created_at: String,
    pub updated_at: String,
}

impl PriceRow {
    pub fn to_bar(&self) -> Bar {
        Bar {
            symbol: self.symbol.clone(),
            time: self.time,
            open: self.open,
            high: self.high,
            low: self.low,
            close: self.close,
            volume: self.volume,
            source: self.source.parse().unwrap_or(DataSource::Ssi),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ForeignTradeRow {
    pub id: i64,
    pub symbol: String,
    pub time: DateTime<Utc>,
    pub buy_volume: i64,
    pub sell_volume: i64,
    pub net_volume: i64,
    pub buy_value: f64,
    pub sell_value: f64,
    pub net_value: f64,
    pub source: String,
    pub created_at: String,
    pub updated_at: String,
}

impl ForeignTradeRow {
    pub fn to_flow(&self) -> ForeignFlow {
        ForeignFlow {
            symbol: self.symbol.clone(),
            time: self.time,
            buy_volume: self.buy_volume,
            sell_volume: self.sell_volume,
            buy_value: self.buy_value,
            sell_value: self.sell_value,
            source: self.source.parse().unwrap_or(DataSource::Ssi),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct TrackingRow {
    pub id: i64,
    pub symbol: String,
    pub source: String,
    pub last_updated_date: NaiveDate,
    pub total_records: i64,
    pub last_update_status: String,
    pub last_error_message: Option<String>,
    pub last_update_duration_seconds: Option<i64>,
    pub created_at: String,
    pub updated_at: DateTime<Utc>,
}

impl TrackingRow {
    pub fn to_watermark(&self) -> Watermark {
        Watermark {
            symbol: self.symbol.clone(),
            source: self.source.parse().unwrap_or(DataSource::Ssi),
            last_updated_date: self.last_updated_date,
            total_records: self.total_records,
            last_update_status: self
                .last_update_status
                .parse()
                .unwrap_or(UpdateStatus::Pending),
            last_error_message: self.last_error_message.clone(),
            last_update_duration_seconds: self.last_update_duration_seconds,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ConfigRow {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub config_type: String,
    pub config_data: String,
    pub version: i64,
    pub is_active: bool,
    pub content_hash: String,
    pub created_by: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl ConfigRow {
    /// Deserialize the stored payload into a concrete config type.
    pub fn payload<T: serde::de::DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_str(&self.config_data)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct IndicatorCalculationRow {
    pub id: i64,
    pub symbol: String,
    pub calculation_date: NaiveDate,
    pub config_id: i64,
    pub indicators: String,
    pub data_points: i64,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub calculation_duration_ms: Option<i64>,
    pub created_at: String,
}

impl IndicatorCalculationRow {
    pub fn snapshot(&self) -> Result<IndicatorSnapshot, serde_json::Error> {
        serde_json::from_str(&self.indicators)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AnalysisResultRow {
    pub id: i64,
    pub symbol: String,
    pub analysis_date: NaiveDate,
    pub indicator_calculation_id: Option<i64>,
    pub indicator_config_id: i64,
    pub scoring_config_id: i64,
    pub analysis_config_id: i64,
    pub total_signals: i64,
    pub buy_signals: i64,
    pub sell_signals: i64,
    pub hold_signals: i64,
    pub avg_score: f64,
    pub max_score: f64,
    pub min_score: f64,
    pub analysis_duration_ms: Option<i64>,
    pub data_info: Option<String>,
    pub summary: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct SignalRow {
    pub id: i64,
    pub analysis_result_id: i64,
    pub symbol: String,
    pub signal_date: NaiveDate,
    pub signal_time: DateTime<Utc>,
    pub action: String,
    pub strength: String,
    pub score: f64,
    pub description: Option<String>,
    pub triggered_rules: Option<String>,
    pub context: Option<String>,
    pub indicators_at_signal: Option<String>,
    pub metadata: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct UniverseRow {
    pub id: i64,
    pub symbol: String,
    pub rank: Option<i64>,
    pub sector: Option<String>,
    pub tier: Option<String>,
    pub status: String,
    pub first_appeared: Option<NaiveDate>,
    pub weeks_active: i64,
    pub created_at: String,
    pub updated_at: String,
}

impl UniverseRow {
    pub fn to_entry(&self) -> UniverseEntry {
        UniverseEntry {
            symbol: self.symbol.clone(),
            rank: self.rank,
            sector: self.sector.clone(),
            tier: self.tier.clone(),
            status: self.status.parse().unwrap_or(UniverseStatus::Unknown),
            first_appeared: self.first_appeared,
            weeks_active: self.weeks_active,
        }
    }
}

/// Provenance of the frame an analysis ran on, stored in the
/// `analysis_results.data_info` payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataInfo {
    pub total_rows: i64,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub data_source: String,
}

/// Insert payload for `indicator_calculations`.
#[derive(Debug, Clone)]
pub struct NewIndicatorCalculation<'a> {
    pub symbol: &'a str,
    pub calculation_date: NaiveDate,
    pub config_id: i64,
    pub indicators: &'a IndicatorSnapshot,
    pub data_points: i64,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub duration_ms: i64,
}

/// Insert payload for `analysis_results`.
#[derive(Debug, Clone)]
pub struct NewAnalysisResult<'a> {
    pub symbol: &'a str,
    pub analysis_date: NaiveDate,
    pub indicator_calculation_id: Option<i64>,
    pub indicator_config_id: i64,
    pub scoring_config_id: i64,
    pub analysis_config_id: i64,
    pub summary: &'a SignalSummary,
    pub duration_ms: i64,
    pub data_info: &'a DataInfo,
}
