use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Upstream data provider tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DataSource {
    Ssi,
    Vci,
    Tcbs,
    VnDirect,
}

impl DataSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataSource::Ssi => "SSI",
            DataSource::Vci => "VCI",
            DataSource::Tcbs => "TCBS",
            DataSource::VnDirect => "VNDIRECT",
        }
    }
}

impl std::str::FromStr for DataSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "SSI" => Ok(DataSource::Ssi),
            "VCI" => Ok(DataSource::Vci),
            "TCBS" => Ok(DataSource::Tcbs),
            "VNDIRECT" => Ok(DataSource::VnDirect),
            other => Err(format!("unknown data source: {other}")),
        }
    }
}

/// Sanitized daily OHLCV bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub symbol: String,
    pub time: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: i64,
    pub source: DataSource,
}

impl Bar {
    /// Traded value of the session.
    pub fn value(&self) -> f64 {
        self.close * self.volume as f64
    }
}

/// Daily foreign buy/sell aggregate for a symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForeignFlow {
    pub symbol: String,
    pub time: DateTime<Utc>,
    pub buy_volume: i64,
    pub sell_volume: i64,
    pub buy_value: f64,
    pub sell_value: f64,
    pub source: DataSource,
}

impl ForeignFlow {
    pub fn net_volume(&self) -> i64 {
        self.buy_volume - self.sell_volume
    }

    pub fn net_value(&self) -> f64 {
        self.buy_value - self.sell_value
    }
}

/// Provider-shaped bar before sanitization. Numeric fields may carry
/// NaN/Inf or inconsistent OHLC values; the ingestion engine repairs or
/// drops them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawBar {
    pub time: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Provider-shaped foreign-flow row before sanitization. Missing fields
/// arrive as zero from the adapter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawForeignRow {
    pub time: DateTime<Utc>,
    pub buy_volume: f64,
    pub sell_volume: f64,
    pub buy_value: f64,
    pub sell_value: f64,
}

/// Merged result of one daily fetch.
#[derive(Debug, Clone, Default)]
pub struct DailyFetch {
    pub bars: Vec<RawBar>,
    pub foreign: Vec<RawForeignRow>,
}

impl DailyFetch {
    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }
}

/// Per (symbol, source) ingestion watermark status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum UpdateStatus {
    Pending,
    Success,
    Error,
}

impl UpdateStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UpdateStatus::Pending => "PENDING",
            UpdateStatus::Success => "SUCCESS",
            UpdateStatus::Error => "ERROR",
        }
    }
}

impl std::str::FromStr for UpdateStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "PENDING" => Ok(UpdateStatus::Pending),
            "SUCCESS" => Ok(UpdateStatus::Success),
            "ERROR" => Ok(UpdateStatus::Error),
            other => Err(format!("unknown update status: {other}")),
        }
    }
}

/// Ingestion watermark for a (symbol, source) pair. `last_updated_date` is
/// the inclusive date through which stored data are authoritative.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Watermark {
    pub symbol: String,
    pub source: DataSource,
    pub last_updated_date: NaiveDate,
    pub total_records: i64,
    pub last_update_status: UpdateStatus,
    pub last_error_message: Option<String>,
    pub last_update_duration_seconds: Option<i64>,
    pub updated_at: DateTime<Utc>,
}

/// Membership state of a symbol in the tracked universe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum UniverseStatus {
    New,
    Active,
    Inactive,
    Unknown,
}

impl UniverseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UniverseStatus::New => "NEW",
            UniverseStatus::Active => "ACTIVE",
            UniverseStatus::Inactive => "INACTIVE",
            UniverseStatus::Unknown => "UNKNOWN",
        }
    }
}

impl std::str::FromStr for UniverseStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "NEW" => Ok(UniverseStatus::New),
            "ACTIVE" => Ok(UniverseStatus::Active),
            "INACTIVE" => Ok(UniverseStatus::Inactive),
            "UNKNOWN" => Ok(UniverseStatus::Unknown),
            other => Err(format!("unknown universe status: {other}")),
        }
    }
}

/// One symbol in the tracked universe, with membership metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UniverseEntry {
    pub symbol: String,
    pub rank: Option<i64>,
    pub sector: Option<String>,
    pub tier: Option<String>,
    pub status: UniverseStatus,
    pub first_appeared: Option<NaiveDate>,
    pub weeks_active: i64,
}

impl UniverseEntry {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into().to_uppercase(),
            rank: None,
            sector: None,
            tier: None,
            status: UniverseStatus::Unknown,
            first_appeared: None,
            weeks_active: 0,
        }
    }
}

/// Kind of persisted configuration record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigType {
    Indicator,
    Scoring,
    Analysis,
}

impl ConfigType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigType::Indicator => "indicator",
            ConfigType::Scoring => "scoring",
            ConfigType::Analysis => "analysis",
        }
    }
}

/// Trading signal action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SignalAction {
    Buy,
    Sell,
    Hold,
}

impl SignalAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalAction::Buy => "BUY",
            SignalAction::Sell => "SELL",
            SignalAction::Hold => "HOLD",
        }
    }
}

/// Trading signal strength band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignalStrength {
    Weak,
    Medium,
    Strong,
    VeryStrong,
}

impl SignalStrength {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalStrength::Weak => "WEAK",
            SignalStrength::Medium => "MEDIUM",
            SignalStrength::Strong => "STRONG",
            SignalStrength::VeryStrong => "VERY_STRONG",
        }
    }
}

/// Direction of the short-vs-long moving average spread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Uptrend,
    Downtrend,
    Sideways,
}

/// Bollinger band width bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VolatilityBucket {
    Low,
    Medium,
    High,
}

/// Volume-vs-average bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VolumeBucket {
    Low,
    Normal,
    High,
    VeryHigh,
}

/// RSI zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RsiZone {
    Oversold,
    Neutral,
    Overbought,
}

/// Ichimoku cloud regime at a bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IchimokuRegime {
    Bullish,
    Bearish,
    Neutral,
}

/// Price position relative to the moving-average stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PricePosition {
    StrongAboveAll,
    AboveKeyMas,
    Mixed,
    BelowKeyMas,
    StrongBelowAll,
}

/// Market regime used to pick the scoring multiplier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreRegime {
    Uptrend,
    Downtrend,
    Sideways,
    Neutral,
}

/// Market context attached to an emitted signal. Fields stay `None` when
/// the underlying indicators have not warmed up yet.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SignalContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trend: Option<Trend>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volatility: Option<VolatilityBucket>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<VolumeBucket>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rsi_zone: Option<RsiZone>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ichimoku: Option<IchimokuRegime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_position: Option<PricePosition>,
}

/// One rule that fired while scoring a bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggeredRule {
    pub name: String,
    pub description: String,
    pub weight: f64,
}

/// Bookkeeping attached to an emitted signal.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SignalMetadata {
    pub bar_index: usize,
    pub total_data_points: usize,
    pub min_score_threshold: f64,
}

/// Snapshot of price fields at a bar.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceSnapshot {
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: i64,
}

/// Snapshot of the moving-average stack. `None` until the window fills.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MovingAverageSnapshot {
    pub ma_short: Option<f64>,
    pub ma_medium: Option<f64>,
    pub ma_long: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MomentumSnapshot {
    pub rsi: Option<f64>,
    pub macd: Option<f64>,
    pub macd_signal: Option<f64>,
    pub macd_hist: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VolatilitySnapshot {
    pub bb_upper: Option<f64>,
    pub bb_lower: Option<f64>,
    pub bb_width: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VolumeSnapshot {
    pub volume_avg: Option<f64>,
    pub volume_spike: Option<f64>,
    pub obv: Option<f64>,
    pub obv_ma: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IchimokuSnapshot {
    pub tenkan: Option<f64>,
    pub kijun: Option<f64>,
    pub senkou_a: Option<f64>,
    pub senkou_b: Option<f64>,
}

/// Typed snapshot of every indicator at one bar. Serialized into the
/// `indicator_calculations.indicators` and `signal_results.indicators_at_signal`
/// JSON payloads.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSnapshot {
    pub price: PriceSnapshot,
    pub moving_averages: MovingAverageSnapshot,
    pub momentum: MomentumSnapshot,
    pub volatility: VolatilitySnapshot,
    pub volume: VolumeSnapshot,
    pub ichimoku: IchimokuSnapshot,
}

/// Aggregate counters over one batch of emitted signals, stored in the
/// `analysis_results.summary` payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SignalSummary {
    pub total_signals: i64,
    pub buy_signals: i64,
    pub sell_signals: i64,
    pub hold_signals: i64,
    pub strong_signals: i64,
    pub medium_signals: i64,
    pub weak_signals: i64,
    pub avg_score: f64,
    pub max_score: f64,
    pub min_score: f64,
}

impl SignalSummary {
    pub fn from_signals(signals: &[TradingSignal]) -> Self {
        if signals.is_empty() {
            return Self::default();
        }

        let mut summary = Self {
            total_signals: signals.len() as i64,
            ..Self::default()
        };
        let mut sum = 0.0;
        let mut max = f64::NEG_INFINITY;
        let mut min = f64::INFINITY;

        for signal in signals {
            match signal.action {
                SignalAction::Buy => summary.buy_signals += 1,
                SignalAction::Sell => summary.sell_signals += 1,
                SignalAction::Hold => summary.hold_signals += 1,
            }
            match signal.strength {
                SignalStrength::Strong | SignalStrength::VeryStrong => summary.strong_signals += 1,
                SignalStrength::Medium => summary.medium_signals += 1,
                SignalStrength::Weak => summary.weak_signals += 1,
            }
            sum += signal.score;
            max = max.max(signal.score);
            min = min.min(signal.score);
        }

        summary.avg_score = sum / signals.len() as f64;
        summary.max_score = max;
        summary.min_score = min;
        summary
    }
}

/// A materialized buy/sell/hold recommendation for one bar.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradingSignal {
    pub symbol: String,
    pub time: DateTime<Utc>,
    pub action: SignalAction,
    pub strength: SignalStrength,
    pub score: f64,
    pub description: String,
    pub indicators: IndicatorSnapshot,
    pub triggered_rules: Vec<TriggeredRule>,
    pub context: SignalContext,
    pub metadata: SignalMetadata,
}
