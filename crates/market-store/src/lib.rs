pub mod analysis_repo;
pub mod config_repo;
pub mod db;
pub mod foreign_repo;
pub mod models;
pub mod price_repo;
pub mod tracking_repo;
pub mod universe_repo;

pub use analysis_repo::AnalysisRepository;
pub use config_repo::{canonical_json, content_hash, ConfigRepository};
pub use db::MarketDb;
pub use foreign_repo::ForeignFlowRepository;
pub use models::{
    AnalysisResultRow, ConfigRow, DataInfo, ForeignTradeRow, IndicatorCalculationRow,
    NewAnalysisResult, NewIndicatorCalculation, PriceRow, SignalRow, StockRow, TrackingRow,
    UniverseRow,
};
pub use price_repo::PriceRepository;
pub use tracking_repo::TrackingRepository;
pub use universe_repo::{DbUniverse, UniverseRepository};
