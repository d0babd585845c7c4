//! market-agent: ingest the daily universe and run the analysis pipeline.
//!
//! Usage:
//!   market-agent                        # universe table, today's session
//!   market-agent --symbols ACB VCB HPG  # explicit symbols
//!   market-agent --date 2024-01-05     # backfill a specific target day
//!   market-agent --db sqlite:dev.db

mod config;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};

use analysis_orchestrator::{Orchestrator, OrchestratorConfig};
use config::AgentConfig;
use ingestion_engine::{IngestionConfig, IngestionEngine};
use market_core::{StaticUniverse, SymbolUniverseProvider, TradingCalendar};
use market_store::{
    DbUniverse, ForeignFlowRepository, MarketDb, PriceRepository, TrackingRepository,
    UniverseRepository,
};
use signal_engine::{AnalysisConfig, ScoringConfig};
use ssi_client::{SsiClient, SsiClientConfig};
use technical_indicators::IndicatorConfig;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "market_agent=info,ingestion_engine=info,analysis_orchestrator=info".into()),
        )
        .init();

    let mut config = AgentConfig::from_env()?;
    let args: Vec<String> = std::env::args().collect();

    if let Some(idx) = args.iter().position(|a| a == "--symbols") {
        config.symbols = args[idx + 1..]
            .iter()
            .take_while(|a| !a.starts_with("--"))
            .map(|s| s.to_uppercase())
            .collect();
    }
    if let Some(db) = arg_value(&args, "--db") {
        config.database_url = db;
    }

    let calendar = TradingCalendar::hose();
    let target: NaiveDate = match arg_value(&args, "--date") {
        Some(raw) => raw.parse().context("--date must be YYYY-MM-DD")?,
        None => calendar.local_date(Utc::now()),
    };

    tracing::info!(
        db = %config.database_url,
        symbols = config.symbols.len(),
        %target,
        "market-agent starting"
    );

    let db = MarketDb::connect(&config.database_url, config.batch_size as u32 + 2)
        .await
        .context("failed to open database")?;

    let mut ssi_config = SsiClientConfig {
        requests_per_minute: config.requests_per_minute,
        ..SsiClientConfig::default()
    };
    if let Some(base_url) = &config.ssi_base_url {
        ssi_config.base_url = base_url.clone();
    }
    let provider = Arc::new(SsiClient::new(ssi_config));

    let ingestion = IngestionEngine::new(
        provider,
        PriceRepository::new(db.pool().clone()),
        ForeignFlowRepository::new(db.pool().clone()),
        TrackingRepository::new(db.pool().clone()),
        calendar,
        IngestionConfig {
            genesis: config.genesis_date,
            window_days: config.window_days,
            max_empty_windows: config.max_empty_windows,
        },
    );

    let universe: Arc<dyn SymbolUniverseProvider> = if config.symbols.is_empty() {
        Arc::new(DbUniverse::new(UniverseRepository::new(db.pool().clone())))
    } else {
        Arc::new(StaticUniverse::new(config.symbols.iter().cloned()))
    };

    let orchestrator = Orchestrator::new(
        &db,
        universe,
        ingestion,
        IndicatorConfig::default(),
        ScoringConfig::default(),
        AnalysisConfig {
            min_score_threshold: config.min_score_threshold,
            lookback_days: config.lookback_days,
            ..AnalysisConfig::default()
        },
        OrchestratorConfig {
            batch_size: config.batch_size,
            symbol_delay: Duration::from_secs(config.symbol_delay_seconds),
            batch_delay: Duration::from_secs(config.batch_delay_seconds),
        },
    );

    // Ctrl-C flips the cooperative stop flag; the run winds down at the
    // next symbol boundary with watermarks intact.
    let cancel = orchestrator.cancel_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, cancelling after the current symbol");
            cancel.store(true, std::sync::atomic::Ordering::Relaxed);
        }
    });

    let report = orchestrator.run(target).await?;

    tracing::info!(
        succeeded = report.succeeded(),
        failed = report.failed(),
        stored = report.total_stored(),
        signals = report.total_signals(),
        cancelled = report.cancelled,
        "run report"
    );
    for outcome in &report.outcomes {
        match &outcome.error {
            Some(error) => tracing::warn!(symbol = %outcome.symbol, %error, "symbol failed"),
            None => tracing::info!(
                symbol = %outcome.symbol,
                stored = outcome.stored,
                signals = outcome.signals,
                "symbol done"
            ),
        }
    }

    if report.failed() > 0 {
        std::process::exit(1);
    }
    Ok(())
}

fn arg_value(args: &[String], flag: &str) -> Option<String> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .cloned()
}
