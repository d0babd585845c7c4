pub mod engine;
pub mod sanitize;

#[cfg(test)]
mod engine_tests;

pub use engine::{IngestOutcome, IngestionConfig, IngestionEngine};
pub use sanitize::{sanitize_bars, sanitize_foreign};
