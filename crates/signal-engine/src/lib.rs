pub mod context;
pub mod rules;
pub mod scoring;
pub mod signals;

pub use context::{derive_context, ichimoku_regime};
pub use rules::{default_rules, CmpOp, Condition, Operand, Rule, RuleVar};
pub use scoring::{MappedSignal, RegimeMultipliers, ScoringConfig, ScoringEngine};
pub use signals::{AnalysisConfig, SignalEngine, SignalSummary};
