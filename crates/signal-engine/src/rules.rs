//! Rule conditions as a small tagged AST over a closed variable alphabet.
//!
//! Conditions never fail a run: a missing binding (indicator not warmed
//! up, lag before the first bar) makes the enclosing rule evaluate false.

use serde::{Deserialize, Serialize};
use technical_indicators::IndicatorFrame;

/// Allowed lags for shifted references.
pub const ALLOWED_SHIFTS: [u32; 4] = [0, 1, 2, 5];

/// The closed per-bar variable namespace rules may reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleVar {
    Open,
    High,
    Low,
    Close,
    Volume,
    MaShort,
    MaMedium,
    MaLong,
    Rsi,
    Macd,
    SignalLine,
    MacdHist,
    BbUpper,
    BbLower,
    BbWidth,
    VolumeSpike,
    Tenkan,
    Kijun,
    SenkouA,
    SenkouB,
    Obv,
    ObvMa,
}

impl RuleVar {
    /// Resolve the variable at `index` shifted back by `lag` bars.
    pub fn resolve(&self, frame: &IndicatorFrame, index: usize, lag: u32) -> Option<f64> {
        let i = index.checked_sub(lag as usize)?;
        if i >= frame.len() {
            return None;
        }
        match self {
            RuleVar::Open => frame.bar(i).map(|b| b.open),
            RuleVar::High => frame.bar(i).map(|b| b.high),
            RuleVar::Low => frame.bar(i).map(|b| b.low),
            RuleVar::Close => frame.bar(i).map(|b| b.close),
            RuleVar::Volume => frame.bar(i).map(|b| b.volume as f64),
            RuleVar::MaShort => frame.ma_short[i],
            RuleVar::MaMedium => frame.ma_medium[i],
            RuleVar::MaLong => frame.ma_long[i],
            RuleVar::Rsi => frame.rsi[i],
            RuleVar::Macd => frame.macd[i],
            RuleVar::SignalLine => frame.macd_signal[i],
            RuleVar::MacdHist => frame.macd_hist[i],
            RuleVar::BbUpper => frame.bb_upper[i],
            RuleVar::BbLower => frame.bb_lower[i],
            RuleVar::BbWidth => frame.bb_width[i],
            RuleVar::VolumeSpike => frame.volume_spike[i],
            RuleVar::Tenkan => frame.tenkan[i],
            RuleVar::Kijun => frame.kijun[i],
            RuleVar::SenkouA => frame.senkou_a[i],
            RuleVar::SenkouB => frame.senkou_b[i],
            RuleVar::Obv => frame.obv[i],
            RuleVar::ObvMa => frame.obv_ma[i],
        }
    }
}

/// One side of a comparison: a (possibly lagged) variable or a constant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Operand {
    Var {
        var: RuleVar,
        #[serde(default)]
        shift: u32,
    },
    Const {
        value: f64,
    },
}

impl Operand {
    pub fn var(var: RuleVar) -> Self {
        Operand::Var { var, shift: 0 }
    }

    pub fn shifted(var: RuleVar, shift: u32) -> Self {
        Operand::Var { var, shift }
    }

    pub fn constant(value: f64) -> Self {
        Operand::Const { value }
    }

    fn value(&self, frame: &IndicatorFrame, index: usize, extra_lag: u32) -> Option<f64> {
        match self {
            Operand::Var { var, shift } => var.resolve(frame, index, shift + extra_lag),
            Operand::Const { value } => Some(*value),
        }
    }

    fn shift_ok(&self) -> bool {
        match self {
            Operand::Var { shift, .. } => ALLOWED_SHIFTS.contains(shift),
            Operand::Const { .. } => true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CmpOp {
    Gt,
    Ge,
    Lt,
    Le,
}

impl CmpOp {
    fn apply(&self, lhs: f64, rhs: f64) -> bool {
        match self {
            CmpOp::Gt => lhs > rhs,
            CmpOp::Ge => lhs >= rhs,
            CmpOp::Lt => lhs < rhs,
            CmpOp::Le => lhs <= rhs,
        }
    }
}

/// Rule condition AST. The structured variants (`CrossAbove`,
/// `CrossBelow`, `BbSqueeze`) cover the common rule shapes; `Compare`
/// with `All`/`Any` is the generic escape hatch, still bounded by the
/// closed `RuleVar` alphabet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Condition {
    Compare {
        lhs: Operand,
        op: CmpOp,
        rhs: Operand,
    },
    All {
        conditions: Vec<Condition>,
    },
    Any {
        conditions: Vec<Condition>,
    },
    /// `fast` closed above `slow` on this bar: fast > slow now and
    /// fast ≤ slow one bar earlier.
    CrossAbove {
        fast: Operand,
        slow: Operand,
    },
    /// Mirror of `CrossAbove`.
    CrossBelow {
        fast: Operand,
        slow: Operand,
    },
    /// Band width below `factor` times its own rolling mean. Requires the
    /// full width history over `window` bars.
    BbSqueeze {
        window: usize,
        factor: f64,
    },
}

impl Condition {
    pub fn compare(lhs: Operand, op: CmpOp, rhs: Operand) -> Self {
        Condition::Compare { lhs, op, rhs }
    }

    pub fn all(conditions: Vec<Condition>) -> Self {
        Condition::All { conditions }
    }

    /// Evaluate at `index`. Absent bindings yield false, never an error.
    pub fn eval(&self, frame: &IndicatorFrame, index: usize) -> bool {
        match self {
            Condition::Compare { lhs, op, rhs } => {
                match (lhs.value(frame, index, 0), rhs.value(frame, index, 0)) {
                    (Some(l), Some(r)) => op.apply(l, r),
                    _ => false,
                }
            }
            Condition::All { conditions } => {
                !conditions.is_empty() && conditions.iter().all(|c| c.eval(frame, index))
            }
            Condition::Any { conditions } => conditions.iter().any(|c| c.eval(frame, index)),
            Condition::CrossAbove { fast, slow } => {
                match (
                    fast.value(frame, index, 0),
                    slow.value(frame, index, 0),
                    fast.value(frame, index, 1),
                    slow.value(frame, index, 1),
                ) {
                    (Some(f), Some(s), Some(pf), Some(ps)) => f > s && pf <= ps,
                    _ => false,
                }
            }
            Condition::CrossBelow { fast, slow } => {
                match (
                    fast.value(frame, index, 0),
                    slow.value(frame, index, 0),
                    fast.value(frame, index, 1),
                    slow.value(frame, index, 1),
                ) {
                    (Some(f), Some(s), Some(pf), Some(ps)) => f < s && pf >= ps,
                    _ => false,
                }
            }
            Condition::BbSqueeze { window, factor } => {
                if *window == 0 || index + 1 < *window {
                    return false;
                }
                let Some(current) = frame.bb_width[index] else {
                    return false;
                };
                let mut sum = 0.0;
                for i in index + 1 - window..=index {
                    match frame.bb_width[i] {
                        Some(w) => sum += w,
                        None => return false,
                    }
                }
                current < factor * (sum / *window as f64)
            }
        }
    }

    /// Every shifted reference must use an allowed lag.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            Condition::Compare { lhs, rhs, .. }
            | Condition::CrossAbove {
                fast: lhs,
                slow: rhs,
            }
            | Condition::CrossBelow {
                fast: lhs,
                slow: rhs,
            } => {
                if !lhs.shift_ok() || !rhs.shift_ok() {
                    return Err(format!("shift outside allowed set {ALLOWED_SHIFTS:?}"));
                }
                Ok(())
            }
            Condition::All { conditions } | Condition::Any { conditions } => {
                conditions.iter().try_for_each(Condition::validate)
            }
            Condition::BbSqueeze { window, .. } => {
                if *window == 0 {
                    Err("squeeze window must be positive".into())
                } else {
                    Ok(())
                }
            }
        }
    }
}

/// A configurable scoring rule: fire `condition`, contribute `weight`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub name: String,
    pub weight: f64,
    pub condition: Condition,
    pub description: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl Rule {
    pub fn new(
        name: impl Into<String>,
        weight: f64,
        condition: Condition,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            weight,
            condition,
            description: description.into(),
            enabled: true,
        }
    }
}

/// The starter rule library. Weights and conditions are configuration,
/// not law; deployments tune them per market.
pub fn default_rules() -> Vec<Rule> {
    use CmpOp::*;
    use RuleVar::*;

    let var = Operand::var;
    let lag = Operand::shifted;
    let num = Operand::constant;

    vec![
        // Moving averages
        Rule::new(
            "ma_crossover_bullish",
            20.0,
            Condition::CrossAbove {
                fast: var(MaShort),
                slow: var(MaLong),
            },
            "Short MA crossed above long MA",
        ),
        Rule::new(
            "ma_crossover_bearish",
            -20.0,
            Condition::CrossBelow {
                fast: var(MaShort),
                slow: var(MaLong),
            },
            "Short MA crossed below long MA",
        ),
        Rule::new(
            "price_above_ma",
            10.0,
            Condition::all(vec![
                Condition::compare(var(Close), Gt, var(MaShort)),
                Condition::compare(var(Close), Gt, var(MaLong)),
            ]),
            "Close above both short and long MA",
        ),
        Rule::new(
            "price_below_ma",
            -10.0,
            Condition::all(vec![
                Condition::compare(var(Close), Lt, var(MaShort)),
                Condition::compare(var(Close), Lt, var(MaLong)),
            ]),
            "Close below both short and long MA",
        ),
        // RSI
        Rule::new(
            "rsi_oversold",
            15.0,
            Condition::CrossBelow {
                fast: var(Rsi),
                slow: num(30.0),
            },
            "RSI dropped into the oversold zone",
        ),
        Rule::new(
            "rsi_overbought",
            -15.0,
            Condition::CrossAbove {
                fast: var(Rsi),
                slow: num(70.0),
            },
            "RSI rose into the overbought zone",
        ),
        Rule::new(
            "rsi_bullish_divergence",
            25.0,
            Condition::all(vec![
                Condition::compare(var(Rsi), Gt, lag(Rsi, 1)),
                Condition::compare(var(Close), Lt, lag(Close, 1)),
            ]),
            "RSI rising while price falls",
        ),
        Rule::new(
            "rsi_bearish_divergence",
            -25.0,
            Condition::all(vec![
                Condition::compare(var(Rsi), Lt, lag(Rsi, 1)),
                Condition::compare(var(Close), Gt, lag(Close, 1)),
            ]),
            "RSI falling while price rises",
        ),
        // MACD
        Rule::new(
            "macd_bullish_crossover",
            20.0,
            Condition::CrossAbove {
                fast: var(Macd),
                slow: var(SignalLine),
            },
            "MACD crossed above the signal line",
        ),
        Rule::new(
            "macd_bearish_crossover",
            -20.0,
            Condition::CrossBelow {
                fast: var(Macd),
                slow: var(SignalLine),
            },
            "MACD crossed below the signal line",
        ),
        Rule::new(
            "macd_histogram_increasing",
            10.0,
            Condition::all(vec![
                Condition::compare(var(MacdHist), Gt, lag(MacdHist, 1)),
                Condition::compare(lag(MacdHist, 1), Gt, lag(MacdHist, 2)),
            ]),
            "MACD histogram rising two bars in a row",
        ),
        Rule::new(
            "macd_histogram_decreasing",
            -10.0,
            Condition::all(vec![
                Condition::compare(var(MacdHist), Lt, lag(MacdHist, 1)),
                Condition::compare(lag(MacdHist, 1), Lt, lag(MacdHist, 2)),
            ]),
            "MACD histogram falling two bars in a row",
        ),
        // Bollinger Bands
        Rule::new(
            "bb_squeeze",
            15.0,
            Condition::BbSqueeze {
                window: 20,
                factor: 0.8,
            },
            "Bands contracting, breakout setup",
        ),
        Rule::new(
            "bb_upper_breakout",
            20.0,
            Condition::CrossAbove {
                fast: var(Close),
                slow: var(BbUpper),
            },
            "Close broke above the upper band",
        ),
        Rule::new(
            "bb_lower_breakout",
            -20.0,
            Condition::CrossBelow {
                fast: var(Close),
                slow: var(BbLower),
            },
            "Close broke below the lower band",
        ),
        // Volume
        Rule::new(
            "volume_spike_bullish",
            15.0,
            Condition::all(vec![
                Condition::compare(var(VolumeSpike), Gt, num(1.8)),
                Condition::compare(var(Close), Gt, lag(Close, 1)),
            ]),
            "Volume surge on a rising close",
        ),
        Rule::new(
            "volume_spike_bearish",
            -15.0,
            Condition::all(vec![
                Condition::compare(var(VolumeSpike), Gt, num(1.8)),
                Condition::compare(var(Close), Lt, lag(Close, 1)),
            ]),
            "Volume surge on a falling close",
        ),
        // Ichimoku
        Rule::new(
            "ichimoku_bullish_cloud",
            25.0,
            Condition::all(vec![
                Condition::compare(var(Close), Gt, var(SenkouA)),
                Condition::compare(var(Close), Gt, var(SenkouB)),
                Condition::compare(var(Tenkan), Gt, var(Kijun)),
            ]),
            "Price above the cloud with tenkan over kijun",
        ),
        Rule::new(
            "ichimoku_bearish_cloud",
            -25.0,
            Condition::all(vec![
                Condition::compare(var(Close), Lt, var(SenkouA)),
                Condition::compare(var(Close), Lt, var(SenkouB)),
                Condition::compare(var(Tenkan), Lt, var(Kijun)),
            ]),
            "Price below the cloud with tenkan under kijun",
        ),
        // OBV
        Rule::new(
            "obv_bullish_divergence",
            20.0,
            Condition::all(vec![
                Condition::compare(var(Obv), Gt, var(ObvMa)),
                Condition::compare(var(Close), Lt, lag(Close, 5)),
            ]),
            "OBV above its average while price is down over five bars",
        ),
        Rule::new(
            "obv_bearish_divergence",
            -20.0,
            Condition::all(vec![
                Condition::compare(var(Obv), Lt, var(ObvMa)),
                Condition::compare(var(Close), Gt, lag(Close, 5)),
            ]),
            "OBV below its average while price is up over five bars",
        ),
    ]
}
