//! Bar and foreign-row sanitization. Repairs what it can, drops what it
//! cannot, never raises. The repair order matters: close is fixed from
//! open first, then low and high are pulled toward the repaired close.

use std::collections::HashSet;

use market_core::{Bar, DataSource, ForeignFlow, RawBar, RawForeignRow};

fn coerce(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

/// Sanitize a fetched batch into valid bars: coerce junk numbers, repair
/// OHLC inversions, drop rows that stay invalid, dedup by time (first
/// wins) and sort ascending.
pub fn sanitize_bars(symbol: &str, source: DataSource, raw: &[RawBar]) -> Vec<Bar> {
    let symbol = symbol.to_uppercase();
    let mut bars: Vec<Bar> = Vec::with_capacity(raw.len());

    for row in raw {
        let open = coerce(row.open);
        let mut high = coerce(row.high);
        let mut low = coerce(row.low);
        let mut close = coerce(row.close);
        let volume = coerce(row.volume);

        if close <= 0.0 {
            close = open;
        }
        if low > close {
            low = close;
        }
        if low > open {
            low = open;
        }
        if high < close {
            high = close;
        }
        if high < open {
            high = open;
        }
        if high < low {
            high = low;
        }

        let valid = close > 0.0
            && low <= open
            && low <= close
            && high >= open
            && high >= close
            && high >= low
            && volume >= 0.0;
        if !valid {
            tracing::debug!(symbol = %symbol, time = %row.time, "dropping unrepairable bar");
            continue;
        }

        bars.push(Bar {
            symbol: symbol.clone(),
            time: row.time,
            open,
            high,
            low,
            close,
            volume: volume as i64,
            source,
        });
    }

    dedup_sort(&mut bars, |b| b.time);
    bars
}

/// Sanitize foreign rows: junk and negative quantities zero-fill, rows
/// dedup by time and sort ascending.
pub fn sanitize_foreign(
    symbol: &str,
    source: DataSource,
    raw: &[RawForeignRow],
) -> Vec<ForeignFlow> {
    let symbol = symbol.to_uppercase();
    let mut flows: Vec<ForeignFlow> = raw
        .iter()
        .map(|row| ForeignFlow {
            symbol: symbol.clone(),
            time: row.time,
            buy_volume: coerce(row.buy_volume).max(0.0) as i64,
            sell_volume: coerce(row.sell_volume).max(0.0) as i64,
            buy_value: coerce(row.buy_value).max(0.0),
            sell_value: coerce(row.sell_value).max(0.0),
            source,
        })
        .collect();

    dedup_sort(&mut flows, |f| f.time);
    flows
}

fn dedup_sort<T, K: Ord + Copy + std::hash::Hash>(items: &mut Vec<T>, key: impl Fn(&T) -> K) {
    let mut seen = HashSet::new();
    items.retain(|item| seen.insert(key(item)));
    items.sort_by_key(|item| key(item));
}
