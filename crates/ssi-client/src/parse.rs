//! Decoding of provider rows into `RawBar`/`RawForeignRow`.
//!
//! Field names drift between API revisions, so every column is resolved
//! through an ordered alias list: the first key present wins. Values may
//! arrive as numbers or numeric strings; anything unreadable becomes NaN
//! and is left to the ingestion sanitizer.

use chrono::NaiveDate;
use serde_json::Value;

use market_core::{DailyFetch, RawBar, RawForeignRow, TradingCalendar};

/// Ordered alias lists per column. Precedence is deliberate: newer API
/// field names first, legacy spellings after.
pub struct RowAliases {
    pub date: &'static [&'static str],
    pub open: &'static [&'static str],
    pub high: &'static [&'static str],
    pub low: &'static [&'static str],
    pub close: &'static [&'static str],
    pub volume: &'static [&'static str],
    pub foreign_buy_volume: &'static [&'static str],
    pub foreign_sell_volume: &'static [&'static str],
    pub foreign_buy_value: &'static [&'static str],
    pub foreign_sell_value: &'static [&'static str],
}

pub const STOCK_INFO_ALIASES: RowAliases = RowAliases {
    date: &["tradingDate", "trading_date", "date"],
    open: &["open", "openPrice"],
    high: &["high", "highPrice"],
    low: &["low", "lowPrice"],
    close: &["close", "closePrice"],
    volume: &["totalMatchVol", "volume", "totalVol"],
    foreign_buy_volume: &["foreignBuyVolTotal", "buyForeignQtty", "foreignBuyVol"],
    foreign_sell_volume: &["foreignSellVolTotal", "sellForeignQtty", "foreignSellVol"],
    foreign_buy_value: &["foreignBuyValTotal", "buyForeignValue"],
    foreign_sell_value: &["foreignSellValTotal", "sellForeignValue"],
};

/// First alias present in the row, coerced to f64. Numeric strings count;
/// anything else is NaN for the sanitizer to zero out.
fn number(row: &Value, aliases: &[&str]) -> f64 {
    for key in aliases {
        if let Some(value) = row.get(*key) {
            if let Some(n) = value.as_f64() {
                return n;
            }
            if let Some(s) = value.as_str() {
                let cleaned = s.replace(',', "");
                if let Ok(n) = cleaned.parse::<f64>() {
                    return n;
                }
            }
            return f64::NAN;
        }
    }
    f64::NAN
}

/// dd/mm/yyyy first (the wire format), ISO as fallback.
fn trading_date(row: &Value, aliases: &[&str]) -> Option<NaiveDate> {
    for key in aliases {
        if let Some(s) = row.get(*key).and_then(|v| v.as_str()) {
            if let Ok(d) = NaiveDate::parse_from_str(s, "%d/%m/%Y") {
                return Some(d);
            }
            if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
                return Some(d);
            }
        }
    }
    None
}

/// Decode a page of stock-info rows. Rows without a readable trading
/// date are skipped; foreign columns missing from the payload zero-fill.
pub fn parse_stock_info_items(items: &[Value], calendar: &TradingCalendar) -> DailyFetch {
    let aliases = &STOCK_INFO_ALIASES;
    let mut fetch = DailyFetch::default();

    for row in items {
        let Some(date) = trading_date(row, aliases.date) else {
            tracing::debug!("dropping row without trading date");
            continue;
        };
        let time = calendar.session_close(date);

        fetch.bars.push(RawBar {
            time,
            open: number(row, aliases.open),
            high: number(row, aliases.high),
            low: number(row, aliases.low),
            close: number(row, aliases.close),
            volume: number(row, aliases.volume),
        });

        let buy_volume = number(row, aliases.foreign_buy_volume);
        let sell_volume = number(row, aliases.foreign_sell_volume);
        let buy_value = number(row, aliases.foreign_buy_value);
        let sell_value = number(row, aliases.foreign_sell_value);

        let zero_if_nan = |v: f64| if v.is_finite() { v } else { 0.0 };
        fetch.foreign.push(RawForeignRow {
            time,
            buy_volume: zero_if_nan(buy_volume),
            sell_volume: zero_if_nan(sell_volume),
            buy_value: zero_if_nan(buy_value),
            sell_value: zero_if_nan(sell_value),
        });
    }

    fetch
}
