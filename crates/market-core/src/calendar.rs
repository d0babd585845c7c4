use chrono::{DateTime, Duration, NaiveDate, TimeZone, Timelike, Utc};
use chrono_tz::Tz;

/// Market session calendar. Knows the local timezone and the daily close
/// hour so callers never ingest a session that is still open.
#[derive(Debug, Clone)]
pub struct TradingCalendar {
    tz: Tz,
    close_hour: u32,
}

impl TradingCalendar {
    pub fn new(tz: Tz, close_hour: u32) -> Self {
        Self { tz, close_hour }
    }

    /// Ho Chi Minh exchange: closes 16:00 local.
    pub fn hose() -> Self {
        Self::new(chrono_tz::Asia::Ho_Chi_Minh, 16)
    }

    /// Today's date in the market timezone.
    pub fn local_date(&self, now: DateTime<Utc>) -> NaiveDate {
        now.with_timezone(&self.tz).date_naive()
    }

    /// The UTC instant of the session close on a trading day. Bar times
    /// are normalized to this instant so a bar's UTC date always equals
    /// its trading date.
    pub fn session_close(&self, date: NaiveDate) -> DateTime<Utc> {
        let local = date.and_hms_opt(self.close_hour, 0, 0).expect("valid close hour");
        match self.tz.from_local_datetime(&local) {
            chrono::LocalResult::Single(dt) | chrono::LocalResult::Ambiguous(dt, _) => {
                dt.with_timezone(&Utc)
            }
            chrono::LocalResult::None => Utc.from_utc_datetime(&local),
        }
    }

    /// The latest date whose session is complete, capped at `target`.
    ///
    /// If `target` is today (market time) and the session has not closed
    /// yet, the previous day is returned instead. Weekends and holidays
    /// pass through unchanged: the provider returns nothing for them and
    /// the watermark simply does not advance.
    pub fn effective_end(&self, now: DateTime<Utc>, target: NaiveDate) -> NaiveDate {
        let local = now.with_timezone(&self.tz);
        if local.date_naive() == target && local.hour() < self.close_hour {
            target - Duration::days(1)
        } else {
            target
        }
    }
}

impl Default for TradingCalendar {
    fn default() -> Self {
        Self::hose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;

    fn hcm_instant(date: NaiveDate, hour: u32, minute: u32) -> DateTime<Utc> {
        let tz = chrono_tz::Asia::Ho_Chi_Minh;
        tz.from_local_datetime(&date.and_time(NaiveTime::from_hms_opt(hour, minute, 0).unwrap()))
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn before_close_on_target_day_steps_back() {
        let cal = TradingCalendar::hose();
        let target = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();
        let now = hcm_instant(target, 10, 30);
        assert_eq!(
            cal.effective_end(now, target),
            NaiveDate::from_ymd_opt(2024, 1, 4).unwrap()
        );
    }

    #[test]
    fn after_close_on_target_day_keeps_target() {
        let cal = TradingCalendar::hose();
        let target = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();
        let now = hcm_instant(target, 16, 0);
        assert_eq!(cal.effective_end(now, target), target);
    }

    #[test]
    fn past_target_is_untouched_regardless_of_clock() {
        let cal = TradingCalendar::hose();
        let target = NaiveDate::from_ymd_opt(2024, 1, 3).unwrap();
        let now = hcm_instant(NaiveDate::from_ymd_opt(2024, 1, 5).unwrap(), 8, 0);
        assert_eq!(cal.effective_end(now, target), target);
    }

    #[test]
    fn session_close_preserves_the_trading_date_in_utc() {
        let cal = TradingCalendar::hose();
        let date = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let close = cal.session_close(date);
        // 16:00 ICT is 09:00 UTC on the same calendar day.
        assert_eq!(close.date_naive(), date);
        assert_eq!(close.hour(), 9);
    }

    #[test]
    fn close_hour_uses_market_timezone_not_utc() {
        let cal = TradingCalendar::hose();
        let target = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();
        // 08:30 UTC is 15:30 in Ho Chi Minh: still before close.
        let now = Utc
            .with_ymd_and_hms(2024, 1, 5, 8, 30, 0)
            .unwrap();
        assert_eq!(
            cal.effective_end(now, target),
            NaiveDate::from_ymd_opt(2024, 1, 4).unwrap()
        );
    }
}
