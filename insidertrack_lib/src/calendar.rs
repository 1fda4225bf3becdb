//! Trading calendar resolution: session lookup and session-count offsets.
//!
//! Pure date arithmetic over the US equity market calendar (weekends plus
//! NYSE full-closure holidays). A `TradingCalendar` carries the bounds of
//! obtainable history; any resolution that would land outside those bounds
//! reports the window as unavailable instead of approximating, so callers
//! treat it as an absent metric rather than a zero-offset substitute.

use chrono::{Datelike, Duration, NaiveDate, Utc, Weekday};

/// Earliest session the system ever asks a data provider for.
const EARLIEST_HISTORY: (i32, u32, u32) = (1990, 1, 2);

/// Session-count window bounds for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TradingCalendar {
    earliest: NaiveDate,
    latest: NaiveDate,
}

impl TradingCalendar {
    /// Calendar bounded by explicit history limits.
    pub fn new(earliest: NaiveDate, latest: NaiveDate) -> Self {
        Self { earliest, latest }
    }

    /// Calendar from the default history floor through today. Sessions after
    /// today are unavailable: the future has no prices.
    pub fn through_today() -> Self {
        let (y, m, d) = EARLIEST_HISTORY;
        Self {
            earliest: NaiveDate::from_ymd_opt(y, m, d).expect("static date"),
            latest: Utc::now().date_naive(),
        }
    }

    /// Nearest valid session on or after `date`, or `None` if that session
    /// falls outside the available history.
    pub fn resolve(&self, date: NaiveDate) -> Option<NaiveDate> {
        let mut current = date;
        while !is_session(current) {
            if current > self.latest {
                return None;
            }
            current = current.succ_opt()?;
        }
        if current < self.earliest || current > self.latest {
            return None;
        }
        Some(current)
    }

    /// The session `n` valid trading sessions away from the session
    /// containing `date` (forward for positive `n`, backward for negative).
    /// `None` when the walk leaves the available history.
    pub fn offset(&self, date: NaiveDate, n: i64) -> Option<NaiveDate> {
        let mut current = self.resolve(date)?;
        let step = if n >= 0 { 1 } else { -1 };
        let mut remaining = n.abs();
        while remaining > 0 {
            current += Duration::days(step);
            if current < self.earliest || current > self.latest {
                return None;
            }
            if is_session(current) {
                remaining -= 1;
            }
        }
        Some(current)
    }
}

/// Whether the US equity market is open on `date`.
pub fn is_session(date: NaiveDate) -> bool {
    !is_weekend(date) && !is_market_holiday(date)
}

fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Full-closure NYSE holidays. Weekend-falling fixed holidays follow the
/// exchange observance rules: Sunday moves to Monday; Saturday moves to
/// Friday except for New Year's Day, which is simply not observed.
pub fn is_market_holiday(date: NaiveDate) -> bool {
    let year = date.year();

    let fixed = [
        // New Year's Day: Sunday observance only.
        observed_sunday_only(year, 1, 1),
        // Juneteenth became a market holiday in 2022.
        if year >= 2022 {
            observed(year, 6, 19)
        } else {
            None
        },
        observed(year, 7, 4),
        observed(year, 12, 25),
    ];
    if fixed.iter().flatten().any(|d| *d == date) {
        return true;
    }

    let floating = [
        nth_weekday(year, 1, Weekday::Mon, 3),  // MLK Day
        nth_weekday(year, 2, Weekday::Mon, 3),  // Washington's Birthday
        Some(good_friday(year)),
        last_weekday(year, 5, Weekday::Mon),    // Memorial Day
        nth_weekday(year, 9, Weekday::Mon, 1),  // Labor Day
        nth_weekday(year, 11, Weekday::Thu, 4), // Thanksgiving
    ];
    floating.iter().flatten().any(|d| *d == date)
}

/// Observed date of a fixed holiday: Saturday -> Friday, Sunday -> Monday.
fn observed(year: i32, month: u32, day: u32) -> Option<NaiveDate> {
    let date = NaiveDate::from_ymd_opt(year, month, day)?;
    Some(match date.weekday() {
        Weekday::Sat => date - Duration::days(1),
        Weekday::Sun => date + Duration::days(1),
        _ => date,
    })
}

/// Observance where a Saturday holiday is skipped entirely (New Year's Day).
fn observed_sunday_only(year: i32, month: u32, day: u32) -> Option<NaiveDate> {
    let date = NaiveDate::from_ymd_opt(year, month, day)?;
    match date.weekday() {
        Weekday::Sat => None,
        Weekday::Sun => Some(date + Duration::days(1)),
        _ => Some(date),
    }
}

fn nth_weekday(year: i32, month: u32, weekday: Weekday, n: u32) -> Option<NaiveDate> {
    NaiveDate::from_weekday_of_month_opt(year, month, weekday, n as u8)
}

fn last_weekday(year: i32, month: u32, weekday: Weekday) -> Option<NaiveDate> {
    for n in (1..=5).rev() {
        if let Some(d) = NaiveDate::from_weekday_of_month_opt(year, month, weekday, n) {
            return Some(d);
        }
    }
    None
}

/// Easter Sunday by the anonymous Gregorian computus.
fn easter(year: i32) -> NaiveDate {
    let a = year % 19;
    let b = year / 100;
    let c = year % 100;
    let d = b / 4;
    let e = b % 4;
    let f = (b + 8) / 25;
    let g = (b - f + 1) / 3;
    let h = (19 * a + b - d - g + 15) % 30;
    let i = c / 4;
    let k = c % 4;
    let l = (32 + 2 * e + 2 * i - h - k) % 7;
    let m = (a + 11 * h + 22 * l) / 451;
    let month = (h + l - 7 * m + 114) / 31;
    let day = (h + l - 7 * m + 114) % 31 + 1;
    NaiveDate::from_ymd_opt(year, month as u32, day as u32).expect("computus yields a valid date")
}

fn good_friday(year: i32) -> NaiveDate {
    easter(year) - Duration::days(2)
}
