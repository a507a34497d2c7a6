//! Borsa Istanbul session utilities.
//!
//! # BIST Market Hours (Europe/Istanbul)
//!
//! - 10:00-18:00: Continuous trading, Monday to Friday
//! - 18:30: Default cutoff after which the day's daily bar is final
//!
//! No exchange holiday calendar is applied.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Timelike, Utc, Weekday};
use chrono_tz::Tz;

use super::Bar;

/// Exchange time zone.
pub const BIST_TZ: Tz = chrono_tz::Europe::Istanbul;

/// First trading hour (inclusive).
pub const SESSION_OPEN_HOUR: u32 = 10;

/// End of trading (exclusive).
pub const SESSION_CLOSE_HOUR: u32 = 18;

/// Hourly bars derived per daily bar.
pub const SIMULATED_BARS_PER_DAY: u32 = SESSION_CLOSE_HOUR - SESSION_OPEN_HOUR;

fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// The business day before `date`. Holidays are not considered.
pub fn previous_business_day(date: NaiveDate) -> NaiveDate {
    let back = match date.weekday() {
        Weekday::Mon => 3,
        Weekday::Sun => 2,
        _ => 1,
    };
    date - Duration::days(back)
}

/// True when local time in `tz` is before `cutoff`.
pub fn is_before_cutoff(now: DateTime<Utc>, tz: Tz, cutoff: NaiveTime) -> bool {
    now.with_timezone(&tz).time() < cutoff
}

/// The most recent session whose daily bar is complete at `now`.
pub fn last_closed_session(now: DateTime<Utc>, tz: Tz, cutoff: NaiveTime) -> NaiveDate {
    let local = now.with_timezone(&tz);
    let today = local.date_naive();
    if is_weekend(today) || local.time() < cutoff {
        previous_business_day(today)
    } else {
        today
    }
}

/// Drop the last bar when it belongs to a session still in progress.
///
/// Returns whether a bar was removed.
pub fn trim_in_progress_bar(
    bars: &mut Vec<Bar>,
    now: DateTime<Utc>,
    tz: Tz,
    cutoff: NaiveTime,
) -> bool {
    if bars.len() >= 2 && is_before_cutoff(now, tz, cutoff) {
        bars.pop();
        true
    } else {
        false
    }
}

/// Hourly history length for a prediction run at `now`.
pub fn history_days(
    now: DateTime<Utc>,
    tz: Tz,
    cutoff: NaiveTime,
    days_before_close: u32,
    days_after_close: u32,
) -> u32 {
    if is_before_cutoff(now, tz, cutoff) {
        days_before_close
    } else {
        days_after_close
    }
}

/// True for a timestamp inside BIST continuous trading.
pub fn in_trading_hours(ts: DateTime<Utc>, tz: Tz) -> bool {
    let local = ts.with_timezone(&tz);
    !is_weekend(local.date_naive())
        && (SESSION_OPEN_HOUR..SESSION_CLOSE_HOUR).contains(&local.hour())
}

/// Keep only bars stamped inside trading hours.
pub fn filter_trading_hours(bars: Vec<Bar>, tz: Tz) -> Vec<Bar> {
    bars.into_iter()
        .filter(|b| in_trading_hours(b.timestamp, tz))
        .collect()
}

/// Derive hourly bars from the last `days` daily bars.
///
/// Each day yields one bar per trading hour. The first hour sits at the
/// day's open and the last at its close with linear steps in between,
/// clamped to the day's range. High and low are the price ±0.1 %.
pub fn simulate_hourly_from_daily(daily: &[Bar], days: usize, tz: Tz) -> Vec<Bar> {
    let start = daily.len().saturating_sub(days);
    let steps = f64::from(SIMULATED_BARS_PER_DAY - 1);
    let mut out = Vec::with_capacity((daily.len() - start) * SIMULATED_BARS_PER_DAY as usize);

    for day in &daily[start..] {
        if !day.close.is_finite() {
            continue;
        }
        let open = if day.open.is_finite() { day.open } else { day.close };
        let date = day.timestamp.with_timezone(&tz).date_naive();

        for h in 0..SIMULATED_BARS_PER_DAY {
            let hour = SESSION_OPEN_HOUR + h;
            let Some(naive) = date.and_hms_opt(hour, 0, 0) else {
                continue;
            };
            let Some(local) = tz.from_local_datetime(&naive).single() else {
                continue;
            };

            let mut price = open + (day.close - open) * f64::from(h) / steps;
            if day.low.is_finite() && day.high.is_finite() && day.low <= day.high {
                price = price.clamp(day.low, day.high);
            }

            out.push(Bar {
                symbol: day.symbol.clone(),
                timestamp: local.with_timezone(&Utc),
                open: price,
                high: price * 1.001,
                low: price * 0.999,
                close: price,
                volume: day.volume / f64::from(SIMULATED_BARS_PER_DAY),
            });
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn istanbul(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        BIST_TZ
            .with_ymd_and_hms(y, m, d, h, min, 0)
            .unwrap()
            .with_timezone(&Utc)
    }

    fn cutoff() -> NaiveTime {
        NaiveTime::from_hms_opt(18, 30, 0).unwrap()
    }

    fn daily_bar(day: u32, open: f64, high: f64, low: f64, close: f64) -> Bar {
        Bar {
            symbol: "THYAO".into(),
            timestamp: istanbul(2024, 1, day, 0, 0),
            open,
            high,
            low,
            close,
            volume: 800.0,
        }
    }

    // 2024-01-15 is a Monday
    #[test_case(15, 12 ; "monday goes back to friday")]
    #[test_case(14, 12 ; "sunday goes back to friday")]
    #[test_case(13, 12 ; "saturday goes back to friday")]
    #[test_case(17, 16 ; "wednesday goes back one day")]
    fn test_previous_business_day(day: u32, expected: u32) {
        let date = NaiveDate::from_ymd_opt(2024, 1, day).unwrap();
        assert_eq!(
            previous_business_day(date),
            NaiveDate::from_ymd_opt(2024, 1, expected).unwrap()
        );
    }

    #[test]
    fn test_last_closed_session() {
        let before = istanbul(2024, 1, 17, 12, 0);
        let after = istanbul(2024, 1, 17, 19, 0);
        let saturday = istanbul(2024, 1, 20, 20, 0);
        let d = |day| NaiveDate::from_ymd_opt(2024, 1, day).unwrap();
        assert_eq!(last_closed_session(before, BIST_TZ, cutoff()), d(16));
        assert_eq!(last_closed_session(after, BIST_TZ, cutoff()), d(17));
        assert_eq!(last_closed_session(saturday, BIST_TZ, cutoff()), d(19));
    }

    #[test]
    fn test_trim_only_before_cutoff() {
        let bars = vec![
            daily_bar(16, 1.0, 1.0, 1.0, 1.0),
            daily_bar(17, 1.0, 1.0, 1.0, 2.0),
        ];

        let mut early = bars.clone();
        assert!(trim_in_progress_bar(&mut early, istanbul(2024, 1, 17, 15, 0), BIST_TZ, cutoff()));
        assert_eq!(early.len(), 1);

        let mut late = bars.clone();
        assert!(!trim_in_progress_bar(&mut late, istanbul(2024, 1, 17, 18, 45), BIST_TZ, cutoff()));
        assert_eq!(late.len(), 2);

        let mut single = bars[..1].to_vec();
        assert!(!trim_in_progress_bar(&mut single, istanbul(2024, 1, 17, 15, 0), BIST_TZ, cutoff()));
    }

    #[test]
    fn test_history_days_switches_at_cutoff() {
        assert_eq!(history_days(istanbul(2024, 1, 17, 9, 0), BIST_TZ, cutoff(), 30, 15), 30);
        assert_eq!(history_days(istanbul(2024, 1, 17, 20, 0), BIST_TZ, cutoff(), 30, 15), 15);
    }

    #[test]
    fn test_trading_hours_filter() {
        let mk = |ts| Bar {
            timestamp: ts,
            ..daily_bar(17, 1.0, 1.0, 1.0, 1.0)
        };
        let bars = vec![
            mk(istanbul(2024, 1, 17, 9, 0)),
            mk(istanbul(2024, 1, 17, 10, 0)),
            mk(istanbul(2024, 1, 17, 17, 0)),
            mk(istanbul(2024, 1, 17, 18, 0)),
            mk(istanbul(2024, 1, 20, 12, 0)),
        ];
        let kept = filter_trading_hours(bars, BIST_TZ);
        assert_eq!(kept.len(), 2);
    }

    #[test]
    fn test_simulated_hourly_bars() {
        let daily = vec![
            daily_bar(16, 10.0, 12.0, 9.0, 11.0),
            daily_bar(17, 11.0, 15.0, 11.0, 14.5),
        ];
        let hourly = simulate_hourly_from_daily(&daily, 1, BIST_TZ);
        assert_eq!(hourly.len(), 8);
        assert_eq!(hourly[0].close, 11.0);
        assert_eq!(hourly[7].close, 14.5);
        assert!((hourly[0].volume - 100.0).abs() < 1e-12);
        assert!(hourly.iter().all(|b| in_trading_hours(b.timestamp, BIST_TZ)));
        assert!(hourly.windows(2).all(|w| w[0].close <= w[1].close));
        assert!((hourly[3].high - hourly[3].close * 1.001).abs() < 1e-12);
    }
}
