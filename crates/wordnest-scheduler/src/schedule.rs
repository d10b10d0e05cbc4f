//! Fire-time arithmetic: turning a local `HH:MM` and a timezone into absolute instants.
//!
//! Local times that don't exist (spring-forward gap) resolve to the first valid
//! minute after the gap; ambiguous ones (fall-back overlap) resolve to the
//! earlier instant.

use chrono::{DateTime, Duration, LocalResult, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;

use wordnest_core::config::RearmStrategy;
use wordnest_core::types::DeliveryTime;

/// Fixed repeat period for `RearmStrategy::FixedInterval`.
pub fn daily_interval() -> Duration {
    Duration::hours(24)
}

/// Longest DST gap we walk across, in minutes.
const MAX_GAP_MINUTES: i64 = 3 * 60;

/// Absolute instant of `time` on local `date` in `tz`.
pub fn resolve_local(tz: Tz, date: NaiveDate, time: DeliveryTime) -> Option<DateTime<Utc>> {
    let naive: NaiveDateTime = date.and_hms_opt(time.hour(), time.minute(), 0)?;
    for step in 0..=MAX_GAP_MINUTES {
        match tz.from_local_datetime(&(naive + Duration::minutes(step))) {
            LocalResult::Single(dt) => return Some(dt.with_timezone(&Utc)),
            LocalResult::Ambiguous(earliest, _) => return Some(earliest.with_timezone(&Utc)),
            LocalResult::None => continue,
        }
    }
    None
}

/// First fire strictly after `now`: today at `time` in `tz`, or tomorrow if
/// that moment has already passed.
pub fn first_fire(time: DeliveryTime, tz: Tz, now: DateTime<Utc>) -> DateTime<Utc> {
    let today = now.with_timezone(&tz).date_naive();
    let mut date = today;
    // Two iterations normally suffice; the bound only guards against a tz
    // database that skips a whole day.
    for _ in 0..3 {
        if let Some(candidate) = resolve_local(tz, date, time) {
            if candidate > now {
                return candidate;
            }
        }
        date = match date.succ_opt() {
            Some(d) => d,
            None => break,
        };
    }
    now + daily_interval()
}

/// The fire after `previous`, given the rearm strategy. Never at or before `now`.
pub fn next_fire(
    strategy: RearmStrategy,
    time: DeliveryTime,
    tz: Tz,
    previous: DateTime<Utc>,
    now: DateTime<Utc>,
) -> DateTime<Utc> {
    match strategy {
        RearmStrategy::WallClock => first_fire(time, tz, previous.max(now)),
        RearmStrategy::FixedInterval => {
            let mut next = previous + daily_interval();
            // Skip fires missed while the process was suspended.
            while next <= now {
                next += daily_interval();
            }
            next
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;
    use chrono_tz::{Asia::Tehran, Europe::Berlin, UTC};

    fn t(h: u32, m: u32) -> DeliveryTime {
        DeliveryTime::new(h, m).unwrap()
    }

    fn local(tz: Tz, y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        tz.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn test_time_passed_today_fires_tomorrow() {
        let now = local(Tehran, 2026, 5, 10, 10, 0);
        let fire = first_fire(t(9, 0), Tehran, now);
        assert_eq!(fire, local(Tehran, 2026, 5, 11, 9, 0));
    }

    #[test]
    fn test_time_later_today_fires_today() {
        let now = local(Tehran, 2026, 5, 10, 8, 0);
        let fire = first_fire(t(9, 0), Tehran, now);
        assert_eq!(fire, local(Tehran, 2026, 5, 10, 9, 0));
    }

    #[test]
    fn test_exactly_now_is_not_future() {
        let now = local(UTC, 2026, 1, 1, 9, 0);
        assert_eq!(first_fire(t(9, 0), UTC, now), local(UTC, 2026, 1, 2, 9, 0));
    }

    #[test]
    fn test_local_date_differs_from_utc_date() {
        // 22:00 UTC on the 10th is already the 11th in Tehran (UTC+3:30).
        let now = Utc.with_ymd_and_hms(2026, 5, 10, 22, 0, 0).unwrap();
        let fire = first_fire(t(7, 0), Tehran, now);
        assert_eq!(fire, local(Tehran, 2026, 5, 11, 7, 0));
    }

    #[test]
    fn test_spring_forward_gap_resolves_after_gap() {
        // Berlin skips 02:00–03:00 on 2026-03-29.
        let date = NaiveDate::from_ymd_opt(2026, 3, 29).unwrap();
        let fire = resolve_local(Berlin, date, t(2, 30)).unwrap();
        assert_eq!(fire, local(Berlin, 2026, 3, 29, 3, 0));
    }

    #[test]
    fn test_fall_back_overlap_takes_earlier() {
        // Berlin repeats 02:00–03:00 on 2026-10-25; first pass is still CEST (UTC+2).
        let date = NaiveDate::from_ymd_opt(2026, 10, 25).unwrap();
        let fire = resolve_local(Berlin, date, t(2, 30)).unwrap();
        assert_eq!(fire, Utc.with_ymd_and_hms(2026, 10, 25, 0, 30, 0).unwrap());
    }

    #[test]
    fn test_wall_clock_rearm_keeps_local_time_across_dst() {
        let fired = local(Berlin, 2026, 3, 28, 9, 0);
        let next = next_fire(RearmStrategy::WallClock, t(9, 0), Berlin, fired, fired);
        assert_eq!(next, local(Berlin, 2026, 3, 29, 9, 0));
        assert_eq!(next - fired, Duration::hours(23));
        assert_eq!(next.with_timezone(&Berlin).hour(), 9);
    }

    #[test]
    fn test_fixed_interval_rearm_drifts_across_dst() {
        let fired = local(Berlin, 2026, 3, 28, 9, 0);
        let next = next_fire(RearmStrategy::FixedInterval, t(9, 0), Berlin, fired, fired);
        assert_eq!(next - fired, Duration::hours(24));
        assert_eq!(next.with_timezone(&Berlin).hour(), 10);
    }

    #[test]
    fn test_fixed_interval_skips_missed_fires() {
        let fired = local(UTC, 2026, 1, 1, 9, 0);
        let now = local(UTC, 2026, 1, 3, 12, 0);
        let next = next_fire(RearmStrategy::FixedInterval, t(9, 0), UTC, fired, now);
        assert_eq!(next, local(UTC, 2026, 1, 4, 9, 0));
    }

    #[test]
    fn test_wall_clock_rearm_after_late_wakeup() {
        let fired = local(UTC, 2026, 1, 1, 9, 0);
        let now = fired + Duration::milliseconds(3);
        let next = next_fire(RearmStrategy::WallClock, t(9, 0), UTC, fired, now);
        assert_eq!(next, local(UTC, 2026, 1, 2, 9, 0));
    }
}
