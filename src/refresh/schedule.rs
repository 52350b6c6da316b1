//! Next-fire-time policies for the refresh timers. Pure functions of their
//! inputs; all arithmetic is in UTC.

use chrono::{DateTime, Duration, Timelike, Utc};

use crate::config::player_insight_windows::{
    FINAL_LEAD_MINUTES, FINAL_MINUTES, HOURLY_MINUTES, LONG_RANGE_HOURS, LONG_RANGE_STEP_HOURS,
    QUARTER_HOUR_MINUTES,
};
use crate::config::TEAM_INSIGHT_INTERVAL_HOURS;

/// Top of the hour following `now + 1h`.
pub fn next_contest_update(now: DateTime<Utc>) -> DateTime<Utc> {
    top_of_hour_after(now, 1)
}

/// Top of the hour following `now + 6h`. Contest start time plays no part.
pub fn next_team_insight_update(now: DateTime<Utc>) -> DateTime<Utc> {
    top_of_hour_after(now, TEAM_INSIGHT_INTERVAL_HOURS)
}

/// When to refresh player insight for a contest starting at `start`, or None
/// once the contest is close enough to lock that no refresh is worth it.
/// Any returned time is strictly after `now` and strictly before `start`.
pub fn next_player_insight_update(now: DateTime<Utc>, start: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let remaining = start - now;

    if remaining > Duration::hours(LONG_RANGE_HOURS) {
        // 14-hour multiples counted back from start. Flooring to the hour can
        // land in the past when now sits just past such a point.
        let steps = remaining.num_hours() / LONG_RANGE_STEP_HOURS;
        let mut at = floor_to_hour(start - Duration::hours(steps * LONG_RANGE_STEP_HOURS));
        if at <= now {
            at += Duration::hours(1);
        }
        Some(at)
    } else if remaining > Duration::minutes(HOURLY_MINUTES) {
        Some(top_of_hour_after(now, 1))
    } else if remaining > Duration::minutes(QUARTER_HOUR_MINUTES) {
        let minute = i64::from(now.minute());
        let at = floor_to_minute(now + Duration::minutes(16 - (minute + 1) % 15));
        if at >= start {
            Some(final_refresh(start))
        } else {
            Some(at)
        }
    } else if remaining > Duration::minutes(FINAL_MINUTES) {
        Some(final_refresh(start))
    } else {
        None
    }
}

fn final_refresh(start: DateTime<Utc>) -> DateTime<Utc> {
    floor_to_minute(start - Duration::minutes(FINAL_LEAD_MINUTES))
}

/// `now + hours`, floored to the hour. A result landing on minute 59 is first
/// pushed into the next hour.
fn top_of_hour_after(now: DateTime<Utc>, hours: i64) -> DateTime<Utc> {
    let mut at = now + Duration::hours(hours);
    if at.minute() == 59 {
        at += Duration::minutes(1);
    }
    floor_to_hour(at)
}

fn floor_to_hour(t: DateTime<Utc>) -> DateTime<Utc> {
    t - Duration::seconds(t.timestamp().rem_euclid(3600)) - Duration::nanoseconds(i64::from(t.nanosecond()))
}

fn floor_to_minute(t: DateTime<Utc>) -> DateTime<Utc> {
    t - Duration::seconds(t.timestamp().rem_euclid(60)) - Duration::nanoseconds(i64::from(t.nanosecond()))
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, h, m, s).unwrap()
    }

    #[test]
    fn contest_timer_rounds_to_next_hour() {
        assert_eq!(next_contest_update(at(10, 0, 0)), at(11, 0, 0));
        assert_eq!(next_contest_update(at(10, 58, 59)), at(11, 0, 0));
        // minute-59 guard
        assert_eq!(next_contest_update(at(10, 59, 30)), at(12, 0, 0));
    }

    #[test]
    fn team_timer_is_six_hours_out() {
        assert_eq!(next_team_insight_update(at(3, 20, 0)), at(9, 0, 0));
        assert_eq!(next_team_insight_update(at(3, 59, 1)), at(10, 0, 0));
    }

    #[test]
    fn long_range_lands_on_fourteen_hour_boundary() {
        let now = at(0, 0, 0);
        let start = at(20, 0, 0);
        let next = next_player_insight_update(now, start).unwrap();
        assert_eq!(next, at(6, 0, 0));
        assert_eq!((start - next).num_hours() % 14, 0);
    }

    #[test]
    fn long_range_never_returns_the_past() {
        // start - 28h = 00:40, floors to 00:00 which is before now
        let now = at(0, 30, 0);
        let start = at(14, 40, 0) + Duration::hours(14);
        let next = next_player_insight_update(now, start).unwrap();
        assert_eq!(next, at(1, 0, 0));
    }

    #[test]
    fn hourly_window() {
        let now = at(10, 20, 0);
        let start = now + Duration::minutes(120);
        assert_eq!(next_player_insight_update(now, start), Some(at(11, 0, 0)));
    }

    #[test]
    fn quarter_hour_window() {
        let start = at(12, 0, 0);
        // 80 minutes out: next quarter-hour boundary
        assert_eq!(next_player_insight_update(at(10, 40, 0), start), Some(at(10, 45, 0)));
        assert_eq!(next_player_insight_update(at(10, 44, 10), start), Some(at(11, 0, 0)));
        assert_eq!(next_player_insight_update(at(10, 45, 0), start), Some(at(11, 0, 0)));
        // the boundary would pass start, so fall back to the final refresh
        assert_eq!(next_player_insight_update(at(11, 44, 0), start), Some(at(11, 55, 0)));
    }

    #[test]
    fn final_window_is_five_minutes_before_start() {
        let start = at(12, 0, 30);
        let now = start - Duration::minutes(10);
        assert_eq!(next_player_insight_update(now, start), Some(at(11, 55, 0)));
    }

    #[test]
    fn no_refresh_close_to_lock() {
        let start = at(12, 0, 0);
        assert_eq!(next_player_insight_update(start - Duration::minutes(4), start), None);
        assert_eq!(next_player_insight_update(start - Duration::minutes(6), start), None);
        assert_eq!(next_player_insight_update(start, start), None);
        assert_eq!(next_player_insight_update(start + Duration::hours(1), start), None);
    }

    #[test]
    fn every_result_falls_between_now_and_start() {
        for now_offset in [0, 7, 59 * 60 + 31, 3 * 3600 + 17 * 60 + 5] {
            let now = at(0, 0, 0) + Duration::seconds(now_offset);
            let mut remaining = Duration::seconds(1);
            while remaining < Duration::hours(72) {
                let start = now + remaining;
                if let Some(next) = next_player_insight_update(now, start) {
                    assert!(next > now, "now={now} start={start} next={next}");
                    assert!(next < start, "now={now} start={start} next={next}");
                } else {
                    assert!(remaining <= Duration::minutes(FINAL_MINUTES), "now={now} start={start}");
                }
                remaining += Duration::seconds(433);
            }
        }
    }
}
