//! Release calendar scenarios.

use chrono::{DateTime, Datelike, Duration, TimeZone, Timelike, Utc, Weekday};
use chrono_tz::America::New_York;
use chrono_tz::Tz;
use tubular_core::{next_release_datetime, ReleaseSchedule};

fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Tz> {
    New_York.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
}

#[test]
fn friday_after_cutoff_releases_monday_at_cutoff() {
    let friday = at(2024, 1, 5, 11, 0);
    assert_eq!(friday.weekday(), Weekday::Fri);

    let release = next_release_datetime(&friday, &ReleaseSchedule::default());
    assert_eq!(release.weekday(), Weekday::Mon);
    assert_eq!(release, at(2024, 1, 8, 10, 0));
}

#[test]
fn cutoff_boundary_over_a_whole_week() {
    let schedule = ReleaseSchedule::default();

    for offset in 0..7 {
        let day = at(2024, 1, 1, 0, 0) + Duration::days(offset);
        let before = day + Duration::minutes(9 * 60 + 59);
        let after = day + Duration::minutes(10 * 60 + 1);

        let early = next_release_datetime(&before, &schedule);
        if matches!(day.weekday(), Weekday::Sat | Weekday::Sun) {
            assert_eq!(early.weekday(), Weekday::Mon, "{day}");
            assert!(early.date_naive() > day.date_naive());
        } else {
            assert_eq!(early.date_naive(), day.date_naive(), "{day}");
        }

        let late = next_release_datetime(&after, &schedule);
        assert!(late.date_naive() > day.date_naive(), "{day}");
        assert!(schedule.weekdays().contains(&late.weekday()));
        assert_eq!(late.time(), schedule.cutoff());
    }
}

#[test]
fn summer_cutoff_is_ten_o_clock_daylight_time() {
    let schedule = ReleaseSchedule::default();

    // 13:59 UTC is 09:59 EDT: same day
    let early = Utc.with_ymd_and_hms(2024, 7, 10, 13, 59, 0).unwrap();
    let release = next_release_datetime(&early, &schedule);
    assert_eq!(release, at(2024, 7, 10, 10, 0));
    assert_eq!(release.with_timezone(&Utc).hour(), 14);

    // 14:30 UTC is 10:30 EDT: cutoff already passed
    let late = Utc.with_ymd_and_hms(2024, 7, 10, 14, 30, 0).unwrap();
    let release = next_release_datetime(&late, &schedule);
    assert!(release.date_naive() > late.with_timezone(&New_York).date_naive());
    assert_eq!(release, at(2024, 7, 11, 10, 0));
}

#[test]
fn release_across_spring_forward_keeps_local_cutoff() {
    // Friday 2024-03-08 is EST, Monday 2024-03-11 is EDT
    let release = next_release_datetime(&at(2024, 3, 8, 11, 0), &ReleaseSchedule::default());
    assert_eq!(release.time(), ReleaseSchedule::default().cutoff());
    assert_eq!(
        release.with_timezone(&Utc),
        Utc.with_ymd_and_hms(2024, 3, 11, 14, 0, 0).unwrap()
    );
}

#[test]
fn release_is_never_before_now() {
    let schedule = ReleaseSchedule::default();
    let start = at(2024, 3, 1, 0, 0);
    for hours in (0..24 * 14).step_by(5) {
        let now = start + Duration::hours(hours);
        assert!(next_release_datetime(&now, &schedule) >= now, "{now}");
    }
}
