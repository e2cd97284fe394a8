//! Release calendar.
//!
//! Releases go out at a fixed cutoff time on allowed weekdays. Anything
//! merged after the cutoff rolls to the next allowed day.

use chrono::{
    DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Weekday,
};
use chrono_tz::Tz;

use crate::error::ConfigError;

/// Cutoff time, `HH:MM`.
pub const ENV_RELEASE_CUTOFF: &str = "RELEASE_CUTOFF";
/// IANA name of the release zone, e.g. `America/New_York`.
pub const ENV_RELEASE_TZ: &str = "RELEASE_TZ";
/// Comma-separated weekday names, e.g. `mon,tue,wed,thu,fri`.
pub const ENV_RELEASE_WEEKDAYS: &str = "RELEASE_WEEKDAYS";

pub const DEFAULT_RELEASE_TZ: Tz = chrono_tz::America::New_York;

/// Allowed release weekdays and the daily cutoff in a named zone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseSchedule {
    weekdays: Vec<Weekday>,
    cutoff: NaiveTime,
    zone: Tz,
}

impl ReleaseSchedule {
    pub fn new(weekdays: Vec<Weekday>, cutoff: NaiveTime, zone: Tz) -> Result<Self, ConfigError> {
        if weekdays.is_empty() {
            return Err(ConfigError::NoReleaseWeekdays);
        }
        Ok(Self {
            weekdays,
            cutoff,
            zone,
        })
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let cutoff = match non_empty(lookup(ENV_RELEASE_CUTOFF)) {
            Some(raw) => NaiveTime::parse_from_str(raw.trim(), "%H:%M")
                .map_err(|_| invalid(ENV_RELEASE_CUTOFF, &raw))?,
            None => defaults.cutoff,
        };

        let zone = match non_empty(lookup(ENV_RELEASE_TZ)) {
            Some(raw) => raw
                .trim()
                .parse::<Tz>()
                .map_err(|_| invalid(ENV_RELEASE_TZ, &raw))?,
            None => defaults.zone,
        };

        let weekdays = match non_empty(lookup(ENV_RELEASE_WEEKDAYS)) {
            Some(raw) => raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| s.parse::<Weekday>().map_err(|_| invalid(ENV_RELEASE_WEEKDAYS, &raw)))
                .collect::<Result<Vec<_>, _>>()?,
            None => defaults.weekdays,
        };

        Self::new(weekdays, cutoff, zone)
    }

    pub fn weekdays(&self) -> &[Weekday] {
        &self.weekdays
    }

    pub fn cutoff(&self) -> NaiveTime {
        self.cutoff
    }

    pub fn zone(&self) -> Tz {
        self.zone
    }

    /// Next release at or after `now`; see [`next_release_datetime`].
    pub fn next_release<Z: TimeZone>(&self, now: &DateTime<Z>) -> DateTime<Tz> {
        next_release_datetime(now, self)
    }
}

impl Default for ReleaseSchedule {
    /// Monday to Friday, 10:00 US Eastern.
    fn default() -> Self {
        Self {
            weekdays: vec![
                Weekday::Mon,
                Weekday::Tue,
                Weekday::Wed,
                Weekday::Thu,
                Weekday::Fri,
            ],
            cutoff: NaiveTime::from_hms_opt(10, 0, 0).unwrap_or_default(),
            zone: DEFAULT_RELEASE_TZ,
        }
    }
}

/// Next release date-time for `now`.
///
/// `now` is viewed in the schedule's zone, daylight saving included. Before
/// the cutoff the candidate is today, otherwise tomorrow; the candidate then
/// advances one day at a time until it falls on an allowed weekday. The
/// result carries the cutoff time in local wall-clock terms.
pub fn next_release_datetime<Z: TimeZone>(
    now: &DateTime<Z>,
    schedule: &ReleaseSchedule,
) -> DateTime<Tz> {
    let local = now.with_timezone(&schedule.zone);

    let mut candidate = if local.time() < schedule.cutoff {
        local.date_naive()
    } else {
        local.date_naive() + Duration::days(1)
    };

    while !schedule.weekdays.contains(&candidate.weekday()) {
        candidate = candidate + Duration::days(1);
    }

    resolve_local(candidate.and_time(schedule.cutoff), schedule.zone)
}

/// Pin a wall-clock time to `zone`. Ambiguous times take the earlier
/// instant; times inside a spring-forward gap move to the first valid time.
fn resolve_local(naive: NaiveDateTime, zone: Tz) -> DateTime<Tz> {
    let mut wall = naive;
    loop {
        if let Some(resolved) = wall.and_local_timezone(zone).earliest() {
            return resolved;
        }
        wall += Duration::minutes(15);
    }
}

/// Standard release-candidate branch name, e.g. `rc/2024-01-05`.
pub fn rc_branch_name_for_date(date: NaiveDate) -> String {
    format!("rc/{}", date.format("%Y-%m-%d"))
}

/// First line of a commit message, cut to `max_length` characters with a
/// trailing `...` when it is that long or longer.
pub fn extract_message_summary(message: &str, max_length: usize) -> String {
    let title = message.lines().next().unwrap_or("");
    if title.chars().count() < max_length {
        title.to_string()
    } else {
        let head: String = title.chars().take(max_length).collect();
        format!("{head}...")
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn invalid(key: &str, value: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Timelike, Utc};
    use chrono_tz::America::New_York;
    use std::collections::HashMap;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Tz> {
        New_York.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    #[test]
    fn test_before_cutoff_on_weekday_is_same_day() {
        // Wednesday 2024-01-03
        let release = next_release_datetime(&at(2024, 1, 3, 9, 59), &ReleaseSchedule::default());
        assert_eq!(release, at(2024, 1, 3, 10, 0));
    }

    #[test]
    fn test_after_cutoff_is_strictly_later() {
        let now = at(2024, 1, 3, 10, 1);
        let release = next_release_datetime(&now, &ReleaseSchedule::default());
        assert!(release.date_naive() > now.date_naive());
        assert_eq!(release, at(2024, 1, 4, 10, 0));
    }

    #[test]
    fn test_exactly_at_cutoff_rolls_over() {
        let release = next_release_datetime(&at(2024, 1, 3, 10, 0), &ReleaseSchedule::default());
        assert_eq!(release, at(2024, 1, 4, 10, 0));
    }

    #[test]
    fn test_friday_after_cutoff_is_monday() {
        // Friday 2024-01-05 11:00 -> Monday 2024-01-08 10:00
        let release = next_release_datetime(&at(2024, 1, 5, 11, 0), &ReleaseSchedule::default());
        assert_eq!(release, at(2024, 1, 8, 10, 0));
        assert_eq!(release.weekday(), Weekday::Mon);
    }

    #[test]
    fn test_weekend_morning_is_monday() {
        // Saturday before the cutoff still skips to Monday
        let release = next_release_datetime(&at(2024, 1, 6, 8, 0), &ReleaseSchedule::default());
        assert_eq!(release, at(2024, 1, 8, 10, 0));
    }

    #[test]
    fn test_now_in_other_zone_is_converted() {
        // 14:30 UTC is 09:30 EST, so before the cutoff
        let now = Utc.with_ymd_and_hms(2024, 1, 3, 14, 30, 0).unwrap();
        let release = next_release_datetime(&now, &ReleaseSchedule::default());
        assert_eq!(release, at(2024, 1, 3, 10, 0));
    }

    #[test]
    fn test_cutoff_follows_daylight_saving() {
        // 14:30 UTC in July is 10:30 EDT, past the cutoff
        let now = Utc.with_ymd_and_hms(2024, 7, 10, 14, 30, 0).unwrap();
        let release = next_release_datetime(&now, &ReleaseSchedule::default());
        assert_eq!(release, at(2024, 7, 11, 10, 0));
        assert_eq!(release.with_timezone(&Utc).hour(), 14);
    }

    #[test]
    fn test_cutoff_inside_spring_forward_gap_moves_later() {
        // 02:30 does not exist in New York on 2024-03-10
        let schedule = ReleaseSchedule::new(
            vec![Weekday::Sun],
            NaiveTime::from_hms_opt(2, 30, 0).unwrap(),
            New_York,
        )
        .unwrap();
        let release = schedule.next_release(&at(2024, 3, 9, 12, 0));
        assert_eq!(release, at(2024, 3, 10, 3, 0));
    }

    #[test]
    fn test_custom_weekdays() {
        let schedule = ReleaseSchedule::new(
            vec![Weekday::Tue, Weekday::Thu],
            NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            New_York,
        )
        .unwrap();
        // Wednesday -> Thursday
        assert_eq!(
            schedule.next_release(&at(2024, 1, 3, 8, 0)),
            at(2024, 1, 4, 10, 0)
        );
    }

    #[test]
    fn test_empty_weekdays_rejected() {
        let err = ReleaseSchedule::new(vec![], NaiveTime::MIN, New_York).unwrap_err();
        assert_eq!(err, ConfigError::NoReleaseWeekdays);
    }

    #[test]
    fn test_schedule_from_lookup() {
        let vars: HashMap<&str, &str> = [
            (ENV_RELEASE_CUTOFF, "14:30"),
            (ENV_RELEASE_TZ, "Europe/London"),
            (ENV_RELEASE_WEEKDAYS, "mon, wed"),
        ]
        .into_iter()
        .collect();
        let schedule =
            ReleaseSchedule::from_lookup(|k| vars.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(schedule.cutoff(), NaiveTime::from_hms_opt(14, 30, 0).unwrap());
        assert_eq!(schedule.zone(), chrono_tz::Europe::London);
        assert_eq!(schedule.weekdays(), &[Weekday::Mon, Weekday::Wed]);
    }

    #[test]
    fn test_schedule_defaults_to_new_york() {
        let schedule = ReleaseSchedule::from_lookup(|_| None).unwrap();
        assert_eq!(schedule.zone(), New_York);
        assert_eq!(schedule, ReleaseSchedule::default());
    }

    #[test]
    fn test_schedule_from_lookup_rejects_bad_values() {
        let err = ReleaseSchedule::from_lookup(|k| {
            (k == ENV_RELEASE_CUTOFF).then(|| "ten o'clock".to_string())
        })
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));

        let err = ReleaseSchedule::from_lookup(|k| {
            (k == ENV_RELEASE_TZ).then(|| "US/Nowhere".to_string())
        })
        .unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidValue {
                key: ENV_RELEASE_TZ.to_string(),
                value: "US/Nowhere".to_string(),
            }
        );
    }

    #[test]
    fn test_rc_branch_name() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();
        assert_eq!(rc_branch_name_for_date(date), "rc/2024-01-05");
    }

    #[test]
    fn test_extract_message_summary() {
        assert_eq!(extract_message_summary("Fix bug\n\nDetails", 50), "Fix bug");
        let long = "a".repeat(60);
        assert_eq!(
            extract_message_summary(&long, 50),
            format!("{}...", "a".repeat(50))
        );
        assert_eq!(extract_message_summary("", 50), "");
    }
}
