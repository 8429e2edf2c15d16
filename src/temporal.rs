//! Localized timestamp parsing and calendar helpers.
//!
//! The LMS export renders times as `2025. március 17., 14:05:30`, sometimes
//! with a non-breaking space after the year or the day.

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use once_cell::sync::Lazy;
use regex::Regex;

static HU_TIMESTAMP: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(\d{4})\.\s*([A-Za-zÁÉÍÓÖŐÚÜŰáéíóöőúüű]+)\s+(\d{1,2})\.,\s*(\d{1,2}):(\d{2}):(\d{2})$",
    )
    .expect("timestamp pattern is valid")
});

const HU_MONTHS: [(&str, u32); 12] = [
    ("január", 1),
    ("február", 2),
    ("március", 3),
    ("április", 4),
    ("május", 5),
    ("június", 6),
    ("július", 7),
    ("augusztus", 8),
    ("szeptember", 9),
    ("október", 10),
    ("november", 11),
    ("december", 12),
];

fn month_number(name: &str) -> Option<u32> {
    let lower = name.to_lowercase();
    HU_MONTHS
        .iter()
        .find(|(month, _)| *month == lower)
        .map(|(_, number)| *number)
}

/// Parses a localized timestamp; anything off-pattern yields `None`.
pub fn parse_hu_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let clean = raw.replace('\u{a0}', " ");
    let caps = HU_TIMESTAMP.captures(clean.trim())?;

    let month = month_number(&caps[2])?;
    let day: u32 = caps[3].parse().ok()?;
    let hour: u32 = caps[4].parse().ok()?;
    let iso = format!(
        "{}-{:02}-{:02} {:02}:{}:{}",
        &caps[1], month, day, hour, &caps[5], &caps[6]
    );

    NaiveDateTime::parse_from_str(&iso, "%Y-%m-%d %H:%M:%S").ok()
}

/// Parses a configuration bound such as `2025-02-17 00:00:00`.
pub fn parse_bound(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(value, format) {
            return Some(parsed);
        }
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .map(|date| date.and_time(NaiveTime::MIN))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeParts {
    pub month: u32,
    pub iso_week: u32,
    pub day: u32,
    pub hour: u32,
}

pub fn time_parts(ts: NaiveDateTime) -> TimeParts {
    TimeParts {
        month: ts.month(),
        iso_week: ts.iso_week().week(),
        day: ts.day(),
        hour: ts.hour(),
    }
}

/// ISO-8601 (year, week) of a timestamp.
pub fn iso_year_week(ts: NaiveDateTime) -> (i32, u32) {
    let week = ts.iso_week();
    (week.year(), week.week())
}

/// Monday 00:00 of the ISO week containing `ts`.
pub fn iso_week_start(ts: NaiveDateTime) -> NaiveDateTime {
    let offset = ts.weekday().num_days_from_monday() as u64;
    (ts.date() - chrono::Days::new(offset)).and_time(NaiveTime::MIN)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dt(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    #[test]
    fn parses_localized_timestamp() {
        assert_eq!(
            parse_hu_timestamp("2025. március 17., 14:05:30"),
            Some(dt("2025-03-17 14:05:30"))
        );
    }

    #[test]
    fn pads_single_digit_day_and_hour() {
        assert_eq!(
            parse_hu_timestamp("2025. május 4., 8:00:05"),
            Some(dt("2025-05-04 08:00:05"))
        );
    }

    #[test]
    fn tolerates_non_breaking_space_and_case() {
        assert_eq!(
            parse_hu_timestamp("2025.\u{a0}Április 2.,\u{a0}9:50:00"),
            Some(dt("2025-04-02 09:50:00"))
        );
    }

    #[test]
    fn rejects_off_pattern_input() {
        assert_eq!(parse_hu_timestamp("not a date"), None);
        assert_eq!(parse_hu_timestamp("2025-03-17 14:05:30"), None);
        assert_eq!(parse_hu_timestamp("2025. smarch 17., 14:05:30"), None);
        assert_eq!(parse_hu_timestamp(""), None);
    }

    #[test]
    fn rejects_impossible_calendar_dates() {
        assert_eq!(parse_hu_timestamp("2025. február 30., 10:00:00"), None);
        assert_eq!(parse_hu_timestamp("2025. március 3., 25:00:00"), None);
    }

    #[test]
    fn parses_configuration_bounds() {
        assert_eq!(parse_bound("2025-02-17 00:00:00"), Some(dt("2025-02-17 00:00:00")));
        assert_eq!(parse_bound("2025-06-23T23:59:59"), Some(dt("2025-06-23 23:59:59")));
        assert_eq!(parse_bound("2025-06-23"), Some(dt("2025-06-23 00:00:00")));
        assert_eq!(parse_bound("june"), None);
    }

    #[test]
    fn iso_week_follows_first_thursday_rule() {
        // 2024-12-30 is a Monday belonging to ISO week 1 of 2025
        assert_eq!(iso_year_week(dt("2024-12-30 10:00:00")), (2025, 1));
        // 2021-01-03 is a Sunday belonging to ISO week 53 of 2020
        assert_eq!(iso_year_week(dt("2021-01-03 10:00:00")), (2020, 53));
        assert_eq!(iso_year_week(dt("2025-03-19 09:00:00")), (2025, 12));
    }

    #[test]
    fn week_start_is_monday_midnight() {
        assert_eq!(iso_week_start(dt("2025-03-22 10:00:00")), dt("2025-03-17 00:00:00"));
        assert_eq!(iso_week_start(dt("2025-03-17 00:00:00")), dt("2025-03-17 00:00:00"));
    }

    #[test]
    fn time_parts_split_calendar_fields() {
        let parts = time_parts(dt("2025-03-19 09:15:00"));
        assert_eq!(
            parts,
            TimeParts {
                month: 3,
                iso_week: 12,
                day: 19,
                hour: 9
            }
        );
    }
}
