//! Weekly aggregation of per-event rows.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;

use crate::models::{Category, EventRow, WeeklyCount, WeeklyEvent};
use crate::temporal::{iso_week_start, iso_year_week};

/// `W12-2025`, or `W12-2025 | Orai` when a category is given.
pub fn weekly_activity_name(iso_year: i32, iso_week: u32, category: Option<Category>) -> String {
    match category {
        Some(category) => format!("W{iso_week:02}-{iso_year} | {category}"),
        None => format!("W{iso_week:02}-{iso_year}"),
    }
}

fn dated_rows(rows: &[EventRow]) -> impl Iterator<Item = (i64, NaiveDateTime, &EventRow)> {
    rows.iter()
        .filter_map(|row| Some((row.user_id?, row.timestamp?, row)))
}

/// One event per (subject, ISO year, ISO week[, category]).
///
/// `first_seen` is the earliest input timestamp of the group; `timestamp` is
/// that ISO week's Monday 00:00. Output is ordered by case id then time.
pub fn weekly_events(rows: &[EventRow], include_category: bool) -> Vec<WeeklyEvent> {
    let mut groups: BTreeMap<(i64, i32, u32, Option<Category>), WeeklyEvent> = BTreeMap::new();

    for (user_id, ts, row) in dated_rows(rows) {
        let (iso_year, iso_week) = iso_year_week(ts);
        let category = include_category.then_some(row.category);
        groups
            .entry((user_id, iso_year, iso_week, category))
            .and_modify(|event| {
                if ts < event.first_seen {
                    event.first_seen = ts;
                }
            })
            .or_insert_with(|| WeeklyEvent {
                case_id: user_id.to_string(),
                iso_year,
                iso_week,
                category,
                activity: weekly_activity_name(iso_year, iso_week, category),
                first_seen: ts,
                timestamp: iso_week_start(ts),
            });
    }

    let mut events: Vec<WeeklyEvent> = groups.into_values().collect();
    events.sort_by(|a, b| {
        a.case_id
            .cmp(&b.case_id)
            .then_with(|| a.timestamp.cmp(&b.timestamp))
    });
    events
}

/// Raw event counts per (subject, ISO year, ISO week, category).
pub fn weekly_counts(rows: &[EventRow]) -> Vec<WeeklyCount> {
    let mut counts: BTreeMap<(i64, i32, u32, &'static str), (Category, usize)> = BTreeMap::new();

    for (user_id, ts, row) in dated_rows(rows) {
        let (iso_year, iso_week) = iso_year_week(ts);
        counts
            .entry((user_id, iso_year, iso_week, row.category.as_str()))
            .or_insert((row.category, 0))
            .1 += 1;
    }

    counts
        .into_iter()
        .map(|((user_id, iso_year, iso_week, _), (category, event_count))| WeeklyCount {
            user_id,
            iso_year,
            iso_week,
            category,
            event_count,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RawEventRow;

    fn dt(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    fn row(user_id: Option<i64>, category: Category, ts: Option<&str>) -> EventRow {
        let mut row = EventRow::from_raw(RawEventRow::default(), ts.map(dt));
        row.user_id = user_id;
        row.category = category;
        row
    }

    #[test]
    fn same_subject_same_week_collapses_to_one_event() {
        let rows = vec![
            row(Some(42), Category::InClass, Some("2025-03-21 18:00:00")),
            row(Some(42), Category::Exam, Some("2025-03-19 09:00:00")),
            row(Some(42), Category::InClass, Some("2025-03-23 23:59:00")),
        ];
        let events = weekly_events(&rows, false);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].activity, "W12-2025");
        assert_eq!(events[0].first_seen, dt("2025-03-19 09:00:00"));
        assert_eq!(events[0].timestamp, dt("2025-03-17 00:00:00"));
    }

    #[test]
    fn category_variant_keeps_one_event_per_category() {
        let rows = vec![
            row(Some(42), Category::InClass, Some("2025-03-19 09:00:00")),
            row(Some(42), Category::Exam, Some("2025-03-19 09:05:00")),
            row(Some(42), Category::InClass, Some("2025-03-20 11:00:00")),
        ];
        let events = weekly_events(&rows, true);
        let names: Vec<&str> = events.iter().map(|e| e.activity.as_str()).collect();
        assert_eq!(events.len(), 2);
        assert!(names.contains(&"W12-2025 | Orai"));
        assert!(names.contains(&"W12-2025 | Szamonkeres"));
    }

    #[test]
    fn rows_without_subject_or_time_are_skipped() {
        let rows = vec![
            row(None, Category::InClass, Some("2025-03-19 09:00:00")),
            row(Some(7), Category::InClass, None),
        ];
        assert!(weekly_events(&rows, true).is_empty());
        assert!(weekly_counts(&rows).is_empty());
    }

    #[test]
    fn events_are_ordered_by_case_then_time() {
        let rows = vec![
            row(Some(5), Category::InClass, Some("2025-03-26 09:00:00")),
            row(Some(42), Category::InClass, Some("2025-03-19 09:00:00")),
            row(Some(5), Category::InClass, Some("2025-03-19 09:00:00")),
        ];
        let events = weekly_events(&rows, false);
        let keys: Vec<(&str, u32)> = events.iter().map(|e| (e.case_id.as_str(), e.iso_week)).collect();
        assert_eq!(keys, vec![("42", 12), ("5", 12), ("5", 13)]);
    }

    #[test]
    fn counts_group_raw_events() {
        let rows = vec![
            row(Some(1), Category::InClass, Some("2025-03-19 09:00:00")),
            row(Some(1), Category::InClass, Some("2025-03-20 09:00:00")),
            row(Some(1), Category::Exam, Some("2025-03-20 09:00:00")),
            row(Some(1), Category::InClass, Some("2025-03-27 09:00:00")),
        ];
        let counts = weekly_counts(&rows);
        assert_eq!(counts.len(), 3);
        assert_eq!(counts[0].category, Category::InClass);
        assert_eq!(counts[0].event_count, 2);
        assert_eq!(counts[1].category, Category::Exam);
        assert_eq!(counts[1].event_count, 1);
        assert_eq!(counts[2].iso_week, 13);
    }
}
