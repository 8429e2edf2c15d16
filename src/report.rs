use std::collections::{BTreeMap, HashMap};
use std::fmt::Write;

use chrono::Datelike;
use serde::Serialize;

use crate::models::{EventRow, WorkMode};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValueCount {
    pub value: String,
    pub count: usize,
}

/// Most frequent values first; ties in label order. Missing values count as `(üres)`.
pub fn value_counts<'a>(values: impl Iterator<Item = Option<&'a str>>, limit: usize) -> Vec<ValueCount> {
    let mut map: HashMap<&str, usize> = HashMap::new();
    for value in values {
        *map.entry(value.unwrap_or("(üres)")).or_insert(0) += 1;
    }

    let mut counts: Vec<ValueCount> = map
        .into_iter()
        .map(|(value, count)| ValueCount {
            value: value.to_string(),
            count,
        })
        .collect();
    counts.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.value.cmp(&b.value)));
    counts.truncate(limit);
    counts
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Spread {
    pub min: usize,
    pub median: f64,
    pub mean: f64,
    pub max: usize,
}

fn spread(mut values: Vec<usize>) -> Option<Spread> {
    if values.is_empty() {
        return None;
    }
    values.sort_unstable();
    let n = values.len();
    let median = if n % 2 == 1 {
        values[n / 2] as f64
    } else {
        (values[n / 2 - 1] + values[n / 2]) as f64 / 2.0
    };
    Some(Spread {
        min: values[0],
        median,
        mean: values.iter().sum::<usize>() as f64 / n as f64,
        max: values[n - 1],
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BasicStats {
    pub rows: usize,
    pub columns: usize,
    pub distinct_subjects: usize,
    pub events_per_subject: Option<Spread>,
    pub event_names: Vec<ValueCount>,
    pub categories: Vec<ValueCount>,
    pub work_modes: Vec<ValueCount>,
    pub three_way: Vec<ValueCount>,
}

pub fn basic_stats(rows: &[EventRow], columns: usize) -> BasicStats {
    let mut per_subject: HashMap<i64, usize> = HashMap::new();
    for user_id in rows.iter().filter_map(|row| row.user_id) {
        *per_subject.entry(user_id).or_insert(0) += 1;
    }

    BasicStats {
        rows: rows.len(),
        columns,
        distinct_subjects: per_subject.len(),
        events_per_subject: spread(per_subject.into_values().collect()),
        event_names: value_counts(rows.iter().map(|r| r.event_name.as_deref()), 10),
        categories: value_counts(rows.iter().map(|r| Some(r.category.as_str())), 10),
        work_modes: value_counts(rows.iter().map(|r| r.work_mode.map(|m| m.as_str())), 10),
        three_way: value_counts(rows.iter().map(|r| r.three_way.map(|m| m.as_str())), 10),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimePart {
    Month,
    IsoWeek,
    Day,
    Hour,
}

impl TimePart {
    pub const ALL: [TimePart; 4] = [TimePart::Month, TimePart::IsoWeek, TimePart::Day, TimePart::Hour];

    pub fn as_str(&self) -> &'static str {
        match self {
            TimePart::Month => "hónap",
            TimePart::IsoWeek => "hét",
            TimePart::Day => "nap",
            TimePart::Hour => "óra",
        }
    }

    fn of(&self, row: &EventRow) -> Option<u32> {
        match self {
            TimePart::Month => row.month,
            TimePart::IsoWeek => row.iso_week,
            TimePart::Day => row.day,
            TimePart::Hour => row.hour,
        }
    }
}

/// Which label a distribution table is broken down by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grouping {
    Category,
    WorkMode,
    ThreeWay,
}

impl Grouping {
    pub const ALL: [Grouping; 3] = [Grouping::Category, Grouping::WorkMode, Grouping::ThreeWay];

    pub fn file_stem(&self) -> &'static str {
        match self {
            Grouping::Category => "category",
            Grouping::WorkMode => "work_mode",
            Grouping::ThreeWay => "three_way",
        }
    }

    fn of(&self, row: &EventRow) -> Option<&'static str> {
        match self {
            Grouping::Category => Some(row.category.as_str()),
            Grouping::WorkMode => row.work_mode.map(|m| m.as_str()),
            Grouping::ThreeWay => row.three_way.map(|m| m.as_str()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DistributionRow {
    pub time_part: &'static str,
    pub bucket: u32,
    pub label: &'static str,
    pub count: usize,
}

/// Long-format counts per (time part, bucket, label).
pub fn distribution(rows: &[EventRow], grouping: Grouping) -> Vec<DistributionRow> {
    let mut out = Vec::new();
    for part in TimePart::ALL {
        let mut counts: BTreeMap<(u32, &'static str), usize> = BTreeMap::new();
        for row in rows {
            if let (Some(bucket), Some(label)) = (part.of(row), grouping.of(row)) {
                *counts.entry((bucket, label)).or_insert(0) += 1;
            }
        }
        out.extend(counts.into_iter().map(|((bucket, label), count)| DistributionRow {
            time_part: part.as_str(),
            bucket,
            label,
            count,
        }));
    }
    out
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthlySplit {
    pub month: String,
    pub in_class: usize,
    pub at_home: usize,
}

pub fn monthly_split(rows: &[EventRow]) -> Vec<MonthlySplit> {
    let mut months: BTreeMap<(i32, u32), (usize, usize)> = BTreeMap::new();
    for row in rows {
        let (Some(ts), Some(mode)) = (row.timestamp, row.work_mode) else {
            continue;
        };
        let entry = months.entry((ts.year(), ts.month())).or_insert((0, 0));
        match mode {
            WorkMode::InClass => entry.0 += 1,
            WorkMode::AtHome => entry.1 += 1,
        }
    }

    months
        .into_iter()
        .map(|((year, month), (in_class, at_home))| MonthlySplit {
            month: format!("{year}-{month:02}"),
            in_class,
            at_home,
        })
        .collect()
}

fn write_counts(output: &mut String, title: &str, counts: &[ValueCount]) {
    let _ = writeln!(output);
    let _ = writeln!(output, "### {title}");
    if counts.is_empty() {
        let _ = writeln!(output, "No values recorded.");
    } else {
        for entry in counts {
            let _ = writeln!(output, "- {}: {}", entry.value, entry.count);
        }
    }
}

pub fn build_report(source: &str, stats: &BasicStats, monthly: &[MonthlySplit], tables: &[String]) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# LMS Activity Analysis");
    let _ = writeln!(output, "Generated from {source}");
    let _ = writeln!(output);
    let _ = writeln!(output, "## Basic Statistics");
    let _ = writeln!(output, "- Rows: {}", stats.rows);
    let _ = writeln!(output, "- Columns: {}", stats.columns);
    let _ = writeln!(output, "- Distinct subjects: {}", stats.distinct_subjects);

    match stats.events_per_subject {
        Some(spread) => {
            let _ = writeln!(
                output,
                "- Events per subject: min {}, median {:.1}, mean {:.1}, max {}",
                spread.min, spread.median, spread.mean, spread.max
            );
        }
        None => {
            let _ = writeln!(output, "- Events per subject: no subject ids in this table");
        }
    }

    write_counts(&mut output, "Event names (top 10)", &stats.event_names);
    write_counts(&mut output, "Categories", &stats.categories);
    write_counts(&mut output, "Work mode", &stats.work_modes);
    write_counts(&mut output, "Three-way work mode", &stats.three_way);

    let _ = writeln!(output);
    let _ = writeln!(output, "## Monthly In-class vs At-home");
    if monthly.is_empty() {
        let _ = writeln!(output, "No dated rows in this table.");
    } else {
        let _ = writeln!(output, "| Month | Órai | Otthoni |");
        let _ = writeln!(output, "|---|---:|---:|");
        for month in monthly {
            let _ = writeln!(output, "| {} | {} | {} |", month.month, month.in_class, month.at_home);
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Tables and Charts");
    for table in tables {
        let _ = writeln!(output, "- {table}");
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Category, RawEventRow, ThreeWayMode};
    use chrono::NaiveDateTime;

    fn row(user_id: Option<i64>, category: Category, mode: WorkMode, ts: &str) -> EventRow {
        let timestamp = NaiveDateTime::parse_from_str(ts, "%Y-%m-%d %H:%M:%S").unwrap();
        let mut row = EventRow::from_raw(RawEventRow::default(), Some(timestamp));
        row.user_id = user_id;
        row.category = category;
        row.work_mode = Some(mode);
        row.three_way = Some(ThreeWayMode::AtHome);
        let parts = crate::temporal::time_parts(timestamp);
        row.month = Some(parts.month);
        row.iso_week = Some(parts.iso_week);
        row.day = Some(parts.day);
        row.hour = Some(parts.hour);
        row
    }

    fn rows() -> Vec<EventRow> {
        vec![
            row(Some(1), Category::InClass, WorkMode::InClass, "2025-03-19 09:00:00"),
            row(Some(1), Category::Homework, WorkMode::AtHome, "2025-03-20 20:00:00"),
            row(Some(1), Category::Homework, WorkMode::AtHome, "2025-04-02 20:00:00"),
            row(Some(2), Category::Homework, WorkMode::AtHome, "2025-04-03 21:00:00"),
            row(None, Category::Other, WorkMode::AtHome, "2025-04-03 21:30:00"),
        ]
    }

    #[test]
    fn value_counts_sort_by_frequency() {
        let counts = value_counts(["b", "a", "b", "c", "a", "b"].into_iter().map(Some), 2);
        assert_eq!(counts.len(), 2);
        assert_eq!(counts[0], ValueCount { value: "b".into(), count: 3 });
        assert_eq!(counts[1].value, "a");
    }

    #[test]
    fn stats_count_subjects_and_spread() {
        let stats = basic_stats(&rows(), 18);
        assert_eq!(stats.rows, 5);
        assert_eq!(stats.distinct_subjects, 2);
        let spread = stats.events_per_subject.unwrap();
        assert_eq!((spread.min, spread.max), (1, 3));
        assert_eq!(spread.median, 2.0);
        assert_eq!(stats.categories[0].value, "Hazi");
        assert_eq!(stats.event_names[0].value, "(üres)");
    }

    #[test]
    fn distribution_is_long_format_per_time_part() {
        let table = distribution(&rows(), Grouping::WorkMode);
        let months: Vec<&DistributionRow> = table.iter().filter(|r| r.time_part == "hónap").collect();
        assert_eq!(months.len(), 3);
        assert_eq!(months[0].bucket, 3);
        assert_eq!(months[0].label, "Otthoni");
        assert_eq!(months[1].label, "Órai");
        assert!(table.iter().any(|r| r.time_part == "óra" && r.bucket == 21 && r.count == 2));
    }

    #[test]
    fn monthly_split_counts_modes() {
        let monthly = monthly_split(&rows());
        assert_eq!(
            monthly,
            vec![
                MonthlySplit { month: "2025-03".into(), in_class: 1, at_home: 1 },
                MonthlySplit { month: "2025-04".into(), in_class: 0, at_home: 3 },
            ]
        );
    }

    #[test]
    fn report_includes_sections() {
        let rows = rows();
        let report = build_report(
            "df_remaining_export.csv",
            &basic_stats(&rows, 18),
            &monthly_split(&rows),
            &["distribution_category.csv".to_string()],
        );
        assert!(report.starts_with("# LMS Activity Analysis"));
        assert!(report.contains("- Distinct subjects: 2"));
        assert!(report.contains("| 2025-04 | 0 | 3 |"));
        assert!(report.contains("- distribution_category.csv"));
    }

    #[test]
    fn empty_table_reports_gracefully() {
        let report = build_report("x.csv", &basic_stats(&[], 0), &[], &[]);
        assert!(report.contains("no subject ids"));
        assert!(report.contains("No dated rows"));
    }
}
