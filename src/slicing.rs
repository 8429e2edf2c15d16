//! Subject split, time parts, named slices and the loop-free table.

use std::collections::BTreeSet;

use crate::models::{Category, EventRow, LoopFreeRow};
use crate::temporal::time_parts;

pub const DEFAULT_EXCLUDED_USERS: [i64; 7] = [96499, 605, 125110, 70866, 60896, 124612, 576];

/// Returns `(excluded, remaining)`. Rows without a subject id stay in `remaining`.
pub fn split_users(rows: Vec<EventRow>, excluded_ids: &[i64]) -> (Vec<EventRow>, Vec<EventRow>) {
    let (excluded, remaining): (Vec<_>, Vec<_>) = rows
        .into_iter()
        .partition(|row| row.user_id.is_some_and(|id| excluded_ids.contains(&id)));
    tracing::info!(
        excluded = excluded.len(),
        remaining = remaining.len(),
        "staff and test accounts split off"
    );
    (excluded, remaining)
}

pub fn add_time_parts(rows: Vec<EventRow>) -> Vec<EventRow> {
    rows.into_iter()
        .map(|mut row| {
            if let Some(ts) = row.timestamp {
                let parts = time_parts(ts);
                row.month = Some(parts.month);
                row.iso_week = Some(parts.iso_week);
                row.day = Some(parts.day);
                row.hour = Some(parts.hour);
            }
            row
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct Slice {
    pub name: &'static str,
    pub rows: Vec<EventRow>,
}

/// Subjects with at least one Extra event.
pub fn extra_students(rows: &[EventRow]) -> BTreeSet<i64> {
    rows.iter()
        .filter(|row| row.category == Category::Extra)
        .filter_map(|row| row.user_id)
        .collect()
}

fn select(rows: &[EventRow], keep: impl Fn(&EventRow) -> bool) -> Vec<EventRow> {
    rows.iter().filter(|row| keep(row)).cloned().collect()
}

/// The six analysis slices of the remaining table, in export order.
pub fn build_slices(remaining: &[EventRow]) -> Vec<Slice> {
    let extra = extra_students(remaining);
    let is_extra = |row: &EventRow| row.user_id.is_some_and(|id| extra.contains(&id));
    let is_exam = |row: &EventRow| row.category == Category::Exam;

    let extra_with_exam = select(remaining, is_extra);
    let nonextra_with_exam = select(remaining, |row| !is_extra(row));

    let slices = vec![
        Slice {
            name: "df_remaining_no_exam",
            rows: select(remaining, |row| !is_exam(row)),
        },
        Slice {
            name: "df_extra_no_exam",
            rows: select(&extra_with_exam, |row| !is_exam(row)),
        },
        Slice {
            name: "df_nonextra_no_exam",
            rows: select(&nonextra_with_exam, |row| !is_exam(row)),
        },
        Slice {
            name: "df_extra_with_exam_only",
            rows: select(&extra_with_exam, is_exam),
        },
        Slice {
            name: "df_extra_with_exam",
            rows: extra_with_exam,
        },
        Slice {
            name: "df_nonextra_with_exam",
            rows: nonextra_with_exam,
        },
    ];

    tracing::info!(extra_students = extra.len(), slices = slices.len(), "slices built");
    slices
}

/// Drops events repeating the subject's previous category.
///
/// Rows are visited per subject in chronological order (stable for ties);
/// rows without a subject id are kept as they are.
pub fn drop_consecutive_repeats(rows: &[EventRow]) -> Vec<LoopFreeRow> {
    let mut ordered: Vec<&EventRow> = rows.iter().collect();
    ordered.sort_by(|a, b| {
        a.user_id
            .cmp(&b.user_id)
            .then_with(|| a.timestamp.cmp(&b.timestamp))
    });

    let mut previous: Option<(i64, Category)> = None;
    let mut kept = Vec::new();
    for row in ordered {
        if let Some(user_id) = row.user_id {
            if previous == Some((user_id, row.category)) {
                continue;
            }
            previous = Some((user_id, row.category));
        }
        kept.push(LoopFreeRow {
            timestamp: row.timestamp,
            category: row.category,
            user_id: row.user_id,
        });
    }

    tracing::info!(before = rows.len(), after = kept.len(), "consecutive repeats dropped");
    kept
}
