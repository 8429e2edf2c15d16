//! Classroom schedule labeling: in-class vs at-home, location, three-way label.

use chrono::{Datelike, NaiveDateTime, NaiveTime, Weekday};

use crate::models::{Category, EventRow, Location, ThreeWayMode, WorkMode};

pub const DEFAULT_CAMPUS_PREFIX: &str = "146.110";

/// A class slot; both ends are inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassSlot {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl ClassSlot {
    pub fn new(start: (u32, u32), end: (u32, u32)) -> Option<Self> {
        Some(Self {
            start: NaiveTime::from_hms_opt(start.0, start.1, 0)?,
            end: NaiveTime::from_hms_opt(end.0, end.1, 0)?,
        })
    }

    pub fn contains(&self, time: NaiveTime) -> bool {
        time >= self.start && time <= self.end
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Schedule {
    pub holiday_start: NaiveDateTime,
    pub holiday_end: NaiveDateTime,
    pub weekday: Weekday,
    pub slots: Vec<ClassSlot>,
    pub campus_prefix: String,
}

impl Default for Schedule {
    fn default() -> Self {
        let date = |y, m, d| chrono::NaiveDate::from_ymd_opt(y, m, d).unwrap_or_default();
        Self {
            holiday_start: date(2025, 4, 21).and_time(NaiveTime::MIN),
            holiday_end: date(2025, 4, 27)
                .and_hms_opt(23, 59, 59)
                .unwrap_or_default(),
            weekday: Weekday::Wed,
            slots: [((8, 0), (9, 30)), ((9, 50), (11, 20)), ((11, 40), (13, 10))]
                .into_iter()
                .filter_map(|(start, end)| ClassSlot::new(start, end))
                .collect(),
            campus_prefix: DEFAULT_CAMPUS_PREFIX.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotLabels {
    pub work_mode: WorkMode,
    pub location: Location,
    pub three_way: ThreeWayMode,
}

impl Schedule {
    pub fn in_holiday(&self, ts: NaiveDateTime) -> bool {
        ts >= self.holiday_start && ts <= self.holiday_end
    }

    pub fn work_mode(&self, ts: Option<NaiveDateTime>) -> WorkMode {
        let Some(ts) = ts else {
            return WorkMode::AtHome;
        };
        let in_class = !self.in_holiday(ts)
            && ts.weekday() == self.weekday
            && self.slots.iter().any(|slot| slot.contains(ts.time()));

        if in_class {
            WorkMode::InClass
        } else {
            WorkMode::AtHome
        }
    }

    pub fn location(&self, ip: Option<&str>) -> Location {
        match ip {
            Some(ip) if ip.starts_with(&self.campus_prefix) => Location::OnCampus,
            _ => Location::OffCampus,
        }
    }

    pub fn label(
        &self,
        ts: Option<NaiveDateTime>,
        ip: Option<&str>,
        category: Category,
    ) -> SlotLabels {
        let work_mode = self.work_mode(ts);
        let location = self.location(ip);
        SlotLabels {
            work_mode,
            location,
            three_way: three_way(location, category, work_mode),
        }
    }
}

/// Exam check takes precedence over the generic in-class check.
pub fn three_way(location: Location, category: Category, work_mode: WorkMode) -> ThreeWayMode {
    match (location, work_mode) {
        (Location::OnCampus, WorkMode::InClass) if category == Category::Exam => {
            ThreeWayMode::InClassExam
        }
        (Location::OnCampus, WorkMode::InClass) => ThreeWayMode::InClassOther,
        _ => ThreeWayMode::AtHome,
    }
}

pub fn label_rows(rows: Vec<EventRow>, schedule: &Schedule) -> Vec<EventRow> {
    rows.into_iter()
        .map(|mut row| {
            let labels = schedule.label(row.timestamp, row.ip.as_deref(), row.category);
            row.work_mode = Some(labels.work_mode);
            row.location = Some(labels.location);
            row.three_way = Some(labels.three_way);
            row
        })
        .collect()
}

/// Exam events outside class hours are administrative, not real attempts.
///
/// Mutates the category in place and returns how many rows changed. The
/// three-way label is left untouched; it can only say "exam" for in-class
/// rows, which this rule never rewrites.
pub fn reclassify_exam_to_admin(rows: &mut [EventRow], schedule: &Schedule) -> usize {
    let mut affected = 0usize;
    for row in rows.iter_mut() {
        let work_mode = row
            .work_mode
            .unwrap_or_else(|| schedule.work_mode(row.timestamp));
        if row.category == Category::Exam && work_mode == WorkMode::AtHome {
            row.category = Category::Admin;
            affected += 1;
        }
    }

    if affected > 0 {
        tracing::info!(
            affected,
            from = Category::Exam.as_str(),
            to = Category::Admin.as_str(),
            "reclassified at-home exam events"
        );
    } else {
        tracing::info!("reclassify: no exam rows outside class hours");
    }
    affected
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RawEventRow;

    fn dt(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    fn labeled(category: Category, ts: &str, ip: Option<&str>) -> EventRow {
        let mut row = EventRow::from_raw(
            RawEventRow {
                ip: ip.map(str::to_string),
                ..Default::default()
            },
            Some(dt(ts)),
        );
        row.category = category;
        label_rows(vec![row], &Schedule::default()).remove(0)
    }

    #[test]
    fn wednesday_slot_outside_holiday_is_in_class() {
        let schedule = Schedule::default();
        assert_eq!(schedule.work_mode(Some(dt("2025-03-19 09:00:00"))), WorkMode::InClass);
    }

    #[test]
    fn holiday_forces_at_home() {
        let schedule = Schedule::default();
        assert_eq!(schedule.work_mode(Some(dt("2025-04-23 09:00:00"))), WorkMode::AtHome);
    }

    #[test]
    fn other_weekdays_are_at_home() {
        let schedule = Schedule::default();
        assert_eq!(schedule.work_mode(Some(dt("2025-03-18 09:00:00"))), WorkMode::AtHome);
        assert_eq!(schedule.work_mode(Some(dt("2025-04-22 09:00:00"))), WorkMode::AtHome);
    }

    #[test]
    fn slot_edges_are_inclusive_and_breaks_excluded() {
        let schedule = Schedule::default();
        assert_eq!(schedule.work_mode(Some(dt("2025-03-19 08:00:00"))), WorkMode::InClass);
        assert_eq!(schedule.work_mode(Some(dt("2025-03-19 09:30:00"))), WorkMode::InClass);
        assert_eq!(schedule.work_mode(Some(dt("2025-03-19 09:40:00"))), WorkMode::AtHome);
        assert_eq!(schedule.work_mode(Some(dt("2025-03-19 13:10:00"))), WorkMode::InClass);
        assert_eq!(schedule.work_mode(Some(dt("2025-03-19 13:10:01"))), WorkMode::AtHome);
    }

    #[test]
    fn missing_timestamp_is_at_home() {
        assert_eq!(Schedule::default().work_mode(None), WorkMode::AtHome);
    }

    #[test]
    fn campus_prefix_decides_location() {
        let schedule = Schedule::default();
        assert_eq!(schedule.location(Some("146.110.12.4")), Location::OnCampus);
        assert_eq!(schedule.location(Some("84.2.10.1")), Location::OffCampus);
        assert_eq!(schedule.location(None), Location::OffCampus);
    }

    #[test]
    fn location_matches_the_raw_address() {
        let schedule = Schedule::default();
        assert_eq!(schedule.location(Some(" 146.110.12.4")), Location::OffCampus);
        assert_eq!(schedule.location(Some("146.110.12.4 ")), Location::OnCampus);
    }

    #[test]
    fn three_way_precedence() {
        let exam = labeled(Category::Exam, "2025-03-19 10:00:00", Some("146.110.1.1"));
        assert_eq!(exam.three_way, Some(ThreeWayMode::InClassExam));

        let lecture = labeled(Category::InClass, "2025-03-19 10:00:00", Some("146.110.1.1"));
        assert_eq!(lecture.three_way, Some(ThreeWayMode::InClassOther));

        let remote = labeled(Category::Exam, "2025-03-19 10:00:00", Some("10.0.0.1"));
        assert_eq!(remote.work_mode, Some(WorkMode::InClass));
        assert_eq!(remote.three_way, Some(ThreeWayMode::AtHome));
    }

    #[test]
    fn at_home_exam_becomes_admin() {
        let schedule = Schedule::default();
        let mut rows = vec![
            labeled(Category::Exam, "2025-03-22 10:00:00", None),
            labeled(Category::Exam, "2025-03-19 10:00:00", None),
            labeled(Category::Homework, "2025-03-22 10:00:00", None),
        ];
        let affected = reclassify_exam_to_admin(&mut rows, &schedule);
        assert_eq!(affected, 1);
        assert_eq!(rows[0].category, Category::Admin);
        assert_eq!(rows[1].category, Category::Exam);
        assert_eq!(rows[2].category, Category::Homework);
    }

    #[test]
    fn reclassified_rows_never_carry_exam_three_way_label() {
        let schedule = Schedule::default();
        let mut rows = vec![
            labeled(Category::Exam, "2025-03-22 10:00:00", Some("146.110.1.1")),
            labeled(Category::Exam, "2025-04-23 10:00:00", Some("146.110.1.1")),
        ];
        reclassify_exam_to_admin(&mut rows, &schedule);
        for row in &rows {
            assert_eq!(row.category, Category::Admin);
            assert_eq!(row.three_way, Some(ThreeWayMode::AtHome));
        }
    }
}
