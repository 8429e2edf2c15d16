use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Activity category derived from the event context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "Hazi")]
    Homework,
    #[serde(rename = "Szamonkeres")]
    Exam,
    #[serde(rename = "Extra")]
    Extra,
    #[serde(rename = "Orai")]
    InClass,
    #[serde(rename = "Admin")]
    Admin,
    #[serde(rename = "Egyéb")]
    Other,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::Homework,
        Category::Exam,
        Category::Extra,
        Category::InClass,
        Category::Admin,
        Category::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Homework => "Hazi",
            Category::Exam => "Szamonkeres",
            Category::Extra => "Extra",
            Category::InClass => "Orai",
            Category::Admin => "Admin",
            Category::Other => "Egyéb",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Two-way schedule label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum WorkMode {
    #[serde(rename = "Órai")]
    InClass,
    #[serde(rename = "Otthoni")]
    AtHome,
}

impl WorkMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkMode::InClass => "Órai",
            WorkMode::AtHome => "Otthoni",
        }
    }
}

impl fmt::Display for WorkMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Network location derived from the client IP address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Location {
    #[serde(rename = "Egyetemen")]
    OnCampus,
    #[serde(rename = "Egyéb helyen")]
    OffCampus,
}

impl Location {
    pub fn as_str(&self) -> &'static str {
        match self {
            Location::OnCampus => "Egyetemen",
            Location::OffCampus => "Egyéb helyen",
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Three-way schedule label combining location, category and work mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ThreeWayMode {
    #[serde(rename = "Órai – számonkérés")]
    InClassExam,
    #[serde(rename = "Órai – nem számonkérés")]
    InClassOther,
    #[serde(rename = "Otthoni")]
    AtHome,
}

impl ThreeWayMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ThreeWayMode::InClassExam => "Órai – számonkérés",
            ThreeWayMode::InClassOther => "Órai – nem számonkérés",
            ThreeWayMode::AtHome => "Otthoni",
        }
    }
}

impl fmt::Display for ThreeWayMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One interaction record as read from the LMS export.
#[derive(Debug, Clone, Default)]
pub struct RawEventRow {
    pub description: String,
    pub context: String,
    pub time_raw: String,
    pub ip: Option<String>,
    pub event_name: Option<String>,
}

/// A raw row enriched by every preprocessing step.
///
/// This is also the row shape of `df_remaining_export.csv`, so the later
/// stages read it back with the same struct.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRow {
    pub description: String,
    pub context: String,
    pub event_name: Option<String>,
    pub time_raw: String,
    pub ip: Option<String>,
    pub timestamp: Option<NaiveDateTime>,
    pub user_id: Option<i64>,
    pub item_id: Option<i64>,
    pub category: Category,
    pub month: Option<u32>,
    pub iso_week: Option<u32>,
    pub day: Option<u32>,
    pub hour: Option<u32>,
    pub work_mode: Option<WorkMode>,
    pub location: Option<Location>,
    pub three_way: Option<ThreeWayMode>,
    pub curriculum_week: Option<String>,
    pub curriculum_week_num: Option<u32>,
}

impl EventRow {
    pub fn from_raw(raw: RawEventRow, timestamp: Option<NaiveDateTime>) -> Self {
        Self {
            description: raw.description,
            context: raw.context,
            event_name: raw.event_name,
            time_raw: raw.time_raw,
            ip: raw.ip,
            timestamp,
            user_id: None,
            item_id: None,
            category: Category::Other,
            month: None,
            iso_week: None,
            day: None,
            hour: None,
            work_mode: None,
            location: None,
            three_way: None,
            curriculum_week: None,
            curriculum_week_num: None,
        }
    }
}

/// Row of the loop-free table: consecutive repeats of a category removed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoopFreeRow {
    pub timestamp: Option<NaiveDateTime>,
    pub category: Category,
    pub user_id: Option<i64>,
}

/// One synthetic event per (subject, ISO week[, category]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklyEvent {
    pub case_id: String,
    pub iso_year: i32,
    pub iso_week: u32,
    pub category: Option<Category>,
    pub activity: String,
    pub first_seen: NaiveDateTime,
    pub timestamp: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklyCount {
    pub user_id: i64,
    pub iso_year: i32,
    pub iso_week: u32,
    pub category: Category,
    pub event_count: usize,
}

/// Distinct context → curriculum week mapping observed in the data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeekCatalogEntry {
    pub context: String,
    pub curriculum_week: String,
    pub curriculum_week_num: Option<u32>,
}
