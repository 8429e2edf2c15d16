//! Case-partitioned event log built from processed rows.

use chrono::NaiveDateTime;

use crate::models::{EventRow, LoopFreeRow, WeeklyEvent};

pub const ACTIVITY_KEY: &str = "concept:name";
pub const TIMESTAMP_KEY: &str = "time:timestamp";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEvent {
    pub case_id: String,
    pub activity: String,
    pub timestamp: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceEvent {
    pub activity: String,
    pub timestamp: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trace {
    pub case_id: String,
    pub events: Vec<TraceEvent>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventLog {
    pub traces: Vec<Trace>,
}

/// Which row field becomes the activity name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivitySource {
    Category,
    CurriculumWeek,
}

impl EventLog {
    /// Stable sort by (case id, timestamp), then split into traces.
    pub fn from_events(mut events: Vec<LogEvent>) -> Self {
        events.sort_by(|a, b| {
            a.case_id
                .cmp(&b.case_id)
                .then_with(|| a.timestamp.cmp(&b.timestamp))
        });

        let mut traces: Vec<Trace> = Vec::new();
        for event in events {
            let event_part = TraceEvent {
                activity: event.activity,
                timestamp: event.timestamp,
            };
            match traces.last_mut() {
                Some(trace) if trace.case_id == event.case_id => trace.events.push(event_part),
                _ => traces.push(Trace {
                    case_id: event.case_id,
                    events: vec![event_part],
                }),
            }
        }

        Self { traces }
    }

    /// Rows lacking a subject id, timestamp or activity are dropped.
    pub fn from_rows(rows: &[EventRow], source: ActivitySource) -> Self {
        let events = rows
            .iter()
            .filter_map(|row| {
                let activity = match source {
                    ActivitySource::Category => row.category.as_str().to_string(),
                    ActivitySource::CurriculumWeek => row.curriculum_week.clone()?,
                };
                Some(LogEvent {
                    case_id: row.user_id?.to_string(),
                    activity,
                    timestamp: row.timestamp?,
                })
            })
            .collect();
        Self::from_events(events)
    }

    pub fn from_loop_free(rows: &[LoopFreeRow]) -> Self {
        let events = rows
            .iter()
            .filter_map(|row| {
                Some(LogEvent {
                    case_id: row.user_id?.to_string(),
                    activity: row.category.as_str().to_string(),
                    timestamp: row.timestamp?,
                })
            })
            .collect();
        Self::from_events(events)
    }

    pub fn from_weekly(events: &[WeeklyEvent]) -> Self {
        Self::from_events(
            events
                .iter()
                .map(|event| LogEvent {
                    case_id: event.case_id.clone(),
                    activity: event.activity.clone(),
                    timestamp: event.timestamp,
                })
                .collect(),
        )
    }

    pub fn case_count(&self) -> usize {
        self.traces.len()
    }

    pub fn event_count(&self) -> usize {
        self.traces.iter().map(|trace| trace.events.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.traces.is_empty()
    }
}
