//! Project paths and environment-driven settings.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;

use crate::cleaning::TimeWindow;
use crate::error::{PipelineError, Result};
use crate::ingest::ColumnMap;
use crate::schedule::{Schedule, DEFAULT_CAMPUS_PREFIX};
use crate::slicing::DEFAULT_EXCLUDED_USERS;
use crate::temporal::parse_bound;

pub const DEFAULT_START: &str = "2025-02-17 00:00:00";
pub const DEFAULT_END: &str = "2025-06-23 23:59:59";

/// Directory layout shared by every stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectPaths {
    pub base: PathBuf,
    pub raw: PathBuf,
    pub processed: PathBuf,
    pub xes: PathBuf,
    pub figures: PathBuf,
}

impl ProjectPaths {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        let base = base.into();
        let data = base.join("data");
        Self {
            raw: data.join("raw"),
            processed: data.join("processed"),
            xes: data.join("xes"),
            figures: base.join("figures"),
            base,
        }
    }

    /// Creates every directory; safe to call repeatedly.
    pub fn ensure(&self) -> Result<()> {
        for dir in [&self.raw, &self.processed, &self.xes, &self.figures] {
            fs::create_dir_all(dir)?;
        }
        Ok(())
    }

    pub fn processed_file(&self, name: &str) -> PathBuf {
        self.processed.join(name)
    }

    pub fn xes_file(&self, name: &str) -> PathBuf {
        self.xes.join(name)
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub input: Option<PathBuf>,
    pub window: TimeWindow,
    pub excluded_users: Vec<i64>,
    pub schedule: Schedule,
    pub columns: ColumnMap,
    pub backend_command: Option<String>,
}

fn bound(key: &str, value: Option<String>, default: &str) -> Result<NaiveDateTime> {
    let raw = value.unwrap_or_else(|| default.to_string());
    parse_bound(&raw).ok_or_else(|| PipelineError::Config {
        key: key.to_string(),
        message: format!("'{raw}' is not a date-time (expected YYYY-MM-DD HH:MM:SS)"),
    })
}

fn id_list(key: &str, value: &str) -> Result<Vec<i64>> {
    value
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<i64>().map_err(|e| PipelineError::Config {
                key: key.to_string(),
                message: format!("'{part}': {e}"),
            })
        })
        .collect()
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds settings from an arbitrary key lookup; blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let window = TimeWindow {
            start: bound("START_DATE", get("START_DATE"), DEFAULT_START)?,
            end: bound("END_DATE", get("END_DATE"), DEFAULT_END)?,
        };
        if window.start > window.end {
            return Err(PipelineError::Config {
                key: "START_DATE".to_string(),
                message: format!("start {} is after end {}", window.start, window.end),
            });
        }

        let excluded_users = match get("EXCLUDED_USER_IDS") {
            Some(value) => id_list("EXCLUDED_USER_IDS", &value)?,
            None => DEFAULT_EXCLUDED_USERS.to_vec(),
        };

        let schedule = Schedule {
            campus_prefix: get("CAMPUS_IP_PREFIX").unwrap_or_else(|| DEFAULT_CAMPUS_PREFIX.to_string()),
            ..Schedule::default()
        };

        Ok(Self {
            input: get("INPUT_XLSX").map(PathBuf::from),
            window,
            excluded_users,
            schedule,
            columns: ColumnMap::default(),
            backend_command: get("PM_BACKEND"),
        })
    }

    /// CLI override first, then `INPUT_XLSX`.
    pub fn input_path(&self, cli: Option<&Path>) -> Result<PathBuf> {
        cli.map(Path::to_path_buf)
            .or_else(|| self.input.clone())
            .ok_or_else(|| PipelineError::Config {
                key: "INPUT_XLSX".to_string(),
                message: "no input file given (use --input or set INPUT_XLSX)".to_string(),
            })
    }
}
