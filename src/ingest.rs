//! Loading the raw LMS export and intermediate tables.

use std::collections::HashMap;
use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};
use serde::de::DeserializeOwned;

use crate::error::{PipelineError, Result};
use crate::models::RawEventRow;

/// Source column headers of the LMS export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMap {
    pub description: String,
    pub context: String,
    pub time: String,
    pub ip: String,
    pub event_name: String,
}

impl Default for ColumnMap {
    fn default() -> Self {
        Self {
            description: "Leírás".to_string(),
            context: "Eseménykörnyezet".to_string(),
            time: "Idő".to_string(),
            ip: "IP-cím".to_string(),
            event_name: "Esemény neve".to_string(),
        }
    }
}

impl ColumnMap {
    fn required(&self) -> [&str; 3] {
        [self.description.as_str(), self.context.as_str(), self.time.as_str()]
    }
}

/// Errors with every required header absent from `headers`.
pub fn require_columns(source_name: &str, headers: &[String], required: &[&str]) -> Result<()> {
    let missing: Vec<String> = required
        .iter()
        .filter(|name| !headers.iter().any(|h| h.trim() == **name))
        .map(|name| name.to_string())
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(PipelineError::MissingColumns {
            source_name: source_name.to_string(),
            columns: missing,
        })
    }
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) if f.fract() == 0.0 => format!("{f:.0}"),
        other => other.to_string(),
    }
}

fn non_empty(value: Option<&String>) -> Option<String> {
    value
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn rows_from_table(
    source_name: &str,
    headers: Vec<String>,
    records: impl Iterator<Item = Vec<String>>,
    columns: &ColumnMap,
) -> Result<Vec<RawEventRow>> {
    require_columns(source_name, &headers, &columns.required())?;

    let index: HashMap<&str, usize> = headers
        .iter()
        .enumerate()
        .map(|(i, h)| (h.trim(), i))
        .collect();
    let position = |name: &str| index.get(name).copied();
    let (desc, ctx, time) = (
        position(columns.description.as_str()),
        position(columns.context.as_str()),
        position(columns.time.as_str()),
    );
    let (ip, event_name) = (
        position(columns.ip.as_str()),
        position(columns.event_name.as_str()),
    );

    let rows = records
        .map(|record| {
            let field = |i: Option<usize>| i.and_then(|i| record.get(i));
            RawEventRow {
                description: field(desc).cloned().unwrap_or_default(),
                context: field(ctx).cloned().unwrap_or_default(),
                time_raw: field(time).cloned().unwrap_or_default(),
                ip: non_empty(field(ip)),
                event_name: non_empty(field(event_name)),
            }
        })
        .collect();
    Ok(rows)
}

fn load_workbook(path: &Path, columns: &ColumnMap) -> Result<Vec<RawEventRow>> {
    let workbook_error = |message: String| PipelineError::Workbook {
        path: path.to_path_buf(),
        message,
    };

    let mut workbook = open_workbook_auto(path).map_err(|e| workbook_error(e.to_string()))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| workbook_error("workbook has no sheets".to_string()))?
        .map_err(|e| workbook_error(e.to_string()))?;

    let mut rows = range.rows();
    let headers: Vec<String> = rows
        .next()
        .map(|header| header.iter().map(cell_text).collect())
        .unwrap_or_default();
    let records = rows.map(|row| row.iter().map(cell_text).collect());

    rows_from_table(&path.display().to_string(), headers, records, columns)
}

fn load_csv(path: &Path, columns: &ColumnMap) -> Result<Vec<RawEventRow>> {
    let mut reader = csv::Reader::from_path(path)?;
    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    let records = reader
        .records()
        .collect::<std::result::Result<Vec<_>, _>>()?
        .into_iter()
        .map(|record| record.iter().map(str::to_string).collect());

    rows_from_table(&path.display().to_string(), headers, records, columns)
}

/// Reads the raw export; spreadsheet formats go through calamine, `.csv` through csv.
pub fn load_raw_rows(path: &Path, columns: &ColumnMap) -> Result<Vec<RawEventRow>> {
    if !path.exists() {
        return Err(PipelineError::MissingArtifact {
            path: path.to_path_buf(),
            hint: "set INPUT_XLSX or pass --input".to_string(),
        });
    }

    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);
    let rows = match extension.as_deref() {
        Some("xlsx" | "xlsm" | "xls" | "xlsb" | "ods") => load_workbook(path, columns)?,
        Some("csv") => load_csv(path, columns)?,
        _ => return Err(PipelineError::UnsupportedFormat(path.to_path_buf())),
    };

    tracing::info!(path = %path.display(), rows = rows.len(), "raw export loaded");
    Ok(rows)
}

pub fn read_headers(path: &Path) -> Result<Vec<String>> {
    let mut reader = csv::Reader::from_path(path)?;
    Ok(reader.headers()?.iter().map(str::to_string).collect())
}

/// Reads an intermediate CSV table into typed rows after checking its headers.
pub fn read_table<T: DeserializeOwned>(path: &Path, required: &[&str], hint: &str) -> Result<Vec<T>> {
    if !path.exists() {
        return Err(PipelineError::MissingArtifact {
            path: path.to_path_buf(),
            hint: hint.to_string(),
        });
    }

    let mut reader = csv::Reader::from_path(path)?;
    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    if headers.is_empty() {
        tracing::warn!(path = %path.display(), "table is empty");
        return Ok(Vec::new());
    }
    require_columns(&path.display().to_string(), &headers, required)?;

    let rows = reader
        .deserialize()
        .collect::<std::result::Result<Vec<T>, _>>()?;
    tracing::debug!(path = %path.display(), rows = rows.len(), "table loaded");
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn csv_export_maps_hungarian_headers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("export.csv");
        fs::write(
            &path,
            "Idő,Eseménykörnyezet,Leírás,IP-cím,Esemény neve\n\
             \"2025. március 19., 9:00:00\",Fájl: zh-A,The user with id '42' viewed,146.110.1.1,Kurzusmodul megtekintve\n\
             \"2025. március 22., 10:00:00\",Fájl: zh-A,The user with id '42' viewed,,\n",
        )
        .unwrap();

        let rows = load_raw_rows(&path, &ColumnMap::default()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].context, "Fájl: zh-A");
        assert_eq!(rows[0].time_raw, "2025. március 19., 9:00:00");
        assert_eq!(rows[0].ip.as_deref(), Some("146.110.1.1"));
        assert_eq!(rows[1].ip, None);
        assert_eq!(rows[1].event_name, None);
    }

    #[test]
    fn optional_columns_may_be_absent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("export.csv");
        fs::write(&path, "Idő,Eseménykörnyezet,Leírás\nx,y,z\n").unwrap();

        let rows = load_raw_rows(&path, &ColumnMap::default()).unwrap();
        assert_eq!(rows[0].description, "z");
        assert_eq!(rows[0].ip, None);
    }

    #[test]
    fn missing_required_column_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("export.csv");
        fs::write(&path, "Idő,Leírás\nx,z\n").unwrap();

        match load_raw_rows(&path, &ColumnMap::default()) {
            Err(PipelineError::MissingColumns { columns, .. }) => {
                assert_eq!(columns, vec!["Eseménykörnyezet".to_string()]);
            }
            other => panic!("expected missing column error, got {other:?}"),
        }
    }

    #[test]
    fn absent_file_and_unknown_extension_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            load_raw_rows(&dir.path().join("none.xlsx"), &ColumnMap::default()),
            Err(PipelineError::MissingArtifact { .. })
        ));

        let path = dir.path().join("export.json");
        fs::write(&path, "{}").unwrap();
        assert!(matches!(
            load_raw_rows(&path, &ColumnMap::default()),
            Err(PipelineError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn whole_floats_render_without_fraction() {
        assert_eq!(cell_text(&Data::Float(42.0)), "42");
        assert_eq!(cell_text(&Data::Float(1.5)), "1.5");
        assert_eq!(cell_text(&Data::Empty), "");
    }
}
