//! Table exports: CSV is the source of truth, `.xlsx` is a convenience copy.

use std::fs;
use std::path::Path;

use rust_xlsxwriter::{Workbook, XlsxError};
use serde::Serialize;

use crate::error::Result;

/// Writes `rows` with a header line derived from `T`'s field names.
pub fn save_csv<T: Serialize>(rows: &[T], path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut writer = csv::Writer::from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    tracing::info!(path = %path.display(), rows = rows.len(), "CSV written");
    Ok(())
}

/// Pretty-printed JSON, parent directories created.
pub fn save_json<T: Serialize + ?Sized>(value: &T, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let body = serde_json::to_string_pretty(value).map_err(std::io::Error::from)?;
    fs::write(path, body)?;
    Ok(())
}

fn csv_cells<T: Serialize>(rows: &[T]) -> std::result::Result<Vec<Vec<String>>, csv::Error> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for row in rows {
        writer.serialize(row)?;
    }
    let buffer = writer
        .into_inner()
        .map_err(|e| csv::Error::from(e.into_error()))?;

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .from_reader(buffer.as_slice());
    reader
        .records()
        .map(|record| record.map(|r| r.iter().map(str::to_string).collect()))
        .collect()
}

#[derive(Debug, thiserror::Error)]
pub enum SpreadsheetError {
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Xlsx(#[from] XlsxError),
    #[error("table is too wide for a worksheet")]
    TooWide,
}

/// Writes `rows` as a single-sheet workbook; every cell is text.
pub fn save_xlsx<T: Serialize>(rows: &[T], path: &Path) -> std::result::Result<(), SpreadsheetError> {
    let cells = csv_cells(rows)?;
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name("Sheet1")?;

    for (r, record) in cells.iter().enumerate() {
        let row = u32::try_from(r).map_err(|_| SpreadsheetError::TooWide)?;
        for (c, value) in record.iter().enumerate() {
            let col = u16::try_from(c).map_err(|_| SpreadsheetError::TooWide)?;
            worksheet.write_string(row, col, value)?;
        }
    }

    workbook.save(path)?;
    Ok(())
}

/// Spreadsheet failures only warn; the CSV sibling remains authoritative.
pub fn save_xlsx_or_warn<T: Serialize>(rows: &[T], path: &Path) -> bool {
    match save_xlsx(rows, path) {
        Ok(()) => {
            tracing::info!(path = %path.display(), "XLSX written");
            true
        }
        Err(err) => {
            tracing::warn!(
                path = %path.display(),
                error = %err,
                "XLSX export failed, the CSV file is the source of truth"
            );
            false
        }
    }
}

/// CSV plus best-effort `.xlsx` next to it.
pub fn save_table<T: Serialize>(rows: &[T], csv_path: &Path) -> Result<()> {
    save_csv(rows, csv_path)?;
    save_xlsx_or_warn(rows, &csv_path.with_extension("xlsx"));
    Ok(())
}
