//! Workbook loader.
//!
//! Reads every row and column of one worksheet into a [`RawTable`]. No
//! validation happens here beyond what the spreadsheet library performs;
//! type coercion is left to [`crate::clean`].

use std::path::Path;

use calamine::{Data, Reader, open_workbook_auto};
use risk_map_accident_models::{CellValue, RawTable};

use crate::IngestError;

/// Loads a worksheet from the workbook at `path`.
///
/// Reads the sheet named `sheet`, or the first sheet when `None`. The
/// first row becomes the header; shorter data rows are padded with
/// [`CellValue::Empty`].
///
/// # Errors
///
/// Returns [`IngestError`] if the file is missing, is not a readable
/// workbook, or does not contain the requested sheet.
pub fn load_workbook(path: &Path, sheet: Option<&str>) -> Result<RawTable, IngestError> {
    let display = path.display().to_string();
    let workbook_err = |source| IngestError::Workbook {
        path: display.clone(),
        source,
    };

    let mut workbook = open_workbook_auto(path).map_err(workbook_err)?;

    let range = match sheet {
        Some(name) => workbook.worksheet_range(name).map_err(workbook_err)?,
        None => workbook
            .worksheet_range_at(0)
            .ok_or_else(|| IngestError::NoWorksheets {
                path: display.clone(),
            })?
            .map_err(workbook_err)?,
    };

    let mut rows = range.rows();
    let headers: Vec<String> = rows
        .next()
        .map(|row| row.iter().map(header_text).collect())
        .unwrap_or_default();

    let data: Vec<Vec<CellValue>> = rows.map(|row| row.iter().map(to_cell).collect()).collect();

    let table = RawTable::new(headers, data);
    log::info!(
        "Loaded {} rows x {} columns from {display}",
        table.len(),
        table.headers.len()
    );

    Ok(table)
}

fn header_text(cell: &Data) -> String {
    match cell {
        Data::String(s) => s.trim().to_string(),
        Data::Empty => String::new(),
        other => other.to_string(),
    }
}

fn to_cell(cell: &Data) -> CellValue {
    match cell {
        Data::Empty => CellValue::Empty,
        Data::Int(n) => CellValue::Int(*n),
        Data::Float(f) => CellValue::Float(*f),
        Data::String(s) => CellValue::String(s.clone()),
        Data::Bool(b) => CellValue::Bool(*b),
        Data::DateTime(dt) => CellValue::DateTime(dt.as_f64()),
        Data::Error(e) => CellValue::Error(e.to_string()),
        other => CellValue::String(other.to_string()),
    }
}
