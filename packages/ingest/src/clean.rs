//! Coordinate coercion and invalid-row removal.

use risk_map_accident_models::{CellValue, ColumnNames, RawTable};

use crate::IngestError;

/// Result of [`clean_coordinates`].
#[derive(Debug, Clone, PartialEq)]
pub struct CleanReport {
    /// The table with coerced coordinate columns and invalid rows removed.
    pub table: RawTable,
    /// Number of rows removed because a coordinate was not numeric.
    pub dropped: usize,
}

/// Coerces a cell to a finite number.
///
/// Integers and floats pass through; text is trimmed and parsed. Blank,
/// boolean, date, error, unparseable, and non-finite values yield `None`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn coerce_numeric(cell: &CellValue) -> Option<f64> {
    let value = match cell {
        CellValue::Int(n) => *n as f64,
        CellValue::Float(f) => *f,
        CellValue::String(s) => s.trim().parse::<f64>().ok()?,
        CellValue::Empty | CellValue::Bool(_) | CellValue::DateTime(_) | CellValue::Error(_) => {
            return None;
        }
    };

    value.is_finite().then_some(value)
}

/// Coerces the latitude and longitude columns to numbers and drops every
/// row where either coordinate fails coercion.
///
/// Surviving coordinate cells are rewritten as [`CellValue::Float`], so
/// running this again on its own output removes nothing.
///
/// # Errors
///
/// Returns [`IngestError::MissingColumn`] if either coordinate column is
/// absent from the header.
pub fn clean_coordinates(
    table: RawTable,
    columns: &ColumnNames,
) -> Result<CleanReport, IngestError> {
    let lat_idx = require_column(&table, &columns.latitude)?;
    let lon_idx = require_column(&table, &columns.longitude)?;

    let RawTable { headers, rows } = table;
    let total = rows.len();

    let rows: Vec<Vec<CellValue>> = rows
        .into_iter()
        .filter_map(|mut row| {
            let lat = coerce_numeric(row.get(lat_idx)?)?;
            let lon = coerce_numeric(row.get(lon_idx)?)?;
            row[lat_idx] = CellValue::Float(lat);
            row[lon_idx] = CellValue::Float(lon);
            Some(row)
        })
        .collect();

    let dropped = total - rows.len();
    if dropped > 0 {
        log::info!("Dropped {dropped} of {total} rows with non-numeric coordinates");
    }

    Ok(CleanReport {
        table: RawTable { headers, rows },
        dropped,
    })
}

pub(crate) fn require_column(table: &RawTable, name: &str) -> Result<usize, IngestError> {
    table
        .column_index(name)
        .ok_or_else(|| IngestError::MissingColumn {
            name: name.to_string(),
        })
}
