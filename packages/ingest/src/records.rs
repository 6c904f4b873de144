//! Typed record extraction from a cleaned table.

use risk_map_accident_models::{AccidentRecord, CaseId, CellValue, ColumnNames, RawTable};

use crate::IngestError;
use crate::clean::{coerce_numeric, require_column};

static EMPTY: CellValue = CellValue::Empty;

/// Extracts [`AccidentRecord`]s from a table already passed through
/// [`crate::clean::clean_coordinates`].
///
/// Rows with a blank case identifier are skipped and counted in a
/// warning. Years that are not integral numbers become `None`.
///
/// # Errors
///
/// Returns [`IngestError::MissingColumn`] if a required column is absent,
/// or [`IngestError::InvalidCoordinate`] if a row still holds a
/// non-numeric coordinate.
pub fn extract_records(
    table: &RawTable,
    columns: &ColumnNames,
) -> Result<Vec<AccidentRecord>, IngestError> {
    let case_idx = require_column(table, &columns.case_id)?;
    let year_idx = require_column(table, &columns.dead_year)?;
    let lat_idx = require_column(table, &columns.latitude)?;
    let lon_idx = require_column(table, &columns.longitude)?;

    let mut records = Vec::with_capacity(table.len());
    let mut missing_ids = 0_usize;

    for (row_idx, row) in table.rows.iter().enumerate() {
        let cell = |idx: usize| row.get(idx).unwrap_or(&EMPTY);

        let (Some(latitude), Some(longitude)) =
            (coerce_numeric(cell(lat_idx)), coerce_numeric(cell(lon_idx)))
        else {
            return Err(IngestError::InvalidCoordinate { row: row_idx });
        };

        let Some(case_id) = parse_case_id(cell(case_idx)) else {
            missing_ids += 1;
            continue;
        };

        records.push(AccidentRecord {
            case_id,
            dead_year: parse_year(cell(year_idx)),
            latitude,
            longitude,
        });
    }

    if missing_ids > 0 {
        log::warn!("Skipped {missing_ids} rows without a {}", columns.case_id);
    }

    Ok(records)
}

/// Parses a case identifier. Integral numbers keep their numeric form;
/// text is trimmed and kept verbatim.
#[must_use]
pub fn parse_case_id(cell: &CellValue) -> Option<CaseId> {
    if cell.is_blank() {
        return None;
    }

    match cell {
        CellValue::Int(n) => Some(CaseId::Number(*n)),
        CellValue::Float(f) => Some(
            integral(*f).map_or_else(|| CaseId::Text(f.to_string()), CaseId::Number),
        ),
        CellValue::String(s) => Some(CaseId::Text(s.trim().to_string())),
        CellValue::Bool(b) => Some(CaseId::Text(b.to_string())),
        CellValue::DateTime(f) => Some(CaseId::Text(f.to_string())),
        CellValue::Empty | CellValue::Error(_) => None,
    }
}

/// Parses a year cell holding an integral number or numeric text.
#[must_use]
pub fn parse_year(cell: &CellValue) -> Option<i32> {
    let value = match cell {
        CellValue::Int(n) => return i32::try_from(*n).ok(),
        CellValue::Float(f) => integral(*f)?,
        CellValue::String(s) => {
            let trimmed = s.trim();
            match trimmed.parse::<i64>() {
                Ok(n) => n,
                Err(_) => integral(trimmed.parse::<f64>().ok()?)?,
            }
        }
        _ => return None,
    };

    i32::try_from(value).ok()
}

#[allow(clippy::cast_possible_truncation)]
fn integral(value: f64) -> Option<i64> {
    #[allow(clippy::cast_precision_loss)]
    let in_range = value >= i64::MIN as f64 && value < i64::MAX as f64;
    (value.is_finite() && value.fract() == 0.0 && in_range).then(|| value as i64)
}
