#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Accident record and spreadsheet table types.
//!
//! This crate defines the shapes that flow between the loader, cleaner,
//! clusterer, and aggregator: the untyped [`RawTable`] read straight from
//! a workbook, and the typed [`AccidentRecord`] extracted once the
//! coordinate columns have been cleaned.

pub mod progress;

use serde::{Deserialize, Serialize};

/// Default column holding the unique case identifier.
pub const CASE_ID_COLUMN: &str = "DEAD_CONSO_REPORT_ID";

/// Default column holding the death year (Buddhist Era).
pub const DEAD_YEAR_COLUMN: &str = "DEAD_YEAR";

/// Default column holding the accident latitude in degrees.
pub const LATITUDE_COLUMN: &str = "Acc_lat";

/// Default column holding the accident longitude in degrees.
pub const LONGITUDE_COLUMN: &str = "Acc_long";

/// Offset between a Buddhist Era year and the Gregorian year.
pub const BUDDHIST_ERA_OFFSET: i32 = 543;

/// Converts a Buddhist Era year (e.g. 2560) to its Gregorian year (2017).
#[must_use]
pub const fn buddhist_to_gregorian(year: i32) -> i32 {
    year - BUDDHIST_ERA_OFFSET
}

/// Names of the input columns the pipeline reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnNames {
    /// Unique case identifier column.
    pub case_id: String,
    /// Death year column.
    pub dead_year: String,
    /// Latitude column.
    pub latitude: String,
    /// Longitude column.
    pub longitude: String,
}

impl Default for ColumnNames {
    fn default() -> Self {
        Self {
            case_id: CASE_ID_COLUMN.to_string(),
            dead_year: DEAD_YEAR_COLUMN.to_string(),
            latitude: LATITUDE_COLUMN.to_string(),
            longitude: LONGITUDE_COLUMN.to_string(),
        }
    }
}

/// A single spreadsheet cell, independent of the workbook library.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CellValue {
    /// Blank cell.
    Empty,
    /// Integer cell.
    Int(i64),
    /// Floating point cell.
    Float(f64),
    /// Text cell.
    String(String),
    /// Boolean cell.
    Bool(bool),
    /// Date/time cell as an Excel serial number.
    DateTime(f64),
    /// Formula error cell (e.g. `#DIV/0!`).
    Error(String),
}

impl CellValue {
    /// Returns `true` for blank cells and whitespace-only text.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::String(s) => s.trim().is_empty(),
            _ => false,
        }
    }
}

/// An in-memory table: one header row plus data rows.
///
/// Every row has exactly `headers.len()` cells.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawTable {
    /// Column names from the first worksheet row.
    pub headers: Vec<String>,
    /// Data rows, padded to the header width.
    pub rows: Vec<Vec<CellValue>>,
}

impl RawTable {
    /// Creates a table, padding or truncating rows to the header width.
    #[must_use]
    pub fn new(headers: Vec<String>, rows: Vec<Vec<CellValue>>) -> Self {
        let width = headers.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, CellValue::Empty);
                row
            })
            .collect();

        Self { headers, rows }
    }

    /// Returns the index of the column named `name`.
    ///
    /// Header names are compared after trimming surrounding whitespace.
    #[must_use]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h.trim() == name)
    }

    /// Number of data rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns `true` if the table has no data rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Identifier of a single fatality case.
///
/// Numeric identifiers keep their integer form so they sort and render
/// like numbers; anything else is kept as text.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CaseId {
    /// Integral identifier.
    Number(i64),
    /// Free-form identifier.
    Text(String),
}

impl std::fmt::Display for CaseId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

/// A cleaned accident record with numeric coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccidentRecord {
    /// Unique case identifier.
    pub case_id: CaseId,
    /// Death year (Buddhist Era), if the cell held an integral year.
    pub dead_year: Option<i32>,
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buddhist_era_conversion() {
        assert_eq!(buddhist_to_gregorian(2560), 2017);
        assert_eq!(buddhist_to_gregorian(2555), 2012);
    }

    #[test]
    fn pads_short_rows_to_header_width() {
        let table = RawTable::new(
            vec!["a".to_string(), "b".to_string(), "c".to_string()],
            vec![vec![CellValue::Int(1)]],
        );
        assert_eq!(
            table.rows[0],
            vec![CellValue::Int(1), CellValue::Empty, CellValue::Empty]
        );
    }

    #[test]
    fn column_lookup_ignores_surrounding_whitespace() {
        let table = RawTable::new(vec![" Acc_lat ".to_string()], vec![]);
        assert_eq!(table.column_index(LATITUDE_COLUMN), Some(0));
        assert_eq!(table.column_index(LONGITUDE_COLUMN), None);
    }

    #[test]
    fn blank_cells() {
        assert!(CellValue::Empty.is_blank());
        assert!(CellValue::String("  ".to_string()).is_blank());
        assert!(!CellValue::Int(0).is_blank());
    }

    #[test]
    fn case_ids_order_numbers_before_text() {
        let mut ids = vec![
            CaseId::Text("A-1".to_string()),
            CaseId::Number(20),
            CaseId::Number(3),
        ];
        ids.sort();
        assert_eq!(
            ids,
            vec![
                CaseId::Number(3),
                CaseId::Number(20),
                CaseId::Text("A-1".to_string())
            ]
        );
        assert_eq!(CaseId::Number(1001).to_string(), "1001");
    }
}
