#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Loading and cleaning of accident spreadsheets.
//!
//! [`load::load_workbook`] reads a worksheet into a [`RawTable`], then
//! [`clean::clean_coordinates`] coerces the coordinate columns to numbers
//! and drops rows that fail coercion. [`records::extract_records`] turns
//! the cleaned table into typed [`AccidentRecord`]s for clustering.
//!
//! [`RawTable`]: risk_map_accident_models::RawTable
//! [`AccidentRecord`]: risk_map_accident_models::AccidentRecord

pub mod clean;
pub mod load;
pub mod records;

pub use clean::{CleanReport, clean_coordinates, coerce_numeric};
pub use load::load_workbook;
pub use records::extract_records;

/// Errors that can occur while loading or cleaning the input table.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// The workbook could not be opened or a worksheet could not be read.
    #[error("Failed to read workbook {path}: {source}")]
    Workbook {
        /// Path of the workbook.
        path: String,
        /// Underlying spreadsheet error.
        source: calamine::Error,
    },

    /// The workbook contains no worksheets.
    #[error("Workbook {path} has no worksheets")]
    NoWorksheets {
        /// Path of the workbook.
        path: String,
    },

    /// A required column is not present in the header row.
    #[error("Missing required column: {name}")]
    MissingColumn {
        /// Name of the missing column.
        name: String,
    },

    /// A row reached record extraction without numeric coordinates.
    #[error("Row {row} has non-numeric coordinates; clean the table first")]
    InvalidCoordinate {
        /// Zero-based data row index.
        row: usize,
    },
}
