//! Load → clean → cluster → aggregate → export.
//!
//! Each stage is a plain function from the library crates; this module
//! only threads their outputs together and reports what happened.

use std::path::PathBuf;
use std::sync::Arc;

use risk_map_accident_models::progress::ProgressCallback;
use risk_map_accident_models::{AccidentRecord, ColumnNames, buddhist_to_gregorian};
use risk_map_analytics::AggregateOptions;
use risk_map_analytics_models::{RiskPoint, YearRange};
use risk_map_spatial::DbscanParams;

/// Default input workbook.
pub const DEFAULT_INPUT: &str = "integration_final_bkk_no_person.xlsx";

/// Default output workbook.
pub const DEFAULT_OUTPUT: &str = "risk_points.xlsx";

/// Everything one run needs.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Workbook holding one row per fatality case.
    pub input: PathBuf,
    /// Workbook to write risk points to; replaced if it exists.
    pub output: PathBuf,
    /// Worksheet to read; the first sheet when `None`.
    pub sheet: Option<String>,
    /// Input column names for case id, year, and coordinates.
    pub columns: ColumnNames,
    /// Clustering radius and core point threshold.
    pub dbscan: DbscanParams,
    /// Reported year window and case id collision handling.
    pub aggregate: AggregateOptions,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            input: PathBuf::from(DEFAULT_INPUT),
            output: PathBuf::from(DEFAULT_OUTPUT),
            sheet: None,
            columns: ColumnNames::default(),
            dbscan: DbscanParams::default(),
            aggregate: AggregateOptions::default(),
        }
    }
}

/// Row and cluster counts from a completed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineSummary {
    /// Data rows read from the input worksheet.
    pub loaded_rows: usize,
    /// Rows dropped for a missing or non-numeric coordinate.
    pub dropped_rows: usize,
    /// Records clustered (cleaned rows with a case id).
    pub records: usize,
    /// Risk points written to the output workbook.
    pub risk_points: usize,
}

/// Describes a Buddhist Era year window with its Gregorian equivalent,
/// e.g. `2555-2565 BE (2012-2022)`.
fn year_span(range: YearRange) -> String {
    format!(
        "{}-{} BE ({}-{})",
        range.first(),
        range.last(),
        buddhist_to_gregorian(range.first()),
        buddhist_to_gregorian(range.last())
    )
}

/// Clusters `records` and aggregates the clusters into risk points.
///
/// # Errors
///
/// Returns an error if the clustering parameters are invalid or
/// aggregation fails (e.g. a case id collision under the `fail` policy).
pub fn analyze(
    records: &[AccidentRecord],
    dbscan: &DbscanParams,
    options: &AggregateOptions,
    progress: &Arc<dyn ProgressCallback>,
) -> Result<Vec<RiskPoint>, Box<dyn std::error::Error>> {
    let coords: Vec<(f64, f64)> = records
        .iter()
        .map(|r| (r.latitude, r.longitude))
        .collect();

    let labels = risk_map_spatial::cluster_points(&coords, dbscan, progress)?;
    let risk_points = risk_map_analytics::aggregate(records, &labels, options)?;

    Ok(risk_points)
}

/// Runs the whole pipeline from input workbook to output workbook.
///
/// # Errors
///
/// Returns an error if the input cannot be read, a required column is
/// missing, clustering or aggregation fails, or the output cannot be
/// written. Nothing is retried.
pub fn run(
    config: &PipelineConfig,
    progress: &Arc<dyn ProgressCallback>,
) -> Result<PipelineSummary, Box<dyn std::error::Error>> {
    log::info!("Loading {}...", config.input.display());
    let table = risk_map_ingest::load_workbook(&config.input, config.sheet.as_deref())?;
    let loaded_rows = table.len();

    let cleaned = risk_map_ingest::clean_coordinates(table, &config.columns)?;
    let records = risk_map_ingest::extract_records(&cleaned.table, &config.columns)?;

    log::info!(
        "Clustering {} records within {} m, counting years {}",
        records.len(),
        config.dbscan.radius_meters,
        year_span(config.aggregate.year_range)
    );
    let risk_points = analyze(&records, &config.dbscan, &config.aggregate, progress)?;

    risk_map_export::write_risk_points(
        &config.output,
        &risk_points,
        config.aggregate.year_range,
    )?;

    Ok(PipelineSummary {
        loaded_rows,
        dropped_rows: cleaned.dropped,
        records: records.len(),
        risk_points: risk_points.len(),
    })
}

#[cfg(test)]
mod tests {
    use calamine::{Data, Reader, Xlsx, open_workbook};
    use risk_map_accident_models::CaseId;
    use risk_map_accident_models::progress::null_progress;
    use rust_xlsxwriter::Workbook;

    use super::*;

    fn record(id: i64, lat: f64, lon: f64) -> AccidentRecord {
        AccidentRecord {
            case_id: CaseId::Number(id),
            dead_year: Some(2560),
            latitude: lat,
            longitude: lon,
        }
    }

    #[test]
    fn two_nearby_points_and_one_distant_point_make_two_risk_points() {
        let records = [
            record(1, 13.75, 100.50),
            record(2, 13.750_01, 100.500_01),
            record(3, 13.80, 100.60),
        ];

        let points = analyze(
            &records,
            &DbscanParams::default(),
            &AggregateOptions::default(),
            &null_progress(),
        )
        .unwrap();

        assert_eq!(points.len(), 2);

        let pair = &points[0];
        assert_eq!(pair.count, 2);
        assert_eq!(pair.year_count(2560), 2);
        assert_eq!(pair.case_list, vec![CaseId::Number(1), CaseId::Number(2)]);
        assert!((pair.centroid.latitude - 13.750_005).abs() < 1e-9);
        assert!((pair.centroid.longitude - 100.500_005).abs() < 1e-9);

        let single = &points[1];
        assert_eq!(single.count, 1);
        assert_eq!(single.year_count(2560), 1);
        assert_eq!(single.case_list, vec![CaseId::Number(3)]);
    }

    #[test]
    fn runs_from_workbook_to_workbook() {
        let dir = std::env::temp_dir();
        let pid = std::process::id();
        let input = dir.join(format!("risk_map_cli_{pid}_input.xlsx"));
        let output = dir.join(format!("risk_map_cli_{pid}_risk_points.xlsx"));

        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        for (col, name) in ["DEAD_CONSO_REPORT_ID", "DEAD_YEAR", "Acc_lat", "Acc_long"]
            .into_iter()
            .enumerate()
        {
            sheet.write_string(0, u16::try_from(col).unwrap(), name).unwrap();
        }
        let rows: [(f64, f64, &str, &str); 4] = [
            (1001.0, 2560.0, "13.75", "100.5"),
            (1002.0, 2560.0, "13.75001", "100.50001"),
            (1003.0, 2560.0, "13.8", "100.6"),
            (1004.0, 2561.0, "unknown", "100.6"),
        ];
        for (row, (id, year, lat, lon)) in (1_u32..).zip(rows) {
            sheet.write_number(row, 0, id).unwrap();
            sheet.write_number(row, 1, year).unwrap();
            sheet.write_string(row, 2, lat).unwrap();
            sheet.write_string(row, 3, lon).unwrap();
        }
        workbook.save(&input).unwrap();

        let config = PipelineConfig {
            input: input.clone(),
            output: output.clone(),
            ..PipelineConfig::default()
        };
        let summary = run(&config, &null_progress()).unwrap();

        let mut result: Xlsx<_> = open_workbook(&output).unwrap();
        let range = result.worksheet_range_at(0).unwrap().unwrap();
        std::fs::remove_file(&input).ok();
        std::fs::remove_file(&output).ok();

        assert_eq!(
            summary,
            PipelineSummary {
                loaded_rows: 4,
                dropped_rows: 1,
                records: 3,
                risk_points: 2,
            }
        );
        assert_eq!(range.height(), 3);
        assert_eq!(
            range.get_value((1, 1)),
            Some(&Data::String("[1001, 1002]".to_string()))
        );
        assert_eq!(range.get_value((2, 13)), Some(&Data::Float(1.0)));
    }

    #[test]
    fn year_span_shows_gregorian_years() {
        assert_eq!(year_span(YearRange::default()), "2555-2565 BE (2012-2022)");
    }

    #[test]
    fn missing_input_fails() {
        let config = PipelineConfig {
            input: std::env::temp_dir().join("risk_map_cli_missing_input.xlsx"),
            ..PipelineConfig::default()
        };
        assert!(run(&config, &null_progress()).is_err());
    }
}
