#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Spreadsheet export of risk points.
//!
//! Writes one worksheet with a plain header row and one row per
//! [`RiskPoint`]: cluster id, member case list, a count column per year in
//! the [`YearRange`], total count, centroid, and a Google Maps search link
//! for the centroid. Existing files are overwritten.

use std::path::Path;

use risk_map_accident_models::CaseId;
use risk_map_analytics_models::{Centroid, RiskPoint, YearRange};
use rust_xlsxwriter::{Workbook, XlsxError};

/// Base URL for Google Maps coordinate searches.
pub const MAPS_SEARCH_URL: &str = "https://www.google.com/maps/search/?api=1&query=";

/// Output column holding the cluster id.
pub const CLUSTER_COLUMN: &str = "cluster";

/// Output column holding the member case ids.
pub const CASE_LIST_COLUMN: &str = "case_list";

/// Output column holding the member row count.
pub const COUNT_COLUMN: &str = "count";

/// Output column holding the centroid latitude.
pub const LAT_CENTROID_COLUMN: &str = "Acc_lat_centroid";

/// Output column holding the centroid longitude.
pub const LONG_CENTROID_COLUMN: &str = "Acc_long_centroid";

/// Output column holding the map link.
pub const MAPS_URL_COLUMN: &str = "Google Maps URL";

/// Maximum number of columns in an `.xlsx` worksheet.
const MAX_COLUMNS: usize = 16_384;

/// Maximum number of characters in an `.xlsx` cell.
pub const MAX_CELL_CHARS: usize = 32_767;

/// Errors that can occur while writing the output workbook.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    /// The spreadsheet writer failed (including I/O on save).
    #[error("Failed to write workbook: {0}")]
    Xlsx(#[from] XlsxError),

    /// The year range needs more columns than a worksheet allows.
    #[error("{columns} output columns exceed the worksheet limit of 16384")]
    TooManyColumns {
        /// Number of columns requested.
        columns: usize,
    },
}

/// Renders a coordinate the way a plain float-to-string conversion does:
/// shortest round-trip digits, with `.0` kept on integral values.
#[must_use]
pub fn format_coordinate(value: f64) -> String {
    let text = value.to_string();
    if value.is_finite() && !text.contains('.') {
        format!("{text}.0")
    } else {
        text
    }
}

/// Google Maps search URL pointing at `centroid`.
#[must_use]
pub fn google_maps_url(centroid: &Centroid) -> String {
    format!(
        "{MAPS_SEARCH_URL}{},{}",
        format_coordinate(centroid.latitude),
        format_coordinate(centroid.longitude)
    )
}

fn format_case_id(case: &CaseId) -> String {
    match case {
        CaseId::Number(n) => n.to_string(),
        CaseId::Text(s) => format!("'{}'", s.replace('\\', "\\\\").replace('\'', "\\'")),
    }
}

/// Renders case ids as a list literal, e.g. `[1001, 'A-7']`.
#[must_use]
pub fn format_case_list(cases: &[CaseId]) -> String {
    truncated_case_list(cases, usize::MAX).0
}

/// Renders case ids as a list literal of at most `max_chars` characters.
///
/// The list is cut after the last id that fits and still closed with `]`.
/// Returns the rendered list and the number of ids left out.
#[must_use]
pub fn truncated_case_list(cases: &[CaseId], max_chars: usize) -> (String, usize) {
    let mut rendered = String::from("[");
    let mut chars = 1_usize;

    for (written, case) in cases.iter().enumerate() {
        let item = format_case_id(case);
        let separator = if written == 0 { 0 } else { 2 };
        let item_chars = item.chars().count();

        if chars.saturating_add(separator + item_chars + 1) > max_chars {
            rendered.push(']');
            return (rendered, cases.len() - written);
        }

        if separator > 0 {
            rendered.push_str(", ");
        }
        rendered.push_str(&item);
        chars += separator + item_chars;
    }

    rendered.push(']');
    (rendered, 0)
}

/// Header row for a given year range.
#[must_use]
pub fn header_row(range: YearRange) -> Vec<String> {
    let mut headers = vec![CLUSTER_COLUMN.to_string(), CASE_LIST_COLUMN.to_string()];
    headers.extend(range.years().map(|year| year.to_string()));
    headers.extend(
        [
            COUNT_COLUMN,
            LAT_CENTROID_COLUMN,
            LONG_CENTROID_COLUMN,
            MAPS_URL_COLUMN,
        ]
        .map(String::from),
    );
    headers
}

/// Writes `points` to a new workbook at `path`, replacing any existing file.
///
/// # Errors
///
/// Returns [`ExportError`] if the year range produces too many columns or
/// the workbook cannot be written.
#[allow(clippy::cast_precision_loss)]
pub fn write_risk_points(
    path: &Path,
    points: &[RiskPoint],
    range: YearRange,
) -> Result<(), ExportError> {
    let headers = header_row(range);
    if headers.len() > MAX_COLUMNS {
        return Err(ExportError::TooManyColumns {
            columns: headers.len(),
        });
    }

    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();

    for (col, name) in (0_u16..).zip(&headers) {
        sheet.write_string(0, col, name)?;
    }

    for (row, point) in (1_u32..).zip(points) {
        let mut col: u16 = 0;
        let mut next_col = || {
            let current = col;
            col += 1;
            current
        };

        sheet.write_number(row, next_col(), f64::from(point.cluster))?;
        let (case_list, omitted) = truncated_case_list(&point.case_list, MAX_CELL_CHARS);
        if omitted > 0 {
            log::warn!(
                "Cluster {}: case_list cut to the {MAX_CELL_CHARS} character cell limit, {omitted} of {} ids omitted",
                point.cluster,
                point.case_list.len()
            );
        }
        sheet.write_string(row, next_col(), case_list)?;
        for year in range.years() {
            sheet.write_number(row, next_col(), point.year_count(year) as f64)?;
        }
        sheet.write_number(row, next_col(), point.count as f64)?;
        sheet.write_number(row, next_col(), point.centroid.latitude)?;
        sheet.write_number(row, next_col(), point.centroid.longitude)?;
        sheet.write_string(row, next_col(), google_maps_url(&point.centroid))?;
    }

    workbook.save(path)?;
    log::info!("Wrote {} risk points to {}", points.len(), path.display());

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use calamine::{Data, Reader, Xlsx, open_workbook};

    use super::*;

    fn point() -> RiskPoint {
        RiskPoint {
            cluster: 3,
            case_list: vec![CaseId::Number(1001), CaseId::Number(1002)],
            year_counts: YearRange::default()
                .years()
                .map(|year| (year, u64::from(year == 2560) * 2))
                .collect::<BTreeMap<_, _>>(),
            count: 2,
            centroid: Centroid {
                latitude: 13.750_005,
                longitude: 100.500_005,
            },
        }
    }

    #[test]
    fn maps_url_uses_plain_coordinates() {
        let url = google_maps_url(&Centroid {
            latitude: 13.75,
            longitude: 100.0,
        });
        assert_eq!(
            url,
            "https://www.google.com/maps/search/?api=1&query=13.75,100.0"
        );
    }

    #[test]
    fn case_list_renders_like_a_list_literal() {
        assert_eq!(
            format_case_list(&[CaseId::Number(1001), CaseId::Number(1002)]),
            "[1001, 1002]"
        );
        assert_eq!(
            format_case_list(&[CaseId::Text("A-7".to_string()), CaseId::Number(3)]),
            "['A-7', 3]"
        );
        assert_eq!(format_case_list(&[]), "[]");
    }

    #[test]
    fn truncated_case_list_ends_at_a_whole_id() {
        let cases = [CaseId::Number(1), CaseId::Number(2), CaseId::Number(3)];
        assert_eq!(truncated_case_list(&cases, 7), ("[1, 2]".to_string(), 1));
        assert_eq!(truncated_case_list(&cases, 9), ("[1, 2, 3]".to_string(), 0));
        assert_eq!(truncated_case_list(&cases, 2), ("[]".to_string(), 3));
    }

    #[test]
    fn header_lists_years_between_case_list_and_count() {
        let headers = header_row(YearRange::default());
        assert_eq!(headers.len(), 17);
        assert_eq!(headers[..3], ["cluster", "case_list", "2555"]);
        assert_eq!(
            headers[12..],
            [
                "2565",
                "count",
                "Acc_lat_centroid",
                "Acc_long_centroid",
                "Google Maps URL"
            ]
        );
    }

    #[test]
    fn writes_a_readable_workbook() {
        let path = std::env::temp_dir().join(format!(
            "risk_map_export_{}_risk_points.xlsx",
            std::process::id()
        ));
        std::fs::write(&path, b"stale").unwrap();

        write_risk_points(&path, &[point()], YearRange::default()).unwrap();

        let mut workbook: Xlsx<_> = open_workbook(&path).unwrap();
        let range = workbook.worksheet_range_at(0).unwrap().unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(range.height(), 2);
        assert_eq!(range.width(), 17);
        assert_eq!(
            range.get_value((0, 16)),
            Some(&Data::String("Google Maps URL".to_string()))
        );
        assert_eq!(range.get_value((1, 0)), Some(&Data::Float(3.0)));
        assert_eq!(
            range.get_value((1, 1)),
            Some(&Data::String("[1001, 1002]".to_string()))
        );
        assert_eq!(range.get_value((1, 7)), Some(&Data::Float(2.0)));
        assert_eq!(range.get_value((1, 2)), Some(&Data::Float(0.0)));
        assert_eq!(range.get_value((1, 13)), Some(&Data::Float(2.0)));
        assert_eq!(
            range.get_value((1, 16)),
            Some(&Data::String(
                "https://www.google.com/maps/search/?api=1&query=13.750005,100.500005".to_string()
            ))
        );
    }

    #[test]
    fn writes_clusters_whose_case_list_exceeds_the_cell_limit() {
        let path = std::env::temp_dir().join(format!(
            "risk_map_export_{}_large_cluster.xlsx",
            std::process::id()
        ));
        let large = RiskPoint {
            case_list: (0..4_000_i64)
                .map(|i| CaseId::Number(6_000_000_000 + i))
                .collect(),
            count: 4_000,
            ..point()
        };

        write_risk_points(&path, &[large], YearRange::default()).unwrap();

        let mut workbook: Xlsx<_> = open_workbook(&path).unwrap();
        let range = workbook.worksheet_range_at(0).unwrap().unwrap();
        std::fs::remove_file(&path).ok();

        let Some(Data::String(case_list)) = range.get_value((1, 1)) else {
            panic!("case_list cell missing");
        };
        assert!(case_list.chars().count() <= MAX_CELL_CHARS);
        assert!(case_list.starts_with("[6000000000, 6000000001, "));
        assert!(case_list.ends_with(", 6000002729]"));
        assert_eq!(range.get_value((1, 13)), Some(&Data::Float(4_000.0)));
    }

    #[test]
    fn rejects_year_ranges_wider_than_a_worksheet() {
        let path = std::env::temp_dir().join("risk_map_export_never_written.xlsx");
        let range = YearRange::new(0, 20_000).unwrap();
        assert!(matches!(
            write_risk_points(&path, &[], range),
            Err(ExportError::TooManyColumns { columns: 20_007 })
        ));
    }
}
