#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Aggregation of clustered accident records into risk points.
//!
//! Given records and their cluster labels, computes each cluster's
//! centroid, its member case list, the number of distinct cases per year
//! in a [`YearRange`], and its total size, then joins them into one
//! [`RiskPoint`] per cluster.

pub mod case_year;

use std::collections::{BTreeMap, BTreeSet};

use risk_map_accident_models::{AccidentRecord, CaseId};
use risk_map_analytics_models::{CaseIdCollisionPolicy, Centroid, RiskPoint, YearRange};
use risk_map_spatial::ClusterLabel;

pub use case_year::CaseYearIndex;

/// Errors that can occur during aggregation.
#[derive(Debug, thiserror::Error)]
pub enum AnalyticsError {
    /// Records and labels do not line up one-to-one.
    #[error("Got {labels} cluster labels for {records} records")]
    LabelMismatch {
        /// Number of records.
        records: usize,
        /// Number of labels.
        labels: usize,
    },

    /// A case id appeared with two different years.
    #[error("Case {case_id} appears with conflicting years {first:?} and {second:?}")]
    CaseYearCollision {
        /// The duplicated case id.
        case_id: String,
        /// Year seen first.
        first: Option<i32>,
        /// Conflicting year seen later.
        second: Option<i32>,
    },
}

/// Options controlling [`aggregate`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AggregateOptions {
    /// Years reported as individual columns.
    pub year_range: YearRange,
    /// Handling of case ids recorded with conflicting years.
    pub collision_policy: CaseIdCollisionPolicy,
}

/// Mean latitude/longitude of each cluster's members.
///
/// Noise points are ignored. `records` and `labels` are paired by
/// position; extra entries on either side are ignored.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn centroids(records: &[AccidentRecord], labels: &[ClusterLabel]) -> BTreeMap<u32, Centroid> {
    let mut sums: BTreeMap<u32, (f64, f64, usize)> = BTreeMap::new();

    for (record, label) in records.iter().zip(labels) {
        let Some(id) = label.id() else {
            continue;
        };
        let entry = sums.entry(id).or_insert((0.0, 0.0, 0));
        entry.0 += record.latitude;
        entry.1 += record.longitude;
        entry.2 += 1;
    }

    sums.into_iter()
        .map(|(id, (lat, lon, n))| {
            let n = n as f64;
            (
                id,
                Centroid {
                    latitude: lat / n,
                    longitude: lon / n,
                },
            )
        })
        .collect()
}

/// Counts distinct cases per year for every year in `range`.
///
/// Each case's year comes from `index`; cases whose year is missing or
/// outside the range are not counted anywhere.
#[must_use]
pub fn count_cases_in_years(
    cases: &[CaseId],
    index: &CaseYearIndex,
    range: YearRange,
) -> BTreeMap<i32, u64> {
    let mut counts: BTreeMap<i32, u64> = range.years().map(|year| (year, 0)).collect();

    let distinct: BTreeSet<&CaseId> = cases.iter().collect();
    for case_id in distinct {
        if let Some(year) = index.year_of(case_id)
            && let Some(count) = counts.get_mut(&year)
        {
            *count += 1;
        }
    }

    counts
}

/// Builds one [`RiskPoint`] per cluster, ordered by cluster id.
///
/// Noise points are excluded. Clusters without a centroid are dropped,
/// which cannot happen when both come from the same records.
///
/// # Errors
///
/// Returns [`AnalyticsError::LabelMismatch`] if `records` and `labels`
/// differ in length, or [`AnalyticsError::CaseYearCollision`] under
/// [`CaseIdCollisionPolicy::Fail`].
pub fn aggregate(
    records: &[AccidentRecord],
    labels: &[ClusterLabel],
    options: &AggregateOptions,
) -> Result<Vec<RiskPoint>, AnalyticsError> {
    if records.len() != labels.len() {
        return Err(AnalyticsError::LabelMismatch {
            records: records.len(),
            labels: labels.len(),
        });
    }

    let index = CaseYearIndex::build(records, options.collision_policy)?;
    if index.collisions() > 0 {
        log::warn!(
            "{} case ids were recorded with conflicting years",
            index.collisions()
        );
    }

    let centroids = centroids(records, labels);

    let mut members: BTreeMap<u32, Vec<CaseId>> = BTreeMap::new();
    for (record, label) in records.iter().zip(labels) {
        if let Some(id) = label.id() {
            members.entry(id).or_default().push(record.case_id.clone());
        }
    }

    let range = options.year_range;
    let mut uncounted = 0_usize;
    let mut risk_points = Vec::with_capacity(members.len());

    for (cluster, case_list) in members {
        let Some(&centroid) = centroids.get(&cluster) else {
            log::debug!("Cluster {cluster} has no centroid; skipping");
            continue;
        };

        let year_counts = count_cases_in_years(&case_list, &index, range);
        let distinct = case_list.iter().collect::<BTreeSet<_>>().len();
        let counted: u64 = year_counts.values().sum();
        uncounted += distinct - usize::try_from(counted).unwrap_or(distinct);

        risk_points.push(RiskPoint {
            cluster,
            count: case_list.len() as u64,
            case_list,
            year_counts,
            centroid,
        });
    }

    if uncounted > 0 {
        log::info!(
            "{uncounted} cases fall outside {}..={} or lack a year and are only reflected in `count`",
            range.first(),
            range.last()
        );
    }
    log::info!("Aggregated {} risk points", risk_points.len());

    Ok(risk_points)
}
