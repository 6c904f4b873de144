#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Risk point summary types.
//!
//! A [`RiskPoint`] is one row of the final hotspot table: the members of a
//! spatial cluster, their per-year incidence over a [`YearRange`], and the
//! cluster [`Centroid`].

use std::collections::BTreeMap;

use risk_map_accident_models::CaseId;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// First year (Buddhist Era) of the default reporting window.
pub const DEFAULT_FIRST_YEAR: i32 = 2555;

/// Last year (Buddhist Era, inclusive) of the default reporting window.
pub const DEFAULT_LAST_YEAR: i32 = 2565;

/// Inclusive range of years reported as individual columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct YearRange {
    first: i32,
    last: i32,
}

impl YearRange {
    /// Creates an inclusive year range.
    ///
    /// # Errors
    ///
    /// Returns an error if `first` is after `last`.
    pub const fn new(first: i32, last: i32) -> Result<Self, InvalidYearRangeError> {
        if first > last {
            return Err(InvalidYearRangeError { first, last });
        }
        Ok(Self { first, last })
    }

    /// First year in the range.
    #[must_use]
    pub const fn first(self) -> i32 {
        self.first
    }

    /// Last year in the range (inclusive).
    #[must_use]
    pub const fn last(self) -> i32 {
        self.last
    }

    /// Returns `true` if `year` falls inside the range.
    #[must_use]
    pub const fn contains(self, year: i32) -> bool {
        year >= self.first && year <= self.last
    }

    /// Iterates every year in the range in ascending order.
    pub fn years(self) -> impl Iterator<Item = i32> {
        self.first..=self.last
    }
}

impl Default for YearRange {
    fn default() -> Self {
        Self {
            first: DEFAULT_FIRST_YEAR,
            last: DEFAULT_LAST_YEAR,
        }
    }
}

/// Error returned when a [`YearRange`] would end before it starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidYearRangeError {
    /// Requested first year.
    pub first: i32,
    /// Requested last year.
    pub last: i32,
}

impl std::fmt::Display for InvalidYearRangeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "invalid year range {}..={}: first year is after last year",
            self.first, self.last
        )
    }
}

impl std::error::Error for InvalidYearRangeError {}

/// What to do when one case identifier appears with two different years.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CaseIdCollisionPolicy {
    /// Log each collision and keep the last-seen year.
    #[default]
    Warn,
    /// Abort aggregation on the first collision.
    Fail,
}

/// Arithmetic mean position of a cluster's members, in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Centroid {
    /// Mean latitude.
    pub latitude: f64,
    /// Mean longitude.
    pub longitude: f64,
}

/// One accident hotspot: a cluster with its yearly incidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskPoint {
    /// Cluster id assigned by the clusterer.
    pub cluster: u32,
    /// Member case ids in input order (repeats kept).
    pub case_list: Vec<CaseId>,
    /// Distinct cases per year, one entry for every year in the range.
    pub year_counts: BTreeMap<i32, u64>,
    /// Number of member rows.
    pub count: u64,
    /// Cluster centroid.
    pub centroid: Centroid,
}

impl RiskPoint {
    /// Count for `year`, or 0 when the year is outside the range.
    #[must_use]
    pub fn year_count(&self, year: i32) -> u64 {
        self.year_counts.get(&year).copied().unwrap_or(0)
    }

    /// Sum of all per-year counts. Never exceeds [`Self::count`].
    #[must_use]
    pub fn yearly_total(&self) -> u64 {
        self.year_counts.values().sum()
    }
}
