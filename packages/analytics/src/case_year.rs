//! Case identifier to death-year lookup.

use std::collections::BTreeMap;

use risk_map_accident_models::{AccidentRecord, CaseId};
use risk_map_analytics_models::CaseIdCollisionPolicy;

use crate::AnalyticsError;

/// Maps each case id to the death year recorded for it.
///
/// A collision is the same case id seen with two different years. Under
/// [`CaseIdCollisionPolicy::Warn`] the last-seen year wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaseYearIndex {
    years: BTreeMap<CaseId, Option<i32>>,
    collisions: usize,
}

impl CaseYearIndex {
    /// Builds the index from records in input order.
    ///
    /// # Errors
    ///
    /// Returns [`AnalyticsError::CaseYearCollision`] on the first
    /// collision when `policy` is [`CaseIdCollisionPolicy::Fail`].
    pub fn build(
        records: &[AccidentRecord],
        policy: CaseIdCollisionPolicy,
    ) -> Result<Self, AnalyticsError> {
        let mut years = BTreeMap::new();
        let mut collisions = 0;

        for record in records {
            let Some(previous) = years.insert(record.case_id.clone(), record.dead_year) else {
                continue;
            };
            if previous == record.dead_year {
                continue;
            }

            collisions += 1;
            match policy {
                CaseIdCollisionPolicy::Fail => {
                    return Err(AnalyticsError::CaseYearCollision {
                        case_id: record.case_id.to_string(),
                        first: previous,
                        second: record.dead_year,
                    });
                }
                CaseIdCollisionPolicy::Warn => {
                    log::warn!(
                        "Case {} appears with years {previous:?} and {:?}; keeping {:?}",
                        record.case_id,
                        record.dead_year,
                        record.dead_year
                    );
                }
            }
        }

        Ok(Self { years, collisions })
    }

    /// Year recorded for `case_id`, if the case is known and has a year.
    #[must_use]
    pub fn year_of(&self, case_id: &CaseId) -> Option<i32> {
        self.years.get(case_id).copied().flatten()
    }

    /// Number of collisions seen while building.
    #[must_use]
    pub const fn collisions(&self) -> usize {
        self.collisions
    }

    /// Number of distinct case ids.
    #[must_use]
    pub fn len(&self) -> usize {
        self.years.len()
    }

    /// Returns `true` if no cases were indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.years.is_empty()
    }
}
