#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Density-based clustering of accident points over haversine distance.
//!
//! Points are indexed in an R-tree as unit vectors on the sphere so that a
//! great-circle radius maps to a fixed chord length. Candidate neighbours
//! from the tree are confirmed with the exact haversine distance, then
//! grouped with DBSCAN. With `min_samples = 1` every point is a core
//! point, so the clusters are the connected components of the "within
//! radius" graph and no point is ever labelled noise.

use std::collections::VecDeque;
use std::sync::Arc;

use geo::{Distance, Haversine, Point};
use risk_map_accident_models::progress::ProgressCallback;
use rstar::RTree;
use rstar::primitives::GeomWithData;
use serde::{Deserialize, Serialize};

/// Kilometres per radian on the mean-radius earth sphere.
pub const KMS_PER_RADIAN: f64 = 6371.0088;

/// Default neighbourhood radius in metres.
pub const DEFAULT_RADIUS_METERS: f64 = 100.0;

/// Default minimum neighbourhood size (the point itself included).
pub const DEFAULT_MIN_SAMPLES: usize = 1;

const EARTH_RADIUS_METERS: f64 = KMS_PER_RADIAN * 1000.0;

/// Errors that can occur when configuring the clusterer.
#[derive(Debug, thiserror::Error)]
pub enum SpatialError {
    /// The neighbourhood radius is not a positive finite distance.
    #[error("Invalid clustering radius: {radius_meters} m")]
    InvalidRadius {
        /// The rejected radius.
        radius_meters: f64,
    },

    /// `min_samples` was zero.
    #[error("min_samples must be at least 1")]
    InvalidMinSamples,
}

/// DBSCAN parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DbscanParams {
    /// Great-circle neighbourhood radius in metres.
    pub radius_meters: f64,
    /// Minimum number of points (itself included) within the radius for a
    /// point to be a core point.
    pub min_samples: usize,
}

impl Default for DbscanParams {
    fn default() -> Self {
        Self {
            radius_meters: DEFAULT_RADIUS_METERS,
            min_samples: DEFAULT_MIN_SAMPLES,
        }
    }
}

impl DbscanParams {
    /// The radius as an angle in radians (`km / 6371.0088`).
    #[must_use]
    pub fn epsilon_radians(&self) -> f64 {
        self.radius_meters / 1000.0 / KMS_PER_RADIAN
    }

    /// Checks that the parameters describe a usable neighbourhood.
    ///
    /// # Errors
    ///
    /// Returns [`SpatialError`] for a non-positive or non-finite radius or a
    /// zero `min_samples`.
    pub fn validate(&self) -> Result<(), SpatialError> {
        if !self.radius_meters.is_finite() || self.radius_meters <= 0.0 {
            return Err(SpatialError::InvalidRadius {
                radius_meters: self.radius_meters,
            });
        }
        if self.min_samples == 0 {
            return Err(SpatialError::InvalidMinSamples);
        }
        Ok(())
    }
}

/// Cluster assignment for a single point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ClusterLabel {
    /// Not density-reachable from any core point.
    Noise,
    /// Member of the cluster with this id. Ids start at 0 and follow the
    /// input order of each cluster's first core point.
    Cluster(u32),
}

impl ClusterLabel {
    /// Returns the cluster id, or `None` for noise.
    #[must_use]
    pub const fn id(self) -> Option<u32> {
        match self {
            Self::Noise => None,
            Self::Cluster(id) => Some(id),
        }
    }
}

/// Great-circle distance in metres between two `(lat, lon)` points given
/// in degrees.
#[must_use]
pub fn haversine_meters(a: (f64, f64), b: (f64, f64)) -> f64 {
    Haversine.distance(Point::new(a.1, a.0), Point::new(b.1, b.0))
}

/// R-tree over unit-sphere positions, answering "who is within the radius".
struct NeighbourIndex {
    tree: RTree<GeomWithData<[f64; 3], usize>>,
    positions: Vec<[f64; 3]>,
    coords: Vec<(f64, f64)>,
    radius_meters: f64,
    max_squared_chord: f64,
}

impl NeighbourIndex {
    fn new(coords: &[(f64, f64)], radius_meters: f64) -> Self {
        let positions: Vec<[f64; 3]> = coords
            .iter()
            .map(|&(lat, lon)| unit_vector(lat, lon))
            .collect();

        let entries = positions
            .iter()
            .enumerate()
            .map(|(i, &p)| GeomWithData::new(p, i))
            .collect();

        let angle = (radius_meters / EARTH_RADIUS_METERS).min(std::f64::consts::PI);
        let chord = 2.0 * (angle / 2.0).sin();
        // Slack for rounding in the cartesian projection; the exact
        // haversine check below has the final say.
        let max_squared_chord = chord.mul_add(chord, 1e-12) * (1.0 + 1e-9);

        Self {
            tree: RTree::bulk_load(entries),
            positions,
            coords: coords.to_vec(),
            radius_meters,
            max_squared_chord,
        }
    }

    /// Indices of every point within the radius of point `i`, itself
    /// included, in ascending order.
    fn neighbours(&self, i: usize) -> Vec<usize> {
        let origin = self.coords[i];
        let mut found: Vec<usize> = self
            .tree
            .locate_within_distance(self.positions[i], self.max_squared_chord)
            .map(|entry| entry.data)
            .filter(|&j| j == i || haversine_meters(origin, self.coords[j]) <= self.radius_meters)
            .collect();
        found.sort_unstable();
        found
    }
}

fn unit_vector(lat_deg: f64, lon_deg: f64) -> [f64; 3] {
    let (lat, lon) = (lat_deg.to_radians(), lon_deg.to_radians());
    [lat.cos() * lon.cos(), lat.cos() * lon.sin(), lat.sin()]
}

/// Runs DBSCAN over `(lat, lon)` points in degrees.
///
/// Returns one [`ClusterLabel`] per input point, in input order. Labels
/// are deterministic for a given input order.
///
/// # Errors
///
/// Returns [`SpatialError`] if `params` fails [`DbscanParams::validate`].
pub fn cluster_points(
    coords: &[(f64, f64)],
    params: &DbscanParams,
    progress: &Arc<dyn ProgressCallback>,
) -> Result<Vec<ClusterLabel>, SpatialError> {
    params.validate()?;

    log::info!(
        "Clustering {} points (radius {} m, eps {:.3e} rad, min_samples {})",
        coords.len(),
        params.radius_meters,
        params.epsilon_radians(),
        params.min_samples
    );

    let index = NeighbourIndex::new(coords, params.radius_meters);

    progress.set_total(coords.len() as u64);
    progress.set_message("Finding neighbours".to_string());

    let neighbourhoods: Vec<Vec<usize>> = (0..coords.len())
        .map(|i| {
            let found = index.neighbours(i);
            progress.inc(1);
            found
        })
        .collect();

    let is_core: Vec<bool> = neighbourhoods
        .iter()
        .map(|n| n.len() >= params.min_samples)
        .collect();

    let mut labels: Vec<Option<u32>> = vec![None; coords.len()];
    let mut next_id: u32 = 0;
    let mut queue = VecDeque::new();

    for start in 0..coords.len() {
        if labels[start].is_some() || !is_core[start] {
            continue;
        }

        let id = next_id;
        next_id += 1;
        labels[start] = Some(id);
        queue.push_back(start);

        while let Some(p) = queue.pop_front() {
            if !is_core[p] {
                continue;
            }
            for &q in &neighbourhoods[p] {
                if labels[q].is_none() {
                    labels[q] = Some(id);
                    queue.push_back(q);
                }
            }
        }
    }

    let labels: Vec<ClusterLabel> = labels
        .into_iter()
        .map(|l| l.map_or(ClusterLabel::Noise, ClusterLabel::Cluster))
        .collect();

    let noise = labels.iter().filter(|l| **l == ClusterLabel::Noise).count();
    log::info!(
        "Found {next_id} clusters across {} points ({noise} noise)",
        labels.len()
    );
    progress.finish(format!("Clustered into {next_id} risk points"));

    Ok(labels)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use risk_map_accident_models::progress::null_progress;

    use super::*;

    /// Degrees of latitude spanning `meters` on the mean-radius sphere.
    fn lat_offset(meters: f64) -> f64 {
        (meters / EARTH_RADIUS_METERS).to_degrees()
    }

    fn run(coords: &[(f64, f64)], params: &DbscanParams) -> Vec<ClusterLabel> {
        cluster_points(coords, params, &null_progress()).unwrap()
    }

    #[test]
    fn epsilon_matches_100_meters_on_mean_sphere() {
        let eps = DbscanParams::default().epsilon_radians();
        assert!((eps - 0.1 / 6371.0088).abs() < 1e-15);
    }

    #[test]
    fn haversine_uses_mean_earth_radius() {
        let d = haversine_meters((0.0, 0.0), (1.0, 0.0));
        let expected = EARTH_RADIUS_METERS * 1_f64.to_radians();
        assert!((d - expected).abs() < 1e-6, "{d} vs {expected}");
    }

    #[test]
    fn close_points_share_a_cluster_and_far_points_do_not() {
        let a = (13.75, 100.50);
        let b = (13.750_01, 100.500_01);
        let c = (13.80, 100.60);
        assert!(haversine_meters(a, b) < 2.0);
        assert!(haversine_meters(a, c) > 5_000.0);

        let labels = run(&[a, b, c], &DbscanParams::default());
        assert_eq!(
            labels,
            vec![
                ClusterLabel::Cluster(0),
                ClusterLabel::Cluster(0),
                ClusterLabel::Cluster(1)
            ]
        );
    }

    #[test]
    fn points_beyond_radius_without_intermediates_are_separate() {
        let a = (13.75, 100.50);
        let b = (13.75 + lat_offset(150.0), 100.50);
        let labels = run(&[a, b], &DbscanParams::default());
        assert_ne!(labels[0], labels[1]);
    }

    #[test]
    fn chains_of_nearby_points_merge() {
        let step = lat_offset(80.0);
        let coords: Vec<(f64, f64)> = (0..4)
            .map(|i| (13.75 + step * f64::from(i), 100.50))
            .collect();
        assert!(haversine_meters(coords[0], coords[3]) > 200.0);

        let labels = run(&coords, &DbscanParams::default());
        assert!(labels.iter().all(|l| *l == ClusterLabel::Cluster(0)));
    }

    #[test]
    fn labels_partition_every_point() {
        let coords: Vec<(f64, f64)> = (0..50)
            .map(|i| {
                let i = f64::from(i);
                (13.7 + (i * 0.37).sin() * 0.01, 100.5 + (i * 0.11).cos() * 0.01)
            })
            .collect();

        let labels = run(&coords, &DbscanParams::default());
        assert_eq!(labels.len(), coords.len());
        assert!(labels.iter().all(|l| l.id().is_some()));

        let ids: BTreeSet<u32> = labels.iter().filter_map(|l| l.id()).collect();
        let max = *ids.iter().max().unwrap();
        assert_eq!(ids.len() as u32, max + 1, "cluster ids are dense from 0");
    }

    #[test]
    fn cluster_ids_follow_input_order() {
        let far = (14.0, 101.0);
        let near = (13.75, 100.50);
        let labels = run(&[far, near, far], &DbscanParams::default());
        assert_eq!(
            labels,
            vec![
                ClusterLabel::Cluster(0),
                ClusterLabel::Cluster(1),
                ClusterLabel::Cluster(0)
            ]
        );
    }

    #[test]
    fn min_samples_marks_sparse_points_as_noise() {
        let origin = (13.75, 100.50);
        let north = (13.75 + lat_offset(70.0), 100.50);
        let south = (13.75 - lat_offset(70.0), 100.50);
        let isolated = (13.90, 100.70);

        let params = DbscanParams {
            min_samples: 3,
            ..DbscanParams::default()
        };
        let labels = run(&[north, origin, south, isolated], &params);

        assert_eq!(
            labels,
            vec![
                ClusterLabel::Cluster(0),
                ClusterLabel::Cluster(0),
                ClusterLabel::Cluster(0),
                ClusterLabel::Noise
            ]
        );
        assert_eq!(labels[3].id(), None);
    }

    #[test]
    fn empty_input_yields_no_labels() {
        assert!(run(&[], &DbscanParams::default()).is_empty());
    }

    #[test]
    fn rejects_invalid_parameters() {
        let bad_radius = DbscanParams {
            radius_meters: 0.0,
            ..DbscanParams::default()
        };
        assert!(matches!(
            cluster_points(&[], &bad_radius, &null_progress()),
            Err(SpatialError::InvalidRadius { .. })
        ));

        let bad_samples = DbscanParams {
            min_samples: 0,
            ..DbscanParams::default()
        };
        assert!(matches!(
            cluster_points(&[], &bad_samples, &null_progress()),
            Err(SpatialError::InvalidMinSamples)
        ));
    }
}
