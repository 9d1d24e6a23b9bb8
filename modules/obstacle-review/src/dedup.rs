//! Geospatial duplicate detection.
//!
//! A candidate duplicates a target when both are active Point reports of the
//! exact same obstacle type within `radius_meters` of each other. Results are
//! nearest first, ties by candidate id. Pure functions over the given set.

use std::collections::HashMap;

use serde::Serialize;
use uuid::Uuid;

use obstacle_common::{distance_meters, Report, DEFAULT_DUPLICATE_RADIUS_M};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateMatch {
    pub report: Report,
    pub distance_meters: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct DuplicateDetector {
    radius_meters: f64,
}

impl Default for DuplicateDetector {
    fn default() -> Self {
        Self::new(DEFAULT_DUPLICATE_RADIUS_M)
    }
}

impl DuplicateDetector {
    pub fn new(radius_meters: f64) -> Self {
        Self { radius_meters }
    }

    /// Duplicates of `target` among `candidates`, nearest first.
    pub fn find(&self, target: &Report, candidates: &[Report]) -> Vec<DuplicateMatch> {
        find_duplicates(target, candidates, self.radius_meters)
    }

    /// Number of duplicates each report has within the same set.
    pub fn count_duplicates(&self, reports: &[Report]) -> HashMap<Uuid, usize> {
        reports
            .iter()
            .map(|r| (r.id, self.find(r, reports).len()))
            .collect()
    }
}

pub fn find_duplicates(
    target: &Report,
    candidates: &[Report],
    radius_meters: f64,
) -> Vec<DuplicateMatch> {
    // Line obstacles and inactive targets are never deduplicated.
    let Some((lat, lon)) = target.point().filter(|_| target.is_active()) else {
        return Vec::new();
    };

    let mut matches: Vec<DuplicateMatch> = candidates
        .iter()
        .filter(|c| c.id != target.id && c.is_active())
        .filter(|c| c.obstacle_type == target.obstacle_type)
        .filter_map(|c| {
            let (c_lat, c_lon) = c.point()?;
            let distance = distance_meters(lat, lon, c_lat, c_lon);
            (distance <= radius_meters).then(|| DuplicateMatch {
                report: c.clone(),
                distance_meters: distance,
            })
        })
        .collect();

    matches.sort_by(|a, b| {
        a.distance_meters
            .total_cmp(&b.distance_meters)
            .then_with(|| a.report.id.cmp(&b.report.id))
    });
    matches
}
