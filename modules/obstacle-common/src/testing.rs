// Test helpers for building reports at known positions.

use chrono::{Duration, Utc};
use uuid::Uuid;

use crate::geo::EARTH_RADIUS_M;
use crate::types::{Geometry, Report, ReportStatus};

/// Kristiansand harbour, the reference point used across tests.
pub const KRISTIANSAND: (f64, f64) = (58.1599, 8.0182);

/// Pending Point report of the given type at `(lat, lon)`.
pub fn report_at(lat: f64, lon: f64, obstacle_type: &str) -> Report {
    let now = Utc::now();
    Report {
        id: Uuid::new_v4(),
        reporter_id: 1,
        obstacle_type: obstacle_type.to_string(),
        geometry: Geometry::point(lat, lon),
        geometry_resolved: true,
        height_meters: None,
        description: None,
        comments: None,
        status: ReportStatus::Pending,
        reject_reason: None,
        merged_into: None,
        notes: Vec::new(),
        photo: None,
        created_at: now,
        updated_at: now,
    }
}

/// Same as [`report_at`] with a fixed id, for tie-break assertions.
pub fn report_with_id(id: Uuid, lat: f64, lon: f64, obstacle_type: &str) -> Report {
    Report {
        id,
        ..report_at(lat, lon, obstacle_type)
    }
}

/// Shift the creation time into the past.
pub fn aged(mut report: Report, minutes: i64) -> Report {
    report.created_at -= Duration::minutes(minutes);
    report.updated_at = report.created_at;
    report
}

/// Position `meters` due north of `(lat, lon)`.
pub fn north_of(lat: f64, lon: f64, meters: f64) -> (f64, f64) {
    (lat + (meters / EARTH_RADIUS_M).to_degrees(), lon)
}
