use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ObstacleError;

/// Max characters kept from a submitted description.
pub const DESCRIPTION_MAX_CHARS: usize = 50;
/// Max characters kept in the comments field.
pub const COMMENTS_MAX_CHARS: usize = 255;

// --- Geo Types ---

/// A `[longitude, latitude]` pair, GeoJSON axis order.
pub type Position = [f64; 2];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GeometryType {
    Point,
    LineString,
}

impl fmt::Display for GeometryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GeometryType::Point => write!(f, "Point"),
            GeometryType::LineString => write!(f, "LineString"),
        }
    }
}

/// Stored obstacle shape. Serializes as `{"type": ..., "coordinates": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "coordinates")]
pub enum Geometry {
    Point(Position),
    LineString(Vec<Position>),
}

impl Geometry {
    pub fn point(lat: f64, lon: f64) -> Self {
        Geometry::Point([lon, lat])
    }

    /// Build a line, refusing anything shorter than two positions.
    pub fn line_string(positions: Vec<Position>) -> Option<Self> {
        (positions.len() >= 2).then_some(Geometry::LineString(positions))
    }

    pub fn geometry_type(&self) -> GeometryType {
        match self {
            Geometry::Point(_) => GeometryType::Point,
            Geometry::LineString(_) => GeometryType::LineString,
        }
    }
}

// --- Status ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReportStatus {
    #[serde(alias = "SENT")]
    Pending,
    Approved,
    Rejected,
}

struct StatusMapping {
    status: ReportStatus,
    wire: &'static str,
    label: &'static str,
    aliases: &'static [&'static str],
}

/// The single mapping between statuses, wire strings and display labels.
const STATUS_TABLE: &[StatusMapping] = &[
    StatusMapping {
        status: ReportStatus::Pending,
        wire: "PENDING",
        label: "Pending review",
        aliases: &["SENT"],
    },
    StatusMapping {
        status: ReportStatus::Approved,
        wire: "APPROVED",
        label: "Approved",
        aliases: &[],
    },
    StatusMapping {
        status: ReportStatus::Rejected,
        wire: "REJECTED",
        label: "Rejected",
        aliases: &[],
    },
];

impl ReportStatus {
    fn mapping(self) -> &'static StatusMapping {
        STATUS_TABLE
            .iter()
            .find(|m| m.status == self)
            .unwrap_or(&STATUS_TABLE[0])
    }

    pub fn as_wire(self) -> &'static str {
        self.mapping().wire
    }

    pub fn label(self) -> &'static str {
        self.mapping().label
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, ReportStatus::Approved | ReportStatus::Rejected)
    }
}

impl fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_wire())
    }
}

impl FromStr for ReportStatus {
    type Err = ObstacleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        STATUS_TABLE
            .iter()
            .find(|m| {
                m.wire.eq_ignore_ascii_case(s)
                    || m.aliases.iter().any(|a| a.eq_ignore_ascii_case(s))
            })
            .map(|m| m.status)
            .ok_or_else(|| ObstacleError::Validation(format!("unknown report status: {s:?}")))
    }
}

// --- Identities ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub id: i64,
    pub email: String,
    pub display_name: Option<String>,
}

// --- Reports ---

/// Append-only administrator annotation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportNote {
    pub author_id: i64,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

/// The canonical obstacle observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub id: Uuid,
    pub reporter_id: i64,
    pub obstacle_type: String,
    pub geometry: Geometry,
    /// False when intake could not find coordinates and stored (0, 0).
    pub geometry_resolved: bool,
    pub height_meters: Option<f64>,
    pub description: Option<String>,
    pub comments: Option<String>,
    pub status: ReportStatus,
    pub reject_reason: Option<String>,
    pub merged_into: Option<Uuid>,
    #[serde(default)]
    pub notes: Vec<ReportNote>,
    #[serde(skip)]
    pub photo: Option<Vec<u8>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Report {
    pub fn geometry_type(&self) -> GeometryType {
        self.geometry.geometry_type()
    }

    /// Part of the active set: not rejected and not absorbed by a merge.
    pub fn is_active(&self) -> bool {
        self.status != ReportStatus::Rejected && self.merged_into.is_none()
    }

    /// `(lat, lon)` for Point reports, `None` for lines.
    pub fn point(&self) -> Option<(f64, f64)> {
        match self.geometry {
            Geometry::Point([lon, lat]) => Some((lat, lon)),
            Geometry::LineString(_) => None,
        }
    }

    pub fn has_photo(&self) -> bool {
        self.photo.is_some()
    }
}

/// Keep at most `max` characters, never splitting a code point.
pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((end, _)) => text[..end].to_string(),
        None => text.to_string(),
    }
}

/// Trim, drop if blank, then truncate.
pub fn clamp_text(text: Option<&str>, max: usize) -> Option<String> {
    text.map(str::trim)
        .filter(|t| !t.is_empty())
        .map(|t| truncate_chars(t, max))
}
