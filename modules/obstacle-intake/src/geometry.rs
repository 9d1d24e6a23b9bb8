//! Geometry resolution for incoming submissions.
//!
//! Explicit `latitude`/`longitude` fields always win. Otherwise the opaque
//! geometry value is decoded in two passes: a strict GeoJSON decode into
//! typed shapes, then a lenient walk of `coordinates` that accepts flat pairs,
//! arrays of pairs and polygon rings regardless of the declared `type`.
//!
//! Nothing in here fails. A submission without usable coordinates resolves to
//! (0, 0) with `resolved = false`, and intake stores it anyway.

use serde::Deserialize;
use serde_json::Value;

use obstacle_common::geo::{valid_lat, valid_lon};
use obstacle_common::{Geometry, Position};

use crate::submission::NumberOrText;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Decoded form of a submitted geometry value.
#[derive(Debug, Clone, PartialEq)]
pub enum GeometryPayload {
    Point(Position),
    LineString(Vec<Position>),
    /// Rings of positions; only the first vertex of the first ring is used.
    Polygon(Vec<Vec<Position>>),
    Unknown,
}

/// Outcome of geometry resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedGeometry {
    pub lat: f64,
    pub lon: f64,
    /// False when neither source produced a usable pair.
    pub resolved: bool,
    /// Shape to store on the canonical report.
    pub geometry: Geometry,
}

impl ResolvedGeometry {
    fn unresolved() -> Self {
        Self {
            lat: 0.0,
            lon: 0.0,
            resolved: false,
            geometry: Geometry::point(0.0, 0.0),
        }
    }

    fn point(lat: f64, lon: f64) -> Self {
        Self {
            lat,
            lon,
            resolved: true,
            geometry: Geometry::point(lat, lon),
        }
    }
}

#[derive(Deserialize)]
#[serde(tag = "type")]
enum StrictGeometry {
    Point { coordinates: Position },
    LineString { coordinates: Vec<Position> },
    Polygon { coordinates: Vec<Vec<Position>> },
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

/// Resolve a canonical position from explicit fields and/or a geometry value.
pub fn resolve_geometry(
    latitude: Option<&NumberOrText>,
    longitude: Option<&NumberOrText>,
    geometry: Option<&Value>,
) -> ResolvedGeometry {
    let explicit_lat = latitude.and_then(NumberOrText::as_f64);
    let explicit_lon = longitude.and_then(NumberOrText::as_f64);
    if let (Some(lat), Some(lon)) = (explicit_lat, explicit_lon) {
        return ResolvedGeometry::point(lat, lon);
    }

    let Some(value) = geometry else {
        return ResolvedGeometry::unresolved();
    };

    match decode_geometry(value) {
        GeometryPayload::LineString(positions) if positions.iter().all(|p| usable(*p)) => {
            match Geometry::line_string(positions.clone()) {
                Some(line) => {
                    let [lon, lat] = positions[0];
                    ResolvedGeometry {
                        lat,
                        lon,
                        resolved: true,
                        geometry: line,
                    }
                }
                None => first_point(&GeometryPayload::LineString(positions)),
            }
        }
        payload => first_point(&payload),
    }
}

fn first_point(payload: &GeometryPayload) -> ResolvedGeometry {
    match first_position(payload).filter(|p| usable(*p)) {
        Some([lon, lat]) => ResolvedGeometry::point(lat, lon),
        None => ResolvedGeometry::unresolved(),
    }
}

fn first_position(payload: &GeometryPayload) -> Option<Position> {
    match payload {
        GeometryPayload::Point(p) => Some(*p),
        GeometryPayload::LineString(positions) => positions.first().copied(),
        GeometryPayload::Polygon(rings) => rings.first()?.first().copied(),
        GeometryPayload::Unknown => None,
    }
}

fn usable([lon, lat]: Position) -> bool {
    valid_lat(lat) && valid_lon(lon)
}

// ---------------------------------------------------------------------------
// Two-pass decode
// ---------------------------------------------------------------------------

/// Decode an opaque geometry value: unwrap envelopes, try strict GeoJSON,
/// then fall back to a lenient read of `coordinates`.
pub fn decode_geometry(value: &Value) -> GeometryPayload {
    let value = match value {
        // Form posts sometimes carry the geometry as a JSON string.
        Value::String(s) => match serde_json::from_str::<Value>(s) {
            Ok(parsed) => parsed,
            Err(_) => return GeometryPayload::Unknown,
        },
        other => other.clone(),
    };
    let inner = unwrap_envelope(&value);

    if let Ok(strict) = serde_json::from_value::<StrictGeometry>(inner.clone()) {
        let payload = match strict {
            StrictGeometry::Point { coordinates } => GeometryPayload::Point(coordinates),
            StrictGeometry::LineString { coordinates } => GeometryPayload::LineString(coordinates),
            StrictGeometry::Polygon { coordinates } => GeometryPayload::Polygon(coordinates),
        };
        if first_position(&payload).is_some() {
            return payload;
        }
    }

    inner
        .get("coordinates")
        .and_then(lenient_first_pair)
        .map(GeometryPayload::Point)
        .unwrap_or(GeometryPayload::Unknown)
}

/// Peel `{"geometry": {...}}` wrappers (GeoJSON Features included).
fn unwrap_envelope(value: &Value) -> &Value {
    let mut current = value;
    while let Some(inner) = current.get("geometry").filter(|g| g.is_object()) {
        current = inner;
    }
    current
}

/// Flat pair, first pair of a list, or first pair of the first ring.
fn lenient_first_pair(coordinates: &Value) -> Option<Position> {
    let outer = coordinates.as_array()?;
    if let Some(pair) = as_pair(outer) {
        return Some(pair);
    }
    let first = outer.first()?.as_array()?;
    if let Some(pair) = as_pair(first) {
        return Some(pair);
    }
    let ring_first = first.first()?.as_array()?;
    as_pair(ring_first)
}

fn as_pair(items: &[Value]) -> Option<Position> {
    if items.len() < 2 {
        return None;
    }
    Some([number_like(&items[0])?, number_like(&items[1])?])
}

fn number_like(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}
