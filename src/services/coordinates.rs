// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Coordinate normalization, precision rounding and planar projections.
//!
//! Two planar spaces are used by the engine:
//! - the Web-Mercator "world" space consumed by renderers, bounded by
//!   [`WORLD_SIZE`] on both axes;
//! - a [`LocalFrame`], metres east/north of an origin point, used for all
//!   metric planar work (offsets, grid layout, separation distances).

use crate::models::GeoPoint;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Side length of the square Web-Mercator world space.
pub const WORLD_SIZE: f64 = 512.0;

/// Mean Earth radius (metres), shared by haversine distance and spherical area.
pub const EARTH_RADIUS_M: f64 = 6_371_008.8;

/// Latitude beyond which Web-Mercator diverges.
pub const MAX_MERCATOR_LAT: f64 = 85.051_128_78;

/// Rounding classes applied to every engine output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precision {
    /// Decimal degrees, 8 dp (~1.1 mm).
    Coordinate,
    /// Metres of elevation, 2 dp (~1 cm).
    Elevation,
    /// Lengths, areas, slopes and bearings, 3 dp (~1 mm).
    Measurement,
}

impl Precision {
    pub fn decimals(self) -> i32 {
        match self {
            Precision::Coordinate => 8,
            Precision::Elevation => 2,
            Precision::Measurement => 3,
        }
    }
}

/// Round `value` to the fixed number of decimals for `kind`.
///
/// Non-finite values are returned unchanged so missing samples stay missing.
pub fn round_to_precision(value: f64, kind: Precision) -> f64 {
    if !value.is_finite() {
        return value;
    }
    let factor = 10f64.powi(kind.decimals());
    let rounded = (value * factor).round() / factor;
    // Avoid handing out -0.0, which breaks textual comparison of shapes.
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}

/// Wrap a longitude into [-180, 180).
pub fn normalize_lng(lng: f64) -> f64 {
    if !lng.is_finite() {
        return 0.0;
    }
    let wrapped = (lng + 180.0).rem_euclid(360.0) - 180.0;
    // rem_euclid can return exactly 360.0 for tiny negative inputs.
    if wrapped >= 180.0 {
        wrapped - 360.0
    } else {
        wrapped
    }
}

/// Clamp a latitude into [-90, 90].
pub fn normalize_lat(lat: f64) -> f64 {
    if lat.is_nan() {
        return 0.0;
    }
    lat.clamp(-90.0, 90.0)
}

/// True when the coordinate is already inside the canonical ranges.
pub fn validate_coordinate(lat: f64, lng: f64) -> bool {
    lat.is_finite()
        && lng.is_finite()
        && (-90.0..=90.0).contains(&lat)
        && (-180.0..180.0).contains(&lng)
}

/// Normalize and round a raw coordinate pair. Never fails.
pub fn normalize_coordinate(lat: f64, lng: f64) -> GeoPoint {
    GeoPoint {
        lat: round_to_precision(normalize_lat(lat), Precision::Coordinate),
        lng: normalize_lng(round_to_precision(normalize_lng(lng), Precision::Coordinate)),
    }
}

/// A point in Web-Mercator world space; `z` carries elevation through.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WorldPoint {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// Project a geodetic point into world space.
pub fn lng_lat_to_world(point: GeoPoint, elevation: f64) -> WorldPoint {
    let lng = normalize_lng(point.lng);
    let lat = normalize_lat(point.lat).clamp(-MAX_MERCATOR_LAT, MAX_MERCATOR_LAT);
    let phi = lat.to_radians();

    let x = (lng + 180.0) / 360.0 * WORLD_SIZE;
    let y = (1.0 - (PI / 4.0 + phi / 2.0).tan().ln() / PI) / 2.0 * WORLD_SIZE;

    WorldPoint {
        x: round_to_precision(x, Precision::Coordinate),
        y: round_to_precision(y, Precision::Coordinate),
        z: round_to_precision(elevation, Precision::Elevation),
    }
}

/// Inverse of [`lng_lat_to_world`]. Returns the point and its elevation.
pub fn world_to_lng_lat(world: WorldPoint) -> (GeoPoint, f64) {
    let lng = world.x / WORLD_SIZE * 360.0 - 180.0;
    let lat = (PI * (1.0 - 2.0 * world.y / WORLD_SIZE))
        .sinh()
        .atan()
        .to_degrees();

    (
        normalize_coordinate(lat, lng),
        round_to_precision(world.z, Precision::Elevation),
    )
}

/// Equirectangular tangent-plane frame centred on `origin`.
///
/// Accurate to well under a millimetre per hundred metres at site scale,
/// which is the only scale the engine works at.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalFrame {
    origin: GeoPoint,
    metres_per_deg_lat: f64,
    metres_per_deg_lng: f64,
}

impl LocalFrame {
    pub fn new(origin: GeoPoint) -> Self {
        let metres_per_deg_lat = EARTH_RADIUS_M * PI / 180.0;
        // Keep the scale strictly positive at the poles.
        let metres_per_deg_lng = metres_per_deg_lat * origin.lat.to_radians().cos().max(1e-9);
        Self {
            origin,
            metres_per_deg_lat,
            metres_per_deg_lng,
        }
    }

    /// Frame anchored at the first vertex of `points`.
    pub fn anchored_at(points: &[GeoPoint]) -> Option<Self> {
        points.first().map(|p| Self::new(*p))
    }

    /// Metres (east, north) of `point` relative to the origin.
    pub fn to_local(&self, point: GeoPoint) -> (f64, f64) {
        let d_lng = normalize_lng(point.lng - self.origin.lng);
        let d_lat = point.lat - self.origin.lat;
        (d_lng * self.metres_per_deg_lng, d_lat * self.metres_per_deg_lat)
    }

    /// Geodetic point at (east, north) metres from the origin, normalized.
    pub fn to_geo(&self, east: f64, north: f64) -> GeoPoint {
        let lat = self.origin.lat + north / self.metres_per_deg_lat;
        let lng = self.origin.lng + east / self.metres_per_deg_lng;
        normalize_coordinate(lat, lng)
    }

    pub fn to_coord(&self, point: GeoPoint) -> geo::Coord<f64> {
        let (x, y) = self.to_local(point);
        geo::Coord { x, y }
    }
}
