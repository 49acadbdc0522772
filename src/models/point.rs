// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Geodetic points and polygon rings.

use crate::services::coordinates::{normalize_coordinate, LocalFrame};
use geo::{Coord, LineString, Polygon};
use serde::{Deserialize, Serialize};

/// A WGS84 position in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    /// Build a normalized point (lng wrapped, lat clamped, rounded to 8 dp).
    pub fn new(lat: f64, lng: f64) -> Self {
        normalize_coordinate(lat, lng)
    }

    pub fn normalized(self) -> Self {
        Self::new(self.lat, self.lng)
    }

    pub fn to_point(self) -> geo::Point<f64> {
        geo::Point::new(self.lng, self.lat)
    }
}

impl From<Coord<f64>> for GeoPoint {
    /// `geo` coordinates are (x = lng, y = lat).
    fn from(c: Coord<f64>) -> Self {
        GeoPoint::new(c.y, c.x)
    }
}

/// Geodetic bounding box of a ring.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoBounds {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

/// Closed polygon boundary stored without a repeated closing vertex.
///
/// Construction normalizes every point and collapses coincident consecutive
/// vertices (including the last→first pair). Simplicity is not checked here;
/// see [`crate::services::geometry::validate_ring`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "Vec<GeoPoint>", into = "Vec<GeoPoint>")]
pub struct Ring {
    points: Vec<GeoPoint>,
}

impl Ring {
    pub fn new(points: impl IntoIterator<Item = GeoPoint>) -> Self {
        let mut out: Vec<GeoPoint> = Vec::new();
        for p in points.into_iter().map(GeoPoint::normalized) {
            if out.last() != Some(&p) {
                out.push(p);
            }
        }
        while out.len() > 1 && out.first() == out.last() {
            out.pop();
        }
        Self { points: out }
    }

    /// Ring from `(lat, lng)` pairs.
    pub fn from_lat_lng(pairs: &[(f64, f64)]) -> Self {
        Self::new(pairs.iter().map(|&(lat, lng)| GeoPoint::new(lat, lng)))
    }

    pub fn points(&self) -> &[GeoPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Consecutive vertex pairs, wrapping from the last vertex to the first.
    pub fn edges(&self) -> impl Iterator<Item = (GeoPoint, GeoPoint)> + '_ {
        let n = self.points.len();
        (0..n).map(move |i| (self.points[i], self.points[(i + 1) % n]))
    }

    pub fn bounds(&self) -> Option<GeoBounds> {
        let first = self.points.first()?;
        let mut b = GeoBounds {
            south: first.lat,
            west: first.lng,
            north: first.lat,
            east: first.lng,
        };
        for p in &self.points[1..] {
            b.south = b.south.min(p.lat);
            b.north = b.north.max(p.lat);
            b.west = b.west.min(p.lng);
            b.east = b.east.max(p.lng);
        }
        Some(b)
    }

    /// Polygon in metres within `frame`.
    pub fn to_local_polygon(&self, frame: &LocalFrame) -> Polygon<f64> {
        let mut coords: Vec<Coord<f64>> = self.points.iter().map(|p| frame.to_coord(*p)).collect();
        if let Some(first) = coords.first().copied() {
            coords.push(first);
        }
        Polygon::new(LineString::new(coords), vec![])
    }

    /// Ring from a planar line string in `frame` (closing vertex optional).
    pub fn from_local(line: &LineString<f64>, frame: &LocalFrame) -> Self {
        Self::new(line.coords().map(|c| frame.to_geo(c.x, c.y)))
    }

    /// Translate every vertex by metres east/north, in the ring's own frame.
    pub fn translated(&self, east: f64, north: f64) -> Self {
        match LocalFrame::anchored_at(&self.points) {
            Some(frame) => Self::new(self.points.iter().map(|p| {
                let (x, y) = frame.to_local(*p);
                frame.to_geo(x + east, y + north)
            })),
            None => self.clone(),
        }
    }
}

impl From<Vec<GeoPoint>> for Ring {
    fn from(points: Vec<GeoPoint>) -> Self {
        Ring::new(points)
    }
}

impl From<Ring> for Vec<GeoPoint> {
    fn from(ring: Ring) -> Self {
        ring.points
    }
}
