// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Ring measurement, validation, offset and boolean operations.
//!
//! Measurements (area, perimeter) are spherical. Offsets and boolean
//! operations run on a [`LocalFrame`] anchored at the first operand's first
//! vertex and are converted back to rounded geodetic rings.
//!
//! When an operation yields several disjoint polygons the largest one is kept
//! and the rest are logged. A kept polygon with a hole fails `union` and
//! `difference`, because a [`Ring`] cannot carry interiors.

use crate::models::{Ring, Shape, ShapeKind};
use crate::services::coordinates::{
    normalize_lng, round_to_precision, LocalFrame, Precision, EARTH_RADIUS_M,
};
use geo::{Area, BooleanOps, Contains, Coord, Distance, Haversine, Intersects, Line, MultiPolygon, Polygon};
use serde::Serialize;
use std::f64::consts::PI;

/// Vertices snap onto the outer boundary within this distance (m).
pub const CONTAINMENT_EPSILON_M: f64 = 0.05;

/// Absolute area of `inner − outer` tolerated by [`contains`] (m²).
pub const CONTAINMENT_AREA_EPSILON_M2: f64 = 0.01;

/// Result polygons (and holes) smaller than this are numerical noise (m²).
const MIN_COMPONENT_AREA_M2: f64 = 0.01;

/// Segments used to approximate a full circle at buffer corners.
const ARC_SEGMENTS: usize = 32;

/// Distances below this are treated as zero by [`buffer`] (m).
const ZERO_DISTANCE_M: f64 = 1e-3;

/// Geometry failures. Non-retryable; the caller's collection is untouched.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GeometryError {
    #[error("{operation} failed for shape '{shape_id}': ring has {vertices} distinct vertices, at least 3 are required")]
    TooFewVertices {
        operation: &'static str,
        shape_id: String,
        vertices: usize,
    },

    #[error("{operation} failed for shape '{shape_id}': ring encloses no area")]
    ZeroArea {
        operation: &'static str,
        shape_id: String,
    },

    #[error("{operation} failed for shape '{shape_id}': edges {first} and {second} intersect")]
    SelfIntersecting {
        operation: &'static str,
        shape_id: String,
        first: usize,
        second: usize,
    },

    #[error("buffer failed for shape '{shape_id}': inward distance of {distance} m exceeds half the shape's width")]
    BufferCollapsed { shape_id: String, distance: f64 },

    #[error("buffer failed for shape '{shape_id}': distance {distance} is not a finite number")]
    InvalidDistance { shape_id: String, distance: f64 },

    #[error("{operation} failed for shape '{shape_id}': result contains a hole, which a single ring cannot represent")]
    HoleInResult {
        operation: &'static str,
        shape_id: String,
    },
}

/// Spherical area (m²) using the spherical-excess line integral.
///
/// Returns 0 for fewer than 3 vertices; orientation does not matter.
pub fn area(ring: &Ring) -> f64 {
    if ring.len() < 3 {
        return 0.0;
    }
    let total: f64 = ring
        .edges()
        .map(|(a, b)| {
            let d_lambda = normalize_lng(b.lng - a.lng).to_radians();
            d_lambda * (2.0 + a.lat.to_radians().sin() + b.lat.to_radians().sin())
        })
        .sum();
    round_to_precision(
        (total * EARTH_RADIUS_M * EARTH_RADIUS_M / 2.0).abs(),
        Precision::Measurement,
    )
}

/// Great-circle length of the closed ring (m).
pub fn perimeter(ring: &Ring) -> f64 {
    if ring.len() < 2 {
        return 0.0;
    }
    let total: f64 = ring
        .edges()
        .map(|(a, b)| Haversine.distance(a.to_point(), b.to_point()))
        .sum();
    round_to_precision(total, Precision::Measurement)
}

/// Area and perimeter together.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Measurement {
    pub area_m2: f64,
    pub perimeter_m: f64,
}

pub fn measure(ring: &Ring) -> Measurement {
    Measurement {
        area_m2: area(ring),
        perimeter_m: perimeter(ring),
    }
}

/// Check that `ring` bounds a simple polygon.
pub fn validate_ring(ring: &Ring, operation: &'static str, shape_id: &str) -> Result<(), GeometryError> {
    if ring.len() < 3 {
        return Err(GeometryError::TooFewVertices {
            operation,
            shape_id: shape_id.to_string(),
            vertices: ring.len(),
        });
    }

    let Some(frame) = LocalFrame::anchored_at(ring.points()) else {
        return Err(GeometryError::TooFewVertices {
            operation,
            shape_id: shape_id.to_string(),
            vertices: 0,
        });
    };
    let coords: Vec<Coord<f64>> = ring.points().iter().map(|p| frame.to_coord(*p)).collect();

    if let Some((first, second)) = find_self_intersection(&coords) {
        return Err(GeometryError::SelfIntersecting {
            operation,
            shape_id: shape_id.to_string(),
            first,
            second,
        });
    }

    if area(ring) < MIN_COMPONENT_AREA_M2 {
        return Err(GeometryError::ZeroArea {
            operation,
            shape_id: shape_id.to_string(),
        });
    }
    Ok(())
}

/// First pair of crossing edges (by index), or a spike where an edge folds
/// straight back over its predecessor.
fn find_self_intersection(coords: &[Coord<f64>]) -> Option<(usize, usize)> {
    let n = coords.len();
    let edge = |i: usize| Line::new(coords[i], coords[(i + 1) % n]);

    for i in 0..n {
        let a = coords[i];
        let b = coords[(i + 1) % n];
        let c = coords[(i + 2) % n];
        let (ux, uy) = (b.x - a.x, b.y - a.y);
        let (vx, vy) = (c.x - b.x, c.y - b.y);
        let cross = ux * vy - uy * vx;
        let dot = ux * vx + uy * vy;
        let scale = (ux.hypot(uy) * vx.hypot(vy)).max(f64::MIN_POSITIVE);
        if (cross / scale).abs() < 1e-9 && dot < 0.0 {
            return Some((i, (i + 1) % n));
        }
    }

    for i in 0..n {
        for j in (i + 2)..n {
            // The last edge is adjacent to the first.
            if i == 0 && j == n - 1 {
                continue;
            }
            if edge(i).intersects(&edge(j)) {
                return Some((i, j));
            }
        }
    }
    None
}

/// Offset `shape` outward (positive) or inward (negative) with rounded
/// corners. The result is a new buffer shape referencing `shape`.
pub fn buffer(shape: &Shape, signed_distance: f64) -> Result<Shape, GeometryError> {
    let ring = buffer_ring(&shape.ring, signed_distance, &shape.id)?;
    Ok(Shape::with_generated_id(
        ring,
        ShapeKind::Buffer {
            original_shape_id: shape.id.clone(),
            signed_distance,
        },
    ))
}

/// Ring-level offset used by [`buffer`] and by cascading recomputes.
pub fn buffer_ring(ring: &Ring, signed_distance: f64, shape_id: &str) -> Result<Ring, GeometryError> {
    if !signed_distance.is_finite() {
        return Err(GeometryError::InvalidDistance {
            shape_id: shape_id.to_string(),
            distance: signed_distance,
        });
    }
    validate_ring(ring, "buffer", shape_id)?;
    if signed_distance.abs() < ZERO_DISTANCE_M {
        return Ok(ring.clone());
    }

    let frame = frame_for(ring);
    let base = MultiPolygon::new(vec![ring.to_local_polygon(&frame)]);
    let band = offset_band(&base, signed_distance.abs());

    let result = if signed_distance > 0.0 {
        base.union(&band)
    } else {
        base.difference(&band)
    };

    let collapsed = || GeometryError::BufferCollapsed {
        shape_id: shape_id.to_string(),
        distance: signed_distance,
    };
    let kept = largest_component(result, "buffer", shape_id).ok_or_else(collapsed)?;
    let holes = significant_holes(&kept);
    if holes > 0 {
        tracing::warn!(shape_id, holes, distance = signed_distance, "Filled enclosed holes in buffer result");
    }

    let out = Ring::from_local(kept.exterior(), &frame);
    if out.len() < 3 {
        return Err(collapsed());
    }
    Ok(out)
}

/// Union of edge rectangles and vertex discs of half-width `distance`.
fn offset_band(base: &MultiPolygon<f64>, distance: f64) -> MultiPolygon<f64> {
    let mut pieces: Vec<MultiPolygon<f64>> = Vec::new();
    for poly in &base.0 {
        for line in poly.exterior().lines() {
            if let Some(rect) = edge_rectangle(line.start, line.end, distance) {
                pieces.push(MultiPolygon::new(vec![rect]));
            }
            pieces.push(MultiPolygon::new(vec![disc(line.start, distance)]));
        }
    }
    union_all(pieces)
}

fn edge_rectangle(a: Coord<f64>, b: Coord<f64>, distance: f64) -> Option<Polygon<f64>> {
    let (dx, dy) = (b.x - a.x, b.y - a.y);
    let len = dx.hypot(dy);
    if len < 1e-9 {
        return None;
    }
    let (nx, ny) = (-dy / len * distance, dx / len * distance);
    Some(Polygon::new(
        vec![
            (a.x + nx, a.y + ny),
            (b.x + nx, b.y + ny),
            (b.x - nx, b.y - ny),
            (a.x - nx, a.y - ny),
            (a.x + nx, a.y + ny),
        ]
        .into(),
        vec![],
    ))
}

/// Regular polygon circumscribing the circle of `radius` around `center`.
fn disc(center: Coord<f64>, radius: f64) -> Polygon<f64> {
    let r = radius / (PI / ARC_SEGMENTS as f64).cos();
    let mut coords: Vec<(f64, f64)> = (0..ARC_SEGMENTS)
        .map(|k| {
            let t = 2.0 * PI * k as f64 / ARC_SEGMENTS as f64;
            (center.x + r * t.cos(), center.y + r * t.sin())
        })
        .collect();
    coords.push(coords[0]);
    Polygon::new(coords.into(), vec![])
}

/// Pairwise union, halving the piece count each round.
fn union_all(mut pieces: Vec<MultiPolygon<f64>>) -> MultiPolygon<f64> {
    while pieces.len() > 1 {
        let mut next = Vec::with_capacity(pieces.len() / 2 + 1);
        let mut iter = pieces.into_iter();
        while let Some(a) = iter.next() {
            match iter.next() {
                Some(b) => next.push(a.union(&b)),
                None => next.push(a),
            }
        }
        pieces = next;
    }
    pieces.pop().unwrap_or_else(|| MultiPolygon::new(vec![]))
}

/// Boolean union. `None` when the shapes neither touch nor overlap.
pub fn union(a: &Shape, b: &Shape) -> Result<Option<Shape>, GeometryError> {
    validate_ring(&a.ring, "union", &a.id)?;
    validate_ring(&b.ring, "union", &b.id)?;

    let frame = frame_for(&a.ring);
    let pa = a.ring.to_local_polygon(&frame);
    let pb = b.ring.to_local_polygon(&frame);
    if !pa.intersects(&pb) {
        return Ok(None);
    }

    let merged = MultiPolygon::new(vec![pa]).union(&MultiPolygon::new(vec![pb]));
    let Some(kept) = largest_component(merged, "union", &a.id) else {
        return Ok(None);
    };
    if significant_holes(&kept) > 0 {
        return Err(GeometryError::HoleInResult {
            operation: "union",
            shape_id: a.id.clone(),
        });
    }

    Ok(Some(Shape::with_generated_id(
        Ring::from_local(kept.exterior(), &frame),
        ShapeKind::UnionResult {
            sources: vec![a.id.clone(), b.id.clone()],
        },
    )))
}

/// Boolean subtraction. `None` when nothing of `minuend` remains.
///
/// Callers pass the larger shape as `minuend`.
pub fn difference(minuend: &Shape, subtrahend: &Shape) -> Result<Option<Shape>, GeometryError> {
    validate_ring(&minuend.ring, "difference", &minuend.id)?;
    validate_ring(&subtrahend.ring, "difference", &subtrahend.id)?;

    let frame = frame_for(&minuend.ring);
    let pa = minuend.ring.to_local_polygon(&frame);
    let pb = subtrahend.ring.to_local_polygon(&frame);

    let kind = ShapeKind::DifferenceResult {
        minuend: minuend.id.clone(),
        subtrahend: subtrahend.id.clone(),
    };
    if !pa.intersects(&pb) {
        return Ok(Some(Shape::with_generated_id(minuend.ring.clone(), kind)));
    }

    let rest = MultiPolygon::new(vec![pa]).difference(&MultiPolygon::new(vec![pb]));
    let Some(kept) = largest_component(rest, "difference", &minuend.id) else {
        return Ok(None);
    };
    if significant_holes(&kept) > 0 {
        return Err(GeometryError::HoleInResult {
            operation: "difference",
            shape_id: minuend.id.clone(),
        });
    }

    Ok(Some(Shape::with_generated_id(
        Ring::from_local(kept.exterior(), &frame),
        kind,
    )))
}

/// Overlap of two shapes as a ring. `None` when they share no area.
pub fn intersection(a: &Shape, b: &Shape) -> Result<Option<Ring>, GeometryError> {
    validate_ring(&a.ring, "intersection", &a.id)?;
    validate_ring(&b.ring, "intersection", &b.id)?;

    let frame = frame_for(&a.ring);
    let pa = a.ring.to_local_polygon(&frame);
    let pb = b.ring.to_local_polygon(&frame);
    if !pa.intersects(&pb) {
        return Ok(None);
    }

    let overlap = MultiPolygon::new(vec![pa]).intersection(&MultiPolygon::new(vec![pb]));
    Ok(largest_component(overlap, "intersection", &a.id)
        .map(|kept| Ring::from_local(kept.exterior(), &frame)))
}

/// Total overlapping area of two rings (m²), all components included.
pub fn intersection_area(a: &Ring, b: &Ring) -> f64 {
    if a.len() < 3 || b.len() < 3 {
        return 0.0;
    }
    let frame = frame_for(a);
    let pa = a.to_local_polygon(&frame);
    let pb = b.to_local_polygon(&frame);
    if !pa.intersects(&pb) {
        return 0.0;
    }
    let overlap = MultiPolygon::new(vec![pa]).intersection(&MultiPolygon::new(vec![pb]));
    round_to_precision(overlap.unsigned_area(), Precision::Measurement)
}

/// Whether `inner` lies within or on `outer`, with a small tolerance.
pub fn contains(outer: &Ring, inner: &Ring) -> bool {
    if outer.len() < 3 || inner.len() < 3 {
        return false;
    }
    let frame = frame_for(outer);
    let po = outer.to_local_polygon(&frame);
    let pi = inner.to_local_polygon(&frame);

    let outer_coords: Vec<Coord<f64>> = outer.points().iter().map(|p| frame.to_coord(*p)).collect();
    for p in inner.points() {
        let c = frame.to_coord(*p);
        if !po.contains(&geo::Point::from(c))
            && distance_to_boundary(c, &outer_coords) > CONTAINMENT_EPSILON_M
        {
            return false;
        }
    }

    let excess = MultiPolygon::new(vec![pi])
        .difference(&MultiPolygon::new(vec![po]))
        .unsigned_area();
    excess <= CONTAINMENT_AREA_EPSILON_M2.max(area(inner) * 1e-6)
}

/// Minimum distance between the boundaries of two rings (m); 0 when they
/// touch or cross.
pub fn boundary_distance(a: &Ring, b: &Ring) -> f64 {
    let Some(frame) = LocalFrame::anchored_at(a.points()) else {
        return f64::INFINITY;
    };
    let ca: Vec<Coord<f64>> = a.points().iter().map(|p| frame.to_coord(*p)).collect();
    let cb: Vec<Coord<f64>> = b.points().iter().map(|p| frame.to_coord(*p)).collect();
    if cb.is_empty() {
        return f64::INFINITY;
    }

    let mut best = f64::INFINITY;
    for i in 0..ca.len() {
        let (a1, a2) = (ca[i], ca[(i + 1) % ca.len()]);
        for j in 0..cb.len() {
            let (b1, b2) = (cb[j], cb[(j + 1) % cb.len()]);
            if Line::new(a1, a2).intersects(&Line::new(b1, b2)) {
                return 0.0;
            }
            best = best
                .min(point_segment_distance(a1, b1, b2))
                .min(point_segment_distance(a2, b1, b2))
                .min(point_segment_distance(b1, a1, a2))
                .min(point_segment_distance(b2, a1, a2));
        }
    }
    round_to_precision(best, Precision::Measurement)
}

fn distance_to_boundary(point: Coord<f64>, ring: &[Coord<f64>]) -> f64 {
    (0..ring.len())
        .map(|i| point_segment_distance(point, ring[i], ring[(i + 1) % ring.len()]))
        .fold(f64::INFINITY, f64::min)
}

fn point_segment_distance(p: Coord<f64>, a: Coord<f64>, b: Coord<f64>) -> f64 {
    let (dx, dy) = (b.x - a.x, b.y - a.y);
    let len2 = dx * dx + dy * dy;
    let t = if len2 == 0.0 {
        0.0
    } else {
        (((p.x - a.x) * dx + (p.y - a.y) * dy) / len2).clamp(0.0, 1.0)
    };
    (p.x - (a.x + t * dx)).hypot(p.y - (a.y + t * dy))
}

fn frame_for(ring: &Ring) -> LocalFrame {
    LocalFrame::anchored_at(ring.points())
        .unwrap_or_else(|| LocalFrame::new(crate::models::GeoPoint::new(0.0, 0.0)))
}

/// Keep the largest polygon of `result`, logging anything discarded.
fn largest_component(
    result: MultiPolygon<f64>,
    operation: &'static str,
    shape_id: &str,
) -> Option<Polygon<f64>> {
    let mut parts: Vec<(f64, Polygon<f64>)> = result
        .0
        .into_iter()
        .map(|p| (p.unsigned_area(), p))
        .filter(|(a, _)| *a >= MIN_COMPONENT_AREA_M2)
        .collect();
    parts.sort_by(|a, b| b.0.total_cmp(&a.0));

    let mut parts = parts.into_iter();
    let (kept_area, kept) = parts.next()?;
    let discarded: Vec<f64> = parts.map(|(a, _)| a).collect();
    if !discarded.is_empty() {
        tracing::warn!(
            operation,
            shape_id,
            discarded = discarded.len(),
            discarded_area_m2 = round_to_precision(discarded.iter().sum(), Precision::Measurement),
            kept_area_m2 = round_to_precision(kept_area, Precision::Measurement),
            "Kept largest component of multi-polygon result"
        );
    }
    Some(kept)
}

fn significant_holes(poly: &Polygon<f64>) -> usize {
    poly.interiors()
        .iter()
        .filter(|hole| Polygon::new((*hole).clone(), vec![]).unsigned_area() >= MIN_COMPONENT_AREA_M2)
        .count()
}
