// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Zone placement rules.
//!
//! Rules run in a fixed order and every failure is reported, so a user can
//! fix several problems in one pass:
//! 1. the outline must be a simple polygon
//! 2. the zone must sit inside the project boundary
//! 3. the zone must meet the minimum area
//! 4. unless nesting is allowed, it must not overlap other zones and must
//!    keep the minimum separation from them

use crate::models::{Ring, Shape, ZoneKind, ZoneValidationResult};
use crate::services::collection::ShapeCollection;
use crate::services::coordinates::LocalFrame;
use crate::services::geometry;
use std::collections::BTreeSet;

/// Tunable placement thresholds.
#[derive(Debug, Clone, PartialEq)]
pub struct ZoneRules {
    pub min_area_m2: f64,
    pub min_separation_m: f64,
    /// Overlap (m²) with another zone below which the zones count as
    /// touching rather than overlapping.
    pub overlap_tolerance_m2: f64,
    /// Allow zones nested inside (or overlapping) other zones.
    pub allow_holes: bool,
}

impl Default for ZoneRules {
    fn default() -> Self {
        Self {
            min_area_m2: 100.0,
            min_separation_m: 0.0,
            overlap_tolerance_m2: 1.0,
            allow_holes: false,
        }
    }
}

/// The zone kinds enabled for this deployment.
#[derive(Debug, Clone, PartialEq)]
pub struct ZoneTaxonomy {
    kinds: Vec<ZoneKind>,
}

impl Default for ZoneTaxonomy {
    fn default() -> Self {
        Self {
            kinds: ZoneKind::ALL.to_vec(),
        }
    }
}

impl ZoneTaxonomy {
    pub fn new(kinds: Vec<ZoneKind>) -> Self {
        let mut kinds = kinds;
        kinds.sort();
        kinds.dedup();
        Self { kinds }
    }

    pub fn kinds(&self) -> &[ZoneKind] {
        &self.kinds
    }

    pub fn contains(&self, kind: ZoneKind) -> bool {
        self.kinds.contains(&kind)
    }
}

/// Decides whether a proposed zone outline may be committed.
#[derive(Debug, Clone, Default)]
pub struct ZoneValidationEngine {
    rules: ZoneRules,
    taxonomy: ZoneTaxonomy,
}

impl ZoneValidationEngine {
    pub fn new(rules: ZoneRules, taxonomy: ZoneTaxonomy) -> Self {
        Self { rules, taxonomy }
    }

    pub fn rules(&self) -> &ZoneRules {
        &self.rules
    }

    pub fn taxonomy(&self) -> &ZoneTaxonomy {
        &self.taxonomy
    }

    /// Validate `candidate` against the boundary and zones of `shapes`.
    /// `ignore_id` excludes the zone being edited from the overlap checks.
    pub fn validate_in(
        &self,
        shapes: &ShapeCollection,
        candidate: &Ring,
        ignore_id: Option<&str>,
    ) -> ZoneValidationResult {
        let others: Vec<&Shape> = shapes
            .zones()
            .filter(|z| Some(z.id.as_str()) != ignore_id)
            .collect();
        self.validate(candidate, shapes.boundary().map(|b| &b.ring), &others)
    }

    /// Validate `candidate` against an explicit boundary and set of zones.
    pub fn validate(
        &self,
        candidate: &Ring,
        boundary: Option<&Ring>,
        existing_zones: &[&Shape],
    ) -> ZoneValidationResult {
        let mut reasons = Vec::new();

        let simple = match geometry::validate_ring(candidate, "zone validation", "candidate") {
            Ok(()) => true,
            Err(e) => {
                reasons.push(format!("Zone outline is not a simple polygon: {}", e));
                false
            }
        };

        match boundary {
            None => reasons.push("No project boundary has been drawn".to_string()),
            Some(boundary) if simple && !geometry::contains(boundary, candidate) => {
                reasons.push("Zone must lie entirely within the project boundary".to_string())
            }
            Some(_) => {}
        }

        let area = geometry::area(candidate);
        if area < self.rules.min_area_m2 {
            reasons.push(format!(
                "Zone area of {:.1} m² is below the minimum area of {:.1} m²",
                area, self.rules.min_area_m2
            ));
        }

        if simple && !self.rules.allow_holes {
            for zone in existing_zones {
                self.check_neighbour(candidate, zone, &mut reasons);
            }
        }

        let suggested_kinds = self.suggest_kinds(candidate);
        let result = ZoneValidationResult::from_reasons(reasons, suggested_kinds);
        tracing::debug!(
            is_valid = result.is_valid,
            reasons = result.reasons.len(),
            area_m2 = area,
            "Validated zone"
        );
        result
    }

    fn check_neighbour(&self, candidate: &Ring, zone: &Shape, reasons: &mut Vec<String>) {
        let label = zone_label(zone);
        let overlap = geometry::intersection_area(candidate, &zone.ring);
        if overlap > self.rules.overlap_tolerance_m2 {
            reasons.push(format!("Zone overlaps {} by {:.1} m²", label, overlap));
            return;
        }
        if self.rules.min_separation_m > 0.0 {
            let gap = geometry::boundary_distance(candidate, &zone.ring);
            if gap < self.rules.min_separation_m {
                reasons.push(format!(
                    "Zone is {:.1} m from {}, closer than the minimum separation of {:.1} m",
                    gap, label, self.rules.min_separation_m
                ));
            }
        }
    }

    /// Kinds that fit the outline's size and proportions.
    pub fn suggest_kinds(&self, ring: &Ring) -> BTreeSet<ZoneKind> {
        let area = geometry::area(ring);
        let ratio = aspect_ratio(ring);
        let mut kinds = BTreeSet::new();

        if ratio >= 4.0 {
            kinds.insert(ZoneKind::Amenity);
            kinds.insert(ZoneKind::GreenSpace);
        } else {
            if area >= 20_000.0 && ratio <= 2.0 {
                kinds.insert(ZoneKind::Solar);
            }
            if area >= 5_000.0 && ratio <= 2.5 {
                kinds.insert(ZoneKind::Residential);
            }
            if (1_000.0..20_000.0).contains(&area) {
                kinds.insert(ZoneKind::Commercial);
            }
            if area < 2_000.0 {
                kinds.insert(ZoneKind::GreenSpace);
                kinds.insert(ZoneKind::Amenity);
            }
        }

        kinds.retain(|k| self.taxonomy.contains(*k));
        kinds
    }
}

fn zone_label(zone: &Shape) -> String {
    match &zone.kind {
        crate::models::ShapeKind::Zone { name, .. } if !name.is_empty() => format!("zone '{}'", name),
        _ => format!("zone {}", zone.id),
    }
}

/// Long side over short side of the planar bounding box.
pub fn aspect_ratio(ring: &Ring) -> f64 {
    let Some(frame) = LocalFrame::anchored_at(ring.points()) else {
        return 1.0;
    };
    let (mut min_x, mut max_x, mut min_y, mut max_y) =
        (f64::INFINITY, f64::NEG_INFINITY, f64::INFINITY, f64::NEG_INFINITY);
    for p in ring.points() {
        let (x, y) = frame.to_local(*p);
        min_x = min_x.min(x);
        max_x = max_x.max(x);
        min_y = min_y.min(y);
        max_y = max_y.max(y);
    }
    let (w, h) = (max_x - min_x, max_y - min_y);
    let short = w.min(h);
    if short <= 0.0 {
        return f64::INFINITY;
    }
    w.max(h) / short
}
