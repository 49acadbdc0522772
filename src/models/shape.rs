// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Project shapes and their per-kind metadata.

use crate::models::Ring;
use crate::services::geometry;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

static SHAPE_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Generate an opaque shape id, unique within and across sessions.
pub fn generate_shape_id(prefix: &str) -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    let seq = SHAPE_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("{}-{:x}-{:x}", prefix, millis, seq)
}

/// Land-use category of a zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZoneKind {
    Residential,
    Commercial,
    GreenSpace,
    Amenity,
    Solar,
}

impl ZoneKind {
    pub const ALL: [ZoneKind; 5] = [
        ZoneKind::Residential,
        ZoneKind::Commercial,
        ZoneKind::GreenSpace,
        ZoneKind::Amenity,
        ZoneKind::Solar,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ZoneKind::Residential => "residential",
            ZoneKind::Commercial => "commercial",
            ZoneKind::GreenSpace => "green_space",
            ZoneKind::Amenity => "amenity",
            ZoneKind::Solar => "solar",
        }
    }
}

impl fmt::Display for ZoneKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Unknown zone kind: {0}")]
pub struct UnknownZoneKind(pub String);

impl FromStr for ZoneKind {
    type Err = UnknownZoneKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        ZoneKind::ALL
            .into_iter()
            .find(|k| k.as_str() == wanted)
            .ok_or_else(|| UnknownZoneKind(s.to_string()))
    }
}

/// What a shape is, with the metadata that only makes sense for that kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ShapeKind {
    Boundary,
    Zone {
        name: String,
        zone_kind: ZoneKind,
    },
    Buffer {
        original_shape_id: String,
        signed_distance: f64,
    },
    Asset {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        label: Option<String>,
    },
    UnionResult {
        sources: Vec<String>,
    },
    DifferenceResult {
        minuend: String,
        subtrahend: String,
    },
}

impl ShapeKind {
    /// Short tag used for id prefixes and logging.
    pub fn tag(&self) -> &'static str {
        match self {
            ShapeKind::Boundary => "boundary",
            ShapeKind::Zone { .. } => "zone",
            ShapeKind::Buffer { .. } => "buffer",
            ShapeKind::Asset { .. } => "asset",
            ShapeKind::UnionResult { .. } => "union",
            ShapeKind::DifferenceResult { .. } => "difference",
        }
    }
}

/// A measured ring with its kind. `area` is kept in sync with `ring`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shape {
    pub id: String,
    pub ring: Ring,
    /// Cached area in m².
    #[serde(default)]
    pub area: f64,
    pub kind: ShapeKind,
}

impl Shape {
    pub fn new(id: impl Into<String>, ring: Ring, kind: ShapeKind) -> Self {
        let area = geometry::area(&ring);
        Self {
            id: id.into(),
            ring,
            area,
            kind,
        }
    }

    /// New shape with a freshly generated id.
    pub fn with_generated_id(ring: Ring, kind: ShapeKind) -> Self {
        let id = generate_shape_id(kind.tag());
        Self::new(id, ring, kind)
    }

    pub fn boundary(id: impl Into<String>, ring: Ring) -> Self {
        Self::new(id, ring, ShapeKind::Boundary)
    }

    pub fn zone(id: impl Into<String>, ring: Ring, name: impl Into<String>, kind: ZoneKind) -> Self {
        Self::new(
            id,
            ring,
            ShapeKind::Zone {
                name: name.into(),
                zone_kind: kind,
            },
        )
    }

    /// Same identity and metadata, new ring and recomputed area.
    pub fn with_ring(&self, ring: Ring) -> Self {
        Self::new(self.id.clone(), ring, self.kind.clone())
    }

    pub fn is_boundary(&self) -> bool {
        matches!(self.kind, ShapeKind::Boundary)
    }

    pub fn is_zone(&self) -> bool {
        matches!(self.kind, ShapeKind::Zone { .. })
    }

    /// Parent id and distance when this shape is a buffer that must follow
    /// its parent.
    pub fn buffer_parent(&self) -> Option<(&str, f64)> {
        match &self.kind {
            ShapeKind::Buffer {
                original_shape_id,
                signed_distance,
            } => Some((original_shape_id.as_str(), *signed_distance)),
            ShapeKind::Boundary
            | ShapeKind::Zone { .. }
            | ShapeKind::Asset { .. }
            | ShapeKind::UnionResult { .. }
            | ShapeKind::DifferenceResult { .. } => None,
        }
    }

    /// Whether vertex edits and moves are allowed. Buffers are derived and
    /// only change through their parent.
    pub fn is_editable(&self) -> bool {
        match self.kind {
            ShapeKind::Buffer { .. } => false,
            ShapeKind::Boundary
            | ShapeKind::Zone { .. }
            | ShapeKind::Asset { .. }
            | ShapeKind::UnionResult { .. }
            | ShapeKind::DifferenceResult { .. } => true,
        }
    }

    /// Fill color hint for renderers.
    pub fn display_color(&self) -> &'static str {
        match &self.kind {
            ShapeKind::Boundary => "#1d4ed8",
            ShapeKind::Zone { zone_kind, .. } => match zone_kind {
                ZoneKind::Residential => "#f59e0b",
                ZoneKind::Commercial => "#8b5cf6",
                ZoneKind::GreenSpace => "#16a34a",
                ZoneKind::Amenity => "#ec4899",
                ZoneKind::Solar => "#eab308",
            },
            ShapeKind::Buffer { signed_distance, .. } if *signed_distance < 0.0 => "#f97316",
            ShapeKind::Buffer { .. } => "#64748b",
            ShapeKind::Asset { .. } => "#0ea5e9",
            ShapeKind::UnionResult { .. } => "#14b8a6",
            ShapeKind::DifferenceResult { .. } => "#ef4444",
        }
    }
}
