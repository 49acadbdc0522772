// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Elevation grid produced by terrain analysis.

use crate::models::{GeoPoint, Ring};
use crate::services::coordinates::{round_to_precision, Precision};
use serde::{Deserialize, Serialize};

/// Default steepness threshold (percent grade).
pub const DEFAULT_STEEP_THRESHOLD: f64 = 8.0;

/// A cell counts as steep when its slope is known and above `threshold`.
pub fn is_steep(slope: f64, threshold: f64) -> bool {
    slope.is_finite() && slope > threshold
}

/// One square of the analysis grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElevationGridCell {
    pub ring: Ring,
    pub center: GeoPoint,
    /// Percent grade; NaN when a sample was missing.
    #[serde(with = "nullable_f64")]
    pub slope: f64,
    /// Bearing of steepest descent in degrees; NaN when a sample was missing.
    #[serde(with = "nullable_f64")]
    pub aspect: f64,
}

impl ElevationGridCell {
    pub fn has_data(&self) -> bool {
        self.slope.is_finite()
    }
}

/// Rectangular, row-major grid (row 0 is the northern edge).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElevationGrid {
    pub shape_id: String,
    pub cells: Vec<ElevationGridCell>,
    /// Cell side in metres.
    pub resolution: f64,
    pub rows: usize,
    pub columns: usize,
    /// Planar extent of the analyzed ring.
    pub width_m: f64,
    pub height_m: f64,
    pub min_slope: f64,
    pub max_slope: f64,
}

impl ElevationGrid {
    pub fn cell(&self, row: usize, column: usize) -> Option<&ElevationGridCell> {
        if row >= self.rows || column >= self.columns {
            return None;
        }
        self.cells.get(row * self.columns + column)
    }

    pub fn finite_slopes(&self) -> impl Iterator<Item = f64> + '_ {
        self.cells.iter().map(|c| c.slope).filter(|s| s.is_finite())
    }

    pub fn steep_count(&self, threshold: f64) -> usize {
        self.cells
            .iter()
            .filter(|c| is_steep(c.slope, threshold))
            .count()
    }

    pub fn summary(&self, threshold: f64) -> SlopeSummary {
        let mut finite_cells = 0usize;
        let mut total = 0.0;
        for slope in self.finite_slopes() {
            finite_cells += 1;
            total += slope;
        }
        let steep_cells = self.steep_count(threshold);
        let (steep_fraction, mean_slope) = if finite_cells == 0 {
            (0.0, None)
        } else {
            (
                round_to_precision(steep_cells as f64 / finite_cells as f64, Precision::Measurement),
                Some(round_to_precision(total / finite_cells as f64, Precision::Measurement)),
            )
        };
        SlopeSummary {
            threshold,
            finite_cells,
            missing_cells: self.cells.len() - finite_cells,
            steep_cells,
            steep_fraction,
            mean_slope,
        }
    }
}

/// Aggregate slope statistics for one threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlopeSummary {
    pub threshold: f64,
    pub finite_cells: usize,
    pub missing_cells: usize,
    pub steep_cells: usize,
    pub steep_fraction: f64,
    pub mean_slope: Option<f64>,
}

/// Serialize non-finite floats as `null` and read `null` back as NaN.
mod nullable_f64 {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_finite() {
            serializer.serialize_f64(*value)
        } else {
            serializer.serialize_none()
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NAN))
    }
}
