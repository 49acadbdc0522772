// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Grid-based slope and aspect analysis of a single shape.
//!
//! The shape's planar bounding box is tiled with square cells (row 0 on the
//! northern edge). Corner and centre elevations are sampled in batches; a
//! cell with any missing sample keeps its slot but reports NaN.

use crate::models::{ElevationGrid, ElevationGridCell, GeoPoint, Ring, Shape};
use crate::services::coordinates::{round_to_precision, LocalFrame, Precision};
use crate::services::elevation::{sample_with_retry, ElevationSampler, RetryPolicy};
use crate::services::geometry::{self, GeometryError};
use futures_util::{stream, StreamExt};

/// Overhang (as a fraction of a cell) absorbed when counting cells, so
/// coordinate rounding never adds a row or column.
const GRID_SNAP: f64 = 1e-3;

/// Upper bound on cells per grid.
pub const MAX_GRID_CELLS: usize = 250_000;

/// Sampling batches in flight at once.
const MAX_IN_FLIGHT: usize = 4;

/// Errors that prevent a grid from being built at all.
#[derive(Debug, thiserror::Error)]
pub enum GridError {
    #[error("Grid resolution must be a positive number of metres, got {0}")]
    InvalidResolution(f64),

    #[error("Grid of {cells} cells exceeds the limit of {max}")]
    TooManyCells { cells: usize, max: usize },

    #[error(transparent)]
    Geometry(#[from] GeometryError),
}

/// Cell count along an extent.
pub fn cells_along(extent_m: f64, resolution_m: f64) -> usize {
    ((extent_m / resolution_m - GRID_SNAP).ceil()).max(1.0) as usize
}

/// Planar placement of a grid over a ring.
#[derive(Debug, Clone, Copy)]
struct GridLayout {
    frame: LocalFrame,
    west: f64,
    north: f64,
    width: f64,
    height: f64,
    resolution: f64,
    rows: usize,
    columns: usize,
}

impl GridLayout {
    fn plan(ring: &Ring, shape_id: &str, resolution: f64) -> Result<Self, GridError> {
        if !resolution.is_finite() || resolution <= 0.0 {
            return Err(GridError::InvalidResolution(resolution));
        }
        geometry::validate_ring(ring, "elevation grid", shape_id)?;
        let frame = LocalFrame::anchored_at(ring.points()).ok_or_else(|| GeometryError::TooFewVertices {
            operation: "elevation grid",
            shape_id: shape_id.to_string(),
            vertices: 0,
        })?;

        let (mut min_x, mut max_x) = (f64::INFINITY, f64::NEG_INFINITY);
        let (mut min_y, mut max_y) = (f64::INFINITY, f64::NEG_INFINITY);
        for p in ring.points() {
            let (x, y) = frame.to_local(*p);
            min_x = min_x.min(x);
            max_x = max_x.max(x);
            min_y = min_y.min(y);
            max_y = max_y.max(y);
        }

        let width = round_to_precision(max_x - min_x, Precision::Measurement);
        let height = round_to_precision(max_y - min_y, Precision::Measurement);
        let rows = cells_along(height, resolution);
        let columns = cells_along(width, resolution);
        let cells = rows.saturating_mul(columns);
        if cells > MAX_GRID_CELLS {
            return Err(GridError::TooManyCells {
                cells,
                max: MAX_GRID_CELLS,
            });
        }

        Ok(Self {
            frame,
            west: min_x,
            north: max_y,
            width,
            height,
            resolution,
            rows,
            columns,
        })
    }

    fn node_count(&self) -> usize {
        (self.rows + 1) * (self.columns + 1)
    }

    fn node_index(&self, row: usize, column: usize) -> usize {
        row * (self.columns + 1) + column
    }

    fn center_index(&self, row: usize, column: usize) -> usize {
        self.node_count() + row * self.columns + column
    }

    fn node(&self, row: usize, column: usize) -> GeoPoint {
        self.frame.to_geo(
            self.west + column as f64 * self.resolution,
            self.north - row as f64 * self.resolution,
        )
    }

    fn center(&self, row: usize, column: usize) -> GeoPoint {
        self.frame.to_geo(
            self.west + (column as f64 + 0.5) * self.resolution,
            self.north - (row as f64 + 0.5) * self.resolution,
        )
    }

    /// Samples for one cell, if all five are present.
    fn cell_samples(&self, elevations: &[Option<f64>], row: usize, column: usize) -> Option<CellSamples> {
        let at = |index: usize| elevations.get(index).copied().flatten();
        Some(CellSamples {
            nw: at(self.node_index(row, column))?,
            ne: at(self.node_index(row, column + 1))?,
            sw: at(self.node_index(row + 1, column))?,
            se: at(self.node_index(row + 1, column + 1))?,
            center: at(self.center_index(row, column))?,
        })
    }

    /// Lattice nodes followed by cell centres.
    fn sample_points(&self) -> Vec<GeoPoint> {
        let mut points = Vec::with_capacity(self.node_count() + self.rows * self.columns);
        for row in 0..=self.rows {
            for column in 0..=self.columns {
                points.push(self.node(row, column));
            }
        }
        for row in 0..self.rows {
            for column in 0..self.columns {
                points.push(self.center(row, column));
            }
        }
        points
    }
}

/// Elevations at a cell's corners and centre.
#[derive(Debug, Clone, Copy)]
pub struct CellSamples {
    pub nw: f64,
    pub ne: f64,
    pub sw: f64,
    pub se: f64,
    pub center: f64,
}

/// Maximum percent grade between any two samples, and the compass bearing
/// of steepest descent. Flat cells report an aspect of 0.
pub fn slope_and_aspect(samples: &CellSamples, resolution: f64) -> (f64, f64) {
    let half = resolution / 2.0;
    let points = [
        (0.0, resolution, samples.nw),
        (resolution, resolution, samples.ne),
        (0.0, 0.0, samples.sw),
        (resolution, 0.0, samples.se),
        (half, half, samples.center),
    ];

    let mut slope: f64 = 0.0;
    for i in 0..points.len() {
        for j in (i + 1)..points.len() {
            let (x1, y1, z1) = points[i];
            let (x2, y2, z2) = points[j];
            let run = (x2 - x1).hypot(y2 - y1);
            slope = slope.max((z2 - z1).abs() / run * 100.0);
        }
    }

    let dz_east = ((samples.ne + samples.se) - (samples.nw + samples.sw)) / (2.0 * resolution);
    let dz_north = ((samples.nw + samples.ne) - (samples.sw + samples.se)) / (2.0 * resolution);
    let aspect = if dz_east.abs() < 1e-12 && dz_north.abs() < 1e-12 {
        0.0
    } else {
        let bearing = (-dz_east).atan2(-dz_north).to_degrees().rem_euclid(360.0);
        let rounded = round_to_precision(bearing, Precision::Measurement);
        if rounded >= 360.0 {
            0.0
        } else {
            rounded
        }
    };

    (round_to_precision(slope, Precision::Measurement), aspect)
}

/// Builds [`ElevationGrid`]s from a sampling capability.
pub struct ElevationGridAnalyzer<S> {
    sampler: S,
    retry: RetryPolicy,
    batch_size: usize,
}

impl<S: ElevationSampler> ElevationGridAnalyzer<S> {
    pub fn new(sampler: S, retry: RetryPolicy, batch_size: usize) -> Self {
        Self {
            sampler,
            retry,
            batch_size: batch_size.max(1),
        }
    }

    pub fn sampler(&self) -> &S {
        &self.sampler
    }

    /// Analyze `shape` at `resolution` metres per cell.
    ///
    /// Elevation outages never fail the call; affected cells are NaN.
    pub async fn analyze(&self, shape: &Shape, resolution: f64) -> Result<ElevationGrid, GridError> {
        let layout = GridLayout::plan(&shape.ring, &shape.id, resolution)?;
        tracing::info!(
            shape_id = %shape.id,
            rows = layout.rows,
            columns = layout.columns,
            resolution,
            "Starting elevation grid analysis"
        );

        let points = layout.sample_points();
        let elevations = self.sample_all(&points).await;

        let mut cells = Vec::with_capacity(layout.rows * layout.columns);
        for row in 0..layout.rows {
            for column in 0..layout.columns {
                let (slope, aspect) = match layout.cell_samples(&elevations, row, column) {
                    Some(s) => slope_and_aspect(&s, layout.resolution),
                    None => (f64::NAN, f64::NAN),
                };
                cells.push(ElevationGridCell {
                    ring: Ring::new([
                        layout.node(row, column),
                        layout.node(row, column + 1),
                        layout.node(row + 1, column + 1),
                        layout.node(row + 1, column),
                    ]),
                    center: layout.center(row, column),
                    slope,
                    aspect,
                });
            }
        }

        let finite: Vec<f64> = cells.iter().map(|c| c.slope).filter(|s| s.is_finite()).collect();
        let min_slope = finite.iter().copied().reduce(f64::min).unwrap_or(0.0);
        let max_slope = finite.iter().copied().reduce(f64::max).unwrap_or(0.0);

        tracing::info!(
            shape_id = %shape.id,
            cells = cells.len(),
            missing = cells.len() - finite.len(),
            min_slope,
            max_slope,
            "Elevation grid computed"
        );

        Ok(ElevationGrid {
            shape_id: shape.id.clone(),
            cells,
            resolution: layout.resolution,
            rows: layout.rows,
            columns: layout.columns,
            width_m: layout.width,
            height_m: layout.height,
            min_slope,
            max_slope,
        })
    }

    /// Sample every point in batches; failed batches yield `None`s.
    async fn sample_all(&self, points: &[GeoPoint]) -> Vec<Option<f64>> {
        let batches: Vec<_> = points
            .chunks(self.batch_size)
            .map(|chunk| self.sample_batch(chunk.to_vec()))
            .collect();
        let sampled: Vec<Vec<Option<f64>>> = stream::iter(batches).buffered(MAX_IN_FLIGHT).collect().await;
        sampled.into_iter().flatten().collect()
    }

    async fn sample_batch(&self, chunk: Vec<GeoPoint>) -> Vec<Option<f64>> {
        match sample_with_retry(&self.sampler, &chunk, &self.retry).await {
            Ok(samples) => samples
                .into_iter()
                .map(|s| s.elevation_m.map(|e| round_to_precision(e, Precision::Elevation)))
                .collect(),
            Err(e) => {
                tracing::warn!(points = chunk.len(), error = %e, "Elevation batch failed, marking cells as missing");
                vec![None; chunk.len()]
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Trigger policy
// ─────────────────────────────────────────────────────────────────────────────

/// Identifies one analysis request; stale tickets are rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalysisTicket {
    generation: u64,
}

/// A grid computation the caller should run.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub ticket: AnalysisTicket,
    pub shape: Shape,
}

/// Keeps the grid in step with the selection: exactly one selected shape is
/// analyzed; any other selection clears the grid.
#[derive(Debug, Default)]
pub struct TerrainAnalysis {
    generation: u64,
    target: Option<Shape>,
    pending: bool,
    grid: Option<ElevationGrid>,
}

impl TerrainAnalysis {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn grid(&self) -> Option<&ElevationGrid> {
        self.grid.as_ref()
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    /// React to a selection change. Returns a request when a new grid is
    /// needed.
    pub fn on_selection(&mut self, selected: &[&Shape]) -> Option<AnalysisRequest> {
        let [only] = selected else {
            self.clear();
            return None;
        };

        let unchanged = self
            .target
            .as_ref()
            .is_some_and(|t| t.id == only.id && t.ring == only.ring);
        if unchanged && (self.pending || self.grid.is_some()) {
            return None;
        }

        self.generation += 1;
        self.target = Some((*only).clone());
        self.grid = None;
        self.pending = true;
        Some(AnalysisRequest {
            ticket: AnalysisTicket {
                generation: self.generation,
            },
            shape: (*only).clone(),
        })
    }

    /// Drop the grid and invalidate anything in flight.
    pub fn clear(&mut self) {
        self.generation += 1;
        self.target = None;
        self.pending = false;
        self.grid = None;
    }

    /// Install a finished grid. Returns false (and drops it) when stale.
    pub fn accept(&mut self, ticket: AnalysisTicket, grid: ElevationGrid) -> bool {
        if ticket.generation != self.generation {
            tracing::debug!(shape_id = %grid.shape_id, "Discarding stale elevation grid");
            return false;
        }
        self.pending = false;
        self.grid = Some(grid);
        true
    }

    /// Record a failed analysis so the next selection retries.
    pub fn reject(&mut self, ticket: AnalysisTicket) {
        if ticket.generation == self.generation {
            self.pending = false;
            self.target = None;
        }
    }
}
