// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the engine.

pub mod grid;
pub mod point;
pub mod session;
pub mod shape;
pub mod validation;

pub use grid::{is_steep, ElevationGrid, ElevationGridCell, SlopeSummary};
pub use point::{GeoBounds, GeoPoint, Ring};
pub use session::{DrawState, LiveMetrics, ZoneDrawSession};
pub use shape::{generate_shape_id, Shape, ShapeKind, ZoneKind};
pub use validation::ZoneValidationResult;
