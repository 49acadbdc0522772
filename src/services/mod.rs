// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - geometry, terrain and zone logic.

pub mod collection;
pub mod coordinates;
pub mod drawing;
pub mod elevation;
pub mod geometry;
pub mod terrain;
pub mod zones;

pub use collection::{CollectionError, ShapeCollection, ShapeStore};
pub use coordinates::LocalFrame;
pub use drawing::{DrawEffect, DrawEvent, Transition, ZoneDrawingStateMachine, ZoneWorkflow};
pub use elevation::{ElevationSampler, ElevationServiceError, HttpElevationSampler, RetryPolicy};
pub use geometry::GeometryError;
pub use terrain::{ElevationGridAnalyzer, GridError, TerrainAnalysis};
pub use zones::{ZoneRules, ZoneTaxonomy, ZoneValidationEngine};
