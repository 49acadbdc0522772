// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Zone placement checks against the stored collection.

use crate::models::{Ring, ZoneKind, ZoneValidationResult};
use crate::services::ElevationSampler;
use crate::AppState;
use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;

pub fn routes<S: ElevationSampler + 'static>() -> Router<Arc<AppState<S>>> {
    Router::new()
        .route("/api/zones/validate", post(validate_zone::<S>))
        .route("/api/zones/kinds", get(zone_kinds::<S>))
}

#[derive(Deserialize)]
pub struct ValidateZoneRequest {
    pub ring: Ring,
    /// Zone being edited, excluded from overlap checks.
    #[serde(default)]
    pub ignore_id: Option<String>,
}

async fn validate_zone<S: ElevationSampler>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<ValidateZoneRequest>,
) -> Json<ZoneValidationResult> {
    let shapes = state.store.snapshot();
    Json(
        state
            .zone_engine
            .validate_in(&shapes, &req.ring, req.ignore_id.as_deref()),
    )
}

/// Enabled zone kinds.
async fn zone_kinds<S: ElevationSampler>(
    State(state): State<Arc<AppState<S>>>,
) -> Json<Vec<ZoneKind>> {
    Json(state.zone_engine.taxonomy().kinds().to_vec())
}
