// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Slope grid endpoint.

use crate::error::{AppError, Result};
use crate::models::{ElevationGrid, SlopeSummary};
use crate::services::ElevationSampler;
use crate::AppState;
use axum::{extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub fn routes<S: ElevationSampler + 'static>() -> Router<Arc<AppState<S>>> {
    Router::new().route("/api/terrain/grid", post(compute_grid::<S>))
}

#[derive(Deserialize)]
pub struct GridRequest {
    pub shape_id: String,
    #[serde(default)]
    pub resolution_m: Option<f64>,
    #[serde(default)]
    pub threshold_percent: Option<f64>,
}

#[derive(Serialize)]
pub struct GridResponse {
    pub grid: ElevationGrid,
    pub summary: SlopeSummary,
}

async fn compute_grid<S: ElevationSampler>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<GridRequest>,
) -> Result<Json<GridResponse>> {
    let threshold = req
        .threshold_percent
        .unwrap_or(state.config.steep_threshold_percent);
    if !threshold.is_finite() || threshold < 0.0 {
        return Err(AppError::BadRequest(format!(
            "threshold_percent must be a non-negative number, got {}",
            threshold
        )));
    }
    let resolution = req.resolution_m.unwrap_or(state.config.grid_resolution_m);

    let shape = state
        .store
        .snapshot()
        .get(&req.shape_id)
        .cloned()
        .ok_or_else(|| AppError::NotFound(format!("shape '{}'", req.shape_id)))?;

    let grid = state.analyzer.analyze(&shape, resolution).await?;
    let summary = grid.summary(threshold);
    Ok(Json(GridResponse { grid, summary }))
}
