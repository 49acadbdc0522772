// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Stateless geometry operations.

use crate::error::Result;
use crate::models::{Ring, Shape};
use crate::services::geometry::{self, Measurement};
use crate::services::ElevationSampler;
use crate::AppState;
use axum::{routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub fn routes<S: ElevationSampler + 'static>() -> Router<Arc<AppState<S>>> {
    Router::new()
        .route("/api/geometry/measure", post(measure))
        .route("/api/geometry/buffer", post(buffer))
        .route("/api/geometry/union", post(union))
        .route("/api/geometry/difference", post(difference))
}

#[derive(Deserialize)]
pub struct MeasureRequest {
    pub ring: Ring,
}

async fn measure(Json(req): Json<MeasureRequest>) -> Json<Measurement> {
    Json(geometry::measure(&req.ring))
}

#[derive(Deserialize)]
pub struct BufferRequest {
    pub shape: Shape,
    pub distance_m: f64,
}

async fn buffer(Json(req): Json<BufferRequest>) -> Result<Json<Shape>> {
    let shape = refreshed(req.shape);
    Ok(Json(geometry::buffer(&shape, req.distance_m)?))
}

/// Boolean operation result; `shape` is null when nothing remains.
#[derive(Serialize)]
pub struct BooleanResponse {
    pub shape: Option<Shape>,
}

#[derive(Deserialize)]
pub struct UnionRequest {
    pub a: Shape,
    pub b: Shape,
}

async fn union(Json(req): Json<UnionRequest>) -> Result<Json<BooleanResponse>> {
    let shape = geometry::union(&refreshed(req.a), &refreshed(req.b))?;
    Ok(Json(BooleanResponse { shape }))
}

#[derive(Deserialize)]
pub struct DifferenceRequest {
    pub minuend: Shape,
    pub subtrahend: Shape,
}

async fn difference(Json(req): Json<DifferenceRequest>) -> Result<Json<BooleanResponse>> {
    let shape = geometry::difference(&refreshed(req.minuend), &refreshed(req.subtrahend))?;
    Ok(Json(BooleanResponse { shape }))
}

/// Client-supplied areas are not trusted.
fn refreshed(shape: Shape) -> Shape {
    Shape::new(shape.id, shape.ring, shape.kind)
}
