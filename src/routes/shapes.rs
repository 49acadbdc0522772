// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shape collection endpoints.

use crate::error::{AppError, Result};
use crate::models::{generate_shape_id, Ring, Shape, ShapeKind};
use crate::services::{geometry, CollectionError, ElevationSampler, ShapeCollection};
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;

pub fn routes<S: ElevationSampler + 'static>() -> Router<Arc<AppState<S>>> {
    Router::new()
        .route(
            "/api/shapes",
            get(list_shapes::<S>).put(load_shapes::<S>).post(add_shape::<S>),
        )
        .route("/api/shapes/geojson", get(export_geojson::<S>))
        .route("/api/shapes/{id}/ring", put(edit_ring::<S>))
        .route("/api/shapes/{id}/translate", post(translate_shape::<S>))
        .route("/api/shapes/{id}/buffer", post(buffer_shape::<S>))
        .route("/api/shapes/{id}", delete(delete_shape::<S>))
}

// ─── Listing & Persistence ───────────────────────────────────

async fn list_shapes<S: ElevationSampler>(
    State(state): State<Arc<AppState<S>>>,
) -> Json<Vec<Shape>> {
    Json(state.store.snapshot().shapes().to_vec())
}

/// Replace the whole collection.
async fn load_shapes<S: ElevationSampler>(
    State(state): State<Arc<AppState<S>>>,
    Json(shapes): Json<Vec<Shape>>,
) -> Result<Json<Vec<Shape>>> {
    let loaded = ShapeCollection::from_shapes(
        shapes
            .into_iter()
            .map(|s| Shape::new(s.id, s.ring, s.kind))
            .collect(),
    )?;
    tracing::info!(count = loaded.len(), "Loaded shape collection");
    let out = loaded.shapes().to_vec();
    state.store.replace(loaded);
    Ok(Json(out))
}

async fn export_geojson<S: ElevationSampler>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<geojson::GeoJson>> {
    Ok(Json(state.store.snapshot().to_geojson()?))
}

// ─── Editing ─────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct NewShapeRequest {
    #[serde(default)]
    pub id: Option<String>,
    pub ring: Ring,
    pub kind: ShapeKind,
}

async fn add_shape<S: ElevationSampler>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<NewShapeRequest>,
) -> Result<(StatusCode, Json<Shape>)> {
    if matches!(req.kind, ShapeKind::Buffer { .. }) {
        return Err(AppError::BadRequest(
            "buffers are created from their parent shape".to_string(),
        ));
    }
    let id = req.id.unwrap_or_else(|| generate_shape_id(req.kind.tag()));
    let shape = Shape::new(id, req.ring, req.kind);
    geometry::validate_ring(&shape.ring, "add shape", &shape.id)?;
    let added = shape.clone();
    state.store.update(|c| c.place_shape(shape))?;
    tracing::info!(shape_id = %added.id, kind = added.kind.tag(), "Added shape");
    Ok((StatusCode::CREATED, Json(added)))
}

#[derive(Deserialize)]
pub struct EditRingRequest {
    pub ring: Ring,
}

/// Replace a shape's ring; dependent buffers are recomputed.
async fn edit_ring<S: ElevationSampler>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    Json(req): Json<EditRingRequest>,
) -> Result<Json<Vec<Shape>>> {
    let next = state.store.update(|c| c.replace_ring(&id, req.ring))?;
    Ok(Json(next.shapes().to_vec()))
}

#[derive(Deserialize)]
pub struct TranslateRequest {
    pub east_m: f64,
    pub north_m: f64,
}

async fn translate_shape<S: ElevationSampler>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    Json(req): Json<TranslateRequest>,
) -> Result<Json<Vec<Shape>>> {
    let next = state.store.update(|c| c.translate(&id, req.east_m, req.north_m))?;
    Ok(Json(next.shapes().to_vec()))
}

#[derive(Deserialize)]
pub struct StoredBufferRequest {
    pub distance_m: f64,
}

/// Buffer a stored shape and keep the result; it follows later edits of its
/// parent.
async fn buffer_shape<S: ElevationSampler>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    Json(req): Json<StoredBufferRequest>,
) -> Result<(StatusCode, Json<Shape>)> {
    let mut created = None;
    state.store.update(|c| {
        let parent = c
            .get(&id)
            .ok_or_else(|| CollectionError::UnknownShape(id.clone()))?;
        let buffered = geometry::buffer(parent, req.distance_m)?;
        created = Some(buffered.clone());
        c.with_shape(buffered)
    })?;
    let shape = created.ok_or_else(|| AppError::Internal(anyhow::anyhow!("buffer not created")))?;
    Ok((StatusCode::CREATED, Json(shape)))
}

async fn delete_shape<S: ElevationSampler>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    state.store.update(|c| c.remove(&id))?;
    tracing::info!(shape_id = %id, "Deleted shape");
    Ok(StatusCode::NO_CONTENT)
}
