// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types with consistent API responses.

use crate::services::collection::CollectionError;
use crate::services::elevation::ElevationServiceError;
use crate::services::geometry::GeometryError;
use crate::services::terrain::GridError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Application error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Geometry(#[from] GeometryError),

    #[error(transparent)]
    Collection(CollectionError),

    #[error(transparent)]
    Grid(GridError),

    #[error("Elevation service error: {0}")]
    Elevation(#[from] ElevationServiceError),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<CollectionError> for AppError {
    fn from(err: CollectionError) -> Self {
        match err {
            CollectionError::UnknownShape(id) => AppError::NotFound(format!("shape '{}'", id)),
            CollectionError::Geometry(e) => AppError::Geometry(e),
            other => AppError::Collection(other),
        }
    }
}

impl From<GridError> for AppError {
    fn from(err: GridError) -> Self {
        match err {
            GridError::Geometry(e) => AppError::Geometry(e),
            other => AppError::Grid(other),
        }
    }
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, details) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", Some(msg.clone())),
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "bad_request", Some(msg.clone()))
            }
            AppError::Geometry(err) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "geometry_error",
                Some(err.to_string()),
            ),
            AppError::Collection(err @ CollectionError::ParseError(_)) => {
                (StatusCode::BAD_REQUEST, "bad_request", Some(err.to_string()))
            }
            AppError::Collection(err) => {
                (StatusCode::CONFLICT, "collection_conflict", Some(err.to_string()))
            }
            AppError::Grid(err) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "grid_error",
                Some(err.to_string()),
            ),
            AppError::Elevation(err) => {
                tracing::warn!(error = %err, "Elevation service error");
                (StatusCode::BAD_GATEWAY, "elevation_error", Some(err.to_string()))
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None)
            }
        };

        let body = ErrorResponse {
            error: error.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;
