// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use axum::body::Body;
use axum::http::{header, Request};
use siteplan_engine::config::Config;
use siteplan_engine::models::{GeoPoint, Ring, Shape};
use siteplan_engine::routes::create_router;
use siteplan_engine::services::elevation::{ElevationSample, ElevationSampler, ElevationServiceError, RetryPolicy};
use siteplan_engine::services::{LocalFrame, ShapeCollection};
use siteplan_engine::AppState;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Origin of every test site.
#[allow(dead_code)]
pub fn site_frame() -> LocalFrame {
    LocalFrame::new(GeoPoint::new(37.4, -122.1))
}

/// Axis-aligned rectangle in metres east/north of the site origin.
#[allow(dead_code)]
pub fn rect(east: f64, north: f64, width: f64, height: f64) -> Ring {
    let f = site_frame();
    Ring::new([
        f.to_geo(east, north),
        f.to_geo(east + width, north),
        f.to_geo(east + width, north + height),
        f.to_geo(east, north + height),
    ])
}

/// A 200 m × 200 m project boundary with id `site`.
#[allow(dead_code)]
pub fn site_boundary() -> Shape {
    Shape::boundary("site", rect(0.0, 0.0, 200.0, 200.0))
}

#[allow(dead_code)]
pub fn site_collection() -> ShapeCollection {
    ShapeCollection::new()
        .with_shape(site_boundary())
        .expect("boundary should be accepted")
}

#[allow(dead_code)]
pub fn assert_close(actual: f64, expected: f64, relative: f64) {
    let tolerance = expected.abs() * relative;
    assert!(
        (actual - expected).abs() <= tolerance,
        "expected {expected} ± {tolerance}, got {actual}"
    );
}

// ─── Elevation mocks ─────────────────────────────────────────

/// Planar terrain: `base + east·grade_east + north·grade_north`.
#[allow(dead_code)]
pub struct PlaneSampler {
    pub frame: LocalFrame,
    pub base: f64,
    pub grade_east: f64,
    pub grade_north: f64,
    pub calls: AtomicUsize,
}

#[allow(dead_code)]
impl PlaneSampler {
    pub fn new(grade_east: f64, grade_north: f64) -> Self {
        Self {
            frame: site_frame(),
            base: 100.0,
            grade_east,
            grade_north,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn flat() -> Self {
        Self::new(0.0, 0.0)
    }
}

impl ElevationSampler for PlaneSampler {
    async fn sample_elevations(
        &self,
        points: &[GeoPoint],
    ) -> Result<Vec<ElevationSample>, ElevationServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(points
            .iter()
            .map(|p| {
                let (east, north) = self.frame.to_local(*p);
                ElevationSample {
                    point: *p,
                    elevation_m: Some(self.base + east * self.grade_east + north * self.grade_north),
                }
            })
            .collect())
    }
}

/// Rolling terrain whose grade grows towards the east.
#[allow(dead_code)]
pub struct BowlSampler {
    pub frame: LocalFrame,
}

impl ElevationSampler for BowlSampler {
    async fn sample_elevations(
        &self,
        points: &[GeoPoint],
    ) -> Result<Vec<ElevationSample>, ElevationServiceError> {
        Ok(points
            .iter()
            .map(|p| {
                let (east, north) = self.frame.to_local(*p);
                ElevationSample {
                    point: *p,
                    elevation_m: Some(0.002 * east * east + 0.01 * north),
                }
            })
            .collect())
    }
}

/// An elevation service that is always down.
#[allow(dead_code)]
pub struct OfflineSampler;

impl ElevationSampler for OfflineSampler {
    async fn sample_elevations(
        &self,
        _points: &[GeoPoint],
    ) -> Result<Vec<ElevationSample>, ElevationServiceError> {
        Err(ElevationServiceError::Transport("connection refused".to_string()))
    }
}

/// Short backoff so retry paths finish quickly.
#[allow(dead_code)]
pub fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 2,
        initial_backoff: Duration::from_millis(1),
        max_backoff: Duration::from_millis(2),
        total_timeout: Duration::from_secs(2),
    }
}

#[allow(dead_code)]
pub fn test_config() -> Config {
    Config {
        elevation_retry: fast_retry(),
        ..Config::default()
    }
}

// ─── App factory ─────────────────────────────────────────────

/// Create a test app over planar 10 % northward terrain.
/// Returns the router and the shared state.
#[allow(dead_code)]
pub fn create_test_app() -> (axum::Router, Arc<AppState<PlaneSampler>>) {
    create_test_app_with(PlaneSampler::new(0.0, 0.1))
}

#[allow(dead_code)]
pub fn create_test_app_with<S: ElevationSampler + 'static>(
    sampler: S,
) -> (axum::Router, Arc<AppState<S>>) {
    let state = Arc::new(AppState::with_sampler(test_config(), sampler));
    let app = create_router(state.clone());
    (app, state)
}

#[allow(dead_code)]
pub fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[allow(dead_code)]
pub fn empty_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

#[allow(dead_code)]
pub async fn read_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Ring as the JSON list of `{lat, lng}` points accepted by the API.
#[allow(dead_code)]
pub fn ring_json(ring: &Ring) -> serde_json::Value {
    serde_json::to_value(ring).unwrap()
}
