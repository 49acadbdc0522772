// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Elevation sampling capability and its HTTP client.
//!
//! Handles:
//! - Batched point lookups against an Open-Elevation compatible API
//! - Partial results (points the service cannot resolve)
//! - Bounded exponential backoff with a total wait cap
//! - In-memory caching of resolved elevations

use crate::models::GeoPoint;
use crate::services::coordinates::{round_to_precision, Precision};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Elevation for one requested point; `None` when the service had no value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ElevationSample {
    pub point: GeoPoint,
    pub elevation_m: Option<f64>,
}

/// Errors from the elevation service.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ElevationServiceError {
    #[error("Elevation request failed: {0}")]
    Transport(String),

    #[error("Elevation service rate limit hit")]
    RateLimited,

    #[error("Elevation service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to decode elevation response: {0}")]
    Decode(String),

    #[error("Elevation service returned {got} results for {expected} points")]
    LengthMismatch { expected: usize, got: usize },

    #[error("Elevation request timed out after {0:?}")]
    Timeout(Duration),
}

impl ElevationServiceError {
    /// Whether another attempt may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            ElevationServiceError::Transport(_) | ElevationServiceError::RateLimited => true,
            ElevationServiceError::Status { status, .. } => *status >= 500,
            ElevationServiceError::Decode(_)
            | ElevationServiceError::LengthMismatch { .. }
            | ElevationServiceError::Timeout(_) => false,
        }
    }
}

/// Something that can look up ground elevation for a batch of points.
///
/// Results are returned in request order, one per point.
pub trait ElevationSampler: Send + Sync {
    fn sample_elevations(
        &self,
        points: &[GeoPoint],
    ) -> impl Future<Output = Result<Vec<ElevationSample>, ElevationServiceError>> + Send;
}

/// Retry schedule for elevation requests.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    /// Cap on the whole retry loop, sleeps included.
    pub total_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            initial_backoff: Duration::from_millis(250),
            max_backoff: Duration::from_secs(4),
            total_timeout: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

/// Sample `points`, retrying retryable failures per `policy`.
///
/// Always resolves: either samples or the last error (or a timeout).
pub async fn sample_with_retry<S: ElevationSampler>(
    sampler: &S,
    points: &[GeoPoint],
    policy: &RetryPolicy,
) -> Result<Vec<ElevationSample>, ElevationServiceError> {
    let attempts = async {
        let mut attempt = 1;
        loop {
            match sampler.sample_elevations(points).await {
                Ok(samples) if samples.len() == points.len() => return Ok(samples),
                Ok(samples) => {
                    return Err(ElevationServiceError::LengthMismatch {
                        expected: points.len(),
                        got: samples.len(),
                    })
                }
                Err(e) if e.is_retryable() && attempt < policy.max_attempts => {
                    let delay = policy.backoff(attempt);
                    tracing::warn!(
                        attempt,
                        max_attempts = policy.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Elevation request failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    };

    tokio::time::timeout(policy.total_timeout, attempts)
        .await
        .unwrap_or(Err(ElevationServiceError::Timeout(policy.total_timeout)))
}

// ─────────────────────────────────────────────────────────────────────────────
// HTTP client
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct LookupRequest {
    locations: Vec<LookupLocation>,
}

#[derive(Serialize)]
struct LookupLocation {
    latitude: f64,
    longitude: f64,
}

#[derive(Deserialize)]
struct LookupResponse {
    results: Vec<LookupResult>,
}

#[derive(Deserialize)]
struct LookupResult {
    #[serde(default)]
    elevation: Option<f64>,
}

/// Cache key: coordinates in micro-degrees.
type CacheKey = (i64, i64);

/// Shared elevation cache type.
pub type ElevationCache = Arc<DashMap<CacheKey, f64>>;

fn cache_key(point: GeoPoint) -> CacheKey {
    (
        (point.lat * 1e6).round() as i64,
        (point.lng * 1e6).round() as i64,
    )
}

/// Default bound on cached points, roughly one maximal grid.
pub const DEFAULT_CACHE_MAX_POINTS: usize = 500_000;

/// Open-Elevation compatible client.
#[derive(Clone)]
pub struct HttpElevationSampler {
    http: reqwest::Client,
    url: String,
    cache: ElevationCache,
    cache_limit: usize,
}

impl HttpElevationSampler {
    pub fn new(url: impl Into<String>, request_timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Falling back to default HTTP client");
                reqwest::Client::new()
            });
        Self {
            http,
            url: url.into(),
            cache: Arc::new(DashMap::new()),
            cache_limit: DEFAULT_CACHE_MAX_POINTS,
        }
    }

    /// Bound the shared cache to `limit` points; 0 disables caching.
    pub fn with_cache_limit(mut self, limit: usize) -> Self {
        self.cache_limit = limit;
        self
    }

    pub fn cached_points(&self) -> usize {
        self.cache.len()
    }

    /// Store fresh elevations, clearing the cache first if they would not fit.
    fn remember(&self, entries: Vec<(CacheKey, f64)>) {
        if self.cache_limit == 0 || entries.is_empty() {
            return;
        }
        if self.cache.len() + entries.len() > self.cache_limit {
            tracing::debug!(
                cached = self.cache.len(),
                incoming = entries.len(),
                limit = self.cache_limit,
                "Elevation cache full, clearing"
            );
            self.cache.clear();
        }
        for (key, elevation) in entries.into_iter().take(self.cache_limit) {
            self.cache.insert(key, elevation);
        }
    }

    async fn lookup(&self, points: &[GeoPoint]) -> Result<Vec<Option<f64>>, ElevationServiceError> {
        let body = LookupRequest {
            locations: points
                .iter()
                .map(|p| LookupLocation {
                    latitude: p.lat,
                    longitude: p.lng,
                })
                .collect(),
        };

        let response = self
            .http
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ElevationServiceError::Transport(e.to_string()))?;

        let status = response.status();
        if status.as_u16() == 429 {
            tracing::warn!("Elevation service rate limit hit (429)");
            return Err(ElevationServiceError::RateLimited);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ElevationServiceError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: LookupResponse = response
            .json()
            .await
            .map_err(|e| ElevationServiceError::Decode(e.to_string()))?;
        if parsed.results.len() != points.len() {
            return Err(ElevationServiceError::LengthMismatch {
                expected: points.len(),
                got: parsed.results.len(),
            });
        }
        Ok(parsed.results.into_iter().map(|r| r.elevation).collect())
    }
}

impl ElevationSampler for HttpElevationSampler {
    async fn sample_elevations(
        &self,
        points: &[GeoPoint],
    ) -> Result<Vec<ElevationSample>, ElevationServiceError> {
        let mut elevations: Vec<Option<f64>> = points
            .iter()
            .map(|p| self.cache.get(&cache_key(*p)).map(|e| *e))
            .collect();

        let missing: Vec<usize> = (0..points.len()).filter(|&i| elevations[i].is_none()).collect();
        if !missing.is_empty() {
            let request: Vec<GeoPoint> = missing.iter().map(|&i| points[i]).collect();
            let fetched = self.lookup(&request).await?;
            let mut fresh = Vec::with_capacity(missing.len());
            for (&i, value) in missing.iter().zip(fetched) {
                if let Some(e) = value.filter(|e| e.is_finite()) {
                    let e = round_to_precision(e, Precision::Elevation);
                    fresh.push((cache_key(points[i]), e));
                    elevations[i] = Some(e);
                }
            }
            self.remember(fresh);
            tracing::debug!(
                requested = request.len(),
                cached = points.len() - request.len(),
                "Fetched elevations"
            );
        }

        Ok(points
            .iter()
            .zip(elevations)
            .map(|(point, elevation_m)| ElevationSample {
                point: *point,
                elevation_m,
            })
            .collect())
    }
}
