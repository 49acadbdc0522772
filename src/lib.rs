// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Siteplan engine: site geometry and terrain analysis.
//!
//! This crate provides geodetic polygon measurement, buffering and boolean
//! operations, slope grids from a remote elevation service, zone placement
//! rules and the zone drawing workflow, plus an HTTP API over them.

pub mod config;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;

use config::Config;
use services::{
    ElevationGridAnalyzer, HttpElevationSampler, ShapeCollection, ShapeStore, ZoneValidationEngine,
};
use std::time::Duration;

/// Per-request timeout for the elevation client.
const ELEVATION_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Shared application state.
pub struct AppState<S = HttpElevationSampler> {
    pub config: Config,
    pub store: ShapeStore,
    pub analyzer: ElevationGridAnalyzer<S>,
    pub zone_engine: ZoneValidationEngine,
}

impl<S: services::ElevationSampler> AppState<S> {
    /// State around an arbitrary elevation sampler.
    pub fn with_sampler(config: Config, sampler: S) -> Self {
        let analyzer = ElevationGridAnalyzer::new(
            sampler,
            config.elevation_retry,
            config.elevation_batch_size,
        );
        let zone_engine =
            ZoneValidationEngine::new(config.zone_rules.clone(), config.zone_taxonomy.clone());
        Self {
            config,
            store: ShapeStore::new(ShapeCollection::new()),
            analyzer,
            zone_engine,
        }
    }
}

impl AppState<HttpElevationSampler> {
    /// State backed by the configured elevation service.
    pub fn new(config: Config) -> Self {
        let sampler = HttpElevationSampler::new(&config.elevation_api_url, ELEVATION_REQUEST_TIMEOUT)
            .with_cache_limit(config.elevation_cache_max_points);
        Self::with_sampler(config, sampler)
    }
}
