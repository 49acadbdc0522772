// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.
//!
//! Every setting has a default, so an empty environment gives a working
//! local server. Values that are present but do not parse are rejected.

use crate::models::ZoneKind;
use crate::services::elevation::RetryPolicy;
use crate::services::zones::{ZoneRules, ZoneTaxonomy};
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server port
    pub port: u16,
    /// Frontend origin allowed by CORS
    pub frontend_url: String,

    // --- Elevation service ---
    pub elevation_api_url: String,
    /// Points per elevation request
    pub elevation_batch_size: usize,
    pub elevation_retry: RetryPolicy,
    /// Upper bound on cached elevation points
    pub elevation_cache_max_points: usize,

    // --- Terrain ---
    /// Default grid cell size (m)
    pub grid_resolution_m: f64,
    /// Default steep-slope threshold (percent grade)
    pub steep_threshold_percent: f64,

    // --- Zones ---
    pub zone_rules: ZoneRules,
    pub zone_taxonomy: ZoneTaxonomy,
}

impl Default for Config {
    /// Default config for testing only.
    fn default() -> Self {
        Self {
            port: 8080,
            frontend_url: "http://localhost:5173".to_string(),
            elevation_api_url: DEFAULT_ELEVATION_API_URL.to_string(),
            elevation_batch_size: 100,
            elevation_retry: RetryPolicy::default(),
            elevation_cache_max_points: crate::services::elevation::DEFAULT_CACHE_MAX_POINTS,
            grid_resolution_m: 10.0,
            steep_threshold_percent: crate::models::grid::DEFAULT_STEEP_THRESHOLD,
            zone_rules: ZoneRules::default(),
            zone_taxonomy: ZoneTaxonomy::default(),
        }
    }
}

const DEFAULT_ELEVATION_API_URL: &str = "https://api.open-elevation.com/api/v1/lookup";

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |key: &'static str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let elevation_retry = RetryPolicy {
            max_attempts: parse_or(&get, "ELEVATION_MAX_ATTEMPTS", defaults.elevation_retry.max_attempts)?,
            initial_backoff: Duration::from_millis(parse_or(
                &get,
                "ELEVATION_INITIAL_BACKOFF_MS",
                250u64,
            )?),
            max_backoff: Duration::from_millis(parse_or(&get, "ELEVATION_MAX_BACKOFF_MS", 4000u64)?),
            total_timeout: Duration::from_secs(parse_or(&get, "ELEVATION_TOTAL_TIMEOUT_SECS", 30u64)?),
        };
        if elevation_retry.max_attempts == 0 {
            return Err(ConfigError::Invalid {
                key: "ELEVATION_MAX_ATTEMPTS",
                value: "0".to_string(),
            });
        }

        let elevation_batch_size: usize =
            parse_or(&get, "ELEVATION_BATCH_SIZE", defaults.elevation_batch_size)?;
        if elevation_batch_size == 0 {
            return Err(ConfigError::Invalid {
                key: "ELEVATION_BATCH_SIZE",
                value: "0".to_string(),
            });
        }

        let elevation_cache_max_points: usize = parse_or(
            &get,
            "ELEVATION_CACHE_MAX_POINTS",
            defaults.elevation_cache_max_points,
        )?;

        let grid_resolution_m = positive(&get, "GRID_RESOLUTION_METERS", defaults.grid_resolution_m)?;

        let zone_rules = ZoneRules {
            min_area_m2: non_negative(&get, "MIN_ZONE_AREA_M2", defaults.zone_rules.min_area_m2)?,
            min_separation_m: non_negative(
                &get,
                "MIN_ZONE_SEPARATION_M",
                defaults.zone_rules.min_separation_m,
            )?,
            overlap_tolerance_m2: non_negative(
                &get,
                "ZONE_OVERLAP_TOLERANCE_M2",
                defaults.zone_rules.overlap_tolerance_m2,
            )?,
            allow_holes: parse_or(&get, "ALLOW_ZONE_HOLES", defaults.zone_rules.allow_holes)?,
        };

        let zone_taxonomy = match get("ZONE_KINDS") {
            None => defaults.zone_taxonomy,
            Some(raw) => parse_kinds(&raw)?,
        };

        Ok(Self {
            port: parse_or(&get, "PORT", defaults.port)?,
            frontend_url: get("FRONTEND_URL").unwrap_or(defaults.frontend_url),
            elevation_api_url: get("ELEVATION_API_URL").unwrap_or(defaults.elevation_api_url),
            elevation_batch_size,
            elevation_retry,
            elevation_cache_max_points,
            grid_resolution_m,
            steep_threshold_percent: non_negative(
                &get,
                "STEEP_THRESHOLD_PERCENT",
                defaults.steep_threshold_percent,
            )?,
            zone_rules,
            zone_taxonomy,
        })
    }
}

fn parse_or<T, G>(get: &G, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    G: Fn(&'static str) -> Option<String>,
{
    match get(key) {
        None => Ok(default),
        Some(value) => value.parse().map_err(|_| ConfigError::Invalid { key, value }),
    }
}

fn non_negative<G>(get: &G, key: &'static str, default: f64) -> Result<f64, ConfigError>
where
    G: Fn(&'static str) -> Option<String>,
{
    let v: f64 = parse_or(get, key, default)?;
    if v.is_finite() && v >= 0.0 {
        Ok(v)
    } else {
        Err(ConfigError::Invalid {
            key,
            value: v.to_string(),
        })
    }
}

fn positive<G>(get: &G, key: &'static str, default: f64) -> Result<f64, ConfigError>
where
    G: Fn(&'static str) -> Option<String>,
{
    let v = non_negative(get, key, default)?;
    if v > 0.0 {
        Ok(v)
    } else {
        Err(ConfigError::Invalid {
            key,
            value: v.to_string(),
        })
    }
}

fn parse_kinds(raw: &str) -> Result<ZoneTaxonomy, ConfigError> {
    let kinds = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<ZoneKind>().map_err(|_| ConfigError::Invalid {
                key: "ZONE_KINDS",
                value: s.to_string(),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    if kinds.is_empty() {
        return Err(ConfigError::Invalid {
            key: "ZONE_KINDS",
            value: raw.to_string(),
        });
    }
    Ok(ZoneTaxonomy::new(kinds))
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}
