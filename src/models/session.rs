// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Working set of the interactive zone-drawing workflow.

use crate::models::{GeoPoint, ZoneValidationResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// States of the zone-drawing workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrawState {
    Idle,
    Drawing,
    Preview,
    Validating,
    Dialog,
    Committing,
    Error,
}

impl fmt::Display for DrawState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DrawState::Idle => "idle",
            DrawState::Drawing => "drawing",
            DrawState::Preview => "preview",
            DrawState::Validating => "validating",
            DrawState::Dialog => "dialog",
            DrawState::Committing => "committing",
            DrawState::Error => "error",
        };
        f.write_str(s)
    }
}

/// Measurements of the path being drawn. Display only.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LiveMetrics {
    pub area_m2: f64,
    pub perimeter_m: f64,
    pub vertex_count: usize,
}

/// The single active drawing session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneDrawSession {
    pub id: u64,
    pub state: DrawState,
    pub current_path: Vec<GeoPoint>,
    pub validation_result: Option<ZoneValidationResult>,
    pub error_message: Option<String>,
    pub live_metrics: LiveMetrics,
}

impl ZoneDrawSession {
    pub fn new(id: u64, state: DrawState) -> Self {
        Self {
            id,
            state,
            current_path: Vec::new(),
            validation_result: None,
            error_message: None,
            live_metrics: LiveMetrics::default(),
        }
    }

    /// True when the last validation of the current path passed.
    pub fn is_validated(&self) -> bool {
        self.validation_result.as_ref().is_some_and(|r| r.is_valid)
    }
}
