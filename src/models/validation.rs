// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Outcome of a zone placement check.

use crate::models::ZoneKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Result of validating a proposed zone. Failing checks are data, not errors.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ZoneValidationResult {
    pub is_valid: bool,
    /// Human-readable reasons, in rule order.
    pub reasons: Vec<String>,
    /// Non-blocking suggestions; never affect `is_valid`.
    pub suggested_kinds: BTreeSet<ZoneKind>,
}

impl ZoneValidationResult {
    pub fn from_reasons(reasons: Vec<String>, suggested_kinds: BTreeSet<ZoneKind>) -> Self {
        Self {
            is_valid: reasons.is_empty(),
            reasons,
            suggested_kinds,
        }
    }

    /// All reasons on one line, for single-message surfaces.
    pub fn message(&self) -> String {
        self.reasons.join("; ")
    }
}
