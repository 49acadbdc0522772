// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Zone drawing workflow.
//!
//! [`ZoneDrawingStateMachine`] is a synchronous reducer over [`DrawEvent`]s.
//! Validation and commit are returned to the caller as [`DrawEffect`]s
//! carrying an [`EffectTicket`]; outcomes come back through
//! [`ZoneDrawingStateMachine::resolve_validation`] and
//! [`ZoneDrawingStateMachine::resolve_commit`]. A ticket that no longer
//! matches the pending one is stale and ignored.

use crate::models::{
    generate_shape_id, DrawState, GeoPoint, LiveMetrics, Ring, Shape, ZoneDrawSession, ZoneKind,
    ZoneValidationResult,
};
use crate::services::collection::{CollectionError, ShapeCollection};
use crate::services::coordinates::{round_to_precision, Precision};
use crate::services::geometry::{self, GeometryError};
use crate::services::zones::ZoneValidationEngine;
use geo::{Distance, Haversine};
use std::fmt;
use std::time::{Duration, Instant};

/// Minimum spacing between live-metric emissions.
pub const METRICS_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, PartialEq)]
pub enum DrawEvent {
    StartDraw,
    Cancel,
    Complete(Vec<GeoPoint>),
    Validate,
    Save { name: String, kind: ZoneKind },
    Error(String),
    Reset,
}

impl DrawEvent {
    fn name(&self) -> &'static str {
        match self {
            DrawEvent::StartDraw => "START_DRAW",
            DrawEvent::Cancel => "CANCEL",
            DrawEvent::Complete(_) => "COMPLETE",
            DrawEvent::Validate => "VALIDATE",
            DrawEvent::Save { .. } => "SAVE",
            DrawEvent::Error(_) => "ERROR",
            DrawEvent::Reset => "RESET",
        }
    }
}

/// Identifies one outstanding validation or commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EffectTicket(u64);

/// Everything needed to build the zone shape.
#[derive(Debug, Clone, PartialEq)]
pub struct ZoneDraft {
    pub ring: Ring,
    pub name: String,
    pub kind: ZoneKind,
}

/// Work the caller must perform and report back.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawEffect {
    Validate { ticket: EffectTicket, ring: Ring },
    Commit { ticket: EffectTicket, draft: ZoneDraft },
}

/// Result of feeding one event to the machine.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub from: DrawState,
    pub to: DrawState,
    pub effect: Option<DrawEffect>,
    /// False when the event was a no-op in the current state.
    pub accepted: bool,
}

impl Transition {
    fn ignored(state: DrawState) -> Self {
        Self {
            from: state,
            to: state,
            effect: None,
            accepted: false,
        }
    }
}

/// Rate limiter for live-metric emission.
#[derive(Debug, Clone)]
pub struct MetricsThrottle {
    interval: Duration,
    last: Option<Instant>,
}

impl MetricsThrottle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    /// True (and records `now`) when an emission is due.
    pub fn ready(&mut self, now: Instant) -> bool {
        let due = self
            .last
            .map_or(true, |last| now.saturating_duration_since(last) >= self.interval);
        if due {
            self.last = Some(now);
        }
        due
    }

    pub fn reset(&mut self) {
        self.last = None;
    }
}

impl Default for MetricsThrottle {
    fn default() -> Self {
        Self::new(METRICS_INTERVAL)
    }
}

/// Measurements of an in-progress path. Two points give the segment length;
/// three or more are measured as a closed ring.
pub fn live_metrics(path: &[GeoPoint]) -> LiveMetrics {
    let ring = Ring::new(path.iter().copied());
    let vertex_count = ring.len();
    match ring.points() {
        [a, b] => LiveMetrics {
            area_m2: 0.0,
            perimeter_m: round_to_precision(
                Haversine.distance(a.to_point(), b.to_point()),
                Precision::Measurement,
            ),
            vertex_count,
        },
        points if points.len() >= 3 => {
            let m = geometry::measure(&ring);
            LiveMetrics {
                area_m2: m.area_m2,
                perimeter_m: m.perimeter_m,
                vertex_count,
            }
        }
        _ => LiveMetrics {
            vertex_count,
            ..LiveMetrics::default()
        },
    }
}

/// Turn a draft into a zone shape with a fresh id.
pub fn build_zone(draft: &ZoneDraft) -> Result<Shape, GeometryError> {
    geometry::validate_ring(&draft.ring, "zone commit", &draft.name)?;
    Ok(Shape::zone(
        generate_shape_id("zone"),
        draft.ring.clone(),
        draft.name.clone(),
        draft.kind,
    ))
}

/// The state/event table for drawing one zone at a time.
#[derive(Debug, Default)]
pub struct ZoneDrawingStateMachine {
    session: Option<ZoneDrawSession>,
    next_session: u64,
    next_ticket: u64,
    pending: Option<EffectTicket>,
    throttle: MetricsThrottle,
}

impl ZoneDrawingStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_metrics_interval(interval: Duration) -> Self {
        Self {
            throttle: MetricsThrottle::new(interval),
            ..Self::default()
        }
    }

    pub fn state(&self) -> DrawState {
        self.session.as_ref().map_or(DrawState::Idle, |s| s.state)
    }

    /// The active session; `None` while idle.
    pub fn session(&self) -> Option<&ZoneDrawSession> {
        self.session.as_ref()
    }

    pub fn handle(&mut self, event: DrawEvent, shapes: &ShapeCollection) -> Transition {
        let from = self.state();
        let name = event.name();
        let transition = match (from, event) {
            (DrawState::Idle, DrawEvent::StartDraw) => {
                self.next_session += 1;
                let mut session = ZoneDrawSession::new(self.next_session, DrawState::Drawing);
                if shapes.boundary().is_none() {
                    session.state = DrawState::Error;
                    session.error_message =
                        Some("Draw a project boundary before adding zones".to_string());
                }
                self.throttle.reset();
                self.session = Some(session);
                self.moved(from)
            }

            (DrawState::Drawing, DrawEvent::Complete(path)) => {
                let ring = Ring::new(path);
                let metrics = live_metrics(ring.points());
                self.with_session(|s| {
                    s.current_path = ring.points().to_vec();
                    s.live_metrics = metrics;
                    s.validation_result = None;
                    s.state = DrawState::Preview;
                });
                self.moved(from)
            }

            (DrawState::Drawing | DrawState::Preview, DrawEvent::Cancel) => {
                self.session = None;
                self.pending = None;
                self.moved(from)
            }

            (DrawState::Preview, DrawEvent::Validate) => {
                let ticket = self.issue_ticket();
                let ring = self.current_ring();
                self.set_state(DrawState::Validating);
                Transition {
                    effect: Some(DrawEffect::Validate { ticket, ring }),
                    ..self.moved(from)
                }
            }

            (DrawState::Validating, DrawEvent::Cancel) => {
                self.pending = None;
                self.set_state(DrawState::Preview);
                self.moved(from)
            }

            (DrawState::Preview, DrawEvent::Save { .. })
                if !self.session.as_ref().is_some_and(|s| s.is_validated()) =>
            {
                Transition::ignored(from)
            }

            (DrawState::Preview | DrawState::Dialog, DrawEvent::Save { name, kind }) => {
                let ticket = self.issue_ticket();
                let draft = ZoneDraft {
                    ring: self.current_ring(),
                    name,
                    kind,
                };
                self.set_state(DrawState::Committing);
                Transition {
                    effect: Some(DrawEffect::Commit { ticket, draft }),
                    ..self.moved(from)
                }
            }

            (DrawState::Dialog, DrawEvent::Cancel) => {
                self.set_state(DrawState::Preview);
                self.moved(from)
            }

            (DrawState::Error, DrawEvent::Reset) => {
                self.session = None;
                self.pending = None;
                self.moved(from)
            }

            (state, DrawEvent::Error(message)) if state != DrawState::Idle && state != DrawState::Error => {
                self.fail(message);
                self.moved(from)
            }

            (state, _) => Transition::ignored(state),
        };

        if transition.accepted {
            tracing::debug!(event = name, from = %transition.from, to = %transition.to, "Draw transition");
        } else {
            tracing::debug!(event = name, state = %from, "Ignoring draw event");
        }
        transition
    }

    /// Replace the in-progress path while drawing. Returns metrics when an
    /// emission is due.
    pub fn update_path(&mut self, path: Vec<GeoPoint>, now: Instant) -> Option<LiveMetrics> {
        let session = self.session.as_mut().filter(|s| s.state == DrawState::Drawing)?;
        let points: Vec<GeoPoint> = path.into_iter().map(GeoPoint::normalized).collect();
        session.live_metrics = live_metrics(&points);
        session.current_path = points;
        let metrics = session.live_metrics;
        self.throttle.ready(now).then_some(metrics)
    }

    pub fn resolve_validation(&mut self, ticket: EffectTicket, result: ZoneValidationResult) -> Transition {
        let from = self.state();
        if from != DrawState::Validating || self.pending != Some(ticket) {
            tracing::debug!(state = %from, "Discarding stale validation result");
            return Transition::ignored(from);
        }
        self.pending = None;
        let valid = result.is_valid;
        let message = result.message();
        self.with_session(|s| {
            s.validation_result = Some(result);
            if valid {
                s.state = DrawState::Dialog;
            } else {
                s.state = DrawState::Error;
                s.error_message = Some(message);
            }
        });
        self.moved(from)
    }

    pub fn resolve_commit<E: fmt::Display>(&mut self, ticket: EffectTicket, outcome: Result<&Shape, E>) -> Transition {
        let from = self.state();
        if from != DrawState::Committing || self.pending != Some(ticket) {
            tracing::debug!(state = %from, "Discarding stale commit result");
            return Transition::ignored(from);
        }
        self.pending = None;
        match outcome {
            Ok(shape) => {
                tracing::info!(shape_id = %shape.id, area_m2 = shape.area, "Committed zone");
                self.session = None;
            }
            Err(e) => self.fail(e.to_string()),
        }
        self.moved(from)
    }

    fn moved(&self, from: DrawState) -> Transition {
        Transition {
            from,
            to: self.state(),
            effect: None,
            accepted: true,
        }
    }

    fn fail(&mut self, message: String) {
        self.pending = None;
        tracing::warn!(error = %message, "Zone drawing failed");
        self.with_session(|s| {
            s.state = DrawState::Error;
            s.error_message = Some(message);
        });
    }

    fn issue_ticket(&mut self) -> EffectTicket {
        self.next_ticket += 1;
        let ticket = EffectTicket(self.next_ticket);
        self.pending = Some(ticket);
        ticket
    }

    fn current_ring(&self) -> Ring {
        self.session
            .as_ref()
            .map(|s| Ring::new(s.current_path.iter().copied()))
            .unwrap_or_default()
    }

    fn set_state(&mut self, state: DrawState) {
        self.with_session(|s| s.state = state);
    }

    fn with_session(&mut self, edit: impl FnOnce(&mut ZoneDrawSession)) {
        if let Some(session) = self.session.as_mut() {
            edit(session);
        }
    }
}

/// Failure while running a commit effect.
#[derive(Debug, thiserror::Error)]
pub enum CommitError {
    #[error(transparent)]
    Geometry(#[from] GeometryError),

    #[error(transparent)]
    Collection(#[from] CollectionError),
}

/// Outcome of one [`ZoneWorkflow::dispatch`].
#[derive(Debug)]
pub struct WorkflowStep {
    pub transition: Transition,
    /// The collection with the new zone, after a successful commit.
    pub collection: Option<ShapeCollection>,
    pub committed: Option<Shape>,
}

/// Drawing machine wired to local validation and commit.
#[derive(Debug, Default)]
pub struct ZoneWorkflow {
    machine: ZoneDrawingStateMachine,
    engine: ZoneValidationEngine,
}

impl ZoneWorkflow {
    pub fn new(engine: ZoneValidationEngine) -> Self {
        Self {
            machine: ZoneDrawingStateMachine::new(),
            engine,
        }
    }

    pub fn machine(&self) -> &ZoneDrawingStateMachine {
        &self.machine
    }

    pub fn update_path(&mut self, path: Vec<GeoPoint>, now: Instant) -> Option<LiveMetrics> {
        self.machine.update_path(path, now)
    }

    /// Feed an event and run any resulting effect to completion.
    pub fn dispatch(&mut self, event: DrawEvent, shapes: &ShapeCollection) -> WorkflowStep {
        let mut first = self.machine.handle(event, shapes);
        let from = first.from;
        let (last, collection, committed) = match first.effect.take() {
            Some(DrawEffect::Validate { ticket, ring }) => {
                let result = self.engine.validate_in(shapes, &ring, None);
                (self.machine.resolve_validation(ticket, result), None, None)
            }
            Some(DrawEffect::Commit { ticket, draft }) => {
                match commit(&draft, shapes) {
                    Ok((zone, next)) => {
                        let t = self.machine.resolve_commit::<CommitError>(ticket, Ok(&zone));
                        (t, Some(next), Some(zone))
                    }
                    Err(e) => (self.machine.resolve_commit::<CommitError>(ticket, Err(e)), None, None),
                }
            }
            None => (first, None, None),
        };
        WorkflowStep {
            transition: Transition {
                from,
                effect: None,
                ..last
            },
            collection,
            committed,
        }
    }
}

fn commit(draft: &ZoneDraft, shapes: &ShapeCollection) -> Result<(Shape, ShapeCollection), CommitError> {
    let zone = build_zone(draft)?;
    let next = shapes.with_shape(zone.clone())?;
    Ok((zone, next))
}
