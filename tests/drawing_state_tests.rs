// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Zone drawing state machine and the synchronous workflow.

use siteplan_engine::models::{DrawState, GeoPoint, ShapeKind, ZoneKind, ZoneValidationResult};
use siteplan_engine::services::drawing::{DrawEffect, DrawEvent, ZoneDrawingStateMachine, ZoneWorkflow};
use siteplan_engine::services::{ShapeCollection, ZoneValidationEngine};
use std::time::{Duration, Instant};

mod common;
use common::{rect, site_collection};

fn path(east: f64, north: f64, width: f64, height: f64) -> Vec<GeoPoint> {
    rect(east, north, width, height).points().to_vec()
}

fn save(name: &str) -> DrawEvent {
    DrawEvent::Save {
        name: name.to_string(),
        kind: ZoneKind::GreenSpace,
    }
}

/// Drive a machine to `validating`, returning the validate ticket.
fn validating(machine: &mut ZoneDrawingStateMachine, shapes: &ShapeCollection) -> DrawEffect {
    machine.handle(DrawEvent::StartDraw, shapes);
    machine.handle(DrawEvent::Complete(path(20.0, 20.0, 40.0, 40.0)), shapes);
    machine
        .handle(DrawEvent::Validate, shapes)
        .effect
        .expect("validate effect")
}

fn valid_result() -> ZoneValidationResult {
    ZoneValidationResult::from_reasons(vec![], Default::default())
}

#[test]
fn test_save_in_idle_is_a_no_op() {
    let shapes = site_collection();
    let mut machine = ZoneDrawingStateMachine::new();
    let t = machine.handle(save("park"), &shapes);
    assert!(!t.accepted);
    assert_eq!(machine.state(), DrawState::Idle);
    assert!(machine.session().is_none());
}

#[test]
fn test_start_draw_twice_keeps_one_session() {
    let shapes = site_collection();
    let mut machine = ZoneDrawingStateMachine::new();
    assert!(machine.handle(DrawEvent::StartDraw, &shapes).accepted);
    let id = machine.session().map(|s| s.id);

    let second = machine.handle(DrawEvent::StartDraw, &shapes);
    assert!(!second.accepted);
    assert_eq!(machine.state(), DrawState::Drawing);
    assert_eq!(machine.session().map(|s| s.id), id);
}

#[test]
fn test_start_without_boundary_enters_error_then_resets() {
    let mut machine = ZoneDrawingStateMachine::new();
    let empty = ShapeCollection::new();
    assert_eq!(machine.handle(DrawEvent::StartDraw, &empty).to, DrawState::Error);
    assert!(machine
        .session()
        .and_then(|s| s.error_message.as_deref())
        .is_some_and(|m| m.contains("boundary")));

    assert!(!machine.handle(DrawEvent::Cancel, &empty).accepted);
    assert_eq!(machine.handle(DrawEvent::Reset, &empty).to, DrawState::Idle);
}

#[test]
fn test_complete_and_cancel_from_preview() {
    let shapes = site_collection();
    let mut machine = ZoneDrawingStateMachine::new();
    machine.handle(DrawEvent::StartDraw, &shapes);
    let t = machine.handle(DrawEvent::Complete(path(20.0, 20.0, 40.0, 40.0)), &shapes);
    assert_eq!((t.from, t.to), (DrawState::Drawing, DrawState::Preview));
    let session = machine.session().unwrap();
    assert_eq!(session.current_path.len(), 4);
    assert_eq!(session.live_metrics.vertex_count, 4);
    common::assert_close(session.live_metrics.area_m2, 1600.0, 0.01);

    assert_eq!(machine.handle(DrawEvent::Cancel, &shapes).to, DrawState::Idle);
    assert!(machine.session().is_none());
}

#[test]
fn test_save_from_preview_requires_validation() {
    let shapes = site_collection();
    let mut machine = ZoneDrawingStateMachine::new();
    machine.handle(DrawEvent::StartDraw, &shapes);
    machine.handle(DrawEvent::Complete(path(20.0, 20.0, 40.0, 40.0)), &shapes);
    assert!(!machine.handle(save("park"), &shapes).accepted);
    assert_eq!(machine.state(), DrawState::Preview);
}

#[test]
fn test_validation_success_opens_dialog_and_commits() {
    let shapes = site_collection();
    let mut machine = ZoneDrawingStateMachine::new();
    let DrawEffect::Validate { ticket, ring } = validating(&mut machine, &shapes) else {
        panic!("expected validate effect");
    };
    assert_eq!(ring.len(), 4);

    let t = machine.resolve_validation(ticket, valid_result());
    assert_eq!(t.to, DrawState::Dialog);

    // Back to preview keeps the valid result, so SAVE is allowed there too.
    assert_eq!(machine.handle(DrawEvent::Cancel, &shapes).to, DrawState::Preview);
    let t = machine.handle(save("park"), &shapes);
    assert_eq!(t.to, DrawState::Committing);
    let Some(DrawEffect::Commit { ticket, draft }) = t.effect else {
        panic!("expected commit effect");
    };
    assert_eq!(draft.name, "park");

    let zone = siteplan_engine::services::drawing::build_zone(&draft).unwrap();
    let done = machine.resolve_commit::<String>(ticket, Ok(&zone));
    assert_eq!(done.to, DrawState::Idle);
    assert!(machine.session().is_none());
}

#[test]
fn test_validation_failure_keeps_reasons() {
    let shapes = site_collection();
    let mut machine = ZoneDrawingStateMachine::new();
    let DrawEffect::Validate { ticket, .. } = validating(&mut machine, &shapes) else {
        panic!("expected validate effect");
    };
    let failed = ZoneValidationResult::from_reasons(
        vec!["outside the boundary".to_string(), "below the minimum area".to_string()],
        Default::default(),
    );
    assert_eq!(machine.resolve_validation(ticket, failed).to, DrawState::Error);

    let session = machine.session().unwrap();
    assert_eq!(
        session.error_message.as_deref(),
        Some("outside the boundary; below the minimum area")
    );
    assert_eq!(session.validation_result.as_ref().map(|r| r.reasons.len()), Some(2));
}

#[test]
fn test_cancel_during_validation_discards_result() {
    let shapes = site_collection();
    let mut machine = ZoneDrawingStateMachine::new();
    let DrawEffect::Validate { ticket, .. } = validating(&mut machine, &shapes) else {
        panic!("expected validate effect");
    };
    assert_eq!(machine.handle(DrawEvent::Cancel, &shapes).to, DrawState::Preview);
    assert!(!machine.resolve_validation(ticket, valid_result()).accepted);

    // A second validation issues a fresh ticket; the old one stays stale.
    let Some(DrawEffect::Validate { ticket: fresh, .. }) = machine.handle(DrawEvent::Validate, &shapes).effect else {
        panic!("expected validate effect");
    };
    assert_ne!(fresh, ticket);
    assert!(!machine.resolve_validation(ticket, valid_result()).accepted);
    assert!(machine.resolve_validation(fresh, valid_result()).accepted);
}

#[test]
fn test_error_event_from_any_active_state() {
    let shapes = site_collection();
    let mut machine = ZoneDrawingStateMachine::new();
    assert!(!machine.handle(DrawEvent::Error("boom".into()), &shapes).accepted);

    validating(&mut machine, &shapes);
    let t = machine.handle(DrawEvent::Error("service down".into()), &shapes);
    assert_eq!((t.from, t.to), (DrawState::Validating, DrawState::Error));
    assert!(!machine.handle(DrawEvent::Error("again".into()), &shapes).accepted);
    assert_eq!(
        machine.session().and_then(|s| s.error_message.as_deref()),
        Some("service down")
    );
}

#[test]
fn test_failed_commit_enters_error() {
    let shapes = site_collection();
    let mut machine = ZoneDrawingStateMachine::new();
    let DrawEffect::Validate { ticket, .. } = validating(&mut machine, &shapes) else {
        panic!("expected validate effect");
    };
    machine.resolve_validation(ticket, valid_result());
    let Some(DrawEffect::Commit { ticket, .. }) = machine.handle(save("park"), &shapes).effect else {
        panic!("expected commit effect");
    };
    let t = machine.resolve_commit(ticket, Err("ring collapsed"));
    assert_eq!(t.to, DrawState::Error);
}

#[test]
fn test_live_metrics_are_throttled() {
    let shapes = site_collection();
    let mut machine = ZoneDrawingStateMachine::with_metrics_interval(Duration::from_millis(100));
    let f = common::site_frame();
    let t0 = Instant::now();

    assert!(machine.update_path(vec![f.to_geo(0.0, 0.0)], t0).is_none(), "not drawing yet");
    machine.handle(DrawEvent::StartDraw, &shapes);

    let first = machine.update_path(vec![f.to_geo(0.0, 0.0), f.to_geo(50.0, 0.0)], t0);
    assert_eq!(first.map(|m| m.vertex_count), Some(2));

    let three = vec![f.to_geo(0.0, 0.0), f.to_geo(50.0, 0.0), f.to_geo(50.0, 50.0)];
    assert!(machine.update_path(three.clone(), t0 + Duration::from_millis(30)).is_none());
    // Suppressed updates still refresh the session.
    assert_eq!(machine.session().map(|s| s.live_metrics.vertex_count), Some(3));

    let later = machine
        .update_path(three, t0 + Duration::from_millis(120))
        .expect("emission due");
    common::assert_close(later.area_m2, 1250.0, 0.01);
}

// ─── Workflow ────────────────────────────────────────────────

#[test]
fn test_workflow_commits_valid_zone() {
    let shapes = site_collection();
    let mut workflow = ZoneWorkflow::new(ZoneValidationEngine::default());
    workflow.dispatch(DrawEvent::StartDraw, &shapes);
    workflow.dispatch(DrawEvent::Complete(path(20.0, 20.0, 40.0, 40.0)), &shapes);

    let step = workflow.dispatch(DrawEvent::Validate, &shapes);
    assert_eq!((step.transition.from, step.transition.to), (DrawState::Preview, DrawState::Dialog));

    let step = workflow.dispatch(save("park"), &shapes);
    assert_eq!(step.transition.to, DrawState::Idle);
    let zone = step.committed.expect("zone committed");
    assert!(matches!(zone.kind, ShapeKind::Zone { ref name, zone_kind: ZoneKind::GreenSpace } if name == "park"));
    let next = step.collection.expect("collection updated");
    assert_eq!(next.len(), 2);
    assert!(next.get(&zone.id).is_some());
}

#[test]
fn test_workflow_rejects_zone_outside_boundary() {
    let shapes = site_collection();
    let mut workflow = ZoneWorkflow::new(ZoneValidationEngine::default());
    workflow.dispatch(DrawEvent::StartDraw, &shapes);
    workflow.dispatch(DrawEvent::Complete(path(180.0, 20.0, 40.0, 40.0)), &shapes);

    let step = workflow.dispatch(DrawEvent::Validate, &shapes);
    assert_eq!(step.transition.to, DrawState::Error);
    assert!(step.collection.is_none());
    let message = workflow
        .machine()
        .session()
        .and_then(|s| s.error_message.clone())
        .unwrap_or_default();
    assert!(message.contains("boundary"), "{message}");
}
