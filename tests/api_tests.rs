// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! HTTP API tests driven through the router.

use axum::http::StatusCode;
use serde_json::json;
use siteplan_engine::models::{Shape, ShapeKind, ZoneKind};
use tower::ServiceExt;

mod common;
use common::{create_test_app, empty_request, json_request, read_json, rect, ring_json, site_boundary};

fn shape_json(shape: &Shape) -> serde_json::Value {
    serde_json::to_value(shape).unwrap()
}

#[tokio::test]
async fn test_health_check() {
    let (app, _) = create_test_app();
    let response = app.oneshot(empty_request("GET", "/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_json(response).await["status"], "ok");
}

// ─── Geometry ────────────────────────────────────────────────

#[tokio::test]
async fn test_measure() {
    let (app, _) = create_test_app();
    let body = json!({ "ring": ring_json(&rect(0.0, 0.0, 100.0, 50.0)) });
    let response = app
        .oneshot(json_request("POST", "/api/geometry/measure", body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = read_json(response).await;
    let area = json["area_m2"].as_f64().unwrap();
    assert!((area - 5000.0).abs() < 50.0);
}

#[tokio::test]
async fn test_buffer_returns_buffer_shape() {
    let (app, _) = create_test_app();
    let body = json!({ "shape": shape_json(&site_boundary()), "distance_m": -10.0 });
    let response = app
        .oneshot(json_request("POST", "/api/geometry/buffer", body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = read_json(response).await;
    assert_eq!(json["kind"]["type"], "buffer");
    assert_eq!(json["kind"]["original_shape_id"], "site");
}

#[tokio::test]
async fn test_collapsed_buffer_is_unprocessable() {
    let (app, _) = create_test_app();
    let body = json!({ "shape": shape_json(&site_boundary()), "distance_m": -150.0 });
    let response = app
        .oneshot(json_request("POST", "/api/geometry/buffer", body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let json = read_json(response).await;
    assert_eq!(json["error"], "geometry_error");
    assert!(json["details"].as_str().unwrap().contains("site"));
}

#[tokio::test]
async fn test_union_of_disjoint_shapes_is_null() {
    let (app, _) = create_test_app();
    let a = Shape::boundary("a", rect(0.0, 0.0, 10.0, 10.0));
    let b = Shape::boundary("b", rect(50.0, 0.0, 10.0, 10.0));
    let response = app
        .oneshot(json_request(
            "POST",
            "/api/geometry/union",
            json!({ "a": shape_json(&a), "b": shape_json(&b) }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(read_json(response).await["shape"].is_null());
}

#[tokio::test]
async fn test_difference() {
    let (app, _) = create_test_app();
    let a = Shape::boundary("a", rect(0.0, 0.0, 50.0, 50.0));
    let b = Shape::boundary("b", rect(25.0, 0.0, 50.0, 50.0));
    let response = app
        .oneshot(json_request(
            "POST",
            "/api/geometry/difference",
            json!({ "minuend": shape_json(&a), "subtrahend": shape_json(&b) }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = read_json(response).await;
    assert_eq!(json["shape"]["kind"]["type"], "difference_result");
    let area = json["shape"]["area"].as_f64().unwrap();
    assert!((area - 1250.0).abs() < 15.0);
}

// ─── Shapes ──────────────────────────────────────────────────

#[tokio::test]
async fn test_load_list_and_export_shapes() {
    let (app, state) = create_test_app();
    let zone = Shape::zone("homes", rect(20.0, 20.0, 60.0, 40.0), "Homes", ZoneKind::Residential);
    let body = json!([shape_json(&site_boundary()), shape_json(&zone)]);

    let response = app
        .clone()
        .oneshot(json_request("PUT", "/api/shapes", body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(state.store.snapshot().len(), 2);

    let response = app.clone().oneshot(empty_request("GET", "/api/shapes")).await.unwrap();
    let list = read_json(response).await;
    assert_eq!(list.as_array().unwrap().len(), 2);
    assert_eq!(list[1]["id"], "homes");

    let response = app
        .oneshot(empty_request("GET", "/api/shapes/geojson"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let geojson = read_json(response).await;
    assert_eq!(geojson["type"], "FeatureCollection");
    assert!(geojson["features"][1]["properties"]["area_m2"].as_f64().unwrap() > 2000.0);
}

#[tokio::test]
async fn test_load_with_two_boundaries_conflicts() {
    let (app, state) = create_test_app();
    let second = Shape::boundary("other", rect(0.0, 0.0, 10.0, 10.0));
    let body = json!([shape_json(&site_boundary()), shape_json(&second)]);
    let response = app
        .oneshot(json_request("PUT", "/api/shapes", body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert!(state.store.snapshot().is_empty());
}

#[tokio::test]
async fn test_stored_buffer_follows_ring_edit() {
    let (app, state) = create_test_app();
    state.store.replace(common::site_collection());

    let response = app
        .clone()
        .oneshot(json_request("POST", "/api/shapes/site/buffer", json!({ "distance_m": -20.0 })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let buffer_id = read_json(response).await["id"].as_str().unwrap().to_string();

    let response = app
        .oneshot(json_request(
            "PUT",
            "/api/shapes/site/ring",
            json!({ "ring": ring_json(&rect(0.0, 0.0, 300.0, 200.0)) }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let snapshot = state.store.snapshot();
    let buffer = snapshot.get(&buffer_id).unwrap();
    assert!((buffer.area - 260.0 * 160.0).abs() < 260.0 * 160.0 * 0.01);
}

#[tokio::test]
async fn test_add_and_delete_shape() {
    let (app, state) = create_test_app();
    state.store.replace(common::site_collection());

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/shapes",
            json!({
                "ring": ring_json(&rect(10.0, 10.0, 5.0, 5.0)),
                "kind": { "type": "asset", "label": "well" }
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = read_json(response).await;
    let id = created["id"].as_str().unwrap().to_string();
    assert!(id.starts_with("asset"));

    let response = app
        .clone()
        .oneshot(empty_request("DELETE", &format!("/api/shapes/{}", id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(state.store.snapshot().len(), 1);

    let response = app
        .oneshot(empty_request("DELETE", &format!("/api/shapes/{}", id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_add_shape_without_boundary_conflicts() {
    let (app, state) = create_test_app();
    let zone = json!({
        "ring": ring_json(&rect(10.0, 10.0, 30.0, 30.0)),
        "kind": { "type": "zone", "name": "Park", "zone_kind": "green_space" }
    });
    let response = app
        .clone()
        .oneshot(json_request("POST", "/api/shapes", zone))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(read_json(response).await["error"], "collection_conflict");
    assert!(state.store.snapshot().is_empty());

    let boundary = json!({
        "id": "site",
        "ring": ring_json(&rect(0.0, 0.0, 200.0, 200.0)),
        "kind": { "type": "boundary" }
    });
    let response = app
        .oneshot(json_request("POST", "/api/shapes", boundary))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    assert!(state.store.snapshot().boundary().is_some());
}

#[tokio::test]
async fn test_editing_a_buffer_directly_conflicts() {
    let (app, state) = create_test_app();
    let boundary = site_boundary();
    let buffer = siteplan_engine::services::geometry::buffer(&boundary, -10.0).unwrap();
    let buffer_id = buffer.id.clone();
    state.store.replace(
        common::site_collection()
            .with_shape(buffer)
            .unwrap(),
    );

    let response = app
        .oneshot(json_request(
            "PUT",
            &format!("/api/shapes/{}/ring", buffer_id),
            json!({ "ring": ring_json(&rect(0.0, 0.0, 10.0, 10.0)) }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert!(matches!(
        state.store.snapshot().get(&buffer_id).map(|s| &s.kind),
        Some(ShapeKind::Buffer { .. })
    ));
}

// ─── Zones ───────────────────────────────────────────────────

#[tokio::test]
async fn test_validate_zone_reports_reasons() {
    let (app, state) = create_test_app();
    state.store.replace(common::site_collection());
    let body = json!({ "ring": ring_json(&rect(190.0, 10.0, 20.0, 3.0)) });
    let response = app
        .oneshot(json_request("POST", "/api/zones/validate", body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = read_json(response).await;
    assert_eq!(json["is_valid"], false);
    assert_eq!(json["reasons"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_zone_kinds() {
    let (app, _) = create_test_app();
    let response = app
        .oneshot(empty_request("GET", "/api/zones/kinds"))
        .await
        .unwrap();
    let kinds = read_json(response).await;
    assert!(kinds.as_array().unwrap().contains(&json!("green_space")));
}

// ─── Terrain ─────────────────────────────────────────────────

#[tokio::test]
async fn test_terrain_grid_with_summary() {
    let (app, state) = create_test_app();
    state.store.replace(
        siteplan_engine::services::ShapeCollection::new()
            .with_shape(Shape::boundary("site", rect(0.0, 0.0, 100.0, 100.0)))
            .unwrap(),
    );
    let response = app
        .oneshot(json_request(
            "POST",
            "/api/terrain/grid",
            json!({ "shape_id": "site", "resolution_m": 10.0, "threshold_percent": 8.0 }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = read_json(response).await;
    assert_eq!(json["grid"]["cells"].as_array().unwrap().len(), 100);
    assert_eq!(json["summary"]["steep_cells"], 100);
    assert_eq!(json["summary"]["missing_cells"], 0);
}

#[tokio::test]
async fn test_terrain_grid_unknown_shape() {
    let (app, _) = create_test_app();
    let response = app
        .oneshot(json_request("POST", "/api/terrain/grid", json!({ "shape_id": "nope" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_terrain_outage_still_returns_grid() {
    let (app, state) = common::create_test_app_with(common::OfflineSampler);
    state.store.replace(common::site_collection());
    let response = app
        .oneshot(json_request(
            "POST",
            "/api/terrain/grid",
            json!({ "shape_id": "site", "resolution_m": 50.0 }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = read_json(response).await;
    assert_eq!(json["summary"]["finite_cells"], 0);
    assert!(json["grid"]["cells"][0]["slope"].is_null());
}

#[tokio::test]
async fn test_terrain_invalid_resolution() {
    let (app, state) = create_test_app();
    state.store.replace(common::site_collection());
    let response = app
        .oneshot(json_request(
            "POST",
            "/api/terrain/grid",
            json!({ "shape_id": "site", "resolution_m": 0.0 }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(read_json(response).await["error"], "grid_error");
}
