/*
 * SPDX-FileCopyrightText: © 2025 Jinwoo Park (pmnxis@gmail.com)
 *
 * SPDX-License-Identifier: MIT
 */

//! HTTP routes driven through `oneshot` against an in-memory store.

mod common;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use serde_json::Value;
use tower::util::ServiceExt;

use common::{LEDGER_A_PAID_100, scripted_pipeline};
use slipcheck::pipeline::Pipeline;
use slipcheck::server::{AppState, build_router};
use slipcheck::store::Store;

const BOUNDARY: &str = "slipcheck-test-boundary";

const OVERFLOWING_LEDGER: &str = r#"{
    "payers": [{"name": "A"}, {"name": "B"}],
    "items": [
        {"price": 5e28, "paidBy": "A", "splitWith": {"B": true}},
        {"price": 5e28, "paidBy": "A", "splitWith": {"B": true}}
    ]
}"#;

async fn setup_app(pipeline: Pipeline) -> Router {
    setup_app_with_store(pipeline).await.0
}

async fn setup_app_with_store(pipeline: Pipeline) -> (Router, Store) {
    let store = Store::in_memory().await.unwrap();
    let app = build_router(AppState::new(store.clone(), pipeline, 20), 1024 * 1024);
    (app, store)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn post_json(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn post_files(files: &[(&str, &str)]) -> Request<Body> {
    let mut body = String::new();
    for (filename, content) in files {
        body.push_str(&format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"files\"; filename=\"{filename}\"\r\nContent-Type: image/jpeg\r\n\r\n{content}\r\n"
        ));
    }
    body.push_str(&format!("--{BOUNDARY}--\r\n"));

    Request::builder()
        .method("POST")
        .uri("/api/slip/upload")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

async fn body_text(body: Body) -> String {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn body_json(body: Body) -> Value {
    serde_json::from_str(&body_text(body).await).unwrap()
}

#[tokio::test]
async fn test_health() {
    let app = setup_app(Pipeline::qr_only()).await;
    let response = app.oneshot(get("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response.into_body()).await;
    assert_eq!(body["status"], "ok");
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn test_load_before_save_is_empty_object() {
    let app = setup_app(Pipeline::qr_only()).await;
    let response = app.oneshot(get("/api/state/load")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response.into_body()).await, "{}");
}

#[tokio::test]
async fn test_save_then_load_returns_same_bytes() {
    let app = setup_app(Pipeline::qr_only()).await;

    let response = app
        .clone()
        .oneshot(post_json("/api/state/save", LEDGER_A_PAID_100))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response.into_body()).await["status"], "ok");

    let response = app.oneshot(get("/api/state/load")).await.unwrap();
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "application/json"
    );
    assert_eq!(body_text(response.into_body()).await, LEDGER_A_PAID_100);
}

#[tokio::test]
async fn test_save_rejects_malformed_ledger() {
    let app = setup_app(Pipeline::qr_only()).await;
    app.clone()
        .oneshot(post_json("/api/state/save", LEDGER_A_PAID_100))
        .await
        .unwrap();

    for bad in [
        "not json",
        "[1, 2]",
        r#"{"items": [{"price": -5, "paidBy": "A"}]}"#,
        r#"{"payers": "A"}"#,
        OVERFLOWING_LEDGER,
    ] {
        let response = app
            .clone()
            .oneshot(post_json("/api/state/save", bad))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{bad}");
        let body = body_json(response.into_body()).await;
        assert_eq!(body["error"]["code"], "BAD_REQUEST");
    }

    // The previous ledger survives rejected saves
    let response = app.oneshot(get("/api/state/load")).await.unwrap();
    assert_eq!(body_text(response.into_body()).await, LEDGER_A_PAID_100);
}

#[tokio::test]
async fn test_balances_and_settlement() {
    let app = setup_app(Pipeline::qr_only()).await;
    app.clone()
        .oneshot(post_json("/api/state/save", LEDGER_A_PAID_100))
        .await
        .unwrap();

    let response = app.clone().oneshot(get("/api/state/balances")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let balances = body_json(response.into_body()).await;
    assert_eq!(balances["A"], -50.0);
    assert_eq!(balances["B"], 50.0);

    let response = app.oneshot(get("/api/state/settlement")).await.unwrap();
    let plan = body_json(response.into_body()).await;
    assert_eq!(plan.as_array().unwrap().len(), 1);
    assert_eq!(plan[0]["from"], "B");
    assert_eq!(plan[0]["to"], "A");
    assert_eq!(plan[0]["amount"], 50.0);
}

#[tokio::test]
async fn test_upload_reports_every_file_and_records_history() {
    let app = setup_app(scripted_pipeline()).await;
    app.clone()
        .oneshot(post_json("/api/state/save", LEDGER_A_PAID_100))
        .await
        .unwrap();

    let response = app
        .clone()
        .oneshot(post_files(&[
            ("paid.jpg", "slip:B,A,50.00"),
            ("broken.jpg", "broken"),
            ("qr.jpg", "qr:12.50"),
        ]))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response.into_body()).await;
    let results = body["results"].as_array().unwrap();
    assert_eq!(results.len(), 3);
    assert_eq!(results[0]["filename"], "paid.jpg");
    assert_eq!(results[0]["verified"], true);
    assert_eq!(results[0]["amount"], 50.0);
    assert!(results[1]["error"].is_string());
    assert_eq!(results[2]["valid"], true);
    assert_eq!(results[2]["verified"], false);
    assert!(results[2].get("error").is_none());

    let response = app.oneshot(get("/api/slip/history")).await.unwrap();
    let history = body_json(response.into_body()).await;
    assert_eq!(history.as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_upload_of_non_image_marks_file_failed() {
    let app = setup_app(Pipeline::qr_only()).await;
    let response = app
        .oneshot(post_files(&[("notes.txt", "definitely not a picture")]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response.into_body()).await;
    assert_eq!(body["results"][0]["valid"], false);
    assert!(body["results"][0]["error"].is_string());
}

#[tokio::test]
async fn test_upload_without_files_is_rejected() {
    let app = setup_app(Pipeline::qr_only()).await;
    let response = app.oneshot(post_files(&[])).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_out_of_range_stored_ledger_is_reported_not_crashing() {
    let (app, store) = setup_app_with_store(scripted_pipeline()).await;
    store.save_ledger(OVERFLOWING_LEDGER).await.unwrap();

    for uri in ["/api/state/balances", "/api/state/settlement"] {
        let response = app.clone().oneshot(get(uri)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY, "{uri}");
        let body = body_json(response.into_body()).await;
        assert_eq!(body["error"]["code"], "LEDGER_INVALID");
    }

    let response = app
        .oneshot(post_files(&[("paid.jpg", "slip:A,B,50.00")]))
        .await
        .unwrap();
    let body = body_json(response.into_body()).await;
    assert_eq!(body["results"][0]["valid"], true);
    assert_eq!(body["results"][0]["verified"], false);
    assert!(body["results"][0].get("error").is_none());
}
