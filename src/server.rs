/*
 * SPDX-FileCopyrightText: © 2025 Jinwoo Park (pmnxis@gmail.com)
 *
 * SPDX-License-Identifier: MIT
 */

//! HTTP surface over the pipeline and the store.

use std::collections::BTreeMap;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{DefaultBodyLimit, Multipart, State},
    http::header,
    response::IntoResponse,
    routing::{get, post},
};
use rust_decimal::prelude::ToPrimitive;
use serde_json::{Value, json};
use tower_http::cors::CorsLayer;

use crate::error::{ApiError, ApiResult};
use crate::ledger::{LedgerSnapshot, Transfer};
use crate::model::{PendingImage, SlipHistoryEntry};
use crate::pipeline::Pipeline;
use crate::store::{EMPTY_LEDGER_JSON, Store};

/// Shared by every handler
#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub pipeline: Pipeline,
    pub history_limit: u32,
}

impl AppState {
    pub fn new(store: Store, pipeline: Pipeline, history_limit: u32) -> Self {
        Self {
            store,
            pipeline,
            history_limit,
        }
    }
}

pub fn build_router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/slip/upload", post(upload_slips))
        .route("/api/slip/history", get(slip_history))
        .route("/api/state/save", post(save_state))
        .route("/api/state/load", get(load_state))
        .route("/api/state/balances", get(balances))
        .route("/api/state/settlement", get(settlement))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Multipart upload, one or more `files` parts
async fn upload_slips(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<Json<Value>> {
    let mut images = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.to_string()))?
    {
        if !matches!(field.name(), Some("files") | Some("file")) {
            continue;
        }
        let filename = field
            .file_name()
            .map(str::to_string)
            .unwrap_or_else(|| format!("upload-{}", images.len() + 1));
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(e.to_string()))?;
        images.push(PendingImage {
            filename,
            bytes: bytes.to_vec(),
        });
    }

    if images.is_empty() {
        return Err(ApiError::BadRequest("no files in upload".into()));
    }
    log::info!("Received {} slip(s)", images.len());

    let results = state.pipeline.run_upload(&state.store, images).await?;
    Ok(Json(json!({ "results": results })))
}

async fn slip_history(State(state): State<AppState>) -> ApiResult<Json<Vec<SlipHistoryEntry>>> {
    Ok(Json(state.store.recent_history(state.history_limit).await?))
}

/// Store the body verbatim once it parses as a ledger.
async fn save_state(State(state): State<AppState>, body: Bytes) -> ApiResult<Json<Value>> {
    let raw = std::str::from_utf8(&body)
        .map_err(|_| ApiError::BadRequest("body is not UTF-8".into()))?;
    let value: Value =
        serde_json::from_str(raw).map_err(|e| ApiError::BadRequest(e.to_string()))?;
    if !value.is_object() {
        return Err(ApiError::BadRequest("ledger must be a JSON object".into()));
    }
    let ledger: LedgerSnapshot =
        serde_json::from_value(value).map_err(|e| ApiError::BadRequest(e.to_string()))?;
    ledger
        .validate()
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    state.store.save_ledger(raw).await?;
    Ok(Json(json!({ "status": "ok" })))
}

async fn load_state(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let raw = state
        .store
        .load_ledger_raw()
        .await?
        .unwrap_or_else(|| EMPTY_LEDGER_JSON.to_string());
    Ok(([(header::CONTENT_TYPE, "application/json")], raw))
}

async fn balances(State(state): State<AppState>) -> ApiResult<Json<BTreeMap<String, f64>>> {
    let ledger = state.store.load_ledger().await?.unwrap_or_default();
    let balances = ledger
        .net_balances()?
        .into_iter()
        .map(|(name, balance)| (name, balance.round_dp(2).to_f64().unwrap_or_default()))
        .collect();
    Ok(Json(balances))
}

async fn settlement(State(state): State<AppState>) -> ApiResult<Json<Vec<Transfer>>> {
    let ledger = state.store.load_ledger().await?.unwrap_or_default();
    Ok(Json(ledger.settlement_plan()?))
}
