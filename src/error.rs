/*
 * SPDX-FileCopyrightText: © 2025 Jinwoo Park (pmnxis@gmail.com)
 *
 * SPDX-License-Identifier: MIT
 */

//! Error types. Extraction errors never leave the pipeline; store errors do.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use rust_decimal::Decimal;
use serde_json::json;
use thiserror::Error;

/// Failure of a single extraction adapter call
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("image decode error: {0}")]
    Image(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("OCR service returned {status}: {body}")]
    Service { status: u16, body: String },

    #[error("OCR timed out")]
    Timeout,

    #[error("OCR model error: {0}")]
    Model(String),

    /// Backend selected without the settings it needs
    #[error("OCR backend misconfigured: {0}")]
    Config(String),

    /// Adapter ran fine but found nothing usable (no PromptPay QR, no text)
    #[error("no payload found")]
    NoPayload,
}

impl ExtractionError {
    /// A miss is an expected outcome and does not mark the slip as failed.
    pub fn is_miss(&self) -> bool {
        matches!(self, ExtractionError::NoPayload)
    }
}

impl From<image::ImageError> for ExtractionError {
    fn from(e: image::ImageError) -> Self {
        ExtractionError::Image(e.to_string())
    }
}

impl From<reqwest::Error> for ExtractionError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ExtractionError::Timeout
        } else {
            ExtractionError::Transport(e.to_string())
        }
    }
}

/// Malformed field inside an otherwise successful payload
#[derive(Debug, Error, PartialEq)]
pub enum ParseAnomaly {
    #[error("invalid length field '{0}'")]
    BadLength(String),

    #[error("invalid amount '{0}'")]
    BadAmount(String),
}

/// Ledger contents the balance math cannot work with
#[derive(Debug, Error, PartialEq)]
pub enum LedgerError {
    #[error("item {index} has negative price {price}")]
    NegativePrice { index: usize, price: Decimal },

    #[error("balance of '{0}' is out of range")]
    Overflow(String),
}

/// Persistence failure on slip history or the ledger snapshot
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("stored ledger is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config file: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// HTTP-level error
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Storage failure: {0}")]
    Store(#[from] StoreError),

    #[error("Stored ledger unusable: {0}")]
    Ledger(#[from] LedgerError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            ApiError::Store(_) => (StatusCode::INTERNAL_SERVER_ERROR, "STORAGE_ERROR"),
            ApiError::Ledger(_) => (StatusCode::UNPROCESSABLE_ENTITY, "LEDGER_INVALID"),
        };
        if let ApiError::Store(e) = &self {
            log::error!("Request failed on storage: {}", e);
        }

        let body = Json(json!({
            "error": {
                "code": code,
                "message": self.to_string(),
            }
        }));

        (status, body).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
