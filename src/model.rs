/*
 * SPDX-FileCopyrightText: © 2025 Jinwoo Park (pmnxis@gmail.com)
 *
 * SPDX-License-Identifier: MIT
 */

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One recognised text line from the local OCR model: box corners, text, confidence.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OcrLine {
    pub bbox: [(u32, u32); 4],
    pub text: String,
    pub confidence: f32,
}

impl OcrLine {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            bbox: [(0, 0); 4],
            text: text.into(),
            confidence: 1.0,
        }
    }
}

/// Raw output of an extraction adapter, before normalisation.
///
/// Serialised as `{"source": "...", "payload": ...}` into the history audit column.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", content = "payload", rename_all = "snake_case")]
pub enum RawPayload {
    /// PromptPay QR text
    Qr(String),
    /// Remote receipt-OCR response body, verbatim
    RemoteOcr(serde_json::Value),
    /// Local OCR line results in reading order
    LocalOcr(Vec<OcrLine>),
}

impl RawPayload {
    pub fn source(&self) -> SlipSource {
        match self {
            RawPayload::Qr(_) => SlipSource::Qr,
            RawPayload::RemoteOcr(_) => SlipSource::RemoteOcr,
            RawPayload::LocalOcr(_) => SlipSource::LocalOcr,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlipSource {
    Qr,
    RemoteOcr,
    LocalOcr,
}

impl std::fmt::Display for SlipSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SlipSource::Qr => write!(f, "qr"),
            SlipSource::RemoteOcr => write!(f, "remote-ocr"),
            SlipSource::LocalOcr => write!(f, "local-ocr"),
        }
    }
}

/// Canonical payment extracted from a receipt. Every field may be absent.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PaymentRecord {
    pub issuer_name: Option<String>,
    pub receiver_name: Option<String>,
    pub amount: Option<Decimal>,
    /// 13-character PromptPay identifier from the QR payload
    pub promptpay: Option<String>,
    /// Raw payloads this record was built from, kept for audit
    pub sources: Vec<RawPayload>,
}

impl PaymentRecord {
    pub fn is_empty(&self) -> bool {
        self.issuer_name.is_none()
            && self.receiver_name.is_none()
            && self.amount.is_none()
            && self.promptpay.is_none()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub is_valid: bool,
    pub is_verified: bool,
}

/// Per-file outcome returned from an upload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SlipResult {
    pub filename: String,
    pub valid: bool,
    pub verified: bool,
    #[serde(with = "rust_decimal::serde::float_option")]
    pub amount: Option<Decimal>,
    pub promptpay: Option<String>,
    pub issuer_name: Option<String>,
    pub receiver_name: Option<String>,
    /// Set when processing this file failed outright
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
    /// Payloads the record was built from; recorded in history, not echoed back
    #[serde(skip)]
    pub source_raw: Vec<RawPayload>,
}

impl SlipResult {
    pub fn from_record(filename: &str, record: &PaymentRecord, verdict: Verdict) -> Self {
        Self {
            filename: filename.to_string(),
            valid: verdict.is_valid,
            verified: verdict.is_verified,
            amount: record.amount,
            promptpay: record.promptpay.clone(),
            issuer_name: record.issuer_name.clone(),
            receiver_name: record.receiver_name.clone(),
            error: None,
            source_raw: record.sources.clone(),
        }
    }

    pub fn failed(filename: &str, error: impl Into<String>) -> Self {
        Self {
            filename: filename.to_string(),
            valid: false,
            verified: false,
            amount: None,
            promptpay: None,
            issuer_name: None,
            receiver_name: None,
            error: Some(error.into()),
            source_raw: Vec::new(),
        }
    }
}

/// Persisted history row, newest first when listed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SlipHistoryEntry {
    pub filename: String,
    #[serde(with = "rust_decimal::serde::float_option")]
    pub amount: Option<Decimal>,
    pub promptpay: Option<String>,
    pub status: bool,
    pub verified: bool,
    pub issuer_name: Option<String>,
    pub receiver_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
    /// Raw extraction payloads, for audit
    #[serde(default)]
    pub source_raw: Vec<RawPayload>,
    pub created_at: DateTime<Utc>,
}

impl SlipHistoryEntry {
    pub fn from_result(result: &SlipResult, created_at: DateTime<Utc>) -> Self {
        Self {
            filename: result.filename.clone(),
            amount: result.amount,
            promptpay: result.promptpay.clone(),
            status: result.valid,
            verified: result.verified,
            issuer_name: result.issuer_name.clone(),
            receiver_name: result.receiver_name.clone(),
            error: result.error.clone(),
            source_raw: result.source_raw.clone(),
            created_at,
        }
    }
}

/// Uploaded file waiting to be processed
#[derive(Clone, Debug)]
pub struct PendingImage {
    pub filename: String,
    pub bytes: Vec<u8>,
}
