/*
 * SPDX-FileCopyrightText: © 2025 Jinwoo Park (pmnxis@gmail.com)
 *
 * SPDX-License-Identifier: MIT
 */

//! Shared helpers: scripted extractors and slip fixtures.

#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use slipcheck::error::ExtractionError;
use slipcheck::extract::Extractor;
use slipcheck::model::{PendingImage, RawPayload};
use slipcheck::pipeline::Pipeline;

/// Participants A and B split 100 paid by A, so B owes 50.
pub const LEDGER_A_PAID_100: &str = r#"{
    "payers": [{"name": "A"}, {"name": "B", "promptpay": "0812345678"}],
    "items": [{"name": "dinner", "price": 100, "paidBy": "A", "splitWith": {"A": true, "B": true}}]
}"#;

/// PromptPay payload for mobile 081-234-5678 carrying `amount`.
pub fn promptpay_qr(amount: &str) -> String {
    format!(
        "00020101021129370016A000000677010111011300668123456785802TH530376454{:02}{}6304ABCD",
        amount.len(),
        amount
    )
}

/// Reads instructions from the image bytes instead of pixels:
/// `qr:<amount>` yields a PromptPay payload, `broken` a transport error,
/// `panic` panics, anything else is a miss.
pub struct ScriptedQr;

#[async_trait]
impl Extractor for ScriptedQr {
    fn name(&self) -> &'static str {
        "qr"
    }

    async fn extract(&self, image: &[u8]) -> Result<RawPayload, ExtractionError> {
        let text = String::from_utf8_lossy(image);
        if let Some(amount) = text.strip_prefix("qr:") {
            return Ok(RawPayload::Qr(promptpay_qr(amount)));
        }
        match text.as_ref() {
            "broken" => Err(ExtractionError::Transport("connection reset".into())),
            "panic" => panic!("decoder blew up"),
            _ => Err(ExtractionError::NoPayload),
        }
    }
}

/// `slip:<issuer>,<receiver>,<amount>` becomes a remote OCR response;
/// `broken` is a service error, anything else a miss.
pub struct ScriptedOcr;

#[async_trait]
impl Extractor for ScriptedOcr {
    fn name(&self) -> &'static str {
        "remote-ocr"
    }

    async fn extract(&self, image: &[u8]) -> Result<RawPayload, ExtractionError> {
        let text = String::from_utf8_lossy(image);
        if let Some(fields) = text.strip_prefix("slip:") {
            let parts: Vec<&str> = fields.split(',').collect();
            return Ok(RawPayload::RemoteOcr(json!({
                "processed": {
                    "issuerName": parts.first().copied().unwrap_or_default(),
                    "customerName": parts.get(1).copied().unwrap_or_default(),
                    "grandTotal": parts.get(2).copied().unwrap_or_default(),
                }
            })));
        }
        match text.as_ref() {
            "broken" => Err(ExtractionError::Service {
                status: 502,
                body: "bad gateway".into(),
            }),
            _ => Err(ExtractionError::NoPayload),
        }
    }
}

pub fn scripted_pipeline() -> Pipeline {
    Pipeline::new(Arc::new(ScriptedQr), Some(Arc::new(ScriptedOcr)))
}

pub fn image(filename: &str, content: &str) -> PendingImage {
    PendingImage {
        filename: filename.into(),
        bytes: content.as_bytes().to_vec(),
    }
}
