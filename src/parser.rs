/*
 * SPDX-FileCopyrightText: © 2025 Jinwoo Park (pmnxis@gmail.com)
 *
 * SPDX-License-Identifier: MIT
 */

//! Turn raw extraction payloads into a canonical PaymentRecord.
//! Supports 3 sources:
//! - PromptPay QR text (fixed-marker TLV scan)
//! - remote receipt-OCR JSON (`processed.issuerName` / `customerName` / `grandTotal`)
//! - local OCR lines (keyword adjacency, then honorific prefixes)
//!
//! Nothing here returns an error to the caller: every anomaly ends up as an
//! absent field in [`normalize`].

use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use rust_decimal::Decimal;

use crate::error::{ExtractionError, ParseAnomaly};
use crate::model::{OcrLine, PaymentRecord, RawPayload};

/// PromptPay QR signature: payload format indicator + currency field tag
pub const QR_FORMAT_MARKER: &str = "000201";
pub const QR_CURRENCY_MARKER: &str = "5303";

const QR_ID_MARKER: &str = "0113";
const QR_ID_LEN: usize = 13;
const QR_AMOUNT_MARKER: &str = "54";

static AMOUNT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\d,.]*\d[\d,.]*").unwrap());

/// Fields recovered from a PromptPay QR payload
#[derive(Clone, Debug, Default, PartialEq)]
pub struct QrFields {
    pub promptpay: Option<String>,
    pub amount: Option<Decimal>,
}

/// Fields recovered from OCR text or a remote OCR response
#[derive(Clone, Debug, Default, PartialEq)]
pub struct OcrFields {
    pub issuer: Option<String>,
    pub receiver: Option<String>,
    pub amount: Option<Decimal>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum Field {
    Sender,
    Receiver,
    Amount,
}

struct Cue {
    field: Field,
    keywords: &'static [&'static str],
}

/// Keyword cues, checked in this order on every line.
/// Longer keywords come first so the shorter one never cuts a longer match.
const CUES: &[Cue] = &[
    Cue {
        field: Field::Sender,
        keywords: &["จาก"],
    },
    Cue {
        field: Field::Receiver,
        keywords: &["ไปยัง", "ถึง"],
    },
    Cue {
        field: Field::Amount,
        keywords: &["จำนวนเงิน", "ยอดโอน", "amount"],
    },
];

/// Personal and organisational title prefixes on Thai slips
const HONORIFICS: &[&str] = &[
    "นางสาว", "นาง", "นาย", "น.ส.", "ด.ช.", "ด.ญ.", "บจก.", "บมจ.", "หจก.", "บริษัท", "MRS.",
    "MR.", "MS.",
];

/// Single boundary where every extraction failure becomes an absent field.
pub fn normalize(extraction: Result<RawPayload, ExtractionError>) -> PaymentRecord {
    let payload = match extraction {
        Ok(payload) => payload,
        Err(e) => {
            if e.is_miss() {
                log::debug!("Extraction found nothing");
            } else {
                log::warn!("Extraction failed: {}", e);
            }
            return PaymentRecord::default();
        }
    };

    let mut record = PaymentRecord::default();
    match &payload {
        RawPayload::Qr(text) => match parse_promptpay_qr(text) {
            Ok(fields) => {
                record.promptpay = fields.promptpay;
                record.amount = fields.amount;
            }
            Err(e) => log::debug!("PromptPay payload rejected: {}", e),
        },
        RawPayload::RemoteOcr(value) => {
            let fields = parse_remote_ocr(value);
            record.issuer_name = fields.issuer;
            record.receiver_name = fields.receiver;
            record.amount = fields.amount;
        }
        RawPayload::LocalOcr(lines) => {
            let fields = parse_ocr_lines(lines);
            record.issuer_name = fields.issuer;
            record.receiver_name = fields.receiver;
            record.amount = fields.amount;
        }
    }
    record.sources.push(payload);
    record
}

/// Combine the QR record with the OCR record of the same slip.
/// OCR names always win; the QR amount is only a fallback for a missing OCR amount.
pub fn merge(qr: PaymentRecord, ocr: PaymentRecord) -> PaymentRecord {
    let mut sources = qr.sources;
    sources.extend(ocr.sources);
    PaymentRecord {
        issuer_name: ocr.issuer_name.or(qr.issuer_name),
        receiver_name: ocr.receiver_name.or(qr.receiver_name),
        amount: ocr.amount.or(qr.amount),
        promptpay: qr.promptpay.or(ocr.promptpay),
        sources,
    }
}

/// Simplified PromptPay scan:
/// `0113` + 13-char identifier, `54` + 2-digit length + amount.
///
/// A missing `54` leaves the amount absent; a malformed length or amount
/// discards the whole payload.
pub fn parse_promptpay_qr(qr: &str) -> Result<QrFields, ParseAnomaly> {
    let promptpay = qr
        .find(QR_ID_MARKER)
        .map(|idx| clamped_slice(qr, idx + QR_ID_MARKER.len(), QR_ID_LEN))
        .transpose()?
        .filter(|id| !id.is_empty());

    let amount = match qr.find(QR_AMOUNT_MARKER) {
        Some(idx) => {
            let len_start = idx + QR_AMOUNT_MARKER.len();
            let len_field = clamped_slice(qr, len_start, 2)?;
            let len: usize = len_field
                .parse()
                .map_err(|_| ParseAnomaly::BadLength(len_field.clone()))?;
            let value = clamped_slice(qr, len_start + 2, len)?;
            if value.is_empty() {
                None
            } else {
                Some(
                    Decimal::from_str(&value)
                        .map_err(|_| ParseAnomaly::BadAmount(value.clone()))?,
                )
            }
        }
        None => None,
    };

    Ok(QrFields { promptpay, amount })
}

/// Substring of up to `len` bytes starting at `start`, clamped to the end of `s`.
fn clamped_slice(s: &str, start: usize, len: usize) -> Result<String, ParseAnomaly> {
    let end = (start + len).min(s.len());
    let start = start.min(end);
    s.get(start..end)
        .map(str::to_string)
        .ok_or_else(|| ParseAnomaly::BadLength(format!("{}..{}", start, end)))
}

/// First run of digits, commas and periods, thousands separators removed.
pub fn parse_amount(text: &str) -> Result<Decimal, ParseAnomaly> {
    let run = AMOUNT_RE
        .find(text)
        .ok_or_else(|| ParseAnomaly::BadAmount(text.to_string()))?;
    let cleaned = run.as_str().replace(',', "");
    let cleaned = cleaned.trim_end_matches('.');
    let cleaned = match cleaned.strip_prefix('.') {
        Some(fraction) => format!("0.{}", fraction),
        None => cleaned.to_string(),
    };
    Decimal::from_str(&cleaned).map_err(|_| ParseAnomaly::BadAmount(run.as_str().to_string()))
}

/// Remote OCR response: `{"processed": {"issuerName", "customerName", "grandTotal"}}`
pub fn parse_remote_ocr(value: &serde_json::Value) -> OcrFields {
    let Some(processed) = value.get("processed") else {
        return OcrFields::default();
    };

    let text_field = |key: &str| {
        processed
            .get(key)
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };

    let amount = match processed.get("grandTotal") {
        Some(serde_json::Value::String(s)) => parse_amount(s).ok(),
        Some(serde_json::Value::Number(n)) => parse_amount(&n.to_string()).ok(),
        _ => None,
    };

    OcrFields {
        issuer: text_field("issuerName"),
        receiver: text_field("customerName"),
        amount,
    }
}

/// Keyword adjacency first, honorific prefixes for names still missing.
pub fn parse_ocr_lines(lines: &[OcrLine]) -> OcrFields {
    let texts: Vec<&str> = lines.iter().map(|l| l.text.trim()).collect();
    let mut fields = parse_by_keywords(&texts);

    if fields.issuer.is_none() || fields.receiver.is_none() {
        apply_honorific_fallback(&texts, &mut fields);
    }
    fields
}

fn parse_by_keywords(texts: &[&str]) -> OcrFields {
    let mut fields = OcrFields::default();

    for (i, line) in texts.iter().enumerate() {
        for cue in CUES {
            let already = match cue.field {
                Field::Sender => fields.issuer.is_some(),
                Field::Receiver => fields.receiver.is_some(),
                Field::Amount => fields.amount.is_some(),
            };
            if already {
                continue;
            }

            let Some(value) = cue
                .keywords
                .iter()
                .find_map(|kw| value_after_keyword(texts, i, line, kw))
            else {
                continue;
            };

            match cue.field {
                Field::Sender => fields.issuer = Some(value),
                Field::Receiver => fields.receiver = Some(value),
                Field::Amount => fields.amount = parse_amount(&value).ok(),
            }
        }
    }
    fields
}

/// Value on the same line after `keyword`, or the whole next line when the
/// keyword ends its line.
fn value_after_keyword(texts: &[&str], i: usize, line: &str, keyword: &str) -> Option<String> {
    let pos = find_keyword(line, keyword)?;
    let rest = line[pos + keyword.len()..]
        .trim_start_matches(|c: char| c.is_whitespace() || matches!(c, ':' | '：' | '-' | '='))
        .trim_end();
    if !rest.is_empty() {
        return Some(rest.to_string());
    }

    texts
        .get(i + 1)
        .map(|next| next.trim())
        .filter(|next| !next.is_empty())
        .map(str::to_string)
}

/// ASCII case-insensitive search; byte offsets stay valid for the original line.
fn find_keyword(line: &str, keyword: &str) -> Option<usize> {
    line.to_ascii_lowercase()
        .find(&keyword.to_ascii_lowercase())
}

fn apply_honorific_fallback(texts: &[&str], fields: &mut OcrFields) {
    let mut candidates = texts
        .iter()
        .filter(|t| HONORIFICS.iter().any(|h| t.starts_with(h)))
        .map(|t| t.to_string());

    if fields.issuer.is_none() {
        fields.issuer = candidates.next();
    }
    if fields.receiver.is_none() {
        let sender = fields.issuer.clone();
        fields.receiver = candidates.find(|c| Some(c) != sender.as_ref());
    }
}
