/*
 * SPDX-FileCopyrightText: © 2025 Jinwoo Park (pmnxis@gmail.com)
 *
 * SPDX-License-Identifier: MIT
 */

//! Per-receipt processing: received → extracted → normalized → verdict → recorded.
//!
//! Files of one upload run one after another, each in its own task so a
//! failure (even a panic) in one file never takes down its siblings.

use std::sync::Arc;

use chrono::Utc;

use crate::error::{ExtractionError, StoreError};
use crate::extract::{Extractor, QrExtractor};
use crate::ledger::LedgerSnapshot;
use crate::model::{PaymentRecord, PendingImage, SlipHistoryEntry, SlipResult};
use crate::parser;
use crate::store::Store;
use crate::verify;

#[derive(Clone)]
pub struct Pipeline {
    qr: Arc<dyn Extractor>,
    text: Option<Arc<dyn Extractor>>,
}

impl Pipeline {
    pub fn new(qr: Arc<dyn Extractor>, text: Option<Arc<dyn Extractor>>) -> Self {
        Self { qr, text }
    }

    pub fn qr_only() -> Self {
        Self::new(Arc::new(QrExtractor), None)
    }

    pub fn with_text(text: Option<Arc<dyn Extractor>>) -> Self {
        Self::new(Arc::new(QrExtractor), text)
    }

    /// Process one file. Never fails: problems become absent fields or an error marker.
    pub async fn process(
        &self,
        image: &PendingImage,
        ledger: Option<&LedgerSnapshot>,
    ) -> SlipResult {
        let qr = self.qr.extract(&image.bytes).await;
        let text = match &self.text {
            Some(extractor) => Some(extractor.extract(&image.bytes).await),
            None => None,
        };

        let mut failures = Vec::new();
        collect_failure(&mut failures, self.qr.name(), &qr);
        if let (Some(extractor), Some(result)) = (&self.text, &text) {
            collect_failure(&mut failures, extractor.name(), result);
        }
        let any_payload = qr.is_ok() || text.as_ref().is_some_and(|r| r.is_ok());
        if !any_payload && !failures.is_empty() {
            let message = failures.join("; ");
            log::warn!("{}: extraction failed: {}", image.filename, message);
            return SlipResult::failed(&image.filename, message);
        }

        let qr_record = parser::normalize(qr);
        let text_record = text.map(parser::normalize).unwrap_or_default();
        let mut record = parser::merge(qr_record, text_record);

        if record.is_empty() {
            log::debug!("{}: nothing readable on this slip", image.filename);
        }
        if let Some(ledger) = ledger {
            resolve_receiver(&mut record, ledger);
        }
        let verdict = verify::verdict(&record, ledger);

        let sources: Vec<String> = record
            .sources
            .iter()
            .map(|payload| payload.source().to_string())
            .collect();
        log::info!(
            "{}: [{}] amount={:?} issuer={:?} receiver={:?} valid={} verified={}",
            image.filename,
            sources.join(","),
            record.amount,
            record.issuer_name,
            record.receiver_name,
            verdict.is_valid,
            verdict.is_verified
        );
        SlipResult::from_record(&image.filename, &record, verdict)
    }

    /// Process files in order, one result per file.
    pub async fn process_batch(
        &self,
        images: Vec<PendingImage>,
        ledger: Option<Arc<LedgerSnapshot>>,
    ) -> Vec<SlipResult> {
        let mut results = Vec::with_capacity(images.len());
        for image in images {
            results.push(self.process_isolated(image, ledger.clone()).await);
        }
        results
    }

    async fn process_isolated(
        &self,
        image: PendingImage,
        ledger: Option<Arc<LedgerSnapshot>>,
    ) -> SlipResult {
        let filename = image.filename.clone();
        let pipeline = self.clone();
        let task =
            tokio::spawn(async move { pipeline.process(&image, ledger.as_deref()).await });

        match task.await {
            Ok(result) => result,
            Err(e) => {
                log::error!("{}: processing aborted: {}", filename, e);
                SlipResult::failed(&filename, format!("processing aborted: {}", e))
            }
        }
    }

    /// Full upload: read the current ledger, process every file, record each result.
    ///
    /// Only storage failures abort the request.
    pub async fn run_upload(
        &self,
        store: &Store,
        images: Vec<PendingImage>,
    ) -> Result<Vec<SlipResult>, StoreError> {
        let ledger = match store.load_ledger().await {
            Ok(ledger) => ledger.map(Arc::new),
            Err(StoreError::Json(e)) => {
                log::warn!("Stored ledger unreadable, slips will not verify: {}", e);
                None
            }
            Err(e) => return Err(e),
        };
        if ledger.is_none() {
            log::debug!("No ledger saved yet, verification disabled for this upload");
        }

        let mut results = Vec::with_capacity(images.len());
        for image in images {
            let result = self.process_isolated(image, ledger.clone()).await;
            store
                .append_history(&SlipHistoryEntry::from_result(&result, Utc::now()))
                .await?;
            results.push(result);
        }
        Ok(results)
    }
}

fn collect_failure<T>(
    failures: &mut Vec<String>,
    source: &str,
    result: &Result<T, ExtractionError>,
) {
    if let Err(e) = result
        && !e.is_miss()
    {
        failures.push(format!("{}: {}", source, e));
    }
}

/// Fill a missing receiver from the participant whose PromptPay id is on the QR.
fn resolve_receiver(record: &mut PaymentRecord, ledger: &LedgerSnapshot) {
    if record.receiver_name.is_some() {
        return;
    }
    if let Some(participant) = record
        .promptpay
        .as_deref()
        .and_then(|id| ledger.participant_by_promptpay(id))
    {
        log::debug!("Receiver resolved by PromptPay id: {}", participant.name);
        record.receiver_name = Some(participant.name.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ledger() -> LedgerSnapshot {
        LedgerSnapshot::from_json(
            r#"{"payers": [{"name": "A"}, {"name": "B", "promptpay": "0812345678"}],
                "items": [{"price": 100, "paidBy": "B", "splitWith": {"A": true, "B": true}}]}"#,
        )
        .unwrap()
    }

    #[test]
    fn test_resolve_receiver_by_promptpay() {
        let mut record = PaymentRecord {
            promptpay: Some("0066812345678".into()),
            ..Default::default()
        };
        resolve_receiver(&mut record, &ledger());
        assert_eq!(record.receiver_name.as_deref(), Some("B"));

        let mut named = PaymentRecord {
            receiver_name: Some("A".into()),
            promptpay: Some("0066812345678".into()),
            ..Default::default()
        };
        resolve_receiver(&mut named, &ledger());
        assert_eq!(named.receiver_name.as_deref(), Some("A"));
    }
}
