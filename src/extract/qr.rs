/*
 * SPDX-FileCopyrightText: © 2025 Jinwoo Park (pmnxis@gmail.com)
 *
 * SPDX-License-Identifier: MIT
 */

use async_trait::async_trait;

use super::{Extractor, decode_image};
use crate::error::ExtractionError;
use crate::model::RawPayload;
use crate::parser::{QR_CURRENCY_MARKER, QR_FORMAT_MARKER};

/// Finds the PromptPay QR among all barcodes in the image.
#[derive(Clone, Copy, Debug, Default)]
pub struct QrExtractor;

impl QrExtractor {
    /// First payload carrying the PromptPay signature.
    pub fn select_promptpay(payloads: impl IntoIterator<Item = String>) -> Option<String> {
        payloads
            .into_iter()
            .find(|p| p.contains(QR_FORMAT_MARKER) && p.contains(QR_CURRENCY_MARKER))
    }
}

fn decode_grids(gray: &image::GrayImage) -> Vec<String> {
    let (w, h) = gray.dimensions();
    let mut prepared =
        rqrr::PreparedImage::prepare_from_greyscale(w as usize, h as usize, |x, y| {
            gray.get_pixel(x as u32, y as u32)[0]
        });

    prepared
        .detect_grids()
        .into_iter()
        .filter_map(|grid| match grid.decode() {
            Ok((_, content)) => Some(content),
            Err(e) => {
                log::debug!("Skipping undecodable QR grid: {:?}", e);
                None
            }
        })
        .collect()
}

#[async_trait]
impl Extractor for QrExtractor {
    fn name(&self) -> &'static str {
        "qr"
    }

    async fn extract(&self, image: &[u8]) -> Result<RawPayload, ExtractionError> {
        let gray = decode_image(image).await?.to_luma8();
        let payloads = tokio::task::spawn_blocking(move || decode_grids(&gray))
            .await
            .map_err(|e| ExtractionError::Model(format!("QR task join error: {}", e)))?;

        log::debug!("QR scan found {} barcode(s)", payloads.len());
        Self::select_promptpay(payloads)
            .map(RawPayload::Qr)
            .ok_or(ExtractionError::NoPayload)
    }
}
