/*
 * SPDX-FileCopyrightText: © 2025 Jinwoo Park (pmnxis@gmail.com)
 *
 * SPDX-License-Identifier: MIT
 */

//! Extraction adapters: image bytes in, raw payload out.
//!
//! Adapters hold no per-call state. The local OCR recognizer is built once at
//! startup and shared read-only between requests.

mod local;
mod qr;
mod remote;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::{OcrBackend, OcrConfig};
use crate::error::ExtractionError;
use crate::model::RawPayload;

pub use local::{LocalOcrExtractor, TesseractRecognizer, TextRecognizer, parse_tesseract_tsv};
pub use qr::QrExtractor;
pub use remote::RemoteOcrExtractor;

#[async_trait]
pub trait Extractor: Send + Sync {
    fn name(&self) -> &'static str;

    async fn extract(&self, image: &[u8]) -> Result<RawPayload, ExtractionError>;
}

/// Build the configured text extractor, if any.
///
/// For the local backend this probes the recognizer, which is the one-time
/// blocking startup cost of the model.
pub async fn text_extractor(
    config: &OcrConfig,
) -> Result<Option<Arc<dyn Extractor>>, ExtractionError> {
    match config.backend {
        OcrBackend::None => Ok(None),
        OcrBackend::Remote => {
            let url = config.remote.url.as_deref().ok_or_else(|| {
                ExtractionError::Config("ocr.remote.url is not set".into())
            })?;
            let extractor = RemoteOcrExtractor::new(url, &config.remote)?;
            log::info!("Remote OCR enabled ({})", extractor.url());
            Ok(Some(Arc::new(extractor)))
        }
        OcrBackend::Local => {
            let recognizer = TesseractRecognizer::probe(
                &config.local.tesseract_path,
                &config.local.languages,
            )
            .await?;
            log::info!(
                "Local OCR enabled ({} permit(s))",
                config.local.max_concurrent
            );
            Ok(Some(Arc::new(LocalOcrExtractor::new(
                Arc::new(recognizer),
                config.local.max_concurrent,
                Duration::from_secs(config.local.timeout_secs),
            ))))
        }
    }
}

/// Decode image bytes off the async executor.
async fn decode_image(image: &[u8]) -> Result<image::DynamicImage, ExtractionError> {
    let bytes = image.to_vec();
    tokio::task::spawn_blocking(move || image::load_from_memory(&bytes))
        .await
        .map_err(|e| ExtractionError::Model(format!("decode task join error: {}", e)))?
        .map_err(ExtractionError::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_no_backend_means_qr_only() {
        assert!(text_extractor(&OcrConfig::default()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_remote_without_url_is_a_config_error() {
        let config = OcrConfig {
            backend: OcrBackend::Remote,
            ..Default::default()
        };
        let err = text_extractor(&config).await.err().unwrap();
        assert!(matches!(err, ExtractionError::Config(_)));
    }
}
