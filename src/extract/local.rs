/*
 * SPDX-FileCopyrightText: © 2025 Jinwoo Park (pmnxis@gmail.com)
 *
 * SPDX-License-Identifier: MIT
 */

//! Local OCR: decode to an RGB pixel array, then run a line-level recognizer
//! for Thai and Latin script.

use std::io::Cursor;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use image::RgbImage;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::sync::Semaphore;

use super::{Extractor, decode_image};
use crate::error::ExtractionError;
use crate::model::{OcrLine, RawPayload};

/// Text detection + recognition model.
///
/// Implementations are shared by every request; `recognize` must not mutate
/// shared state. Reentrancy is not assumed: calls are gated by the
/// extractor's semaphore. A call may be dropped mid-flight when it runs past
/// the extractor's timeout.
#[async_trait]
pub trait TextRecognizer: Send + Sync {
    /// One entry per text line (never merged into paragraphs), with box and confidence.
    async fn recognize(&self, image: RgbImage) -> Result<Vec<OcrLine>, ExtractionError>;
}

pub struct LocalOcrExtractor {
    recognizer: Arc<dyn TextRecognizer>,
    permits: Arc<Semaphore>,
    timeout: Duration,
}

impl LocalOcrExtractor {
    /// `max_concurrent` recognizer calls may run at once; with 1 every
    /// request queues behind the model. A call holding a permit longer than
    /// `timeout` is abandoned and its permit released.
    pub fn new(
        recognizer: Arc<dyn TextRecognizer>,
        max_concurrent: usize,
        timeout: Duration,
    ) -> Self {
        Self {
            recognizer,
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
            timeout,
        }
    }
}

#[async_trait]
impl Extractor for LocalOcrExtractor {
    fn name(&self) -> &'static str {
        "local-ocr"
    }

    async fn extract(&self, image: &[u8]) -> Result<RawPayload, ExtractionError> {
        let rgb = decode_image(image).await?.to_rgb8();

        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|e| ExtractionError::Model(e.to_string()))?;
        let lines = tokio::time::timeout(self.timeout, self.recognizer.recognize(rgb))
            .await
            .map_err(|_| {
                log::warn!("Local OCR gave up after {:?}", self.timeout);
                ExtractionError::Timeout
            })??;

        log::debug!("Local OCR recognised {} line(s)", lines.len());
        if lines.is_empty() {
            return Err(ExtractionError::NoPayload);
        }
        Ok(RawPayload::LocalOcr(lines))
    }
}

/// Recognizer backed by the `tesseract` binary (TSV output, word level,
/// grouped back into lines).
#[derive(Clone, Debug)]
pub struct TesseractRecognizer {
    binary: String,
    languages: String,
}

impl TesseractRecognizer {
    /// Check the binary runs. Called once at startup.
    pub async fn probe(binary: &str, languages: &str) -> Result<Self, ExtractionError> {
        let output = Command::new(binary)
            .arg("--version")
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| ExtractionError::Model(format!("cannot run {}: {}", binary, e)))?;

        if !output.status.success() {
            return Err(ExtractionError::Model(format!(
                "{} --version exited with {:?}",
                binary,
                output.status.code()
            )));
        }

        let version = String::from_utf8_lossy(&output.stdout);
        log::info!(
            "OCR model ready: {} ({})",
            version.lines().next().unwrap_or("tesseract"),
            languages
        );

        Ok(Self {
            binary: binary.to_string(),
            languages: languages.to_string(),
        })
    }

    /// The child is killed if this future is dropped before it exits.
    async fn run(&self, png: Vec<u8>) -> Result<String, ExtractionError> {
        let mut child = Command::new(&self.binary)
            .args(["stdin", "stdout", "-l", self.languages.as_str(), "tsv"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ExtractionError::Model(e.to_string()))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(&png)
                .await
                .map_err(|e| ExtractionError::Model(e.to_string()))?;
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| ExtractionError::Model(e.to_string()))?;
        if !output.status.success() {
            return Err(ExtractionError::Model(format!(
                "exit code {:?}: {}",
                output.status.code(),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl TextRecognizer for TesseractRecognizer {
    async fn recognize(&self, pixels: RgbImage) -> Result<Vec<OcrLine>, ExtractionError> {
        let png = tokio::task::spawn_blocking(move || -> Result<Vec<u8>, image::ImageError> {
            let mut png = Vec::new();
            pixels.write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)?;
            Ok(png)
        })
        .await
        .map_err(|e| ExtractionError::Model(format!("PNG encode join error: {}", e)))??;

        let tsv = self.run(png).await?;
        Ok(parse_tesseract_tsv(&tsv))
    }
}

/// Group word rows (level 5) of Tesseract TSV output into lines.
pub fn parse_tesseract_tsv(tsv: &str) -> Vec<OcrLine> {
    struct Acc {
        key: (u32, u32, u32, u32),
        words: Vec<String>,
        confs: Vec<f32>,
        left: u32,
        top: u32,
        right: u32,
        bottom: u32,
    }

    let mut lines: Vec<Acc> = Vec::new();

    for row in tsv.lines().skip(1) {
        let cols: Vec<&str> = row.split('\t').collect();
        if cols.len() < 12 || cols[0] != "5" {
            continue;
        }
        let text = cols[11].trim();
        if text.is_empty() {
            continue;
        }
        let num = |i: usize| cols[i].parse::<u32>().unwrap_or(0);
        let key = (num(1), num(2), num(3), num(4));
        let (left, top, width, height) = (num(6), num(7), num(8), num(9));
        let conf = cols[10].parse::<f32>().unwrap_or(-1.0);

        if let Some(acc) = lines.last_mut().filter(|acc| acc.key == key) {
            acc.words.push(text.to_string());
            acc.left = acc.left.min(left);
            acc.top = acc.top.min(top);
            acc.right = acc.right.max(left + width);
            acc.bottom = acc.bottom.max(top + height);
            if conf >= 0.0 {
                acc.confs.push(conf);
            }
        } else {
            lines.push(Acc {
                key,
                words: vec![text.to_string()],
                confs: if conf >= 0.0 { vec![conf] } else { Vec::new() },
                left,
                top,
                right: left + width,
                bottom: top + height,
            });
        }
    }

    lines
        .into_iter()
        .map(|acc| {
            let confidence = if acc.confs.is_empty() {
                0.0
            } else {
                acc.confs.iter().sum::<f32>() / acc.confs.len() as f32 / 100.0
            };
            OcrLine {
                bbox: [
                    (acc.left, acc.top),
                    (acc.right, acc.top),
                    (acc.right, acc.bottom),
                    (acc.left, acc.bottom),
                ],
                text: acc.words.join(" "),
                confidence,
            }
        })
        .collect()
}
