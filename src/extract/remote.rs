/*
 * SPDX-FileCopyrightText: © 2025 Jinwoo Park (pmnxis@gmail.com)
 *
 * SPDX-License-Identifier: MIT
 */

//! Remote receipt-OCR client. The JSON response is passed on untouched.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};

use super::Extractor;
use crate::config::RemoteOcrConfig;
use crate::error::ExtractionError;
use crate::model::RawPayload;

const USER_AGENT: &str = concat!("slipcheck/", env!("CARGO_PKG_VERSION"));

pub struct RemoteOcrExtractor {
    http_client: reqwest::Client,
    url: String,
    api_key: Option<String>,
}

impl RemoteOcrExtractor {
    /// `config` supplies the key and timeout; the URL is resolved by the caller.
    pub fn new(url: &str, config: &RemoteOcrConfig) -> Result<Self, ExtractionError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http_client,
            url: url.to_string(),
            api_key: config.api_key.clone(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Extractor for RemoteOcrExtractor {
    fn name(&self) -> &'static str {
        "remote-ocr"
    }

    async fn extract(&self, image: &[u8]) -> Result<RawPayload, ExtractionError> {
        let form = Form::new().part("file", Part::bytes(image.to_vec()).file_name("slip"));

        let mut request = self.http_client.post(&self.url).multipart(form);
        if let Some(key) = &self.api_key {
            request = request.header("X-API-Key", key);
        }

        log::debug!("Sending {} byte(s) to remote OCR", image.len());
        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ExtractionError::Service {
                status: status.as_u16(),
                body,
            });
        }

        let value: serde_json::Value = response.json().await?;
        if value.is_null() {
            return Err(ExtractionError::NoPayload);
        }
        Ok(RawPayload::RemoteOcr(value))
    }
}
