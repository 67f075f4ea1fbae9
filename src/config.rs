/*
 * SPDX-FileCopyrightText: © 2025 Jinwoo Park (pmnxis@gmail.com)
 *
 * SPDX-License-Identifier: MIT
 */

//! Service configuration: an optional TOML file, every field defaulted.
//! Command-line flags in `main` override what the file says.

use std::path::Path;

use serde::Deserialize;

use crate::error::ConfigError;

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    pub bind: String,
    pub database_url: String,
    /// Entries returned by the history listing
    pub history_limit: u32,
    pub max_upload_bytes: usize,
    pub ocr: OcrConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8000".into(),
            database_url: "sqlite://slipcheck.db".into(),
            history_limit: 20,
            max_upload_bytes: 10 * 1024 * 1024,
            ocr: OcrConfig::default(),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OcrBackend {
    /// QR only
    #[default]
    None,
    Remote,
    Local,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    pub backend: OcrBackend,
    pub remote: RemoteOcrConfig,
    pub local: LocalOcrConfig,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct RemoteOcrConfig {
    pub url: Option<String>,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

impl Default for RemoteOcrConfig {
    fn default() -> Self {
        Self {
            url: None,
            api_key: None,
            timeout_secs: 15,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct LocalOcrConfig {
    pub tesseract_path: String,
    /// Tesseract languages, Thai + Latin
    pub languages: String,
    pub max_concurrent: usize,
    /// Upper bound on one recognizer call, so a hung model frees its permit
    pub timeout_secs: u64,
}

impl Default for LocalOcrConfig {
    fn default() -> Self {
        Self {
            tesseract_path: "tesseract".into(),
            languages: "tha+eng".into(),
            max_concurrent: 1,
            timeout_secs: 60,
        }
    }
}

impl Config {
    /// Defaults when no file is given.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => {
                let content = std::fs::read_to_string(path)?;
                log::info!("Loaded configuration from {}", path.display());
                Self::from_toml_str(&content)
            }
            None => Ok(Self::default()),
        }
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ocr.backend == OcrBackend::Remote && self.ocr.remote.url.is_none() {
            return Err(ConfigError::Invalid(
                "ocr.backend = \"remote\" needs ocr.remote.url".into(),
            ));
        }
        if self.ocr.remote.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "ocr.remote.timeout_secs must be at least 1".into(),
            ));
        }
        if self.ocr.local.max_concurrent == 0 {
            return Err(ConfigError::Invalid(
                "ocr.local.max_concurrent must be at least 1".into(),
            ));
        }
        if self.ocr.local.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "ocr.local.timeout_secs must be at least 1".into(),
            ));
        }
        if self.history_limit == 0 {
            return Err(ConfigError::Invalid("history_limit must be at least 1".into()));
        }
        Ok(())
    }
}
