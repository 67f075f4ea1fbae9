/*
 * SPDX-FileCopyrightText: © 2025 Jinwoo Park (pmnxis@gmail.com)
 *
 * SPDX-License-Identifier: MIT
 */

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

use slipcheck::config::{Config, OcrBackend};
use slipcheck::extract;
use slipcheck::pipeline::Pipeline;
use slipcheck::server::{AppState, build_router};
use slipcheck::store::Store;

#[derive(Debug, Parser)]
#[command(name = "slipcheck", version, about = "Payment slip verification service")]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, env = "SLIPCHECK_CONFIG")]
    config: Option<PathBuf>,

    /// Listen address, e.g. 0.0.0.0:8000
    #[arg(long)]
    bind: Option<String>,

    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    #[arg(long, value_enum)]
    ocr_backend: Option<OcrBackend>,
}

impl Cli {
    fn apply(self, config: &mut Config) {
        if let Some(bind) = self.bind {
            config.bind = bind;
        }
        if let Some(url) = self.database_url {
            config.database_url = url;
        }
        if let Some(backend) = self.ocr_backend {
            config.ocr.backend = backend;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let mut config = Config::load(cli.config.as_deref()).context("loading configuration")?;
    cli.apply(&mut config);
    config.validate()?;

    log::info!("slipcheck v{} starting", env!("CARGO_PKG_VERSION"));

    let store = Store::connect(&config.database_url)
        .await
        .with_context(|| format!("opening database {}", config.database_url))?;
    let text = extract::text_extractor(&config.ocr)
        .await
        .context("initialising OCR backend")?;
    if text.is_none() {
        log::info!("OCR disabled, slips are read from their QR code only");
    }
    let pipeline = Pipeline::with_text(text);

    let state = AppState::new(store, pipeline, config.history_limit);
    let app = build_router(state, config.max_upload_bytes);

    let listener = tokio::net::TcpListener::bind(&config.bind)
        .await
        .with_context(|| format!("binding {}", config.bind))?;
    log::info!("Listening on http://{}", config.bind);
    axum::serve(listener, app).await?;

    Ok(())
}
