// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::{Context, Result};
use std::{env, sync::Arc};
use tracing::info;
use vehdamage_api::{
    api::{start_server, AppState},
    config::ServerConfig,
    storage::{AnnotatedImageStore, DEFAULT_URL_PREFIX},
    vision::{Annotator, ClassNames, Detector, YoloConfig, YoloModel},
};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    // Initialize tracing subscriber for logging
    if env::var("RUST_LOG").is_err() {
        env::set_var("RUST_LOG", "info");
    }
    tracing_subscriber::fmt::init();

    info!("🚀 Starting {}", vehdamage_api::version::get_version_string());

    let config = ServerConfig::from_env();
    info!("Configuration: {:?}", config);

    let class_names = match &config.class_names_path {
        Some(path) => Some(
            ClassNames::from_json_file(path)
                .with_context(|| format!("Failed to load class names from {}", path.display()))?,
        ),
        None => None,
    };

    let annotator = match &config.label_font_path {
        Some(path) => Annotator::with_font_file(path)?,
        None => {
            info!("Using bundled label font");
            Annotator::default()
        }
    };

    let yolo_config = YoloConfig {
        input_size: config.input_size,
        iou_threshold: config.iou_threshold,
        max_detections: config.max_detections,
    };

    // Weights are required; without them the server does not start
    let model = YoloModel::new(&config.model_path, yolo_config, annotator, class_names)
        .await
        .context("Failed to load detection model")?;
    let detector: Arc<dyn Detector> = Arc::new(model);

    let store = AnnotatedImageStore::new(&config.static_dir, DEFAULT_URL_PREFIX);
    store.init().await?;

    let state = Arc::new(
        AppState::new(detector, store).with_max_upload_bytes(config.max_upload_bytes()),
    );

    let addr = config.listen_addr()?;
    start_server(state, addr).await?;

    info!("Server stopped");
    Ok(())
}
