// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::{net::SocketAddr, sync::Arc};
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};
use tracing::info;

use super::handlers::{health_handler, routes_handler, ui_handler};
use super::predict::{predict_handler, predict_image_handler};
use crate::storage::{AnnotatedImageStore, DEFAULT_URL_PREFIX};
use crate::vision::image_utils::{JPEG_QUALITY, MAX_UPLOAD_BYTES};
use crate::vision::Detector;

/// Path templates served by [`create_app`], in registration order
pub const ROUTES: &[&str] = &[
    DEFAULT_URL_PREFIX,
    "/health",
    "/routes",
    "/api/predict",
    "/api/predict-image",
    "/ui",
];

/// Shared, read-only request state
#[derive(Clone)]
pub struct AppState {
    pub detector: Arc<dyn Detector>,
    pub store: AnnotatedImageStore,
    pub max_upload_bytes: usize,
    pub jpeg_quality: u8,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("classes", &self.detector.names().len())
            .field("store", &self.store)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .field("jpeg_quality", &self.jpeg_quality)
            .finish()
    }
}

impl AppState {
    pub fn new(detector: Arc<dyn Detector>, store: AnnotatedImageStore) -> Self {
        Self {
            detector,
            store,
            max_upload_bytes: MAX_UPLOAD_BYTES,
            jpeg_quality: JPEG_QUALITY,
        }
    }

    pub fn with_max_upload_bytes(mut self, max_upload_bytes: usize) -> Self {
        self.max_upload_bytes = max_upload_bytes;
        self
    }
}

/// Build the router with all routes and layers
pub fn create_app(state: Arc<AppState>) -> Router {
    let static_files = ServeDir::new(state.store.dir());

    Router::new()
        .nest_service(DEFAULT_URL_PREFIX, static_files)
        .route("/health", get(health_handler))
        .route("/routes", get(routes_handler))
        .route(
            "/api/predict",
            post(predict_handler).layer(DefaultBodyLimit::disable()),
        )
        .route(
            "/api/predict-image",
            post(predict_image_handler).layer(DefaultBodyLimit::disable()),
        )
        .route("/ui", get(ui_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve until ctrl-c
pub async fn start_server(state: Arc<AppState>, addr: SocketAddr) -> anyhow::Result<()> {
    let app = create_app(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("🚀 API server listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
        })
        .await?;

    Ok(())
}
