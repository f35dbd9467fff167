// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use axum::response::Html;
use axum::Json;
use serde::{Deserialize, Serialize};

use super::http_server::ROUTES;

const UI_PAGE: &str = include_str!("ui/index.html");

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

impl HealthResponse {
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
        }
    }
}

/// GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::ok())
}

/// GET /routes - registered path templates
pub async fn routes_handler() -> Json<Vec<&'static str>> {
    Json(ROUTES.to_vec())
}

/// GET /ui - demo page driving both predict endpoints
pub async fn ui_handler() -> Html<&'static str> {
    Html(UI_PAGE)
}
