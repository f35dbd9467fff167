// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod annotated_store;

// Re-export main types for convenience
pub use annotated_store::{AnnotatedImageStore, StoreError, StoredImage, DEFAULT_URL_PREFIX};
