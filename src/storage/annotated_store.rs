// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Annotated Image Storage Module
//!
//! Writes rendered JPEGs into a flat directory served under `/static`.
//! Every file gets a fresh random name and is written once; nothing is
//! overwritten or cleaned up.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// URL prefix the store directory is mounted under
pub const DEFAULT_URL_PREFIX: &str = "/static";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Failed to create image directory {0}: {1}")]
    CreateDir(String, std::io::Error),

    #[error("Failed to write annotated image {0}: {1}")]
    Write(String, std::io::Error),

    #[error("Refusing to store an empty image")]
    Empty,
}

/// A file written by [`AnnotatedImageStore::persist`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredImage {
    /// `<32 hex>.jpg`
    pub filename: String,
    /// Location on disk
    pub path: PathBuf,
    /// Public URL, e.g. `/static/<filename>`
    pub url: String,
}

/// Write-once store for annotated images
#[derive(Debug, Clone)]
pub struct AnnotatedImageStore {
    dir: PathBuf,
    url_prefix: String,
}

impl AnnotatedImageStore {
    /// Create a store rooted at `dir` whose files are served under `url_prefix`
    pub fn new<P: Into<PathBuf>>(dir: P, url_prefix: &str) -> Self {
        Self {
            dir: dir.into(),
            url_prefix: url_prefix.trim_end_matches('/').to_string(),
        }
    }

    /// Make sure the directory exists
    pub async fn init(&self) -> Result<(), StoreError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| StoreError::CreateDir(self.dir.display().to_string(), e))?;
        info!("Annotated images stored in {}", self.dir.display());
        Ok(())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Fresh `<uuid v4 simple>.jpg` name
    pub fn generate_filename() -> String {
        format!("{}.jpg", Uuid::new_v4().simple())
    }

    /// Public URL for a stored file
    pub fn url_for(&self, filename: &str) -> String {
        format!("{}/{}", self.url_prefix, filename)
    }

    /// Write encoded JPEG bytes under a new name
    pub async fn persist(&self, jpeg: &[u8]) -> Result<StoredImage, StoreError> {
        if jpeg.is_empty() {
            return Err(StoreError::Empty);
        }

        let filename = Self::generate_filename();
        let path = self.dir.join(&filename);

        let file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
            .map_err(|e| StoreError::Write(path.display().to_string(), e))?;

        write_or_discard(&path, file, jpeg).await?;

        debug!("📥 Stored annotated image {} ({} bytes)", filename, jpeg.len());

        Ok(StoredImage {
            url: self.url_for(&filename),
            filename,
            path,
        })
    }

}

/// Write `bytes` to a freshly created file, removing the file if the write fails
async fn write_or_discard<W>(path: &Path, mut writer: W, bytes: &[u8]) -> Result<(), StoreError>
where
    W: AsyncWrite + Unpin,
{
    let result = async {
        writer.write_all(bytes).await?;
        writer.flush().await
    }
    .await;

    if let Err(e) = result {
        drop(writer);
        if let Err(remove_err) = tokio::fs::remove_file(path).await {
            warn!("Failed to remove partial image {}: {}", path.display(), remove_err);
        }
        return Err(StoreError::Write(path.display().to_string(), e));
    }

    Ok(())
}
