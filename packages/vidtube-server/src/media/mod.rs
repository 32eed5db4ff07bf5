//! Media host integration.
//!
//! The account core only needs "upload this local file, give me a URL". The
//! temporary local copy is removed after every attempt, success or not.

mod cloudinary;

pub use cloudinary::CloudinaryMediaHost;

use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;
use tracing::{error, info};

/// A file accepted by the media host
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StoredMedia {
    pub url: String,
}

/// Media host errors
#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    #[error("Failed to read upload: {0}")]
    Io(#[from] std::io::Error),
    #[error("Media host request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Media host rejected upload: {0}")]
    Rejected(String),
}

#[async_trait]
pub trait MediaHost: Send + Sync {
    /// Upload a local file and return where it is served from
    async fn upload(&self, local_path: &Path) -> Result<StoredMedia, MediaError>;
}

/// Upload `local_path`, then delete it. `None` if the upload failed.
pub async fn store_media(host: &dyn MediaHost, local_path: &Path) -> Option<StoredMedia> {
    let result = host.upload(local_path).await;

    discard_local_file(local_path).await;

    match result {
        Ok(media) => {
            info!("Uploaded {} to {}", local_path.display(), media.url);
            Some(media)
        }
        Err(e) => {
            error!("Media upload failed for {}: {}", local_path.display(), e);
            None
        }
    }
}

/// Best-effort removal of a temporary upload; the outcome is ignored
pub async fn discard_local_file(local_path: &Path) {
    let _ = tokio::fs::remove_file(local_path).await;
}
