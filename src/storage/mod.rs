//! Object storage seam: the public bucket used for upload fallback and for
//! persisting generated results.
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::{StoreError, StoreResult};

pub mod bucket;

#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Store `bytes` at `path` (overwriting) and return its public URL.
    async fn upload(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> StoreResult<String>;
}

/// Fetches remote assets, e.g. a provider-hosted result image.
#[async_trait]
pub trait AssetSource: Send + Sync {
    async fn download(&self, url: &str) -> StoreResult<Asset>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

/// Map a content type to the file extension used in object paths.
pub fn extension_for(content_type: &str) -> &'static str {
    match content_type.split(';').next().unwrap_or("").trim() {
        "image/jpeg" | "image/jpg" => "jpg",
        "image/webp" => "webp",
        "image/gif" => "gif",
        _ => "png",
    }
}

/// Process-local bucket for development runs without a hosted backend.
#[derive(Clone, Default)]
pub struct InMemoryStorage {
    public_base: String,
    objects: Arc<RwLock<HashMap<String, Asset>>>,
}

impl InMemoryStorage {
    pub fn new(public_base: &str) -> Self {
        InMemoryStorage {
            public_base: public_base.trim_end_matches('/').to_string(),
            objects: Arc::default(),
        }
    }

    pub async fn object(&self, path: &str) -> Option<Asset> {
        self.objects.read().await.get(path).cloned()
    }

    fn public_url(&self, path: &str) -> String {
        format!("{}/{}", self.public_base, path)
    }
}

#[async_trait]
impl ObjectStorage for InMemoryStorage {
    async fn upload(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> StoreResult<String> {
        self.objects.write().await.insert(
            path.to_string(),
            Asset {
                bytes,
                content_type: content_type.to_string(),
            },
        );
        Ok(self.public_url(path))
    }
}

#[async_trait]
impl AssetSource for InMemoryStorage {
    async fn download(&self, url: &str) -> StoreResult<Asset> {
        let path = url
            .strip_prefix(&self.public_base)
            .map(|p| p.trim_start_matches('/'))
            .ok_or_else(|| StoreError::NotFound(url.to_string()))?;
        self.object(path)
            .await
            .ok_or_else(|| StoreError::NotFound(url.to_string()))
    }
}
