//! Copies a provider-hosted result into the storage bucket.
//!
//! Best effort: any failure returns the provider URL unchanged.
use chrono::Utc;

use crate::storage::{extension_for, AssetSource, ObjectStorage};

pub struct ResultPersister<'a> {
    pub assets: &'a dyn AssetSource,
    pub storage: &'a dyn ObjectStorage,
}

impl ResultPersister<'_> {
    pub async fn persist(&self, provider_url: &str, owner_id: Option<&str>) -> String {
        match self.try_persist(provider_url, owner_id).await {
            Ok(url) => {
                tracing::info!(%url, "result persisted to storage");
                url
            }
            Err(err) => {
                tracing::warn!(error = %err, %provider_url, "result persistence failed, using provider url");
                provider_url.to_string()
            }
        }
    }

    async fn try_persist(&self, provider_url: &str, owner_id: Option<&str>) -> Result<String, String> {
        let asset = self
            .assets
            .download(provider_url)
            .await
            .map_err(|e| e.to_string())?;
        if asset.bytes.is_empty() {
            return Err("downloaded result is empty".to_string());
        }
        let path = format!(
            "{}/{}.{}",
            owner_id.unwrap_or("anonymous"),
            Utc::now().timestamp_millis(),
            extension_for(&asset.content_type)
        );
        self.storage
            .upload(&path, asset.bytes, &asset.content_type)
            .await
            .map_err(|e| e.to_string())
    }
}
