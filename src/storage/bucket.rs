//! Hosted storage bucket client.
//!
//! Uploads go to `/storage/v1/object/<bucket>/<path>` with `x-upsert`; the
//! bucket is public so objects are served from `/storage/v1/object/public/...`.
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;

use super::{Asset, AssetSource, ObjectStorage};
use crate::error::{StoreError, StoreResult};
use crate::store::rest::{ensure_success, with_service_key};

#[derive(Clone)]
pub struct BucketStorage {
    client: Client,
    base_url: String,
    service_key: String,
    bucket: String,
}

impl BucketStorage {
    pub fn new(client: Client, base_url: &str, service_key: &str, bucket: &str) -> Self {
        BucketStorage {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            service_key: service_key.to_string(),
            bucket: bucket.to_string(),
        }
    }

    pub fn public_url(&self, path: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.base_url,
            self.bucket,
            path.trim_start_matches('/')
        )
    }
}

#[async_trait]
impl ObjectStorage for BucketStorage {
    async fn upload(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> StoreResult<String> {
        let path = path.trim_start_matches('/');
        let url = format!("{}/storage/v1/object/{}/{}", self.base_url, self.bucket, path);
        tracing::debug!(bucket = %self.bucket, %path, size = bytes.len(), "uploading object");
        let response = with_service_key(self.client.post(&url), &self.service_key)
            .header(CONTENT_TYPE, content_type)
            .header("x-upsert", "true")
            .body(bytes)
            .send()
            .await?;
        ensure_success(response, "storage upload").await?;
        Ok(self.public_url(path))
    }
}

/// Plain HTTP download, no credentials attached.
#[derive(Clone)]
pub struct HttpAssetSource {
    client: Client,
}

impl HttpAssetSource {
    pub fn new(client: Client) -> Self {
        HttpAssetSource { client }
    }
}

#[async_trait]
impl AssetSource for HttpAssetSource {
    async fn download(&self, url: &str) -> StoreResult<Asset> {
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(StoreError::Backend(format!(
                "download {url}: status {}",
                response.status()
            )));
        }
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("image/png")
            .to_string();
        let bytes = response.bytes().await?.to_vec();
        Ok(Asset {
            bytes,
            content_type,
        })
    }
}
