//! Turns the request's `user_photo` into a URL the provider can fetch.
//!
//! URLs pass through. Inline payloads go to the primary file host first and
//! to the storage bucket if that fails; if both fail the request fails. An
//! inline payload is never forwarded downstream.
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::Utc;
use uuid::Uuid;

use crate::error::{AppResult, GenerationError};
use crate::model::ImageInput;
use crate::provider::{FileHost, InlineUpload};
use crate::storage::{extension_for, ObjectStorage};

pub const PRIMARY_UPLOAD_PATH: &str = "images/user-uploads";

/// An inline image split into its declared content type and base64 body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineImage<'a> {
    pub content_type: String,
    pub base64: &'a str,
}

/// Parse `data:<mime>;base64,<body>` or a bare base64 body (assumed PNG).
pub fn split_data_url(raw: &str) -> InlineImage<'_> {
    if let Some(rest) = raw.strip_prefix("data:") {
        if let Some((meta, body)) = rest.split_once(',') {
            let content_type = meta
                .split(';')
                .next()
                .filter(|m| !m.is_empty())
                .unwrap_or("image/png")
                .to_string();
            return InlineImage {
                content_type,
                base64: body,
            };
        }
    }
    InlineImage {
        content_type: "image/png".to_string(),
        base64: raw,
    }
}

pub struct Ingress<'a> {
    pub file_host: &'a dyn FileHost,
    pub storage: &'a dyn ObjectStorage,
}

impl Ingress<'_> {
    pub async fn resolve(
        &self,
        api_key: &str,
        input: &ImageInput,
        owner_id: Option<&str>,
    ) -> AppResult<String> {
        let raw = match input {
            ImageInput::Url(url) => return Ok(url.clone()),
            ImageInput::Inline(raw) => raw,
        };
        let image = split_data_url(raw);
        let file_name = format!("{}.{}", Uuid::new_v4(), extension_for(&image.content_type));

        let upload = InlineUpload {
            base64_data: raw.clone(),
            upload_path: PRIMARY_UPLOAD_PATH.to_string(),
            file_name: file_name.clone(),
        };
        let primary_err = match self.file_host.upload_base64(api_key, &upload).await {
            Ok(url) => {
                tracing::info!("inline image uploaded to file host");
                return Ok(url);
            }
            Err(err) => {
                tracing::warn!(error = %err, "primary upload failed, trying storage bucket");
                err.to_string()
            }
        };

        let fallback_err = match self.upload_to_bucket(&image, owner_id, &file_name).await {
            Ok(url) => {
                tracing::info!("inline image uploaded to storage bucket");
                return Ok(url);
            }
            Err(err) => err,
        };

        tracing::error!(primary = %primary_err, fallback = %fallback_err, "both image uploads failed");
        Err(GenerationError::Upload {
            primary: primary_err,
            fallback: fallback_err,
        })
    }

    async fn upload_to_bucket(
        &self,
        image: &InlineImage<'_>,
        owner_id: Option<&str>,
        file_name: &str,
    ) -> Result<String, String> {
        let bytes = BASE64
            .decode(image.base64.trim())
            .map_err(|e| format!("invalid base64 image: {e}"))?;
        let path = format!(
            "uploads/{}/{}-{}",
            owner_id.unwrap_or("anonymous"),
            Utc::now().timestamp_millis(),
            file_name
        );
        self.storage
            .upload(&path, bytes, &image.content_type)
            .await
            .map_err(|e| e.to_string())
    }
}
