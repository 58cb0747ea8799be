//! Domain types shared by the pipeline, the stores and the HTTP layer.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Source image of a create request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageInput {
    /// Already dereferenceable; forwarded unchanged.
    Url(String),
    /// Base64 payload, optionally wrapped in a `data:<mime>;base64,` prefix.
    Inline(String),
}

impl ImageInput {
    /// Classify a raw `user_photo` value. Blank input yields `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        let lower = trimmed.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            Some(ImageInput::Url(trimmed.to_string()))
        } else {
            Some(ImageInput::Inline(trimmed.to_string()))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Create { user_photo: ImageInput },
    Check { task_id: String },
}

/// A validated generation request. Immutable once accepted.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub action: Action,
    pub style_id: String,
    pub aspect_ratio: String,
    pub user_id: Option<String>,
    pub guest_id: Option<String>,
    pub event_id: Option<String>,
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
}

impl GenerationRequest {
    /// Owner used for storage paths and push notifications: guest first, then user.
    pub fn owner_id(&self) -> Option<&str> {
        self.guest_id.as_deref().or(self.user_id.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiCredential {
    pub id: String,
    #[serde(rename = "api_key")]
    pub secret_value: String,
    #[serde(default)]
    pub last_used_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub usage_count: i64,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Pending,
    Waiting,
    Success,
    Fail,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationJob {
    pub task_id: String,
    pub state: JobState,
    pub result_url: Option<String>,
}

impl GenerationJob {
    pub fn pending(task_id: impl Into<String>) -> Self {
        GenerationJob {
            task_id: task_id.into(),
            state: JobState::Pending,
            result_url: None,
        }
    }
}

/// Persisted once per successful job; never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRecord {
    pub id: Uuid,
    pub task_id: String,
    pub user_id: Option<String>,
    pub style_id: String,
    pub image_url: String,
    pub aspect_ratio: String,
    pub event_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl GenerationRecord {
    pub fn new(request: &GenerationRequest, task_id: &str, image_url: &str) -> Self {
        GenerationRecord {
            id: Uuid::new_v4(),
            task_id: task_id.to_string(),
            user_id: request.user_id.clone(),
            style_id: request.style_id.clone(),
            image_url: image_url.to_string(),
            aspect_ratio: request.aspect_ratio.clone(),
            event_id: request.event_id.clone(),
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventCreditBalance {
    pub event_id: String,
    pub allocated: i64,
    pub used: i64,
}
