//! Wire types for `POST /generate`.
use serde::{Deserialize, Serialize};

use crate::error::GenerationError;
use crate::model::{Action, GenerationRequest, ImageInput};
use crate::pipeline::Outcome;

pub const DEFAULT_ASPECT_RATIO: &str = "1:1";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GenerateBody {
    #[serde(default)]
    pub user_photo: Option<String>,
    #[serde(default)]
    pub model_id: Option<String>,
    #[serde(default)]
    pub aspect_ratio: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub guest_id: Option<String>,
    #[serde(default)]
    pub event_id: Option<String>,
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default, rename = "taskId", alias = "task_id")]
    pub task_id: Option<String>,
}

fn non_blank(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

impl GenerateBody {
    /// Validate and convert into a pipeline request. `action` defaults to `create`.
    pub fn into_request(self) -> Result<GenerationRequest, GenerationError> {
        let action = match non_blank(self.action).as_deref().unwrap_or("create") {
            "create" => {
                let photo = self
                    .user_photo
                    .as_deref()
                    .and_then(ImageInput::parse)
                    .ok_or_else(|| GenerationError::InvalidRequest("user_photo is required".to_string()))?;
                Action::Create { user_photo: photo }
            }
            "check" => {
                let task_id = non_blank(self.task_id).ok_or_else(|| {
                    GenerationError::InvalidRequest("taskId is required for check".to_string())
                })?;
                Action::Check { task_id }
            }
            other => {
                return Err(GenerationError::InvalidRequest(format!("unknown action '{other}'")));
            }
        };
        // `check` may create the record too, and a record always names its style.
        let style_id = non_blank(self.model_id)
            .ok_or_else(|| GenerationError::InvalidRequest("model_id is required".to_string()))?;
        Ok(GenerationRequest {
            action,
            style_id,
            aspect_ratio: non_blank(self.aspect_ratio)
                .unwrap_or_else(|| DEFAULT_ASPECT_RATIO.to_string()),
            user_id: non_blank(self.user_id),
            guest_id: non_blank(self.guest_id),
            event_id: non_blank(self.event_id),
            contact_email: non_blank(self.email),
            contact_phone: non_blank(self.phone),
        })
    }
}

/// Response envelope. Always sent with HTTP 200; clients inspect `success`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum GenerateResponse {
    Completed {
        success: bool,
        image_url: String,
    },
    Waiting {
        success: bool,
        state: &'static str,
        #[serde(rename = "taskId")]
        task_id: String,
    },
    Failed {
        success: bool,
        error: String,
    },
}

impl GenerateResponse {
    pub fn failed(error: impl Into<String>) -> Self {
        GenerateResponse::Failed {
            success: false,
            error: error.into(),
        }
    }
}

impl From<Outcome> for GenerateResponse {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Completed { image_url } => GenerateResponse::Completed {
                success: true,
                image_url,
            },
            Outcome::Waiting { task_id } => GenerateResponse::Waiting {
                success: true,
                state: "waiting",
                task_id,
            },
        }
    }
}

impl From<GenerationError> for GenerateResponse {
    fn from(err: GenerationError) -> Self {
        GenerateResponse::failed(err.to_string())
    }
}
