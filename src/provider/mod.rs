//! External generation API and the primary file host.
//!
//! - `GenerationProvider`: create a task, query its status.
//! - `FileHost`: upload an inline image and get back a public URL.
//!
//! Both take the credential explicitly so the caller controls key rotation.
use async_trait::async_trait;
use serde::Serialize;

use crate::error::AppResult;
use crate::model::JobState;

pub mod client;
pub mod decode;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreateTask {
    pub prompt: String,
    pub image_url: String,
    pub aspect_ratio: String,
    pub resolution: String,
    pub output_format: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskStatus {
    pub state: JobState,
    pub result_url: Option<String>,
    pub fail_message: Option<String>,
}

impl TaskStatus {
    pub fn waiting() -> Self {
        TaskStatus {
            state: JobState::Waiting,
            result_url: None,
            fail_message: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineUpload {
    /// Raw payload as received, data-URL prefix included if present.
    pub base64_data: String,
    pub upload_path: String,
    pub file_name: String,
}

#[async_trait]
pub trait GenerationProvider: Send + Sync {
    /// Submit a job; returns the provider's task id.
    async fn create_task(&self, api_key: &str, task: &CreateTask) -> AppResult<String>;
    async fn task_status(&self, api_key: &str, task_id: &str) -> AppResult<TaskStatus>;
}

#[async_trait]
pub trait FileHost: Send + Sync {
    async fn upload_base64(&self, api_key: &str, upload: &InlineUpload) -> AppResult<String>;
}
