//! Thin HTTP clients for the generation API and its file host.
//!
//! - `create_task` posts to `/api/v1/jobs/createTask`.
//! - `task_status` reads `/api/v1/jobs/recordInfo?taskId=...`.
//! - `upload_base64` posts to `/api/file-base64-upload` on the file host.
//!
//! The provider reports errors both through the HTTP status and through a
//! `code` field in a 200 body; both are honoured.
use async_trait::async_trait;
use reqwest::{Client, Response};
use serde_json::{json, Value};

use super::decode;
use super::{CreateTask, FileHost, GenerationProvider, InlineUpload, TaskStatus};
use crate::error::{AppResult, GenerationError};

#[derive(Clone)]
pub struct GenerationClient {
    client: Client,
    base_url: String,
    model: String,
}

impl GenerationClient {
    pub fn new(client: Client, base_url: &str, model: &str) -> Self {
        GenerationClient {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        }
    }
}

/// Read a response body as JSON along with the effective status code.
///
/// On HTTP 200 a numeric body `code` wins. It is kept at full width so an
/// out-of-range value never aliases a known status.
async fn read_envelope(response: Response) -> AppResult<(u64, Value)> {
    let http_status = u64::from(response.status().as_u16());
    let text = response.text().await.map_err(GenerationError::HttpClient)?;
    let body: Value = serde_json::from_str(&text).unwrap_or_else(|_| json!({ "msg": text }));
    let code = body
        .get("code")
        .and_then(Value::as_u64)
        .filter(|_| http_status == 200)
        .unwrap_or(http_status);
    Ok((code, body))
}

fn classify_failure(code: u64, body: &Value, what: &str) -> GenerationError {
    match code {
        402 => GenerationError::InsufficientBalance,
        401 => GenerationError::CredentialRejected,
        _ => {
            let message = decode::provider_message(body).unwrap_or_else(|| "no message".to_string());
            GenerationError::Provider(format!("{what} failed ({code}): {message}"))
        }
    }
}

#[async_trait]
impl GenerationProvider for GenerationClient {
    async fn create_task(&self, api_key: &str, task: &CreateTask) -> AppResult<String> {
        let url = format!("{}/api/v1/jobs/createTask", self.base_url);
        tracing::info!(model = %self.model, aspect_ratio = %task.aspect_ratio, "creating generation task");
        let payload = json!({
            "model": self.model,
            "input": {
                "prompt": task.prompt,
                "image_input": [task.image_url],
                "aspect_ratio": task.aspect_ratio,
                "resolution": task.resolution,
                "output_format": task.output_format,
            }
        });
        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&payload)
            .send()
            .await
            .map_err(GenerationError::HttpClient)?;
        let (code, body) = read_envelope(response).await?;
        if code != 200 {
            let err = classify_failure(code, &body, "createTask");
            tracing::error!("{}", err);
            return Err(err);
        }
        body.pointer("/data/taskId")
            .and_then(|v| match v {
                Value::String(s) => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .ok_or_else(|| GenerationError::Provider("createTask returned no taskId".to_string()))
    }

    async fn task_status(&self, api_key: &str, task_id: &str) -> AppResult<TaskStatus> {
        let url = format!("{}/api/v1/jobs/recordInfo", self.base_url);
        let response = self
            .client
            .get(&url)
            .bearer_auth(api_key)
            .query(&[("taskId", task_id)])
            .send()
            .await
            .map_err(GenerationError::HttpClient)?;
        let (code, body) = read_envelope(response).await?;
        if code != 200 {
            return Err(classify_failure(code, &body, "recordInfo"));
        }
        let Some(data) = body.get("data") else {
            return Ok(TaskStatus::waiting());
        };
        let state = decode::job_state(data.get("state").and_then(Value::as_str));
        Ok(TaskStatus {
            state,
            result_url: decode::result_url(data),
            fail_message: data
                .get("failMsg")
                .and_then(Value::as_str)
                .filter(|m| !m.is_empty())
                .map(str::to_string),
        })
    }
}

#[derive(Clone)]
pub struct FileHostClient {
    client: Client,
    base_url: String,
}

impl FileHostClient {
    pub fn new(client: Client, base_url: &str) -> Self {
        FileHostClient {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl FileHost for FileHostClient {
    async fn upload_base64(&self, api_key: &str, upload: &InlineUpload) -> AppResult<String> {
        let url = format!("{}/api/file-base64-upload", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&json!({
                "base64Data": upload.base64_data,
                "uploadPath": upload.upload_path,
                "fileName": upload.file_name,
            }))
            .send()
            .await
            .map_err(GenerationError::HttpClient)?;
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error body".to_string());
            return Err(GenerationError::Provider(format!(
                "file upload status {status}: {body}"
            )));
        }
        let body: Value = response
            .json()
            .await
            .map_err(|e| GenerationError::Provider(format!("file upload response unparsable: {e}")))?;
        decode::upload_url(&body).ok_or_else(|| {
            GenerationError::Provider(format!("file upload response has no URL: {body}"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use std::net::SocketAddr;

    /// Serve `router` on an ephemeral local port and return its base URL.
    async fn serve(router: Router) -> String {
        let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
        let server = axum::Server::bind(&addr).serve(router.into_make_service());
        let base = format!("http://{}", server.local_addr());
        tokio::spawn(server);
        base
    }

    fn reply(status: StatusCode, body: Value) -> Router {
        let handler = move || {
            let body = body.clone();
            async move { (status, Json(body)) }
        };
        Router::new()
            .route("/api/v1/jobs/createTask", post(handler.clone()))
            .route("/api/v1/jobs/recordInfo", get(handler.clone()))
            .route("/api/file-base64-upload", post(handler))
    }

    async fn generation_client(status: StatusCode, body: Value) -> GenerationClient {
        let base = serve(reply(status, body)).await;
        GenerationClient::new(Client::new(), &base, "nano-banana-pro")
    }

    fn task() -> CreateTask {
        CreateTask {
            prompt: "portrait".to_string(),
            image_url: "https://cdn.test/me.jpg".to_string(),
            aspect_ratio: "1:1".to_string(),
            resolution: "2K".to_string(),
            output_format: "png".to_string(),
        }
    }

    fn upload() -> InlineUpload {
        InlineUpload {
            base64_data: "data:image/png;base64,iVBORw0KGgo=".to_string(),
            upload_path: "portraits".to_string(),
            file_name: "me.png".to_string(),
        }
    }

    #[test]
    fn failure_codes_map_to_taxonomy() {
        let body = json!({"msg": "nope"});
        assert!(matches!(
            classify_failure(402, &body, "createTask"),
            GenerationError::InsufficientBalance
        ));
        assert!(matches!(
            classify_failure(401, &body, "createTask"),
            GenerationError::CredentialRejected
        ));
        match classify_failure(500, &body, "createTask") {
            GenerationError::Provider(msg) => {
                assert!(msg.contains("500"));
                assert!(msg.contains("nope"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn create_task_returns_task_id() {
        let client = generation_client(
            StatusCode::OK,
            json!({"code": 200, "msg": "success", "data": {"taskId": "abc123"}}),
        )
        .await;
        assert_eq!(client.create_task("key", &task()).await.unwrap(), "abc123");
    }

    #[tokio::test]
    async fn billing_code_in_a_200_body_is_insufficient_balance() {
        let client =
            generation_client(StatusCode::OK, json!({"code": 402, "msg": "Credits insufficient"})).await;
        let err = client.create_task("key", &task()).await.unwrap_err();
        assert!(matches!(err, GenerationError::InsufficientBalance));
    }

    #[tokio::test]
    async fn auth_code_in_a_200_body_rejects_the_credential() {
        let client = generation_client(StatusCode::OK, json!({"code": 401, "msg": "bad key"})).await;
        let err = client.task_status("key", "abc123").await.unwrap_err();
        assert!(matches!(err, GenerationError::CredentialRejected));
    }

    #[tokio::test]
    async fn oversized_body_code_is_not_mistaken_for_a_known_status() {
        // 65938 wraps to 402 when narrowed to u16.
        let client = generation_client(StatusCode::OK, json!({"code": 65938, "msg": "odd"})).await;
        match client.create_task("key", &task()).await.unwrap_err() {
            GenerationError::Provider(msg) => assert!(msg.contains("65938")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn create_without_task_id_is_a_provider_error() {
        let client = generation_client(StatusCode::OK, json!({"code": 200, "data": {}})).await;
        match client.create_task("key", &task()).await.unwrap_err() {
            GenerationError::Provider(msg) => assert!(msg.contains("no taskId")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn http_error_status_wins_over_body_code() {
        let client = generation_client(
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({"code": 200, "msg": "upstream exploded"}),
        )
        .await;
        match client.create_task("key", &task()).await.unwrap_err() {
            GenerationError::Provider(msg) => {
                assert!(msg.contains("500"));
                assert!(msg.contains("upstream exploded"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn status_decodes_result_json() {
        let client = generation_client(
            StatusCode::OK,
            json!({
                "code": 200,
                "data": {
                    "state": "success",
                    "resultJson": "{\"resultUrls\":[\"https://x/y.png\"]}",
                    "failMsg": ""
                }
            }),
        )
        .await;
        let status = client.task_status("key", "abc123").await.unwrap();
        assert_eq!(status.state, crate::model::JobState::Success);
        assert_eq!(status.result_url.as_deref(), Some("https://x/y.png"));
        assert_eq!(status.fail_message, None);
    }

    #[tokio::test]
    async fn upload_reads_download_url() {
        let base = serve(reply(
            StatusCode::OK,
            json!({"success": true, "data": {"downloadUrl": "https://files.test/portraits/me.png"}}),
        ))
        .await;
        let host = FileHostClient::new(Client::new(), &base);
        assert_eq!(
            host.upload_base64("key", &upload()).await.unwrap(),
            "https://files.test/portraits/me.png"
        );
    }

    #[tokio::test]
    async fn upload_error_status_is_reported() {
        let base = serve(reply(StatusCode::FORBIDDEN, json!({"msg": "quota"}))).await;
        let host = FileHostClient::new(Client::new(), &base);
        match host.upload_base64("key", &upload()).await.unwrap_err() {
            GenerationError::Provider(msg) => {
                assert!(msg.contains("403"));
                assert!(msg.contains("quota"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
