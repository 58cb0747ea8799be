#![allow(dead_code)]

use async_trait::async_trait;
use portrait_pipeline::config::PollSettings;
use portrait_pipeline::error::{AppResult, GenerationError, StoreError, StoreResult};
use portrait_pipeline::model::{ApiCredential, EventCreditBalance, GenerationRecord, JobState};
use portrait_pipeline::notify::{Notification, Notifier};
use portrait_pipeline::pipeline::{Collaborators, GenerationService, PipelineSettings};
use portrait_pipeline::provider::decode;
use portrait_pipeline::provider::{CreateTask, FileHost, GenerationProvider, InlineUpload, TaskStatus};
use portrait_pipeline::storage::{Asset, AssetSource, ObjectStorage};
use portrait_pipeline::store::{
    CreditDecision, CreditLedger, Datastore, GenerationRecords, KeyPool, StyleCatalog,
};
use portrait_pipeline::InMemoryStore;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const DEFAULT_KEY: &str = "default-key";

/// Scripted generation API. Status calls walk `statuses`, repeating the last entry.
#[derive(Default)]
pub struct FakeProvider {
    pub create_calls: AtomicU32,
    pub status_calls: AtomicU32,
    pub create_failure: Mutex<Option<GenerationError>>,
    pub statuses: Mutex<Vec<TaskStatus>>,
    pub last_task: Mutex<Option<CreateTask>>,
    pub keys_seen: Mutex<Vec<String>>,
}

impl FakeProvider {
    pub fn script(&self, statuses: Vec<TaskStatus>) {
        *self.statuses.lock().unwrap() = statuses;
    }

    pub fn fail_create_with(&self, err: GenerationError) {
        *self.create_failure.lock().unwrap() = Some(err);
    }

    pub fn creates(&self) -> u32 {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn status_checks(&self) -> u32 {
        self.status_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GenerationProvider for FakeProvider {
    async fn create_task(&self, api_key: &str, task: &CreateTask) -> AppResult<String> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        self.keys_seen.lock().unwrap().push(api_key.to_string());
        *self.last_task.lock().unwrap() = Some(task.clone());
        if let Some(err) = self.create_failure.lock().unwrap().take() {
            return Err(err);
        }
        Ok("task-1".to_string())
    }

    async fn task_status(&self, api_key: &str, _task_id: &str) -> AppResult<TaskStatus> {
        let n = self.status_calls.fetch_add(1, Ordering::SeqCst) as usize;
        self.keys_seen.lock().unwrap().push(api_key.to_string());
        let statuses = self.statuses.lock().unwrap();
        Ok(statuses
            .get(n)
            .or_else(|| statuses.last())
            .cloned()
            .unwrap_or_else(TaskStatus::waiting))
    }
}

/// Status decoded from a provider `data` object, the way the HTTP client does it.
pub fn status_from_data(data: serde_json::Value) -> TaskStatus {
    TaskStatus {
        state: decode::job_state(data.get("state").and_then(|v| v.as_str())),
        result_url: decode::result_url(&data),
        fail_message: data
            .get("failMsg")
            .and_then(|v| v.as_str())
            .map(str::to_string),
    }
}

pub fn waiting() -> TaskStatus {
    TaskStatus::waiting()
}

pub fn success(url: &str) -> TaskStatus {
    TaskStatus {
        state: JobState::Success,
        result_url: Some(url.to_string()),
        fail_message: None,
    }
}

#[derive(Default)]
pub struct FakeFileHost {
    pub calls: AtomicU32,
    pub fail: AtomicBool,
}

impl FakeFileHost {
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FileHost for FakeFileHost {
    async fn upload_base64(&self, _api_key: &str, upload: &InlineUpload) -> AppResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(GenerationError::Provider("file upload status 500: boom".to_string()));
        }
        Ok(format!("https://files.test/{}/{}", upload.upload_path, upload.file_name))
    }
}

/// Bucket plus asset source. Downloads fail unless `serve_downloads` is set.
#[derive(Default)]
pub struct FakeStorage {
    pub uploads: Mutex<Vec<String>>,
    pub fail_uploads: AtomicBool,
    pub serve_downloads: AtomicBool,
    pub downloads: AtomicU32,
}

impl FakeStorage {
    pub fn upload_count(&self) -> usize {
        self.uploads.lock().unwrap().len()
    }
}

#[async_trait]
impl ObjectStorage for FakeStorage {
    async fn upload(&self, path: &str, _bytes: Vec<u8>, _content_type: &str) -> StoreResult<String> {
        self.uploads.lock().unwrap().push(path.to_string());
        if self.fail_uploads.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("bucket unavailable".to_string()));
        }
        Ok(format!("https://bucket.test/{path}"))
    }
}

#[async_trait]
impl AssetSource for FakeStorage {
    async fn download(&self, url: &str) -> StoreResult<Asset> {
        self.downloads.fetch_add(1, Ordering::SeqCst);
        if !self.serve_downloads.load(Ordering::SeqCst) {
            return Err(StoreError::Backend(format!("download {url}: status 403")));
        }
        Ok(Asset {
            bytes: vec![0x89, 0x50, 0x4e, 0x47],
            content_type: "image/png".to_string(),
        })
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<Notification>>,
    pub fail: AtomicBool,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn dispatch(&self, notification: Notification) -> StoreResult<()> {
        self.sent.lock().unwrap().push(notification);
        if self.fail.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("push service down".to_string()));
        }
        Ok(())
    }
}

/// In-memory datastore with injectable faults: failing key pool or style
/// lookups, and slow record inserts.
#[derive(Default)]
pub struct FaultyStore {
    pub inner: InMemoryStore,
    pub fail_key_pool: AtomicBool,
    pub fail_styles: AtomicBool,
    pub insert_delay: Mutex<Duration>,
}

impl FaultyStore {
    pub fn wrapping(inner: InMemoryStore) -> Self {
        FaultyStore {
            inner,
            ..FaultyStore::default()
        }
    }

    pub fn slow_inserts(self, delay: Duration) -> Self {
        *self.insert_delay.lock().unwrap() = delay;
        self
    }
}

#[async_trait]
impl CreditLedger for FaultyStore {
    async fn consume_credit(&self, event_id: &str) -> StoreResult<CreditDecision> {
        self.inner.consume_credit(event_id).await
    }

    async fn balance(&self, event_id: &str) -> StoreResult<Option<EventCreditBalance>> {
        self.inner.balance(event_id).await
    }
}

#[async_trait]
impl KeyPool for FaultyStore {
    async fn least_recently_used(&self) -> StoreResult<Option<ApiCredential>> {
        if self.fail_key_pool.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("api_keys unreachable".to_string()));
        }
        self.inner.least_recently_used().await
    }

    async fn touch(&self, credential_id: &str) -> StoreResult<()> {
        self.inner.touch(credential_id).await
    }
}

#[async_trait]
impl StyleCatalog for FaultyStore {
    async fn style_prompt(&self, style_id: &str) -> StoreResult<Option<String>> {
        if self.fail_styles.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("styles unreachable".to_string()));
        }
        self.inner.style_prompt(style_id).await
    }
}

#[async_trait]
impl GenerationRecords for FaultyStore {
    async fn insert_record(&self, record: GenerationRecord) -> StoreResult<bool> {
        let delay = *self.insert_delay.lock().unwrap();
        tokio::time::sleep(delay).await;
        self.inner.insert_record(record).await
    }

    async fn find_by_task(&self, task_id: &str) -> StoreResult<Option<GenerationRecord>> {
        self.inner.find_by_task(task_id).await
    }
}

pub struct Harness {
    pub store: InMemoryStore,
    pub provider: Arc<FakeProvider>,
    pub file_host: Arc<FakeFileHost>,
    pub storage: Arc<FakeStorage>,
    pub notifier: Arc<RecordingNotifier>,
    pub poll: PollSettings,
}

impl Harness {
    pub fn new() -> Self {
        Harness {
            store: InMemoryStore::new(),
            provider: Arc::new(FakeProvider::default()),
            file_host: Arc::new(FakeFileHost::default()),
            storage: Arc::new(FakeStorage::default()),
            notifier: Arc::new(RecordingNotifier::default()),
            poll: PollSettings {
                interval: Duration::ZERO,
                max_attempts: 60,
            },
        }
    }

    pub fn service(&self) -> GenerationService {
        self.service_with_store(Arc::new(self.store.clone()))
    }

    /// Same collaborators, but with `store` in front of the datastore.
    pub fn service_with_store(&self, store: Arc<dyn Datastore>) -> GenerationService {
        let deps = Collaborators {
            store,
            provider: self.provider.clone(),
            file_host: self.file_host.clone(),
            storage: self.storage.clone(),
            assets: self.storage.clone(),
            notifier: self.notifier.clone(),
        };
        GenerationService::new(
            deps,
            PipelineSettings {
                default_api_key: DEFAULT_KEY.to_string(),
                poll: self.poll,
                resolution: "2K".to_string(),
                output_format: "png".to_string(),
            },
        )
    }

    /// Nothing outside the datastore was contacted.
    pub fn no_external_calls(&self) -> bool {
        self.provider.creates() == 0
            && self.provider.status_checks() == 0
            && self.file_host.calls() == 0
            && self.storage.upload_count() == 0
    }
}

pub async fn read_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = hyper::body::to_bytes(response.into_body())
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json")
}
