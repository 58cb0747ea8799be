//! The portrait generation workflow.
//!
//! `create`: credit gate, key selection, image ingress, task submission,
//! bounded polling, result persistence, the generation record, then detached
//! notifications. `check`: resume polling an already submitted task without
//! charging credits or resubmitting.
//!
//! A task is recorded at most once and the stored record decides the URL every
//! later response carries, so repeated or concurrent checks agree.
//!
//! Background work (key-usage stamp, notifications) is spawned and its handles
//! are returned in `Completion::background`; the HTTP layer drops them, tests
//! may await them.
use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::config::PollSettings;
use crate::error::{AppResult, GenerationError};
use crate::model::{Action, GenerationJob, GenerationRecord, GenerationRequest, ImageInput};
use crate::notify::Notifier;
use crate::provider::{CreateTask, FileHost, GenerationProvider};
use crate::storage::{AssetSource, ObjectStorage};
use crate::store::{Datastore, GenerationRecords};

pub mod credits;
pub mod fanout;
pub mod ingress;
pub mod keys;
pub mod persist;
pub mod poller;
pub mod prompt;

use fanout::Recorded;
use ingress::Ingress;
use keys::SelectedKey;
use persist::ResultPersister;
use poller::PollOutcome;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Completed { image_url: String },
    Waiting { task_id: String },
}

#[derive(Debug)]
pub struct Completion {
    pub outcome: Outcome,
    pub background: Vec<JoinHandle<()>>,
}

impl Completion {
    fn new(outcome: Outcome) -> Self {
        Completion {
            outcome,
            background: Vec::new(),
        }
    }

    /// Wait for detached work. Only tests and the CLI have a reason to.
    pub async fn settle(self) -> Outcome {
        for handle in self.background {
            let _ = handle.await;
        }
        self.outcome
    }
}

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub default_api_key: String,
    pub poll: PollSettings,
    pub resolution: String,
    pub output_format: String,
}

/// External collaborators, each behind a trait so backends can be swapped.
#[derive(Clone)]
pub struct Collaborators {
    pub store: Arc<dyn Datastore>,
    pub provider: Arc<dyn GenerationProvider>,
    pub file_host: Arc<dyn FileHost>,
    pub storage: Arc<dyn ObjectStorage>,
    pub assets: Arc<dyn AssetSource>,
    pub notifier: Arc<dyn Notifier>,
}

#[derive(Clone)]
pub struct GenerationService {
    deps: Collaborators,
    settings: PipelineSettings,
}

impl GenerationService {
    pub fn new(deps: Collaborators, settings: PipelineSettings) -> Self {
        GenerationService { deps, settings }
    }

    pub async fn handle(&self, request: GenerationRequest) -> AppResult<Completion> {
        match &request.action {
            Action::Create { user_photo } => self.create(&request, user_photo).await,
            Action::Check { task_id } => self.check(&request, task_id).await,
        }
    }

    async fn create(&self, request: &GenerationRequest, photo: &ImageInput) -> AppResult<Completion> {
        credits::gate(&*self.deps.store, request.event_id.as_deref()).await?;

        let key = keys::select(&*self.deps.store, &self.settings.default_api_key).await;

        let ingress = Ingress {
            file_host: self.deps.file_host.as_ref(),
            storage: self.deps.storage.as_ref(),
        };
        let image_url = ingress.resolve(&key.secret, photo, request.owner_id()).await?;

        let prompt = prompt::resolve(&*self.deps.store, &request.style_id).await;
        let task = CreateTask {
            prompt,
            image_url,
            aspect_ratio: request.aspect_ratio.clone(),
            resolution: self.settings.resolution.clone(),
            output_format: self.settings.output_format.clone(),
        };
        let task_id = self.deps.provider.create_task(&key.secret, &task).await?;
        tracing::info!(%task_id, style_id = %request.style_id, "generation task created");

        let mut background = Vec::new();
        background.extend(keys::mark_used(Arc::clone(&self.deps.store), &key));

        let mut completion = self.poll_and_finish(request, &key, &task_id).await?;
        completion.background.extend(background);
        Ok(completion)
    }

    async fn check(&self, request: &GenerationRequest, task_id: &str) -> AppResult<Completion> {
        if let Some(image_url) = self.recorded_url(task_id).await {
            return Ok(Completion::new(Outcome::Completed { image_url }));
        }
        let key = keys::select(&*self.deps.store, &self.settings.default_api_key).await;
        self.poll_and_finish(request, &key, task_id).await
    }

    async fn recorded_url(&self, task_id: &str) -> Option<String> {
        match self.deps.store.find_by_task(task_id).await {
            Ok(record) => {
                let record = record?;
                tracing::debug!(%task_id, "task already recorded");
                Some(record.image_url)
            }
            Err(err) => {
                tracing::warn!(%task_id, error = %err, "record lookup failed");
                None
            }
        }
    }

    async fn poll_and_finish(
        &self,
        request: &GenerationRequest,
        key: &SelectedKey,
        task_id: &str,
    ) -> AppResult<Completion> {
        let mut job = GenerationJob::pending(task_id);
        let outcome = poller::poll(
            self.deps.provider.as_ref(),
            &key.secret,
            &mut job,
            self.settings.poll,
        )
        .await?;

        match outcome {
            PollOutcome::Waiting => Ok(Completion::new(Outcome::Waiting {
                task_id: task_id.to_string(),
            })),
            PollOutcome::Failed { message } => Err(GenerationError::TaskFailed(message)),
            PollOutcome::Succeeded { result_url } => {
                // Another invocation may have finished this task while we polled.
                if let Some(image_url) = self.recorded_url(task_id).await {
                    return Ok(Completion::new(Outcome::Completed { image_url }));
                }
                let persister = ResultPersister {
                    assets: self.deps.assets.as_ref(),
                    storage: self.deps.storage.as_ref(),
                };
                let image_url = persister.persist(&result_url, request.owner_id()).await;
                let record = GenerationRecord::new(request, task_id, &image_url);
                match fanout::record(&*self.deps.store, record).await {
                    Recorded::Existing(image_url) => {
                        Ok(Completion::new(Outcome::Completed { image_url }))
                    }
                    Recorded::Inserted | Recorded::Failed => {
                        let handle = fanout::notify(
                            Arc::clone(&self.deps.notifier),
                            request.clone(),
                            task_id.to_string(),
                            image_url.clone(),
                        );
                        Ok(Completion {
                            outcome: Outcome::Completed { image_url },
                            background: vec![handle],
                        })
                    }
                }
            }
        }
    }
}
