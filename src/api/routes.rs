//! Router construction and shared state.
use axum::http::Method;
use axum::routing::{get, post};
use axum::Router;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};

use crate::api::handlers;
use crate::config::Config;
use crate::notify::{FunctionNotifier, LogNotifier};
use crate::pipeline::{Collaborators, GenerationService, PipelineSettings};
use crate::provider::client::{FileHostClient, GenerationClient};
use crate::storage::bucket::{BucketStorage, HttpAssetSource};
use crate::storage::InMemoryStorage;
use crate::store::memory::InMemoryStore;
use crate::store::rest::RestStore;

const HTTP_TIMEOUT: Duration = Duration::from_secs(60);

pub struct AppState {
    pub service: GenerationService,
    /// Process-local bucket, served under `/storage/<bucket>/` when no hosted
    /// backend is configured.
    pub local_objects: Option<LocalObjects>,
}

pub struct LocalObjects {
    pub bucket: String,
    pub storage: InMemoryStorage,
}

impl AppState {
    pub fn new(service: GenerationService) -> Self {
        AppState {
            service,
            local_objects: None,
        }
    }

    /// Wire every collaborator from configuration. Without `DATASTORE_URL` the
    /// datastore, bucket and notifier are process-local.
    pub fn from_config(config: &Config) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(HTTP_TIMEOUT).build()?;
        let provider = Arc::new(GenerationClient::new(
            client.clone(),
            &config.generation_api_url,
            &config.generation_model,
        ));
        let file_host = Arc::new(FileHostClient::new(client.clone(), &config.file_upload_url));
        let assets = Arc::new(HttpAssetSource::new(client.clone()));

        let mut local_objects = None;
        let deps = match config.datastore_url.as_deref() {
            Some(url) => {
                tracing::info!(datastore = %url, "using hosted datastore");
                let key = &config.datastore_service_key;
                Collaborators {
                    store: Arc::new(RestStore::new(client.clone(), url, key)),
                    provider,
                    file_host,
                    storage: Arc::new(BucketStorage::new(
                        client.clone(),
                        url,
                        key,
                        &config.storage_bucket,
                    )),
                    assets,
                    notifier: Arc::new(FunctionNotifier::new(client, url, key)),
                }
            }
            None => {
                tracing::warn!("DATASTORE_URL unset, using in-memory datastore");
                let public_base = format!(
                    "http://{}/storage/{}",
                    config.socket_address(),
                    config.storage_bucket
                );
                // Only reachable by the provider if the listen address is.
                tracing::warn!(%public_base, "fallback uploads are served by this process");
                let storage = InMemoryStorage::new(&public_base);
                local_objects = Some(LocalObjects {
                    bucket: config.storage_bucket.clone(),
                    storage: storage.clone(),
                });
                Collaborators {
                    store: Arc::new(InMemoryStore::new()),
                    provider,
                    file_host,
                    storage: Arc::new(storage),
                    assets,
                    notifier: Arc::new(LogNotifier),
                }
            }
        };

        let settings = PipelineSettings {
            default_api_key: config.generation_api_key.clone(),
            poll: config.poll,
            resolution: config.resolution.clone(),
            output_format: config.output_format.clone(),
        };
        Ok(AppState {
            service: GenerationService::new(deps, settings),
            local_objects,
        })
    }
}

pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::POST, Method::OPTIONS])
        .allow_headers(Any)
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .route("/generate", post(handlers::generate))
        .route("/storage/:bucket/*path", get(handlers::stored_object))
        .layer(cors_layer())
        .with_state(state)
}
