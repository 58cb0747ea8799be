//! Portrait generation pipeline library
//!
//! Modules:
//! - `api`: Axum router, handlers and wire types for `POST /generate`.
//! - `pipeline`: The create/check workflow and its stages.
//! - `provider`: Clients for the generation API and the primary file host.
//! - `store`: Datastore traits with in-memory and hosted REST backends.
//! - `storage`: Object bucket and asset download seams.
//! - `notify`: Push/email/SMS side channels.
//! - `model`: Domain types.
//! - `config`: Env-driven configuration loader.
//! - `error`: Common error types and aliases.
//!
//! Re-exports are provided for common types: `Config`, `GenerationService`,
//! `GenerationClient` and `InMemoryStore`.
pub mod api;
pub mod config;
pub mod error;
pub mod model;
pub mod notify;
pub mod pipeline;
pub mod provider;
pub mod storage;
pub mod store;

pub use config::Config;
pub use pipeline::GenerationService;
pub use provider::client::GenerationClient;
pub use store::memory::InMemoryStore;
