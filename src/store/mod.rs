//! Datastore seam.
//!
//! The workflow only touches four concerns of the hosted datastore: the per-event
//! credit ledger, the credential pool, the style prompt table and the generation
//! records. Each is a small async trait; `Datastore` bundles them so handlers
//! can carry a single `Arc<dyn Datastore>`.
//!
//! Two backends exist: `memory::InMemoryStore` for development and tests, and
//! `rest::RestStore` which talks to the hosted Postgres REST surface.
use async_trait::async_trait;

use crate::error::StoreResult;
use crate::model::{ApiCredential, EventCreditBalance, GenerationRecord};

pub mod memory;
pub mod rest;

/// Outcome of an atomic test-and-increment on an event's credit counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreditDecision {
    Granted,
    Exhausted,
    UnknownEvent,
}

#[async_trait]
pub trait CreditLedger: Send + Sync {
    /// Increment `used` by one iff `used < allocated`, in a single atomic step.
    async fn consume_credit(&self, event_id: &str) -> StoreResult<CreditDecision>;
    async fn balance(&self, event_id: &str) -> StoreResult<Option<EventCreditBalance>>;
}

#[async_trait]
pub trait KeyPool: Send + Sync {
    /// Active credential with the oldest `last_used_at` (never-used first).
    async fn least_recently_used(&self) -> StoreResult<Option<ApiCredential>>;
    /// Stamp `last_used_at = now` and `usage_count = 1`.
    async fn touch(&self, credential_id: &str) -> StoreResult<()>;
}

#[async_trait]
pub trait StyleCatalog: Send + Sync {
    async fn style_prompt(&self, style_id: &str) -> StoreResult<Option<String>>;
}

#[async_trait]
pub trait GenerationRecords: Send + Sync {
    /// Insert unless a record for the same `task_id` exists. Returns whether a row was written.
    async fn insert_record(&self, record: GenerationRecord) -> StoreResult<bool>;
    async fn find_by_task(&self, task_id: &str) -> StoreResult<Option<GenerationRecord>>;
}

pub trait Datastore: CreditLedger + KeyPool + StyleCatalog + GenerationRecords {}

impl<T> Datastore for T where T: CreditLedger + KeyPool + StyleCatalog + GenerationRecords {}
