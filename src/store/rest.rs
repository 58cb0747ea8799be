//! Datastore backed by the hosted Postgres REST surface.
//!
//! - Credits go through the `consume_event_credit` RPC, a single conditional
//!   `UPDATE ... WHERE used < allocated` on the server.
//! - Credential rotation reads `api_keys` ordered by `last_used_at` ascending.
//! - Generation records are inserted with `resolution=ignore-duplicates`
//!   against the unique `task_id` column.
use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::{json, Value};

use super::{CreditDecision, CreditLedger, GenerationRecords, KeyPool, StyleCatalog};
use crate::error::{StoreError, StoreResult};
use crate::model::{ApiCredential, EventCreditBalance, GenerationRecord};

#[derive(Clone)]
pub struct RestStore {
    client: Client,
    base_url: String,
    service_key: String,
}

#[derive(Deserialize)]
struct StyleRow {
    prompt: Option<String>,
}

#[derive(Deserialize)]
struct EventRow {
    id: String,
    credits_allocated: i64,
    credits_used: i64,
}

impl RestStore {
    pub fn new(client: Client, base_url: &str, service_key: &str) -> Self {
        RestStore {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            service_key: service_key.to_string(),
        }
    }

    fn table(&self, name: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, name)
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        with_service_key(builder, &self.service_key)
    }

    async fn rows<T: for<'de> Deserialize<'de>>(
        &self,
        table: &str,
        query: &[(&str, &str)],
    ) -> StoreResult<Vec<T>> {
        let response = self
            .authorize(self.client.get(self.table(table)))
            .query(query)
            .send()
            .await?;
        let response = ensure_success(response, table).await?;
        Ok(response.json().await?)
    }
}

/// Attach the privileged key the hosted backend expects on every call.
pub(crate) fn with_service_key(builder: RequestBuilder, key: &str) -> RequestBuilder {
    builder
        .header("apikey", key)
        .header("Authorization", format!("Bearer {}", key))
}

pub(crate) async fn ensure_success(response: Response, what: &str) -> StoreResult<Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unable to read error body".to_string());
    Err(StoreError::Backend(format!("{what}: status {status}, body {body}")))
}

#[async_trait]
impl CreditLedger for RestStore {
    async fn consume_credit(&self, event_id: &str) -> StoreResult<CreditDecision> {
        let url = format!("{}/rest/v1/rpc/consume_event_credit", self.base_url);
        let response = self
            .authorize(self.client.post(&url))
            .json(&json!({ "p_event_id": event_id }))
            .send()
            .await?;
        let response = ensure_success(response, "consume_event_credit").await?;
        let decision: Value = response.json().await?;
        // The function returns NULL when the event row does not exist.
        match decision {
            Value::Bool(true) => Ok(CreditDecision::Granted),
            Value::Bool(false) => Ok(CreditDecision::Exhausted),
            Value::Null => Ok(CreditDecision::UnknownEvent),
            other => Err(StoreError::Backend(format!(
                "consume_event_credit returned unexpected value {other}"
            ))),
        }
    }

    async fn balance(&self, event_id: &str) -> StoreResult<Option<EventCreditBalance>> {
        let filter = format!("eq.{event_id}");
        let rows: Vec<EventRow> = self
            .rows(
                "events",
                &[
                    ("id", filter.as_str()),
                    ("select", "id,credits_allocated,credits_used"),
                ],
            )
            .await?;
        Ok(rows.into_iter().next().map(|row| EventCreditBalance {
            event_id: row.id,
            allocated: row.credits_allocated,
            used: row.credits_used,
        }))
    }
}

#[async_trait]
impl KeyPool for RestStore {
    async fn least_recently_used(&self) -> StoreResult<Option<ApiCredential>> {
        let rows: Vec<ApiCredential> = self
            .rows(
                "api_keys",
                &[
                    ("is_active", "eq.true"),
                    ("order", "last_used_at.asc.nullsfirst"),
                    ("limit", "1"),
                ],
            )
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn touch(&self, credential_id: &str) -> StoreResult<()> {
        let filter = format!("eq.{credential_id}");
        let response = self
            .authorize(self.client.patch(self.table("api_keys")))
            .query(&[("id", filter.as_str())])
            .json(&json!({
                "last_used_at": Utc::now(),
                "usage_count": 1,
            }))
            .send()
            .await?;
        ensure_success(response, "api_keys").await?;
        Ok(())
    }
}

#[async_trait]
impl StyleCatalog for RestStore {
    async fn style_prompt(&self, style_id: &str) -> StoreResult<Option<String>> {
        let filter = format!("eq.{style_id}");
        let rows: Vec<StyleRow> = self
            .rows("styles", &[("id", filter.as_str()), ("select", "prompt")])
            .await?;
        Ok(rows
            .into_iter()
            .next()
            .and_then(|row| row.prompt)
            .filter(|p| !p.trim().is_empty()))
    }
}

#[async_trait]
impl GenerationRecords for RestStore {
    async fn insert_record(&self, record: GenerationRecord) -> StoreResult<bool> {
        let response = self
            .authorize(self.client.post(self.table("generations")))
            .query(&[("on_conflict", "task_id")])
            .header("Prefer", "resolution=ignore-duplicates,return=representation")
            .json(&record)
            .send()
            .await?;
        let response = ensure_success(response, "generations").await?;
        let inserted: Vec<Value> = response.json().await?;
        Ok(!inserted.is_empty())
    }

    async fn find_by_task(&self, task_id: &str) -> StoreResult<Option<GenerationRecord>> {
        let filter = format!("eq.{task_id}");
        let rows: Vec<GenerationRecord> = self
            .rows("generations", &[("task_id", filter.as_str()), ("limit", "1")])
            .await?;
        Ok(rows.into_iter().next())
    }
}
