//! In-memory datastore.
//!
//! Backs local development and the test suite. State lives in `HashMap`s
//! behind `tokio::sync::RwLock`; nothing survives a restart. The credit
//! test-and-increment runs under a single write lock, which gives the same
//! atomicity the hosted backend gets from its conditional update.
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::{CreditDecision, CreditLedger, GenerationRecords, KeyPool, StyleCatalog};
use crate::error::{StoreError, StoreResult};
use crate::model::{ApiCredential, EventCreditBalance, GenerationRecord};

#[derive(Clone, Default)]
pub struct InMemoryStore {
    balances: Arc<RwLock<HashMap<String, EventCreditBalance>>>,
    credentials: Arc<RwLock<Vec<ApiCredential>>>,
    styles: Arc<RwLock<HashMap<String, String>>>,
    /// Records keyed by task id.
    records: Arc<RwLock<HashMap<String, GenerationRecord>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn put_event(&self, event_id: &str, allocated: i64, used: i64) {
        self.balances.write().await.insert(
            event_id.to_string(),
            EventCreditBalance {
                event_id: event_id.to_string(),
                allocated,
                used,
            },
        );
    }

    pub async fn put_credential(&self, credential: ApiCredential) {
        let mut creds = self.credentials.write().await;
        creds.retain(|c| c.id != credential.id);
        creds.push(credential);
    }

    pub async fn put_style(&self, style_id: &str, prompt: &str) {
        self.styles
            .write()
            .await
            .insert(style_id.to_string(), prompt.to_string());
    }

    pub async fn credential(&self, credential_id: &str) -> Option<ApiCredential> {
        self.credentials
            .read()
            .await
            .iter()
            .find(|c| c.id == credential_id)
            .cloned()
    }

    pub async fn record_count(&self) -> usize {
        self.records.read().await.len()
    }
}

#[async_trait]
impl CreditLedger for InMemoryStore {
    async fn consume_credit(&self, event_id: &str) -> StoreResult<CreditDecision> {
        let mut balances = self.balances.write().await;
        let Some(balance) = balances.get_mut(event_id) else {
            return Ok(CreditDecision::UnknownEvent);
        };
        if balance.used >= balance.allocated {
            return Ok(CreditDecision::Exhausted);
        }
        balance.used += 1;
        Ok(CreditDecision::Granted)
    }

    async fn balance(&self, event_id: &str) -> StoreResult<Option<EventCreditBalance>> {
        Ok(self.balances.read().await.get(event_id).cloned())
    }
}

#[async_trait]
impl KeyPool for InMemoryStore {
    async fn least_recently_used(&self) -> StoreResult<Option<ApiCredential>> {
        let creds = self.credentials.read().await;
        // `None < Some(_)`, so never-used credentials sort first.
        Ok(creds
            .iter()
            .filter(|c| c.is_active)
            .min_by_key(|c| c.last_used_at)
            .cloned())
    }

    async fn touch(&self, credential_id: &str) -> StoreResult<()> {
        let mut creds = self.credentials.write().await;
        let cred = creds
            .iter_mut()
            .find(|c| c.id == credential_id)
            .ok_or_else(|| StoreError::NotFound(format!("credential {credential_id}")))?;
        cred.last_used_at = Some(Utc::now());
        cred.usage_count = 1;
        Ok(())
    }
}

#[async_trait]
impl StyleCatalog for InMemoryStore {
    async fn style_prompt(&self, style_id: &str) -> StoreResult<Option<String>> {
        Ok(self.styles.read().await.get(style_id).cloned())
    }
}

#[async_trait]
impl GenerationRecords for InMemoryStore {
    async fn insert_record(&self, record: GenerationRecord) -> StoreResult<bool> {
        let mut records = self.records.write().await;
        if records.contains_key(&record.task_id) {
            return Ok(false);
        }
        records.insert(record.task_id.clone(), record);
        Ok(true)
    }

    async fn find_by_task(&self, task_id: &str) -> StoreResult<Option<GenerationRecord>> {
        Ok(self.records.read().await.get(task_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn cred(id: &str, last_used_minutes_ago: Option<i64>, active: bool) -> ApiCredential {
        ApiCredential {
            id: id.to_string(),
            secret_value: format!("secret-{id}"),
            last_used_at: last_used_minutes_ago.map(|m| Utc::now() - Duration::minutes(m)),
            usage_count: 7,
            is_active: active,
        }
    }

    #[tokio::test]
    async fn consume_credit_stops_at_allocation() {
        let store = InMemoryStore::new();
        store.put_event("evt", 2, 1).await;
        assert_eq!(store.consume_credit("evt").await.unwrap(), CreditDecision::Granted);
        assert_eq!(store.consume_credit("evt").await.unwrap(), CreditDecision::Exhausted);
        assert_eq!(store.balance("evt").await.unwrap().unwrap().used, 2);
        assert_eq!(
            store.consume_credit("other").await.unwrap(),
            CreditDecision::UnknownEvent
        );
    }

    #[tokio::test]
    async fn concurrent_consumers_never_overspend() {
        let store = InMemoryStore::new();
        store.put_event("evt", 10, 0).await;
        let mut handles = Vec::new();
        for _ in 0..25 {
            let store = store.clone();
            handles.push(tokio::spawn(async move { store.consume_credit("evt").await }));
        }
        let mut granted = 0;
        for handle in handles {
            if handle.await.unwrap().unwrap() == CreditDecision::Granted {
                granted += 1;
            }
        }
        assert_eq!(granted, 10);
        assert_eq!(store.balance("evt").await.unwrap().unwrap().used, 10);
    }

    #[tokio::test]
    async fn least_recently_used_prefers_never_used_then_oldest() {
        let store = InMemoryStore::new();
        store.put_credential(cred("recent", Some(1), true)).await;
        store.put_credential(cred("old", Some(60), true)).await;
        store.put_credential(cred("inactive", None, false)).await;
        assert_eq!(store.least_recently_used().await.unwrap().unwrap().id, "old");

        store.put_credential(cred("fresh", None, true)).await;
        assert_eq!(store.least_recently_used().await.unwrap().unwrap().id, "fresh");
    }

    #[tokio::test]
    async fn touch_sets_literal_usage_count() {
        let store = InMemoryStore::new();
        store.put_credential(cred("k1", None, true)).await;
        store.touch("k1").await.unwrap();
        let updated = store.credential("k1").await.unwrap();
        assert_eq!(updated.usage_count, 1);
        assert!(updated.last_used_at.is_some());
        assert!(matches!(store.touch("missing").await, Err(StoreError::NotFound(_))));
    }
}
