//! Credential rotation over the API key pool.
//!
//! Selection is a load-spreading hint only: two concurrent requests may pick
//! the same key, and the post-use update is last-write-wins.
use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::store::{Datastore, KeyPool};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedKey {
    /// `None` when the static default credential is in use.
    pub credential_id: Option<String>,
    pub secret: String,
}

/// Least-recently-used active key, or `default_secret` if the pool is empty or unreachable.
pub async fn select<P>(pool: &P, default_secret: &str) -> SelectedKey
where
    P: KeyPool + ?Sized,
{
    let fallback = || SelectedKey {
        credential_id: None,
        secret: default_secret.to_string(),
    };
    match pool.least_recently_used().await {
        Ok(Some(cred)) if !cred.secret_value.is_empty() => {
            tracing::debug!(credential_id = %cred.id, "selected pooled credential");
            SelectedKey {
                credential_id: Some(cred.id),
                secret: cred.secret_value,
            }
        }
        Ok(_) => {
            tracing::debug!("key pool empty, using default credential");
            fallback()
        }
        Err(err) => {
            tracing::warn!(error = %err, "key pool lookup failed, using default credential");
            fallback()
        }
    }
}

/// Stamp the key as used without blocking the caller. Errors are logged only.
pub fn mark_used(pool: Arc<dyn Datastore>, key: &SelectedKey) -> Option<JoinHandle<()>> {
    let credential_id = key.credential_id.clone()?;
    Some(tokio::spawn(async move {
        if let Err(err) = pool.touch(&credential_id).await {
            tracing::warn!(%credential_id, error = %err, "failed to update credential usage");
        }
    }))
}
