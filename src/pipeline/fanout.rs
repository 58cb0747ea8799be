//! Post-success work: the generation record, then detached notifications.
//!
//! The record insert is awaited so that a later `check` for the same task sees
//! it. Notifications run on their own task after the response value is known
//! and nothing they do can change what the caller receives.
use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::model::{GenerationRecord, GenerationRequest};
use crate::notify::{Notification, Notifier};
use crate::store::GenerationRecords;

/// Notifications owed for a finished portrait, based on the contact fields supplied.
pub fn notifications_for(request: &GenerationRequest, image_url: &str) -> Vec<Notification> {
    let mut out = Vec::new();
    if let Some(owner) = request.owner_id() {
        out.push(Notification::Push {
            recipient_id: owner.to_string(),
            image_url: image_url.to_string(),
        });
    }
    if let Some(email) = request.contact_email.as_deref().filter(|e| !e.trim().is_empty()) {
        out.push(Notification::Email {
            to: email.trim().to_string(),
            image_url: image_url.to_string(),
        });
    }
    if let Some(phone) = request.contact_phone.as_deref().filter(|p| !p.trim().is_empty()) {
        out.push(Notification::Sms {
            to: phone.trim().to_string(),
            image_url: image_url.to_string(),
        });
    }
    out
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recorded {
    /// This invocation wrote the record.
    Inserted,
    /// Another invocation recorded the task first; carries its image URL.
    Existing(String),
    /// The insert failed. Logged, the result still stands.
    Failed,
}

/// Insert the record for a finished job unless the task is already recorded.
pub async fn record<R>(records: &R, record: GenerationRecord) -> Recorded
where
    R: GenerationRecords + ?Sized,
{
    let task_id = record.task_id.clone();
    let image_url = record.image_url.clone();
    match records.insert_record(record).await {
        Ok(true) => {
            tracing::info!(%task_id, "generation record stored");
            Recorded::Inserted
        }
        Ok(false) => match records.find_by_task(&task_id).await {
            Ok(Some(existing)) => {
                tracing::debug!(%task_id, "generation record already present");
                Recorded::Existing(existing.image_url)
            }
            Ok(None) => {
                tracing::warn!(%task_id, "duplicate insert but no record found");
                Recorded::Existing(image_url)
            }
            Err(err) => {
                tracing::warn!(%task_id, error = %err, "failed to read existing generation record");
                Recorded::Existing(image_url)
            }
        },
        Err(err) => {
            tracing::warn!(%task_id, error = %err, "failed to store generation record");
            Recorded::Failed
        }
    }
}

/// Send every owed notification on a detached task. Failures are logged only.
pub fn notify(
    notifier: Arc<dyn Notifier>,
    request: GenerationRequest,
    task_id: String,
    image_url: String,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        for notification in notifications_for(&request, &image_url) {
            let channel = notification.function_name();
            if let Err(err) = notifier.dispatch(notification).await {
                tracing::warn!(%task_id, channel, error = %err, "notification failed");
            }
        }
    })
}
