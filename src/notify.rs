//! Side-channel notifications sent after a portrait is ready.
//!
//! Dispatch is always detached from the request; see `pipeline::fanout`.
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use crate::error::StoreResult;
use crate::store::rest::{ensure_success, with_service_key};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "channel", rename_all = "lowercase")]
pub enum Notification {
    Push { recipient_id: String, image_url: String },
    Email { to: String, image_url: String },
    Sms { to: String, image_url: String },
}

impl Notification {
    /// Name of the serverless function handling this channel.
    pub fn function_name(&self) -> &'static str {
        match self {
            Notification::Push { .. } => "send-push-notification",
            Notification::Email { .. } => "send-email",
            Notification::Sms { .. } => "send-sms",
        }
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn dispatch(&self, notification: Notification) -> StoreResult<()>;
}

/// Invokes the hosted notification functions at `/functions/v1/<name>`.
#[derive(Clone)]
pub struct FunctionNotifier {
    client: Client,
    base_url: String,
    service_key: String,
}

impl FunctionNotifier {
    pub fn new(client: Client, base_url: &str, service_key: &str) -> Self {
        FunctionNotifier {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            service_key: service_key.to_string(),
        }
    }
}

#[async_trait]
impl Notifier for FunctionNotifier {
    async fn dispatch(&self, notification: Notification) -> StoreResult<()> {
        let name = notification.function_name();
        let url = format!("{}/functions/v1/{}", self.base_url, name);
        let response = with_service_key(self.client.post(&url), &self.service_key)
            .json(&notification)
            .send()
            .await?;
        ensure_success(response, name).await?;
        Ok(())
    }
}

/// Used when no hosted backend is configured.
#[derive(Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn dispatch(&self, notification: Notification) -> StoreResult<()> {
        // Recipients are contact details; only the channel is logged.
        tracing::info!(channel = notification.function_name(), "notification");
        Ok(())
    }
}
