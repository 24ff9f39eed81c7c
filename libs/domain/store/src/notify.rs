// [libs/domain/store/src/notify.rs]

//! Notification fan-out (§2 row H, §4.8): out of `spec.md`'s body text
//! beyond naming it, but required by the Page Monitor Engine's
//! "notify on change" behavior and the Task Manager's error reporting.
//! Grounded on `services/outbox_relay.rs`'s retry-relay shape.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};
use uuid::Uuid;

/// Retries a failed delivery at most this many times before the event is
/// logged and dropped, the same fixed attempt cap `outbox_relay.rs` uses.
const MAX_DELIVERY_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone, Serialize)]
pub enum NotificationKind {
    TaskFailed,
    TaskCompleted,
    PageChanged,
    NodeOffline,
}

#[derive(Debug, Clone, Serialize)]
pub struct NotificationEvent {
    pub id: Uuid,
    pub kind: NotificationKind,
    pub project_id: String,
    pub message: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("channel delivery failed after {attempts} attempts: {cause}")]
    DeliveryFailed { attempts: u32, cause: String },
}

/// One outbound destination for [`NotificationEvent`]s.
#[async_trait::async_trait]
pub trait NotificationChannel: Send + Sync {
    async fn send(&self, event: &NotificationEvent) -> Result<(), NotifyError>;
}

/// POSTs the event as JSON to a fixed webhook URL.
pub struct WebhookChannel {
    client: reqwest::Client,
    url: String,
}

impl WebhookChannel {
    pub fn new(url: impl Into<String>) -> Self {
        Self { client: reqwest::Client::new(), url: url.into() }
    }
}

#[async_trait::async_trait]
impl NotificationChannel for WebhookChannel {
    async fn send(&self, event: &NotificationEvent) -> Result<(), NotifyError> {
        self.client
            .post(&self.url)
            .json(event)
            .send()
            .await
            .map_err(|e| NotifyError::DeliveryFailed { attempts: 1, cause: e.to_string() })?
            .error_for_status()
            .map_err(|e| NotifyError::DeliveryFailed { attempts: 1, cause: e.to_string() })?;
        Ok(())
    }
}

/// Falls back to a structured log line. Used when no channel is configured
/// so the fan-out never silently drops an event.
pub struct LogChannel;

#[async_trait::async_trait]
impl NotificationChannel for LogChannel {
    async fn send(&self, event: &NotificationEvent) -> Result<(), NotifyError> {
        warn!(event_id = %event.id, project_id = %event.project_id, message = %event.message, "notification (no channel configured)");
        Ok(())
    }
}

/// Dispatches `event` to `channel`, retrying with the same
/// `retry_interval * 2^attempt` backoff §4.1 uses for task retries, capped
/// at [`MAX_DELIVERY_ATTEMPTS`], then logs and drops rather than propagating.
pub async fn dispatch(channel: &dyn NotificationChannel, event: NotificationEvent, retry_interval: Duration) {
    let mut attempt = 0;
    loop {
        match channel.send(&event).await {
            Ok(()) => return,
            Err(e) if attempt + 1 >= MAX_DELIVERY_ATTEMPTS => {
                error!(event_id = %event.id, error = %e, "notification delivery abandoned");
                return;
            }
            Err(e) => {
                warn!(event_id = %event.id, attempt, error = %e, "notification delivery failed, retrying");
                tokio::time::sleep(retry_interval * 2u32.pow(attempt)).await;
                attempt += 1;
            }
        }
    }
}
