//! Position-threshold notifications
//!
//! Delivery (SMS and the like) belongs to another subsystem. The queue only hands a
//! [`PositionNotice`] to a [`QueueNotifier`] from a background task; a slow or failing
//! notifier never delays dispatch.

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

/// A patient moved close to the front of the queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionNotice {
    pub hospital_id: Uuid,
    pub ticket_id: Uuid,
    pub token_display: String,
    pub service_type: String,
    pub position: i32,
    pub patient_phone: Option<String>,
}

#[async_trait]
pub trait QueueNotifier: Send + Sync + std::fmt::Debug {
    async fn position_reached(&self, notice: PositionNotice) -> anyhow::Result<()>;
}

/// Default notifier: records the notice in the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingNotifier;

#[async_trait]
impl QueueNotifier for LoggingNotifier {
    async fn position_reached(&self, notice: PositionNotice) -> anyhow::Result<()> {
        tracing::info!(
            hospital_id = %notice.hospital_id,
            ticket_id = %notice.ticket_id,
            token = %notice.token_display,
            position = notice.position,
            has_phone = notice.patient_phone.is_some(),
            "Patient is near the front of the queue"
        );
        Ok(())
    }
}

/// Fire-and-forget front end of a [`QueueNotifier`].
#[derive(Debug, Clone)]
pub struct NotificationDispatcher {
    sender: mpsc::Sender<PositionNotice>,
}

impl NotificationDispatcher {
    /// Spawn the delivery task. Must be called inside a tokio runtime.
    pub fn spawn(notifier: Arc<dyn QueueNotifier>) -> Self {
        let (sender, mut receiver) = mpsc::channel::<PositionNotice>(1024);

        tokio::spawn(async move {
            while let Some(notice) = receiver.recv().await {
                let ticket_id = notice.ticket_id;
                if let Err(e) = notifier.position_reached(notice).await {
                    tracing::warn!(ticket_id = %ticket_id, error = %e, "Queue notification failed");
                }
            }
        });

        Self { sender }
    }

    /// Queue a notice; dropped with a warning when the buffer is full.
    pub fn notify(&self, notice: PositionNotice) {
        if let Err(e) = self.sender.try_send(notice) {
            tracing::warn!(error = %e, "Dropping queue notification");
        }
    }
}
