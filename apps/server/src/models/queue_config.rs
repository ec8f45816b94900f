//! Per-service queue configuration

use chrono::{DateTime, Utc};
use medqueue_core::{default_prefix, numbering::DEFAULT_PADDING, TokenFormat};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::QueueSettings;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueConfig {
    pub hospital_id: Uuid,
    pub service_type: String,
    pub prefix: String,
    /// Minutes; used when no completed tickets are inside the rolling window.
    pub avg_service_time: f64,
    pub max_wait_time: i32,
    /// When off, every ticket is scored as NORMAL and the queue is first-come first-served.
    pub priority_enabled: bool,
    pub alert_queue_length: i32,
    pub alert_wait_time: i32,
    pub number_padding: i32,
    pub updated_at: Option<DateTime<Utc>>,
    pub updated_by: Option<Uuid>,
}

impl QueueConfig {
    /// Effective configuration for a service type nobody has configured yet.
    pub fn defaults_for(hospital_id: Uuid, service_type: &str, settings: &QueueSettings) -> Self {
        Self {
            hospital_id,
            service_type: service_type.to_string(),
            prefix: default_prefix(service_type).to_string(),
            avg_service_time: settings.default_service_minutes,
            max_wait_time: 60,
            priority_enabled: true,
            alert_queue_length: 20,
            alert_wait_time: 45,
            number_padding: DEFAULT_PADDING as i32,
            updated_at: None,
            updated_by: None,
        }
    }

    pub fn token_format(&self) -> TokenFormat {
        TokenFormat::new(self.prefix.clone(), self.number_padding.max(1) as usize)
    }
}
