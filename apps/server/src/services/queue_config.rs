use medqueue_core::normalize_service_type;
use uuid::Uuid;

use super::QueueContext;
use crate::models::{QueueConfig, QueueConfigRequest};
use crate::Result;

/// Admin-managed per-service settings. Unconfigured service types resolve to defaults.
#[derive(Debug, Clone)]
pub struct QueueConfigService {
    ctx: QueueContext,
}

impl QueueConfigService {
    pub fn new(ctx: QueueContext) -> Self {
        Self { ctx }
    }

    /// Stored configuration, or the defaults for `service_type`.
    pub async fn effective(&self, hospital_id: Uuid, service_type: &str) -> Result<QueueConfig> {
        Ok(self
            .ctx
            .store
            .get_queue_config(hospital_id, service_type)
            .await?
            .unwrap_or_else(|| QueueConfig::defaults_for(hospital_id, service_type, &self.ctx.settings)))
    }

    pub async fn list(&self, hospital_id: Uuid) -> Result<Vec<QueueConfig>> {
        self.ctx.store.list_queue_configs(hospital_id).await
    }

    #[tracing::instrument(skip(self, request), fields(service_type = %request.service_type))]
    pub async fn put(
        &self,
        hospital_id: Uuid,
        staff_id: Option<Uuid>,
        request: QueueConfigRequest,
    ) -> Result<QueueConfig> {
        let service_type = normalize_service_type(&request.service_type)?;
        let mut config = self.effective(hospital_id, &service_type).await?;

        if let Some(prefix) = request.prefix {
            config.prefix = prefix.to_ascii_uppercase();
        }
        if let Some(avg) = request.avg_service_time {
            config.avg_service_time = avg;
        }
        if let Some(max_wait) = request.max_wait_time {
            config.max_wait_time = max_wait;
        }
        if let Some(enabled) = request.priority_enabled {
            config.priority_enabled = enabled;
        }
        if let Some(length) = request.alert_queue_length {
            config.alert_queue_length = length;
        }
        if let Some(wait) = request.alert_wait_time {
            config.alert_wait_time = wait;
        }
        if let Some(padding) = request.number_padding {
            config.number_padding = padding;
        }
        config.updated_at = Some(self.ctx.now());
        config.updated_by = staff_id;

        self.ctx.store.upsert_queue_config(&config).await?;
        tracing::info!(hospital_id = %hospital_id, "Queue configuration updated");
        Ok(config)
    }
}
