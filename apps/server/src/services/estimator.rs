//! Wait-time estimation over live store data

use chrono::Duration;
use medqueue_core::{average_service_time, estimate_wait_minutes, Priority, WaitEstimateInput};
use uuid::Uuid;

use super::{QueueConfigService, QueueContext};
use crate::Result;

#[derive(Debug, Clone)]
pub struct WaitEstimator {
    ctx: QueueContext,
    configs: QueueConfigService,
}

impl WaitEstimator {
    pub fn new(ctx: QueueContext, configs: QueueConfigService) -> Self {
        Self { ctx, configs }
    }

    /// Mean service time of the rolling window, falling back to the configured average.
    pub async fn average_service_minutes(&self, hospital_id: Uuid, service_type: &str) -> Result<f64> {
        let since = self.ctx.now() - Duration::minutes(self.ctx.settings.rolling_window_minutes);
        let samples = self
            .ctx
            .store
            .recent_completed_service_times(hospital_id, service_type, since)
            .await?;
        let default = self
            .configs
            .effective(hospital_id, service_type)
            .await?
            .avg_service_time;
        Ok(average_service_time(&samples, default))
    }

    pub async fn estimate(
        &self,
        hospital_id: Uuid,
        service_type: &str,
        queue_position: i32,
        priority: Priority,
    ) -> Result<i32> {
        let avg_service_minutes = self.average_service_minutes(hospital_id, service_type).await?;
        let active_counters = self
            .ctx
            .store
            .active_counter_count(hospital_id, service_type)
            .await?;

        Ok(estimate_wait_minutes(WaitEstimateInput {
            queue_position,
            avg_service_minutes,
            active_counters,
            priority,
        }))
    }
}
