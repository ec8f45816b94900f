use medqueue_core::least_loaded;
use uuid::Uuid;

use super::QueueContext;
use crate::Result;

/// Suggests the least-loaded active counter for a service type.
///
/// The suggestion is advisory; no counter is not an error.
#[derive(Debug, Clone)]
pub struct LoadBalancer {
    ctx: QueueContext,
}

impl LoadBalancer {
    pub fn new(ctx: QueueContext) -> Self {
        Self { ctx }
    }

    pub async fn recommend(&self, hospital_id: Uuid, service_type: &str) -> Result<Option<Uuid>> {
        let today = self.ctx.today();
        let loads = self
            .ctx
            .store
            .counter_loads(hospital_id, service_type, today.start, today.end)
            .await?;
        Ok(least_loaded(&loads))
    }
}
