use medqueue_core::{normalize_service_type, service_counter_type, Counter};
use uuid::Uuid;

use super::QueueContext;
use crate::models::{CreateCounterRequest, UpdateCounterRequest};
use crate::{Error, Result};

/// Counter administration. Ticket bindings are left to the dispatch service.
#[derive(Debug, Clone)]
pub struct CounterService {
    ctx: QueueContext,
}

fn normalize_counter_type(raw: Option<String>) -> Option<String> {
    raw.map(|t| service_counter_type(&t)).filter(|t| !t.is_empty())
}

fn normalize_services(raw: Vec<String>) -> Result<Vec<String>> {
    let mut services = raw
        .iter()
        .map(|s| normalize_service_type(s))
        .collect::<medqueue_core::Result<Vec<_>>>()?;
    services.sort();
    services.dedup();
    Ok(services)
}

impl CounterService {
    pub fn new(ctx: QueueContext) -> Self {
        Self { ctx }
    }

    #[tracing::instrument(skip(self, request), fields(counter_number = request.counter_number))]
    pub async fn create(&self, hospital_id: Uuid, request: CreateCounterRequest) -> Result<Counter> {
        let now = self.ctx.now();
        let counter = Counter {
            id: Uuid::new_v4(),
            hospital_id,
            counter_number: request.counter_number,
            counter_name: request.counter_name.trim().to_string(),
            counter_type: normalize_counter_type(request.counter_type),
            services_offered: normalize_services(request.services_offered)?,
            department_id: request.department_id,
            is_active: request.is_active.unwrap_or(true),
            current_ticket_id: None,
            current_staff_id: None,
            created_at: now,
            updated_at: now,
        };
        self.ctx.store.insert_counter(&counter).await?;
        tracing::info!(hospital_id = %hospital_id, counter_id = %counter.id, "Counter created");
        Ok(counter)
    }

    pub async fn list(&self, hospital_id: Uuid) -> Result<Vec<Counter>> {
        self.ctx.store.list_counters(hospital_id).await
    }

    #[tracing::instrument(skip(self, request), fields(hospital_id = %hospital_id, counter_id = %counter_id))]
    pub async fn update(
        &self,
        hospital_id: Uuid,
        counter_id: Uuid,
        request: UpdateCounterRequest,
    ) -> Result<Counter> {
        let mut counter = self
            .ctx
            .store
            .get_counter(hospital_id, counter_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("counter {counter_id}")))?;

        if let Some(name) = request.counter_name {
            counter.counter_name = name.trim().to_string();
        }
        if request.counter_type.is_some() {
            counter.counter_type = normalize_counter_type(request.counter_type);
        }
        if let Some(services) = request.services_offered {
            counter.services_offered = normalize_services(services)?;
        }
        if request.department_id.is_some() {
            counter.department_id = request.department_id;
        }
        if let Some(active) = request.is_active {
            counter.is_active = active;
        }
        counter.updated_at = self.ctx.now();

        if !self.ctx.store.update_counter_settings(&counter).await? {
            return Err(Error::InvalidState(format!(
                "counter {} is holding a ticket and cannot be deactivated",
                counter.counter_name
            )));
        }

        // Binding fields may have moved underneath us
        self.ctx
            .store
            .get_counter(hospital_id, counter_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("counter {counter_id}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_types_and_services() {
        assert_eq!(
            normalize_counter_type(Some("lab-oratory".to_string())),
            Some("LAB_ORATORY".to_string())
        );
        assert_eq!(normalize_counter_type(Some("  ".to_string())), None);
        assert_eq!(
            normalize_services(vec!["Pharmacy".into(), "pharmacy".into(), "X-Ray".into()]).unwrap(),
            vec!["pharmacy".to_string(), "x_ray".to_string()]
        );
        assert!(normalize_services(vec!["bad!".into()]).is_err());
    }
}
