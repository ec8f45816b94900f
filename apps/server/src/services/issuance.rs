//! Ticket issuance
//!
//! Two phases: the store allocates number and position atomically, then the
//! estimate and counter recommendation are attached best-effort.

use medqueue_core::{normalize_service_type, score_category, Priority, Ticket, UrgencyLevel};
use std::time::Duration;
use uuid::Uuid;

use super::{AnalyticsService, LoadBalancer, QueueConfigService, QueueContext, WaitEstimator};
use crate::metrics::{QUEUE_RETRIES_TOTAL, TICKETS_ISSUED_TOTAL};
use crate::models::{normalize_phone, IssueTicketRequest, TicketDraft};
use crate::{Error, Result};

#[derive(Debug, Clone)]
pub struct IssuanceService {
    ctx: QueueContext,
    configs: QueueConfigService,
    estimator: WaitEstimator,
    balancer: LoadBalancer,
    analytics: AnalyticsService,
}

impl IssuanceService {
    pub fn new(
        ctx: QueueContext,
        configs: QueueConfigService,
        estimator: WaitEstimator,
        balancer: LoadBalancer,
        analytics: AnalyticsService,
    ) -> Self {
        Self {
            ctx,
            configs,
            estimator,
            balancer,
            analytics,
        }
    }

    #[tracing::instrument(skip(self, request), fields(service_type = %request.service_type))]
    pub async fn issue(
        &self,
        hospital_id: Uuid,
        staff_id: Option<Uuid>,
        request: IssueTicketRequest,
    ) -> Result<Ticket> {
        let service_type = normalize_service_type(&request.service_type)?;
        let config = self.configs.effective(hospital_id, &service_type).await?;

        let raw_priority = request.priority.as_deref().unwrap_or(Priority::Normal.as_str());
        let priority = Priority::parse_lenient(raw_priority).unwrap_or_default();
        let urgency_level = request
            .urgency_level
            .as_deref()
            .and_then(UrgencyLevel::parse);
        let priority_score = if config.priority_enabled {
            score_category(raw_priority, request.urgency_level.as_deref())
        } else {
            Priority::Normal.base_score()
        };

        let now = self.ctx.now();
        let today = self.ctx.day_window(now);
        let draft = TicketDraft {
            id: Uuid::new_v4(),
            hospital_id,
            service_type: service_type.clone(),
            issue_day: today.day,
            day_start: today.start,
            day_end: today.end,
            token_format: config.token_format(),
            priority,
            urgency_level: urgency_level.map(|u| u.as_str().to_string()),
            priority_score,
            patient_id: request.patient_id,
            appointment_id: request.appointment_id,
            department_id: request.department_id,
            patient_name: request.patient_name,
            patient_phone: request.patient_phone.as_deref().and_then(normalize_phone),
            notes: request.notes,
            created_by: staff_id,
            issued_at: now,
            provisional_wait_minutes: self.ctx.settings.provisional_wait_minutes,
        };

        let mut ticket = self.insert_with_retry(draft).await?;

        TICKETS_ISSUED_TOTAL
            .with_label_values(&[&ticket.service_type, ticket.priority.as_str()])
            .inc();
        tracing::info!(
            hospital_id = %hospital_id,
            ticket_id = %ticket.id,
            token = %ticket.token_display,
            position = ticket.queue_position,
            priority_score = ticket.priority_score,
            "Ticket issued"
        );

        if let Err(e) = self.enrich(&mut ticket).await {
            tracing::warn!(ticket_id = %ticket.id, error = %e, "Ticket enrichment failed");
        }
        self.analytics.refresh_quietly(&ticket).await;

        Ok(ticket)
    }

    async fn insert_with_retry(&self, draft: TicketDraft) -> Result<Ticket> {
        let max_retries = self.ctx.settings.issue_max_retries;
        let mut attempt = 0u32;
        loop {
            match self.ctx.store.issue_ticket(draft.clone()).await {
                Ok(ticket) => return Ok(ticket),
                Err(e) if e.is_retryable() && attempt < max_retries => {
                    QUEUE_RETRIES_TOTAL.with_label_values(&["issue"]).inc();
                    let backoff = self
                        .ctx
                        .settings
                        .issue_retry_base_ms
                        .saturating_mul(1u64 << attempt.min(16));
                    tracing::debug!(
                        attempt,
                        backoff_ms = backoff,
                        error = %e,
                        "Retrying ticket issuance"
                    );
                    tokio::time::sleep(Duration::from_millis(backoff)).await;
                    attempt += 1;
                }
                Err(e) if e.is_retryable() => {
                    return Err(Error::Transient(format!(
                        "ticket issuance kept conflicting after {} retries",
                        max_retries
                    )));
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn enrich(&self, ticket: &mut Ticket) -> Result<()> {
        let estimate = self
            .estimator
            .estimate(
                ticket.hospital_id,
                &ticket.service_type,
                ticket.queue_position,
                ticket.priority,
            )
            .await?;
        let recommended = self
            .balancer
            .recommend(ticket.hospital_id, &ticket.service_type)
            .await?;

        self.ctx
            .store
            .set_ticket_enrichment(ticket.id, estimate, recommended)
            .await?;
        ticket.estimated_wait_time = estimate;
        ticket.ai_recommended_counter = recommended;
        Ok(())
    }
}
