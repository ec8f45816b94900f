//! Hourly analytics roll-up
//!
//! Buckets are recomputed from their member tickets on every issuance and terminal
//! transition, so a refresh is idempotent and a missed one heals on the next event.

use medqueue_core::{compute_bucket, AnalyticsBucket, BucketKey, Ticket};

use super::QueueContext;
use crate::models::{AnalyticsQuery, TicketQuery};
use crate::Result;

#[derive(Debug, Clone)]
pub struct AnalyticsService {
    ctx: QueueContext,
}

impl AnalyticsService {
    pub fn new(ctx: QueueContext) -> Self {
        Self { ctx }
    }

    /// Recompute and store the bucket `ticket` belongs to.
    #[tracing::instrument(skip_all, fields(hospital_id = %ticket.hospital_id, ticket_id = %ticket.id))]
    pub async fn refresh_for(&self, ticket: &Ticket) -> Result<AnalyticsBucket> {
        let scope = self.ctx.scope();
        let key = BucketKey::for_ticket(ticket, &scope);
        let (from, until) = scope.hour_bounds(key.date, key.hour);

        let query = TicketQuery::for_hospital(key.hospital_id)
            .with_service_type(key.service_type.clone())
            .issued_between(from, until);
        let tickets = self.ctx.store.list_tickets(&query).await?;

        let bucket = compute_bucket(key, &tickets, &scope, self.ctx.now());
        self.ctx.store.upsert_analytics_bucket(&bucket).await?;
        tracing::debug!(
            date = %bucket.key.date,
            hour = bucket.key.hour,
            total_issued = bucket.total_issued,
            "Analytics bucket refreshed"
        );
        Ok(bucket)
    }

    /// Refresh without failing the caller; the next event recomputes the bucket anyway.
    pub async fn refresh_quietly(&self, ticket: &Ticket) {
        if let Err(e) = self.refresh_for(ticket).await {
            tracing::warn!(ticket_id = %ticket.id, error = %e, "Failed to refresh analytics bucket");
        }
    }

    pub async fn query(&self, query: &AnalyticsQuery) -> Result<Vec<AnalyticsBucket>> {
        self.ctx.store.list_analytics_buckets(query).await
    }
}
