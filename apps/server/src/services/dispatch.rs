//! Dispatch state machine
//!
//! Every ticket mutation after issuance goes through [`DispatchService`]. Transitions
//! are computed by `medqueue_core::Ticket` and persisted with a compare-and-swap on the
//! ticket version; counter bindings are compare-and-swapped on `current_ticket_id`.

use chrono::{DateTime, Utc};
use medqueue_core::{assign_positions, Counter, Ticket, TicketStatus};
use serde::Serialize;
use uuid::Uuid;

use super::{AnalyticsService, NotificationDispatcher, PositionNotice, QueueContext};
use crate::metrics::{
    QUEUE_RETRIES_TOTAL, QUEUE_WAITING, TICKETS_DISPATCHED_TOTAL, TICKET_OUTCOMES_TOTAL,
    TICKET_WAIT_MINUTES,
};
use crate::models::{Announcement, ClaimOutcome, ClaimRequest, TicketQuery};
use crate::{Error, Result};

/// Result of a call-next on one counter.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallNextOutcome {
    pub counter: Counter,
    /// Ticket the counter was holding, completed on the way.
    pub completed: Option<Ticket>,
    /// `None` when nobody eligible is waiting.
    pub called: Option<Ticket>,
    pub announcement: Option<Announcement>,
}

#[derive(Debug, Clone)]
pub struct DispatchService {
    ctx: QueueContext,
    analytics: AnalyticsService,
    notifications: NotificationDispatcher,
}

impl DispatchService {
    pub fn new(
        ctx: QueueContext,
        analytics: AnalyticsService,
        notifications: NotificationDispatcher,
    ) -> Self {
        Self {
            ctx,
            analytics,
            notifications,
        }
    }

    #[tracing::instrument(skip(self), fields(hospital_id = %hospital_id, counter_id = %counter_id))]
    pub async fn call_next(
        &self,
        hospital_id: Uuid,
        counter_id: Uuid,
        staff_id: Option<Uuid>,
    ) -> Result<CallNextOutcome> {
        let counter = self.load_counter(hospital_id, counter_id).await?;
        if !counter.is_active {
            return Err(Error::InvalidState(format!(
                "counter {} is inactive",
                counter.counter_name
            )));
        }

        let completed = match counter.current_ticket_id {
            Some(held) => self.finish_held(&counter, held).await?,
            None => None,
        };

        let outcome = self.claim_with_retry(hospital_id, counter_id, staff_id).await?;
        let counter = self.load_counter(hospital_id, counter_id).await?;

        match outcome {
            ClaimOutcome::CounterBusy => Err(Error::InvalidState(format!(
                "counter {} picked up another ticket concurrently",
                counter.counter_name
            ))),
            ClaimOutcome::Empty => {
                tracing::info!("No eligible ticket waiting");
                Ok(CallNextOutcome {
                    counter,
                    completed,
                    called: None,
                    announcement: None,
                })
            }
            ClaimOutcome::Claimed(ticket) => {
                TICKETS_DISPATCHED_TOTAL
                    .with_label_values(&[&ticket.service_type])
                    .inc();
                if let Some(wait) = ticket.actual_wait_time {
                    TICKET_WAIT_MINUTES
                        .with_label_values(&[&ticket.service_type])
                        .observe(f64::from(wait));
                }
                tracing::info!(
                    ticket_id = %ticket.id,
                    token = %ticket.token_display,
                    wait_minutes = ticket.actual_wait_time,
                    "Ticket called"
                );

                let announcement = self.announce(&ticket, &counter).await;
                self.recompute_positions_quietly(hospital_id, &ticket.service_type)
                    .await;

                Ok(CallNextOutcome {
                    counter,
                    completed,
                    called: Some(ticket),
                    announcement,
                })
            }
        }
    }

    #[tracing::instrument(skip(self), fields(hospital_id = %hospital_id, ticket_id = %ticket_id))]
    pub async fn start_serving(&self, hospital_id: Uuid, ticket_id: Uuid) -> Result<Ticket> {
        let (_, serving) = self
            .transition(hospital_id, ticket_id, |t, now| t.start_serving(now))
            .await?;
        tracing::info!("Service started");
        Ok(serving)
    }

    #[tracing::instrument(skip(self), fields(hospital_id = %hospital_id, ticket_id = %ticket_id))]
    pub async fn complete(&self, hospital_id: Uuid, ticket_id: Uuid) -> Result<Ticket> {
        let fallback = self.ctx.settings.fallback_service_minutes;
        let (before, done) = self
            .transition(hospital_id, ticket_id, |t, now| t.complete(now, fallback))
            .await?;
        self.release_counter(&before, done.updated_at).await;
        self.finish_terminal(&done, "completed").await;
        Ok(done)
    }

    #[tracing::instrument(skip(self), fields(hospital_id = %hospital_id, ticket_id = %ticket_id))]
    pub async fn no_show(&self, hospital_id: Uuid, ticket_id: Uuid) -> Result<Ticket> {
        let (before, gone) = self
            .transition(hospital_id, ticket_id, |t, now| t.mark_no_show(now))
            .await?;
        self.release_counter(&before, gone.updated_at).await;
        if before.status.is_waiting() {
            self.recompute_positions_quietly(hospital_id, &gone.service_type)
                .await;
        }
        self.finish_terminal(&gone, "no_show").await;
        Ok(gone)
    }

    #[tracing::instrument(skip(self, reason), fields(hospital_id = %hospital_id, ticket_id = %ticket_id))]
    pub async fn cancel(
        &self,
        hospital_id: Uuid,
        ticket_id: Uuid,
        reason: Option<String>,
    ) -> Result<Ticket> {
        let (before, cancelled) = self
            .transition(hospital_id, ticket_id, move |t, now| {
                t.cancel(now, reason.clone())
            })
            .await?;
        self.release_counter(&before, cancelled.updated_at).await;
        if before.status.is_waiting() {
            self.recompute_positions_quietly(hospital_id, &cancelled.service_type)
                .await;
        }
        self.finish_terminal(&cancelled, "cancelled").await;
        Ok(cancelled)
    }

    /// Move a ticket to another counter. It stays in the queue and becomes callable
    /// only by the new counter.
    #[tracing::instrument(skip(self), fields(hospital_id = %hospital_id, ticket_id = %ticket_id))]
    pub async fn transfer(
        &self,
        hospital_id: Uuid,
        ticket_id: Uuid,
        new_counter_id: Uuid,
    ) -> Result<Ticket> {
        let target = self.load_counter(hospital_id, new_counter_id).await?;
        if !target.is_active {
            return Err(Error::InvalidState(format!(
                "counter {} is inactive",
                target.counter_name
            )));
        }

        let (before, moved) = self
            .transition(hospital_id, ticket_id, |t, now| t.transfer(target.id, now))
            .await?;
        self.release_counter(&before, moved.updated_at).await;
        self.recompute_positions_quietly(hospital_id, &moved.service_type)
            .await;

        tracing::info!(
            from_counter = ?before.counter_id,
            to_counter = %target.id,
            status = %moved.status,
            "Ticket transferred"
        );
        Ok(moved)
    }

    /// Announce a called ticket again.
    #[tracing::instrument(skip(self), fields(hospital_id = %hospital_id, ticket_id = %ticket_id))]
    pub async fn recall(
        &self,
        hospital_id: Uuid,
        ticket_id: Uuid,
    ) -> Result<(Ticket, Option<Announcement>)> {
        let (_, recalled) = self
            .transition(hospital_id, ticket_id, |t, now| t.recall(now))
            .await?;
        let counter_id = recalled
            .counter_id
            .ok_or_else(|| Error::Internal(format!("called ticket {ticket_id} has no counter")))?;
        let counter = self.load_counter(hospital_id, counter_id).await?;
        let announcement = self.announce(&recalled, &counter).await;
        tracing::info!(call_count = recalled.call_count, "Ticket recalled");
        Ok((recalled, announcement))
    }

    /// Renumber the waiting tickets of a service type 1..N and notify patients who
    /// moved within the notification threshold.
    pub async fn recompute_positions(&self, hospital_id: Uuid, service_type: &str) -> Result<()> {
        let today = self.ctx.today();
        let query = TicketQuery::for_hospital(hospital_id)
            .with_service_type(service_type)
            .with_statuses(&[TicketStatus::Waiting, TicketStatus::Transferred])
            .issued_between(today.start, today.end);
        let waiting = self.ctx.store.list_tickets(&query).await?;

        QUEUE_WAITING
            .with_label_values(&[service_type])
            .set(waiting.len() as i64);

        let changes = assign_positions(&waiting);
        if changes.is_empty() {
            return Ok(());
        }
        self.ctx.store.update_positions(&changes).await?;

        let threshold = self.ctx.settings.notify_position_threshold;
        for change in changes.iter().filter(|c| c.crossed_threshold(threshold)) {
            if let Some(ticket) = waiting.iter().find(|t| t.id == change.ticket_id) {
                self.notifications.notify(PositionNotice {
                    hospital_id,
                    ticket_id: ticket.id,
                    token_display: ticket.token_display.clone(),
                    service_type: ticket.service_type.clone(),
                    position: change.new_position,
                    patient_phone: ticket.patient_phone.clone(),
                });
            }
        }
        Ok(())
    }

    async fn recompute_positions_quietly(&self, hospital_id: Uuid, service_type: &str) {
        if let Err(e) = self.recompute_positions(hospital_id, service_type).await {
            tracing::warn!(service_type, error = %e, "Failed to recompute queue positions");
        }
    }

    async fn load_counter(&self, hospital_id: Uuid, counter_id: Uuid) -> Result<Counter> {
        self.ctx
            .store
            .get_counter(hospital_id, counter_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("counter {counter_id}")))
    }

    /// Apply a transition with optimistic concurrency, re-reading on a lost race.
    ///
    /// Returns the ticket as read and as written.
    async fn transition<F>(
        &self,
        hospital_id: Uuid,
        ticket_id: Uuid,
        apply: F,
    ) -> Result<(Ticket, Ticket)>
    where
        F: Fn(&Ticket, DateTime<Utc>) -> medqueue_core::Result<Ticket> + Send + Sync,
    {
        let max_retries = self.ctx.settings.claim_max_retries;
        for _ in 0..=max_retries {
            let current = self
                .ctx
                .store
                .get_ticket(hospital_id, ticket_id)
                .await?
                .ok_or_else(|| Error::NotFound(format!("ticket {ticket_id}")))?;
            let next = apply(&current, self.ctx.now())?;
            match self.ctx.store.update_ticket(&next, current.version).await {
                Ok(true) => return Ok((current, next)),
                Ok(false) => {
                    tracing::debug!(version = current.version, "Ticket changed concurrently, retrying")
                }
                Err(e) if e.is_retryable() => {
                    tracing::debug!(error = %e, "Ticket update hit contention, retrying")
                }
                Err(e) => return Err(e),
            }
            QUEUE_RETRIES_TOTAL.with_label_values(&["transition"]).inc();
        }
        Err(Error::Transient(format!(
            "ticket {ticket_id} kept changing concurrently"
        )))
    }

    async fn claim_with_retry(
        &self,
        hospital_id: Uuid,
        counter_id: Uuid,
        staff_id: Option<Uuid>,
    ) -> Result<ClaimOutcome> {
        let max_retries = self.ctx.settings.claim_max_retries;
        let mut attempt = 0u32;
        loop {
            let counter = self.load_counter(hospital_id, counter_id).await?;
            let now = self.ctx.now();
            let today = self.ctx.day_window(now);
            let claim = ClaimRequest {
                counter,
                staff_id,
                window_start: today.start,
                window_end: today.end,
                now,
            };
            match self.ctx.store.claim_next_ticket(&claim).await {
                Ok(outcome) => return Ok(outcome),
                Err(e) if e.is_retryable() && attempt < max_retries => {
                    QUEUE_RETRIES_TOTAL.with_label_values(&["claim"]).inc();
                    tracing::debug!(attempt, error = %e, "Retrying ticket claim");
                    attempt += 1;
                }
                Err(e) if e.is_retryable() => {
                    return Err(Error::Transient(format!(
                        "call-next kept conflicting after {max_retries} retries"
                    )));
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Complete the ticket a counter holds before it calls the next one.
    async fn finish_held(&self, counter: &Counter, held: Uuid) -> Result<Option<Ticket>> {
        let ticket = self.ctx.store.get_ticket(counter.hospital_id, held).await?;
        if let Some(ticket) = ticket.filter(|t| {
            t.status.is_at_counter() && t.counter_id == Some(counter.id)
        }) {
            match self.complete(counter.hospital_id, ticket.id).await {
                Ok(done) => return Ok(Some(done)),
                // Finished by someone else in the meantime
                Err(Error::Domain(_)) => {}
                Err(e) => return Err(e),
            }
        }

        // Stale binding
        self.ctx
            .store
            .set_counter_ticket(counter.id, Some(held), None, None, self.ctx.now())
            .await?;
        Ok(None)
    }

    /// Drop the counter binding a ticket held before its transition.
    ///
    /// The ticket transition is already committed, so a failure here is logged and
    /// left for the counter's next call-next, which clears stale bindings.
    async fn release_counter(&self, before: &Ticket, now: DateTime<Utc>) {
        let Some(counter_id) = before.counter_id.filter(|_| before.status.is_at_counter()) else {
            return;
        };
        match self
            .ctx
            .store
            .set_counter_ticket(counter_id, Some(before.id), None, None, now)
            .await
        {
            Ok(true) => {}
            Ok(false) => {
                tracing::debug!(counter_id = %counter_id, "Counter was no longer bound to this ticket")
            }
            Err(e) => tracing::warn!(
                counter_id = %counter_id,
                ticket_id = %before.id,
                error = %e,
                "Failed to release counter; it is cleared on its next call"
            ),
        }
    }

    async fn announce(&self, ticket: &Ticket, counter: &Counter) -> Option<Announcement> {
        let announcement = Announcement::for_call(ticket, counter, self.ctx.now());
        match self.ctx.store.insert_announcement(&announcement).await {
            Ok(()) => Some(announcement),
            Err(e) => {
                tracing::warn!(ticket_id = %ticket.id, error = %e, "Failed to store announcement");
                None
            }
        }
    }

    async fn finish_terminal(&self, ticket: &Ticket, outcome: &str) {
        TICKET_OUTCOMES_TOTAL
            .with_label_values(&[&ticket.service_type, outcome])
            .inc();
        tracing::info!(
            ticket_id = %ticket.id,
            token = %ticket.token_display,
            outcome,
            service_minutes = ticket.service_time,
            "Ticket closed"
        );
        self.analytics.refresh_quietly(ticket).await;
    }
}
