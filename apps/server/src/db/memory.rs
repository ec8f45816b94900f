//! In-process queue store
//!
//! Keeps everything behind one `tokio::sync::Mutex`, which makes every trait method
//! trivially atomic. Used by the test suite and by `database.backend = "memory"`.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use medqueue_core::{
    dispatch_order, AnalyticsBucket, BucketKey, Counter, CounterLoad, PositionChange, Ticket,
    TicketStatus,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::traits::QueueStore;
use crate::models::{
    AnalyticsQuery, Announcement, AnnouncementStatus, ClaimOutcome, ClaimRequest, DisplayBoard,
    QueueConfig, TicketDraft, TicketOrder, TicketQuery,
};
use crate::{Error, Result};

#[derive(Debug, Default)]
struct MemoryState {
    tickets: HashMap<Uuid, Ticket>,
    sequences: HashMap<(Uuid, String, NaiveDate), i32>,
    counters: HashMap<Uuid, Counter>,
    configs: HashMap<(Uuid, String), QueueConfig>,
    boards: Vec<DisplayBoard>,
    announcements: Vec<Announcement>,
    buckets: HashMap<BucketKey, AnalyticsBucket>,
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryQueueStore {
    state: Arc<Mutex<MemoryState>>,
    #[cfg(test)]
    fail_counter_release: Arc<std::sync::atomic::AtomicBool>,
}

impl InMemoryQueueStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every counter release (`new_ticket = None`) fail until switched off.
    #[cfg(test)]
    pub(crate) fn set_fail_counter_release(&self, fail: bool) {
        self.fail_counter_release
            .store(fail, std::sync::atomic::Ordering::SeqCst);
    }
}

fn sort_tickets(tickets: &mut [Ticket], order: TicketOrder) {
    match order {
        TicketOrder::Dispatch => tickets.sort_by(dispatch_order),
        TicketOrder::IssuedDesc => tickets.sort_by(|a, b| {
            b.issued_at
                .cmp(&a.issued_at)
                .then_with(|| b.ticket_number.cmp(&a.ticket_number))
        }),
        TicketOrder::CompletedDesc => tickets.sort_by(|a, b| {
            // None sorts last
            match (a.completed_at, b.completed_at) {
                (Some(x), Some(y)) => y.cmp(&x),
                (Some(_), None) => std::cmp::Ordering::Less,
                (None, Some(_)) => std::cmp::Ordering::Greater,
                (None, None) => std::cmp::Ordering::Equal,
            }
            .then_with(|| b.issued_at.cmp(&a.issued_at))
        }),
    }
}

fn in_window(ticket: &Ticket, from: DateTime<Utc>, until: DateTime<Utc>) -> bool {
    ticket.issued_at >= from && ticket.issued_at < until
}

#[async_trait]
impl QueueStore for InMemoryQueueStore {
    async fn issue_ticket(&self, draft: TicketDraft) -> Result<Ticket> {
        let mut state = self.state.lock().await;

        let key = (draft.hospital_id, draft.service_type.clone(), draft.issue_day);
        let number = {
            let slot = state.sequences.entry(key).or_insert(0);
            *slot += 1;
            *slot
        };

        let active = state
            .tickets
            .values()
            .filter(|t| {
                t.hospital_id == draft.hospital_id
                    && t.service_type == draft.service_type
                    && matches!(t.status, TicketStatus::Waiting | TicketStatus::Called)
                    && in_window(t, draft.day_start, draft.day_end)
            })
            .count() as i32;

        let ticket = draft.into_ticket(number, active + 1);
        let duplicate = state.tickets.values().any(|t| {
            t.hospital_id == ticket.hospital_id
                && t.service_type == ticket.service_type
                && t.issue_day == ticket.issue_day
                && t.ticket_number == ticket.ticket_number
        });
        if duplicate {
            return Err(Error::Conflict("ticket number already taken".to_string()));
        }

        state.tickets.insert(ticket.id, ticket.clone());
        Ok(ticket)
    }

    async fn get_ticket(&self, hospital_id: Uuid, ticket_id: Uuid) -> Result<Option<Ticket>> {
        let state = self.state.lock().await;
        Ok(state
            .tickets
            .get(&ticket_id)
            .filter(|t| t.hospital_id == hospital_id)
            .cloned())
    }

    async fn list_tickets(&self, query: &TicketQuery) -> Result<Vec<Ticket>> {
        let state = self.state.lock().await;
        let mut tickets: Vec<Ticket> = state
            .tickets
            .values()
            .filter(|t| query.matches(t))
            .cloned()
            .collect();
        sort_tickets(&mut tickets, query.order);
        if let Some(limit) = query.limit {
            tickets.truncate(limit.max(0) as usize);
        }
        Ok(tickets)
    }

    async fn update_ticket(&self, ticket: &Ticket, expected_version: i32) -> Result<bool> {
        let mut state = self.state.lock().await;
        match state.tickets.get_mut(&ticket.id) {
            Some(stored) if stored.version == expected_version => {
                *stored = ticket.clone();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn set_ticket_enrichment(
        &self,
        ticket_id: Uuid,
        estimated_wait_time: i32,
        recommended_counter: Option<Uuid>,
    ) -> Result<()> {
        let mut state = self.state.lock().await;
        if let Some(ticket) = state.tickets.get_mut(&ticket_id) {
            ticket.estimated_wait_time = estimated_wait_time;
            ticket.ai_recommended_counter = recommended_counter;
        }
        Ok(())
    }

    async fn update_positions(&self, changes: &[PositionChange]) -> Result<()> {
        let mut state = self.state.lock().await;
        for change in changes {
            if let Some(ticket) = state.tickets.get_mut(&change.ticket_id) {
                if ticket.status.is_waiting() {
                    ticket.queue_position = change.new_position;
                }
            }
        }
        Ok(())
    }

    async fn claim_next_ticket(&self, claim: &ClaimRequest) -> Result<ClaimOutcome> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;

        let counter = state
            .counters
            .get_mut(&claim.counter.id)
            .filter(|c| c.hospital_id == claim.counter.hospital_id)
            .ok_or_else(|| Error::NotFound(format!("counter {}", claim.counter.id)))?;

        if counter.current_ticket_id.is_some() {
            return Ok(ClaimOutcome::CounterBusy);
        }

        let next = state
            .tickets
            .values()
            .filter(|t| counter.can_call(t) && in_window(t, claim.window_start, claim.window_end))
            .min_by(|a, b| dispatch_order(a, b))
            .cloned();

        if let Some(staff_id) = claim.staff_id {
            counter.current_staff_id = Some(staff_id);
        }
        counter.updated_at = claim.now;

        let Some(candidate) = next else {
            return Ok(ClaimOutcome::Empty);
        };

        let called = candidate.call(counter.id, claim.now)?;
        counter.current_ticket_id = Some(called.id);
        state.tickets.insert(called.id, called.clone());
        Ok(ClaimOutcome::Claimed(called))
    }

    async fn count_active_tickets(
        &self,
        hospital_id: Uuid,
        service_type: &str,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<i64> {
        let state = self.state.lock().await;
        Ok(state
            .tickets
            .values()
            .filter(|t| {
                t.hospital_id == hospital_id
                    && t.service_type == service_type
                    && matches!(t.status, TicketStatus::Waiting | TicketStatus::Called)
                    && in_window(t, from, until)
            })
            .count() as i64)
    }

    async fn recent_completed_service_times(
        &self,
        hospital_id: Uuid,
        service_type: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<i32>> {
        let state = self.state.lock().await;
        Ok(state
            .tickets
            .values()
            .filter(|t| {
                t.hospital_id == hospital_id
                    && t.service_type == service_type
                    && t.status == TicketStatus::Completed
                    && t.completed_at.is_some_and(|at| at >= since)
            })
            .filter_map(|t| t.service_time)
            .collect())
    }

    async fn active_counter_count(&self, hospital_id: Uuid, service_type: &str) -> Result<i64> {
        let state = self.state.lock().await;
        Ok(state
            .counters
            .values()
            .filter(|c| {
                c.hospital_id == hospital_id && c.is_active && c.serves(service_type)
            })
            .count() as i64)
    }

    async fn counter_loads(
        &self,
        hospital_id: Uuid,
        service_type: &str,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<CounterLoad>> {
        let state = self.state.lock().await;
        let mut candidates: Vec<&Counter> = state
            .counters
            .values()
            .filter(|c| {
                c.hospital_id == hospital_id && c.is_active && c.serves(service_type)
            })
            .collect();
        candidates.sort_by_key(|c| (c.counter_number, c.id));

        Ok(candidates
            .into_iter()
            .map(|c| CounterLoad {
                counter_id: c.id,
                load: state
                    .tickets
                    .values()
                    .filter(|t| {
                        t.counter_id == Some(c.id)
                            && t.status.is_active()
                            && in_window(t, from, until)
                    })
                    .count() as i64,
            })
            .collect())
    }

    async fn insert_counter(&self, counter: &Counter) -> Result<()> {
        let mut state = self.state.lock().await;
        let taken = state.counters.values().any(|c| {
            c.hospital_id == counter.hospital_id && c.counter_number == counter.counter_number
        });
        if taken {
            return Err(Error::AlreadyExists(format!(
                "counter number {} in this hospital",
                counter.counter_number
            )));
        }
        state.counters.insert(counter.id, counter.clone());
        Ok(())
    }

    async fn get_counter(&self, hospital_id: Uuid, counter_id: Uuid) -> Result<Option<Counter>> {
        let state = self.state.lock().await;
        Ok(state
            .counters
            .get(&counter_id)
            .filter(|c| c.hospital_id == hospital_id)
            .cloned())
    }

    async fn list_counters(&self, hospital_id: Uuid) -> Result<Vec<Counter>> {
        let state = self.state.lock().await;
        let mut counters: Vec<Counter> = state
            .counters
            .values()
            .filter(|c| c.hospital_id == hospital_id)
            .cloned()
            .collect();
        counters.sort_by_key(|c| (c.counter_number, c.id));
        Ok(counters)
    }

    async fn update_counter_settings(&self, counter: &Counter) -> Result<bool> {
        let mut state = self.state.lock().await;
        let Some(stored) = state
            .counters
            .get_mut(&counter.id)
            .filter(|c| c.hospital_id == counter.hospital_id)
        else {
            return Ok(false);
        };
        if !counter.is_active && stored.current_ticket_id.is_some() {
            return Ok(false);
        }
        stored.counter_name = counter.counter_name.clone();
        stored.counter_type = counter.counter_type.clone();
        stored.services_offered = counter.services_offered.clone();
        stored.department_id = counter.department_id;
        stored.is_active = counter.is_active;
        stored.updated_at = counter.updated_at;
        Ok(true)
    }

    async fn set_counter_ticket(
        &self,
        counter_id: Uuid,
        expected: Option<Uuid>,
        new_ticket: Option<Uuid>,
        staff_id: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        #[cfg(test)]
        if new_ticket.is_none()
            && self
                .fail_counter_release
                .load(std::sync::atomic::Ordering::SeqCst)
        {
            return Err(Error::Internal("counter release failed".to_string()));
        }

        let mut state = self.state.lock().await;
        match state.counters.get_mut(&counter_id) {
            Some(counter) if counter.current_ticket_id == expected => {
                counter.current_ticket_id = new_ticket;
                if staff_id.is_some() {
                    counter.current_staff_id = staff_id;
                }
                counter.updated_at = now;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn get_queue_config(
        &self,
        hospital_id: Uuid,
        service_type: &str,
    ) -> Result<Option<QueueConfig>> {
        let state = self.state.lock().await;
        Ok(state
            .configs
            .get(&(hospital_id, service_type.to_string()))
            .cloned())
    }

    async fn list_queue_configs(&self, hospital_id: Uuid) -> Result<Vec<QueueConfig>> {
        let state = self.state.lock().await;
        let mut configs: Vec<QueueConfig> = state
            .configs
            .values()
            .filter(|c| c.hospital_id == hospital_id)
            .cloned()
            .collect();
        configs.sort_by(|a, b| a.service_type.cmp(&b.service_type));
        Ok(configs)
    }

    async fn upsert_queue_config(&self, config: &QueueConfig) -> Result<()> {
        let mut state = self.state.lock().await;
        state.configs.insert(
            (config.hospital_id, config.service_type.clone()),
            config.clone(),
        );
        Ok(())
    }

    async fn insert_display_board(&self, board: &DisplayBoard) -> Result<()> {
        let mut state = self.state.lock().await;
        state.boards.push(board.clone());
        Ok(())
    }

    async fn get_display_board(
        &self,
        hospital_id: Uuid,
        board_id: Uuid,
    ) -> Result<Option<DisplayBoard>> {
        let state = self.state.lock().await;
        Ok(state
            .boards
            .iter()
            .find(|b| b.id == board_id && b.hospital_id == hospital_id)
            .cloned())
    }

    async fn list_display_boards(&self, hospital_id: Uuid) -> Result<Vec<DisplayBoard>> {
        let state = self.state.lock().await;
        Ok(state
            .boards
            .iter()
            .filter(|b| b.hospital_id == hospital_id)
            .cloned()
            .collect())
    }

    async fn insert_announcement(&self, announcement: &Announcement) -> Result<()> {
        let mut state = self.state.lock().await;
        state.announcements.push(announcement.clone());
        Ok(())
    }

    async fn list_pending_announcements(
        &self,
        hospital_id: Uuid,
        limit: i64,
    ) -> Result<Vec<Announcement>> {
        let state = self.state.lock().await;
        let mut pending: Vec<Announcement> = state
            .announcements
            .iter()
            .filter(|a| a.hospital_id == hospital_id && a.status == AnnouncementStatus::Pending)
            .cloned()
            .collect();
        pending.sort_by_key(|a| a.created_at);
        pending.truncate(limit.max(0) as usize);
        Ok(pending)
    }

    async fn mark_announcement_played(
        &self,
        hospital_id: Uuid,
        announcement_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<Announcement>> {
        let mut state = self.state.lock().await;
        let Some(announcement) = state
            .announcements
            .iter_mut()
            .find(|a| a.id == announcement_id && a.hospital_id == hospital_id)
        else {
            return Ok(None);
        };
        announcement.status = AnnouncementStatus::Played;
        announcement.played_at.get_or_insert(now);
        Ok(Some(announcement.clone()))
    }

    async fn upsert_analytics_bucket(&self, bucket: &AnalyticsBucket) -> Result<()> {
        let mut state = self.state.lock().await;
        state.buckets.insert(bucket.key.clone(), bucket.clone());
        Ok(())
    }

    async fn list_analytics_buckets(&self, query: &AnalyticsQuery) -> Result<Vec<AnalyticsBucket>> {
        let state = self.state.lock().await;
        let mut buckets: Vec<AnalyticsBucket> = state
            .buckets
            .values()
            .filter(|b| {
                b.key.hospital_id == query.hospital_id
                    && query.date.map_or(true, |d| b.key.date == d)
                    && query
                        .service_type
                        .as_deref()
                        .map_or(true, |s| b.key.service_type == s)
                    && query
                        .department_id
                        .map_or(true, |d| b.key.department_id == Some(d))
            })
            .cloned()
            .collect();
        buckets.sort_by(|a, b| {
            (a.key.date, a.key.hour, &a.key.service_type, a.key.department_id).cmp(&(
                b.key.date,
                b.key.hour,
                &b.key.service_type,
                b.key.department_id,
            ))
        });
        Ok(buckets)
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}
