//! Storage trait for queue state
//!
//! Both backends (PostgreSQL and in-memory) provide the same guarantees:
//! - `issue_ticket` allocates numbers atomically per (hospital, service type, day)
//! - `claim_next_ticket` hands each waiting ticket to at most one counter
//! - `update_ticket` and `set_counter_ticket` are compare-and-swap writes

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use medqueue_core::{AnalyticsBucket, Counter, CounterLoad, PositionChange, Ticket};
use uuid::Uuid;

use crate::models::{
    AnalyticsQuery, Announcement, ClaimOutcome, ClaimRequest, DisplayBoard, QueueConfig,
    TicketDraft, TicketQuery,
};
use crate::Result;

#[async_trait]
pub trait QueueStore: Send + Sync + std::fmt::Debug {
    // Tickets

    /// Allocate the next number, compute the initial position and persist the ticket
    /// as one atomic unit.
    ///
    /// # Errors
    /// * `Conflict` - lost a race on the number; safe to retry
    async fn issue_ticket(&self, draft: TicketDraft) -> Result<Ticket>;

    async fn get_ticket(&self, hospital_id: Uuid, ticket_id: Uuid) -> Result<Option<Ticket>>;

    async fn list_tickets(&self, query: &TicketQuery) -> Result<Vec<Ticket>>;

    /// Persist `ticket` if the stored version still equals `expected_version`.
    ///
    /// Returns `false` when another writer got there first.
    async fn update_ticket(&self, ticket: &Ticket, expected_version: i32) -> Result<bool>;

    /// Store the advisory estimate and counter recommendation. Does not bump the version.
    async fn set_ticket_enrichment(
        &self,
        ticket_id: Uuid,
        estimated_wait_time: i32,
        recommended_counter: Option<Uuid>,
    ) -> Result<()>;

    /// Rewrite queue positions. Does not bump versions.
    async fn update_positions(&self, changes: &[PositionChange]) -> Result<()>;

    /// Pick the best eligible ticket for the counter, call it and bind it to the counter.
    async fn claim_next_ticket(&self, claim: &ClaimRequest) -> Result<ClaimOutcome>;

    // Aggregates

    /// WAITING and CALLED tickets of a service type issued in `[from, until)`.
    async fn count_active_tickets(
        &self,
        hospital_id: Uuid,
        service_type: &str,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<i64>;

    /// Service times of tickets of a service type completed at or after `since`.
    async fn recent_completed_service_times(
        &self,
        hospital_id: Uuid,
        service_type: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<i32>>;

    /// Active counters whose type or services match the service type.
    async fn active_counter_count(&self, hospital_id: Uuid, service_type: &str) -> Result<i64>;

    /// Candidate counters for a service type in counter-number order, with the number of
    /// active tickets issued in `[from, until)` assigned to each.
    async fn counter_loads(
        &self,
        hospital_id: Uuid,
        service_type: &str,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<CounterLoad>>;

    // Counters

    /// # Errors
    /// * `AlreadyExists` - counter number taken in this hospital
    async fn insert_counter(&self, counter: &Counter) -> Result<()>;

    async fn get_counter(&self, hospital_id: Uuid, counter_id: Uuid) -> Result<Option<Counter>>;

    async fn list_counters(&self, hospital_id: Uuid) -> Result<Vec<Counter>>;

    /// Save the admin-editable fields of a counter.
    ///
    /// Returns `false` when the counter would be deactivated while holding a ticket.
    async fn update_counter_settings(&self, counter: &Counter) -> Result<bool>;

    /// Compare-and-swap of `current_ticket_id`. A `Some` staff id replaces the current one.
    async fn set_counter_ticket(
        &self,
        counter_id: Uuid,
        expected: Option<Uuid>,
        new_ticket: Option<Uuid>,
        staff_id: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> Result<bool>;

    // Queue configuration

    async fn get_queue_config(
        &self,
        hospital_id: Uuid,
        service_type: &str,
    ) -> Result<Option<QueueConfig>>;

    async fn list_queue_configs(&self, hospital_id: Uuid) -> Result<Vec<QueueConfig>>;

    async fn upsert_queue_config(&self, config: &QueueConfig) -> Result<()>;

    // Display boards and announcements

    async fn insert_display_board(&self, board: &DisplayBoard) -> Result<()>;

    async fn get_display_board(
        &self,
        hospital_id: Uuid,
        board_id: Uuid,
    ) -> Result<Option<DisplayBoard>>;

    async fn list_display_boards(&self, hospital_id: Uuid) -> Result<Vec<DisplayBoard>>;

    async fn insert_announcement(&self, announcement: &Announcement) -> Result<()>;

    /// Oldest first.
    async fn list_pending_announcements(
        &self,
        hospital_id: Uuid,
        limit: i64,
    ) -> Result<Vec<Announcement>>;

    /// Returns `None` when the announcement does not exist in this hospital.
    async fn mark_announcement_played(
        &self,
        hospital_id: Uuid,
        announcement_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<Announcement>>;

    // Analytics

    /// Insert or replace the bucket keyed by its (hospital, department, service, date, hour).
    async fn upsert_analytics_bucket(&self, bucket: &AnalyticsBucket) -> Result<()>;

    async fn list_analytics_buckets(&self, query: &AnalyticsQuery) -> Result<Vec<AnalyticsBucket>>;

    /// Cheap connectivity probe for `/health`.
    async fn ping(&self) -> Result<()>;
}
