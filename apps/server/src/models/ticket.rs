//! Store-facing ticket inputs and queries

use chrono::{DateTime, NaiveDate, Utc};
use medqueue_core::{format_token, Counter, Priority, Ticket, TicketStatus, TokenFormat};
use uuid::Uuid;

/// Everything about a new ticket except the parts allocated atomically by the store
/// (number, token and initial position).
#[derive(Debug, Clone)]
pub struct TicketDraft {
    pub id: Uuid,
    pub hospital_id: Uuid,
    pub service_type: String,
    pub issue_day: NaiveDate,
    /// `[start, end)` of `issue_day`, used to count the current queue.
    pub day_start: DateTime<Utc>,
    pub day_end: DateTime<Utc>,
    pub token_format: TokenFormat,

    pub priority: Priority,
    pub urgency_level: Option<String>,
    pub priority_score: i32,

    pub patient_id: Option<Uuid>,
    pub appointment_id: Option<Uuid>,
    pub department_id: Option<Uuid>,
    pub patient_name: Option<String>,
    pub patient_phone: Option<String>,
    pub notes: Option<String>,
    pub created_by: Option<Uuid>,

    pub issued_at: DateTime<Utc>,
    pub provisional_wait_minutes: i32,
}

impl TicketDraft {
    pub fn into_ticket(self, ticket_number: i32, queue_position: i32) -> Ticket {
        let token_display = format_token(&self.token_format, ticket_number);
        Ticket {
            id: self.id,
            hospital_id: self.hospital_id,
            service_type: self.service_type,
            issue_day: self.issue_day,
            ticket_number,
            token_display,
            priority: self.priority,
            urgency_level: self.urgency_level,
            priority_score: self.priority_score,
            patient_id: self.patient_id,
            appointment_id: self.appointment_id,
            department_id: self.department_id,
            counter_id: None,
            ai_recommended_counter: None,
            patient_name: self.patient_name,
            patient_phone: self.patient_phone,
            notes: self.notes,
            status: TicketStatus::Waiting,
            issued_at: self.issued_at,
            called_at: None,
            served_at: None,
            completed_at: None,
            no_show_at: None,
            cancelled_at: None,
            last_called_at: None,
            cancel_reason: None,
            call_count: 0,
            queue_position,
            initial_position: queue_position,
            estimated_wait_time: self.provisional_wait_minutes,
            actual_wait_time: None,
            service_time: None,
            created_by: self.created_by,
            version: 1,
            updated_at: self.issued_at,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TicketOrder {
    /// Priority score descending, then arrival.
    #[default]
    Dispatch,
    IssuedDesc,
    CompletedDesc,
}

/// Filter for ticket listings. Unset fields do not filter.
#[derive(Debug, Clone, Default)]
pub struct TicketQuery {
    pub hospital_id: Uuid,
    pub service_type: Option<String>,
    pub statuses: Vec<TicketStatus>,
    pub counter_id: Option<Uuid>,
    pub patient_phone: Option<String>,
    pub issued_from: Option<DateTime<Utc>>,
    pub issued_until: Option<DateTime<Utc>>,
    pub order: TicketOrder,
    pub limit: Option<i64>,
}

impl TicketQuery {
    pub fn for_hospital(hospital_id: Uuid) -> Self {
        Self {
            hospital_id,
            ..Default::default()
        }
    }

    pub fn issued_between(mut self, from: DateTime<Utc>, until: DateTime<Utc>) -> Self {
        self.issued_from = Some(from);
        self.issued_until = Some(until);
        self
    }

    pub fn with_statuses(mut self, statuses: &[TicketStatus]) -> Self {
        self.statuses = statuses.to_vec();
        self
    }

    pub fn with_service_type(mut self, service_type: impl Into<String>) -> Self {
        self.service_type = Some(service_type.into());
        self
    }

    pub fn ordered(mut self, order: TicketOrder, limit: Option<i64>) -> Self {
        self.order = order;
        self.limit = limit;
        self
    }

    pub fn matches(&self, ticket: &Ticket) -> bool {
        ticket.hospital_id == self.hospital_id
            && self
                .service_type
                .as_deref()
                .map_or(true, |s| ticket.service_type == s)
            && (self.statuses.is_empty() || self.statuses.contains(&ticket.status))
            && self.counter_id.map_or(true, |c| ticket.counter_id == Some(c))
            && self
                .patient_phone
                .as_deref()
                .map_or(true, |p| ticket.patient_phone.as_deref() == Some(p))
            && self.issued_from.map_or(true, |from| ticket.issued_at >= from)
            && self.issued_until.map_or(true, |until| ticket.issued_at < until)
    }
}

/// Claim the next eligible ticket for a counter and bind it, atomically.
#[derive(Debug, Clone)]
pub struct ClaimRequest {
    pub counter: Counter,
    pub staff_id: Option<Uuid>,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub now: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClaimOutcome {
    Claimed(Ticket),
    /// Nothing eligible; the counter is idle with the staff member kept on it.
    Empty,
    /// The counter picked up a ticket concurrently.
    CounterBusy,
}

#[derive(Debug, Clone, Default)]
pub struct AnalyticsQuery {
    pub hospital_id: Uuid,
    pub date: Option<NaiveDate>,
    pub service_type: Option<String>,
    pub department_id: Option<Uuid>,
}
