//! Ticket model and lifecycle transitions
//!
//! ```text
//! WAITING ──call──▶ CALLED ──start──▶ SERVING ──complete──▶ COMPLETED
//!    │                │  ▲                │
//!    │                │  └──call──┐       └──cancel──▶ CANCELLED
//!    │                └─transfer─▶ TRANSFERRED
//!    └──no-show / cancel (also from CALLED and TRANSFERRED)
//! ```
//!
//! Every transition is a pure function returning the next version of the ticket.
//! The caller is responsible for persisting it with a compare-and-swap on
//! [`Ticket::version`].

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::priority::Priority;
use crate::time::round_minutes;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TicketStatus {
    Waiting,
    Called,
    Serving,
    Completed,
    NoShow,
    Cancelled,
    Transferred,
}

impl TicketStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketStatus::Waiting => "WAITING",
            TicketStatus::Called => "CALLED",
            TicketStatus::Serving => "SERVING",
            TicketStatus::Completed => "COMPLETED",
            TicketStatus::NoShow => "NO_SHOW",
            TicketStatus::Cancelled => "CANCELLED",
            TicketStatus::Transferred => "TRANSFERRED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TicketStatus::Completed | TicketStatus::NoShow | TicketStatus::Cancelled
        )
    }

    /// Waiting to be called, either fresh or after a transfer to another counter.
    pub fn is_waiting(&self) -> bool {
        matches!(self, TicketStatus::Waiting | TicketStatus::Transferred)
    }

    /// Held by a counter right now.
    pub fn is_at_counter(&self) -> bool {
        matches!(self, TicketStatus::Called | TicketStatus::Serving)
    }

    /// Counts towards a counter's load.
    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TicketStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "WAITING" => Ok(TicketStatus::Waiting),
            "CALLED" => Ok(TicketStatus::Called),
            "SERVING" => Ok(TicketStatus::Serving),
            "COMPLETED" => Ok(TicketStatus::Completed),
            "NO_SHOW" => Ok(TicketStatus::NoShow),
            "CANCELLED" => Ok(TicketStatus::Cancelled),
            "TRANSFERRED" => Ok(TicketStatus::Transferred),
            _ => Err(Error::InvalidStatus(s.to_string())),
        }
    }
}

impl TryFrom<String> for TicketStatus {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

/// A single patient's claim on a queue position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticket {
    pub id: Uuid,
    pub hospital_id: Uuid,
    pub service_type: String,
    pub issue_day: NaiveDate,
    pub ticket_number: i32,
    pub token_display: String,

    pub priority: Priority,
    pub urgency_level: Option<String>,
    pub priority_score: i32,

    pub patient_id: Option<Uuid>,
    pub appointment_id: Option<Uuid>,
    pub department_id: Option<Uuid>,
    pub counter_id: Option<Uuid>,
    pub ai_recommended_counter: Option<Uuid>,
    pub patient_name: Option<String>,
    pub patient_phone: Option<String>,
    pub notes: Option<String>,

    pub status: TicketStatus,
    pub issued_at: DateTime<Utc>,
    pub called_at: Option<DateTime<Utc>>,
    pub served_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub no_show_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub last_called_at: Option<DateTime<Utc>>,
    pub cancel_reason: Option<String>,
    pub call_count: i32,

    pub queue_position: i32,
    pub initial_position: i32,
    pub estimated_wait_time: i32,
    pub actual_wait_time: Option<i32>,
    pub service_time: Option<i32>,

    pub created_by: Option<Uuid>,
    pub version: i32,
    pub updated_at: DateTime<Utc>,
}

impl Ticket {
    fn reject(&self, action: &'static str) -> Error {
        Error::InvalidTransition {
            from: self.status,
            action,
        }
    }

    fn next(&self, now: DateTime<Utc>) -> Ticket {
        let mut next = self.clone();
        next.version = self.version + 1;
        next.updated_at = now;
        next
    }

    /// Call the ticket to a counter. Allowed from WAITING and TRANSFERRED.
    pub fn call(&self, counter_id: Uuid, now: DateTime<Utc>) -> Result<Ticket> {
        if !self.status.is_waiting() {
            return Err(self.reject("call"));
        }
        let mut next = self.next(now);
        next.status = TicketStatus::Called;
        next.counter_id = Some(counter_id);
        next.called_at = Some(now);
        next.last_called_at = Some(now);
        next.call_count = self.call_count + 1;
        next.actual_wait_time = Some(round_minutes(self.issued_at, now));
        next.queue_position = 0;
        Ok(next)
    }

    /// Announce an already called ticket again.
    pub fn recall(&self, now: DateTime<Utc>) -> Result<Ticket> {
        if self.status != TicketStatus::Called {
            return Err(self.reject("recall"));
        }
        let mut next = self.next(now);
        next.last_called_at = Some(now);
        next.call_count = self.call_count + 1;
        Ok(next)
    }

    pub fn start_serving(&self, now: DateTime<Utc>) -> Result<Ticket> {
        if self.status != TicketStatus::Called {
            return Err(self.reject("start serving"));
        }
        let mut next = self.next(now);
        next.status = TicketStatus::Serving;
        next.served_at = Some(now);
        Ok(next)
    }

    /// Complete a ticket held at a counter.
    ///
    /// Service time is measured from `served_at`; a ticket that was never formally
    /// served gets `fallback_service_minutes`.
    pub fn complete(&self, now: DateTime<Utc>, fallback_service_minutes: i32) -> Result<Ticket> {
        if !self.status.is_at_counter() {
            return Err(self.reject("complete"));
        }
        let mut next = self.next(now);
        next.status = TicketStatus::Completed;
        next.completed_at = Some(now);
        next.service_time = Some(
            self.served_at
                .map(|served| round_minutes(served, now))
                .unwrap_or(fallback_service_minutes),
        );
        next.queue_position = 0;
        Ok(next)
    }

    pub fn mark_no_show(&self, now: DateTime<Utc>) -> Result<Ticket> {
        if !matches!(
            self.status,
            TicketStatus::Waiting | TicketStatus::Called | TicketStatus::Transferred
        ) {
            return Err(self.reject("mark as no-show"));
        }
        let mut next = self.next(now);
        next.status = TicketStatus::NoShow;
        next.no_show_at = Some(now);
        next.queue_position = 0;
        Ok(next)
    }

    pub fn cancel(&self, now: DateTime<Utc>, reason: Option<String>) -> Result<Ticket> {
        if self.status.is_terminal() {
            return Err(self.reject("cancel"));
        }
        let mut next = self.next(now);
        next.status = TicketStatus::Cancelled;
        next.cancelled_at = Some(now);
        next.cancel_reason = reason;
        next.queue_position = 0;
        Ok(next)
    }

    /// Rebind the ticket to another counter.
    ///
    /// A WAITING ticket stays WAITING; a CALLED ticket becomes TRANSFERRED and is
    /// callable again by the new counter. TRANSFERRED tickets may be moved again.
    pub fn transfer(&self, new_counter_id: Uuid, now: DateTime<Utc>) -> Result<Ticket> {
        let status = match self.status {
            TicketStatus::Waiting => TicketStatus::Waiting,
            TicketStatus::Called | TicketStatus::Transferred => TicketStatus::Transferred,
            _ => return Err(self.reject("transfer")),
        };
        let mut next = self.next(now);
        next.status = status;
        next.counter_id = Some(new_counter_id);
        Ok(next)
    }

    /// Minutes waited so far, or the recorded wait once called.
    pub fn minutes_waiting(&self, now: DateTime<Utc>) -> i32 {
        self.actual_wait_time
            .unwrap_or_else(|| round_minutes(self.issued_at, now))
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn at(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    pub fn waiting_ticket(priority: Priority, score: i32, issued_at: &str) -> Ticket {
        let issued_at = at(issued_at);
        Ticket {
            id: Uuid::new_v4(),
            hospital_id: Uuid::nil(),
            service_type: "consultation".to_string(),
            issue_day: issued_at.date_naive(),
            ticket_number: 1,
            token_display: "C-001".to_string(),
            priority,
            urgency_level: None,
            priority_score: score,
            patient_id: None,
            appointment_id: None,
            department_id: None,
            counter_id: None,
            ai_recommended_counter: None,
            patient_name: None,
            patient_phone: None,
            notes: None,
            status: TicketStatus::Waiting,
            issued_at,
            called_at: None,
            served_at: None,
            completed_at: None,
            no_show_at: None,
            cancelled_at: None,
            last_called_at: None,
            cancel_reason: None,
            call_count: 0,
            queue_position: 1,
            initial_position: 1,
            estimated_wait_time: 10,
            actual_wait_time: None,
            service_time: None,
            created_by: None,
            version: 1,
            updated_at: issued_at,
        }
    }
}
