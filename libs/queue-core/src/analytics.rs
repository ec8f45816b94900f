//! Hourly analytics aggregation

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ticket::{Ticket, TicketStatus};
use crate::time::CalendarScope;

/// Identity of one hourly bucket.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketKey {
    pub hospital_id: Uuid,
    pub department_id: Option<Uuid>,
    pub service_type: String,
    pub date: NaiveDate,
    pub hour: u32,
}

impl BucketKey {
    /// Bucket a ticket belongs to, keyed by the local date and hour it was issued.
    pub fn for_ticket(ticket: &Ticket, scope: &CalendarScope) -> Self {
        Self {
            hospital_id: ticket.hospital_id,
            department_id: ticket.department_id,
            service_type: ticket.service_type.clone(),
            date: scope.day_of(ticket.issued_at),
            hour: scope.hour_of(ticket.issued_at),
        }
    }

    /// Whether `ticket` falls in this bucket.
    pub fn contains(&self, ticket: &Ticket, scope: &CalendarScope) -> bool {
        ticket.hospital_id == self.hospital_id
            && ticket.department_id == self.department_id
            && ticket.service_type == self.service_type
            && scope.day_of(ticket.issued_at) == self.date
            && scope.hour_of(ticket.issued_at) == self.hour
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MinAvgMax {
    pub min: Option<i32>,
    pub avg: Option<f64>,
    pub max: Option<i32>,
}

impl MinAvgMax {
    pub fn from_samples(samples: impl IntoIterator<Item = i32>) -> Self {
        let mut min = None::<i32>;
        let mut max = None::<i32>;
        let mut sum = 0i64;
        let mut n = 0i64;
        for s in samples {
            min = Some(min.map_or(s, |m| m.min(s)));
            max = Some(max.map_or(s, |m| m.max(s)));
            sum += i64::from(s);
            n += 1;
        }
        Self {
            min,
            avg: (n > 0).then(|| sum as f64 / n as f64),
            max,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsBucket {
    #[serde(flatten)]
    pub key: BucketKey,
    pub total_issued: i64,
    pub total_served: i64,
    pub total_no_show: i64,
    pub total_cancelled: i64,
    pub wait_time: MinAvgMax,
    pub service_time: MinAvgMax,
    pub updated_at: DateTime<Utc>,
}

/// Recompute a bucket from scratch over the tickets that belong to it.
///
/// Tickets outside the bucket are ignored, so callers may pass a superset.
pub fn compute_bucket(
    key: BucketKey,
    tickets: &[Ticket],
    scope: &CalendarScope,
    now: DateTime<Utc>,
) -> AnalyticsBucket {
    let members: Vec<&Ticket> = tickets.iter().filter(|t| key.contains(t, scope)).collect();
    let count = |status: TicketStatus| members.iter().filter(|t| t.status == status).count() as i64;
    let completed: Vec<&&Ticket> = members
        .iter()
        .filter(|t| t.status == TicketStatus::Completed)
        .collect();

    AnalyticsBucket {
        total_issued: members.len() as i64,
        total_served: completed.len() as i64,
        total_no_show: count(TicketStatus::NoShow),
        total_cancelled: count(TicketStatus::Cancelled),
        wait_time: MinAvgMax::from_samples(completed.iter().filter_map(|t| t.actual_wait_time)),
        service_time: MinAvgMax::from_samples(completed.iter().filter_map(|t| t.service_time)),
        updated_at: now,
        key,
    }
}
