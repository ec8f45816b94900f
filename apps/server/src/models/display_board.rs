use chrono::{DateTime, Utc};
use medqueue_core::{Counter, Ticket};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A screen in a waiting area, optionally limited to some departments or counters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayBoard {
    pub id: Uuid,
    pub hospital_id: Uuid,
    pub name: String,
    pub department_ids: Vec<Uuid>,
    pub counter_ids: Vec<Uuid>,
    pub tickets_to_show: i32,
    pub theme: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl DisplayBoard {
    /// Empty allow-lists admit everything.
    pub fn shows_ticket(&self, ticket: &Ticket) -> bool {
        let department_ok = self.department_ids.is_empty()
            || ticket
                .department_id
                .is_some_and(|d| self.department_ids.contains(&d));
        let counter_ok = self.counter_ids.is_empty()
            || ticket.counter_id.map_or(true, |c| self.counter_ids.contains(&c));
        department_ok && counter_ok
    }

    pub fn shows_counter(&self, counter: &Counter) -> bool {
        (self.counter_ids.is_empty() || self.counter_ids.contains(&counter.id))
            && (self.department_ids.is_empty()
                || counter
                    .department_id
                    .is_some_and(|d| self.department_ids.contains(&d)))
    }
}
