//! Service counters and counter eligibility

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ticket::Ticket;

/// A physical or virtual service point that calls tickets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Counter {
    pub id: Uuid,
    pub hospital_id: Uuid,
    pub counter_number: i32,
    pub counter_name: String,
    pub counter_type: Option<String>,
    #[serde(default)]
    pub services_offered: Vec<String>,
    pub department_id: Option<Uuid>,
    pub is_active: bool,
    pub current_ticket_id: Option<Uuid>,
    pub current_staff_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Counter type that serves a given service type, e.g. `laboratory` -> `LABORATORY`.
pub fn service_counter_type(service_type: &str) -> String {
    service_type.trim().to_ascii_uppercase().replace(['-', ' '], "_")
}

impl Counter {
    /// True when the counter declares no specialisation at all.
    pub fn is_generalist(&self) -> bool {
        self.counter_type
            .as_deref()
            .map(|t| t.trim().is_empty() || t.eq_ignore_ascii_case("GENERAL"))
            .unwrap_or(true)
            && self.services_offered.is_empty()
    }

    /// Matches either by counter type or by an explicit services entry.
    pub fn serves(&self, service_type: &str) -> bool {
        let wanted = service_counter_type(service_type);
        self.counter_type
            .as_deref()
            .is_some_and(|t| service_counter_type(t) == wanted)
            || self
                .services_offered
                .iter()
                .any(|s| service_counter_type(s) == wanted)
    }

    /// Lower-cased service types this counter may pull from the shared pool.
    ///
    /// `None` means any service type (generalist counter).
    pub fn eligible_service_types(&self) -> Option<Vec<String>> {
        if self.is_generalist() {
            return None;
        }
        let mut types: Vec<String> = self
            .counter_type
            .iter()
            .chain(self.services_offered.iter())
            .map(|s| service_counter_type(s).to_ascii_lowercase())
            .filter(|s| !s.is_empty())
            .collect();
        types.sort();
        types.dedup();
        Some(types)
    }

    /// Whether call-next on this counter may pick `ticket`.
    pub fn can_call(&self, ticket: &Ticket) -> bool {
        if !ticket.status.is_waiting() || ticket.hospital_id != self.hospital_id {
            return false;
        }
        match ticket.counter_id {
            Some(bound) => bound == self.id,
            None => self.is_generalist() || self.serves(&ticket.service_type),
        }
    }
}

/// Active-ticket load of one candidate counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterLoad {
    pub counter_id: Uuid,
    pub load: i64,
}

/// Pick the least-loaded counter; ties go to the first entry.
///
/// Callers pass candidates in counter-number order.
pub fn least_loaded(candidates: &[CounterLoad]) -> Option<Uuid> {
    let mut best: Option<&CounterLoad> = None;
    for candidate in candidates {
        match best {
            Some(current) if current.load <= candidate.load => {}
            _ => best = Some(candidate),
        }
    }
    best.map(|c| c.counter_id)
}
