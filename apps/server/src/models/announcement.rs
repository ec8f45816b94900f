use chrono::{DateTime, Utc};
use medqueue_core::{Counter, Ticket};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnnouncementStatus {
    Pending,
    Played,
}

impl AnnouncementStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnnouncementStatus::Pending => "pending",
            AnnouncementStatus::Played => "played",
        }
    }
}

impl fmt::Display for AnnouncementStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnnouncementStatus {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s {
            "pending" => Ok(AnnouncementStatus::Pending),
            "played" => Ok(AnnouncementStatus::Played),
            other => Err(crate::Error::Internal(format!(
                "unknown announcement status '{other}'"
            ))),
        }
    }
}

/// Text to be read out (or shown) when a ticket is called to a counter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Announcement {
    pub id: Uuid,
    pub hospital_id: Uuid,
    pub ticket_id: Uuid,
    pub ticket_number: String,
    pub counter_name: String,
    pub text: String,
    pub status: AnnouncementStatus,
    pub created_at: DateTime<Utc>,
    pub played_at: Option<DateTime<Utc>>,
}

impl Announcement {
    pub fn for_call(ticket: &Ticket, counter: &Counter, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            hospital_id: ticket.hospital_id,
            ticket_id: ticket.id,
            ticket_number: ticket.token_display.clone(),
            counter_name: counter.counter_name.clone(),
            text: format!(
                "Token {}, please proceed to {}",
                ticket.token_display, counter.counter_name
            ),
            status: AnnouncementStatus::Pending,
            created_at: now,
            played_at: None,
        }
    }
}
