//! Read model for waiting-area screens, kiosks and announcement players

use chrono::{DateTime, Utc};
use medqueue_core::{Counter, Priority, Ticket, TicketStatus};
use serde::Serialize;
use std::collections::HashMap;
use uuid::Uuid;

use super::QueueContext;
use crate::models::{
    Announcement, CreateDisplayBoardRequest, DisplayBoard, DisplayParams, TicketOrder, TicketQuery,
};
use crate::{Error, Result};

const MAX_TICKETS_TO_SHOW: usize = 100;

/// Public projection of a ticket. Carries no patient details.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayTicket {
    pub id: Uuid,
    pub token_display: String,
    pub service_type: String,
    pub priority: Priority,
    pub status: TicketStatus,
    pub queue_position: i32,
    pub estimated_wait_time: i32,
    pub issued_at: DateTime<Utc>,
    pub called_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<&Ticket> for DisplayTicket {
    fn from(ticket: &Ticket) -> Self {
        Self {
            id: ticket.id,
            token_display: ticket.token_display.clone(),
            service_type: ticket.service_type.clone(),
            priority: ticket.priority,
            status: ticket.status,
            queue_position: ticket.queue_position,
            estimated_wait_time: ticket.estimated_wait_time,
            issued_at: ticket.issued_at,
            called_at: ticket.called_at,
            completed_at: ticket.completed_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServingEntry {
    pub ticket: DisplayTicket,
    pub counter_id: Uuid,
    pub counter_number: i32,
    pub counter_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplaySnapshot {
    pub hospital_id: Uuid,
    pub board: Option<DisplayBoard>,
    pub waiting: Vec<DisplayTicket>,
    pub total_waiting: usize,
    pub serving: Vec<ServingEntry>,
    pub recent_completed: Vec<DisplayTicket>,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct DisplayService {
    ctx: QueueContext,
}

impl DisplayService {
    pub fn new(ctx: QueueContext) -> Self {
        Self { ctx }
    }

    pub async fn snapshot(&self, hospital_id: Uuid, params: &DisplayParams) -> Result<DisplaySnapshot> {
        let board = match params.board_id {
            Some(board_id) => {
                let board = self
                    .ctx
                    .store
                    .get_display_board(hospital_id, board_id)
                    .await?
                    .ok_or_else(|| Error::NotFound(format!("display board {board_id}")))?;
                if !board.is_active {
                    return Err(Error::InvalidState(format!(
                        "display board {} is inactive",
                        board.name
                    )));
                }
                Some(board)
            }
            None => None,
        };

        let limit = params
            .limit
            .or_else(|| board.as_ref().map(|b| b.tickets_to_show.max(1) as usize))
            .unwrap_or(self.ctx.settings.default_tickets_to_show)
            .clamp(1, MAX_TICKETS_TO_SHOW);
        let visible = |ticket: &Ticket| board.as_ref().map_or(true, |b| b.shows_ticket(ticket));

        let now = self.ctx.now();
        let today = self.ctx.day_window(now);
        let base = {
            let query = TicketQuery::for_hospital(hospital_id).issued_between(today.start, today.end);
            match params.service_type.as_deref() {
                Some(service_type) => {
                    query.with_service_type(medqueue_core::normalize_service_type(service_type)?)
                }
                None => query,
            }
        };

        let waiting: Vec<Ticket> = self
            .ctx
            .store
            .list_tickets(
                &base
                    .clone()
                    .with_statuses(&[TicketStatus::Waiting, TicketStatus::Transferred]),
            )
            .await?
            .into_iter()
            .filter(|t| visible(t))
            .collect();

        let counters: HashMap<Uuid, Counter> = self
            .ctx
            .store
            .list_counters(hospital_id)
            .await?
            .into_iter()
            .map(|c| (c.id, c))
            .collect();

        let mut serving: Vec<ServingEntry> = self
            .ctx
            .store
            .list_tickets(
                &base
                    .clone()
                    .with_statuses(&[TicketStatus::Called, TicketStatus::Serving]),
            )
            .await?
            .iter()
            .filter(|t| visible(t))
            .filter_map(|t| {
                let counter = counters.get(&t.counter_id?)?;
                board
                    .as_ref()
                    .map_or(true, |b| b.shows_counter(counter))
                    .then(|| ServingEntry {
                        ticket: DisplayTicket::from(t),
                        counter_id: counter.id,
                        counter_number: counter.counter_number,
                        counter_name: counter.counter_name.clone(),
                    })
            })
            .collect();
        serving.sort_by_key(|entry| entry.counter_number);

        let recent_completed: Vec<DisplayTicket> = self
            .ctx
            .store
            .list_tickets(
                &base
                    .with_statuses(&[TicketStatus::Completed])
                    .ordered(TicketOrder::CompletedDesc, None),
            )
            .await?
            .iter()
            .filter(|t| visible(t))
            .take(self.ctx.settings.recent_completed_count)
            .map(DisplayTicket::from)
            .collect();

        Ok(DisplaySnapshot {
            hospital_id,
            total_waiting: waiting.len(),
            waiting: waiting.iter().take(limit).map(DisplayTicket::from).collect(),
            serving,
            recent_completed,
            board,
            generated_at: now,
        })
    }

    #[tracing::instrument(skip(self, request), fields(name = %request.name))]
    pub async fn create_board(
        &self,
        hospital_id: Uuid,
        request: CreateDisplayBoardRequest,
    ) -> Result<DisplayBoard> {
        let board = DisplayBoard {
            id: Uuid::new_v4(),
            hospital_id,
            name: request.name.trim().to_string(),
            department_ids: request.department_ids,
            counter_ids: request.counter_ids,
            tickets_to_show: request
                .tickets_to_show
                .unwrap_or(self.ctx.settings.default_tickets_to_show as i32),
            theme: request.theme.unwrap_or_else(|| "default".to_string()),
            is_active: request.is_active.unwrap_or(true),
            created_at: self.ctx.now(),
        };
        self.ctx.store.insert_display_board(&board).await?;
        tracing::info!(board_id = %board.id, "Display board created");
        Ok(board)
    }

    pub async fn list_boards(&self, hospital_id: Uuid) -> Result<Vec<DisplayBoard>> {
        self.ctx.store.list_display_boards(hospital_id).await
    }

    pub async fn pending_announcements(
        &self,
        hospital_id: Uuid,
        limit: Option<i64>,
    ) -> Result<Vec<Announcement>> {
        let limit = limit.unwrap_or(20).clamp(1, 100);
        self.ctx
            .store
            .list_pending_announcements(hospital_id, limit)
            .await
    }

    pub async fn mark_played(&self, hospital_id: Uuid, announcement_id: Uuid) -> Result<Announcement> {
        self.ctx
            .store
            .mark_announcement_played(hospital_id, announcement_id, self.ctx.now())
            .await?
            .ok_or_else(|| Error::NotFound(format!("announcement {announcement_id}")))
    }
}
