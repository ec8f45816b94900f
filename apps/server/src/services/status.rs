//! Queue status summary and patient-facing ticket lookup

use chrono::{DateTime, Utc};
use medqueue_core::{live_position, normalize_service_type, Priority, Ticket, TicketStatus};
use serde::Serialize;
use std::collections::BTreeMap;
use uuid::Uuid;

use super::display::DisplayTicket;
use super::{QueueConfigService, QueueContext, WaitEstimator};
use crate::models::{normalize_phone, TicketLookupParams, TicketOrder, TicketQuery};
use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceQueueStatus {
    pub service_type: String,
    pub waiting: i64,
    pub serving: i64,
    pub completed: i64,
    pub no_show: i64,
    pub cancelled: i64,
    /// Mean of the stored estimates of waiting tickets.
    pub average_wait_estimate: i32,
    pub longest_wait_minutes: i32,
    /// Position and estimate a NORMAL walk-in issued now would get.
    pub next_position: i32,
    pub next_wait_estimate: i32,
    pub max_wait_time: i32,
    pub alert_queue_length: i32,
    pub alert_wait_time: i32,
    pub queue_length_alert: bool,
    pub wait_time_alert: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStatusSummary {
    pub hospital_id: Uuid,
    pub date: chrono::NaiveDate,
    pub total_waiting: i64,
    pub total_serving: i64,
    pub alert: bool,
    pub services: Vec<ServiceQueueStatus>,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketStatusView {
    pub ticket: DisplayTicket,
    /// Live position among today's waiting tickets; `None` once called.
    pub position: Option<i32>,
    pub people_ahead: Option<i32>,
    pub estimated_wait_minutes: Option<i32>,
    pub counter_id: Option<Uuid>,
    pub counter_name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct StatusService {
    ctx: QueueContext,
    configs: QueueConfigService,
    estimator: WaitEstimator,
}

impl StatusService {
    pub fn new(ctx: QueueContext, configs: QueueConfigService, estimator: WaitEstimator) -> Self {
        Self {
            ctx,
            configs,
            estimator,
        }
    }

    pub async fn summary(
        &self,
        hospital_id: Uuid,
        service_type: Option<&str>,
    ) -> Result<QueueStatusSummary> {
        let now = self.ctx.now();
        let today = self.ctx.day_window(now);
        let service_type = service_type.map(normalize_service_type).transpose()?;

        let mut query = TicketQuery::for_hospital(hospital_id).issued_between(today.start, today.end);
        if let Some(service_type) = &service_type {
            query = query.with_service_type(service_type.clone());
        }
        let tickets = self.ctx.store.list_tickets(&query).await?;

        let mut by_service: BTreeMap<String, Vec<&Ticket>> = BTreeMap::new();
        match &service_type {
            Some(service_type) => {
                by_service.entry(service_type.clone()).or_default();
            }
            None => {
                for config in self.configs.list(hospital_id).await? {
                    by_service.entry(config.service_type).or_default();
                }
            }
        }
        for ticket in &tickets {
            by_service
                .entry(ticket.service_type.clone())
                .or_default()
                .push(ticket);
        }

        let mut services = Vec::with_capacity(by_service.len());
        for (service_type, tickets) in by_service {
            let config = self.configs.effective(hospital_id, &service_type).await?;
            let count = |pred: fn(&TicketStatus) -> bool| {
                tickets.iter().filter(|t| pred(&t.status)).count() as i64
            };
            let waiting: Vec<&&Ticket> = tickets.iter().filter(|t| t.status.is_waiting()).collect();
            let longest_wait_minutes = waiting
                .iter()
                .map(|t| t.minutes_waiting(now))
                .max()
                .unwrap_or(0);
            let average_wait_estimate = if waiting.is_empty() {
                0
            } else {
                let sum: i64 = waiting.iter().map(|t| i64::from(t.estimated_wait_time)).sum();
                (sum as f64 / waiting.len() as f64).round() as i32
            };

            let active = self
                .ctx
                .store
                .count_active_tickets(hospital_id, &service_type, today.start, today.end)
                .await?;
            let next_position = active as i32 + 1;
            let next_wait_estimate = self
                .estimator
                .estimate(hospital_id, &service_type, next_position, Priority::Normal)
                .await?;

            let waiting_count = waiting.len() as i64;
            services.push(ServiceQueueStatus {
                waiting: waiting_count,
                serving: count(TicketStatus::is_at_counter),
                completed: count(|s| *s == TicketStatus::Completed),
                no_show: count(|s| *s == TicketStatus::NoShow),
                cancelled: count(|s| *s == TicketStatus::Cancelled),
                average_wait_estimate,
                longest_wait_minutes,
                next_position,
                next_wait_estimate,
                max_wait_time: config.max_wait_time,
                alert_queue_length: config.alert_queue_length,
                alert_wait_time: config.alert_wait_time,
                queue_length_alert: waiting_count >= i64::from(config.alert_queue_length),
                wait_time_alert: longest_wait_minutes >= config.alert_wait_time
                    || longest_wait_minutes > config.max_wait_time,
                service_type,
            });
        }

        Ok(QueueStatusSummary {
            hospital_id,
            date: today.day,
            total_waiting: services.iter().map(|s| s.waiting).sum(),
            total_serving: services.iter().map(|s| s.serving).sum(),
            alert: services
                .iter()
                .any(|s| s.queue_length_alert || s.wait_time_alert),
            services,
            generated_at: now,
        })
    }

    /// Find a ticket by id, or a patient's most relevant ticket of the day by phone.
    pub async fn lookup(
        &self,
        hospital_id: Uuid,
        params: &TicketLookupParams,
    ) -> Result<TicketStatusView> {
        let phone = params.phone.as_deref().and_then(normalize_phone);
        let ticket = match (params.ticket_id, phone) {
            (Some(ticket_id), _) => self
                .ctx
                .store
                .get_ticket(hospital_id, ticket_id)
                .await?
                .ok_or_else(|| Error::NotFound(format!("ticket {ticket_id}")))?,
            (None, Some(phone)) => self.find_by_phone(hospital_id, &phone).await?,
            _ => {
                return Err(Error::Validation(
                    "either ticketId or phone is required".to_string(),
                ))
            }
        };
        self.view(&ticket).await
    }

    async fn find_by_phone(&self, hospital_id: Uuid, phone: &str) -> Result<Ticket> {
        let today = self.ctx.today();
        let mut query = TicketQuery::for_hospital(hospital_id)
            .issued_between(today.start, today.end)
            .ordered(TicketOrder::IssuedDesc, None);
        query.patient_phone = Some(phone.to_string());

        let tickets = self.ctx.store.list_tickets(&query).await?;
        tickets
            .iter()
            .find(|t| t.status.is_active())
            .or_else(|| tickets.first())
            .cloned()
            .ok_or_else(|| Error::NotFound("no ticket today for this phone number".to_string()))
    }

    async fn view(&self, ticket: &Ticket) -> Result<TicketStatusView> {
        let (position, estimate) = if ticket.status.is_waiting() {
            let today = self.ctx.day_window(ticket.issued_at);
            let query = TicketQuery::for_hospital(ticket.hospital_id)
                .with_service_type(ticket.service_type.clone())
                .with_statuses(&[TicketStatus::Waiting, TicketStatus::Transferred])
                .issued_between(today.start, today.end);
            let waiting = self.ctx.store.list_tickets(&query).await?;
            let position = live_position(&waiting, ticket.id);
            let estimate = match position {
                Some(position) => Some(
                    self.estimator
                        .estimate(ticket.hospital_id, &ticket.service_type, position, ticket.priority)
                        .await?,
                ),
                None => None,
            };
            (position, estimate)
        } else {
            (None, None)
        };

        let counter = match ticket.counter_id {
            Some(counter_id) => self.ctx.store.get_counter(ticket.hospital_id, counter_id).await?,
            None => None,
        };

        Ok(TicketStatusView {
            ticket: DisplayTicket::from(ticket),
            position,
            people_ahead: position.map(|p| p - 1),
            estimated_wait_minutes: estimate,
            counter_id: ticket.counter_id,
            counter_name: counter.map(|c| c.counter_name),
        })
    }
}
