//! PostgreSQL queue store
//!
//! Concurrency relies on three database mechanisms:
//! - per-day sequence rows bumped with `INSERT ... ON CONFLICT DO UPDATE ... RETURNING`
//! - `FOR UPDATE SKIP LOCKED` inside the claim `UPDATE`, so concurrent counters skip
//!   each other's candidates instead of queueing behind them
//! - `version` / `current_ticket_id` predicates for compare-and-swap writes

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use medqueue_core::{
    AnalyticsBucket, BucketKey, Counter, CounterLoad, MinAvgMax, PositionChange, Ticket,
};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, QueryBuilder, Row};
use uuid::Uuid;

use super::traits::QueueStore;
use crate::models::{
    AnalyticsQuery, Announcement, ClaimOutcome, ClaimRequest, DisplayBoard, QueueConfig,
    TicketDraft, TicketOrder, TicketQuery,
};
use crate::{Error, Result};

const TICKET_COLUMNS: &str = "id, hospital_id, service_type, issue_day, ticket_number, token_display, \
     priority, urgency_level, priority_score, patient_id, appointment_id, department_id, \
     counter_id, ai_recommended_counter, patient_name, patient_phone, notes, status, \
     issued_at, called_at, served_at, completed_at, no_show_at, cancelled_at, last_called_at, \
     cancel_reason, call_count, queue_position, initial_position, estimated_wait_time, \
     actual_wait_time, service_time, created_by, version, updated_at";

const COUNTER_COLUMNS: &str = "id, hospital_id, counter_number, counter_name, counter_type, \
     services_offered, department_id, is_active, current_ticket_id, current_staff_id, \
     created_at, updated_at";

const CONFIG_COLUMNS: &str = "hospital_id, service_type, prefix, avg_service_time, max_wait_time, \
     priority_enabled, alert_queue_length, alert_wait_time, number_padding, updated_at, updated_by";

const BOARD_COLUMNS: &str =
    "id, hospital_id, name, department_ids, counter_ids, tickets_to_show, theme, is_active, created_at";

const ANNOUNCEMENT_COLUMNS: &str =
    "id, hospital_id, ticket_id, ticket_number, counter_name, text, status, created_at, played_at";

const BUCKET_COLUMNS: &str = "hospital_id, department_id, service_type, bucket_date, bucket_hour, \
     total_issued, total_served, total_no_show, total_cancelled, min_wait_time, avg_wait_time, \
     max_wait_time, min_service_time, avg_service_time, max_service_time, updated_at";

/// Queue store backed by PostgreSQL
#[derive(Debug, Clone)]
pub struct PostgresQueueStore {
    pool: PgPool,
}

impl PostgresQueueStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn map_write_error(e: sqlx::Error, what: &str) -> Error {
    if let sqlx::Error::Database(db) = &e {
        if db.is_unique_violation() {
            return Error::Conflict(format!("{what} already taken"));
        }
    }
    Error::Database(e)
}

fn ticket_from_row(row: &PgRow) -> Result<Ticket> {
    let priority: String = row.get("priority");
    let status: String = row.get("status");
    Ok(Ticket {
        id: row.get("id"),
        hospital_id: row.get("hospital_id"),
        service_type: row.get("service_type"),
        issue_day: row.get("issue_day"),
        ticket_number: row.get("ticket_number"),
        token_display: row.get("token_display"),
        priority: priority.parse()?,
        urgency_level: row.get("urgency_level"),
        priority_score: row.get("priority_score"),
        patient_id: row.get("patient_id"),
        appointment_id: row.get("appointment_id"),
        department_id: row.get("department_id"),
        counter_id: row.get("counter_id"),
        ai_recommended_counter: row.get("ai_recommended_counter"),
        patient_name: row.get("patient_name"),
        patient_phone: row.get("patient_phone"),
        notes: row.get("notes"),
        status: status.parse()?,
        issued_at: row.get("issued_at"),
        called_at: row.get("called_at"),
        served_at: row.get("served_at"),
        completed_at: row.get("completed_at"),
        no_show_at: row.get("no_show_at"),
        cancelled_at: row.get("cancelled_at"),
        last_called_at: row.get("last_called_at"),
        cancel_reason: row.get("cancel_reason"),
        call_count: row.get("call_count"),
        queue_position: row.get("queue_position"),
        initial_position: row.get("initial_position"),
        estimated_wait_time: row.get("estimated_wait_time"),
        actual_wait_time: row.get("actual_wait_time"),
        service_time: row.get("service_time"),
        created_by: row.get("created_by"),
        version: row.get("version"),
        updated_at: row.get("updated_at"),
    })
}

fn counter_from_row(row: &PgRow) -> Counter {
    Counter {
        id: row.get("id"),
        hospital_id: row.get("hospital_id"),
        counter_number: row.get("counter_number"),
        counter_name: row.get("counter_name"),
        counter_type: row.get("counter_type"),
        services_offered: row.get("services_offered"),
        department_id: row.get("department_id"),
        is_active: row.get("is_active"),
        current_ticket_id: row.get("current_ticket_id"),
        current_staff_id: row.get("current_staff_id"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn config_from_row(row: &PgRow) -> QueueConfig {
    QueueConfig {
        hospital_id: row.get("hospital_id"),
        service_type: row.get("service_type"),
        prefix: row.get("prefix"),
        avg_service_time: row.get("avg_service_time"),
        max_wait_time: row.get("max_wait_time"),
        priority_enabled: row.get("priority_enabled"),
        alert_queue_length: row.get("alert_queue_length"),
        alert_wait_time: row.get("alert_wait_time"),
        number_padding: row.get("number_padding"),
        updated_at: row.get("updated_at"),
        updated_by: row.get("updated_by"),
    }
}

fn board_from_row(row: &PgRow) -> DisplayBoard {
    DisplayBoard {
        id: row.get("id"),
        hospital_id: row.get("hospital_id"),
        name: row.get("name"),
        department_ids: row.get("department_ids"),
        counter_ids: row.get("counter_ids"),
        tickets_to_show: row.get("tickets_to_show"),
        theme: row.get("theme"),
        is_active: row.get("is_active"),
        created_at: row.get("created_at"),
    }
}

fn announcement_from_row(row: &PgRow) -> Result<Announcement> {
    let status: String = row.get("status");
    Ok(Announcement {
        id: row.get("id"),
        hospital_id: row.get("hospital_id"),
        ticket_id: row.get("ticket_id"),
        ticket_number: row.get("ticket_number"),
        counter_name: row.get("counter_name"),
        text: row.get("text"),
        status: status.parse()?,
        created_at: row.get("created_at"),
        played_at: row.get("played_at"),
    })
}

fn bucket_from_row(row: &PgRow) -> AnalyticsBucket {
    let hour: i32 = row.get("bucket_hour");
    AnalyticsBucket {
        key: BucketKey {
            hospital_id: row.get("hospital_id"),
            department_id: row.get("department_id"),
            service_type: row.get("service_type"),
            date: row.get("bucket_date"),
            hour: hour.clamp(0, 23) as u32,
        },
        total_issued: row.get("total_issued"),
        total_served: row.get("total_served"),
        total_no_show: row.get("total_no_show"),
        total_cancelled: row.get("total_cancelled"),
        wait_time: MinAvgMax {
            min: row.get("min_wait_time"),
            avg: row.get("avg_wait_time"),
            max: row.get("max_wait_time"),
        },
        service_time: MinAvgMax {
            min: row.get("min_service_time"),
            avg: row.get("avg_service_time"),
            max: row.get("max_service_time"),
        },
        updated_at: row.get("updated_at"),
    }
}

#[async_trait]
impl QueueStore for PostgresQueueStore {
    async fn issue_ticket(&self, draft: TicketDraft) -> Result<Ticket> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        // Row lock on the sequence row serializes issuance per (hospital, service, day)
        let number: i32 = sqlx::query_scalar(
            r#"
            INSERT INTO queue_sequences (hospital_id, service_type, issue_day, last_number)
            VALUES ($1, $2, $3, 1)
            ON CONFLICT (hospital_id, service_type, issue_day)
            DO UPDATE SET last_number = queue_sequences.last_number + 1
            RETURNING last_number
            "#,
        )
        .bind(draft.hospital_id)
        .bind(&draft.service_type)
        .bind(draft.issue_day)
        .fetch_one(&mut *tx)
        .await
        .map_err(Error::Database)?;

        let active: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM queue_tickets
            WHERE hospital_id = $1
              AND service_type = $2
              AND status IN ('WAITING', 'CALLED')
              AND issued_at >= $3 AND issued_at < $4
            "#,
        )
        .bind(draft.hospital_id)
        .bind(&draft.service_type)
        .bind(draft.day_start)
        .bind(draft.day_end)
        .fetch_one(&mut *tx)
        .await
        .map_err(Error::Database)?;

        let ticket = draft.into_ticket(number, active as i32 + 1);

        let insert = format!(
            "INSERT INTO queue_tickets ({TICKET_COLUMNS}) VALUES \
             ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, \
              $19, $20, $21, $22, $23, $24, $25, $26, $27, $28, $29, $30, $31, $32, $33, $34, $35)"
        );
        sqlx::query(&insert)
            .bind(ticket.id)
            .bind(ticket.hospital_id)
            .bind(&ticket.service_type)
            .bind(ticket.issue_day)
            .bind(ticket.ticket_number)
            .bind(&ticket.token_display)
            .bind(ticket.priority.as_str())
            .bind(&ticket.urgency_level)
            .bind(ticket.priority_score)
            .bind(ticket.patient_id)
            .bind(ticket.appointment_id)
            .bind(ticket.department_id)
            .bind(ticket.counter_id)
            .bind(ticket.ai_recommended_counter)
            .bind(&ticket.patient_name)
            .bind(&ticket.patient_phone)
            .bind(&ticket.notes)
            .bind(ticket.status.as_str())
            .bind(ticket.issued_at)
            .bind(ticket.called_at)
            .bind(ticket.served_at)
            .bind(ticket.completed_at)
            .bind(ticket.no_show_at)
            .bind(ticket.cancelled_at)
            .bind(ticket.last_called_at)
            .bind(&ticket.cancel_reason)
            .bind(ticket.call_count)
            .bind(ticket.queue_position)
            .bind(ticket.initial_position)
            .bind(ticket.estimated_wait_time)
            .bind(ticket.actual_wait_time)
            .bind(ticket.service_time)
            .bind(ticket.created_by)
            .bind(ticket.version)
            .bind(ticket.updated_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_write_error(e, "ticket number"))?;

        tx.commit().await.map_err(Error::Database)?;
        Ok(ticket)
    }

    async fn get_ticket(&self, hospital_id: Uuid, ticket_id: Uuid) -> Result<Option<Ticket>> {
        let row = sqlx::query(&format!(
            "SELECT {TICKET_COLUMNS} FROM queue_tickets WHERE id = $1 AND hospital_id = $2"
        ))
        .bind(ticket_id)
        .bind(hospital_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        row.as_ref().map(ticket_from_row).transpose()
    }

    async fn list_tickets(&self, query: &TicketQuery) -> Result<Vec<Ticket>> {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "SELECT {TICKET_COLUMNS} FROM queue_tickets WHERE hospital_id = "
        ));
        qb.push_bind(query.hospital_id);

        if let Some(service_type) = &query.service_type {
            qb.push(" AND service_type = ").push_bind(service_type.clone());
        }
        if !query.statuses.is_empty() {
            let statuses: Vec<String> = query
                .statuses
                .iter()
                .map(|s| s.as_str().to_string())
                .collect();
            qb.push(" AND status = ANY(").push_bind(statuses).push(")");
        }
        if let Some(counter_id) = query.counter_id {
            qb.push(" AND counter_id = ").push_bind(counter_id);
        }
        if let Some(phone) = &query.patient_phone {
            qb.push(" AND patient_phone = ").push_bind(phone.clone());
        }
        if let Some(from) = query.issued_from {
            qb.push(" AND issued_at >= ").push_bind(from);
        }
        if let Some(until) = query.issued_until {
            qb.push(" AND issued_at < ").push_bind(until);
        }

        qb.push(match query.order {
            TicketOrder::Dispatch => {
                " ORDER BY priority_score DESC, issued_at ASC, ticket_number ASC"
            }
            TicketOrder::IssuedDesc => " ORDER BY issued_at DESC, ticket_number DESC",
            TicketOrder::CompletedDesc => " ORDER BY completed_at DESC NULLS LAST, issued_at DESC",
        });
        if let Some(limit) = query.limit {
            qb.push(" LIMIT ").push_bind(limit);
        }

        let rows = qb
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;

        rows.iter().map(ticket_from_row).collect()
    }

    async fn update_ticket(&self, ticket: &Ticket, expected_version: i32) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE queue_tickets
            SET status = $3,
                counter_id = $4,
                called_at = $5,
                served_at = $6,
                completed_at = $7,
                no_show_at = $8,
                cancelled_at = $9,
                last_called_at = $10,
                cancel_reason = $11,
                call_count = $12,
                queue_position = $13,
                estimated_wait_time = $14,
                actual_wait_time = $15,
                service_time = $16,
                ai_recommended_counter = $17,
                notes = $18,
                version = $19,
                updated_at = $20
            WHERE id = $1 AND version = $2
            "#,
        )
        .bind(ticket.id)
        .bind(expected_version)
        .bind(ticket.status.as_str())
        .bind(ticket.counter_id)
        .bind(ticket.called_at)
        .bind(ticket.served_at)
        .bind(ticket.completed_at)
        .bind(ticket.no_show_at)
        .bind(ticket.cancelled_at)
        .bind(ticket.last_called_at)
        .bind(&ticket.cancel_reason)
        .bind(ticket.call_count)
        .bind(ticket.queue_position)
        .bind(ticket.estimated_wait_time)
        .bind(ticket.actual_wait_time)
        .bind(ticket.service_time)
        .bind(ticket.ai_recommended_counter)
        .bind(&ticket.notes)
        .bind(ticket.version)
        .bind(ticket.updated_at)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(result.rows_affected() == 1)
    }

    async fn set_ticket_enrichment(
        &self,
        ticket_id: Uuid,
        estimated_wait_time: i32,
        recommended_counter: Option<Uuid>,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE queue_tickets SET estimated_wait_time = $2, ai_recommended_counter = $3 WHERE id = $1",
        )
        .bind(ticket_id)
        .bind(estimated_wait_time)
        .bind(recommended_counter)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    async fn update_positions(&self, changes: &[PositionChange]) -> Result<()> {
        if changes.is_empty() {
            return Ok(());
        }
        let ids: Vec<Uuid> = changes.iter().map(|c| c.ticket_id).collect();
        let positions: Vec<i32> = changes.iter().map(|c| c.new_position).collect();

        // Single round-trip; tickets that left the waiting states meanwhile are skipped
        sqlx::query(
            r#"
            UPDATE queue_tickets AS t
            SET queue_position = p.position
            FROM UNNEST($1::uuid[], $2::int[]) AS p(id, position)
            WHERE t.id = p.id AND t.status IN ('WAITING', 'TRANSFERRED')
            "#,
        )
        .bind(&ids)
        .bind(&positions)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    async fn claim_next_ticket(&self, claim: &ClaimRequest) -> Result<ClaimOutcome> {
        let counter = &claim.counter;
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        let current: Option<Option<Uuid>> = sqlx::query_scalar(
            "SELECT current_ticket_id FROM queue_counters WHERE id = $1 AND hospital_id = $2 FOR UPDATE",
        )
        .bind(counter.id)
        .bind(counter.hospital_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(Error::Database)?;

        match current {
            None => {
                return Err(Error::NotFound(format!("counter {}", counter.id)));
            }
            Some(Some(_)) => {
                tx.rollback().await.map_err(Error::Database)?;
                return Ok(ClaimOutcome::CounterBusy);
            }
            Some(None) => {}
        }

        let claimed = sqlx::query(&format!(
            r#"
            UPDATE queue_tickets
            SET status = 'CALLED',
                counter_id = $1,
                called_at = $2,
                last_called_at = $2,
                call_count = call_count + 1,
                actual_wait_time = GREATEST(0, ROUND((EXTRACT(EPOCH FROM ($2 - issued_at)) / 60)::numeric))::int,
                queue_position = 0,
                version = version + 1,
                updated_at = $2
            WHERE id = (
                SELECT id
                FROM queue_tickets
                WHERE hospital_id = $3
                  AND status IN ('WAITING', 'TRANSFERRED')
                  AND issued_at >= $4 AND issued_at < $5
                  AND (
                      counter_id = $1
                      OR (counter_id IS NULL AND ($6::text[] IS NULL OR service_type = ANY($6)))
                  )
                ORDER BY priority_score DESC, issued_at ASC, ticket_number ASC
                LIMIT 1
                FOR UPDATE SKIP LOCKED
            )
            RETURNING {TICKET_COLUMNS}
            "#
        ))
        .bind(counter.id)
        .bind(claim.now)
        .bind(counter.hospital_id)
        .bind(claim.window_start)
        .bind(claim.window_end)
        .bind(counter.eligible_service_types())
        .fetch_optional(&mut *tx)
        .await
        .map_err(Error::Database)?;

        let ticket = claimed.as_ref().map(ticket_from_row).transpose()?;

        sqlx::query(
            r#"
            UPDATE queue_counters
            SET current_ticket_id = $2,
                current_staff_id = COALESCE($3, current_staff_id),
                updated_at = $4
            WHERE id = $1 AND current_ticket_id IS NULL
            "#,
        )
        .bind(counter.id)
        .bind(ticket.as_ref().map(|t| t.id))
        .bind(claim.staff_id)
        .bind(claim.now)
        .execute(&mut *tx)
        .await
        .map_err(Error::Database)?;

        tx.commit().await.map_err(Error::Database)?;

        Ok(match ticket {
            Some(ticket) => ClaimOutcome::Claimed(ticket),
            None => ClaimOutcome::Empty,
        })
    }

    async fn count_active_tickets(
        &self,
        hospital_id: Uuid,
        service_type: &str,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<i64> {
        sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM queue_tickets
            WHERE hospital_id = $1
              AND service_type = $2
              AND status IN ('WAITING', 'CALLED')
              AND issued_at >= $3 AND issued_at < $4
            "#,
        )
        .bind(hospital_id)
        .bind(service_type)
        .bind(from)
        .bind(until)
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)
    }

    async fn recent_completed_service_times(
        &self,
        hospital_id: Uuid,
        service_type: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<i32>> {
        sqlx::query_scalar(
            r#"
            SELECT service_time
            FROM queue_tickets
            WHERE hospital_id = $1
              AND service_type = $2
              AND status = 'COMPLETED'
              AND completed_at >= $3
              AND service_time IS NOT NULL
            "#,
        )
        .bind(hospital_id)
        .bind(service_type)
        .bind(since)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)
    }

    async fn active_counter_count(&self, hospital_id: Uuid, service_type: &str) -> Result<i64> {
        sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM queue_counters
            WHERE hospital_id = $1
              AND is_active
              AND (counter_type = $2 OR $3 = ANY(services_offered))
            "#,
        )
        .bind(hospital_id)
        .bind(medqueue_core::service_counter_type(service_type))
        .bind(service_type)
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)
    }

    async fn counter_loads(
        &self,
        hospital_id: Uuid,
        service_type: &str,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<CounterLoad>> {
        let rows = sqlx::query(
            r#"
            SELECT c.id, COUNT(t.id) AS load
            FROM queue_counters c
            LEFT JOIN queue_tickets t
              ON t.counter_id = c.id
             AND t.status IN ('WAITING', 'CALLED', 'SERVING', 'TRANSFERRED')
             AND t.issued_at >= $4 AND t.issued_at < $5
            WHERE c.hospital_id = $1
              AND c.is_active
              AND (c.counter_type = $2 OR $3 = ANY(c.services_offered))
            GROUP BY c.id, c.counter_number
            ORDER BY c.counter_number ASC, c.id ASC
            "#,
        )
        .bind(hospital_id)
        .bind(medqueue_core::service_counter_type(service_type))
        .bind(service_type)
        .bind(from)
        .bind(until)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows
            .into_iter()
            .map(|row| CounterLoad {
                counter_id: row.get("id"),
                load: row.get("load"),
            })
            .collect())
    }

    async fn insert_counter(&self, counter: &Counter) -> Result<()> {
        let result = sqlx::query(&format!(
            "INSERT INTO queue_counters ({COUNTER_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)"
        ))
        .bind(counter.id)
        .bind(counter.hospital_id)
        .bind(counter.counter_number)
        .bind(&counter.counter_name)
        .bind(&counter.counter_type)
        .bind(&counter.services_offered)
        .bind(counter.department_id)
        .bind(counter.is_active)
        .bind(counter.current_ticket_id)
        .bind(counter.current_staff_id)
        .bind(counter.created_at)
        .bind(counter.updated_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) => match map_write_error(e, "counter number") {
                Error::Conflict(_) => Err(Error::AlreadyExists(format!(
                    "counter number {} in this hospital",
                    counter.counter_number
                ))),
                other => Err(other),
            },
        }
    }

    async fn get_counter(&self, hospital_id: Uuid, counter_id: Uuid) -> Result<Option<Counter>> {
        let row = sqlx::query(&format!(
            "SELECT {COUNTER_COLUMNS} FROM queue_counters WHERE id = $1 AND hospital_id = $2"
        ))
        .bind(counter_id)
        .bind(hospital_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.as_ref().map(counter_from_row))
    }

    async fn list_counters(&self, hospital_id: Uuid) -> Result<Vec<Counter>> {
        let rows = sqlx::query(&format!(
            "SELECT {COUNTER_COLUMNS} FROM queue_counters WHERE hospital_id = $1 \
             ORDER BY counter_number ASC, id ASC"
        ))
        .bind(hospital_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows.iter().map(counter_from_row).collect())
    }

    async fn update_counter_settings(&self, counter: &Counter) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE queue_counters
            SET counter_name = $3,
                counter_type = $4,
                services_offered = $5,
                department_id = $6,
                is_active = $7,
                updated_at = $8
            WHERE id = $1 AND hospital_id = $2
              AND ($7 OR current_ticket_id IS NULL)
            "#,
        )
        .bind(counter.id)
        .bind(counter.hospital_id)
        .bind(&counter.counter_name)
        .bind(&counter.counter_type)
        .bind(&counter.services_offered)
        .bind(counter.department_id)
        .bind(counter.is_active)
        .bind(counter.updated_at)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(result.rows_affected() == 1)
    }

    async fn set_counter_ticket(
        &self,
        counter_id: Uuid,
        expected: Option<Uuid>,
        new_ticket: Option<Uuid>,
        staff_id: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE queue_counters
            SET current_ticket_id = $3,
                current_staff_id = COALESCE($4, current_staff_id),
                updated_at = $5
            WHERE id = $1 AND current_ticket_id IS NOT DISTINCT FROM $2
            "#,
        )
        .bind(counter_id)
        .bind(expected)
        .bind(new_ticket)
        .bind(staff_id)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(result.rows_affected() == 1)
    }

    async fn get_queue_config(
        &self,
        hospital_id: Uuid,
        service_type: &str,
    ) -> Result<Option<QueueConfig>> {
        let row = sqlx::query(&format!(
            "SELECT {CONFIG_COLUMNS} FROM queue_configs WHERE hospital_id = $1 AND service_type = $2"
        ))
        .bind(hospital_id)
        .bind(service_type)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.as_ref().map(config_from_row))
    }

    async fn list_queue_configs(&self, hospital_id: Uuid) -> Result<Vec<QueueConfig>> {
        let rows = sqlx::query(&format!(
            "SELECT {CONFIG_COLUMNS} FROM queue_configs WHERE hospital_id = $1 ORDER BY service_type"
        ))
        .bind(hospital_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows.iter().map(config_from_row).collect())
    }

    async fn upsert_queue_config(&self, config: &QueueConfig) -> Result<()> {
        sqlx::query(&format!(
            r#"
            INSERT INTO queue_configs ({CONFIG_COLUMNS})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (hospital_id, service_type) DO UPDATE SET
                prefix = EXCLUDED.prefix,
                avg_service_time = EXCLUDED.avg_service_time,
                max_wait_time = EXCLUDED.max_wait_time,
                priority_enabled = EXCLUDED.priority_enabled,
                alert_queue_length = EXCLUDED.alert_queue_length,
                alert_wait_time = EXCLUDED.alert_wait_time,
                number_padding = EXCLUDED.number_padding,
                updated_at = EXCLUDED.updated_at,
                updated_by = EXCLUDED.updated_by
            "#
        ))
        .bind(config.hospital_id)
        .bind(&config.service_type)
        .bind(&config.prefix)
        .bind(config.avg_service_time)
        .bind(config.max_wait_time)
        .bind(config.priority_enabled)
        .bind(config.alert_queue_length)
        .bind(config.alert_wait_time)
        .bind(config.number_padding)
        .bind(config.updated_at.unwrap_or_else(Utc::now))
        .bind(config.updated_by)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    async fn insert_display_board(&self, board: &DisplayBoard) -> Result<()> {
        sqlx::query(&format!(
            "INSERT INTO queue_display_boards ({BOARD_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)"
        ))
        .bind(board.id)
        .bind(board.hospital_id)
        .bind(&board.name)
        .bind(&board.department_ids)
        .bind(&board.counter_ids)
        .bind(board.tickets_to_show)
        .bind(&board.theme)
        .bind(board.is_active)
        .bind(board.created_at)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    async fn get_display_board(
        &self,
        hospital_id: Uuid,
        board_id: Uuid,
    ) -> Result<Option<DisplayBoard>> {
        let row = sqlx::query(&format!(
            "SELECT {BOARD_COLUMNS} FROM queue_display_boards WHERE id = $1 AND hospital_id = $2"
        ))
        .bind(board_id)
        .bind(hospital_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.as_ref().map(board_from_row))
    }

    async fn list_display_boards(&self, hospital_id: Uuid) -> Result<Vec<DisplayBoard>> {
        let rows = sqlx::query(&format!(
            "SELECT {BOARD_COLUMNS} FROM queue_display_boards WHERE hospital_id = $1 \
             ORDER BY created_at ASC"
        ))
        .bind(hospital_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows.iter().map(board_from_row).collect())
    }

    async fn insert_announcement(&self, announcement: &Announcement) -> Result<()> {
        sqlx::query(&format!(
            "INSERT INTO queue_announcements ({ANNOUNCEMENT_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)"
        ))
        .bind(announcement.id)
        .bind(announcement.hospital_id)
        .bind(announcement.ticket_id)
        .bind(&announcement.ticket_number)
        .bind(&announcement.counter_name)
        .bind(&announcement.text)
        .bind(announcement.status.as_str())
        .bind(announcement.created_at)
        .bind(announcement.played_at)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    async fn list_pending_announcements(
        &self,
        hospital_id: Uuid,
        limit: i64,
    ) -> Result<Vec<Announcement>> {
        let rows = sqlx::query(&format!(
            "SELECT {ANNOUNCEMENT_COLUMNS} FROM queue_announcements \
             WHERE hospital_id = $1 AND status = 'pending' \
             ORDER BY created_at ASC LIMIT $2"
        ))
        .bind(hospital_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        rows.iter().map(announcement_from_row).collect()
    }

    async fn mark_announcement_played(
        &self,
        hospital_id: Uuid,
        announcement_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<Announcement>> {
        let row = sqlx::query(&format!(
            "UPDATE queue_announcements \
             SET status = 'played', played_at = COALESCE(played_at, $3) \
             WHERE id = $1 AND hospital_id = $2 \
             RETURNING {ANNOUNCEMENT_COLUMNS}"
        ))
        .bind(announcement_id)
        .bind(hospital_id)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        row.as_ref().map(announcement_from_row).transpose()
    }

    async fn upsert_analytics_bucket(&self, bucket: &AnalyticsBucket) -> Result<()> {
        let key = &bucket.key;
        sqlx::query(
            r#"
            INSERT INTO queue_analytics (
                hospital_id, department_key, department_id, service_type, bucket_date, bucket_hour,
                total_issued, total_served, total_no_show, total_cancelled,
                min_wait_time, avg_wait_time, max_wait_time,
                min_service_time, avg_service_time, max_service_time, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            ON CONFLICT (hospital_id, department_key, service_type, bucket_date, bucket_hour)
            DO UPDATE SET
                total_issued = EXCLUDED.total_issued,
                total_served = EXCLUDED.total_served,
                total_no_show = EXCLUDED.total_no_show,
                total_cancelled = EXCLUDED.total_cancelled,
                min_wait_time = EXCLUDED.min_wait_time,
                avg_wait_time = EXCLUDED.avg_wait_time,
                max_wait_time = EXCLUDED.max_wait_time,
                min_service_time = EXCLUDED.min_service_time,
                avg_service_time = EXCLUDED.avg_service_time,
                max_service_time = EXCLUDED.max_service_time,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(key.hospital_id)
        .bind(key.department_id.unwrap_or(Uuid::nil()))
        .bind(key.department_id)
        .bind(&key.service_type)
        .bind(key.date)
        .bind(key.hour as i32)
        .bind(bucket.total_issued)
        .bind(bucket.total_served)
        .bind(bucket.total_no_show)
        .bind(bucket.total_cancelled)
        .bind(bucket.wait_time.min)
        .bind(bucket.wait_time.avg)
        .bind(bucket.wait_time.max)
        .bind(bucket.service_time.min)
        .bind(bucket.service_time.avg)
        .bind(bucket.service_time.max)
        .bind(bucket.updated_at)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    async fn list_analytics_buckets(&self, query: &AnalyticsQuery) -> Result<Vec<AnalyticsBucket>> {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "SELECT {BUCKET_COLUMNS} FROM queue_analytics WHERE hospital_id = "
        ));
        qb.push_bind(query.hospital_id);
        if let Some(date) = query.date {
            qb.push(" AND bucket_date = ").push_bind(date);
        }
        if let Some(service_type) = &query.service_type {
            qb.push(" AND service_type = ").push_bind(service_type.clone());
        }
        if let Some(department_id) = query.department_id {
            qb.push(" AND department_id = ").push_bind(department_id);
        }
        qb.push(" ORDER BY bucket_date ASC, bucket_hour ASC, service_type ASC, department_key ASC");

        let rows = qb
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;

        Ok(rows.iter().map(bucket_from_row).collect())
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(())
    }
}
