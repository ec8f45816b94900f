//! Ticket issuance and dispatch handlers

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::json;
use uuid::Uuid;

use crate::api::extractors::{optional_json, StaffContext, ValidatedJson};
use crate::models::{
    CallNextRequest, CancelTicketRequest, IssueTicketRequest, ServiceTypeParams,
    TicketLookupParams, TransferTicketRequest,
};
use crate::state::AppState;
use crate::Result;

pub async fn issue_ticket(
    State(state): State<AppState>,
    staff: StaffContext,
    ValidatedJson(request): ValidatedJson<IssueTicketRequest>,
) -> Result<impl IntoResponse> {
    let ticket = state
        .issuance
        .issue(staff.hospital_id, staff.staff_id, request)
        .await?;
    Ok((StatusCode::CREATED, Json(ticket)))
}

pub async fn call_next(
    State(state): State<AppState>,
    staff: StaffContext,
    ValidatedJson(request): ValidatedJson<CallNextRequest>,
) -> Result<impl IntoResponse> {
    let outcome = state
        .dispatch
        .call_next(
            staff.hospital_id,
            request.counter_id,
            request.staff_id.or(staff.staff_id),
        )
        .await?;
    Ok(Json(outcome))
}

pub async fn start_serving(
    State(state): State<AppState>,
    staff: StaffContext,
    Path(ticket_id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let ticket = state
        .dispatch
        .start_serving(staff.hospital_id, ticket_id)
        .await?;
    Ok(Json(ticket))
}

pub async fn complete_ticket(
    State(state): State<AppState>,
    staff: StaffContext,
    Path(ticket_id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let ticket = state.dispatch.complete(staff.hospital_id, ticket_id).await?;
    Ok(Json(ticket))
}

pub async fn mark_no_show(
    State(state): State<AppState>,
    staff: StaffContext,
    Path(ticket_id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let ticket = state.dispatch.no_show(staff.hospital_id, ticket_id).await?;
    Ok(Json(ticket))
}

pub async fn cancel_ticket(
    State(state): State<AppState>,
    staff: StaffContext,
    Path(ticket_id): Path<Uuid>,
    body: Bytes,
) -> Result<impl IntoResponse> {
    let request: CancelTicketRequest = optional_json(&body)?;
    let ticket = state
        .dispatch
        .cancel(staff.hospital_id, ticket_id, request.reason)
        .await?;
    Ok(Json(ticket))
}

pub async fn transfer_ticket(
    State(state): State<AppState>,
    staff: StaffContext,
    Path(ticket_id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<TransferTicketRequest>,
) -> Result<impl IntoResponse> {
    let ticket = state
        .dispatch
        .transfer(staff.hospital_id, ticket_id, request.counter_id)
        .await?;
    Ok(Json(ticket))
}

pub async fn recall_ticket(
    State(state): State<AppState>,
    staff: StaffContext,
    Path(ticket_id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let (ticket, announcement) = state.dispatch.recall(staff.hospital_id, ticket_id).await?;
    Ok(Json(json!({
        "ticket": ticket,
        "announcement": announcement,
    })))
}

pub async fn queue_status(
    State(state): State<AppState>,
    staff: StaffContext,
    Query(params): Query<ServiceTypeParams>,
) -> Result<impl IntoResponse> {
    let summary = state
        .status
        .summary(staff.hospital_id, params.service_type.as_deref())
        .await?;
    Ok(Json(summary))
}

pub async fn ticket_status(
    State(state): State<AppState>,
    staff: StaffContext,
    Query(params): Query<TicketLookupParams>,
) -> Result<impl IntoResponse> {
    let view = state.status.lookup(staff.hospital_id, &params).await?;
    Ok(Json(view))
}

pub async fn public_ticket_status(
    State(state): State<AppState>,
    Path(hospital_id): Path<Uuid>,
    Query(params): Query<TicketLookupParams>,
) -> Result<impl IntoResponse> {
    let view = state.status.lookup(hospital_id, &params).await?;
    Ok(Json(view))
}
