//! Counter administration handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use uuid::Uuid;

use crate::api::extractors::{StaffContext, ValidatedJson};
use crate::models::{CreateCounterRequest, UpdateCounterRequest};
use crate::state::AppState;
use crate::Result;

pub async fn create_counter(
    State(state): State<AppState>,
    staff: StaffContext,
    ValidatedJson(request): ValidatedJson<CreateCounterRequest>,
) -> Result<impl IntoResponse> {
    let counter = state.counters.create(staff.hospital_id, request).await?;
    Ok((StatusCode::CREATED, Json(counter)))
}

pub async fn list_counters(
    State(state): State<AppState>,
    staff: StaffContext,
) -> Result<impl IntoResponse> {
    Ok(Json(state.counters.list(staff.hospital_id).await?))
}

pub async fn update_counter(
    State(state): State<AppState>,
    staff: StaffContext,
    Path(counter_id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<UpdateCounterRequest>,
) -> Result<impl IntoResponse> {
    let counter = state
        .counters
        .update(staff.hospital_id, counter_id, request)
        .await?;
    Ok(Json(counter))
}
