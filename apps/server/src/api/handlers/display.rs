//! Display boards, announcements and public read models

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use uuid::Uuid;

use crate::api::extractors::{StaffContext, ValidatedJson};
use crate::models::{AnnouncementParams, CreateDisplayBoardRequest, DisplayParams};
use crate::state::AppState;
use crate::Result;

pub async fn display(
    State(state): State<AppState>,
    staff: StaffContext,
    Query(params): Query<DisplayParams>,
) -> Result<impl IntoResponse> {
    Ok(Json(state.display.snapshot(staff.hospital_id, &params).await?))
}

pub async fn public_display(
    State(state): State<AppState>,
    Path(hospital_id): Path<Uuid>,
    Query(params): Query<DisplayParams>,
) -> Result<impl IntoResponse> {
    Ok(Json(state.display.snapshot(hospital_id, &params).await?))
}

pub async fn create_display_board(
    State(state): State<AppState>,
    staff: StaffContext,
    ValidatedJson(request): ValidatedJson<CreateDisplayBoardRequest>,
) -> Result<impl IntoResponse> {
    let board = state.display.create_board(staff.hospital_id, request).await?;
    Ok((StatusCode::CREATED, Json(board)))
}

pub async fn list_display_boards(
    State(state): State<AppState>,
    staff: StaffContext,
) -> Result<impl IntoResponse> {
    Ok(Json(state.display.list_boards(staff.hospital_id).await?))
}

pub async fn pending_announcements(
    State(state): State<AppState>,
    staff: StaffContext,
    Query(params): Query<AnnouncementParams>,
) -> Result<impl IntoResponse> {
    let pending = state
        .display
        .pending_announcements(staff.hospital_id, params.limit)
        .await?;
    Ok(Json(pending))
}

pub async fn public_announcements(
    State(state): State<AppState>,
    Path(hospital_id): Path<Uuid>,
    Query(params): Query<AnnouncementParams>,
) -> Result<impl IntoResponse> {
    let pending = state
        .display
        .pending_announcements(hospital_id, params.limit)
        .await?;
    Ok(Json(pending))
}

pub async fn mark_announcement_played(
    State(state): State<AppState>,
    staff: StaffContext,
    Path(announcement_id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let announcement = state
        .display
        .mark_played(staff.hospital_id, announcement_id)
        .await?;
    Ok(Json(announcement))
}
