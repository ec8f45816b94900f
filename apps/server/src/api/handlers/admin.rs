//! Queue configuration and analytics handlers

use axum::{
    extract::{Query, State},
    response::{IntoResponse, Response},
    Json,
};
use medqueue_core::normalize_service_type;

use crate::api::extractors::{StaffContext, ValidatedJson};
use crate::models::{AnalyticsParams, AnalyticsQuery, QueueConfigRequest, ServiceTypeParams};
use crate::state::AppState;
use crate::Result;

/// With `serviceType`, the effective configuration of that service type; otherwise
/// every stored configuration of the hospital.
pub async fn get_queue_config(
    State(state): State<AppState>,
    staff: StaffContext,
    Query(params): Query<ServiceTypeParams>,
) -> Result<Response> {
    match params.service_type.as_deref() {
        Some(raw) => {
            let service_type = normalize_service_type(raw)?;
            let config = state
                .queue_configs
                .effective(staff.hospital_id, &service_type)
                .await?;
            Ok(Json(config).into_response())
        }
        None => Ok(Json(state.queue_configs.list(staff.hospital_id).await?).into_response()),
    }
}

pub async fn put_queue_config(
    State(state): State<AppState>,
    staff: StaffContext,
    ValidatedJson(request): ValidatedJson<QueueConfigRequest>,
) -> Result<impl IntoResponse> {
    let config = state
        .queue_configs
        .put(staff.hospital_id, staff.staff_id, request)
        .await?;
    Ok(Json(config))
}

pub async fn analytics(
    State(state): State<AppState>,
    staff: StaffContext,
    Query(params): Query<AnalyticsParams>,
) -> Result<impl IntoResponse> {
    let query = AnalyticsQuery {
        hospital_id: staff.hospital_id,
        date: params.date,
        service_type: params
            .service_type
            .as_deref()
            .map(normalize_service_type)
            .transpose()?,
        department_id: params.department_id,
    };
    Ok(Json(state.analytics.query(&query).await?))
}
