//! Request bodies and query strings accepted by the queue API

use chrono::NaiveDate;
use serde::Deserialize;
use uuid::Uuid;
use validator::{Validate, ValidationError};

fn validate_service_type(value: &str) -> Result<(), ValidationError> {
    medqueue_core::normalize_service_type(value)
        .map(|_| ())
        .map_err(|_| ValidationError::new("invalid_service_type"))
}

fn validate_services(values: &[String]) -> Result<(), ValidationError> {
    if values.len() > 32 {
        return Err(ValidationError::new("too_many_services"));
    }
    values.iter().try_for_each(|v| validate_service_type(v))
}

fn validate_prefix(value: &str) -> Result<(), ValidationError> {
    if value.chars().all(|c| c.is_ascii_alphanumeric()) {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_prefix"))
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct IssueTicketRequest {
    #[validate(length(min = 1, max = 64), custom(function = "validate_service_type"))]
    pub service_type: String,
    /// Category name; unknown names are accepted and scored as NORMAL.
    #[validate(length(max = 32))]
    pub priority: Option<String>,
    #[validate(length(max = 32))]
    pub urgency_level: Option<String>,
    pub patient_id: Option<Uuid>,
    pub appointment_id: Option<Uuid>,
    pub department_id: Option<Uuid>,
    #[validate(length(max = 200))]
    pub patient_name: Option<String>,
    #[validate(length(min = 3, max = 32))]
    pub patient_phone: Option<String>,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CallNextRequest {
    pub counter_id: Uuid,
    /// Defaults to the `x-staff-id` of the caller.
    pub staff_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CancelTicketRequest {
    #[validate(length(max = 500))]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct TransferTicketRequest {
    pub counter_id: Uuid,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateCounterRequest {
    #[validate(range(min = 1, max = 9999))]
    pub counter_number: i32,
    #[validate(length(min = 1, max = 100))]
    pub counter_name: String,
    #[validate(length(max = 64))]
    pub counter_type: Option<String>,
    #[serde(default)]
    #[validate(custom(function = "validate_services"))]
    pub services_offered: Vec<String>,
    pub department_id: Option<Uuid>,
    pub is_active: Option<bool>,
}

/// Partial update; absent fields keep their value.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCounterRequest {
    #[validate(length(min = 1, max = 100))]
    pub counter_name: Option<String>,
    #[validate(length(max = 64))]
    pub counter_type: Option<String>,
    #[validate(custom(function = "validate_services"))]
    pub services_offered: Option<Vec<String>>,
    pub department_id: Option<Uuid>,
    pub is_active: Option<bool>,
}

/// Upsert of one service type's queue configuration; absent fields keep their value.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct QueueConfigRequest {
    #[validate(length(min = 1, max = 64), custom(function = "validate_service_type"))]
    pub service_type: String,
    #[validate(length(min = 1, max = 5), custom(function = "validate_prefix"))]
    pub prefix: Option<String>,
    #[validate(range(min = 0.5, max = 480.0))]
    pub avg_service_time: Option<f64>,
    #[validate(range(min = 1, max = 1440))]
    pub max_wait_time: Option<i32>,
    pub priority_enabled: Option<bool>,
    #[validate(range(min = 1, max = 10000))]
    pub alert_queue_length: Option<i32>,
    #[validate(range(min = 1, max = 1440))]
    pub alert_wait_time: Option<i32>,
    #[validate(range(min = 1, max = 8))]
    pub number_padding: Option<i32>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateDisplayBoardRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[serde(default)]
    pub department_ids: Vec<Uuid>,
    #[serde(default)]
    pub counter_ids: Vec<Uuid>,
    #[validate(range(min = 1, max = 100))]
    pub tickets_to_show: Option<i32>,
    #[validate(length(max = 32))]
    pub theme: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceTypeParams {
    pub service_type: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayParams {
    pub board_id: Option<Uuid>,
    pub service_type: Option<String>,
    pub limit: Option<usize>,
}

/// Canonical form used to store and look up phone numbers: an optional leading
/// `+` followed by digits. Spaces and `-.()` separators are dropped; `None` when
/// no digits remain.
pub fn normalize_phone(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let mut phone = String::with_capacity(trimmed.len());
    if trimmed.starts_with('+') {
        phone.push('+');
    }
    phone.extend(trimmed.chars().filter(char::is_ascii_digit));
    (phone.len() > usize::from(phone.starts_with('+'))).then_some(phone)
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketLookupParams {
    pub ticket_id: Option<Uuid>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsParams {
    pub date: Option<NaiveDate>,
    pub service_type: Option<String>,
    pub department_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnouncementParams {
    pub limit: Option<i64>,
}
