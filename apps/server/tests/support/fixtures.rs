use axum::body::Bytes;
use serde_json::{json, Value};

pub fn to_json_body(value: &Value) -> anyhow::Result<Bytes> {
    Ok(Bytes::from(serde_json::to_vec(value)?))
}

/// Common test constants
pub mod constants {
    pub const CONSULTATION: &str = "consultation";
    pub const PHARMACY: &str = "pharmacy";
    pub const LABORATORY: &str = "laboratory";
    pub const REGISTRATION: &str = "registration";
    pub const BILLING: &str = "billing";
    pub const VACCINATION: &str = "vaccination";
    pub const PATIENT_PHONE: &str = "+15550100";
}

/// Walk-in with patient details, as the front desk would issue it
pub fn walk_in(service_type: &str, priority: &str, phone: &str) -> Value {
    json!({
        "serviceType": service_type,
        "priority": priority,
        "patientName": "Test Patient",
        "patientPhone": phone,
    })
}

pub fn queue_config(service_type: &str) -> Value {
    json!({ "serviceType": service_type })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_walk_in() {
        let body = walk_in(constants::PHARMACY, "CHILD", constants::PATIENT_PHONE);
        assert_eq!(body["serviceType"], "pharmacy");
        assert_eq!(body["priority"], "CHILD");
    }
}
