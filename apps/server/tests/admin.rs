//! Counter and configuration administration, analytics, health and metrics

#![allow(unused)]
mod support;

use axum::http::{Method, StatusCode};
use serde_json::json;
use support::{
    assert_client_error, assert_error_code, assert_status, constants, int_field, str_field,
    with_test_app,
};

#[tokio::test]
async fn counters_are_created_listed_and_updated() -> anyhow::Result<()> {
    with_test_app(|app| {
        Box::pin(async move {
            let (status, counter) = app
                .json(
                    Method::POST,
                    "/api/queue/counters",
                    Some(json!({
                        "counterNumber": 3,
                        "counterName": "  Lab desk ",
                        "counterType": "laboratory",
                        "servicesOffered": ["Blood Test", "blood-test"],
                    })),
                )
                .await?;
            assert_status(status, StatusCode::CREATED, "create counter");
            assert_eq!(str_field(&counter, "counterName")?, "Lab desk");
            assert_eq!(str_field(&counter, "counterType")?, "LABORATORY");
            assert_eq!(counter["servicesOffered"], json!(["blood_test"]));
            assert_eq!(counter["isActive"], true);

            let (status, body) = app
                .json(
                    Method::POST,
                    "/api/queue/counters",
                    Some(json!({ "counterNumber": 3, "counterName": "Duplicate" })),
                )
                .await?;
            assert_status(status, StatusCode::CONFLICT, "duplicate number");
            assert_error_code(&body, "already_exists");

            let counter_id = str_field(&counter, "id")?;
            let (status, updated) = app
                .json(
                    Method::PATCH,
                    &format!("/api/queue/counters/{counter_id}"),
                    Some(json!({ "counterName": "Phlebotomy" })),
                )
                .await?;
            assert_status(status, StatusCode::OK, "rename");
            assert_eq!(str_field(&updated, "counterName")?, "Phlebotomy");
            assert_eq!(str_field(&updated, "counterType")?, "LABORATORY");

            let (status, all) = app.json(Method::GET, "/api/queue/counters", None).await?;
            assert_status(status, StatusCode::OK, "list");
            assert_eq!(all.as_array().map(Vec::len), Some(1));

            let (status, _) = app
                .json(
                    Method::PATCH,
                    &format!("/api/queue/counters/{}", uuid::Uuid::new_v4()),
                    Some(json!({ "isActive": false })),
                )
                .await?;
            assert_status(status, StatusCode::NOT_FOUND, "unknown counter");
            Ok(())
        })
    })
    .await
}

#[tokio::test]
async fn busy_counters_cannot_be_deactivated() -> anyhow::Result<()> {
    with_test_app(|app| {
        Box::pin(async move {
            let counter = app.create_counter(1, &[]).await?;
            let counter_id = str_field(&counter, "id")?;
            app.issue(constants::CONSULTATION, None).await?;
            let outcome = app.call_next(counter_id).await?;

            let (status, body) = app
                .json(
                    Method::PATCH,
                    &format!("/api/queue/counters/{counter_id}"),
                    Some(json!({ "isActive": false })),
                )
                .await?;
            assert_status(status, StatusCode::CONFLICT, "deactivate busy");
            assert_error_code(&body, "invalid_state");

            let ticket_id = str_field(&outcome["called"], "id")?;
            app.ticket_action(ticket_id, "complete", None).await?;

            let (status, updated) = app
                .json(
                    Method::PATCH,
                    &format!("/api/queue/counters/{counter_id}"),
                    Some(json!({ "isActive": false })),
                )
                .await?;
            assert_status(status, StatusCode::OK, "deactivate idle");
            assert_eq!(updated["isActive"], false);
            Ok(())
        })
    })
    .await
}

#[tokio::test]
async fn queue_config_defaults_and_overrides() -> anyhow::Result<()> {
    with_test_app(|app| {
        Box::pin(async move {
            let (status, defaults) = app
                .json(Method::GET, "/api/queue/config?serviceType=Radiology", None)
                .await?;
            assert_status(status, StatusCode::OK, "effective defaults");
            assert_eq!(str_field(&defaults, "prefix")?, "X");
            assert_eq!(defaults["priorityEnabled"], true);
            assert_eq!(int_field(&defaults, "numberPadding")?, 3);
            assert!(defaults["updatedAt"].is_null());

            let (_, stored) = app.json(Method::GET, "/api/queue/config", None).await?;
            assert_eq!(stored.as_array().map(Vec::len), Some(0));

            let (status, updated) = app
                .json(
                    Method::PUT,
                    "/api/queue/config",
                    Some(json!({ "serviceType": "radiology", "maxWaitTime": 90 })),
                )
                .await?;
            assert_status(status, StatusCode::OK, "put config");
            assert_eq!(int_field(&updated, "maxWaitTime")?, 90);
            assert_eq!(str_field(&updated, "prefix")?, "X");
            assert_eq!(str_field(&updated, "updatedBy")?, app.staff_id.to_string());

            // Partial update keeps earlier values
            let (_, updated) = app
                .json(
                    Method::PUT,
                    "/api/queue/config",
                    Some(json!({ "serviceType": "radiology", "alertWaitTime": 20 })),
                )
                .await?;
            assert_eq!(int_field(&updated, "maxWaitTime")?, 90);
            assert_eq!(int_field(&updated, "alertWaitTime")?, 20);

            let (_, stored) = app.json(Method::GET, "/api/queue/config", None).await?;
            assert_eq!(stored.as_array().map(Vec::len), Some(1));

            let (status, _) = app
                .json(
                    Method::PUT,
                    "/api/queue/config",
                    Some(json!({ "serviceType": "radiology", "prefix": "X-1" })),
                )
                .await?;
            assert_client_error(status, "bad prefix");
            Ok(())
        })
    })
    .await
}

#[tokio::test]
async fn analytics_aggregate_by_hour() -> anyhow::Result<()> {
    with_test_app(|app| {
        Box::pin(async move {
            let counter = app.create_counter(1, &[]).await?;
            let counter_id = str_field(&counter, "id")?;
            app.issue(constants::CONSULTATION, None).await?;
            app.issue(constants::CONSULTATION, None).await?;
            let cancelled = app.issue(constants::CONSULTATION, None).await?;
            app.issue(constants::PHARMACY, None).await?;

            app.advance(6);
            let outcome = app.call_next(counter_id).await?;
            let ticket_id = str_field(&outcome["called"], "id")?.to_string();
            app.ticket_action(&ticket_id, "start-serving", None).await?;
            app.advance(4);
            app.ticket_action(&ticket_id, "complete", None).await?;
            app.ticket_action(str_field(&cancelled, "id")?, "cancel", None)
                .await?;

            let (status, buckets) = app
                .json(
                    Method::GET,
                    "/api/queue/analytics?date=2024-03-04&serviceType=consultation",
                    None,
                )
                .await?;
            assert_status(status, StatusCode::OK, "analytics");
            let buckets = buckets.as_array().unwrap();
            assert_eq!(buckets.len(), 1);
            let bucket = &buckets[0];
            assert_eq!(bucket["hour"], 8);
            assert_eq!(bucket["date"], "2024-03-04");
            assert_eq!(bucket["totalIssued"], 3);
            assert_eq!(bucket["totalServed"], 1);
            assert_eq!(bucket["totalCancelled"], 1);
            assert_eq!(bucket["waitTime"]["max"], 6);
            assert_eq!(bucket["serviceTime"]["avg"], 4.0);

            let (_, everything) = app
                .json(Method::GET, "/api/queue/analytics?date=2024-03-04", None)
                .await?;
            assert_eq!(everything.as_array().map(Vec::len), Some(2));

            let (_, other_day) = app
                .json(Method::GET, "/api/queue/analytics?date=2024-03-05", None)
                .await?;
            assert_eq!(other_day.as_array().map(Vec::len), Some(0));
            Ok(())
        })
    })
    .await
}

#[tokio::test]
async fn health_and_metrics_endpoints() -> anyhow::Result<()> {
    with_test_app(|app| {
        Box::pin(async move {
            let (status, _, body) = app.anonymous_request(Method::GET, "/health").await?;
            assert_status(status, StatusCode::OK, "health");
            let health: serde_json::Value = serde_json::from_slice(&body)?;
            assert_eq!(health["status"], "ok");

            app.issue(constants::CONSULTATION, None).await?;

            let (status, headers, body) = app.anonymous_request(Method::GET, "/metrics").await?;
            assert_status(status, StatusCode::OK, "metrics");
            let text = String::from_utf8_lossy(&body);
            assert!(text.contains("medqueue_tickets_issued_total"));
            assert!(text.contains("medqueue_http_requests_total"));

            let (_, headers, _) = app.anonymous_request(Method::GET, "/health").await?;
            assert!(headers.contains_key("x-request-id"));
            Ok(())
        })
    })
    .await
}
