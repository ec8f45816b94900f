//! Dispatch state machine over HTTP
//!
//! Tests cover:
//! - Call-next ordering by priority score, then issue time
//! - Counter eligibility and bindings
//! - Service time measurement and the completion fallback
//! - Terminal states rejecting further transitions
//! - Concurrent call-next never handing one ticket to two counters
//! - Transfer, recall, no-show and cancel
//! - Position renumbering and threshold notifications

#![allow(unused)]
mod support;

use axum::http::{Method, StatusCode};
use medqueue::db::QueueStore;
use medqueue::services::CallNextOutcome;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::time::Duration;
use support::{
    assert_error_code, assert_status, assert_ticket_status, constants, int_field, str_field,
    with_test_app, with_test_app_with_config, TestApp,
};

fn called_token(outcome: &Value) -> Option<&str> {
    outcome["called"]["tokenDisplay"].as_str()
}

async fn counter_by_id(app: &TestApp, counter_id: &str) -> anyhow::Result<Value> {
    let (status, counters) = app.json(Method::GET, "/api/queue/counters", None).await?;
    assert_status(status, StatusCode::OK, "list counters");
    counters
        .as_array()
        .and_then(|all| all.iter().find(|c| c["id"] == counter_id))
        .cloned()
        .ok_or_else(|| anyhow::anyhow!("counter {counter_id} not listed"))
}

#[tokio::test]
async fn emergency_is_called_before_earlier_walk_ins() -> anyhow::Result<()> {
    with_test_app(|app| {
        Box::pin(async move {
            let counter = app.create_counter(1, &[]).await?;
            let counter_id = str_field(&counter, "id")?;

            app.issue(constants::CONSULTATION, None).await?;
            app.advance(1);
            app.issue(constants::CONSULTATION, None).await?;
            app.advance(1);
            app.issue(constants::CONSULTATION, Some("EMERGENCY")).await?;

            let first = app.call_next(counter_id).await?;
            assert_eq!(called_token(&first), Some("C-003"));
            assert!(first["completed"].is_null());
            assert_eq!(first["counter"]["currentTicketId"], first["called"]["id"]);

            // Equal scores go first come, first served
            let second = app.call_next(counter_id).await?;
            assert_eq!(called_token(&second), Some("C-001"));
            assert_eq!(second["completed"]["tokenDisplay"], "C-003");
            assert_eq!(second["completed"]["status"], "COMPLETED");

            let third = app.call_next(counter_id).await?;
            assert_eq!(called_token(&third), Some("C-002"));

            let idle = app.call_next(counter_id).await?;
            assert!(idle["called"].is_null());
            assert_eq!(idle["completed"]["tokenDisplay"], "C-002");
            assert!(idle["counter"]["currentTicketId"].is_null());
            Ok(())
        })
    })
    .await
}

#[tokio::test]
async fn call_next_creates_an_announcement() -> anyhow::Result<()> {
    with_test_app(|app| {
        Box::pin(async move {
            let counter = app.create_counter(4, &[constants::PHARMACY]).await?;
            app.issue(constants::PHARMACY, None).await?;

            let outcome = app.call_next(str_field(&counter, "id")?).await?;
            let announcement = &outcome["announcement"];
            assert_eq!(announcement["ticketNumber"], "P-001");
            assert_eq!(announcement["counterName"], "Counter 4");
            assert_eq!(announcement["status"], "pending");
            assert_eq!(
                outcome["called"]["counterId"].as_str(),
                counter["id"].as_str()
            );
            assert_eq!(outcome["called"]["callCount"], 1);
            Ok(())
        })
    })
    .await
}

#[tokio::test]
async fn specialised_counters_only_call_their_services() -> anyhow::Result<()> {
    with_test_app(|app| {
        Box::pin(async move {
            let pharmacy = app.create_counter(1, &[constants::PHARMACY]).await?;
            app.issue(constants::LABORATORY, None).await?;

            let outcome = app.call_next(str_field(&pharmacy, "id")?).await?;
            assert!(outcome["called"].is_null());

            let general = app.create_counter(2, &[]).await?;
            let outcome = app.call_next(str_field(&general, "id")?).await?;
            assert_eq!(called_token(&outcome), Some("L-001"));
            Ok(())
        })
    })
    .await
}

#[tokio::test]
async fn inactive_or_unknown_counters_cannot_call() -> anyhow::Result<()> {
    with_test_app(|app| {
        Box::pin(async move {
            let counter = app.create_counter(1, &[]).await?;
            let counter_id = str_field(&counter, "id")?;
            app.issue(constants::CONSULTATION, None).await?;

            let (status, _) = app
                .json(
                    Method::PATCH,
                    &format!("/api/queue/counters/{counter_id}"),
                    Some(json!({ "isActive": false })),
                )
                .await?;
            assert_status(status, StatusCode::OK, "deactivate");

            let (status, body) = app
                .json(
                    Method::POST,
                    "/api/queue/call-next",
                    Some(json!({ "counterId": counter_id })),
                )
                .await?;
            assert_status(status, StatusCode::CONFLICT, "inactive counter");
            assert_error_code(&body, "invalid_state");

            let (status, _) = app
                .json(
                    Method::POST,
                    "/api/queue/call-next",
                    Some(json!({ "counterId": uuid::Uuid::new_v4() })),
                )
                .await?;
            assert_status(status, StatusCode::NOT_FOUND, "unknown counter");
            Ok(())
        })
    })
    .await
}

#[tokio::test]
async fn service_time_is_measured_from_start_of_service() -> anyhow::Result<()> {
    with_test_app(|app| {
        Box::pin(async move {
            let counter = app.create_counter(1, &[constants::CONSULTATION]).await?;
            let counter_id = str_field(&counter, "id")?;
            app.issue(constants::CONSULTATION, None).await?;

            app.advance(5);
            let outcome = app.call_next(counter_id).await?;
            let ticket_id = outcome["called"]["id"].as_str().unwrap().to_string();
            assert_eq!(outcome["called"]["actualWaitTime"], 5);

            app.advance(2);
            let (status, serving) = app
                .ticket_action(&ticket_id, "start-serving", None)
                .await?;
            assert_status(status, StatusCode::OK, "start serving");
            assert_ticket_status(&serving, "SERVING")?;

            app.advance(13);
            let (status, done) = app.ticket_action(&ticket_id, "complete", None).await?;
            assert_status(status, StatusCode::OK, "complete");
            assert_ticket_status(&done, "COMPLETED")?;
            assert_eq!(int_field(&done, "serviceTime")?, 13);

            let counter = counter_by_id(app, counter_id).await?;
            assert!(counter["currentTicketId"].is_null());

            // The completed ticket now drives the rolling average
            let next = app.issue(constants::CONSULTATION, None).await?;
            assert_eq!(int_field(&next, "estimatedWaitTime")?, 13);
            Ok(())
        })
    })
    .await
}

#[tokio::test]
async fn completing_without_service_uses_the_fallback() -> anyhow::Result<()> {
    with_test_app(|app| {
        Box::pin(async move {
            let counter = app.create_counter(1, &[]).await?;
            app.issue(constants::BILLING, None).await?;
            let outcome = app.call_next(str_field(&counter, "id")?).await?;
            let ticket_id = outcome["called"]["id"].as_str().unwrap().to_string();

            app.advance(30);
            let (status, done) = app.ticket_action(&ticket_id, "complete", None).await?;
            assert_status(status, StatusCode::OK, "complete");
            assert_eq!(int_field(&done, "serviceTime")?, 10);
            Ok(())
        })
    })
    .await
}

#[tokio::test]
async fn terminal_tickets_reject_further_transitions() -> anyhow::Result<()> {
    with_test_app(|app| {
        Box::pin(async move {
            let counter = app.create_counter(1, &[]).await?;
            let counter_id = str_field(&counter, "id")?.to_string();
            let served = app.issue(constants::CONSULTATION, None).await?;
            let skipped = app.issue(constants::CONSULTATION, None).await?;
            let left = app.issue(constants::CONSULTATION, None).await?;

            // Only tickets at a counter can be completed
            let (status, body) = app
                .ticket_action(str_field(&skipped, "id")?, "complete", None)
                .await?;
            assert_status(status, StatusCode::CONFLICT, "complete waiting");
            assert_error_code(&body, "invalid_state");

            let outcome = app.call_next(&counter_id).await?;
            assert_eq!(outcome["called"]["id"], served["id"]);
            let (status, _) = app
                .ticket_action(str_field(&served, "id")?, "complete", None)
                .await?;
            assert_status(status, StatusCode::OK, "complete");
            let (status, _) = app
                .ticket_action(str_field(&skipped, "id")?, "no-show", None)
                .await?;
            assert_status(status, StatusCode::OK, "no-show");
            let (status, _) = app
                .ticket_action(str_field(&left, "id")?, "cancel", None)
                .await?;
            assert_status(status, StatusCode::OK, "cancel");

            for (ticket, terminal) in [
                (&served, "COMPLETED"),
                (&skipped, "NO_SHOW"),
                (&left, "CANCELLED"),
            ] {
                let ticket_id = str_field(ticket, "id")?;
                let ticket_uuid = uuid::Uuid::parse_str(ticket_id)?;
                let before = app
                    .state
                    .store
                    .get_ticket(app.hospital_id, ticket_uuid)
                    .await?
                    .expect("ticket exists");
                assert_eq!(before.status.as_str(), terminal);
                app.advance(5);

                let transfer = json!({ "counterId": counter_id });
                for (action, body) in [
                    ("complete", None),
                    ("cancel", Some(json!({ "reason": "again" }))),
                    ("no-show", None),
                    ("start-serving", None),
                    ("recall", None),
                    ("transfer", Some(transfer)),
                ] {
                    let (status, body) = app.ticket_action(ticket_id, action, body).await?;
                    assert_status(status, StatusCode::CONFLICT, &format!("{action} on {terminal}"));
                    assert_error_code(&body, "invalid_state");
                }

                let after = app
                    .state
                    .store
                    .get_ticket(app.hospital_id, ticket_uuid)
                    .await?
                    .expect("ticket exists");
                assert_eq!(after, before, "{terminal} ticket changed after rejected calls");
            }

            let idle = app
                .state
                .store
                .get_counter(app.hospital_id, uuid::Uuid::parse_str(&counter_id)?)
                .await?
                .expect("counter exists");
            assert_eq!(idle.current_ticket_id, None);

            let (status, _) = app
                .ticket_action(&uuid::Uuid::new_v4().to_string(), "complete", None)
                .await?;
            assert_status(status, StatusCode::NOT_FOUND, "unknown ticket");
            Ok(())
        })
    })
    .await
}

#[tokio::test]
async fn cancel_accepts_an_optional_reason() -> anyhow::Result<()> {
    with_test_app(|app| {
        Box::pin(async move {
            let first = app.issue(constants::PHARMACY, None).await?;
            let second = app.issue(constants::PHARMACY, None).await?;

            let (status, cancelled) = app
                .ticket_action(
                    str_field(&first, "id")?,
                    "cancel",
                    Some(json!({ "reason": "left the building" })),
                )
                .await?;
            assert_status(status, StatusCode::OK, "cancel with reason");
            assert_ticket_status(&cancelled, "CANCELLED")?;
            assert_eq!(str_field(&cancelled, "cancelReason")?, "left the building");
            assert_eq!(int_field(&cancelled, "queuePosition")?, 0);

            let (status, cancelled) = app
                .ticket_action(str_field(&second, "id")?, "cancel", None)
                .await?;
            assert_status(status, StatusCode::OK, "cancel without body");
            assert!(cancelled["cancelReason"].is_null());
            Ok(())
        })
    })
    .await
}

#[tokio::test]
async fn no_show_renumbers_the_queue() -> anyhow::Result<()> {
    with_test_app(|app| {
        Box::pin(async move {
            let first = app.issue(constants::CONSULTATION, None).await?;
            app.issue(constants::CONSULTATION, None).await?;
            let third = app.issue(constants::CONSULTATION, None).await?;
            let third_id = str_field(&third, "id")?;

            let (status, gone) = app
                .ticket_action(str_field(&first, "id")?, "no-show", None)
                .await?;
            assert_status(status, StatusCode::OK, "no-show");
            assert_ticket_status(&gone, "NO_SHOW")?;

            let (status, view) = app
                .json(
                    Method::GET,
                    &format!("/api/queue/tickets/status?ticketId={third_id}"),
                    None,
                )
                .await?;
            assert_status(status, StatusCode::OK, "lookup");
            assert_eq!(int_field(&view, "position")?, 2);
            assert_eq!(int_field(&view, "peopleAhead")?, 1);
            assert_eq!(view["ticket"]["queuePosition"], 2);
            Ok(())
        })
    })
    .await
}

#[tokio::test]
async fn transferred_tickets_are_reserved_for_the_new_counter() -> anyhow::Result<()> {
    with_test_app(|app| {
        Box::pin(async move {
            let desk = app.create_counter(1, &[]).await?;
            let desk_id = str_field(&desk, "id")?;
            let specialist = app.create_counter(2, &["cardiology"]).await?;
            let specialist_id = str_field(&specialist, "id")?;

            app.issue(constants::CONSULTATION, None).await?;
            let outcome = app.call_next(desk_id).await?;
            let ticket_id = outcome["called"]["id"].as_str().unwrap().to_string();

            let (status, moved) = app
                .ticket_action(
                    &ticket_id,
                    "transfer",
                    Some(json!({ "counterId": specialist_id })),
                )
                .await?;
            assert_status(status, StatusCode::OK, "transfer");
            assert_ticket_status(&moved, "TRANSFERRED")?;
            assert_eq!(str_field(&moved, "counterId")?, specialist_id);

            let desk = counter_by_id(app, desk_id).await?;
            assert!(desk["currentTicketId"].is_null());

            // The old counter no longer sees it
            let outcome = app.call_next(desk_id).await?;
            assert!(outcome["called"].is_null());

            let outcome = app.call_next(specialist_id).await?;
            assert_eq!(outcome["called"]["id"].as_str(), Some(ticket_id.as_str()));
            assert_eq!(outcome["called"]["callCount"], 2);
            Ok(())
        })
    })
    .await
}

#[tokio::test]
async fn waiting_tickets_keep_their_status_on_transfer() -> anyhow::Result<()> {
    with_test_app(|app| {
        Box::pin(async move {
            let target = app.create_counter(3, &[constants::LABORATORY]).await?;
            let ticket = app.issue(constants::CONSULTATION, None).await?;

            let (status, moved) = app
                .ticket_action(
                    str_field(&ticket, "id")?,
                    "transfer",
                    Some(json!({ "counterId": target["id"] })),
                )
                .await?;
            assert_status(status, StatusCode::OK, "transfer waiting");
            assert_ticket_status(&moved, "WAITING")?;
            assert_eq!(moved["counterId"], target["id"]);

            let (status, _) = app
                .ticket_action(
                    str_field(&ticket, "id")?,
                    "transfer",
                    Some(json!({ "counterId": uuid::Uuid::new_v4() })),
                )
                .await?;
            assert_status(status, StatusCode::NOT_FOUND, "unknown target");
            Ok(())
        })
    })
    .await
}

#[tokio::test]
async fn recall_announces_a_called_ticket_again() -> anyhow::Result<()> {
    with_test_app(|app| {
        Box::pin(async move {
            let counter = app.create_counter(1, &[]).await?;
            let waiting = app.issue(constants::VACCINATION, None).await?;
            let outcome = app.call_next(str_field(&counter, "id")?).await?;
            let ticket_id = outcome["called"]["id"].as_str().unwrap().to_string();

            app.advance(2);
            let (status, recalled) = app.ticket_action(&ticket_id, "recall", None).await?;
            assert_status(status, StatusCode::OK, "recall");
            assert_eq!(recalled["ticket"]["callCount"], 2);
            assert_eq!(recalled["ticket"]["status"], "CALLED");
            assert_eq!(recalled["announcement"]["ticketNumber"], "V-001");

            let (status, pending) = app
                .json(Method::GET, "/api/queue/announcements/pending", None)
                .await?;
            assert_status(status, StatusCode::OK, "pending announcements");
            assert_eq!(pending.as_array().map(Vec::len), Some(2));
            Ok(())
        })
    })
    .await
}

#[tokio::test]
async fn moving_within_the_threshold_notifies_the_patient() -> anyhow::Result<()> {
    with_test_app(|app| {
        Box::pin(async move {
            let counter = app.create_counter(1, &[]).await?;
            for _ in 0..5 {
                app.issue(constants::CONSULTATION, None).await?;
                app.advance(1);
            }

            app.call_next(str_field(&counter, "id")?).await?;

            // Delivery happens on a background task
            let mut notices = Vec::new();
            for _ in 0..50 {
                notices = app.notifier.notices();
                if !notices.is_empty() {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }

            assert_eq!(notices.len(), 1, "only the fourth ticket crossed into range");
            assert_eq!(notices[0].token_display, "C-004");
            assert_eq!(notices[0].position, 3);
            assert_eq!(notices[0].hospital_id, app.hospital_id);
            Ok(())
        })
    })
    .await
}

#[tokio::test]
async fn notification_threshold_is_configurable() -> anyhow::Result<()> {
    with_test_app_with_config(
        |config| config.queue.notify_position_threshold = 1,
        |app| {
            Box::pin(async move {
                let counter = app.create_counter(1, &[]).await?;
                let first = app.issue(constants::PHARMACY, None).await?;
                app.issue(constants::PHARMACY, None).await?;
                app.issue(constants::PHARMACY, None).await?;

                app.call_next(str_field(&counter, "id")?).await?;

                let mut notices = Vec::new();
                for _ in 0..50 {
                    notices = app.notifier.notices();
                    if !notices.is_empty() {
                        break;
                    }
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
                assert_eq!(notices.len(), 1);
                assert_eq!(notices[0].token_display, "P-002");
                assert_eq!(notices[0].position, 1);
                Ok(())
            })
        },
    )
    .await
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_counters_never_share_a_ticket() -> anyhow::Result<()> {
    const COUNTERS: i32 = 4;
    const TICKETS: usize = 24;

    let app = TestApp::new().await?;
    let mut issued = HashSet::new();
    for _ in 0..TICKETS {
        let ticket = app.issue(constants::CONSULTATION, None).await?;
        issued.insert(str_field(&ticket, "id")?.to_string());
    }
    let mut counter_ids = Vec::new();
    for number in 1..=COUNTERS {
        let counter = app.create_counter(number, &[]).await?;
        counter_ids.push(uuid::Uuid::parse_str(str_field(&counter, "id")?)?);
    }

    let mut handles = Vec::new();
    for counter_id in counter_ids {
        let dispatch = app.state.dispatch.clone();
        let hospital_id = app.hospital_id;
        handles.push(tokio::spawn(async move {
            let mut claimed = Vec::new();
            loop {
                let CallNextOutcome { called, .. } =
                    dispatch.call_next(hospital_id, counter_id, None).await?;
                match called {
                    Some(ticket) => {
                        assert_eq!(ticket.counter_id, Some(counter_id));
                        claimed.push(ticket.id.to_string());
                    }
                    None => return anyhow::Ok(claimed),
                }
            }
        }));
    }

    let mut seen = HashSet::new();
    for handle in handles {
        for ticket_id in handle.await?? {
            assert!(seen.insert(ticket_id.clone()), "{ticket_id} was called twice");
        }
    }
    assert_eq!(seen, issued);
    Ok(())
}
