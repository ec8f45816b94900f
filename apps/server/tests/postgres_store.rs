//! End-to-end flows against PostgreSQL
//!
//! Skipped unless `MEDQUEUE_TEST_DATABASE_URL` points at a database the tests may
//! migrate. Every run uses a fresh hospital id, so runs do not interfere.

#![allow(unused)]
mod support;

use axum::http::{Method, StatusCode};
use medqueue::models::IssueTicketRequest;
use serde_json::json;
use std::collections::BTreeSet;
use support::{assert_status, assert_ticket_status, constants, int_field, str_field, TestApp};

#[tokio::test]
async fn issue_call_and_complete() -> anyhow::Result<()> {
    let Some(app) = TestApp::postgres().await? else {
        eprintln!("skipping: {} not set", support::shared::TEST_DATABASE_ENV);
        return Ok(());
    };

    let counter = app.create_counter(1, &[constants::CONSULTATION]).await?;
    let counter_id = str_field(&counter, "id")?;

    app.issue(constants::CONSULTATION, None).await?;
    app.advance(1);
    let emergency = app.issue(constants::CONSULTATION, Some("EMERGENCY")).await?;
    assert_eq!(str_field(&emergency, "tokenDisplay")?, "C-002");

    let outcome = app.call_next(counter_id).await?;
    assert_eq!(outcome["called"]["id"], emergency["id"]);
    assert_eq!(outcome["counter"]["currentTicketId"], emergency["id"]);

    let ticket_id = str_field(&emergency, "id")?;
    app.ticket_action(ticket_id, "start-serving", None).await?;
    app.advance(7);
    let (status, done) = app.ticket_action(ticket_id, "complete", None).await?;
    assert_status(status, StatusCode::OK, "complete");
    assert_ticket_status(&done, "COMPLETED")?;
    assert_eq!(int_field(&done, "serviceTime")?, 7);

    let (status, again) = app.ticket_action(ticket_id, "complete", None).await?;
    assert_status(status, StatusCode::CONFLICT, "complete twice");

    let (status, buckets) = app
        .json(Method::GET, "/api/queue/analytics?date=2024-03-04", None)
        .await?;
    assert_status(status, StatusCode::OK, "analytics");
    assert_eq!(buckets[0]["totalIssued"], 2);
    assert_eq!(buckets[0]["totalServed"], 1);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_issuance_is_serialised_by_the_database() -> anyhow::Result<()> {
    let Some(app) = TestApp::postgres().await? else {
        eprintln!("skipping: {} not set", support::shared::TEST_DATABASE_ENV);
        return Ok(());
    };

    let mut handles = Vec::new();
    for _ in 0..16 {
        let issuance = app.state.issuance.clone();
        let hospital_id = app.hospital_id;
        handles.push(tokio::spawn(async move {
            let request: IssueTicketRequest =
                serde_json::from_value(json!({ "serviceType": constants::PHARMACY }))?;
            let ticket = issuance.issue(hospital_id, None, request).await?;
            anyhow::Ok((ticket.ticket_number, ticket.queue_position))
        }));
    }

    let mut numbers = BTreeSet::new();
    let mut positions = BTreeSet::new();
    for handle in handles {
        let (number, position) = handle.await??;
        numbers.insert(number);
        positions.insert(position);
    }
    assert_eq!(numbers, (1..=16).collect::<BTreeSet<i32>>());
    assert_eq!(positions, (1..=16).collect::<BTreeSet<i32>>());
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_call_next_never_double_dispatches() -> anyhow::Result<()> {
    let Some(app) = TestApp::postgres().await? else {
        eprintln!("skipping: {} not set", support::shared::TEST_DATABASE_ENV);
        return Ok(());
    };

    let mut counters = Vec::new();
    for number in 1..=4 {
        let counter = app.create_counter(number, &[]).await?;
        counters.push(uuid::Uuid::parse_str(str_field(&counter, "id")?)?);
    }
    for _ in 0..4 {
        app.issue(constants::LABORATORY, None).await?;
    }

    let mut handles = Vec::new();
    for counter_id in counters {
        let dispatch = app.state.dispatch.clone();
        let hospital_id = app.hospital_id;
        handles.push(tokio::spawn(async move {
            let outcome = dispatch.call_next(hospital_id, counter_id, None).await?;
            anyhow::Ok(outcome.called.map(|t| t.id))
        }));
    }

    let mut called = BTreeSet::new();
    for handle in handles {
        if let Some(id) = handle.await?? {
            assert!(called.insert(id), "ticket {id} dispatched twice");
        }
    }
    assert_eq!(called.len(), 4);
    Ok(())
}
