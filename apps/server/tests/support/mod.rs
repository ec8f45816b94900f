pub mod assertions;
pub mod fixtures;
pub mod shared;

use anyhow::Context as _;
use async_trait::async_trait;
use axum::{
    body::{Body, Bytes},
    http::{HeaderMap, HeaderName, HeaderValue, Method, Request, StatusCode},
    Router,
};
use chrono::{DateTime, Duration, Utc};
use futures::FutureExt as _;
use medqueue::{
    api::create_router,
    services::{PositionNotice, QueueNotifier},
    state::{AppStateOptions, StoreKind},
    AppState, Config,
};
use medqueue_core::ManualClock;
use serde_json::Value;
use std::sync::{Arc, Mutex};
use tower::ServiceExt as _;
use uuid::Uuid;

// Re-export commonly used items
pub use assertions::*;
pub use fixtures::*;

/// Notifier that keeps every notice for inspection.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<PositionNotice>>,
}

impl RecordingNotifier {
    pub fn notices(&self) -> Vec<PositionNotice> {
        self.notices.lock().unwrap().clone()
    }
}

#[async_trait]
impl QueueNotifier for RecordingNotifier {
    async fn position_reached(&self, notice: PositionNotice) -> anyhow::Result<()> {
        self.notices.lock().unwrap().push(notice);
        Ok(())
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub clock: ManualClock,
    pub notifier: Arc<RecordingNotifier>,
    /// Hospital sent in `x-hospital-id` by the request helpers.
    pub hospital_id: Uuid,
    pub staff_id: Uuid,
}

impl TestApp {
    pub async fn new() -> anyhow::Result<Self> {
        Self::new_with_config(|_| {}).await
    }

    pub async fn new_with_config(configure: impl FnOnce(&mut Config)) -> anyhow::Result<Self> {
        let shared = shared::shared().await?;
        let mut config = shared.base_config.clone();
        configure(&mut config);
        Self::build(config, StoreKind::Memory).await
    }

    /// App backed by Postgres, or `None` when no test database is configured.
    pub async fn postgres() -> anyhow::Result<Option<Self>> {
        let Some(url) = shared::test_database_url() else {
            return Ok(None);
        };
        let shared = shared::shared().await?;
        let mut config = shared.base_config.clone();
        config.database.url = url;
        config.database.run_migrations = true;
        config.database.pool_min_size = 0;
        config.database.pool_max_size = 5;
        Self::build(config, StoreKind::Postgres).await.map(Some)
    }

    async fn build(config: Config, store: StoreKind) -> anyhow::Result<Self> {
        let clock = ManualClock::new(test_start());
        let notifier = Arc::new(RecordingNotifier::default());
        let state = AppState::with_options(
            config,
            AppStateOptions {
                store,
                clock: Some(Arc::new(clock.clone())),
                notifier: Some(notifier.clone()),
            },
        )
        .await
        .context("initialize AppState")?;

        let router = create_router(state.clone());

        Ok(Self {
            router,
            state,
            clock,
            notifier,
            // Fresh hospital per app keeps Postgres-backed tests isolated
            hospital_id: Uuid::new_v4(),
            staff_id: Uuid::new_v4(),
        })
    }

    pub fn advance(&self, minutes: i64) {
        self.clock.advance(Duration::minutes(minutes));
    }

    pub async fn request(
        &self,
        method: Method,
        path_and_query: &str,
        body: Option<Bytes>,
    ) -> anyhow::Result<(StatusCode, HeaderMap, Bytes)> {
        let hospital = self.hospital_id.to_string();
        let staff = self.staff_id.to_string();
        self.request_with_extra_headers(
            method,
            path_and_query,
            body,
            &[("x-hospital-id", &hospital), ("x-staff-id", &staff)],
        )
        .await
    }

    /// Request without the staff identity headers, as a kiosk or screen would send.
    pub async fn anonymous_request(
        &self,
        method: Method,
        path_and_query: &str,
    ) -> anyhow::Result<(StatusCode, HeaderMap, Bytes)> {
        self.request_with_extra_headers(method, path_and_query, None, &[])
            .await
    }

    pub async fn request_with_extra_headers(
        &self,
        method: Method,
        path_and_query: &str,
        body: Option<Bytes>,
        extra_headers: &[(&str, &str)],
    ) -> anyhow::Result<(StatusCode, HeaderMap, Bytes)> {
        let mut request = Request::builder()
            .method(method)
            .uri(path_and_query)
            .header("host", "example.org")
            .header("accept", "application/json")
            .header("content-type", "application/json")
            .body(match body {
                Some(bytes) => Body::from(bytes),
                None => Body::empty(),
            })
            .context("build request")?;

        for (name, value) in extra_headers {
            request.headers_mut().insert(
                name.parse::<HeaderName>().context("parse header name")?,
                value.parse::<HeaderValue>().context("parse header value")?,
            );
        }

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .context("dispatch request")?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .context("read response body")?;

        Ok((status, headers, body))
    }

    /// Send JSON and parse the JSON response.
    pub async fn json(
        &self,
        method: Method,
        path_and_query: &str,
        body: Option<Value>,
    ) -> anyhow::Result<(StatusCode, Value)> {
        let body = body.map(|v| to_json_body(&v)).transpose()?;
        let (status, _headers, bytes) = self.request(method, path_and_query, body).await?;
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).context("parse response JSON")?
        };
        Ok((status, value))
    }

    pub async fn issue(&self, service_type: &str, priority: Option<&str>) -> anyhow::Result<Value> {
        let mut body = serde_json::json!({ "serviceType": service_type });
        if let Some(priority) = priority {
            body["priority"] = Value::from(priority);
        }
        let (status, ticket) = self
            .json(Method::POST, "/api/queue/tickets", Some(body))
            .await?;
        assert_status(status, StatusCode::CREATED, "issue ticket");
        Ok(ticket)
    }

    pub async fn create_counter(&self, number: i32, services: &[&str]) -> anyhow::Result<Value> {
        let body = serde_json::json!({
            "counterNumber": number,
            "counterName": format!("Counter {number}"),
            "servicesOffered": services,
        });
        let (status, counter) = self
            .json(Method::POST, "/api/queue/counters", Some(body))
            .await?;
        assert_status(status, StatusCode::CREATED, "create counter");
        Ok(counter)
    }

    pub async fn call_next(&self, counter_id: &str) -> anyhow::Result<Value> {
        let (status, outcome) = self
            .json(
                Method::POST,
                "/api/queue/call-next",
                Some(serde_json::json!({ "counterId": counter_id })),
            )
            .await?;
        assert_status(status, StatusCode::OK, "call next");
        Ok(outcome)
    }

    pub async fn ticket_action(
        &self,
        ticket_id: &str,
        action: &str,
        body: Option<Value>,
    ) -> anyhow::Result<(StatusCode, Value)> {
        self.json(
            Method::POST,
            &format!("/api/queue/tickets/{ticket_id}/{action}"),
            body,
        )
        .await
    }
}

/// 08:00 UTC on a fixed weekday, well inside one calendar day.
pub fn test_start() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2024-03-04T08:00:00Z")
        .map(|t| t.with_timezone(&Utc))
        .unwrap()
}

pub async fn with_test_app<F>(f: F) -> anyhow::Result<()>
where
    F: for<'a> FnOnce(
        &'a TestApp,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = anyhow::Result<()>> + 'a>,
    >,
{
    with_test_app_with_config(|_| {}, f).await
}

pub async fn with_test_app_with_config<C, F>(configure: C, f: F) -> anyhow::Result<()>
where
    C: FnOnce(&mut Config),
    F: for<'a> FnOnce(
        &'a TestApp,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = anyhow::Result<()>> + 'a>,
    >,
{
    let app = TestApp::new_with_config(configure).await?;

    let result = std::panic::AssertUnwindSafe(f(&app)).catch_unwind().await;

    match result {
        Ok(r) => r,
        Err(panic) => std::panic::resume_unwind(panic),
    }
}
