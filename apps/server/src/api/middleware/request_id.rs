//! Per-request root span and request id propagation

use axum::{
    extract::Request,
    http::{HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use opentelemetry::trace::TraceContextExt;
use std::time::Instant;
use tracing::Span;
use tracing_opentelemetry::OpenTelemetrySpanExt;
use uuid::Uuid;

use crate::api::extractors::HOSPITAL_HEADER;
use crate::metrics::extract_operation;

const REQUEST_ID_HEADER: &str = "x-request-id";
const MAX_CLIENT_ID_LEN: usize = 128;

/// Reuse a kiosk or gateway supplied request id when it is a plain token,
/// otherwise mint a fresh one.
fn resolve_request_id(headers: &HeaderMap) -> String {
    headers
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|id| {
            !id.is_empty()
                && id.len() <= MAX_CLIENT_ID_LEN
                && id
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        })
        .map(String::from)
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

/// Root span for every HTTP request.
///
/// Echoes the request id in `x-request-id` and the OpenTelemetry trace id in
/// `x-trace-id`, and tags the span with the queue operation and hospital.
#[tracing::instrument(
    name = "http_request",
    skip_all,
    fields(
        http.method = %req.method(),
        http.route = %req.uri().path(),
        otel.kind = "server",
        http.response.status_code = tracing::field::Empty,
        queue.operation = tracing::field::Empty,
        hospital_id = tracing::field::Empty,
        request_id = tracing::field::Empty,
    )
)]
pub async fn request_id_middleware(req: Request, next: Next) -> Response {
    let span = Span::current();
    let start = Instant::now();

    let request_id = resolve_request_id(req.headers());
    span.record("request_id", request_id.as_str());

    let method = req.method().clone();
    let path = req.uri().path().to_string();
    if let Some(operation) = extract_operation(method.as_str(), &path) {
        span.record("queue.operation", operation.as_str());
    }
    if let Some(hospital_id) = req
        .headers()
        .get(HOSPITAL_HEADER)
        .and_then(|v| v.to_str().ok())
    {
        span.record("hospital_id", hospital_id);
    }

    let mut response = next.run(req).await;

    let status = response.status().as_u16();
    span.record("http.response.status_code", status);
    tracing::info!(
        method = %method,
        path = %path,
        status,
        duration_ms = start.elapsed().as_millis() as u64,
        "Request completed"
    );

    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        headers.insert(REQUEST_ID_HEADER, value);
    }
    let trace_id = span.context().span().span_context().trace_id().to_string();
    if let Ok(value) = HeaderValue::from_str(&trace_id) {
        headers.insert("x-trace-id", value);
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_safe_client_ids() {
        let mut headers = HeaderMap::new();
        headers.insert(REQUEST_ID_HEADER, HeaderValue::from_static("kiosk-3.0042"));
        assert_eq!(resolve_request_id(&headers), "kiosk-3.0042");
    }

    #[test]
    fn replaces_unsafe_or_missing_ids() {
        let mut headers = HeaderMap::new();
        assert!(Uuid::parse_str(&resolve_request_id(&headers)).is_ok());

        headers.insert(REQUEST_ID_HEADER, HeaderValue::from_static("<script>"));
        assert!(Uuid::parse_str(&resolve_request_id(&headers)).is_ok());
    }
}
