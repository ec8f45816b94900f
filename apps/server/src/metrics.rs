//! Prometheus metrics for the queue server
//!
//! HTTP metrics are recorded by the metrics middleware; queue metrics by the services.

use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter_vec, register_int_gauge_vec, HistogramVec,
    IntCounterVec, IntGaugeVec,
};

lazy_static! {
    // HTTP Request Metrics

    /// Total HTTP requests by method, path, and status
    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "medqueue_http_requests_total",
        "Total number of HTTP requests",
        &["method", "path", "status"]
    )
    .expect("Failed to register HTTP_REQUESTS_TOTAL");

    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "medqueue_http_request_duration_seconds",
        "HTTP request duration in seconds",
        &["method", "path"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    )
    .expect("Failed to register HTTP_REQUEST_DURATION_SECONDS");

    pub static ref HTTP_REQUESTS_IN_FLIGHT: IntGaugeVec = register_int_gauge_vec!(
        "medqueue_http_requests_in_flight",
        "Number of HTTP requests currently being processed",
        &["method", "path"]
    )
    .expect("Failed to register HTTP_REQUESTS_IN_FLIGHT");

    pub static ref HTTP_RESPONSE_SIZE_BYTES: HistogramVec = register_histogram_vec!(
        "medqueue_http_response_size_bytes",
        "HTTP response size in bytes",
        &["method", "path", "status"],
        vec![100.0, 1_000.0, 10_000.0, 100_000.0, 1_000_000.0]
    )
    .expect("Failed to register HTTP_RESPONSE_SIZE_BYTES");

    // Queue Metrics

    /// Tickets issued by service type and priority category
    pub static ref TICKETS_ISSUED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "medqueue_tickets_issued_total",
        "Total number of tickets issued",
        &["service_type", "priority"]
    )
    .expect("Failed to register TICKETS_ISSUED_TOTAL");

    /// Tickets handed to a counter by call-next
    pub static ref TICKETS_DISPATCHED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "medqueue_tickets_dispatched_total",
        "Total number of tickets called to a counter",
        &["service_type"]
    )
    .expect("Failed to register TICKETS_DISPATCHED_TOTAL");

    /// Terminal transitions: completed, no_show, cancelled
    pub static ref TICKET_OUTCOMES_TOTAL: IntCounterVec = register_int_counter_vec!(
        "medqueue_ticket_outcomes_total",
        "Total number of tickets reaching a terminal state",
        &["service_type", "outcome"]
    )
    .expect("Failed to register TICKET_OUTCOMES_TOTAL");

    /// Retries caused by lost races, by operation
    pub static ref QUEUE_RETRIES_TOTAL: IntCounterVec = register_int_counter_vec!(
        "medqueue_retries_total",
        "Total number of internal retries after a lost race",
        &["operation"]
    )
    .expect("Failed to register QUEUE_RETRIES_TOTAL");

    /// Waiting tickets per service type, refreshed on position recompute
    pub static ref QUEUE_WAITING: IntGaugeVec = register_int_gauge_vec!(
        "medqueue_waiting_tickets",
        "Number of tickets currently waiting",
        &["service_type"]
    )
    .expect("Failed to register QUEUE_WAITING");

    pub static ref TICKET_WAIT_MINUTES: HistogramVec = register_histogram_vec!(
        "medqueue_ticket_wait_minutes",
        "Minutes between issuance and first call",
        &["service_type"],
        vec![1.0, 5.0, 10.0, 15.0, 30.0, 45.0, 60.0, 90.0, 120.0, 240.0]
    )
    .expect("Failed to register TICKET_WAIT_MINUTES");
}

/// Collapse ids in a request path so metric labels stay low-cardinality.
///
/// Any segment that parses as a UUID becomes `{id}`.
pub fn sanitize_path(path: &str) -> String {
    if path.is_empty() || path == "/" {
        return "/".to_string();
    }

    path.split('/')
        .map(|segment| {
            if uuid::Uuid::parse_str(segment).is_ok() {
                "{id}"
            } else {
                segment
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Coarse operation name for a queue API path, used as a span field.
pub fn extract_operation(method: &str, path: &str) -> Option<String> {
    let rest = path.strip_prefix("/api/queue/")?;
    let segments: Vec<&str> = rest.split('/').filter(|s| !s.is_empty()).collect();

    let op = match (method, segments.as_slice()) {
        ("POST", ["tickets"]) => "issue",
        ("POST", ["call-next"]) => "call_next",
        ("POST", ["tickets", _, action]) => *action,
        (_, ["public", kind, ..]) => *kind,
        (_, [first, ..]) => *first,
        _ => return None,
    };
    Some(op.replace('-', "_"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_path() {
        assert_eq!(
            sanitize_path("/api/queue/tickets/6f1c2a8e-4a8b-4f53-9b55-0d2f7c1e2a10/complete"),
            "/api/queue/tickets/{id}/complete"
        );
        assert_eq!(sanitize_path("/api/queue/status"), "/api/queue/status");
        assert_eq!(sanitize_path("/health"), "/health");
        assert_eq!(sanitize_path("/"), "/");
    }

    #[test]
    fn test_extract_operation() {
        assert_eq!(
            extract_operation("POST", "/api/queue/tickets"),
            Some("issue".to_string())
        );
        assert_eq!(
            extract_operation("POST", "/api/queue/tickets/abc/no-show"),
            Some("no_show".to_string())
        );
        assert_eq!(
            extract_operation("GET", "/api/queue/public/display/abc"),
            Some("display".to_string())
        );
        assert_eq!(extract_operation("GET", "/health"), None);
    }
}
