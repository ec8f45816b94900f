//! Prometheus scrape endpoint

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use prometheus::{Encoder, TextEncoder};

/// Encode every registered collector in the text exposition format.
fn render() -> prometheus::Result<Vec<u8>> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&prometheus::gather(), &mut buffer)?;
    Ok(buffer)
}

pub async fn metrics_handler() -> Response {
    match render() {
        Ok(body) => ([(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)], body).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to encode metrics").into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_queue_collectors() {
        crate::metrics::TICKETS_ISSUED_TOTAL
            .with_label_values(&["consultation", "NORMAL"])
            .inc();
        let text = String::from_utf8(render().unwrap()).unwrap();
        assert!(text.contains("medqueue_tickets_issued_total"));
    }
}
