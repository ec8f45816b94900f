//! Security headers middleware

use axum::{
    extract::Request,
    http::{header, HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};

const BASELINE: [(&str, &str); 5] = [
    ("x-content-type-options", "nosniff"),
    ("x-frame-options", "DENY"),
    ("referrer-policy", "no-referrer"),
    ("content-security-policy", "default-src 'none'"),
    ("cross-origin-resource-policy", "same-site"),
];

/// Baseline hardening headers plus a cache policy for queue data.
///
/// Staff responses may carry patient details and must never be cached. Public
/// display and announcement feeds can be cached by intermediaries but must be
/// revalidated on every poll.
pub async fn security_headers_middleware(req: Request, next: Next) -> Response {
    let https = forwarded_https(req.headers()) || req.uri().scheme_str() == Some("https");
    let cache_policy = cache_policy(req.uri().path());

    let mut response = next.run(req).await;
    let headers = response.headers_mut();

    for (name, value) in BASELINE {
        headers.insert(name, HeaderValue::from_static(value));
    }
    if let Some(policy) = cache_policy {
        headers.insert(header::CACHE_CONTROL, HeaderValue::from_static(policy));
    }
    if https {
        headers.insert(
            header::STRICT_TRANSPORT_SECURITY,
            HeaderValue::from_static("max-age=31536000; includeSubDomains"),
        );
    }

    response
}

fn forwarded_https(headers: &HeaderMap) -> bool {
    headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.eq_ignore_ascii_case("https"))
}

fn cache_policy(path: &str) -> Option<&'static str> {
    if path.starts_with("/api/queue/public/") {
        Some("no-cache")
    } else if path.starts_with("/api/queue/") {
        Some("no-store")
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_data_is_never_stored() {
        assert_eq!(cache_policy("/api/queue/tickets"), Some("no-store"));
        assert_eq!(
            cache_policy("/api/queue/public/display/8f0c"),
            Some("no-cache")
        );
        assert_eq!(cache_policy("/metrics"), None);
    }

    #[test]
    fn detects_tls_terminated_upstream() {
        let mut headers = HeaderMap::new();
        assert!(!forwarded_https(&headers));
        headers.insert("x-forwarded-proto", HeaderValue::from_static("HTTPS"));
        assert!(forwarded_https(&headers));
    }
}
