use anyhow::Context as _;
use axum::http::StatusCode;
use serde_json::Value;

/// Assert status code matches expected
pub fn assert_status(actual: StatusCode, expected: StatusCode, context: &str) {
    assert_eq!(
        actual, expected,
        "{context}: expected status {expected}, got {actual}"
    );
}

/// Assert status is 4xx client error
pub fn assert_client_error(status: StatusCode, context: &str) {
    assert!(
        status.is_client_error(),
        "{context}: expected client error status, got {status}"
    );
}

/// Assert the error envelope carries the given code
pub fn assert_error_code(body: &Value, expected: &str) {
    assert_eq!(
        body["error"]["code"].as_str(),
        Some(expected),
        "expected error code {expected}, got {body}"
    );
}

pub fn str_field<'a>(value: &'a Value, field: &str) -> anyhow::Result<&'a str> {
    value
        .get(field)
        .and_then(|v| v.as_str())
        .with_context(|| format!("{field} is a string in {value}"))
}

pub fn int_field(value: &Value, field: &str) -> anyhow::Result<i64> {
    value
        .get(field)
        .and_then(|v| v.as_i64())
        .with_context(|| format!("{field} is an integer in {value}"))
}

/// Assert a ticket has the given status
pub fn assert_ticket_status(ticket: &Value, expected: &str) -> anyhow::Result<()> {
    let status = str_field(ticket, "status")?;
    assert_eq!(status, expected, "ticket {}", ticket["tokenDisplay"]);
    Ok(())
}

/// Token displays of an array of tickets, in order
pub fn tokens(tickets: &Value) -> anyhow::Result<Vec<String>> {
    tickets
        .as_array()
        .context("expected an array of tickets")?
        .iter()
        .map(|t| str_field(t, "tokenDisplay").map(str::to_string))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tokens() {
        let tickets = json!([{ "tokenDisplay": "C-001" }, { "tokenDisplay": "C-002" }]);
        assert_eq!(tokens(&tickets).unwrap(), vec!["C-001", "C-002"]);
    }
}
