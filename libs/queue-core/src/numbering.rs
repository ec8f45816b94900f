//! Ticket prefixes and token formatting

use crate::error::{Error, Result};

/// Prefix used when a service type has no configured one.
pub const FALLBACK_PREFIX: &str = "T";

pub const DEFAULT_PADDING: usize = 3;

/// Built-in prefix for well-known service types.
pub fn default_prefix(service_type: &str) -> &'static str {
    match service_type {
        "registration" => "R",
        "consultation" => "C",
        "laboratory" => "L",
        "pharmacy" => "P",
        "radiology" => "X",
        "billing" => "B",
        "emergency" => "E",
        "vaccination" => "V",
        _ => FALLBACK_PREFIX,
    }
}

/// Canonical lower-case form of a service type.
///
/// Accepts letters, digits, `_`, `-` and spaces; spaces and dashes become `_`.
pub fn normalize_service_type(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty()
        || trimmed.len() > 64
        || !trimmed
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | ' '))
    {
        return Err(Error::InvalidServiceType(raw.to_string()));
    }
    Ok(trimmed.to_ascii_lowercase().replace(['-', ' '], "_"))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenFormat {
    pub prefix: String,
    pub padding: usize,
}

impl TokenFormat {
    pub fn new(prefix: impl Into<String>, padding: usize) -> Self {
        Self {
            prefix: prefix.into(),
            padding: padding.clamp(1, 8),
        }
    }

    pub fn for_service(service_type: &str) -> Self {
        Self::new(default_prefix(service_type), DEFAULT_PADDING)
    }
}

/// Render a ticket number, e.g. `C-007`.
pub fn format_token(format: &TokenFormat, number: i32) -> String {
    format!(
        "{}-{:0width$}",
        format.prefix,
        number,
        width = format.padding
    )
}
