//! Priority categories and acuity scoring

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Score assigned to a category the scorer does not recognise.
pub const UNKNOWN_CATEGORY_SCORE: i32 = 50;

/// Upper bound of any priority score.
pub const MAX_SCORE: i32 = 100;

/// Patient priority category as captured at the kiosk or front desk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    Emergency,
    High,
    Vip,
    Pregnant,
    Disabled,
    SeniorCitizen,
    Child,
    #[default]
    Normal,
    Low,
}

impl Priority {
    pub const ALL: [Priority; 9] = [
        Priority::Emergency,
        Priority::High,
        Priority::Vip,
        Priority::Pregnant,
        Priority::Disabled,
        Priority::SeniorCitizen,
        Priority::Child,
        Priority::Normal,
        Priority::Low,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Emergency => "EMERGENCY",
            Priority::High => "HIGH",
            Priority::Vip => "VIP",
            Priority::Pregnant => "PREGNANT",
            Priority::Disabled => "DISABLED",
            Priority::SeniorCitizen => "SENIOR_CITIZEN",
            Priority::Child => "CHILD",
            Priority::Normal => "NORMAL",
            Priority::Low => "LOW",
        }
    }

    /// Base acuity score before the urgency addend.
    pub fn base_score(&self) -> i32 {
        match self {
            Priority::Emergency => 100,
            Priority::High => 80,
            Priority::Vip => 75,
            Priority::Pregnant | Priority::Disabled => 70,
            Priority::SeniorCitizen => 65,
            Priority::Child => 60,
            Priority::Normal => 50,
            Priority::Low => 30,
        }
    }

    /// Factor applied to the raw wait estimate for this category.
    pub fn wait_multiplier(&self) -> f64 {
        match self {
            Priority::Emergency => 0.1,
            Priority::High => 0.3,
            Priority::Vip => 0.4,
            Priority::Pregnant | Priority::Disabled => 0.5,
            Priority::SeniorCitizen => 0.6,
            Priority::Child => 0.7,
            Priority::Normal => 1.0,
            Priority::Low => 1.2,
        }
    }

    /// Parse a category, accepting lower case and hyphenated spellings.
    ///
    /// Returns `None` for anything unrecognised so callers can fall back to
    /// [`Priority::Normal`], whose score equals [`UNKNOWN_CATEGORY_SCORE`].
    pub fn parse_lenient(value: &str) -> Option<Self> {
        let normalized = value.trim().to_ascii_uppercase().replace(['-', ' '], "_");
        Priority::ALL
            .into_iter()
            .find(|p| p.as_str() == normalized)
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Priority::parse_lenient(s).ok_or_else(|| Error::InvalidPriority(s.to_string()))
    }
}

/// Free-text urgency level attached by triage staff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UrgencyLevel {
    Critical,
    High,
    Medium,
    Low,
}

impl UrgencyLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            UrgencyLevel::Critical => "critical",
            UrgencyLevel::High => "high",
            UrgencyLevel::Medium => "medium",
            UrgencyLevel::Low => "low",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "critical" => Some(UrgencyLevel::Critical),
            "high" => Some(UrgencyLevel::High),
            "medium" => Some(UrgencyLevel::Medium),
            "low" => Some(UrgencyLevel::Low),
            _ => None,
        }
    }

    pub fn addend(&self) -> i32 {
        match self {
            UrgencyLevel::Critical => 30,
            UrgencyLevel::High => 20,
            UrgencyLevel::Medium => 10,
            UrgencyLevel::Low => 0,
        }
    }
}

/// Compute the 0..=100 dispatch score for a category and optional urgency.
///
/// Unrecognised urgency text adds nothing.
pub fn priority_score(priority: Priority, urgency_level: Option<&str>) -> i32 {
    let addend = urgency_level
        .and_then(UrgencyLevel::parse)
        .map(|u| u.addend())
        .unwrap_or(0);
    (priority.base_score() + addend).clamp(0, MAX_SCORE)
}

/// Score a raw category string; unknown categories score [`UNKNOWN_CATEGORY_SCORE`].
pub fn score_category(category: &str, urgency_level: Option<&str>) -> i32 {
    match Priority::parse_lenient(category) {
        Some(priority) => priority_score(priority, urgency_level),
        None => {
            let addend = urgency_level
                .and_then(UrgencyLevel::parse)
                .map(|u| u.addend())
                .unwrap_or(0);
            (UNKNOWN_CATEGORY_SCORE + addend).min(MAX_SCORE)
        }
    }
}
