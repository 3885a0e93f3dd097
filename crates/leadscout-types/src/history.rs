//! Search history types and client-side filtering.

use crate::{Pagination, SearchId, SearchStatus};
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

/// Summary of a past or current discovery search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub search_id: SearchId,
    pub query_text: String,
    #[serde(default)]
    pub location_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location_latitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location_longitude: Option<f64>,
    pub status: SearchStatus,
    #[serde(default)]
    pub unique_records: u64,
    #[serde(default)]
    pub unlocked_count: u64,
    #[serde(default)]
    pub available_to_unlock: u64,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub last_accessed_at: DateTime<Utc>,
}

/// Response of `GET /leads/google-maps/history`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryResponse {
    #[serde(default)]
    pub items: Vec<HistoryEntry>,
    #[serde(default)]
    pub pagination: Pagination,
}

/// The backend sends timestamps either as RFC 3339 strings or as epoch
/// milliseconds depending on the table they come from.
fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Millis(i64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Millis(ms) => Utc
            .timestamp_millis_opt(ms)
            .single()
            .ok_or_else(|| serde::de::Error::custom(format!("timestamp out of range: {}", ms))),
        Raw::Text(text) => DateTime::parse_from_rfc3339(&text)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(serde::de::Error::custom),
    }
}

/// Status bucket of the history filter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StatusCategory {
    #[default]
    All,
    Running,
    Completed,
    HasAvailable,
}

impl StatusCategory {
    pub fn matches(self, entry: &HistoryEntry) -> bool {
        match self {
            Self::All => true,
            Self::Running => entry.status == SearchStatus::Running,
            Self::Completed => entry.status == SearchStatus::Succeeded,
            Self::HasAvailable => entry.available_to_unlock > 0,
        }
    }
}

impl FromStr for StatusCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "all" => Ok(Self::All),
            "running" => Ok(Self::Running),
            "completed" => Ok(Self::Completed),
            "has-available" | "has_available" | "available" => Ok(Self::HasAvailable),
            _ => Err(format!(
                "Invalid history filter: '{}'. Use 'all', 'running', 'completed' or 'has-available'.",
                s
            )),
        }
    }
}

impl fmt::Display for StatusCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::All => "all",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::HasAvailable => "has-available",
        })
    }
}

/// Combined status and text predicate over history entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoryFilter {
    pub category: StatusCategory,
    pub text: String,
}

impl HistoryFilter {
    pub fn new(category: StatusCategory, text: impl Into<String>) -> Self {
        Self {
            category,
            text: text.into(),
        }
    }

    /// Status bucket AND case-insensitive substring on query or location.
    pub fn matches(&self, entry: &HistoryEntry) -> bool {
        if !self.category.matches(entry) {
            return false;
        }
        let needle = self.text.trim().to_lowercase();
        needle.is_empty()
            || entry.query_text.to_lowercase().contains(&needle)
            || entry.location_text.to_lowercase().contains(&needle)
    }
}
