//! Search submission and status types.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Backend-assigned identifier of a discovery search.
///
/// The backend reuses the same id when an identical (keywords, location)
/// pair is submitted again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SearchId(pub i64);

impl fmt::Display for SearchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for SearchId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Lifecycle status of a remote search job, spelled as the backend spells it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING-KEBAB-CASE")]
pub enum SearchStatus {
    Ready,
    Running,
    Succeeded,
    Failed,
    Aborted,
    TimedOut,
    #[default]
    #[serde(other)]
    Unknown,
}

impl SearchStatus {
    /// Terminal statuses never transition again.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Succeeded | Self::Failed | Self::Aborted | Self::TimedOut
        )
    }

    /// Terminal and not successful.
    pub fn is_failure(self) -> bool {
        matches!(self, Self::Failed | Self::Aborted | Self::TimedOut)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ready => "READY",
            Self::Running => "RUNNING",
            Self::Succeeded => "SUCCEEDED",
            Self::Failed => "FAILED",
            Self::Aborted => "ABORTED",
            Self::TimedOut => "TIMED-OUT",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for SearchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a search form cannot be submitted.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormError {
    #[error("Please enter search keywords")]
    MissingKeywords,

    #[error("Please enter at least one location field")]
    MissingLocation,
}

/// User-entered search form.
///
/// Kept verbatim (untrimmed) so that resuming a surface never rewrites what
/// the user typed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchForm {
    pub keywords: String,
    #[serde(default)]
    pub country_code: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub county: String,
    #[serde(default)]
    pub postal_code: String,
}

impl SearchForm {
    pub fn new(keywords: impl Into<String>) -> Self {
        Self {
            keywords: keywords.into(),
            ..Self::default()
        }
    }

    pub fn with_city(mut self, city: impl Into<String>) -> Self {
        self.city = city.into();
        self
    }

    pub fn with_state(mut self, state: impl Into<String>) -> Self {
        self.state = state.into();
        self
    }

    pub fn with_country(mut self, country_code: impl Into<String>) -> Self {
        self.country_code = country_code.into();
        self
    }

    pub fn with_county(mut self, county: impl Into<String>) -> Self {
        self.county = county.into();
        self
    }

    pub fn with_postal_code(mut self, postal_code: impl Into<String>) -> Self {
        self.postal_code = postal_code.into();
        self
    }

    /// Rebuild form fields from a backend location string such as
    /// `"Austin, TX, US"` (city, state, country).
    pub fn from_history(query_text: &str, location_text: &str) -> Self {
        let mut parts = location_text.split(',').map(str::trim);
        Self {
            keywords: query_text.to_string(),
            city: parts.next().unwrap_or_default().to_string(),
            state: parts.next().unwrap_or_default().to_string(),
            country_code: parts.next().unwrap_or_default().to_string(),
            ..Self::default()
        }
    }

    pub fn is_blank(&self) -> bool {
        self.keywords.trim().is_empty() && !self.has_location()
    }

    fn has_location(&self) -> bool {
        [
            &self.country_code,
            &self.city,
            &self.state,
            &self.county,
            &self.postal_code,
        ]
        .iter()
        .any(|field| !field.trim().is_empty())
    }

    /// Validate and normalize into a start request.
    pub fn to_request(&self) -> Result<StartSearchRequest, FormError> {
        let keywords = self.keywords.trim();
        if keywords.is_empty() {
            return Err(FormError::MissingKeywords);
        }
        if !self.has_location() {
            return Err(FormError::MissingLocation);
        }

        Ok(StartSearchRequest {
            search_keywords: keywords.to_string(),
            country_code: non_empty(&self.country_code).map(|c| c.to_lowercase()),
            city: non_empty(&self.city),
            state: non_empty(&self.state),
            county: non_empty(&self.county),
            postal_code: non_empty(&self.postal_code),
        })
    }
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Body of `POST /leads/google-maps/search`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartSearchRequest {
    pub search_keywords: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub county: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
}

/// Geocoded location echoed back on start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedLocation {
    pub text: String,
    pub latitude: f64,
    pub longitude: f64,
}

/// Response of `POST /leads/google-maps/search`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartSearchResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub is_new_search: bool,
    pub search_id: SearchId,
    #[serde(default)]
    pub query_hash: String,
    pub status: SearchStatus,
    #[serde(default)]
    pub unique_records: u64,
    #[serde(default)]
    pub unlocked_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<ResolvedLocation>,
    #[serde(default)]
    pub message: String,
}

/// Response of `GET /leads/google-maps/search/{id}/status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchStatusResponse {
    pub search_id: SearchId,
    pub status: SearchStatus,
    #[serde(default)]
    pub unique_records: u64,
    #[serde(default)]
    pub unlocked_count: u64,
    #[serde(default)]
    pub available_to_unlock: u64,
    #[serde(default)]
    pub progress: f64,
}
