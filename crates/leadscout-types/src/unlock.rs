//! Unlock request and response types.

use serde::{Deserialize, Serialize};

/// Body of `POST /leads/google-maps/search/{id}/unlock`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnlockRequest {
    pub batch_size: u64,
}

/// A row revealed by an unlock. Informational only; the preview re-fetch is
/// what gets rendered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnlockedItem {
    pub place_id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
}

/// Details of a deepening re-search started by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeepeningResult {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub new_run_id: String,
    #[serde(default)]
    pub new_dataset_id: String,
    #[serde(default)]
    pub new_max_places: u64,
    #[serde(default)]
    pub old_max_places: u64,
    #[serde(default)]
    pub message: String,
}

/// Response of `POST /leads/google-maps/search/{id}/unlock`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnlockResponse {
    #[serde(default)]
    pub success: bool,
    pub unlocked: u64,
    #[serde(default)]
    pub businesses_created: u64,
    #[serde(default)]
    pub leads_created: u64,
    #[serde(default)]
    pub skipped_duplicates: u64,
    #[serde(default)]
    pub total_unlocked: u64,
    #[serde(default)]
    pub remaining: u64,
    pub credits_used: u64,
    pub credits_remaining: u64,
    #[serde(default)]
    pub needs_deepening: bool,
    #[serde(default)]
    pub deepening_triggered: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deepening_result: Option<DeepeningResult>,
    #[serde(default)]
    pub items: Vec<UnlockedItem>,
    #[serde(default)]
    pub message: String,
}

impl UnlockResponse {
    /// Upper bound of the deepening re-search, if one was started.
    pub fn new_max_places(&self) -> Option<u64> {
        self.deepening_result
            .as_ref()
            .map(|d| d.new_max_places)
            .filter(|n| *n > 0)
    }
}
