//! Discovery session model.

use crate::{HistoryEntry, PreviewResponse, SearchId, SearchStatus, SearchStatusResponse, StartSearchResponse};
use serde::{Deserialize, Serialize};

/// One discovery attempt as the client currently knows it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchSession {
    pub id: SearchId,
    /// Normalized keywords as echoed by the backend.
    pub query_text: String,
    /// Normalized location as echoed by the backend.
    pub location_text: String,
    pub status: SearchStatus,
    pub unique_records: u64,
    pub unlocked_count: u64,
    pub credits_balance: u64,
    /// Ascending batch sizes the backend currently permits.
    pub unlock_batch_sizes: Vec<u64>,
    /// Job progress reported by the last status poll (0-100).
    pub progress: f64,
}

impl SearchSession {
    /// Session seeded from a start response; `query_text` falls back to the
    /// submitted keywords because the start endpoint does not echo them.
    pub fn from_start(response: &StartSearchResponse, keywords: &str) -> Self {
        Self {
            id: response.search_id,
            query_text: keywords.to_string(),
            location_text: response
                .location
                .as_ref()
                .map(|l| l.text.clone())
                .unwrap_or_default(),
            status: response.status,
            unique_records: response.unique_records,
            unlocked_count: response.unlocked_count,
            credits_balance: 0,
            unlock_batch_sizes: Vec::new(),
            progress: if response.status == SearchStatus::Succeeded { 100.0 } else { 0.0 },
        }
    }

    pub fn from_history(entry: &HistoryEntry) -> Self {
        Self {
            id: entry.search_id,
            query_text: entry.query_text.clone(),
            location_text: entry.location_text.clone(),
            status: entry.status,
            unique_records: entry.unique_records,
            unlocked_count: entry.unlocked_count,
            credits_balance: 0,
            unlock_batch_sizes: Vec::new(),
            progress: 0.0,
        }
    }

    /// Placeholder session for a deepening search resumed from its pointer;
    /// counts arrive with the first preview load.
    pub fn from_pointer(pointer: &DeepeningPointer) -> Self {
        Self {
            id: pointer.search_id,
            query_text: pointer.query_text.clone(),
            location_text: String::new(),
            status: SearchStatus::Unknown,
            unique_records: 0,
            unlocked_count: 0,
            credits_balance: 0,
            unlock_batch_sizes: Vec::new(),
            progress: 0.0,
        }
    }

    /// Results found but not yet revealed to this account.
    pub fn available_to_unlock(&self) -> u64 {
        self.unique_records.saturating_sub(self.unlocked_count)
    }

    /// Move to `next` unless the session already reached a terminal status.
    ///
    /// Returns whether the status changed.
    pub fn advance_status(&mut self, next: SearchStatus) -> bool {
        if self.status.is_terminal() || self.status == next {
            return false;
        }
        self.status = next;
        true
    }

    /// Apply the counters of a status poll. Status itself goes through
    /// [`advance_status`](Self::advance_status).
    pub fn apply_status_counts(&mut self, status: &SearchStatusResponse) {
        self.unique_records = status.unique_records;
        self.unlocked_count = status.unlocked_count;
        self.progress = status.progress;
    }

    /// Apply the session scalars that ride along with a preview page.
    pub fn apply_preview(&mut self, preview: &PreviewResponse) {
        self.unique_records = preview.unique_records;
        self.unlocked_count = preview.unlocked_count;
        self.credits_balance = preview.credits_balance;
        let mut batches = preview.unlock_batches.clone();
        batches.sort_unstable();
        batches.dedup();
        self.unlock_batch_sizes = batches;
    }
}

/// Durable marker of a background deepening search.
///
/// Lives only while the re-search is in flight and must survive the UI
/// surface being torn down and rebuilt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeepeningPointer {
    pub search_id: SearchId,
    pub query_text: String,
}
