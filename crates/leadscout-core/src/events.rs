//! Events broadcast by the discovery engine.

use leadscout_types::{SearchId, SearchStatus};

/// Notifications for whoever renders the discovery surface.
#[derive(Debug, Clone, PartialEq)]
pub enum DiscoveryEvent {
    /// A status poll was applied.
    StatusUpdated {
        search_id: SearchId,
        status: SearchStatus,
        unique_records: u64,
        unlocked_count: u64,
        progress: f64,
    },
    /// A preview page was fetched and cached.
    PreviewLoaded {
        search_id: SearchId,
        page: u32,
        items: usize,
    },
    /// A foreground search finished successfully.
    SearchCompleted {
        search_id: SearchId,
        unique_records: u64,
    },
    /// A foreground search ended in FAILED, ABORTED or TIMED-OUT.
    SearchFailed {
        search_id: SearchId,
        status: SearchStatus,
    },
    /// An unlock succeeded.
    LeadsUnlocked {
        search_id: SearchId,
        unlocked: u64,
        credits_remaining: u64,
    },
    /// The backend started a background re-search.
    DeepeningStarted {
        search_id: SearchId,
        new_max_places: Option<u64>,
    },
    /// The background re-search reached a terminal status.
    DeepeningFinished {
        search_id: SearchId,
        succeeded: bool,
        query_text: String,
    },
}
