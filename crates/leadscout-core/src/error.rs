//! Error types for the discovery engine.

use crate::client::ApiError;
use leadscout_types::{FormError, SearchId, SearchStatus};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("{0}")]
    Validation(String),

    #[error("Search status: {status}. Please try again.")]
    SearchStart { search_id: SearchId, status: SearchStatus },

    #[error("Search {search_id} ended with status {status}")]
    TerminalSearchFailure { search_id: SearchId, status: SearchStatus },

    #[error("Not enough credits: requested {requested}, balance {balance}")]
    InsufficientCredits { requested: u64, balance: u64 },

    #[error("Not enough results to unlock: requested {requested}, available {available}")]
    InsufficientInventory { requested: u64, available: u64 },

    #[error("No search results are ready")]
    NoActiveSession,

    #[error("An unlock is already in progress")]
    UnlockInFlight,

    #[error("Search {0} is no longer the active search")]
    Superseded(SearchId),

    #[error("Search {0} is not in the history snapshot")]
    HistoryEntryNotFound(SearchId),

    #[error("Failed to start search: {0}")]
    StartTransport(#[source] ApiError),

    #[error("Failed to load preview: {0}")]
    PreviewLoad(#[source] ApiError),

    #[error("Failed to unlock results: {0}")]
    UnlockTransport(#[source] ApiError),

    #[error("Failed to load history: {0}")]
    HistoryLoad(#[source] ApiError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<FormError> for DiscoveryError {
    fn from(err: FormError) -> Self {
        Self::Validation(err.to_string())
    }
}
