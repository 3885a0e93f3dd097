//! Lead discovery session engine for Leadscout.

mod client;
mod controller;
mod error;
mod events;
mod history;
mod pointer;
mod poller;
mod preview;
mod store;
mod unlock;

pub use client::{error_message, ApiError, ClientConfig, HttpSearchClient, SearchClient};
pub use controller::{DiscoveryConfig, DiscoverySessionController, DiscoveryView};
pub use error::DiscoveryError;
pub use events::DiscoveryEvent;
pub use history::HistoryResolver;
pub use pointer::{MemoryPointerStore, PointerStore, SqlitePointerStore, DEEPENING_KEY};
pub use poller::{JobPoller, PollOutcome};
pub use preview::PreviewPaginator;
pub use store::{
    Notice, NoticeKind, Phase, PollMode, SessionSnapshot, SessionStore, StatusApplied, UnlockGuard,
};
pub use unlock::{check_batch, compute_default_batch, UnlockCoordinator, UnlockOutcome};

/// Result type for discovery operations.
pub type Result<T> = std::result::Result<T, DiscoveryError>;
