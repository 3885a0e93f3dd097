//! Spending credits to reveal contact data.

use crate::client::SearchClient;
use crate::events::DiscoveryEvent;
use crate::poller::JobPoller;
use crate::preview::PreviewPaginator;
use crate::store::{PollMode, SessionStore};
use crate::{DiscoveryError, Result};
use leadscout_types::{DeepeningPointer, PreviewPage, SearchId, SearchSession};
use std::sync::Arc;
use tracing::{info, warn};

/// Batch the unlock control should offer for `session`.
///
/// The smallest permitted size that fits both inventory and credits wins.
/// When inventory is below every permitted size the remaining rows are
/// offered instead, capped by credits. `None` means nothing can be unlocked.
pub fn compute_default_batch(session: &SearchSession) -> Option<u64> {
    let available = session.available_to_unlock();
    let credits = session.credits_balance;

    let mut sizes: Vec<u64> = session
        .unlock_batch_sizes
        .iter()
        .copied()
        .filter(|s| *s > 0)
        .collect();
    sizes.sort_unstable();

    if let Some(size) = sizes.iter().copied().find(|s| *s <= available && *s <= credits) {
        return Some(size);
    }

    let below_smallest = sizes.first().is_none_or(|smallest| available < *smallest);
    if available > 0 && below_smallest {
        return Some(available.min(credits)).filter(|n| *n > 0);
    }
    None
}

/// Reject a batch that cannot be issued, before any network call.
pub fn check_batch(session: &SearchSession, batch_size: u64) -> Result<()> {
    if batch_size == 0 {
        return Err(DiscoveryError::Validation(
            "Batch size must be greater than zero".into(),
        ));
    }
    let available = session.available_to_unlock();
    if batch_size > available {
        return Err(DiscoveryError::InsufficientInventory {
            requested: batch_size,
            available,
        });
    }
    if batch_size > session.credits_balance {
        return Err(DiscoveryError::InsufficientCredits {
            requested: batch_size,
            balance: session.credits_balance,
        });
    }
    Ok(())
}

/// What a successful unlock changed.
#[derive(Debug, Clone)]
pub struct UnlockOutcome {
    pub search_id: SearchId,
    pub unlocked: u64,
    pub credits_used: u64,
    pub credits_remaining: u64,
    /// Set when the backend started a background re-search.
    pub deepening: Option<DeepeningPointer>,
    pub new_max_places: Option<u64>,
    /// Page 1 re-fetched after the unlock, if that load succeeded.
    pub preview: Option<PreviewPage>,
    pub message: String,
}

fn deepening_notice(new_max_places: Option<u64>) -> String {
    match new_max_places {
        Some(n) => format!("Searching for more leads... Expanding search to find up to {n} businesses."),
        None => "Searching for more leads... Expanding search to find more businesses.".to_string(),
    }
}

pub struct UnlockCoordinator {
    client: Arc<dyn SearchClient>,
    store: Arc<SessionStore>,
    paginator: Arc<PreviewPaginator>,
    poller: Arc<JobPoller>,
}

impl UnlockCoordinator {
    pub fn new(
        client: Arc<dyn SearchClient>,
        store: Arc<SessionStore>,
        paginator: Arc<PreviewPaginator>,
        poller: Arc<JobPoller>,
    ) -> Self {
        Self {
            client,
            store,
            paginator,
            poller,
        }
    }

    /// Unlock `batch_size` rows of the active search.
    pub async fn unlock(&self, search_id: SearchId, batch_size: u64) -> Result<UnlockOutcome> {
        let session = self
            .store
            .session()
            .filter(|s| s.id == search_id)
            .ok_or(DiscoveryError::NoActiveSession)?;
        check_batch(&session, batch_size)?;

        let _guard = self.store.begin_unlock()?;
        info!(target: "leadscout::unlock", "Unlocking {} leads of search {}", batch_size, search_id);

        let response = match self.client.unlock(search_id, batch_size).await {
            Ok(response) => response,
            Err(e) => {
                warn!(target: "leadscout::unlock", "Unlock of search {} failed: {}", search_id, e);
                let err = DiscoveryError::UnlockTransport(e);
                self.store.set_error(err.to_string());
                return Err(err);
            }
        };

        self.store.apply_credits(search_id, response.credits_remaining);
        self.store.clear_error();
        self.store.emit(DiscoveryEvent::LeadsUnlocked {
            search_id,
            unlocked: response.unlocked,
            credits_remaining: response.credits_remaining,
        });
        info!(
            target: "leadscout::unlock",
            "Unlocked {} leads of search {} ({} credits left)",
            response.unlocked,
            search_id,
            response.credits_remaining
        );

        let preview = match self.paginator.refresh_after_unlock(search_id).await {
            Ok(page) => Some(page),
            Err(DiscoveryError::Superseded(_)) => None,
            Err(e) => {
                self.store.set_error(e.to_string());
                None
            }
        };

        let new_max_places = response.new_max_places();
        let deepening = if response.deepening_triggered {
            let pointer = DeepeningPointer {
                search_id,
                query_text: session.query_text.clone(),
            };
            if let Err(e) = self
                .store
                .begin_deepening(pointer.clone(), deepening_notice(new_max_places))
            {
                warn!(target: "leadscout::unlock", "Could not persist deepening pointer: {}", e);
            }
            self.poller.start(search_id, PollMode::Background);
            info!(
                target: "leadscout::unlock",
                "Backend expanding search {} to {:?} places",
                search_id,
                new_max_places
            );
            self.store.emit(DiscoveryEvent::DeepeningStarted {
                search_id,
                new_max_places,
            });
            Some(pointer)
        } else {
            None
        };

        Ok(UnlockOutcome {
            search_id,
            unlocked: response.unlocked,
            credits_used: response.credits_used,
            credits_remaining: response.credits_remaining,
            deepening,
            new_max_places,
            preview,
            message: response.message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use leadscout_types::SearchStatus;
    use proptest::prelude::*;

    fn session(unique: u64, unlocked: u64, credits: u64, sizes: &[u64]) -> SearchSession {
        SearchSession {
            id: SearchId(1),
            query_text: "plumbers".into(),
            location_text: "Austin".into(),
            status: SearchStatus::Succeeded,
            unique_records: unique,
            unlocked_count: unlocked,
            credits_balance: credits,
            unlock_batch_sizes: sizes.to_vec(),
            progress: 100.0,
        }
    }

    #[test]
    fn test_default_batch_respects_credits() {
        let s = session(120, 0, 40, &[25, 50, 75, 100]);
        assert_eq!(compute_default_batch(&s), Some(25));
    }

    #[test]
    fn test_default_batch_sorts_sizes() {
        let s = session(120, 0, 500, &[100, 50, 25]);
        assert_eq!(compute_default_batch(&s), Some(25));
    }

    #[test]
    fn test_default_batch_unlocks_remaining() {
        let s = session(110, 100, 40, &[25, 50]);
        assert_eq!(compute_default_batch(&s), Some(10));

        let capped = session(110, 90, 5, &[25, 50]);
        assert_eq!(compute_default_batch(&capped), Some(5));
    }

    #[test]
    fn test_default_batch_without_sizes() {
        let s = session(7, 0, 100, &[]);
        assert_eq!(compute_default_batch(&s), Some(7));
    }

    #[test]
    fn test_default_batch_none() {
        assert_eq!(compute_default_batch(&session(120, 120, 40, &[25])), None);
        assert_eq!(compute_default_batch(&session(120, 0, 0, &[25])), None);
        // Enough inventory for a batch but not enough credits
        assert_eq!(compute_default_batch(&session(120, 0, 10, &[25, 50])), None);
    }

    #[test]
    fn test_check_batch_order() {
        let s = session(30, 0, 20, &[25]);
        assert!(matches!(check_batch(&s, 0), Err(DiscoveryError::Validation(_))));
        assert!(matches!(
            check_batch(&s, 40),
            Err(DiscoveryError::InsufficientInventory { requested: 40, available: 30 })
        ));
        assert!(matches!(
            check_batch(&s, 25),
            Err(DiscoveryError::InsufficientCredits { requested: 25, balance: 20 })
        ));
        assert!(check_batch(&s, 20).is_ok());
    }

    #[test]
    fn test_deepening_notice_text() {
        assert_eq!(
            deepening_notice(Some(200)),
            "Searching for more leads... Expanding search to find up to 200 businesses."
        );
        assert!(deepening_notice(None).contains("more businesses"));
    }

    proptest! {
        #[test]
        fn default_batch_never_exceeds_limits(
            unique in 0u64..1000,
            unlocked in 0u64..1000,
            credits in 0u64..1000,
            sizes in proptest::collection::vec(0u64..200, 0..6),
        ) {
            let s = session(unique, unlocked.min(unique), credits, &sizes);
            if let Some(batch) = compute_default_batch(&s) {
                prop_assert!(batch > 0);
                prop_assert!(batch <= s.available_to_unlock());
                prop_assert!(batch <= credits);
                prop_assert!(check_batch(&s, batch).is_ok());
            }
        }
    }
}
