//! Past searches, listed and filtered client-side.

use crate::client::SearchClient;
use crate::controller::DiscoverySessionController;
use crate::{DiscoveryError, Result};
use leadscout_types::{HistoryEntry, HistoryFilter, SearchId};
use std::sync::{Arc, RwLock};
use tracing::{debug, warn};

/// Holds a snapshot of the history listing.
///
/// The snapshot is never authoritative for the active session; resuming an
/// entry hands it to the controller, which takes over from there.
pub struct HistoryResolver {
    client: Arc<dyn SearchClient>,
    per_page: u32,
    entries: RwLock<Vec<HistoryEntry>>,
}

impl HistoryResolver {
    pub fn new(client: Arc<dyn SearchClient>, per_page: u32) -> Self {
        Self {
            client,
            per_page: per_page.max(1),
            entries: RwLock::new(Vec::new()),
        }
    }

    /// Re-fetch the snapshot. On failure the previous snapshot is kept.
    pub async fn refresh(&self) -> Result<usize> {
        let response = self
            .client
            .history(1, self.per_page)
            .await
            .map_err(|e| {
                warn!(target: "leadscout::history", "History load failed: {}", e);
                DiscoveryError::HistoryLoad(e)
            })?;

        let count = response.items.len();
        *self.entries.write().unwrap_or_else(|e| e.into_inner()) = response.items;
        debug!(target: "leadscout::history", "History snapshot has {} entries", count);
        Ok(count)
    }

    pub fn entries(&self) -> Vec<HistoryEntry> {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Entries matching both the status category and the text filter.
    pub fn list(&self, filter: &HistoryFilter) -> Vec<HistoryEntry> {
        self.entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|entry| filter.matches(entry))
            .cloned()
            .collect()
    }

    pub fn find(&self, search_id: SearchId) -> Option<HistoryEntry> {
        self.entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .find(|entry| entry.search_id == search_id)
            .cloned()
    }

    /// Resume a listed search through the controller.
    pub async fn resume(
        &self,
        controller: &DiscoverySessionController,
        search_id: SearchId,
    ) -> Result<()> {
        let entry = self
            .find(search_id)
            .ok_or(DiscoveryError::HistoryEntryNotFound(search_id))?;
        controller.resume_from_history(&entry).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ApiError;
    use async_trait::async_trait;
    use chrono::Utc;
    use leadscout_types::{
        HistoryResponse, Pagination, PreviewResponse, SearchStatus, SearchStatusResponse,
        StartSearchRequest, StartSearchResponse, StatusCategory, UnlockResponse,
    };
    use proptest::prelude::*;

    fn entry(id: i64, query: &str, location: &str, status: SearchStatus, available: u64) -> HistoryEntry {
        HistoryEntry {
            search_id: SearchId(id),
            query_text: query.into(),
            location_text: location.into(),
            location_latitude: None,
            location_longitude: None,
            status,
            unique_records: available,
            unlocked_count: 0,
            available_to_unlock: available,
            created_at: Utc::now(),
            last_accessed_at: Utc::now(),
        }
    }

    struct HistoryOnly {
        items: Vec<HistoryEntry>,
        fail: bool,
    }

    #[async_trait]
    impl SearchClient for HistoryOnly {
        async fn start(&self, _: &StartSearchRequest) -> std::result::Result<StartSearchResponse, ApiError> {
            Err(ApiError::Decode("unused".into()))
        }

        async fn status(&self, _: SearchId) -> std::result::Result<SearchStatusResponse, ApiError> {
            Err(ApiError::Decode("unused".into()))
        }

        async fn preview(&self, _: SearchId, _: u32, _: u32) -> std::result::Result<PreviewResponse, ApiError> {
            Err(ApiError::Decode("unused".into()))
        }

        async fn unlock(&self, _: SearchId, _: u64) -> std::result::Result<UnlockResponse, ApiError> {
            Err(ApiError::Decode("unused".into()))
        }

        async fn history(&self, _: u32, _: u32) -> std::result::Result<HistoryResponse, ApiError> {
            if self.fail {
                return Err(ApiError::Http {
                    status: 500,
                    message: "Server error. Please try again later.".into(),
                });
            }
            Ok(HistoryResponse {
                items: self.items.clone(),
                pagination: Pagination::default(),
            })
        }
    }

    fn resolver(items: Vec<HistoryEntry>) -> HistoryResolver {
        HistoryResolver::new(Arc::new(HistoryOnly { items, fail: false }), 100)
    }

    #[tokio::test]
    async fn test_has_available_filter() {
        let resolver = resolver(vec![
            entry(1, "plumbers", "Austin, TX", SearchStatus::Succeeded, 0),
            entry(2, "roofers", "Dallas, TX", SearchStatus::Succeeded, 12),
            entry(3, "bakers", "Austin, TX", SearchStatus::Succeeded, 0),
        ]);
        assert_eq!(resolver.refresh().await.unwrap(), 3);

        let found = resolver.list(&HistoryFilter::new(StatusCategory::HasAvailable, ""));
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].search_id, SearchId(2));

        let none = resolver.list(&HistoryFilter::new(StatusCategory::HasAvailable, "dentists"));
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_text_filter_matches_location() {
        let resolver = resolver(vec![
            entry(1, "plumbers", "Austin, TX", SearchStatus::Running, 0),
            entry(2, "roofers", "Dallas, TX", SearchStatus::Succeeded, 5),
        ]);
        resolver.refresh().await.unwrap();

        let found = resolver.list(&HistoryFilter::new(StatusCategory::All, "  AUSTIN "));
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].query_text, "plumbers");

        let running = resolver.list(&HistoryFilter::new(StatusCategory::Running, ""));
        assert_eq!(running.len(), 1);
        assert_eq!(running[0].search_id, SearchId(1));
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_snapshot() {
        let resolver = HistoryResolver::new(Arc::new(HistoryOnly { items: vec![], fail: true }), 100);
        assert!(matches!(resolver.refresh().await, Err(DiscoveryError::HistoryLoad(_))));
        assert!(resolver.entries().is_empty());
        assert!(resolver.find(SearchId(1)).is_none());
    }

    proptest! {
        #[test]
        fn filtered_list_is_subset(
            availables in proptest::collection::vec(0u64..20, 0..12),
            text in "[a-z]{0,3}",
        ) {
            let items: Vec<HistoryEntry> = availables
                .iter()
                .enumerate()
                .map(|(i, a)| entry(i as i64, "plumbers", "Austin", SearchStatus::Succeeded, *a))
                .collect();
            let filter = HistoryFilter::new(StatusCategory::HasAvailable, text);
            let resolver = HistoryResolver::new(Arc::new(HistoryOnly { items: items.clone(), fail: false }), 100);
            *resolver.entries.write().unwrap() = items.clone();

            let listed = resolver.list(&filter);
            prop_assert!(listed.len() <= items.len());
            prop_assert!(listed.iter().all(|e| e.available_to_unlock > 0));
            prop_assert_eq!(listed.len(), items.iter().filter(|e| filter.matches(e)).count());
        }
    }
}
