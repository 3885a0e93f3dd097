//! Paginated preview of search results.

use crate::client::SearchClient;
use crate::events::DiscoveryEvent;
use crate::store::SessionStore;
use crate::{DiscoveryError, Result};
use dashmap::DashMap;
use leadscout_types::{PreviewPage, SearchId};
use std::sync::Arc;
use tracing::{debug, warn};

/// Fetches preview pages and caches them per (search, page).
pub struct PreviewPaginator {
    client: Arc<dyn SearchClient>,
    store: Arc<SessionStore>,
    cache: DashMap<(SearchId, u32), PreviewPage>,
    per_page: u32,
}

impl PreviewPaginator {
    pub fn new(client: Arc<dyn SearchClient>, store: Arc<SessionStore>, per_page: u32) -> Self {
        Self {
            client,
            store,
            cache: DashMap::new(),
            per_page: per_page.max(1),
        }
    }

    pub fn per_page(&self) -> u32 {
        self.per_page
    }

    /// Fetch one page and apply its session scalars.
    ///
    /// The preview endpoint is authoritative for counts, batches and credits.
    pub async fn load(&self, search_id: SearchId, page: u32, per_page: u32) -> Result<PreviewPage> {
        let page = page.max(1);
        let response = match self.client.preview(search_id, page, per_page).await {
            Ok(response) => response,
            Err(e) => {
                warn!(target: "leadscout::preview", "Preview load failed for search {} page {}: {}", search_id, page, e);
                return Err(DiscoveryError::PreviewLoad(e));
            }
        };

        if !self.store.apply_preview(search_id, &response, page) {
            debug!(target: "leadscout::preview", "Discarding preview for superseded search {}", search_id);
            return Err(DiscoveryError::Superseded(search_id));
        }

        let loaded = PreviewPage::from(&response);
        self.cache.retain(|(id, _), _| *id == search_id);
        self.cache.insert((search_id, page), loaded.clone());

        debug!(
            target: "leadscout::preview",
            "Loaded page {} of search {} ({} rows, {} available)",
            page,
            search_id,
            loaded.items.len(),
            response.unique_records.saturating_sub(response.unlocked_count)
        );
        self.store.emit(DiscoveryEvent::PreviewLoaded {
            search_id,
            page,
            items: loaded.items.len(),
        });
        Ok(loaded)
    }

    /// Load with the configured page size.
    pub async fn load_page(&self, search_id: SearchId, page: u32) -> Result<PreviewPage> {
        self.load(search_id, page, self.per_page).await
    }

    /// Cached page, if it was loaded and not invalidated since.
    pub fn cached(&self, search_id: SearchId, page: u32) -> Option<PreviewPage> {
        self.cache.get(&(search_id, page)).map(|entry| entry.value().clone())
    }

    /// Cached page, or fetch it.
    pub async fn get_or_load(&self, search_id: SearchId, page: u32) -> Result<PreviewPage> {
        match self.cached(search_id, page) {
            Some(page) => Ok(page),
            None => self.load_page(search_id, page).await,
        }
    }

    /// Drop every cached page of `search_id`.
    pub fn invalidate(&self, search_id: SearchId) {
        self.cache.retain(|(id, _), _| *id != search_id);
    }

    pub fn clear(&self) {
        self.cache.clear();
    }

    /// Unlocked rows cannot be told apart across pages without a refresh, so
    /// an unlock drops the cache and starts again from page 1.
    pub async fn refresh_after_unlock(&self, search_id: SearchId) -> Result<PreviewPage> {
        self.invalidate(search_id);
        self.load_page(search_id, 1).await
    }
}
