//! The discovery surface state machine.
//!
//! [`DiscoverySessionController`] wires the store, poller, paginator, unlock
//! coordinator and history together and turns user intents into calls on
//! them. Rendering reads [`DiscoveryView`]s and listens for
//! [`DiscoveryEvent`]s.

use crate::client::SearchClient;
use crate::events::DiscoveryEvent;
use crate::history::HistoryResolver;
use crate::pointer::PointerStore;
use crate::poller::JobPoller;
use crate::preview::PreviewPaginator;
use crate::store::{Notice, Phase, PollMode, SessionStore};
use crate::unlock::{compute_default_batch, UnlockCoordinator, UnlockOutcome};
use crate::{DiscoveryError, Result};
use leadscout_types::{
    DeepeningPointer, HistoryEntry, PreviewPage, SearchForm, SearchId, SearchSession, SearchStatus,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

const RESUME_NOTICE: &str = "Searching for more leads... Please wait.";

/// Tunables of the discovery engine.
#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    pub poll_interval: Duration,
    pub preview_per_page: u32,
    pub history_per_page: u32,
    /// How long success and warning notices stay visible.
    pub notice_ttl: Duration,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(3000),
            preview_per_page: 20,
            history_per_page: 100,
            notice_ttl: Duration::from_secs(5),
        }
    }
}

/// Everything needed to render the discovery surface.
#[derive(Debug, Clone)]
pub struct DiscoveryView {
    pub phase: Phase,
    /// Blocking "searching" overlay; only for foreground polls.
    pub searching: bool,
    /// A deepening re-search is running behind the visible results.
    pub background_search: bool,
    pub show_form: bool,
    pub form: SearchForm,
    pub session: Option<SearchSession>,
    pub preview: Option<PreviewPage>,
    pub default_batch: Option<u64>,
    pub unlock_enabled: bool,
    pub notice: Option<Notice>,
    pub error: Option<String>,
}

pub struct DiscoverySessionController {
    store: Arc<SessionStore>,
    paginator: Arc<PreviewPaginator>,
    poller: Arc<JobPoller>,
    unlocker: UnlockCoordinator,
    history: HistoryResolver,
    client: Arc<dyn SearchClient>,
}

impl DiscoverySessionController {
    pub fn new(
        client: Arc<dyn SearchClient>,
        pointers: Arc<dyn PointerStore>,
        config: DiscoveryConfig,
    ) -> Self {
        let store = Arc::new(SessionStore::new(pointers, config.notice_ttl));
        let paginator = Arc::new(PreviewPaginator::new(
            client.clone(),
            store.clone(),
            config.preview_per_page,
        ));
        let poller = Arc::new(JobPoller::new(
            client.clone(),
            store.clone(),
            paginator.clone(),
            config.poll_interval,
        ));
        let unlocker = UnlockCoordinator::new(
            client.clone(),
            store.clone(),
            paginator.clone(),
            poller.clone(),
        );
        let history = HistoryResolver::new(client.clone(), config.history_per_page);

        Self {
            store,
            paginator,
            poller,
            unlocker,
            history,
            client,
        }
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    pub fn poller(&self) -> &Arc<JobPoller> {
        &self.poller
    }

    pub fn paginator(&self) -> &Arc<PreviewPaginator> {
        &self.paginator
    }

    pub fn history(&self) -> &HistoryResolver {
        &self.history
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DiscoveryEvent> {
        self.store.subscribe()
    }

    /// Show an empty search form.
    pub fn open_form(&self) {
        self.store.open_form();
    }

    /// Start (or resume on the backend) a search for `form`.
    pub async fn submit_search(&self, form: SearchForm) -> Result<SearchSession> {
        let request = match form.to_request() {
            Ok(request) => request,
            Err(e) => {
                let previous = self.store.phase();
                self.store.set_form(form);
                self.reject_submit(previous, e.to_string());
                return Err(e.into());
            }
        };

        // The current search stays untouched until the backend accepts this one
        let previous = self.store.phase();
        self.store.begin_submit(form);
        info!(target: "leadscout::session", "Starting search for '{}'", request.search_keywords);

        let response = match self.client.start(&request).await {
            Ok(response) => response,
            Err(e) => {
                warn!(target: "leadscout::session", "Search start failed: {}", e);
                let err = DiscoveryError::StartTransport(e);
                self.reject_submit(previous, err.to_string());
                return Err(err);
            }
        };

        let session = SearchSession::from_start(&response, &request.search_keywords);
        let search_id = session.id;
        debug!(
            target: "leadscout::session",
            "Search {} started (new: {}, status {})",
            search_id,
            response.is_new_search,
            response.status
        );

        match response.status {
            SearchStatus::Succeeded => {
                self.abandon_current();
                self.store.activate(session.clone(), Phase::PreviewReady);
                self.load_first_page(search_id).await;
                self.store.emit(DiscoveryEvent::SearchCompleted {
                    search_id,
                    unique_records: self.store.session().map_or(session.unique_records, |s| s.unique_records),
                });
            }
            SearchStatus::Running => {
                self.abandon_current();
                self.store.activate(session.clone(), Phase::Polling);
                self.poller.start(search_id, PollMode::Foreground);
            }
            status => {
                let err = DiscoveryError::SearchStart { search_id, status };
                self.reject_submit(previous, err.to_string());
                return Err(err);
            }
        }

        Ok(self.store.session().unwrap_or(session))
    }

    /// Unlock `batch_size` rows, or the default batch when `None`.
    pub async fn request_unlock(&self, batch_size: Option<u64>) -> Result<UnlockOutcome> {
        let snapshot = self.store.snapshot();
        let session = match (snapshot.phase, snapshot.session) {
            (Phase::PreviewReady, Some(session)) => session,
            _ => return Err(DiscoveryError::NoActiveSession),
        };

        let batch_size = match batch_size.or_else(|| compute_default_batch(&session)) {
            Some(size) => size,
            None if session.available_to_unlock() == 0 => {
                return Err(DiscoveryError::Validation("No leads left to unlock".into()));
            }
            None => {
                let smallest = session.unlock_batch_sizes.iter().copied().filter(|s| *s > 0).min();
                let requested = smallest
                    .unwrap_or(1)
                    .min(session.available_to_unlock())
                    .max(1);
                return Err(DiscoveryError::InsufficientCredits {
                    requested,
                    balance: session.credits_balance,
                });
            }
        };

        let outcome = self.unlocker.unlock(session.id, batch_size).await?;

        if let Err(e) = self.history.refresh().await {
            debug!(target: "leadscout::session", "History refresh after unlock failed: {}", e);
        }
        Ok(outcome)
    }

    /// Make a history entry the active session.
    pub async fn resume_from_history(&self, entry: &HistoryEntry) -> Result<()> {
        let search_id = entry.search_id;
        let deepening = self.store.deepening().filter(|p| p.search_id == search_id);

        match deepening {
            // Still re-searching: keep the results up and the poll in the background
            Some(pointer) if entry.status == SearchStatus::Running => {
                info!(target: "leadscout::session", "Search {} is still searching for more leads", search_id);
                self.store.rehydrate_deepening(&pointer, RESUME_NOTICE);
                self.poller.start(search_id, PollMode::Background);
                return self.load_page_inline(search_id, 1).await.map(|_| ());
            }
            Some(_) => {}
            None => self.abandon_current(),
        }

        let form = SearchForm::from_history(&entry.query_text, &entry.location_text);
        let session = SearchSession::from_history(entry);
        info!(target: "leadscout::session", "Resuming search {} ({}) from history", search_id, entry.status);

        match entry.status {
            SearchStatus::Running => {
                self.store.set_form(form);
                self.store.activate(session, Phase::Polling);
                self.poller.start(search_id, PollMode::Foreground);
                Ok(())
            }
            SearchStatus::Succeeded => {
                self.store.set_form(form);
                self.store.activate(session, Phase::PreviewReady);
                if entry.unique_records > 0 {
                    self.load_page_inline(search_id, 1).await.map(|_| ())
                } else {
                    Ok(())
                }
            }
            status if status.is_failure() => {
                self.store.set_form(form);
                self.store.activate(session, Phase::Failed);
                self.store.mark_failed(
                    search_id,
                    format!("Search {}. Please try again.", status.as_str().to_lowercase()),
                );
                Ok(())
            }
            _ => {
                self.store.open_form();
                self.store.set_form(form);
                Ok(())
            }
        }
    }

    /// The surface is going away.
    ///
    /// Foreground polling always stops. A running deepening search keeps
    /// polling in the background and its pointer is persisted; otherwise the
    /// session is cleared.
    pub fn teardown(&self) {
        if let Some(id) = self.poller.stop_foreground() {
            debug!(target: "leadscout::session", "Teardown cancelled foreground poll of search {}", id);
        }

        match self.store.deepening() {
            Some(pointer) => {
                if let Err(e) = self.store.persist_pointer() {
                    warn!(target: "leadscout::session", "Failed to persist deepening pointer: {}", e);
                }
                info!(
                    target: "leadscout::session",
                    "Surface closed; search {} keeps running in the background",
                    pointer.search_id
                );
            }
            None => {
                self.store.reset();
                self.paginator.clear();
            }
        }
    }

    /// The surface was reopened. Picks up a persisted deepening search, or
    /// shows an empty form when there is none.
    pub async fn resume(&self) -> Result<Option<DeepeningPointer>> {
        let Some(pointer) = self.store.load_pointer()? else {
            self.store.open_form();
            return Ok(None);
        };

        info!(
            target: "leadscout::session",
            "Resuming background search {} for '{}'",
            pointer.search_id,
            pointer.query_text
        );
        self.store.rehydrate_deepening(&pointer, RESUME_NOTICE);
        self.poller.start(pointer.search_id, PollMode::Background);
        self.load_first_page(pointer.search_id).await;
        Ok(Some(pointer))
    }

    /// Load a preview page of the active search.
    pub async fn load_page(&self, page: u32) -> Result<PreviewPage> {
        let search_id = self.store.active_id().ok_or(DiscoveryError::NoActiveSession)?;
        self.load_page_inline(search_id, page).await
    }

    pub async fn next_page(&self) -> Result<PreviewPage> {
        let (search_id, page) = self.current_page()?;
        if let Some(cached) = self.paginator.cached(search_id, page) {
            if !cached.pagination.has_next {
                return Ok(cached);
            }
        }
        self.load_page_inline(search_id, page + 1).await
    }

    pub async fn prev_page(&self) -> Result<PreviewPage> {
        let (search_id, page) = self.current_page()?;
        if page <= 1 {
            return match self.paginator.cached(search_id, 1) {
                Some(cached) => Ok(cached),
                None => self.load_page_inline(search_id, 1).await,
            };
        }
        self.load_page_inline(search_id, page - 1).await
    }

    pub fn dismiss_notice(&self) {
        self.store.dismiss_notice();
    }

    pub fn view(&self) -> DiscoveryView {
        let snapshot = self.store.snapshot();
        let preview = snapshot
            .session
            .as_ref()
            .and_then(|s| self.paginator.cached(s.id, snapshot.preview_page));
        let default_batch = snapshot.session.as_ref().and_then(compute_default_batch);

        DiscoveryView {
            phase: snapshot.phase,
            searching: snapshot.phase == Phase::Polling,
            background_search: snapshot.polling == Some(PollMode::Background)
                || snapshot.deepening.is_some(),
            show_form: matches!(
                snapshot.phase,
                Phase::Idle | Phase::FormInput | Phase::Submitting
            ),
            form: snapshot.form,
            unlock_enabled: snapshot.phase == Phase::PreviewReady
                && !snapshot.unlock_in_flight
                && default_batch.is_some(),
            default_batch,
            session: snapshot.session,
            preview,
            notice: snapshot.notice,
            error: snapshot.error,
        }
    }

    fn current_page(&self) -> Result<(SearchId, u32)> {
        let search_id = self.store.active_id().ok_or(DiscoveryError::NoActiveSession)?;
        Ok((search_id, self.store.preview_page()))
    }

    /// A submit that never started leaves the current search where it was.
    fn reject_submit(&self, previous: Phase, message: String) {
        let keeps_session = self.store.active_id().is_some()
            && matches!(previous, Phase::Polling | Phase::PreviewReady | Phase::Failed);
        if !keeps_session {
            self.store.fail_submit(message);
            return;
        }
        if self.store.phase() == Phase::Submitting {
            self.store.set_phase(previous);
        }
        self.store.set_error(message);
    }

    /// Stop polling and forget any deepening search before another search
    /// takes over.
    fn abandon_current(&self) {
        self.poller.stop_all();
        self.store.clear_deepening();
        self.paginator.clear();
    }

    async fn load_page_inline(&self, search_id: SearchId, page: u32) -> Result<PreviewPage> {
        match self.paginator.load_page(search_id, page).await {
            Ok(loaded) => {
                self.store.clear_error();
                Ok(loaded)
            }
            Err(e) => {
                if !matches!(e, DiscoveryError::Superseded(_)) {
                    self.store.set_error(e.to_string());
                }
                Err(e)
            }
        }
    }

    async fn load_first_page(&self, search_id: SearchId) {
        if let Err(e) = self.load_page_inline(search_id, 1).await {
            debug!(target: "leadscout::session", "First preview page of search {} not loaded: {}", search_id, e);
        }
    }
}
