//! Status polling for running searches.
//!
//! The poller owns at most one timer task. Starting a poll for another
//! search aborts the current task first, and every task carries a
//! generation number so a superseded task can never unregister the task
//! that replaced it.

use crate::client::{ApiError, SearchClient};
use crate::events::DiscoveryEvent;
use crate::preview::PreviewPaginator;
use crate::store::{NoticeKind, PollMode, SessionStore, StatusApplied};
use crate::DiscoveryError;
use leadscout_types::{DeepeningPointer, SearchId, SearchStatus};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// What a single status poll did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// Job still running.
    Running,
    /// The search is no longer active; the timer should stop.
    Stale,
    /// Already finished; nothing changed.
    Unchanged,
    /// This poll observed the terminal status.
    Finished(SearchStatus),
}

struct ActivePoll {
    search_id: SearchId,
    mode: PollMode,
    generation: u64,
    handle: JoinHandle<()>,
}

pub struct JobPoller {
    client: Arc<dyn SearchClient>,
    store: Arc<SessionStore>,
    paginator: Arc<PreviewPaginator>,
    interval: Duration,
    active: Mutex<Option<ActivePoll>>,
    generation: AtomicU64,
}

impl JobPoller {
    pub fn new(
        client: Arc<dyn SearchClient>,
        store: Arc<SessionStore>,
        paginator: Arc<PreviewPaginator>,
        interval: Duration,
    ) -> Self {
        Self {
            client,
            store,
            paginator,
            interval,
            active: Mutex::new(None),
            generation: AtomicU64::new(0),
        }
    }

    fn slot(&self) -> MutexGuard<'_, Option<ActivePoll>> {
        self.active.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Poll `search_id` every interval until it reaches a terminal status.
    ///
    /// If that search is already being polled only its mode changes; any
    /// other running timer is cancelled first.
    pub fn start(self: &Arc<Self>, search_id: SearchId, mode: PollMode) {
        let mut slot = self.slot();

        if let Some(current) = slot.as_mut() {
            if current.search_id == search_id && !current.handle.is_finished() {
                if current.mode != mode {
                    debug!(target: "leadscout::poller", "Search {} now polled in {:?} mode", search_id, mode);
                    current.mode = mode;
                }
                self.store.set_polling(search_id, mode);
                return;
            }
        }

        if let Some(previous) = slot.take() {
            debug!(target: "leadscout::poller", "Cancelling poll for search {}", previous.search_id);
            previous.handle.abort();
            self.store.clear_polling(previous.search_id);
        }

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.store.set_polling(search_id, mode);

        let poller = Arc::clone(self);
        let handle = tokio::spawn(async move { poller.run(search_id, generation).await });

        info!(
            target: "leadscout::poller",
            "Polling search {} every {:?} ({:?})",
            search_id,
            self.interval,
            mode
        );
        *slot = Some(ActivePoll {
            search_id,
            mode,
            generation,
            handle,
        });
    }

    /// Stop polling `search_id`. Safe to call when it is not being polled.
    pub fn stop(&self, search_id: SearchId) {
        let mut slot = self.slot();
        if slot.as_ref().is_some_and(|a| a.search_id == search_id) {
            if let Some(active) = slot.take() {
                debug!(target: "leadscout::poller", "Stopped polling search {}", search_id);
                active.handle.abort();
            }
            self.store.clear_polling(search_id);
        }
    }

    /// Stop the timer only if it is a foreground one.
    pub fn stop_foreground(&self) -> Option<SearchId> {
        let mut slot = self.slot();
        if !slot.as_ref().is_some_and(|a| a.mode == PollMode::Foreground) {
            return None;
        }
        let active = slot.take()?;
        active.handle.abort();
        self.store.clear_polling(active.search_id);
        debug!(target: "leadscout::poller", "Stopped foreground poll for search {}", active.search_id);
        Some(active.search_id)
    }

    /// Stop whatever timer is running.
    pub fn stop_all(&self) {
        if let Some(active) = self.slot().take() {
            active.handle.abort();
            self.store.clear_polling(active.search_id);
        }
    }

    /// The live timer, if any.
    pub fn active(&self) -> Option<(SearchId, PollMode)> {
        self.slot()
            .as_ref()
            .filter(|a| !a.handle.is_finished())
            .map(|a| (a.search_id, a.mode))
    }

    /// Number of live timers; never more than one.
    pub fn live_timers(&self) -> usize {
        usize::from(self.active().is_some())
    }

    pub fn is_polling(&self, search_id: SearchId) -> bool {
        self.active().is_some_and(|(id, _)| id == search_id)
    }

    fn mode_for(&self, search_id: SearchId) -> Option<PollMode> {
        self.slot()
            .as_ref()
            .filter(|a| a.search_id == search_id)
            .map(|a| a.mode)
    }

    fn finish(&self, generation: u64) {
        let mut slot = self.slot();
        if slot.as_ref().is_some_and(|a| a.generation == generation) {
            *slot = None;
        }
    }

    async fn run(self: Arc<Self>, search_id: SearchId, generation: u64) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            match self.poll_once(search_id).await {
                Ok(PollOutcome::Running) => {}
                Ok(PollOutcome::Stale) => {
                    debug!(target: "leadscout::poller", "Search {} superseded, stopping timer", search_id);
                    break;
                }
                Ok(PollOutcome::Unchanged) | Ok(PollOutcome::Finished(_)) => break,
                Err(e) => {
                    warn!(
                        target: "leadscout::poller",
                        "Status poll for search {} failed, retrying next interval: {}",
                        search_id,
                        e
                    );
                }
            }
        }

        self.finish(generation);
    }

    /// Run one status poll for `search_id` and apply it.
    ///
    /// Completion side effects (preview load, notices, events) happen only on
    /// the poll that observes the terminal status.
    pub async fn poll_once(&self, search_id: SearchId) -> Result<PollOutcome, ApiError> {
        let response = self.client.status(search_id).await?;
        let mode = self.mode_for(search_id);

        match self.store.apply_status(search_id, &response) {
            StatusApplied::Stale => Ok(PollOutcome::Stale),
            StatusApplied::Unchanged => Ok(PollOutcome::Unchanged),
            StatusApplied::Progress => {
                self.emit_status(&response);
                Ok(PollOutcome::Running)
            }
            StatusApplied::Completed { status, deepening } => {
                self.emit_status(&response);
                let background = deepening.is_some() || mode == Some(PollMode::Background);
                self.complete(search_id, status, deepening, background).await;
                Ok(PollOutcome::Finished(status))
            }
        }
    }

    fn emit_status(&self, response: &leadscout_types::SearchStatusResponse) {
        self.store.emit(DiscoveryEvent::StatusUpdated {
            search_id: response.search_id,
            status: response.status,
            unique_records: response.unique_records,
            unlocked_count: response.unlocked_count,
            progress: response.progress,
        });
    }

    async fn complete(
        &self,
        search_id: SearchId,
        status: SearchStatus,
        deepening: Option<DeepeningPointer>,
        background: bool,
    ) {
        let query_text = deepening
            .map(|p| p.query_text)
            .or_else(|| self.store.session().map(|s| s.query_text))
            .unwrap_or_default();

        if status == SearchStatus::Succeeded {
            // Also lifts a foreground overlay left over a deepening search
            self.store.mark_ready(search_id);
            match self.paginator.load_page(search_id, 1).await {
                Ok(_) => {}
                Err(DiscoveryError::Superseded(_)) => return,
                Err(e) => self.store.set_error(e.to_string()),
            }

            if background {
                info!(target: "leadscout::poller", "Background search {} for '{}' found more leads", search_id, query_text);
                self.store
                    .set_notice(NoticeKind::Success, "Found more leads! Preview updated.");
                self.store.emit(DiscoveryEvent::DeepeningFinished {
                    search_id,
                    succeeded: true,
                    query_text,
                });
            } else {
                let unique_records = self.store.session().map(|s| s.unique_records).unwrap_or(0);
                info!(target: "leadscout::poller", "Search {} succeeded with {} records", search_id, unique_records);
                self.store.emit(DiscoveryEvent::SearchCompleted {
                    search_id,
                    unique_records,
                });
            }
            return;
        }

        if background {
            warn!(target: "leadscout::poller", "Background search {} ended with {}", search_id, status);
            self.store.set_notice(
                NoticeKind::Warning,
                "Search for more leads failed. You can continue with existing results.",
            );
            self.store.emit(DiscoveryEvent::DeepeningFinished {
                search_id,
                succeeded: false,
                query_text,
            });
        } else {
            warn!(target: "leadscout::poller", "Search {} ended with {}", search_id, status);
            let message = format!("Search {}. Please try again.", status.as_str().to_lowercase());
            self.store.mark_failed(search_id, message);
            self.store.emit(DiscoveryEvent::SearchFailed { search_id, status });
        }
    }
}
