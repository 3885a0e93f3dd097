//! Canonical state of the active discovery session.
//!
//! The store holds exactly one live [`SearchSession`] and mirrors the durable
//! [`DeepeningPointer`] kept in a [`PointerStore`]. Every mutation that comes
//! from a network response names the search id it belongs to and is dropped
//! when that id is no longer the active one.

use crate::events::DiscoveryEvent;
use crate::pointer::PointerStore;
use crate::{DiscoveryError, Result};
use leadscout_types::{
    DeepeningPointer, PreviewResponse, SearchForm, SearchId, SearchSession, SearchStatus,
    SearchStatusResponse,
};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Where the discovery surface is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Surface not opened yet, or fully torn down.
    Idle,
    FormInput,
    Submitting,
    /// Foreground polling; the surface shows a blocking "searching" state.
    Polling,
    PreviewReady,
    /// The search ended in a terminal failure.
    Failed,
}

/// How a poller presents itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollMode {
    Foreground,
    /// Deepening re-search; results stay visible while it runs.
    Background,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Progress,
    Success,
    Warning,
}

/// Non-blocking, dismissible status message.
#[derive(Debug, Clone, PartialEq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub text: String,
    expires_at: Option<Instant>,
}

impl Notice {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

/// Result of applying a status poll.
#[derive(Debug, Clone, PartialEq)]
pub enum StatusApplied {
    /// The id is not the active session; nothing was touched.
    Stale,
    /// Counters updated, job still running.
    Progress,
    /// Terminal again for a session that already finished.
    Unchanged,
    /// This poll finished the search (or its deepening re-search).
    Completed {
        status: SearchStatus,
        deepening: Option<DeepeningPointer>,
    },
}

/// Point-in-time copy of the store for rendering.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub phase: Phase,
    pub form: SearchForm,
    pub session: Option<SearchSession>,
    pub polling: Option<PollMode>,
    pub deepening: Option<DeepeningPointer>,
    pub unlock_in_flight: bool,
    pub notice: Option<Notice>,
    pub error: Option<String>,
    pub preview_page: u32,
}

struct SessionState {
    phase: Phase,
    form: SearchForm,
    session: Option<SearchSession>,
    polling: Option<(SearchId, PollMode)>,
    deepening: Option<DeepeningPointer>,
    unlock_in_flight: bool,
    notice: Option<Notice>,
    error: Option<String>,
    preview_page: u32,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            phase: Phase::Idle,
            form: SearchForm::default(),
            session: None,
            polling: None,
            deepening: None,
            unlock_in_flight: false,
            notice: None,
            error: None,
            preview_page: 1,
        }
    }
}

impl SessionState {
    fn active(&mut self, id: SearchId) -> Option<&mut SearchSession> {
        self.session.as_mut().filter(|s| s.id == id)
    }
}

pub struct SessionStore {
    state: RwLock<SessionState>,
    pointers: Arc<dyn PointerStore>,
    events: broadcast::Sender<DiscoveryEvent>,
    notice_ttl: Duration,
}

impl SessionStore {
    pub fn new(pointers: Arc<dyn PointerStore>, notice_ttl: Duration) -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            state: RwLock::new(SessionState::default()),
            pointers,
            events,
            notice_ttl,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, SessionState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, SessionState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DiscoveryEvent> {
        self.events.subscribe()
    }

    pub(crate) fn emit(&self, event: DiscoveryEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let now = Instant::now();
        let state = self.read();
        let active = state.session.as_ref().map(|s| s.id);
        SessionSnapshot {
            phase: state.phase,
            form: state.form.clone(),
            session: state.session.clone(),
            polling: state
                .polling
                .filter(|(id, _)| Some(*id) == active)
                .map(|(_, mode)| mode),
            deepening: state.deepening.clone(),
            unlock_in_flight: state.unlock_in_flight,
            notice: state.notice.clone().filter(|n| !n.is_expired(now)),
            error: state.error.clone(),
            preview_page: state.preview_page,
        }
    }

    pub fn active_id(&self) -> Option<SearchId> {
        self.read().session.as_ref().map(|s| s.id)
    }

    pub fn session(&self) -> Option<SearchSession> {
        self.read().session.clone()
    }

    pub fn phase(&self) -> Phase {
        self.read().phase
    }

    pub fn form(&self) -> SearchForm {
        self.read().form.clone()
    }

    pub fn set_form(&self, form: SearchForm) {
        self.write().form = form;
    }

    pub fn preview_page(&self) -> u32 {
        self.read().preview_page
    }

    // ---- Lifecycle ---------------------------------------------------------

    /// Show an empty form with no session.
    pub fn open_form(&self) {
        let mut state = self.write();
        *state = SessionState {
            phase: Phase::FormInput,
            ..SessionState::default()
        };
    }

    /// Drop everything held in memory. The durable pointer is untouched.
    pub fn reset(&self) {
        *self.write() = SessionState::default();
    }

    pub fn begin_submit(&self, form: SearchForm) {
        let mut state = self.write();
        state.form = form;
        state.phase = Phase::Submitting;
        state.error = None;
    }

    /// Make `session` the active session, replacing any previous one.
    pub fn activate(&self, session: SearchSession, phase: Phase) {
        let mut state = self.write();
        info!(target: "leadscout::session", "Active search is now {} ({})", session.id, session.status);
        state.session = Some(session);
        state.phase = phase;
        state.error = None;
        state.preview_page = 1;
    }

    pub fn set_phase(&self, phase: Phase) {
        self.write().phase = phase;
    }

    /// Record an inline error without touching the session.
    pub fn set_error(&self, message: impl Into<String>) {
        self.write().error = Some(message.into());
    }

    pub fn clear_error(&self) {
        self.write().error = None;
    }

    /// Return to the form after a failed submit.
    pub fn fail_submit(&self, message: impl Into<String>) {
        let mut state = self.write();
        state.phase = Phase::FormInput;
        state.error = Some(message.into());
    }

    /// Results are ready for `id`. Ignored if `id` was superseded.
    pub fn mark_ready(&self, id: SearchId) -> bool {
        let mut state = self.write();
        if state.active(id).is_none() {
            return false;
        }
        state.phase = Phase::PreviewReady;
        true
    }

    /// The search for `id` ended in a terminal failure.
    pub fn mark_failed(&self, id: SearchId, message: impl Into<String>) -> bool {
        let mut state = self.write();
        if state.active(id).is_none() {
            return false;
        }
        state.phase = Phase::Failed;
        state.error = Some(message.into());
        true
    }

    // ---- Responses ---------------------------------------------------------

    /// Apply a status poll for `id`.
    ///
    /// Session status is monotonic; a poll that finishes the search, or the
    /// deepening re-search running for it, takes the deepening pointer with it.
    pub fn apply_status(&self, id: SearchId, response: &SearchStatusResponse) -> StatusApplied {
        let mut state = self.write();
        let background = state.polling == Some((id, PollMode::Background));
        let deepening_here = state.deepening.as_ref().is_some_and(|p| p.search_id == id);

        let Some(session) = state.active(id) else {
            debug!(target: "leadscout::session", "Discarding status for superseded search {}", id);
            return StatusApplied::Stale;
        };

        if response.available_to_unlock != response.unique_records.saturating_sub(response.unlocked_count) {
            debug!(
                target: "leadscout::session",
                "Backend available_to_unlock {} disagrees with counts for search {}",
                response.available_to_unlock,
                id
            );
        }

        session.apply_status_counts(response);
        let changed = response.status != SearchStatus::Unknown && session.advance_status(response.status);

        if !response.status.is_terminal() {
            return StatusApplied::Progress;
        }
        if !changed && !background && !deepening_here {
            return StatusApplied::Unchanged;
        }

        let deepening = if deepening_here {
            state.deepening.take()
        } else {
            None
        };
        if deepening.is_some() {
            if let Err(e) = self.pointers.clear() {
                warn!(target: "leadscout::session", "Failed to clear deepening pointer: {}", e);
            }
        }
        if state.polling.is_some_and(|(pid, _)| pid == id) {
            state.polling = None;
        }

        StatusApplied::Completed {
            status: response.status,
            deepening,
        }
    }

    /// Apply the session scalars of a preview page. Returns false if stale.
    pub fn apply_preview(&self, id: SearchId, response: &PreviewResponse, page: u32) -> bool {
        let mut state = self.write();
        let Some(session) = state.active(id) else {
            return false;
        };
        session.apply_preview(response);
        state.preview_page = page;
        true
    }

    /// Apply the balance reported by a successful unlock.
    pub fn apply_credits(&self, id: SearchId, credits_remaining: u64) -> bool {
        let mut state = self.write();
        match state.active(id) {
            Some(session) => {
                session.credits_balance = credits_remaining;
                true
            }
            None => false,
        }
    }

    // ---- Polling flag ------------------------------------------------------

    pub fn set_polling(&self, id: SearchId, mode: PollMode) {
        self.write().polling = Some((id, mode));
    }

    pub fn clear_polling(&self, id: SearchId) {
        let mut state = self.write();
        if state.polling.is_some_and(|(pid, _)| pid == id) {
            state.polling = None;
        }
    }

    // ---- Unlock ------------------------------------------------------------

    /// Claim the single unlock slot; released when the guard drops.
    pub fn begin_unlock(&self) -> Result<UnlockGuard<'_>> {
        let mut state = self.write();
        if state.unlock_in_flight {
            return Err(DiscoveryError::UnlockInFlight);
        }
        state.unlock_in_flight = true;
        Ok(UnlockGuard { store: self })
    }

    // ---- Deepening ---------------------------------------------------------

    /// Record and persist a deepening re-search.
    pub fn begin_deepening(&self, pointer: DeepeningPointer, notice: impl Into<String>) -> Result<()> {
        self.pointers.save(&pointer)?;
        let mut state = self.write();
        state.deepening = Some(pointer);
        state.notice = Some(Notice {
            kind: NoticeKind::Progress,
            text: notice.into(),
            expires_at: None,
        });
        Ok(())
    }

    /// Abandon any deepening re-search, in memory and on disk.
    pub fn clear_deepening(&self) {
        let had = self.write().deepening.take();
        if let Some(pointer) = had {
            info!(
                target: "leadscout::session",
                "Abandoning background search {} for '{}'",
                pointer.search_id,
                pointer.query_text
            );
        }
        if let Err(e) = self.pointers.clear() {
            warn!(target: "leadscout::session", "Failed to clear deepening pointer: {}", e);
        }
    }

    pub fn deepening(&self) -> Option<DeepeningPointer> {
        self.read().deepening.clone()
    }

    /// Read the durable pointer, refreshing the in-memory mirror.
    pub fn load_pointer(&self) -> Result<Option<DeepeningPointer>> {
        let pointer = self.pointers.load()?;
        self.write().deepening = pointer.clone();
        Ok(pointer)
    }

    /// Write the in-memory pointer back to durable storage.
    pub fn persist_pointer(&self) -> Result<()> {
        match self.deepening() {
            Some(pointer) => self.pointers.save(&pointer),
            None => Ok(()),
        }
    }

    /// Re-enter a deepening search after the surface was rebuilt.
    ///
    /// Keeps the in-memory session when it is the same search; form fields
    /// are left as they are.
    pub fn rehydrate_deepening(&self, pointer: &DeepeningPointer, notice: impl Into<String>) {
        let mut state = self.write();
        if state.session.as_ref().map(|s| s.id) != Some(pointer.search_id) {
            state.session = Some(SearchSession::from_pointer(pointer));
            state.preview_page = 1;
        }
        state.deepening = Some(pointer.clone());
        state.phase = Phase::PreviewReady;
        state.error = None;
        state.notice = Some(Notice {
            kind: NoticeKind::Progress,
            text: notice.into(),
            expires_at: None,
        });
    }

    // ---- Notices -----------------------------------------------------------

    /// Show a notice. Progress notices stay until replaced or dismissed;
    /// others expire after the configured TTL.
    pub fn set_notice(&self, kind: NoticeKind, text: impl Into<String>) {
        let expires_at = match kind {
            NoticeKind::Progress => None,
            _ => Some(Instant::now() + self.notice_ttl),
        };
        self.write().notice = Some(Notice {
            kind,
            text: text.into(),
            expires_at,
        });
    }

    /// Hide the current notice. Has no effect on any running poll.
    pub fn dismiss_notice(&self) {
        self.write().notice = None;
    }
}

/// Holds the unlock slot of a [`SessionStore`].
pub struct UnlockGuard<'a> {
    store: &'a SessionStore,
}

impl Drop for UnlockGuard<'_> {
    fn drop(&mut self) {
        self.store.write().unlock_in_flight = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pointer::MemoryPointerStore;

    fn store() -> SessionStore {
        SessionStore::new(Arc::new(MemoryPointerStore::new()), Duration::from_secs(5))
    }

    fn session(id: i64, status: SearchStatus) -> SearchSession {
        SearchSession {
            id: SearchId(id),
            query_text: "plumbers".into(),
            location_text: "Austin".into(),
            status,
            unique_records: 0,
            unlocked_count: 0,
            credits_balance: 0,
            unlock_batch_sizes: vec![],
            progress: 0.0,
        }
    }

    fn status(id: i64, status: SearchStatus, unique: u64, unlocked: u64) -> SearchStatusResponse {
        SearchStatusResponse {
            search_id: SearchId(id),
            status,
            unique_records: unique,
            unlocked_count: unlocked,
            available_to_unlock: unique.saturating_sub(unlocked),
            progress: 50.0,
        }
    }

    #[test]
    fn test_stale_status_is_discarded() {
        let store = store();
        store.activate(session(1, SearchStatus::Running), Phase::Polling);
        store.activate(session(2, SearchStatus::Running), Phase::Polling);

        let applied = store.apply_status(SearchId(1), &status(1, SearchStatus::Succeeded, 50, 0));
        assert_eq!(applied, StatusApplied::Stale);

        let current = store.session().unwrap();
        assert_eq!(current.id, SearchId(2));
        assert_eq!(current.status, SearchStatus::Running);
        assert_eq!(current.unique_records, 0);
    }

    #[test]
    fn test_terminal_status_applies_once() {
        let store = store();
        store.activate(session(1, SearchStatus::Running), Phase::Polling);

        let first = store.apply_status(SearchId(1), &status(1, SearchStatus::Succeeded, 120, 0));
        assert_eq!(
            first,
            StatusApplied::Completed {
                status: SearchStatus::Succeeded,
                deepening: None
            }
        );

        for _ in 0..3 {
            let again = store.apply_status(SearchId(1), &status(1, SearchStatus::Succeeded, 120, 0));
            assert_eq!(again, StatusApplied::Unchanged);
        }
        assert_eq!(store.session().unwrap().available_to_unlock(), 120);
    }

    #[test]
    fn test_running_after_terminal_keeps_status() {
        let store = store();
        store.activate(session(1, SearchStatus::Succeeded), Phase::PreviewReady);

        let applied = store.apply_status(SearchId(1), &status(1, SearchStatus::Running, 150, 25));
        assert_eq!(applied, StatusApplied::Progress);

        let current = store.session().unwrap();
        assert_eq!(current.status, SearchStatus::Succeeded);
        assert_eq!(current.available_to_unlock(), 125);
    }

    #[test]
    fn test_deepening_completion_takes_pointer() {
        let pointers = Arc::new(MemoryPointerStore::new());
        let store = SessionStore::new(pointers.clone(), Duration::from_secs(5));
        store.activate(session(1, SearchStatus::Succeeded), Phase::PreviewReady);

        let pointer = DeepeningPointer {
            search_id: SearchId(1),
            query_text: "plumbers".into(),
        };
        store.begin_deepening(pointer.clone(), "Searching").unwrap();
        store.set_polling(SearchId(1), PollMode::Background);
        assert_eq!(pointers.load().unwrap(), Some(pointer.clone()));

        let applied = store.apply_status(SearchId(1), &status(1, SearchStatus::Succeeded, 200, 25));
        assert_eq!(
            applied,
            StatusApplied::Completed {
                status: SearchStatus::Succeeded,
                deepening: Some(pointer)
            }
        );
        assert!(pointers.load().unwrap().is_none());
        assert!(store.snapshot().polling.is_none());

        // The next identical poll is a no-op
        let again = store.apply_status(SearchId(1), &status(1, SearchStatus::Succeeded, 200, 25));
        assert_eq!(again, StatusApplied::Unchanged);
    }

    #[test]
    fn test_unlock_guard_is_exclusive() {
        let store = store();
        let guard = store.begin_unlock().unwrap();
        assert!(matches!(store.begin_unlock(), Err(DiscoveryError::UnlockInFlight)));
        assert!(store.snapshot().unlock_in_flight);

        drop(guard);
        assert!(!store.snapshot().unlock_in_flight);
        assert!(store.begin_unlock().is_ok());
    }

    #[test]
    fn test_dismissing_notice_keeps_polling_flag() {
        let store = store();
        store.activate(session(1, SearchStatus::Succeeded), Phase::PreviewReady);
        store.set_polling(SearchId(1), PollMode::Background);
        store.set_notice(NoticeKind::Progress, "Searching for more leads...");

        store.dismiss_notice();
        let snapshot = store.snapshot();
        assert!(snapshot.notice.is_none());
        assert_eq!(snapshot.polling, Some(PollMode::Background));
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_notice_expires() {
        let store = store();
        store.set_notice(NoticeKind::Success, "Found more leads!");
        assert!(store.snapshot().notice.is_some());

        tokio::time::advance(Duration::from_secs(6)).await;
        assert!(store.snapshot().notice.is_none());
    }

    #[test]
    fn test_rehydrate_keeps_form() {
        let store = store();
        store.set_form(SearchForm::new("half typed"));

        let pointer = DeepeningPointer {
            search_id: SearchId(4),
            query_text: "roofers".into(),
        };
        store.rehydrate_deepening(&pointer, "Searching");

        let snapshot = store.snapshot();
        assert_eq!(snapshot.form.keywords, "half typed");
        assert_eq!(snapshot.phase, Phase::PreviewReady);
        assert_eq!(snapshot.session.unwrap().query_text, "roofers");
    }
}
