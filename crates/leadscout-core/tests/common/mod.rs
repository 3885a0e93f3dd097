//! Scripted backend for integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use leadscout_core::{
    ApiError, DiscoveryConfig, DiscoveryEvent, DiscoverySessionController, MemoryPointerStore, PointerStore,
    SearchClient,
};
use leadscout_types::{
    DeepeningResult, HistoryEntry, HistoryResponse, Pagination, PreviewItem, PreviewResponse,
    ResolvedLocation, SearchId, SearchStatus, SearchStatusResponse, StartSearchRequest,
    StartSearchResponse, UnlockResponse, UnlockedItem,
};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;

pub const POLL: Duration = Duration::from_millis(3000);

/// How the next new search behaves.
#[derive(Debug, Clone, Copy)]
pub struct Script {
    /// Status polls answered with RUNNING before the job finishes.
    pub running_ticks: u32,
    pub final_status: SearchStatus,
    pub records: u64,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            running_ticks: 2,
            final_status: SearchStatus::Succeeded,
            records: 120,
        }
    }
}

/// Re-search the backend starts on the next unlock.
#[derive(Debug, Clone, Copy)]
pub struct Deepening {
    pub new_max_places: u64,
    pub running_ticks: u32,
    pub final_status: SearchStatus,
    pub extra_records: u64,
}

#[derive(Debug, Clone)]
struct FakeSearch {
    id: SearchId,
    keywords: String,
    location: String,
    status: SearchStatus,
    unique: u64,
    unlocked: u64,
    running_ticks: u32,
    final_status: SearchStatus,
    final_unique: u64,
}

impl FakeSearch {
    fn available(&self) -> u64 {
        self.unique.saturating_sub(self.unlocked)
    }
}

#[derive(Default)]
struct BackendState {
    searches: BTreeMap<SearchId, FakeSearch>,
    next_id: i64,
    next_script: Script,
    deepen_next_unlock: Option<Deepening>,
    credits: u64,
    batches: Vec<u64>,
    failing_status_calls: u32,
    fail_preview: bool,
    fail_unlock: bool,
    fail_history: bool,
}

#[derive(Default)]
pub struct Calls {
    pub start: AtomicUsize,
    pub status: AtomicUsize,
    pub preview: AtomicUsize,
    pub unlock: AtomicUsize,
    pub history: AtomicUsize,
}

/// In-memory stand-in for the discovery backend.
pub struct FakeBackend {
    state: Mutex<BackendState>,
    pub calls: Calls,
    unlock_delay: Mutex<Duration>,
}

impl FakeBackend {
    pub fn new(credits: u64) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(BackendState {
                next_id: 1,
                credits,
                batches: vec![25, 50, 75, 100],
                ..BackendState::default()
            }),
            calls: Calls::default(),
            unlock_delay: Mutex::new(Duration::ZERO),
        })
    }

    pub fn script_next(&self, script: Script) {
        self.state.lock().unwrap().next_script = script;
    }

    pub fn deepen_next_unlock(&self, deepening: Deepening) {
        self.state.lock().unwrap().deepen_next_unlock = Some(deepening);
    }

    pub fn fail_next_status_calls(&self, n: u32) {
        self.state.lock().unwrap().failing_status_calls = n;
    }

    pub fn fail_preview(&self, fail: bool) {
        self.state.lock().unwrap().fail_preview = fail;
    }

    pub fn fail_unlock(&self, fail: bool) {
        self.state.lock().unwrap().fail_unlock = fail;
    }

    pub fn fail_history(&self, fail: bool) {
        self.state.lock().unwrap().fail_history = fail;
    }

    pub fn set_unlock_delay(&self, delay: Duration) {
        *self.unlock_delay.lock().unwrap() = delay;
    }

    pub fn credits(&self) -> u64 {
        self.state.lock().unwrap().credits
    }

    /// Seed a finished or running search, as if created earlier.
    pub fn seed(
        &self,
        keywords: &str,
        location: &str,
        status: SearchStatus,
        unique: u64,
        unlocked: u64,
    ) -> SearchId {
        let mut state = self.state.lock().unwrap();
        let id = SearchId(state.next_id);
        state.next_id += 1;
        state.searches.insert(
            id,
            FakeSearch {
                id,
                keywords: keywords.into(),
                location: location.into(),
                status,
                unique,
                unlocked,
                running_ticks: 0,
                final_status: status,
                final_unique: unique,
            },
        );
        id
    }

    pub fn count(&self, counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    fn not_found() -> ApiError {
        ApiError::Http {
            status: 404,
            message: "Resource not found".into(),
        }
    }

    fn server_error() -> ApiError {
        ApiError::Http {
            status: 500,
            message: "Server error. Please try again later.".into(),
        }
    }
}

#[async_trait]
impl SearchClient for FakeBackend {
    async fn start(&self, request: &StartSearchRequest) -> Result<StartSearchResponse, ApiError> {
        self.calls.start.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().unwrap();
        let location = request.city.clone().unwrap_or_default();

        let existing = state
            .searches
            .values()
            .find(|s| s.keywords == request.search_keywords && s.location == location)
            .map(|s| s.id);

        let (search, is_new) = match existing {
            Some(id) => (state.searches[&id].clone(), false),
            None => {
                let id = SearchId(state.next_id);
                state.next_id += 1;
                let script = state.next_script;
                let finished = script.running_ticks == 0;
                let search = FakeSearch {
                    id,
                    keywords: request.search_keywords.clone(),
                    location,
                    status: if finished { script.final_status } else { SearchStatus::Running },
                    unique: if finished { script.records } else { 0 },
                    unlocked: 0,
                    running_ticks: script.running_ticks,
                    final_status: script.final_status,
                    final_unique: script.records,
                };
                state.searches.insert(id, search.clone());
                (search, true)
            }
        };

        Ok(StartSearchResponse {
            success: true,
            is_new_search: is_new,
            search_id: search.id,
            query_hash: format!("hash-{}", search.id),
            status: search.status,
            unique_records: search.unique,
            unlocked_count: search.unlocked,
            location: Some(ResolvedLocation {
                text: search.location.clone(),
                latitude: 30.27,
                longitude: -97.74,
            }),
            message: String::new(),
        })
    }

    async fn status(&self, search_id: SearchId) -> Result<SearchStatusResponse, ApiError> {
        self.calls.status.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().unwrap();
        if state.failing_status_calls > 0 {
            state.failing_status_calls -= 1;
            return Err(ApiError::Http {
                status: 503,
                message: "Request failed with status 503".into(),
            });
        }

        let search = state.searches.get_mut(&search_id).ok_or_else(Self::not_found)?;
        if search.running_ticks > 0 {
            search.running_ticks -= 1;
            search.status = SearchStatus::Running;
        } else {
            search.status = search.final_status;
            search.unique = search.final_unique;
        }

        let progress = if search.status.is_terminal() { 100.0 } else { 40.0 };
        Ok(SearchStatusResponse {
            search_id,
            status: search.status,
            unique_records: search.unique,
            unlocked_count: search.unlocked,
            available_to_unlock: search.available(),
            progress,
        })
    }

    async fn preview(
        &self,
        search_id: SearchId,
        page: u32,
        per_page: u32,
    ) -> Result<PreviewResponse, ApiError> {
        self.calls.preview.fetch_add(1, Ordering::SeqCst);
        let state = self.state.lock().unwrap();
        if state.fail_preview {
            return Err(Self::server_error());
        }
        let search = state.searches.get(&search_id).ok_or_else(Self::not_found)?;

        let per_page = per_page.max(1);
        let total_pages = search.unique.div_ceil(per_page as u64) as u32;
        let start = (page.saturating_sub(1) as u64) * per_page as u64;
        let end = (start + per_page as u64).min(search.unique);

        let items = (start..end)
            .map(|i| {
                let unlocked = i < search.unlocked;
                PreviewItem {
                    place_id: format!("place-{}-{}", search_id, i),
                    title: format!("Business {}", i),
                    category: Some("Plumber".into()),
                    address: Some(format!("{} Main St", i + 1)),
                    city: Some(search.location.clone()),
                    state: Some("TX".into()),
                    country: Some("US".into()),
                    rating: Some(4.5),
                    review_count: Some(10 + i),
                    website: unlocked.then(|| format!("https://business{}.example", i)),
                    phone: unlocked.then(|| format!("+1 512 555 {:04}", i)),
                    email: None,
                    is_unlocked: unlocked,
                    latitude: None,
                    longitude: None,
                }
            })
            .collect();

        let available = search.available();
        Ok(PreviewResponse {
            search_id,
            items,
            pagination: Pagination {
                page,
                per_page,
                total_items: search.unique,
                total_pages,
                has_next: page < total_pages,
                has_prev: page > 1,
            },
            unlock_batches: state.batches.iter().copied().filter(|b| *b <= available).collect(),
            unique_records: search.unique,
            unlocked_count: search.unlocked,
            available_to_unlock: available,
            credits_balance: state.credits,
        })
    }

    async fn unlock(&self, search_id: SearchId, batch_size: u64) -> Result<UnlockResponse, ApiError> {
        self.calls.unlock.fetch_add(1, Ordering::SeqCst);
        let delay = *self.unlock_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.lock().unwrap();
        if state.fail_unlock {
            return Err(Self::server_error());
        }
        let credits = state.credits;
        let deepening = state.deepen_next_unlock.take();

        let search = state.searches.get_mut(&search_id).ok_or_else(Self::not_found)?;
        if batch_size > search.available() {
            return Err(ApiError::Http {
                status: 400,
                message: "Not enough leads available".into(),
            });
        }
        if batch_size > credits {
            return Err(ApiError::Http {
                status: 402,
                message: "Insufficient credits".into(),
            });
        }

        let first = search.unlocked;
        search.unlocked += batch_size;
        let items = (first..search.unlocked)
            .map(|i| UnlockedItem {
                place_id: format!("place-{}-{}", search_id, i),
                title: format!("Business {}", i),
                category: None,
                address: None,
                city: None,
                phone: Some(format!("+1 512 555 {:04}", i)),
                website: None,
                rating: None,
            })
            .collect();

        let deepening_result = deepening.map(|d| {
            let old_max = search.unique;
            search.running_ticks = d.running_ticks;
            search.final_status = d.final_status;
            search.final_unique = search.unique + d.extra_records;
            DeepeningResult {
                success: true,
                new_run_id: "run-2".into(),
                new_dataset_id: "dataset-2".into(),
                new_max_places: d.new_max_places,
                old_max_places: old_max,
                message: "Expanding search".into(),
            }
        });

        let total_unlocked = search.unlocked;
        let remaining = search.available();
        state.credits -= batch_size;

        Ok(UnlockResponse {
            success: true,
            unlocked: batch_size,
            businesses_created: batch_size,
            leads_created: batch_size,
            skipped_duplicates: 0,
            total_unlocked,
            remaining,
            credits_used: batch_size,
            credits_remaining: state.credits,
            needs_deepening: deepening_result.is_some(),
            deepening_triggered: deepening_result.is_some(),
            deepening_result,
            items,
            message: format!("Unlocked {} leads", batch_size),
        })
    }

    async fn history(&self, _page: u32, _per_page: u32) -> Result<HistoryResponse, ApiError> {
        self.calls.history.fetch_add(1, Ordering::SeqCst);
        let state = self.state.lock().unwrap();
        if state.fail_history {
            return Err(Self::server_error());
        }

        let items = state
            .searches
            .values()
            .rev()
            .map(|s| HistoryEntry {
                search_id: s.id,
                query_text: s.keywords.clone(),
                location_text: s.location.clone(),
                location_latitude: None,
                location_longitude: None,
                status: s.status,
                unique_records: s.unique,
                unlocked_count: s.unlocked,
                available_to_unlock: s.available(),
                created_at: Utc::now(),
                last_accessed_at: Utc::now(),
            })
            .collect::<Vec<_>>();

        Ok(HistoryResponse {
            pagination: Pagination {
                page: 1,
                per_page: 100,
                total_items: items.len() as u64,
                total_pages: 1,
                has_next: false,
                has_prev: false,
            },
            items,
        })
    }
}

/// Controller over `backend` with an in-memory pointer store.
pub fn controller(backend: &Arc<FakeBackend>) -> DiscoverySessionController {
    controller_with(backend, Arc::new(MemoryPointerStore::new()))
}

pub fn controller_with(
    backend: &Arc<FakeBackend>,
    pointers: Arc<dyn PointerStore>,
) -> DiscoverySessionController {
    DiscoverySessionController::new(backend.clone(), pointers, DiscoveryConfig::default())
}

/// Let the paused clock run through `ticks` poll intervals.
pub async fn run_ticks(ticks: u32) {
    tokio::time::sleep(POLL * ticks + Duration::from_millis(100)).await;
}

/// Everything broadcast so far.
pub fn drain(events: &mut broadcast::Receiver<DiscoveryEvent>) -> Vec<DiscoveryEvent> {
    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }
    seen
}
