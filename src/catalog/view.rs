//! # Catalog View
//!
//! Owns every piece of mutable state for one mounted catalog view: filter
//! state, stub list, item cache, pagination cursor and comparison selection.
//! All mutation goes through this type under a single write lock.
//!
//! Each acquisition pass runs under a child of the view token. Starting a new
//! pass cancels the previous child, and every write re-checks both the token
//! and the pass epoch, so results from a superseded pass or a torn-down view
//! are dropped without touching state.

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex as StdMutex, PoisonError, Weak};
use std::time::Duration;

use futures::future::join_all;
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{Mutex, RwLock, RwLockWriteGuard, broadcast, mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, Span, debug, info, info_span, warn};
use uuid::Uuid;

use super::acquirer::{CatalogAcquirer, Paginator, merge_unique};
use super::api::CatalogApi;
use super::comparison::{ComparisonSelector, ToggleOutcome};
use super::debounce::{SearchDebouncer, SearchUpdate};
use super::detail_fetcher::{DetailFetcher, FetchOutcome, pause};
use super::errors::{CatalogError, CatalogResult};
use super::events::ViewEvent;
use super::item_cache::{ItemCache, ItemStatus};
use super::reconciler::{compute_visible, plan_resolution};
use super::retry::RetryPolicy;
use crate::domain::{AcquisitionKey, AcquisitionMode, FilterState, SpeciesDetail, SpeciesStub};
use crate::infrastructure::config::{AppConfig, CatalogConfig};

/// Loading/error flag of one logical operation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "message", rename_all = "snake_case")]
pub enum OperationStatus {
    #[default]
    Idle,
    Loading,
    Failed(String),
}

impl OperationStatus {
    #[must_use]
    pub const fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }

    #[must_use]
    pub const fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VisibleEntry {
    pub stub: SpeciesStub,
    pub status: ItemStatus,
}

/// Everything the presentation layer renders, captured atomically
#[derive(Debug, Clone, Serialize)]
pub struct ViewSnapshot {
    pub session_id: Uuid,
    pub mode: AcquisitionMode,
    pub filters: FilterState,
    pub visible: Vec<VisibleEntry>,
    pub total_stubs: usize,
    pub more_available: bool,
    pub can_load_more_results: bool,
    pub initial_load: OperationStatus,
    pub filter_reload: OperationStatus,
    pub detail_batch: OperationStatus,
    pub comparison: Vec<Arc<SpeciesDetail>>,
    pub comparison_ready: bool,
}

impl ViewSnapshot {
    /// Nothing to show, nothing loading, nothing failed.
    #[must_use]
    pub fn is_empty_result(&self) -> bool {
        self.visible.is_empty() && !self.is_loading() && !self.is_failed()
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.initial_load.is_loading()
            || self.filter_reload.is_loading()
            || self.detail_batch.is_loading()
    }

    /// The last acquisition pass failed; the view offers "try again".
    #[must_use]
    pub fn is_failed(&self) -> bool {
        self.initial_load.is_failed() || self.filter_reload.is_failed()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operation {
    InitialLoad,
    FilterReload,
}

struct ViewState {
    filters: FilterState,
    mode: AcquisitionMode,
    /// Key of the stub list currently held; `None` before the first
    /// successful pass and after a failed one
    key: Option<AcquisitionKey>,
    stubs: Vec<SpeciesStub>,
    paginator: Paginator,
    cache: ItemCache,
    comparison: ComparisonSelector,
    pass_token: CancellationToken,
    epoch: u64,
    resolution_window: usize,
    /// Stubs queued for or being fetched by the current pass
    in_flight: HashSet<String>,
    /// Stubs waiting for the batch driver, in resolution order
    queue: VecDeque<SpeciesStub>,
    driver_running: bool,
    batch_failures: usize,
    initial_load: OperationStatus,
    filter_reload: OperationStatus,
    detail_batch: OperationStatus,
}

impl ViewState {
    fn status_mut(&mut self, operation: Operation) -> &mut OperationStatus {
        match operation {
            Operation::InitialLoad => &mut self.initial_load,
            Operation::FilterReload => &mut self.filter_reload,
        }
    }

    fn is_current(&self, epoch: u64, token: &CancellationToken) -> bool {
        self.epoch == epoch && !token.is_cancelled()
    }
}

struct ViewInner {
    acquirer: CatalogAcquirer,
    fetcher: DetailFetcher,
    settings: CatalogConfig,
    state: RwLock<ViewState>,
    /// Held for the whole fetch+merge of a page so pages never overlap
    page_lock: Mutex<()>,
    events: broadcast::Sender<ViewEvent>,
    active_batches: watch::Sender<usize>,
    search_input: StdMutex<Option<mpsc::Sender<String>>>,
    view_token: CancellationToken,
    session_id: Uuid,
    span: Span,
}

/// Handle to a catalog view. Cheap to clone; all clones share state.
#[derive(Clone)]
pub struct CatalogView {
    inner: Arc<ViewInner>,
}

impl CatalogView {
    pub fn new(api: Arc<dyn CatalogApi>, settings: CatalogConfig, policy: RetryPolicy) -> Self {
        let session_id = Uuid::new_v4();
        let view_token = CancellationToken::new();
        let (events, _) = broadcast::channel(settings.event_buffer.max(1));
        let (active_batches, _) = watch::channel(0);

        let state = ViewState {
            filters: FilterState::default(),
            mode: AcquisitionMode::Paginated,
            key: None,
            stubs: Vec::new(),
            paginator: Paginator::exhausted(),
            cache: ItemCache::new(),
            comparison: ComparisonSelector::new(),
            pass_token: view_token.child_token(),
            epoch: 0,
            resolution_window: settings.resolution_cap,
            in_flight: HashSet::new(),
            queue: VecDeque::new(),
            driver_running: false,
            batch_failures: 0,
            initial_load: OperationStatus::Idle,
            filter_reload: OperationStatus::Idle,
            detail_batch: OperationStatus::Idle,
        };

        Self {
            inner: Arc::new(ViewInner {
                acquirer: CatalogAcquirer::new(Arc::clone(&api), settings.page_size),
                fetcher: DetailFetcher::new(api, policy),
                state: RwLock::new(state),
                page_lock: Mutex::new(()),
                events,
                active_batches,
                search_input: StdMutex::new(None),
                span: info_span!("catalog_view", session = %session_id),
                view_token,
                session_id,
                settings,
            }),
        }
    }

    pub fn from_config(api: Arc<dyn CatalogApi>, config: &AppConfig) -> Self {
        Self::new(api, config.catalog.clone(), config.retry.clone())
    }

    #[must_use]
    pub fn session_id(&self) -> Uuid {
        self.inner.session_id
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ViewEvent> {
        self.inner.events.subscribe()
    }

    /// Resets the view and loads the catalog for the current filters.
    ///
    /// Mounting is the only operation that clears the comparison selection.
    pub async fn mount(&self) -> CatalogResult<()> {
        {
            let mut state = self.write_live().await?;
            state.comparison.clear();
            state.key = None;
            state.resolution_window = self.inner.settings.resolution_cap;
        }
        self.start_search_driver();
        info!(session = %self.inner.session_id, "Mounting catalog view");
        self.reacquire(Operation::InitialLoad, true)
            .instrument(self.inner.span.clone())
            .await
    }

    /// Tears the view down. In-flight work is cancelled and no state is
    /// mutated afterwards.
    pub fn unmount(&self) {
        info!(session = %self.inner.session_id, "Unmounting catalog view");
        self.inner.view_token.cancel();
        *self
            .inner
            .search_input
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }

    #[must_use]
    pub fn is_mounted(&self) -> bool {
        !self.inner.view_token.is_cancelled()
    }

    pub async fn filters(&self) -> FilterState {
        self.inner.state.read().await.filters.clone()
    }

    /// Applies a new filter state. Re-acquires when the acquisition key
    /// changes; otherwise only the visible set and resolution plan change.
    pub async fn set_filters(&self, filters: FilterState) -> CatalogResult<()> {
        let needs_acquire = {
            let mut state = self.write_live().await?;
            let needs_acquire = state.key.as_ref() != Some(&filters.acquisition_key());
            debug!(?filters, needs_acquire, "Filters changed");
            state.filters = filters;
            state.resolution_window = self.inner.settings.resolution_cap;
            if !needs_acquire {
                self.schedule_resolution(&mut state);
            }
            needs_acquire
        };

        if needs_acquire {
            self.reacquire(Operation::FilterReload, false)
                .instrument(self.inner.span.clone())
                .await
        } else {
            Ok(())
        }
    }

    /// Re-runs the acquisition pass for the current filters, e.g. after a
    /// failure.
    pub async fn reload(&self) -> CatalogResult<()> {
        self.ensure_live()?;
        self.reacquire(Operation::FilterReload, false)
            .instrument(self.inner.span.clone())
            .await
    }

    /// Replaces the search term right away. Never re-acquires.
    pub async fn set_search_term(&self, term: &str) -> CatalogResult<()> {
        let mut state = self.write_live().await?;
        let filters = FilterState {
            search_term: crate::domain::filters::normalize(term),
            ..state.filters.clone()
        };
        state.filters = filters;
        self.schedule_resolution(&mut state);
        Ok(())
    }

    /// Feeds raw search input through the trailing debouncer.
    pub async fn search_input(&self, raw: &str) -> CatalogResult<()> {
        let sender = self
            .inner
            .search_input
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or_else(|| CatalogError::InvalidInput("view is not mounted".into()))?;
        sender
            .send(raw.to_string())
            .await
            .map_err(|_| CatalogError::Cancelled)
    }

    /// Loads and merges the next page in paginated mode. Returns the number
    /// of new stubs; `0` when nothing more is available.
    pub async fn load_next_page(&self) -> CatalogResult<usize> {
        self.ensure_live()?;
        let _page = self.inner.page_lock.lock().await;

        let (request, token, epoch) = {
            let state = self.inner.state.read().await;
            if state.mode != AcquisitionMode::Paginated {
                return Ok(0);
            }
            match state.paginator.next_request() {
                Some(request) if state.key.is_some() => {
                    (request, state.pass_token.clone(), state.epoch)
                }
                _ => return Ok(0),
            }
        };

        let page = self
            .inner
            .acquirer
            .fetch_page(request, &token)
            .instrument(self.inner.span.clone())
            .await
            .inspect_err(|error| warn!(offset = request.offset, %error, "Failed to load next page"))?;

        let mut state = self.inner.state.write().await;
        if !state.is_current(epoch, &token) {
            return Err(CatalogError::Cancelled);
        }
        let added = merge_unique(&mut state.stubs, page.results.iter().cloned());
        state.paginator.advance(request, &page);
        let more_available = state.paginator.more_available();
        info!(offset = request.offset, added, total = state.stubs.len(), more_available, "Page merged");
        self.emit(ViewEvent::StubsAppended {
            added,
            total: state.stubs.len(),
            more_available,
        });
        Ok(added)
    }

    /// Widens the background-resolution window by one cap's worth of stubs.
    /// Returns the number of stubs scheduled.
    pub async fn load_more_results(&self) -> CatalogResult<usize> {
        let mut state = self.write_live().await?;
        state.resolution_window += self.inner.settings.resolution_cap;
        Ok(self.schedule_resolution(&mut state))
    }

    /// Resolves one stub on demand, e.g. when its card scrolls into view.
    ///
    /// A stub still waiting in the batch queue is pulled forward; one that a
    /// batch is already fetching is awaited instead of requested twice.
    pub async fn resolve_item(&self, identifier: &str) -> CatalogResult<Arc<SpeciesDetail>> {
        let (stub, token, epoch, joined) = {
            let mut state = self.write_live().await?;
            if let Some(detail) = state.cache.get(identifier) {
                return Ok(Arc::clone(detail));
            }
            if state.cache.is_unavailable(identifier) {
                return Err(CatalogError::Unresolved(identifier.to_string()));
            }
            let stub = state
                .stubs
                .iter()
                .find(|s| s.identifier == identifier)
                .cloned()
                .ok_or_else(|| CatalogError::InvalidInput(format!("unknown species: {identifier}")))?;

            let joined = if let Some(index) = state.queue.iter().position(|s| s.identifier == identifier) {
                // Stays registered in `in_flight`; this call fetches it now
                state.queue.remove(index);
                None
            } else if state.in_flight.insert(stub.identifier.clone()) {
                None
            } else {
                Some(self.inner.events.subscribe())
            };
            (stub, state.pass_token.clone(), state.epoch, joined)
        };

        match joined {
            None => {
                self.resolve_one(&stub, &token, epoch)
                    .instrument(self.inner.span.clone())
                    .await;
            }
            Some(mut events) => {
                debug!(identifier, "Joining in-flight detail fetch");
                self.wait_for_fetch(identifier, &mut events, &token).await;
            }
        }

        let state = self.inner.state.read().await;
        state
            .cache
            .get(identifier)
            .cloned()
            .ok_or_else(|| CatalogError::Unresolved(identifier.to_string()))
    }

    /// Adds or removes a resolved species from the comparison selection.
    pub async fn toggle_compare(&self, identifier: &str) -> CatalogResult<ToggleOutcome> {
        let mut state = self.write_live().await?;
        let detail = state
            .cache
            .get(identifier)
            .cloned()
            .ok_or_else(|| CatalogError::Unresolved(identifier.to_string()))?;
        let outcome = state.comparison.toggle(detail);
        self.emit_comparison(&state);
        Ok(outcome)
    }

    pub async fn evict_compare(&self, identifier: &str) -> CatalogResult<bool> {
        let mut state = self.write_live().await?;
        let removed = state.comparison.evict(identifier);
        if removed {
            self.emit_comparison(&state);
        }
        Ok(removed)
    }

    pub async fn comparison(&self) -> Vec<Arc<SpeciesDetail>> {
        self.inner.state.read().await.comparison.current()
    }

    pub async fn visible(&self) -> Vec<SpeciesStub> {
        let state = self.inner.state.read().await;
        compute_visible(&state.stubs, &state.cache, &state.filters)
    }

    pub async fn snapshot(&self) -> ViewSnapshot {
        let state = self.inner.state.read().await;
        let visible = compute_visible(&state.stubs, &state.cache, &state.filters)
            .into_iter()
            .map(|stub| VisibleEntry {
                status: state.cache.status(&stub.identifier),
                stub,
            })
            .collect();
        let deferred = plan_resolution(
            &state.stubs,
            &state.cache,
            &state.filters,
            state.resolution_window,
            self.inner.settings.detail_batch_size,
        )
        .deferred;

        ViewSnapshot {
            session_id: self.inner.session_id,
            mode: state.mode,
            filters: state.filters.clone(),
            visible,
            total_stubs: state.stubs.len(),
            more_available: state.paginator.more_available(),
            can_load_more_results: deferred > 0,
            initial_load: state.initial_load.clone(),
            filter_reload: state.filter_reload.clone(),
            detail_batch: state.detail_batch.clone(),
            comparison: state.comparison.current(),
            comparison_ready: state.comparison.is_ready(),
        }
    }

    /// Waits until no background resolution batch is running.
    pub async fn settled(&self) {
        let mut active = self.inner.active_batches.subscribe();
        // The sender lives as long as `self`, so this only ends on idle.
        let _ = active.wait_for(|count| *count == 0).await;
    }

    fn ensure_live(&self) -> CatalogResult<()> {
        if self.inner.view_token.is_cancelled() {
            Err(CatalogError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Write guard on the view state, refused if the view was torn down
    /// while the lock was being acquired.
    async fn write_live(&self) -> CatalogResult<RwLockWriteGuard<'_, ViewState>> {
        let state = self.inner.state.write().await;
        self.ensure_live()?;
        Ok(state)
    }

    fn emit(&self, event: ViewEvent) {
        debug!(event = event.name(), "View event");
        // No subscribers is fine
        let _ = self.inner.events.send(event);
    }

    fn emit_comparison(&self, state: &ViewState) {
        self.emit(ViewEvent::ComparisonChanged {
            selected: state
                .comparison
                .current()
                .iter()
                .map(|d| d.identifier.clone())
                .collect(),
        });
    }

    /// Runs a fresh acquisition pass for the current filters.
    ///
    /// The stub list is cleared right away; the item cache is cleared when
    /// the acquisition mode changes (or `reset_cache` is set) so that a new
    /// mode never starts resolving against a stale cache.
    async fn reacquire(&self, operation: Operation, reset_cache: bool) -> CatalogResult<()> {
        let (filters, token, epoch) = {
            let mut state = self.inner.state.write().await;
            state.pass_token.cancel();
            state.pass_token = self.inner.view_token.child_token();
            state.epoch += 1;

            let mode = state.filters.mode();
            if reset_cache || mode != state.mode {
                info!(from = %state.mode, to = %mode, "Acquisition mode switch, clearing item cache");
                state.cache.clear();
            }
            state.mode = mode;
            state.stubs.clear();
            state.key = None;
            state.paginator = Paginator::exhausted();
            state.in_flight.clear();
            state.queue.clear();
            state.driver_running = false;
            state.batch_failures = 0;
            state.detail_batch = OperationStatus::Idle;
            *state.status_mut(operation) = OperationStatus::Loading;
            (state.filters.clone(), state.pass_token.clone(), state.epoch)
        };

        let _page = self.inner.page_lock.lock().await;
        let result = self.inner.acquirer.acquire(&filters, &token).await;

        let mut state = self.inner.state.write().await;
        if !state.is_current(epoch, &token) {
            debug!(epoch, "Acquisition pass superseded");
            return Err(CatalogError::Cancelled);
        }

        match result {
            Ok(acquired) => {
                let more_available = acquired.more_available();
                let count = acquired.stubs.len();
                state.stubs = acquired.stubs;
                state.paginator = acquired.paginator;
                state.key = Some(acquired.key);
                // A successful pass clears any earlier acquisition failure
                state.initial_load = OperationStatus::Idle;
                state.filter_reload = OperationStatus::Idle;
                self.emit(ViewEvent::StubsReplaced {
                    mode: state.mode,
                    count,
                    more_available,
                });
                self.schedule_resolution(&mut state);
                Ok(())
            }
            Err(error) => {
                warn!(mode = %state.mode, %error, "Acquisition failed");
                *state.status_mut(operation) = OperationStatus::Failed(error.to_string());
                self.emit(ViewEvent::AcquisitionFailed {
                    mode: state.mode,
                    error: error.to_string(),
                });
                Err(error)
            }
        }
    }

    /// Queues the pending stubs inside the window for background resolution
    /// and starts the pass's batch driver unless it is already running.
    /// Stubs already queued or being fetched are skipped. Returns the number
    /// newly queued.
    fn schedule_resolution(&self, state: &mut ViewState) -> usize {
        if state.pass_token.is_cancelled() {
            return 0;
        }
        let plan = plan_resolution(
            &state.stubs,
            &state.cache,
            &state.filters,
            state.resolution_window,
            self.inner.settings.detail_batch_size,
        );
        let mut queued = 0;
        for stub in plan.batches.into_iter().flatten() {
            if state.in_flight.insert(stub.identifier.clone()) {
                state.queue.push_back(stub);
                queued += 1;
            }
        }
        if queued == 0 {
            return 0;
        }

        info!(queued, backlog = state.queue.len(), deferred = plan.deferred, "Scheduling detail resolution");
        state.detail_batch = OperationStatus::Loading;
        if !state.driver_running {
            state.driver_running = true;
            self.inner.active_batches.send_modify(|count| *count += 1);
            let view = self.clone();
            let token = state.pass_token.clone();
            let epoch = state.epoch;
            tokio::spawn(
                async move { view.drive_batches(token, epoch).await }
                    .instrument(self.inner.span.clone()),
            );
        }
        queued
    }

    /// The one batch loop of a pass. Drains the queue `detail_batch_size`
    /// stubs at a time, pausing between batches, and settles the batch
    /// status once the queue is empty.
    async fn drive_batches(self, token: CancellationToken, epoch: u64) {
        let batch_size = self.inner.settings.detail_batch_size.max(1);
        let delay = Duration::from_millis(self.inner.settings.detail_batch_delay_ms);
        let mut round = 0usize;

        loop {
            {
                let mut state = self.inner.state.write().await;
                if !state.is_current(epoch, &token) {
                    break;
                }
                if state.queue.is_empty() {
                    state.driver_running = false;
                    state.detail_batch = match state.batch_failures {
                        0 => OperationStatus::Idle,
                        n => OperationStatus::Failed(format!("{n} species could not be resolved")),
                    };
                    break;
                }
            }

            if round > 0 && !pause(delay, &token).await {
                break;
            }

            let batch: Vec<SpeciesStub> = {
                let mut state = self.inner.state.write().await;
                if !state.is_current(epoch, &token) {
                    break;
                }
                let take = batch_size.min(state.queue.len());
                state.queue.drain(..take).collect()
            };
            // Emptied by on-demand resolution during the pause
            if batch.is_empty() {
                continue;
            }

            round += 1;
            debug!(batch = round, size = batch.len(), "Resolving batch");
            join_all(batch.iter().map(|stub| self.resolve_one(stub, &token, epoch))).await;
        }

        self.inner
            .active_batches
            .send_modify(|count| *count = count.saturating_sub(1));
    }

    /// Waits until a fetch started elsewhere for `identifier` has finished or
    /// the pass is over.
    async fn wait_for_fetch(
        &self,
        identifier: &str,
        events: &mut broadcast::Receiver<ViewEvent>,
        token: &CancellationToken,
    ) {
        loop {
            if !self.inner.state.read().await.in_flight.contains(identifier) {
                return;
            }
            tokio::select! {
                biased;
                () = token.cancelled() => return,
                received = events.recv() => {
                    if matches!(received, Err(RecvError::Closed)) {
                        return;
                    }
                }
            }
        }
    }

    /// Fetches one detail and records the outcome if the pass is still
    /// current.
    async fn resolve_one(&self, stub: &SpeciesStub, token: &CancellationToken, epoch: u64) {
        let outcome = self.inner.fetcher.resolve(stub, token).await;

        let mut state = self.inner.state.write().await;
        if !state.is_current(epoch, token) {
            debug!(identifier = %stub.identifier, "Discarding detail from superseded pass");
            return;
        }
        state.in_flight.remove(&stub.identifier);

        match outcome {
            FetchOutcome::Resolved(detail) => {
                if state.cache.insert(detail) {
                    self.emit(ViewEvent::DetailResolved {
                        identifier: stub.identifier.clone(),
                    });
                }
            }
            FetchOutcome::Failed { attempts, error } => {
                warn!(identifier = %stub.identifier, attempts, %error, "Species unavailable for this session");
                state.cache.mark_unavailable(&stub.identifier);
                state.batch_failures += 1;
                self.emit(ViewEvent::DetailUnavailable {
                    identifier: stub.identifier.clone(),
                    error: error.to_string(),
                });
            }
            FetchOutcome::Cancelled => {}
        }
    }

    fn start_search_driver(&self) {
        let mut slot = self
            .inner
            .search_input
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if slot.is_some() {
            return;
        }

        let (input_tx, input_rx) = mpsc::channel(32);
        let (update_tx, mut update_rx) = mpsc::channel(8);
        let debouncer =
            SearchDebouncer::new(Duration::from_millis(self.inner.settings.search_debounce_ms));
        tokio::spawn(
            debouncer
                .run(input_rx, update_tx, self.inner.view_token.clone())
                .instrument(self.inner.span.clone()),
        );

        let view: Weak<ViewInner> = Arc::downgrade(&self.inner);
        tokio::spawn(
            async move {
                while let Some(update) = update_rx.recv().await {
                    let Some(inner) = view.upgrade() else { break };
                    let term = match update {
                        SearchUpdate::Apply(term) => term,
                        SearchUpdate::Clear => String::new(),
                    };
                    if let Err(error) = (CatalogView { inner }).set_search_term(&term).await {
                        debug!(%error, "Dropped search update");
                    }
                }
            }
            .instrument(self.inner.span.clone()),
        );

        *slot = Some(input_tx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{FakeCatalog, shared};

    fn settings() -> CatalogConfig {
        CatalogConfig::default()
    }

    fn view(fake: FakeCatalog) -> (Arc<FakeCatalog>, CatalogView) {
        let (fake, api) = shared(fake);
        let view = CatalogView::new(api, settings(), RetryPolicy::default().without_jitter());
        (fake, view)
    }

    #[tokio::test(start_paused = true)]
    async fn mount_loads_first_page() {
        let (fake, view) = view(FakeCatalog::generated(45));
        view.mount().await.unwrap();

        let snapshot = view.snapshot().await;
        assert_eq!(snapshot.mode, AcquisitionMode::Paginated);
        assert_eq!(snapshot.visible.len(), 20);
        assert!(snapshot.more_available);
        assert!(snapshot.visible.iter().all(|e| e.status == ItemStatus::Pending));
        assert_eq!(snapshot.initial_load, OperationStatus::Idle);
        // Unfiltered views resolve on demand only
        assert_eq!(fake.total_detail_requests(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn pages_append_until_exhausted() {
        let (_, view) = view(FakeCatalog::generated(45));
        view.mount().await.unwrap();
        assert_eq!(view.load_next_page().await.unwrap(), 20);
        assert_eq!(view.load_next_page().await.unwrap(), 5);
        assert_eq!(view.load_next_page().await.unwrap(), 0);
        let snapshot = view.snapshot().await;
        assert_eq!(snapshot.total_stubs, 45);
        assert!(!snapshot.more_available);
    }

    #[tokio::test(start_paused = true)]
    async fn search_term_narrows_without_requests() {
        let (fake, view) = view(FakeCatalog::generated(20));
        view.mount().await.unwrap();
        fake.clear_requests();

        view.set_search_term("CHAR").await.unwrap();
        let names: Vec<_> = view.visible().await.into_iter().map(|s| s.identifier).collect();
        assert_eq!(names, ["charmander", "charmeleon", "charizard"]);
        assert!(fake.requests().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn debounced_search_applies_after_quiet_period() {
        let (_, view) = view(FakeCatalog::generated(20));
        view.mount().await.unwrap();

        view.search_input("s").await.unwrap();
        view.search_input("sq").await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(view.filters().await.search_term, "");

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(view.filters().await.search_term, "sq");
        assert_eq!(view.visible().await.len(), 1);

        view.search_input("  ").await.unwrap();
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(view.filters().await.search_term, "");
    }

    #[tokio::test(start_paused = true)]
    async fn category_filter_resolves_in_batches() {
        let (fake, view) =
            view(FakeCatalog::generated(120).with_detail_latency(Duration::from_millis(50)));
        view.mount().await.unwrap();
        let mut events = view.subscribe();

        view.set_filters(FilterState::new("", ["fire"], std::iter::empty()))
            .await
            .unwrap();
        let snapshot = view.snapshot().await;
        assert_eq!(snapshot.mode, AcquisitionMode::CategoryScan);
        assert!(snapshot.visible.is_empty());
        assert!(snapshot.detail_batch.is_loading());
        assert!(!snapshot.is_empty_result());

        view.settled().await;
        let snapshot = view.snapshot().await;
        assert_eq!(snapshot.detail_batch, OperationStatus::Idle);
        assert!(!snapshot.visible.is_empty());
        assert!(snapshot.visible.iter().all(|e| e.status == ItemStatus::Resolved));
        assert!(fake.total_detail_requests() <= 50);

        let first = events.recv().await.unwrap();
        assert!(matches!(first, ViewEvent::StubsReplaced { mode: AcquisitionMode::CategoryScan, .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn batches_are_spaced_by_the_batch_delay() {
        let (_, view) = view(FakeCatalog::generated(30));
        view.mount().await.unwrap();
        // Range scan over generation I, then a category filter: 30 pending
        // stubs -> three batches of ten, two pauses between them.
        view.set_filters(FilterState::new("", ["fire"], [1])).await.unwrap();
        let started = tokio::time::Instant::now();
        view.settled().await;
        assert_eq!(started.elapsed(), Duration::from_millis(600));
    }

    #[tokio::test(start_paused = true)]
    async fn toggle_requires_a_resolved_item() {
        let (_, view) = view(FakeCatalog::generated(10));
        view.mount().await.unwrap();
        assert_eq!(
            view.toggle_compare("pikachu").await,
            Err(CatalogError::Unresolved("pikachu".into()))
        );

        view.resolve_item("charmander").await.unwrap();
        view.resolve_item("squirtle").await.unwrap();
        assert_eq!(view.toggle_compare("charmander").await, Ok(ToggleOutcome::Added));
        assert_eq!(view.toggle_compare("squirtle").await, Ok(ToggleOutcome::Added));
        assert!(view.snapshot().await.comparison_ready);
    }

    #[tokio::test(start_paused = true)]
    async fn unavailable_items_are_not_refetched() {
        let (fake, view) = view(FakeCatalog::generated(10));
        fake.fail_detail("charmander", u32::MAX);
        view.mount().await.unwrap();

        assert_eq!(
            view.resolve_item("charmander").await,
            Err(CatalogError::Unresolved("charmander".into()))
        );
        let requests = fake.total_detail_requests();
        assert_eq!(requests, 4);
        assert_eq!(
            view.resolve_item("charmander").await,
            Err(CatalogError::Unresolved("charmander".into()))
        );
        assert_eq!(fake.total_detail_requests(), requests);

        let snapshot = view.snapshot().await;
        let entry = snapshot
            .visible
            .iter()
            .find(|e| e.stub.identifier == "charmander")
            .unwrap();
        assert_eq!(entry.status, ItemStatus::Unavailable);
    }

    #[tokio::test(start_paused = true)]
    async fn operations_after_unmount_are_rejected() {
        let (_, view) = view(FakeCatalog::generated(10));
        view.mount().await.unwrap();
        view.unmount();
        assert_eq!(view.load_next_page().await, Err(CatalogError::Cancelled));
        assert_eq!(
            view.set_filters(FilterState::default()).await,
            Err(CatalogError::Cancelled)
        );
        assert!(!view.is_mounted());
    }

    #[tokio::test(start_paused = true)]
    async fn unmount_while_waiting_for_the_lock_leaves_filters_alone() {
        let (_, view) = view(FakeCatalog::generated(20));
        view.mount().await.unwrap();

        let guard = view.inner.state.write().await;
        let pending = tokio::spawn({
            let view = view.clone();
            async move { view.set_search_term("char").await }
        });
        tokio::task::yield_now().await;
        view.unmount();
        drop(guard);

        assert_eq!(pending.await.unwrap(), Err(CatalogError::Cancelled));
        assert_eq!(view.filters().await.search_term, "");
    }

    #[tokio::test(start_paused = true)]
    async fn batch_results_landing_after_unmount_are_dropped() {
        let (fake, view) =
            view(FakeCatalog::generated(30).with_detail_latency(Duration::from_millis(50)));
        view.mount().await.unwrap();
        view.set_filters(FilterState::new("", ["fire"], std::iter::empty()))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        let requested = fake.total_detail_requests();
        assert!(requested > 0);

        // Details arrive while the state is locked, then the view goes away
        let guard = view.inner.state.write().await;
        tokio::time::sleep(Duration::from_millis(100)).await;
        view.unmount();
        drop(guard);
        view.settled().await;

        let snapshot = view.snapshot().await;
        assert!(snapshot.visible.is_empty());
        assert!(snapshot.detail_batch.is_loading());
        assert_eq!(fake.total_detail_requests(), requested);
    }
}
