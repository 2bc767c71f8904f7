//! Data orchestrator behind the tenant administration console.
//!
//! [`ConsoleController`] owns the only mutable [`ViewState`]. The query state
//! controller, fetch orchestrator, mutation coordinator and access gate
//! propose values; the controller commits them atomically.

use std::{
    sync::{Arc, Weak},
    time::Duration,
};

use async_trait::async_trait;
use shared::{
    domain::{PlanId, SubscriptionStatus, UserId},
    protocol::{AdminRosterEntry, MetricsSnapshot},
};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

pub mod access;
pub mod backend;
pub mod config;
pub mod error;
pub mod fetch;
pub mod mutation;
pub mod query;
pub mod view;

pub use access::{AccessGate, AccessLevel};
pub use backend::{ConsoleBackend, HttpConsoleBackend};
pub use config::{load_settings, ConsoleSettings, StaleResponsePolicy};
pub use error::{
    BackendError, ConsoleError, FetchFailure, FetchResource, MutationFailure, MutationKind,
    ValidationFailure,
};
pub use fetch::{FetchOrchestrator, FetchedSnapshot};
pub use mutation::{ConsistencyAction, MutationCoordinator};
pub use query::{QueryState, QueryStateController, PAGE_SIZE};
pub use view::{ConsoleView, LoadingFlags, ViewState};

/// A fetch that reports fewer pages than requested is retried at most this
/// many times with the clamped page before its result is committed as is.
const MAX_PAGE_CLAMP_REFETCHES: usize = 1;
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Invalidates state derived from the caller's session (entitlements, claims).
#[async_trait]
pub trait SessionReloader: Send + Sync {
    async fn reload_session(&self) -> Result<(), BackendError>;
}

/// Hosts that keep nothing session-derived outside the fetched listing.
pub struct NoSessionCache;

#[async_trait]
impl SessionReloader for NoSessionCache {
    async fn reload_session(&self) -> Result<(), BackendError> {
        Ok(())
    }
}

/// Asks the operator to confirm a demotion before it is sent.
#[async_trait]
pub trait ConfirmationPrompt: Send + Sync {
    async fn confirm_demotion(&self, entry: &AdminRosterEntry) -> bool;
}

/// Default prompt: every demotion is declined until a host supplies a real prompt.
pub struct DeclineConfirmations;

#[async_trait]
impl ConfirmationPrompt for DeclineConfirmations {
    async fn confirm_demotion(&self, _entry: &AdminRosterEntry) -> bool {
        false
    }
}

#[derive(Debug, Clone)]
pub enum ConsoleEvent {
    ViewCommitted { generation: u64 },
    MetricsRefreshed,
    StaleFetchDiscarded { generation: u64 },
    SessionReloaded,
    /// User-visible failure notice, sent once per fetch or mutation failure.
    Notification(ConsoleError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    Committed { generation: u64 },
    Discarded { generation: u64 },
    /// The request did not change the query, so nothing was fetched.
    Unchanged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MutationReport {
    pub action: ConsistencyAction,
    pub refresh: FetchOutcome,
}

enum FinishedFetch {
    Done(FetchOutcome),
    PageClamped,
}

struct ConsoleState {
    query: QueryStateController,
    view: Arc<ViewState>,
    issued_generation: u64,
    in_flight: usize,
    /// Fetches issued before the last full reload never commit.
    generation_floor: u64,
    pending_admin_email: String,
}

impl ConsoleState {
    fn set_listing_flag(&mut self, listing: bool) {
        if self.view.loading.listing != listing {
            self.view = Arc::new(self.view.with_loading(LoadingFlags {
                listing,
                ..self.view.loading
            }));
        }
    }
}

pub struct ConsoleController {
    orchestrator: FetchOrchestrator,
    mutations: MutationCoordinator,
    session: Arc<dyn SessionReloader>,
    confirmations: Arc<dyn ConfirmationPrompt>,
    search_debounce: Duration,
    stale_responses: StaleResponsePolicy,
    inner: Mutex<ConsoleState>,
    events: broadcast::Sender<ConsoleEvent>,
}

impl ConsoleController {
    pub fn new(backend: Arc<dyn ConsoleBackend>, settings: &ConsoleSettings) -> Arc<Self> {
        Self::new_with_dependencies(
            backend,
            Arc::new(NoSessionCache),
            Arc::new(DeclineConfirmations),
            settings,
        )
    }

    pub fn new_with_dependencies(
        backend: Arc<dyn ConsoleBackend>,
        session: Arc<dyn SessionReloader>,
        confirmations: Arc<dyn ConfirmationPrompt>,
        settings: &ConsoleSettings,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Arc::new(Self {
            orchestrator: FetchOrchestrator::new(Arc::clone(&backend)),
            mutations: MutationCoordinator::new(backend),
            session,
            confirmations,
            search_debounce: settings.search_debounce(),
            stale_responses: settings.stale_responses,
            inner: Mutex::new(ConsoleState {
                query: QueryStateController::new(),
                view: Arc::new(ViewState::not_loaded(QueryState::default())),
                issued_generation: 0,
                in_flight: 0,
                generation_floor: 0,
                pending_admin_email: String::new(),
            }),
            events,
        })
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ConsoleEvent> {
        self.events.subscribe()
    }

    pub async fn view(&self) -> Arc<ViewState> {
        Arc::clone(&self.inner.lock().await.view)
    }

    /// The query the next coordinated fetch will use.
    pub async fn query(&self) -> QueryState {
        self.inner.lock().await.query.query().clone()
    }

    pub async fn search_input(&self) -> String {
        self.inner.lock().await.query.search_input().to_string()
    }

    pub async fn has_pending_search(&self) -> bool {
        self.inner.lock().await.query.has_pending_search()
    }

    pub async fn access_level(&self) -> AccessLevel {
        AccessGate::level(&self.inner.lock().await.view)
    }

    pub async fn render(&self) -> ConsoleView {
        let state = self.inner.lock().await;
        ConsoleView::render(
            &state.view,
            state.query.search_input(),
            &state.pending_admin_email,
        )
    }

    pub async fn pending_admin_email(&self) -> String {
        self.inner.lock().await.pending_admin_email.clone()
    }

    pub async fn set_pending_admin_email(&self, email: impl Into<String>) {
        self.inner.lock().await.pending_admin_email = email.into();
    }

    /// Coordinated fetch with the current query.
    pub async fn load_all(&self) -> Result<FetchOutcome, ConsoleError> {
        let mut clamp_refetches = 0;
        loop {
            let (generation, query) = self.begin_fetch().await;
            let result = self.orchestrator.load_all(&query).await;
            let allow_clamp = clamp_refetches < MAX_PAGE_CLAMP_REFETCHES;
            match self.finish_fetch(generation, result, allow_clamp).await? {
                FinishedFetch::Done(outcome) => return Ok(outcome),
                FinishedFetch::PageClamped => clamp_refetches += 1,
            }
        }
    }

    async fn begin_fetch(&self) -> (u64, QueryState) {
        let mut state = self.inner.lock().await;
        state.issued_generation += 1;
        state.in_flight += 1;
        state.set_listing_flag(true);
        let query = state.query.query().clone();
        debug!(
            generation = state.issued_generation,
            page = query.page,
            "console: coordinated fetch issued"
        );
        (state.issued_generation, query)
    }

    async fn finish_fetch(
        &self,
        generation: u64,
        result: Result<FetchedSnapshot, FetchFailure>,
        allow_clamp: bool,
    ) -> Result<FinishedFetch, ConsoleError> {
        let mut state = self.inner.lock().await;
        state.in_flight = state.in_flight.saturating_sub(1);
        let still_loading = state.in_flight > 0;
        let latest = generation == state.issued_generation;
        let stale = generation < state.generation_floor
            || (!latest && self.stale_responses == StaleResponsePolicy::Discard);

        if stale {
            state.set_listing_flag(still_loading);
            debug!(
                generation,
                latest = state.issued_generation,
                succeeded = result.is_ok(),
                "console: stale coordinated fetch discarded"
            );
            let _ = self
                .events
                .send(ConsoleEvent::StaleFetchDiscarded { generation });
            return Ok(FinishedFetch::Done(FetchOutcome::Discarded { generation }));
        }

        match result {
            Ok(snapshot) => {
                if allow_clamp && snapshot.query == *state.query.query() {
                    if let Some(clamped) = state.query.clamp_page(snapshot.users.total_pages) {
                        info!(
                            requested_page = snapshot.query.page,
                            total_pages = snapshot.users.total_pages,
                            clamped_page = clamped.page,
                            "console: page out of range, refetching"
                        );
                        return Ok(FinishedFetch::PageClamped);
                    }
                }
                if snapshot.query.page > query::page_count(snapshot.users.total_pages) {
                    warn!(
                        page = snapshot.query.page,
                        total_pages = snapshot.users.total_pages,
                        "console: committing listing past its last page"
                    );
                }

                state.view = Arc::new(state.view.committed(snapshot, still_loading));
                info!(
                    generation,
                    users = state.view.users.len(),
                    total_pages = state.view.total_pages,
                    caller_is_superadmin = state.view.caller_is_superadmin,
                    "console: coordinated fetch committed"
                );
                let _ = self.events.send(ConsoleEvent::ViewCommitted { generation });
                Ok(FinishedFetch::Done(FetchOutcome::Committed { generation }))
            }
            Err(failure) => {
                state.set_listing_flag(still_loading);
                drop(state);
                Err(self.surface(failure.into()))
            }
        }
    }

    /// Refreshes only the metrics slice; users, roster and query are untouched.
    pub async fn refresh_metrics_only(&self) -> Result<MetricsSnapshot, ConsoleError> {
        {
            let mut state = self.inner.lock().await;
            state.view = Arc::new(state.view.with_loading(LoadingFlags {
                metrics: true,
                ..state.view.loading
            }));
        }

        let result = self.orchestrator.refresh_metrics_only().await;

        let mut state = self.inner.lock().await;
        match result {
            Ok(metrics) => {
                state.view = Arc::new(state.view.with_metrics(metrics.clone()));
                debug!("console: metrics refreshed");
                let _ = self.events.send(ConsoleEvent::MetricsRefreshed);
                Ok(metrics)
            }
            Err(failure) => {
                state.view = Arc::new(state.view.with_loading(LoadingFlags {
                    metrics: false,
                    ..state.view.loading
                }));
                drop(state);
                Err(self.surface(failure.into()))
            }
        }
    }

    /// Records typed search text. Only the timer of the most recent keystroke
    /// fires; when it does, the page resets to 1 and one coordinated fetch runs.
    pub async fn set_search_text(self: &Arc<Self>, text: impl Into<String>) {
        let mut state = self.inner.lock().await;
        let ticket = state.query.stage_search(text);
        let console: Weak<Self> = Arc::downgrade(self);
        let delay = self.search_debounce;
        let timer = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(console) = console.upgrade() {
                console.fire_search_debounce(ticket).await;
            }
        });
        state.query.arm_search_timer(timer);
    }

    async fn fire_search_debounce(&self, ticket: u64) {
        let fired = self.inner.lock().await.query.fire_search(ticket);
        let Some(query) = fired else {
            return;
        };
        debug!(search = %query.search_text, "console: search debounce expired");
        if let Err(err) = self.load_all().await {
            debug!(error = %err, "console: debounced fetch failed");
        }
    }

    pub async fn set_plan_filter(
        &self,
        plan_filter: Option<PlanId>,
    ) -> Result<FetchOutcome, ConsoleError> {
        self.inner.lock().await.query.set_plan_filter(plan_filter);
        self.load_all().await
    }

    pub async fn set_status_filter(
        &self,
        status_filter: Option<SubscriptionStatus>,
    ) -> Result<FetchOutcome, ConsoleError> {
        self.inner.lock().await.query.set_status_filter(status_filter);
        self.load_all().await
    }

    /// Resets search and filters in one step, cancelling any pending debounce.
    pub async fn clear_filters(&self) -> Result<FetchOutcome, ConsoleError> {
        self.inner.lock().await.query.clear_filters();
        self.load_all().await
    }

    pub async fn next_page(&self) -> Result<FetchOutcome, ConsoleError> {
        let moved = {
            let mut state = self.inner.lock().await;
            let total_pages = state.view.total_pages;
            state.query.next_page(total_pages)
        };
        self.load_if_moved(moved).await
    }

    pub async fn previous_page(&self) -> Result<FetchOutcome, ConsoleError> {
        let moved = {
            let mut state = self.inner.lock().await;
            let total_pages = state.view.total_pages;
            state.query.previous_page(total_pages)
        };
        self.load_if_moved(moved).await
    }

    pub async fn go_to_page(&self, page: u32) -> Result<FetchOutcome, ConsoleError> {
        let moved = {
            let mut state = self.inner.lock().await;
            let total_pages = state.view.total_pages;
            state.query.set_page(page, total_pages)
        };
        self.load_if_moved(moved).await
    }

    async fn load_if_moved(&self, moved: Option<QueryState>) -> Result<FetchOutcome, ConsoleError> {
        match moved {
            Some(_) => self.load_all().await,
            None => Ok(FetchOutcome::Unchanged),
        }
    }

    pub async fn change_user_plan(
        &self,
        user_id: UserId,
        plan_id: Option<PlanId>,
        status: SubscriptionStatus,
    ) -> Result<MutationReport, ConsoleError> {
        let action = self
            .mutations
            .change_user_plan(user_id, plan_id, status)
            .await
            .map_err(|err| self.surface(err))?;
        self.restore_consistency(action).await
    }

    pub async fn toggle_user_active(
        &self,
        user_id: UserId,
    ) -> Result<MutationReport, ConsoleError> {
        let action = self
            .mutations
            .toggle_user_active(user_id)
            .await
            .map_err(|err| self.surface(err))?;
        self.restore_consistency(action).await
    }

    /// Clears the pending admin email once the backend accepts the promotion.
    pub async fn promote_to_admin(&self, email: &str) -> Result<MutationReport, ConsoleError> {
        let view = self.view().await;
        let action = self
            .mutations
            .promote_to_admin(&view, email)
            .await
            .map_err(|err| self.surface(err))?;
        self.inner.lock().await.pending_admin_email.clear();
        self.restore_consistency(action).await
    }

    /// Goes through the confirmation prompt; superadmin entries are refused.
    pub async fn demote_admin(&self, user_id: UserId) -> Result<MutationReport, ConsoleError> {
        let view = self.view().await;
        let action = self
            .mutations
            .demote_admin(&view, user_id, self.confirmations.as_ref())
            .await
            .map_err(|err| self.surface(err))?;
        self.restore_consistency(action).await
    }

    /// Changes the caller's own plan, then performs a full reload.
    pub async fn set_self_test_plan(
        &self,
        plan_id: Option<PlanId>,
        status: SubscriptionStatus,
    ) -> Result<MutationReport, ConsoleError> {
        let action = self
            .mutations
            .set_self_test_plan(plan_id, status)
            .await
            .map_err(|err| self.surface(err))?;
        self.restore_consistency(action).await
    }

    async fn restore_consistency(
        &self,
        action: ConsistencyAction,
    ) -> Result<MutationReport, ConsoleError> {
        let refresh = match action {
            ConsistencyAction::ScopedRefetch => self.load_all().await?,
            ConsistencyAction::FullReload => self.invalidate_session_and_refetch_all().await?,
        };
        Ok(MutationReport { action, refresh })
    }

    /// Drops everything derived from the current session: query, view, pending
    /// input and in-flight fetches. Then reloads the session and refetches.
    pub async fn invalidate_session_and_refetch_all(&self) -> Result<FetchOutcome, ConsoleError> {
        {
            let mut state = self.inner.lock().await;
            state.query.clear_filters();
            state.pending_admin_email.clear();
            state.generation_floor = state.issued_generation + 1;
            state.view = Arc::new(ViewState::not_loaded(QueryState::default()));
        }
        info!("console: session invalidated, reloading");

        if let Err(error) = self.session.reload_session().await {
            let failure = FetchFailure::single(FetchResource::Session, error);
            return Err(self.surface(failure.into()));
        }
        let _ = self.events.send(ConsoleEvent::SessionReloaded);

        self.load_all().await
    }

    /// Fetch and mutation failures become one notification; validation
    /// failures stay with the caller.
    fn surface(&self, err: ConsoleError) -> ConsoleError {
        if !matches!(err, ConsoleError::Validation(_)) {
            let _ = self.events.send(ConsoleEvent::Notification(err.clone()));
        }
        err
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;

#[cfg(test)]
#[path = "tests/backend_tests.rs"]
mod backend_tests;
