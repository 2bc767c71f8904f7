//! Query state controller: page, search text and filters, plus the debounce
//! handle for free-text search.
//!
//! Every accepted change yields exactly one query to fetch. Filter changes and
//! debounce expiry reset the page to 1; page moves are clamped to the page
//! range of the last committed listing.

use std::time::Duration;

use shared::{
    domain::{PlanId, SubscriptionStatus},
    protocol::UsersQuery,
};
use tokio::task::JoinHandle;

pub const PAGE_SIZE: u32 = 15;
pub const DEFAULT_SEARCH_DEBOUNCE: Duration = Duration::from_millis(300);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryState {
    pub page: u32,
    pub search_text: String,
    pub plan_filter: Option<PlanId>,
    pub status_filter: Option<SubscriptionStatus>,
}

impl Default for QueryState {
    fn default() -> Self {
        Self {
            page: 1,
            search_text: String::new(),
            plan_filter: None,
            status_filter: None,
        }
    }
}

impl QueryState {
    pub fn page_size(&self) -> u32 {
        PAGE_SIZE
    }

    pub fn to_users_query(&self) -> UsersQuery {
        let search = self.search_text.trim();
        UsersQuery {
            page: self.page,
            page_size: PAGE_SIZE,
            search: (!search.is_empty()).then(|| search.to_string()),
            plan_id: self.plan_filter.clone(),
            status: self.status_filter,
        }
    }
}

/// An empty listing still has one (empty) page.
pub fn page_count(total_pages: u32) -> u32 {
    total_pages.max(1)
}

pub struct QueryStateController {
    query: QueryState,
    search_input: String,
    search_ticket: u64,
    search_timer: Option<JoinHandle<()>>,
}

impl Default for QueryStateController {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryStateController {
    pub fn new() -> Self {
        Self {
            query: QueryState::default(),
            search_input: String::new(),
            search_ticket: 0,
            search_timer: None,
        }
    }

    pub fn query(&self) -> &QueryState {
        &self.query
    }

    /// Text as typed, which may not be committed to the query yet.
    pub fn search_input(&self) -> &str {
        &self.search_input
    }

    pub fn has_pending_search(&self) -> bool {
        self.search_timer.is_some()
    }

    pub fn set_plan_filter(&mut self, plan_filter: Option<PlanId>) -> QueryState {
        self.query.plan_filter = plan_filter;
        self.query.page = 1;
        self.query.clone()
    }

    pub fn set_status_filter(&mut self, status_filter: Option<SubscriptionStatus>) -> QueryState {
        self.query.status_filter = status_filter;
        self.query.page = 1;
        self.query.clone()
    }

    /// Returns `None` when the clamped page equals the current one.
    pub fn set_page(&mut self, page: u32, total_pages: u32) -> Option<QueryState> {
        let page = page.clamp(1, page_count(total_pages));
        if page == self.query.page {
            return None;
        }
        self.query.page = page;
        Some(self.query.clone())
    }

    pub fn next_page(&mut self, total_pages: u32) -> Option<QueryState> {
        self.set_page(self.query.page.saturating_add(1), total_pages)
    }

    pub fn previous_page(&mut self, total_pages: u32) -> Option<QueryState> {
        self.set_page(self.query.page.saturating_sub(1), total_pages)
    }

    /// Records a keystroke and returns the ticket its debounce timer must present.
    pub fn stage_search(&mut self, text: impl Into<String>) -> u64 {
        self.search_input = text.into();
        self.search_ticket += 1;
        self.search_ticket
    }

    /// Installs the timer for the latest keystroke, aborting the previous one.
    pub fn arm_search_timer(&mut self, timer: JoinHandle<()>) {
        if let Some(previous) = self.search_timer.replace(timer) {
            previous.abort();
        }
    }

    /// Commits the typed text when `ticket` belongs to the latest keystroke.
    ///
    /// The timer handle is detached here, so a later keystroke cannot abort a
    /// fetch that is already under way.
    pub fn fire_search(&mut self, ticket: u64) -> Option<QueryState> {
        if ticket != self.search_ticket {
            return None;
        }
        drop(self.search_timer.take());
        self.query.search_text = self.search_input.clone();
        self.query.page = 1;
        Some(self.query.clone())
    }

    pub fn cancel_pending_search(&mut self) {
        self.search_ticket += 1;
        if let Some(timer) = self.search_timer.take() {
            timer.abort();
        }
    }

    pub fn clear_filters(&mut self) -> QueryState {
        self.cancel_pending_search();
        self.search_input.clear();
        self.query = QueryState::default();
        self.query.clone()
    }

    /// Used after a fetch reports fewer pages than the requested one.
    pub(crate) fn clamp_page(&mut self, total_pages: u32) -> Option<QueryState> {
        let last = page_count(total_pages);
        if self.query.page <= last {
            return None;
        }
        self.query.page = last;
        Some(self.query.clone())
    }
}

impl Drop for QueryStateController {
    fn drop(&mut self) {
        if let Some(timer) = self.search_timer.take() {
            timer.abort();
        }
    }
}
