//! View state snapshots and the host-facing view model rendered from them.

use shared::{
    domain::{Role, UserId},
    protocol::{AdminRosterEntry, MetricsSnapshot, UserRecord},
};

use crate::{
    access::AccessGate,
    fetch::FetchedSnapshot,
    query::{page_count, QueryState},
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadingFlags {
    /// At least one coordinated fetch is in flight.
    pub listing: bool,
    /// A metrics-only refresh is in flight.
    pub metrics: bool,
}

/// Immutable snapshot owned by the console controller and replaced wholesale on commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewState {
    /// Query answered by `users` and `total_pages`.
    pub query: QueryState,
    pub metrics: Option<MetricsSnapshot>,
    pub users: Vec<UserRecord>,
    pub total_pages: u32,
    pub admins: Vec<AdminRosterEntry>,
    pub caller_is_superadmin: bool,
    pub loaded: bool,
    pub loading: LoadingFlags,
}

impl ViewState {
    pub fn not_loaded(query: QueryState) -> Self {
        Self {
            query,
            metrics: None,
            users: Vec::new(),
            total_pages: 0,
            admins: Vec::new(),
            caller_is_superadmin: false,
            loaded: false,
            loading: LoadingFlags::default(),
        }
    }

    pub(crate) fn committed(&self, snapshot: FetchedSnapshot, still_loading: bool) -> Self {
        Self {
            query: snapshot.query,
            metrics: Some(snapshot.metrics),
            users: snapshot.users.users,
            total_pages: snapshot.users.total_pages,
            admins: snapshot.roster.admins,
            caller_is_superadmin: snapshot.roster.caller_is_superadmin,
            loaded: true,
            loading: LoadingFlags {
                listing: still_loading,
                metrics: self.loading.metrics,
            },
        }
    }

    pub(crate) fn with_metrics(&self, metrics: MetricsSnapshot) -> Self {
        Self {
            metrics: Some(metrics),
            loading: LoadingFlags {
                metrics: false,
                ..self.loading
            },
            ..self.clone()
        }
    }

    pub(crate) fn with_loading(&self, loading: LoadingFlags) -> Self {
        Self {
            loading,
            ..self.clone()
        }
    }

    pub fn admin_entry(&self, user_id: UserId) -> Option<&AdminRosterEntry> {
        self.admins.iter().find(|entry| entry.id == user_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsPanel {
    pub total_users: u64,
    pub active_users: u64,
    pub paying_users: u64,
    pub monthly_revenue: String,
    pub total_properties: u64,
    pub whatsapp_connected_users: u64,
    pub messages_last_30_days: u64,
}

impl From<&MetricsSnapshot> for MetricsPanel {
    fn from(metrics: &MetricsSnapshot) -> Self {
        Self {
            total_users: metrics.total_users,
            active_users: metrics.active_users,
            paying_users: metrics.paying_users,
            monthly_revenue: format_cents(metrics.monthly_revenue_cents),
            total_properties: metrics.total_properties,
            whatsapp_connected_users: metrics.whatsapp_connected_users,
            messages_last_30_days: metrics.messages_last_30_days,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRow {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub is_admin: bool,
    pub plan: Option<String>,
    pub status: Option<String>,
    /// `count/limit`, or just the count when the user has no subscription.
    pub property_usage: String,
    /// Display hint only; the backend enforces limits.
    pub over_property_limit: bool,
    pub whatsapp_connected: bool,
    pub is_active: bool,
}

impl From<&UserRecord> for UserRow {
    fn from(user: &UserRecord) -> Self {
        let (plan, status, property_usage, over_property_limit) = match &user.subscription {
            Some(sub) => (
                Some(sub.plan_id.to_string()),
                Some(sub.status.to_string()),
                format!("{}/{}", user.property_count, sub.property_limit),
                user.property_count > sub.property_limit,
            ),
            None => (None, None, user.property_count.to_string(), false),
        };

        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            is_admin: user.role == Role::Admin,
            plan,
            status,
            property_usage,
            over_property_limit,
            whatsapp_connected: user.whatsapp_connected,
            is_active: user.is_active,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginationView {
    pub page: u32,
    pub total_pages: u32,
    pub has_previous: bool,
    pub has_next: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminRow {
    pub id: UserId,
    pub email: String,
    pub is_superadmin: bool,
    pub can_demote: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminManagementView {
    pub admins: Vec<AdminRow>,
    pub pending_email: String,
}

/// Everything a host needs to draw the console. Built fresh from a `ViewState`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsoleView {
    pub loaded: bool,
    pub loading: LoadingFlags,
    pub search_input: String,
    pub query: QueryState,
    pub metrics: Option<MetricsPanel>,
    pub users: Vec<UserRow>,
    pub pagination: PaginationView,
    /// Present only for superadmins; hidden rather than disabled otherwise.
    pub admin_management: Option<AdminManagementView>,
}

impl ConsoleView {
    pub fn render(view: &ViewState, search_input: &str, pending_admin_email: &str) -> Self {
        let total_pages = page_count(view.total_pages);
        let page = view.query.page;
        let admin_management = AccessGate::shows_admin_management(view).then(|| {
            AdminManagementView {
                admins: view
                    .admins
                    .iter()
                    .map(|entry| AdminRow {
                        id: entry.id,
                        email: entry.email.clone(),
                        is_superadmin: entry.is_superadmin,
                        can_demote: !entry.is_superadmin,
                    })
                    .collect(),
                pending_email: pending_admin_email.to_string(),
            }
        });

        Self {
            loaded: view.loaded,
            loading: view.loading,
            search_input: search_input.to_string(),
            query: view.query.clone(),
            metrics: view.metrics.as_ref().map(MetricsPanel::from),
            users: view.users.iter().map(UserRow::from).collect(),
            pagination: PaginationView {
                page,
                total_pages,
                has_previous: page > 1,
                has_next: page < total_pages,
            },
            admin_management,
        }
    }
}

fn format_cents(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let cents = cents.unsigned_abs();
    format!("{sign}{}.{:02}", cents / 100, cents % 100)
}
