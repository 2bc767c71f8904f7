use super::*;
use std::collections::HashMap;

use chrono::{TimeZone, Utc};
use shared::{
    domain::Role,
    protocol::{AdminRoster, PlanAssignment, UserRecord, UsersPage, UsersQuery},
};

use crate::backend::BackendResult;

struct Script {
    metrics_calls: u64,
    users_calls: Vec<UsersQuery>,
    roster_calls: u32,
    total_pages: u32,
    caller_is_superadmin: bool,
    admins: Vec<AdminRosterEntry>,
    known_emails: Vec<String>,
    fail_metrics: Option<BackendError>,
    fail_users: Option<BackendError>,
    fail_roster: Option<BackendError>,
    fail_writes: Option<BackendError>,
    /// Users requests filtered by these plans resolve after the given delay.
    plan_delays: HashMap<String, Duration>,
    writes: Vec<String>,
}

struct ScriptedBackend {
    script: Mutex<Script>,
}

impl ScriptedBackend {
    fn new(total_pages: u32, caller_is_superadmin: bool) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(Script {
                metrics_calls: 0,
                users_calls: Vec::new(),
                roster_calls: 0,
                total_pages,
                caller_is_superadmin,
                admins: vec![
                    AdminRosterEntry {
                        id: UserId::new_v4(),
                        email: "root@example.com".into(),
                        is_superadmin: true,
                    },
                    AdminRosterEntry {
                        id: UserId::new_v4(),
                        email: "ops@example.com".into(),
                        is_superadmin: false,
                    },
                ],
                known_emails: vec!["new-admin@example.com".into()],
                fail_metrics: None,
                fail_users: None,
                fail_roster: None,
                fail_writes: None,
                plan_delays: HashMap::new(),
                writes: Vec::new(),
            }),
        })
    }

    async fn admin_id(&self, email: &str) -> UserId {
        let script = self.script.lock().await;
        script
            .admins
            .iter()
            .find(|entry| entry.email == email)
            .map(|entry| entry.id)
            .expect("scripted admin")
    }

    async fn users_calls(&self) -> Vec<UsersQuery> {
        self.script.lock().await.users_calls.clone()
    }

    async fn writes(&self) -> Vec<String> {
        self.script.lock().await.writes.clone()
    }

    async fn record_write(&self, write: String) -> BackendResult<()> {
        let mut script = self.script.lock().await;
        if let Some(err) = script.fail_writes.clone() {
            return Err(err);
        }
        script.writes.push(write);
        Ok(())
    }
}

fn user_on_page(page: u32) -> UserRecord {
    UserRecord {
        id: UserId::new_v4(),
        name: format!("User on page {page}"),
        email: format!("page{page}@example.com"),
        role: Role::Member,
        subscription: None,
        property_count: 0,
        whatsapp_connected: false,
        is_active: true,
        created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
    }
}

#[async_trait]
impl ConsoleBackend for ScriptedBackend {
    async fn get_metrics(&self) -> BackendResult<MetricsSnapshot> {
        let mut script = self.script.lock().await;
        if let Some(err) = script.fail_metrics.clone() {
            return Err(err);
        }
        script.metrics_calls += 1;
        Ok(MetricsSnapshot {
            total_users: script.metrics_calls,
            active_users: 1,
            paying_users: 1,
            monthly_revenue_cents: 4_900,
            total_properties: 3,
            whatsapp_connected_users: 0,
            messages_last_30_days: 12,
            generated_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        })
    }

    async fn get_users(&self, query: &UsersQuery) -> BackendResult<UsersPage> {
        let (delay, result) = {
            let mut script = self.script.lock().await;
            script.users_calls.push(query.clone());
            let delay = query
                .plan_id
                .as_ref()
                .and_then(|plan| script.plan_delays.get(plan.as_str()).copied());
            let result = match script.fail_users.clone() {
                Some(err) => Err(err),
                None => Ok(UsersPage {
                    users: if query.page <= script.total_pages {
                        vec![user_on_page(query.page)]
                    } else {
                        Vec::new()
                    },
                    total_pages: script.total_pages,
                }),
            };
            (delay, result)
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        result
    }

    async fn get_admin_roster(&self) -> BackendResult<AdminRoster> {
        let mut script = self.script.lock().await;
        if let Some(err) = script.fail_roster.clone() {
            return Err(err);
        }
        script.roster_calls += 1;
        Ok(AdminRoster {
            admins: script.admins.clone(),
            caller_is_superadmin: script.caller_is_superadmin,
        })
    }

    async fn change_user_plan(
        &self,
        user_id: UserId,
        assignment: &PlanAssignment,
    ) -> BackendResult<()> {
        self.record_write(format!("plan {user_id} {}", assignment.status))
            .await
    }

    async fn toggle_user_active(&self, user_id: UserId) -> BackendResult<()> {
        self.record_write(format!("toggle {user_id}")).await
    }

    async fn promote_to_admin(&self, email: &str) -> BackendResult<()> {
        let known = self
            .script
            .lock()
            .await
            .known_emails
            .iter()
            .any(|known| known == email);
        if !known {
            return Err(BackendError::NotFound(format!("no user with email {email}")));
        }
        self.record_write(format!("promote {email}")).await
    }

    async fn demote_admin(&self, user_id: UserId) -> BackendResult<()> {
        self.record_write(format!("demote {user_id}")).await
    }

    async fn set_self_test_plan(&self, assignment: &PlanAssignment) -> BackendResult<()> {
        self.record_write(format!("self-plan {}", assignment.status))
            .await
    }
}

#[derive(Default)]
struct CountingSession {
    reloads: Mutex<u32>,
    fail_with: Option<BackendError>,
}

#[async_trait]
impl SessionReloader for CountingSession {
    async fn reload_session(&self) -> Result<(), BackendError> {
        if let Some(err) = &self.fail_with {
            return Err(err.clone());
        }
        *self.reloads.lock().await += 1;
        Ok(())
    }
}

struct AcceptConfirmations;

#[async_trait]
impl ConfirmationPrompt for AcceptConfirmations {
    async fn confirm_demotion(&self, _entry: &AdminRosterEntry) -> bool {
        true
    }
}

fn settings(stale_responses: StaleResponsePolicy) -> ConsoleSettings {
    ConsoleSettings {
        stale_responses,
        ..ConsoleSettings::default()
    }
}

fn controller(backend: &Arc<ScriptedBackend>) -> Arc<ConsoleController> {
    ConsoleController::new(backend.clone(), &settings(StaleResponsePolicy::Discard))
}

fn plan(raw: &str) -> Option<PlanId> {
    PlanId::parse(raw)
}

fn server_error() -> BackendError {
    BackendError::Status {
        status: 500,
        code: None,
        message: "boom".into(),
    }
}

fn drain(events: &mut broadcast::Receiver<ConsoleEvent>) -> Vec<ConsoleEvent> {
    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }
    seen
}

fn notifications(events: &[ConsoleEvent]) -> usize {
    events
        .iter()
        .filter(|event| matches!(event, ConsoleEvent::Notification(_)))
        .count()
}

async fn wait_for_commit(events: &mut broadcast::Receiver<ConsoleEvent>) -> u64 {
    loop {
        match events.recv().await {
            Ok(ConsoleEvent::ViewCommitted { generation }) => return generation,
            Ok(_) => continue,
            Err(err) => panic!("event stream closed: {err}"),
        }
    }
}

#[tokio::test]
async fn load_all_commits_every_resource_in_one_step() {
    let backend = ScriptedBackend::new(3, true);
    let console = controller(&backend);
    let mut events = console.subscribe_events();

    let before = console.view().await;
    assert!(!before.loaded);
    assert_eq!(console.access_level().await, AccessLevel::Member);

    let outcome = console.load_all().await.expect("load");
    assert_eq!(outcome, FetchOutcome::Committed { generation: 1 });

    let view = console.view().await;
    assert!(view.loaded);
    assert!(!view.loading.listing);
    assert_eq!(view.metrics.as_ref().map(|m| m.total_users), Some(1));
    assert_eq!(view.users.len(), 1);
    assert_eq!(view.total_pages, 3);
    assert_eq!(view.admins.len(), 2);
    assert!(view.caller_is_superadmin);
    assert_eq!(console.access_level().await, AccessLevel::Superadmin);

    let seen = drain(&mut events);
    assert!(matches!(
        seen.as_slice(),
        [ConsoleEvent::ViewCommitted { generation: 1 }]
    ));
}

#[tokio::test]
async fn partial_fetch_failure_keeps_previous_view_and_notifies_once() {
    let backend = ScriptedBackend::new(3, false);
    let console = controller(&backend);
    console.load_all().await.expect("initial load");
    let before = console.view().await;

    {
        let mut script = backend.script.lock().await;
        script.fail_users = Some(BackendError::Transport("connection reset".into()));
        script.fail_roster = Some(server_error());
    }
    let mut events = console.subscribe_events();

    let err = console.load_all().await.expect_err("must fail");
    match &err {
        ConsoleError::Fetch(failure) => assert_eq!(
            failure.failed_resources(),
            vec![FetchResource::Users, FetchResource::AdminRoster]
        ),
        other => panic!("unexpected error: {other:?}"),
    }

    assert_eq!(*console.view().await, *before);
    assert_eq!(notifications(&drain(&mut events)), 1);
}

#[tokio::test(start_paused = true)]
async fn typing_fires_one_fetch_after_the_debounce() {
    let backend = ScriptedBackend::new(3, false);
    let console = controller(&backend);
    console.load_all().await.expect("initial load");
    assert_eq!(
        console.next_page().await.expect("page 2"),
        FetchOutcome::Committed { generation: 2 }
    );
    let mut events = console.subscribe_events();

    for text in ["a", "ad", "adm"] {
        console.set_search_text(text).await;
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    assert!(console.has_pending_search().await);
    assert_eq!(backend.users_calls().await.len(), 2);

    let generation = tokio::time::timeout(Duration::from_secs(5), wait_for_commit(&mut events))
        .await
        .expect("debounced fetch");
    assert_eq!(generation, 3);

    let calls = backend.users_calls().await;
    assert_eq!(calls.len(), 3);
    let last = calls.last().expect("debounced query");
    assert_eq!(last.search.as_deref(), Some("adm"));
    assert_eq!(last.page, 1);

    let query = console.query().await;
    assert_eq!(query.search_text, "adm");
    assert_eq!(query.page, 1);
    assert!(!console.has_pending_search().await);
}

#[tokio::test(start_paused = true)]
async fn clearing_filters_cancels_a_pending_search() {
    let backend = ScriptedBackend::new(1, false);
    let console = controller(&backend);

    console.set_search_text("stale").await;
    console.clear_filters().await.expect("clear");
    tokio::time::sleep(Duration::from_secs(1)).await;

    let calls = backend.users_calls().await;
    assert_eq!(calls.len(), 1);
    assert!(calls.iter().all(|query| query.search.is_none()));
    assert_eq!(console.search_input().await, "");
    assert!(!console.has_pending_search().await);
}

#[tokio::test(start_paused = true)]
async fn older_response_is_discarded_by_default() {
    let backend = ScriptedBackend::new(2, false);
    {
        let mut script = backend.script.lock().await;
        script
            .plan_delays
            .insert("basic".into(), Duration::from_millis(200));
        script.plan_delays.insert("pro".into(), Duration::from_millis(10));
    }
    let console = controller(&backend);
    let mut events = console.subscribe_events();

    let slow = {
        let console = console.clone();
        tokio::spawn(async move { console.set_plan_filter(plan("basic")).await })
    };
    tokio::time::sleep(Duration::from_millis(1)).await;

    let fast = console.set_plan_filter(plan("pro")).await.expect("pro");
    assert_eq!(fast, FetchOutcome::Committed { generation: 2 });
    assert!(console.view().await.loading.listing);

    let slow = slow.await.expect("join").expect("basic");
    assert_eq!(slow, FetchOutcome::Discarded { generation: 1 });

    let view = console.view().await;
    assert_eq!(view.query.plan_filter, plan("pro"));
    assert!(!view.loading.listing);
    assert!(drain(&mut events)
        .iter()
        .any(|event| matches!(event, ConsoleEvent::StaleFetchDiscarded { generation: 1 })));
}

#[tokio::test(start_paused = true)]
async fn last_writer_wins_commits_the_older_response() {
    let backend = ScriptedBackend::new(2, false);
    {
        let mut script = backend.script.lock().await;
        script
            .plan_delays
            .insert("basic".into(), Duration::from_millis(200));
        script.plan_delays.insert("pro".into(), Duration::from_millis(10));
    }
    let console =
        ConsoleController::new(backend.clone(), &settings(StaleResponsePolicy::LastWriterWins));

    let slow = {
        let console = console.clone();
        tokio::spawn(async move { console.set_plan_filter(plan("basic")).await })
    };
    tokio::time::sleep(Duration::from_millis(1)).await;
    console.set_plan_filter(plan("pro")).await.expect("pro");

    let slow = slow.await.expect("join").expect("basic");
    assert_eq!(slow, FetchOutcome::Committed { generation: 1 });

    let view = console.view().await;
    assert_eq!(view.query.plan_filter, plan("basic"));
    assert!(!view.loading.listing);
    assert_eq!(console.query().await.plan_filter, plan("pro"));
}

#[tokio::test]
async fn failed_mutation_leaves_view_untouched() {
    let backend = ScriptedBackend::new(2, true);
    let console = controller(&backend);
    console.load_all().await.expect("load");
    let before = console.view().await;
    backend.script.lock().await.fail_writes = Some(server_error());
    let mut events = console.subscribe_events();

    let target = before.users[0].id;
    let err = console
        .change_user_plan(target, plan("pro"), SubscriptionStatus::Active)
        .await
        .expect_err("write fails");
    assert!(matches!(
        err,
        ConsoleError::Mutation(MutationFailure {
            kind: MutationKind::ChangePlan,
            ..
        })
    ));

    assert!(Arc::ptr_eq(&before, &console.view().await));
    assert_eq!(backend.users_calls().await.len(), 1);
    assert_eq!(notifications(&drain(&mut events)), 1);
}

#[tokio::test]
async fn successful_mutation_refetches_with_the_current_query() {
    let backend = ScriptedBackend::new(3, false);
    let console = controller(&backend);
    console.load_all().await.expect("load");
    console
        .set_status_filter(Some(SubscriptionStatus::Trialing))
        .await
        .expect("filter");
    console.next_page().await.expect("page 2");

    let target = console.view().await.users[0].id;
    let report = console.toggle_user_active(target).await.expect("toggle");
    assert_eq!(report.action, ConsistencyAction::ScopedRefetch);
    assert!(matches!(report.refresh, FetchOutcome::Committed { .. }));

    let calls = backend.users_calls().await;
    let last = calls.last().expect("refetch");
    assert_eq!(last.page, 2);
    assert_eq!(last.status, Some(SubscriptionStatus::Trialing));
    assert_eq!(backend.writes().await, vec![format!("toggle {target}")]);
}

#[tokio::test]
async fn self_test_plan_triggers_a_full_reload() {
    let backend = ScriptedBackend::new(3, true);
    let session = Arc::new(CountingSession::default());
    let console = ConsoleController::new_with_dependencies(
        backend.clone(),
        session.clone(),
        Arc::new(DeclineConfirmations),
        &settings(StaleResponsePolicy::Discard),
    );
    console.load_all().await.expect("load");
    console.set_plan_filter(plan("pro")).await.expect("filter");
    console.set_pending_admin_email("half-typed@").await;
    let mut events = console.subscribe_events();

    let report = console
        .set_self_test_plan(plan("enterprise"), SubscriptionStatus::Active)
        .await
        .expect("self plan");
    assert_eq!(report.action, ConsistencyAction::FullReload);
    assert!(matches!(report.refresh, FetchOutcome::Committed { .. }));

    assert_eq!(*session.reloads.lock().await, 1);
    assert_eq!(console.query().await, QueryState::default());
    assert_eq!(console.pending_admin_email().await, "");
    let view = console.view().await;
    assert!(view.loaded);
    assert_eq!(view.query, QueryState::default());
    assert!(drain(&mut events)
        .iter()
        .any(|event| matches!(event, ConsoleEvent::SessionReloaded)));
}

#[tokio::test]
async fn failed_session_reload_surfaces_as_session_fetch_failure() {
    let backend = ScriptedBackend::new(1, false);
    let session = Arc::new(CountingSession {
        reloads: Mutex::new(0),
        fail_with: Some(BackendError::Transport("offline".into())),
    });
    let console = ConsoleController::new_with_dependencies(
        backend.clone(),
        session,
        Arc::new(DeclineConfirmations),
        &settings(StaleResponsePolicy::Discard),
    );

    let err = console
        .invalidate_session_and_refetch_all()
        .await
        .expect_err("session reload fails");
    match err {
        ConsoleError::Fetch(failure) => {
            assert_eq!(failure.failed_resources(), vec![FetchResource::Session])
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(backend.users_calls().await.is_empty());
}

#[tokio::test]
async fn promotion_requires_superadmin_and_never_calls_backend_otherwise() {
    let backend = ScriptedBackend::new(1, false);
    let console = controller(&backend);

    let err = console
        .promote_to_admin("new-admin@example.com")
        .await
        .expect_err("not loaded");
    assert_eq!(
        err,
        ConsoleError::Validation(ValidationFailure::InsufficientAccess {
            required: AccessLevel::Superadmin,
            actual: AccessLevel::Member,
        })
    );

    console.load_all().await.expect("load");
    let err = console
        .promote_to_admin("new-admin@example.com")
        .await
        .expect_err("plain admin");
    assert!(matches!(
        err,
        ConsoleError::Validation(ValidationFailure::InsufficientAccess {
            actual: AccessLevel::Admin,
            ..
        })
    ));
    assert!(console.render().await.admin_management.is_none());
    assert!(backend.writes().await.is_empty());
}

#[tokio::test]
async fn promotion_clears_pending_email_only_on_success() {
    let backend = ScriptedBackend::new(1, true);
    let console = controller(&backend);
    console.load_all().await.expect("load");

    console.set_pending_admin_email("nobody@example.com").await;
    let err = console
        .promote_to_admin("nobody@example.com")
        .await
        .expect_err("unknown email");
    assert!(err.backend_errors().iter().all(|e| e.is_not_found()));
    assert_eq!(console.pending_admin_email().await, "nobody@example.com");

    let err = console.promote_to_admin("   ").await.expect_err("blank");
    assert_eq!(err, ConsoleError::Validation(ValidationFailure::EmptyEmail));

    console.set_pending_admin_email("new-admin@example.com").await;
    let report = console
        .promote_to_admin(" new-admin@example.com ")
        .await
        .expect("promote");
    assert_eq!(report.action, ConsistencyAction::ScopedRefetch);
    assert_eq!(console.pending_admin_email().await, "");
    assert_eq!(
        backend.writes().await,
        vec!["promote new-admin@example.com".to_string()]
    );
}

#[tokio::test]
async fn demotion_is_confirmed_and_spares_superadmins() {
    let backend = ScriptedBackend::new(1, true);
    let declining = controller(&backend);
    declining.load_all().await.expect("load");

    let ops = backend.admin_id("ops@example.com").await;
    let root = backend.admin_id("root@example.com").await;

    let err = declining.demote_admin(ops).await.expect_err("declined");
    assert_eq!(
        err,
        ConsoleError::Validation(ValidationFailure::ConfirmationDeclined)
    );

    let accepting = ConsoleController::new_with_dependencies(
        backend.clone(),
        Arc::new(NoSessionCache),
        Arc::new(AcceptConfirmations),
        &settings(StaleResponsePolicy::Discard),
    );
    accepting.load_all().await.expect("load");

    let err = accepting.demote_admin(root).await.expect_err("protected");
    assert!(matches!(
        err,
        ConsoleError::Validation(ValidationFailure::SuperadminProtected(_))
    ));
    let err = accepting
        .demote_admin(UserId::new_v4())
        .await
        .expect_err("unknown");
    assert!(matches!(
        err,
        ConsoleError::Validation(ValidationFailure::UnknownAdmin(_))
    ));
    assert!(backend.writes().await.is_empty());

    let report = accepting.demote_admin(ops).await.expect("demote");
    assert_eq!(report.action, ConsistencyAction::ScopedRefetch);
    assert_eq!(backend.writes().await, vec![format!("demote {ops}")]);
}

#[tokio::test]
async fn metrics_refresh_leaves_listing_and_roster_alone() {
    let backend = ScriptedBackend::new(2, true);
    let console = controller(&backend);
    console.load_all().await.expect("load");
    let before = console.view().await;

    let metrics = console.refresh_metrics_only().await.expect("metrics");
    assert_eq!(metrics.total_users, 2);

    let after = console.view().await;
    assert_eq!(after.metrics.as_ref(), Some(&metrics));
    assert_eq!(after.users, before.users);
    assert_eq!(after.admins, before.admins);
    assert_eq!(after.query, before.query);
    assert!(!after.loading.metrics);
    assert_eq!(backend.users_calls().await.len(), 1);
    assert_eq!(backend.script.lock().await.roster_calls, 1);

    backend.script.lock().await.fail_metrics = Some(server_error());
    let err = console.refresh_metrics_only().await.expect_err("fails");
    assert!(matches!(err, ConsoleError::Fetch(_)));
    assert_eq!(*console.view().await, *after);
}

#[tokio::test]
async fn paging_is_clamped_to_known_pages() {
    let backend = ScriptedBackend::new(3, false);
    let console = controller(&backend);

    assert_eq!(
        console.next_page().await.expect("no pages yet"),
        FetchOutcome::Unchanged
    );
    console.load_all().await.expect("load");

    console.next_page().await.expect("page 2");
    console.next_page().await.expect("page 3");
    assert_eq!(
        console.next_page().await.expect("past end"),
        FetchOutcome::Unchanged
    );
    assert_eq!(console.view().await.query.page, 3);

    console.previous_page().await.expect("page 2");
    assert_eq!(console.view().await.query.page, 2);

    console.go_to_page(99).await.expect("last page");
    assert_eq!(console.view().await.query.page, 3);
    assert_eq!(
        console.go_to_page(0).await.expect("first"),
        FetchOutcome::Committed { generation: 6 }
    );
    assert_eq!(console.view().await.query.page, 1);
}

#[tokio::test]
async fn shrinking_listing_clamps_page_with_one_follow_up_fetch() {
    let backend = ScriptedBackend::new(3, false);
    let console = controller(&backend);
    console.load_all().await.expect("load");
    console.go_to_page(3).await.expect("page 3");

    backend.script.lock().await.total_pages = 2;
    let target = console.view().await.users[0].id;
    let report = console.toggle_user_active(target).await.expect("toggle");
    assert!(matches!(report.refresh, FetchOutcome::Committed { .. }));

    let pages: Vec<u32> = backend
        .users_calls()
        .await
        .iter()
        .map(|query| query.page)
        .collect();
    assert_eq!(pages, vec![1, 3, 3, 2]);

    let view = console.view().await;
    assert_eq!(view.query.page, 2);
    assert_eq!(view.total_pages, 2);
    assert_eq!(view.users.len(), 1);
}

#[tokio::test]
async fn render_exposes_admin_management_only_to_superadmins() {
    let backend = ScriptedBackend::new(1, true);
    let console = controller(&backend);
    console.load_all().await.expect("load");
    console.set_pending_admin_email("draft@example.com").await;

    let rendered = console.render().await;
    let admin = rendered.admin_management.expect("superadmin panel");
    assert_eq!(admin.pending_email, "draft@example.com");
    assert_eq!(admin.admins.len(), 2);
    assert!(admin
        .admins
        .iter()
        .all(|row| row.can_demote == !row.is_superadmin));
    assert_eq!(rendered.pagination.total_pages, 1);
}

#[tokio::test]
async fn filter_change_resets_page_to_one() {
    let backend = ScriptedBackend::new(5, false);
    let console = controller(&backend);
    console.load_all().await.expect("load");
    console.go_to_page(4).await.expect("page 4");
    assert_eq!(console.view().await.query.page, 4);

    console
        .set_status_filter(Some(SubscriptionStatus::Active))
        .await
        .expect("filter");

    let last = backend.users_calls().await.pop().expect("filtered fetch");
    assert_eq!(last.page, 1);
    assert_eq!(last.status, Some(SubscriptionStatus::Active));
    assert_eq!(console.view().await.query.page, 1);
}

#[tokio::test]
async fn admin_management_follows_the_latest_roster_flag() {
    let backend = ScriptedBackend::new(1, true);
    let console = controller(&backend);

    console.load_all().await.expect("load");
    assert!(console.render().await.admin_management.is_some());

    backend.script.lock().await.caller_is_superadmin = false;
    console.load_all().await.expect("reload");
    assert!(console.render().await.admin_management.is_none());
    assert_eq!(console.access_level().await, AccessLevel::Admin);

    backend.script.lock().await.caller_is_superadmin = true;
    console.load_all().await.expect("reload");
    assert!(console.render().await.admin_management.is_some());
}
