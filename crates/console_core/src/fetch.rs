//! Fetch orchestrator: the three-resource coordinated fetch and the
//! metrics-only fast path.

use std::sync::Arc;

use shared::protocol::{AdminRoster, MetricsSnapshot, UsersPage};
use tracing::{debug, warn};

use crate::{
    backend::ConsoleBackend,
    error::{FetchFailure, FetchResource, ResourceFailure},
    query::QueryState,
};

/// All three resources of one coordinated fetch, answering `query`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedSnapshot {
    pub query: QueryState,
    pub metrics: MetricsSnapshot,
    pub users: UsersPage,
    pub roster: AdminRoster,
}

#[derive(Clone)]
pub struct FetchOrchestrator {
    backend: Arc<dyn ConsoleBackend>,
}

impl FetchOrchestrator {
    pub fn new(backend: Arc<dyn ConsoleBackend>) -> Self {
        Self { backend }
    }

    /// Issues metrics, users and roster requests concurrently and yields a
    /// snapshot only if all three succeed.
    pub async fn load_all(&self, query: &QueryState) -> Result<FetchedSnapshot, FetchFailure> {
        let users_query = query.to_users_query();
        debug!(
            page = users_query.page,
            search = users_query.search.as_deref().unwrap_or(""),
            "fetch: coordinated fetch started"
        );

        let (metrics, users, roster) = futures::join!(
            self.backend.get_metrics(),
            self.backend.get_users(&users_query),
            self.backend.get_admin_roster(),
        );

        match (metrics, users, roster) {
            (Ok(metrics), Ok(users), Ok(roster)) => Ok(FetchedSnapshot {
                query: query.clone(),
                metrics,
                users,
                roster,
            }),
            (metrics, users, roster) => {
                let failures: Vec<ResourceFailure> = [
                    (FetchResource::Metrics, metrics.err()),
                    (FetchResource::Users, users.err()),
                    (FetchResource::AdminRoster, roster.err()),
                ]
                .into_iter()
                .filter_map(|(resource, error)| {
                    error.map(|error| ResourceFailure { resource, error })
                })
                .collect();

                for failure in &failures {
                    warn!(
                        resource = %failure.resource,
                        error = %failure.error,
                        "fetch: coordinated fetch sub-request failed"
                    );
                }
                Err(FetchFailure::from_failures(failures))
            }
        }
    }

    pub async fn refresh_metrics_only(&self) -> Result<MetricsSnapshot, FetchFailure> {
        self.backend.get_metrics().await.map_err(|error| {
            warn!(error = %error, "fetch: metrics refresh failed");
            FetchFailure::single(FetchResource::Metrics, error)
        })
    }
}
