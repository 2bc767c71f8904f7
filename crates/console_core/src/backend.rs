//! Backend operations consumed by the console, and their HTTP transport.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use shared::{
    domain::UserId,
    error::ApiError,
    protocol::{
        AdminRoster, MetricsSnapshot, PlanAssignment, PromoteAdminRequest, UsersPage, UsersQuery,
    },
};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::{config::ConsoleSettings, error::BackendError};

pub type BackendResult<T> = Result<T, BackendError>;

#[async_trait]
pub trait ConsoleBackend: Send + Sync {
    async fn get_metrics(&self) -> BackendResult<MetricsSnapshot>;
    async fn get_users(&self, query: &UsersQuery) -> BackendResult<UsersPage>;
    async fn get_admin_roster(&self) -> BackendResult<AdminRoster>;
    async fn change_user_plan(
        &self,
        user_id: UserId,
        assignment: &PlanAssignment,
    ) -> BackendResult<()>;
    async fn toggle_user_active(&self, user_id: UserId) -> BackendResult<()>;
    /// Fails with [`BackendError::NotFound`] when no user has this email.
    async fn promote_to_admin(&self, email: &str) -> BackendResult<()>;
    async fn demote_admin(&self, user_id: UserId) -> BackendResult<()>;
    async fn set_self_test_plan(&self, assignment: &PlanAssignment) -> BackendResult<()>;
}

pub struct HttpConsoleBackend {
    http: Client,
    base_url: String,
    auth_token: RwLock<Option<String>>,
    read_retries: u32,
    retry_delay: Duration,
}

impl HttpConsoleBackend {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            auth_token: RwLock::new(None),
            read_retries: 0,
            retry_delay: Duration::ZERO,
        }
    }

    pub fn from_settings(settings: &ConsoleSettings) -> Self {
        Self {
            http: Client::new(),
            base_url: settings.api_base_url.clone(),
            auth_token: RwLock::new(settings.auth_token.clone()),
            read_retries: settings.read_retries,
            retry_delay: Duration::from_millis(settings.retry_delay_ms),
        }
    }

    pub fn with_read_retries(mut self, retries: u32, delay: Duration) -> Self {
        self.read_retries = retries;
        self.retry_delay = delay;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn set_auth_token(&self, token: Option<String>) {
        *self.auth_token.write().await = token;
    }

    async fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match self.auth_token.read().await.as_deref() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn get_json<T, Q>(&self, path: &str, query: Option<&Q>) -> BackendResult<T>
    where
        T: DeserializeOwned,
        Q: serde::Serialize + ?Sized + Sync,
    {
        let url = format!("{}{path}", self.base_url);
        let mut attempt = 0;
        loop {
            let mut request = self.http.get(&url);
            if let Some(query) = query {
                request = request.query(query);
            }
            let result: BackendResult<T> = async {
                let response = self.authorized(request).await.send().await?;
                let response = check_status(response).await?;
                response
                    .json::<T>()
                    .await
                    .map_err(|err| BackendError::Decode(err.to_string()))
            }
            .await;

            match result {
                Err(err) if err.is_transport() && attempt < self.read_retries => {
                    attempt += 1;
                    warn!(
                        path,
                        attempt,
                        max_retries = self.read_retries,
                        error = %err,
                        "backend: transient read failure, retrying"
                    );
                    tokio::time::sleep(self.retry_delay).await;
                }
                other => return other,
            }
        }
    }

    async fn send_write(&self, request: RequestBuilder, path: &str) -> BackendResult<()> {
        let response = self.authorized(request).await.send().await?;
        check_status(response).await?;
        debug!(path, "backend: write acknowledged");
        Ok(())
    }
}

async fn check_status(response: Response) -> BackendResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let api_error = serde_json::from_str::<ApiError>(&body).ok();
    let message = match &api_error {
        Some(err) => err.message.clone(),
        None if !body.trim().is_empty() => body.trim().to_string(),
        None => status
            .canonical_reason()
            .unwrap_or("unexpected status")
            .to_string(),
    };

    if status == StatusCode::NOT_FOUND {
        return Err(BackendError::NotFound(message));
    }
    Err(BackendError::Status {
        status: status.as_u16(),
        code: api_error.map(|err| err.code),
        message,
    })
}

#[async_trait]
impl ConsoleBackend for HttpConsoleBackend {
    async fn get_metrics(&self) -> BackendResult<MetricsSnapshot> {
        self.get_json::<_, ()>("/admin/metrics", None).await
    }

    async fn get_users(&self, query: &UsersQuery) -> BackendResult<UsersPage> {
        self.get_json("/admin/users", Some(query)).await
    }

    async fn get_admin_roster(&self) -> BackendResult<AdminRoster> {
        self.get_json::<_, ()>("/admin/admins", None).await
    }

    async fn change_user_plan(
        &self,
        user_id: UserId,
        assignment: &PlanAssignment,
    ) -> BackendResult<()> {
        let path = format!("/admin/users/{user_id}/plan");
        let request = self
            .http
            .put(format!("{}{path}", self.base_url))
            .json(assignment);
        self.send_write(request, &path).await
    }

    async fn toggle_user_active(&self, user_id: UserId) -> BackendResult<()> {
        let path = format!("/admin/users/{user_id}/toggle-active");
        let request = self.http.post(format!("{}{path}", self.base_url));
        self.send_write(request, &path).await
    }

    async fn promote_to_admin(&self, email: &str) -> BackendResult<()> {
        let path = "/admin/admins";
        let request = self
            .http
            .post(format!("{}{path}", self.base_url))
            .json(&PromoteAdminRequest {
                email: email.to_string(),
            });
        self.send_write(request, path).await
    }

    async fn demote_admin(&self, user_id: UserId) -> BackendResult<()> {
        let path = format!("/admin/admins/{user_id}");
        let request = self.http.delete(format!("{}{path}", self.base_url));
        self.send_write(request, &path).await
    }

    async fn set_self_test_plan(&self, assignment: &PlanAssignment) -> BackendResult<()> {
        let path = "/admin/self/test-plan";
        let request = self
            .http
            .put(format!("{}{path}", self.base_url))
            .json(assignment);
        self.send_write(request, path).await
    }
}
