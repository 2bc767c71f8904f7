//! Error taxonomy of the console: backend transport errors, and the three
//! user-facing failure classes (fetch, mutation, validation).

use std::fmt;

use shared::{domain::UserId, error::ErrorCode};
use thiserror::Error;

use crate::access::AccessLevel;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    #[error("request failed: {0}")]
    Transport(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("server returned {status}: {message}")]
    Status {
        status: u16,
        code: Option<ErrorCode>,
        message: String,
    },
    #[error("malformed response: {0}")]
    Decode(String),
}

impl BackendError {
    pub fn is_transport(&self) -> bool {
        matches!(self, BackendError::Transport(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, BackendError::NotFound(_))
    }

    pub fn requires_reauth(&self) -> bool {
        matches!(
            self,
            BackendError::Status {
                status: 401 | 403,
                ..
            } | BackendError::Status {
                code: Some(ErrorCode::Unauthorized | ErrorCode::Forbidden),
                ..
            }
        )
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            BackendError::Decode(err.to_string())
        } else {
            BackendError::Transport(err.to_string())
        }
    }
}

/// One of the resources fetched by a coordinated fetch, plus the session
/// reload step of a full reload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchResource {
    Metrics,
    Users,
    AdminRoster,
    Session,
}

impl fmt::Display for FetchResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FetchResource::Metrics => "metrics",
            FetchResource::Users => "users",
            FetchResource::AdminRoster => "admin roster",
            FetchResource::Session => "session",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceFailure {
    pub resource: FetchResource,
    pub error: BackendError,
}

/// A coordinated fetch that did not commit. Every failed sub-request is kept.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub struct FetchFailure {
    failures: Vec<ResourceFailure>,
}

impl FetchFailure {
    pub fn single(resource: FetchResource, error: BackendError) -> Self {
        Self {
            failures: vec![ResourceFailure { resource, error }],
        }
    }

    pub(crate) fn from_failures(failures: Vec<ResourceFailure>) -> Self {
        debug_assert!(!failures.is_empty());
        Self { failures }
    }

    pub fn failures(&self) -> &[ResourceFailure] {
        &self.failures
    }

    pub fn failed_resources(&self) -> Vec<FetchResource> {
        self.failures.iter().map(|f| f.resource).collect()
    }
}

impl fmt::Display for FetchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("failed to load console data")?;
        for (idx, failure) in self.failures.iter().enumerate() {
            let sep = if idx == 0 { ": " } else { "; " };
            write!(f, "{sep}{} ({})", failure.resource, failure.error)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutationKind {
    ChangePlan,
    ToggleActive,
    PromoteAdmin,
    DemoteAdmin,
    SelfTestPlan,
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MutationKind::ChangePlan => "change plan",
            MutationKind::ToggleActive => "toggle active",
            MutationKind::PromoteAdmin => "promote admin",
            MutationKind::DemoteAdmin => "demote admin",
            MutationKind::SelfTestPlan => "self test plan",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} failed: {error}")]
pub struct MutationFailure {
    pub kind: MutationKind,
    pub error: BackendError,
}

/// Client-side precondition failures. The backend is never called when one of these is returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationFailure {
    #[error("an email address is required")]
    EmptyEmail,
    #[error("'{0}' is not a valid email address")]
    MalformedEmail(String),
    #[error("demotion was not confirmed")]
    ConfirmationDeclined,
    #[error("requires {required} access, caller has {actual}")]
    InsufficientAccess {
        required: AccessLevel,
        actual: AccessLevel,
    },
    #[error("superadmin {0} can only be revoked outside the console")]
    SuperadminProtected(String),
    #[error("user {0} is not in the admin roster")]
    UnknownAdmin(UserId),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConsoleError {
    #[error(transparent)]
    Fetch(#[from] FetchFailure),
    #[error(transparent)]
    Mutation(#[from] MutationFailure),
    #[error(transparent)]
    Validation(#[from] ValidationFailure),
}

impl ConsoleError {
    /// Backend errors carried by this failure, in fetch order.
    pub fn backend_errors(&self) -> Vec<&BackendError> {
        match self {
            ConsoleError::Fetch(failure) => failure.failures().iter().map(|f| &f.error).collect(),
            ConsoleError::Mutation(failure) => vec![&failure.error],
            ConsoleError::Validation(_) => Vec::new(),
        }
    }
}
