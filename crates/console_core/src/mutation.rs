//! Mutation coordinator: privileged writes and the consistency action each
//! one requires on success.

use std::sync::Arc;

use shared::{
    domain::{PlanId, SubscriptionStatus, UserId},
    protocol::PlanAssignment,
};
use tracing::{info, warn};

use crate::{
    access::{AccessGate, AccessLevel},
    backend::ConsoleBackend,
    error::{BackendError, ConsoleError, MutationFailure, MutationKind, ValidationFailure},
    view::ViewState,
    ConfirmationPrompt,
};

/// How consistency is restored after a successful write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsistencyAction {
    /// Re-run the coordinated fetch with the current query.
    ScopedRefetch,
    /// Invalidate session-derived state and refetch everything. Used when the
    /// caller's own entitlements may have changed.
    FullReload,
}

#[derive(Clone)]
pub struct MutationCoordinator {
    backend: Arc<dyn ConsoleBackend>,
}

impl MutationCoordinator {
    pub fn new(backend: Arc<dyn ConsoleBackend>) -> Self {
        Self { backend }
    }

    pub async fn change_user_plan(
        &self,
        user_id: UserId,
        plan_id: Option<PlanId>,
        status: SubscriptionStatus,
    ) -> Result<ConsistencyAction, ConsoleError> {
        let assignment = PlanAssignment { plan_id, status };
        let result = self.backend.change_user_plan(user_id, &assignment).await;
        let action = finish(MutationKind::ChangePlan, result, ConsistencyAction::ScopedRefetch)?;
        info!(
            user_id = %user_id,
            plan_id = assignment.plan_id.as_ref().map(PlanId::as_str).unwrap_or("none"),
            status = %assignment.status,
            "mutation: user plan changed"
        );
        Ok(action)
    }

    pub async fn toggle_user_active(
        &self,
        user_id: UserId,
    ) -> Result<ConsistencyAction, ConsoleError> {
        let result = self.backend.toggle_user_active(user_id).await;
        let action = finish(MutationKind::ToggleActive, result, ConsistencyAction::ScopedRefetch)?;
        info!(user_id = %user_id, "mutation: user active flag toggled");
        Ok(action)
    }

    /// `view` must be the snapshot the caller read its permissions from.
    pub async fn promote_to_admin(
        &self,
        view: &ViewState,
        email: &str,
    ) -> Result<ConsistencyAction, ConsoleError> {
        AccessGate::require(view, AccessLevel::Superadmin)?;
        let email = validate_email(email)?;

        let result = self.backend.promote_to_admin(&email).await;
        let action = finish(MutationKind::PromoteAdmin, result, ConsistencyAction::ScopedRefetch)?;
        info!(email = %email, "mutation: user promoted to admin");
        Ok(action)
    }

    /// Superadmin entries are never demoted here, and nothing is sent unless
    /// `prompt` confirms.
    pub async fn demote_admin(
        &self,
        view: &ViewState,
        user_id: UserId,
        prompt: &dyn ConfirmationPrompt,
    ) -> Result<ConsistencyAction, ConsoleError> {
        AccessGate::require(view, AccessLevel::Superadmin)?;
        let entry = view
            .admin_entry(user_id)
            .ok_or(ValidationFailure::UnknownAdmin(user_id))?;
        if entry.is_superadmin {
            return Err(ValidationFailure::SuperadminProtected(entry.email.clone()).into());
        }
        if !prompt.confirm_demotion(entry).await {
            info!(user_id = %user_id, "mutation: demotion declined");
            return Err(ValidationFailure::ConfirmationDeclined.into());
        }

        let result = self.backend.demote_admin(user_id).await;
        let action = finish(MutationKind::DemoteAdmin, result, ConsistencyAction::ScopedRefetch)?;
        info!(user_id = %user_id, email = %entry.email, "mutation: admin demoted");
        Ok(action)
    }

    pub async fn set_self_test_plan(
        &self,
        plan_id: Option<PlanId>,
        status: SubscriptionStatus,
    ) -> Result<ConsistencyAction, ConsoleError> {
        let assignment = PlanAssignment { plan_id, status };
        let result = self.backend.set_self_test_plan(&assignment).await;
        let action = finish(MutationKind::SelfTestPlan, result, ConsistencyAction::FullReload)?;
        info!(status = %assignment.status, "mutation: self test plan applied");
        Ok(action)
    }
}

fn finish(
    kind: MutationKind,
    result: Result<(), BackendError>,
    action: ConsistencyAction,
) -> Result<ConsistencyAction, ConsoleError> {
    match result {
        Ok(()) => Ok(action),
        Err(error) => {
            warn!(mutation = %kind, error = %error, "mutation: backend write failed");
            Err(MutationFailure { kind, error }.into())
        }
    }
}

pub fn validate_email(raw: &str) -> Result<String, ValidationFailure> {
    let email = raw.trim();
    if email.is_empty() {
        return Err(ValidationFailure::EmptyEmail);
    }

    let well_formed = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.is_empty()
                && !domain.contains('@')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    };
    if !well_formed {
        return Err(ValidationFailure::MalformedEmail(email.to_string()));
    }
    Ok(email.to_string())
}
