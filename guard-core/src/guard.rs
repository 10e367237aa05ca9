//! The permission guard evaluator.
//!
//! Four operations, each a fixed sequence of checks that short-circuits
//! at the first failure. Every evaluation terminates in a
//! [`GuardDecision`] and appends exactly one audit event before the
//! decision is returned, whichever way it went.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, Utc};
use serde_json::{json, Value};

use crate::audit::{AuditEvent, AuditOutcome, AuditSeverity};
use crate::context::PermissionContext;
use crate::decision::{DenyReason, GuardDecision, Restriction};
use crate::model::{ActorId, CompetitionId, ResultId};
use crate::permission::Permission;
use crate::store::{AuditSink, RateLimiter, ResultStore, StoreError, WindowSpec};
use crate::validate::validate_identifiers;

/// Tunable rule thresholds. Defaults match the production rules: a 24 h
/// owner edit window, a deliberately stricter 1 h owner delete window,
/// and 10 creation attempts per hour per (actor, source) pair.
#[derive(Debug, Clone)]
pub struct GuardPolicy {
    pub owner_edit_window: Duration,
    pub owner_delete_window: Duration,
    pub create_limit: u32,
    pub create_window: std::time::Duration,
}

impl Default for GuardPolicy {
    fn default() -> Self {
        Self {
            owner_edit_window: Duration::hours(24),
            owner_delete_window: Duration::hours(1),
            create_limit: 10,
            create_window: std::time::Duration::from_secs(3600),
        }
    }
}

/// The guard evaluator. Collaborators are injected at construction;
/// the evaluator itself holds no mutable state and is shared freely
/// across concurrent evaluations.
pub struct ResultGuard {
    store: Arc<dyn ResultStore>,
    rate_limiter: Arc<dyn RateLimiter>,
    audit: Arc<dyn AuditSink>,
    policy: GuardPolicy,
}

/// Internal evaluation outcome carried into [`ResultGuard::finalize`].
struct Evaluated {
    decision: GuardDecision,
    admin_bypass: bool,
    details: HashMap<String, Value>,
}

impl Evaluated {
    fn allowed(decision: GuardDecision) -> Self {
        Self {
            decision,
            admin_bypass: false,
            details: HashMap::new(),
        }
    }

    fn admin(decision: GuardDecision) -> Self {
        Self {
            decision,
            admin_bypass: true,
            details: HashMap::new(),
        }
    }

    fn denied(reason: DenyReason) -> Self {
        Self {
            decision: GuardDecision::deny(reason),
            admin_bypass: false,
            details: HashMap::new(),
        }
    }

    fn with_detail<T: serde::Serialize>(mut self, key: &str, value: T) -> Self {
        if let Ok(json) = serde_json::to_value(value) {
            self.details.insert(key.to_string(), json);
        }
        self
    }
}

impl ResultGuard {
    pub fn new(
        store: Arc<dyn ResultStore>,
        rate_limiter: Arc<dyn RateLimiter>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            store,
            rate_limiter,
            audit,
            policy: GuardPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: GuardPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> &GuardPolicy {
        &self.policy
    }

    /// Decide whether a result may be created for `target_actor_id` in
    /// `competition_id`. The target may differ from the calling actor
    /// for admin-initiated creation on another actor's behalf.
    pub async fn can_create(
        &self,
        target_actor_id: &str,
        competition_id: &str,
        ctx: &PermissionContext,
    ) -> GuardDecision {
        let outcome = self
            .evaluate_create(target_actor_id, competition_id, ctx)
            .await;
        self.finalize(ctx, "competition", competition_id, outcome)
            .await
    }

    /// Decide whether the calling actor may read the result.
    pub async fn can_view(&self, result_id: &str, ctx: &PermissionContext) -> GuardDecision {
        let outcome = self.evaluate_view(result_id, ctx).await;
        self.finalize(ctx, "competition_result", result_id, outcome)
            .await
    }

    /// Decide whether the calling actor may modify the result.
    pub async fn can_edit(&self, result_id: &str, ctx: &PermissionContext) -> GuardDecision {
        let outcome = self.evaluate_edit(result_id, ctx).await;
        self.finalize(ctx, "competition_result", result_id, outcome)
            .await
    }

    /// Decide whether the calling actor may delete the result. Stricter
    /// than edit: a 1 h self-service window, and no verified-delete
    /// escape hatch for non-admins.
    pub async fn can_delete(&self, result_id: &str, ctx: &PermissionContext) -> GuardDecision {
        let outcome = self.evaluate_delete(result_id, ctx).await;
        self.finalize(ctx, "competition_result", result_id, outcome)
            .await
    }

    async fn evaluate_create(
        &self,
        target_actor_id: &str,
        competition_id: &str,
        ctx: &PermissionContext,
    ) -> Result<Evaluated, StoreError> {
        let ids = match validate_identifiers(&[
            ("target_actor_id", target_actor_id),
            ("competition_id", competition_id),
        ]) {
            Ok(ids) => ids,
            Err(reason) => {
                return Ok(Evaluated::denied(reason).with_detail("failed_check", "input_validation"))
            }
        };
        let target_actor = ActorId::from_uuid(ids[0]);
        let competition_id = CompetitionId::from_uuid(ids[1]);

        let caps = ctx.capabilities();
        if caps.is_admin() {
            return Ok(Evaluated::admin(
                GuardDecision::allow().with_restriction(Restriction::AdminCreated),
            )
            .with_detail("target_actor", target_actor.to_string()));
        }

        if !caps.has_any(&[Permission::CreateResults, Permission::EditResults]) {
            return Ok(Evaluated::denied(DenyReason::InsufficientPermissions)
                .with_detail("failed_check", "permission"));
        }

        let Some(competition) = self.store.fetch_competition(competition_id).await? else {
            return Ok(Evaluated::denied(DenyReason::CompetitionNotFound)
                .with_detail("failed_check", "competition_exists"));
        };
        if !competition.active {
            return Ok(Evaluated::denied(DenyReason::CompetitionInactive)
                .with_detail("failed_check", "competition_active"));
        }
        let now = Utc::now();
        if competition.deadline_passed(now) {
            let mut denied = Evaluated::denied(DenyReason::ResultsDeadlinePassed)
                .with_detail("failed_check", "results_deadline");
            if let Some(deadline) = competition.results_deadline {
                denied = denied.with_detail("results_deadline", deadline.to_rfc3339());
            }
            return Ok(denied);
        }

        if self
            .store
            .find_result_for(competition_id, target_actor)
            .await?
            .is_some()
        {
            return Ok(Evaluated::denied(DenyReason::DuplicateResultPrevented)
                .with_detail("failed_check", "duplicate_prevention")
                .with_detail("target_actor", target_actor.to_string()));
        }

        let verdict = self
            .rate_limiter
            .check_and_increment(
                &ctx.rate_limit_key(),
                WindowSpec {
                    max_requests: self.policy.create_limit,
                    window: self.policy.create_window,
                },
            )
            .await?;
        if !verdict.allowed {
            let retry_after_secs = verdict
                .retry_after
                .map(|d| d.as_secs())
                .unwrap_or_else(|| self.policy.create_window.as_secs())
                .max(1);
            return Ok(
                Evaluated::denied(DenyReason::RateLimitExceeded { retry_after_secs })
                    .with_detail("failed_check", "rate_limit")
                    .with_detail("limit", self.policy.create_limit),
            );
        }

        Ok(Evaluated::allowed(
            GuardDecision::allow().with_requires_verification(!caps.self_verifying()),
        )
        .with_detail("target_actor", target_actor.to_string()))
    }

    async fn evaluate_view(
        &self,
        result_id: &str,
        ctx: &PermissionContext,
    ) -> Result<Evaluated, StoreError> {
        let ids = match validate_identifiers(&[("result_id", result_id)]) {
            Ok(ids) => ids,
            Err(reason) => {
                return Ok(Evaluated::denied(reason).with_detail("failed_check", "input_validation"))
            }
        };

        let Some(resource) = self.store.fetch_result(ResultId::from_uuid(ids[0])).await? else {
            return Ok(Evaluated::denied(DenyReason::ResultNotFound)
                .with_detail("failed_check", "resource_exists"));
        };

        let caps = ctx.capabilities();
        if caps.is_admin() {
            return Ok(Evaluated::admin(
                GuardDecision::allow().with_restriction(Restriction::AdminViewed),
            ));
        }

        let actor = ctx.actor();
        if resource.is_owned_by(actor.id) {
            return Ok(Evaluated::allowed(GuardDecision::allow())
                .with_detail("access_path", "owner"));
        }

        let organization_match =
            actor.organization.is_some() && actor.organization == resource.organization;
        if organization_match && caps.has(Permission::ViewOrganizationResults) {
            return Ok(Evaluated::allowed(GuardDecision::allow())
                .with_detail("access_path", "organization"));
        }

        if resource.verified && caps.has(Permission::ViewResults) {
            return Ok(Evaluated::allowed(GuardDecision::allow())
                .with_detail("access_path", "public_verified"));
        }

        // No access path matched; record which conditions held for the
        // audit trail.
        Ok(Evaluated::denied(DenyReason::InsufficientAccess).with_detail(
            "access_paths",
            json!({
                "admin": false,
                "owner": false,
                "organization_match": organization_match,
                "organization_view_grant": caps.has(Permission::ViewOrganizationResults),
                "resource_verified": resource.verified,
                "general_view_grant": caps.has(Permission::ViewResults),
            }),
        ))
    }

    async fn evaluate_edit(
        &self,
        result_id: &str,
        ctx: &PermissionContext,
    ) -> Result<Evaluated, StoreError> {
        let ids = match validate_identifiers(&[("result_id", result_id)]) {
            Ok(ids) => ids,
            Err(reason) => {
                return Ok(Evaluated::denied(reason).with_detail("failed_check", "input_validation"))
            }
        };

        let Some(resource) = self.store.fetch_result(ResultId::from_uuid(ids[0])).await? else {
            return Ok(Evaluated::denied(DenyReason::ResultNotFound)
                .with_detail("failed_check", "resource_exists"));
        };

        let caps = ctx.capabilities();
        if caps.is_admin() {
            return Ok(Evaluated::admin(
                GuardDecision::allow().with_restriction(Restriction::AdminModified),
            ));
        }

        if !caps.has_any(&[
            Permission::EditOwnResults,
            Permission::EditResults,
            Permission::ManageOrganization,
        ]) {
            return Ok(Evaluated::denied(DenyReason::InsufficientPermissions)
                .with_detail("failed_check", "permission"));
        }

        let actor = ctx.actor();
        let is_owner = resource.is_owned_by(actor.id);
        if !is_owner && !caps.edits_any_result() {
            return Ok(Evaluated::denied(DenyReason::OwnershipViolation)
                .with_detail("failed_check", "ownership")
                .with_detail("owner", resource.owner.to_string()));
        }

        if !is_owner {
            let organization_match =
                actor.organization.is_some() && actor.organization == resource.organization;
            if !organization_match {
                return Ok(Evaluated::denied(DenyReason::OrganizationBoundaryViolation)
                    .with_detail("failed_check", "organization_boundary"));
            }
        }

        let now = Utc::now();
        if resource.age(now) > self.policy.owner_edit_window && !caps.edits_any_result() {
            return Ok(Evaluated::denied(DenyReason::TimeLimitExceeded)
                .with_detail("failed_check", "time_window")
                .with_detail("age_secs", resource.age(now).num_seconds())
                .with_detail(
                    "window_secs",
                    self.policy.owner_edit_window.num_seconds(),
                ));
        }

        if resource.verified && !caps.has(Permission::EditVerifiedResults) {
            return Ok(Evaluated::denied(DenyReason::VerifiedResultProtection)
                .with_detail("failed_check", "verification_lock"));
        }

        let mut decision = GuardDecision::allow().with_requires_verification(resource.verified);
        if resource.verified {
            decision = decision.with_restriction(Restriction::VerifiedEdit);
        }
        if !is_owner {
            decision = decision.with_restriction(Restriction::OrganizationalEdit);
        }
        Ok(Evaluated::allowed(decision))
    }

    async fn evaluate_delete(
        &self,
        result_id: &str,
        ctx: &PermissionContext,
    ) -> Result<Evaluated, StoreError> {
        let ids = match validate_identifiers(&[("result_id", result_id)]) {
            Ok(ids) => ids,
            Err(reason) => {
                return Ok(Evaluated::denied(reason).with_detail("failed_check", "input_validation"))
            }
        };

        let Some(resource) = self.store.fetch_result(ResultId::from_uuid(ids[0])).await? else {
            return Ok(Evaluated::denied(DenyReason::ResultNotFound)
                .with_detail("failed_check", "resource_exists"));
        };

        let caps = ctx.capabilities();
        if caps.is_admin() {
            // Deletion always requires caller-side confirmation, admin
            // included.
            return Ok(Evaluated::admin(
                GuardDecision::allow()
                    .with_restriction(Restriction::AdminDeleted)
                    .with_requires_verification(true),
            ));
        }

        if !caps.has_any(&[
            Permission::DeleteOwnResults,
            Permission::DeleteResults,
            Permission::ManageOrganization,
        ]) {
            return Ok(Evaluated::denied(DenyReason::InsufficientPermissions)
                .with_detail("failed_check", "permission"));
        }

        let actor = ctx.actor();
        let is_owner = resource.is_owned_by(actor.id);
        if !is_owner && !caps.deletes_any_result() {
            return Ok(Evaluated::denied(DenyReason::OwnershipViolation)
                .with_detail("failed_check", "ownership")
                .with_detail("owner", resource.owner.to_string()));
        }

        if !is_owner {
            let organization_match =
                actor.organization.is_some() && actor.organization == resource.organization;
            if !organization_match {
                return Ok(Evaluated::denied(DenyReason::OrganizationBoundaryViolation)
                    .with_detail("failed_check", "organization_boundary"));
            }
        }

        let now = Utc::now();
        if resource.age(now) > self.policy.owner_delete_window && !caps.deletes_any_result() {
            return Ok(Evaluated::denied(DenyReason::TimeLimitExceeded)
                .with_detail("failed_check", "time_window")
                .with_detail("age_secs", resource.age(now).num_seconds())
                .with_detail(
                    "window_secs",
                    self.policy.owner_delete_window.num_seconds(),
                ));
        }

        // No delete_verified_results escape hatch: only the admin
        // bypass above reaches a verified resource.
        if resource.verified {
            return Ok(Evaluated::denied(DenyReason::VerifiedResultProtection)
                .with_detail("failed_check", "verification_lock"));
        }

        let mut decision = GuardDecision::allow().with_requires_verification(true);
        if !is_owner {
            decision = decision.with_restriction(Restriction::OrganizationalDelete);
        }
        Ok(Evaluated::allowed(decision))
    }

    /// Converge every evaluation path: map collaborator failures to an
    /// audited default-deny, append exactly one audit event, and hand
    /// the decision back. A failed append downgrades an allow to a
    /// denial so no unaudited grant escapes.
    async fn finalize(
        &self,
        ctx: &PermissionContext,
        resource_type: &'static str,
        resource_id: &str,
        outcome: Result<Evaluated, StoreError>,
    ) -> GuardDecision {
        let operation = ctx.operation();

        let (decision, action, severity, audit_outcome, mut details) = match outcome {
            Ok(evaluated) => {
                let action = if evaluated.admin_bypass {
                    operation.admin_action()
                } else {
                    operation.action()
                };
                let (severity, audit_outcome) = if evaluated.decision.allowed {
                    (AuditSeverity::Info, AuditOutcome::Allowed)
                } else {
                    (AuditSeverity::Medium, AuditOutcome::Denied)
                };
                (
                    evaluated.decision,
                    action,
                    severity,
                    audit_outcome,
                    evaluated.details,
                )
            }
            Err(error) => {
                tracing::error!(
                    target: "security_audit",
                    operation = operation.action(),
                    error = %error,
                    "guard evaluation failed, denying by default"
                );
                let mut details = HashMap::new();
                details.insert("error".to_string(), json!(error.to_string()));
                (
                    GuardDecision::deny(DenyReason::InfrastructureFailure),
                    operation.error_action(),
                    AuditSeverity::High,
                    AuditOutcome::Error,
                    details,
                )
            }
        };

        if !decision.restrictions.is_empty() {
            let restrictions: Vec<&str> =
                decision.restrictions.iter().map(|r| r.as_str()).collect();
            details.insert("restrictions".to_string(), json!(restrictions));
        }
        if let Some(DenyReason::InputValidationFailed { fields }) = &decision.reason {
            details.insert("violated_fields".to_string(), json!(fields));
        }
        if let Some(retry_after_secs) = decision.retry_after_secs() {
            details.insert("retry_after_secs".to_string(), json!(retry_after_secs));
        }

        let mut event = AuditEvent::new(
            ctx.actor().id,
            action,
            resource_type,
            audit_outcome,
            severity,
        )
        .with_resource_id(resource_id);
        if let Some(reason) = &decision.reason {
            event = event.with_reason(reason.code());
        }
        if let Some(ip) = ctx.source_ip() {
            event = event.with_ip_address(ip.to_string());
        }
        if let Some(client_id) = ctx.client_id() {
            event = event.with_client_id(client_id);
        }
        if let Some(request_id) = ctx.request_id() {
            event = event.with_request_id(request_id);
        }
        event.details = details;

        if let Err(error) = self.audit.append(event).await {
            tracing::error!(
                target: "security_audit",
                operation = operation.action(),
                error = %error,
                "audit append failed"
            );
            if decision.allowed {
                return GuardDecision::deny(DenyReason::InfrastructureFailure);
            }
        }

        decision
    }
}
