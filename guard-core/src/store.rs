//! Collaborator interfaces the evaluator depends on.
//!
//! All three are injected (`Arc<dyn _>`), never reached through shared
//! module state, so the evaluator can be exercised against fakes.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

use crate::audit::AuditEvent;
use crate::model::{ActorId, Competition, CompetitionId, CompetitionResult, ResultId};

/// Failure of an external collaborator. Any variant terminates the
/// evaluation in an audited default-deny decision; retrying the
/// underlying call is the adapter's concern, not the guard's.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("backend unavailable: {reason}")]
    Unavailable { reason: String },
    #[error("backend returned malformed data: {reason}")]
    Corrupted { reason: String },
}

/// Read-only access to the records under access control.
#[async_trait]
pub trait ResultStore: Send + Sync {
    async fn fetch_result(&self, id: ResultId) -> Result<Option<CompetitionResult>, StoreError>;

    async fn fetch_competition(
        &self,
        id: CompetitionId,
    ) -> Result<Option<Competition>, StoreError>;

    /// Duplicate probe: the result an actor already recorded for a
    /// competition, if any.
    async fn find_result_for(
        &self,
        competition: CompetitionId,
        owner: ActorId,
    ) -> Result<Option<CompetitionResult>, StoreError>;
}

/// Sliding-window spec for one counting call.
#[derive(Debug, Clone, Copy)]
pub struct WindowSpec {
    pub max_requests: u32,
    pub window: Duration,
}

#[derive(Debug, Clone, Copy)]
pub struct RateLimitVerdict {
    pub allowed: bool,
    pub remaining: u32,
    /// How long until the key frees up again; set on denied verdicts.
    pub retry_after: Option<Duration>,
}

#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Count one attempt against `key`. The count-and-compare must be
    /// atomic per key: a burst of concurrent callers may not all
    /// observe the pre-increment count.
    async fn check_and_increment(
        &self,
        key: &str,
        window: WindowSpec,
    ) -> Result<RateLimitVerdict, StoreError>;
}

#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Append one event. Must have completed (or been durably queued)
    /// by the time this returns; the guard will not release a decision
    /// before it has.
    async fn append(&self, event: AuditEvent) -> Result<(), StoreError>;
}
