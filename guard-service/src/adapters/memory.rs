//! In-memory stores.
//!
//! The result store doubles as the mutation target for the handlers:
//! `update_result` and `delete_result` are version-conditional, so the
//! second of two racing writers that both passed the guard loses with
//! a conflict instead of silently double-mutating.

use async_trait::async_trait;
use dashmap::DashMap;
use thiserror::Error;

use guard_core::{
    Actor, ActorId, Competition, CompetitionId, CompetitionResult, ResultId, ResultStore,
    StoreError,
};

use crate::middleware::SessionStore;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MutationError {
    #[error("result not found")]
    NotFound,
    #[error("version conflict: stored version is {current}")]
    VersionConflict { current: u64 },
}

/// Field-wise patch applied by a conditional update.
#[derive(Debug, Default, Clone)]
pub struct ResultPatch {
    pub category: Option<String>,
    pub placement: Option<u32>,
    pub score: Option<f64>,
    pub notes: Option<String>,
}

#[derive(Default)]
pub struct InMemoryResultStore {
    results: DashMap<ResultId, CompetitionResult>,
    competitions: DashMap<CompetitionId, Competition>,
}

impl InMemoryResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_competition(&self, competition: Competition) {
        self.competitions.insert(competition.id, competition);
    }

    pub fn insert_result(&self, result: CompetitionResult) {
        self.results.insert(result.id, result);
    }

    pub fn get(&self, id: ResultId) -> Option<CompetitionResult> {
        self.results.get(&id).map(|r| r.clone())
    }

    /// Compare-and-swap update: applies the patch and bumps `version`
    /// only when `expected_version` matches the stored record. The
    /// shard lock held by `get_mut` makes the check-and-write atomic.
    pub fn update_result(
        &self,
        id: ResultId,
        expected_version: u64,
        patch: ResultPatch,
    ) -> Result<CompetitionResult, MutationError> {
        let mut entry = self.results.get_mut(&id).ok_or(MutationError::NotFound)?;
        if entry.version != expected_version {
            return Err(MutationError::VersionConflict {
                current: entry.version,
            });
        }
        if let Some(category) = patch.category {
            entry.category = category;
        }
        if let Some(placement) = patch.placement {
            entry.placement = Some(placement);
        }
        if let Some(score) = patch.score {
            entry.score = Some(score);
        }
        if let Some(notes) = patch.notes {
            entry.notes = Some(notes);
        }
        entry.version += 1;
        Ok(entry.clone())
    }

    /// Conditional delete; unconditional when no version is supplied.
    pub fn delete_result(
        &self,
        id: ResultId,
        expected_version: Option<u64>,
    ) -> Result<(), MutationError> {
        match expected_version {
            None => self
                .results
                .remove(&id)
                .map(|_| ())
                .ok_or(MutationError::NotFound),
            Some(version) => {
                if self
                    .results
                    .remove_if(&id, |_, r| r.version == version)
                    .is_some()
                {
                    return Ok(());
                }
                match self.results.get(&id) {
                    Some(current) => Err(MutationError::VersionConflict {
                        current: current.version,
                    }),
                    None => Err(MutationError::NotFound),
                }
            }
        }
    }
}

#[async_trait]
impl ResultStore for InMemoryResultStore {
    async fn fetch_result(&self, id: ResultId) -> Result<Option<CompetitionResult>, StoreError> {
        Ok(self.results.get(&id).map(|r| r.clone()))
    }

    async fn fetch_competition(
        &self,
        id: CompetitionId,
    ) -> Result<Option<Competition>, StoreError> {
        Ok(self.competitions.get(&id).map(|c| c.clone()))
    }

    async fn find_result_for(
        &self,
        competition: CompetitionId,
        owner: ActorId,
    ) -> Result<Option<CompetitionResult>, StoreError> {
        Ok(self
            .results
            .iter()
            .find(|r| r.competition_id == competition && r.owner == owner)
            .map(|r| r.clone()))
    }
}

/// Token-to-actor session lookup.
#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: DashMap<String, Actor>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_session(&self, token: impl Into<String>, actor: Actor) {
        self.sessions.insert(token.into(), actor);
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn resolve(&self, token: &str) -> Option<Actor> {
        self.sessions.get(token).map(|a| a.clone())
    }
}
