//! Shared fakes and builders for guard tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{Duration, Utc};

use guard_core::{
    Actor, ActorId, AuditEvent, AuditSink, Competition, CompetitionId, CompetitionResult,
    MembershipClass, Operation, OrgId, Permission, PermissionContext, RateLimitVerdict,
    RateLimiter, ResultGuard, ResultId, ResultStore, StoreError, WindowSpec,
};

pub struct FakeStore {
    results: Mutex<HashMap<ResultId, CompetitionResult>>,
    competitions: Mutex<HashMap<CompetitionId, Competition>>,
    pub fail: AtomicBool,
    pub fetches: AtomicU32,
}

impl FakeStore {
    pub fn new() -> Self {
        Self {
            results: Mutex::new(HashMap::new()),
            competitions: Mutex::new(HashMap::new()),
            fail: AtomicBool::new(false),
            fetches: AtomicU32::new(0),
        }
    }

    pub fn put_result(&self, result: CompetitionResult) {
        self.results.lock().unwrap().insert(result.id, result);
    }

    pub fn put_competition(&self, competition: Competition) {
        self.competitions
            .lock()
            .unwrap()
            .insert(competition.id, competition);
    }

    fn reachable(&self) -> Result<(), StoreError> {
        if self.fail.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable {
                reason: "injected outage".to_string(),
            })
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ResultStore for FakeStore {
    async fn fetch_result(&self, id: ResultId) -> Result<Option<CompetitionResult>, StoreError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.reachable()?;
        Ok(self.results.lock().unwrap().get(&id).cloned())
    }

    async fn fetch_competition(
        &self,
        id: CompetitionId,
    ) -> Result<Option<Competition>, StoreError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.reachable()?;
        Ok(self.competitions.lock().unwrap().get(&id).cloned())
    }

    async fn find_result_for(
        &self,
        competition: CompetitionId,
        owner: ActorId,
    ) -> Result<Option<CompetitionResult>, StoreError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.reachable()?;
        Ok(self
            .results
            .lock()
            .unwrap()
            .values()
            .find(|r| r.competition_id == competition && r.owner == owner)
            .cloned())
    }
}

/// Count-only limiter: honors `max_requests` but not elapsed time, which
/// is all the guard's wiring needs.
pub struct FakeRateLimiter {
    counts: Mutex<HashMap<String, u32>>,
    pub fail: AtomicBool,
}

impl FakeRateLimiter {
    pub fn new() -> Self {
        Self {
            counts: Mutex::new(HashMap::new()),
            fail: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl RateLimiter for FakeRateLimiter {
    async fn check_and_increment(
        &self,
        key: &str,
        window: WindowSpec,
    ) -> Result<RateLimitVerdict, StoreError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable {
                reason: "injected outage".to_string(),
            });
        }
        let mut counts = self.counts.lock().unwrap();
        let count = counts.entry(key.to_string()).or_insert(0);
        if *count >= window.max_requests {
            Ok(RateLimitVerdict {
                allowed: false,
                remaining: 0,
                retry_after: Some(StdDuration::from_secs(300)),
            })
        } else {
            *count += 1;
            Ok(RateLimitVerdict {
                allowed: true,
                remaining: window.max_requests - *count,
                retry_after: None,
            })
        }
    }
}

pub struct RecordingAuditSink {
    pub events: Mutex<Vec<AuditEvent>>,
    pub fail: AtomicBool,
}

impl RecordingAuditSink {
    pub fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            fail: AtomicBool::new(false),
        }
    }

    pub fn len(&self) -> usize {
        self.events.lock().unwrap().len()
    }

    pub fn last(&self) -> AuditEvent {
        self.events
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("no audit event recorded")
    }
}

#[async_trait]
impl AuditSink for RecordingAuditSink {
    async fn append(&self, event: AuditEvent) -> Result<(), StoreError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable {
                reason: "injected outage".to_string(),
            });
        }
        self.events.lock().unwrap().push(event);
        Ok(())
    }
}

pub struct Harness {
    pub store: Arc<FakeStore>,
    pub limiter: Arc<FakeRateLimiter>,
    pub audit: Arc<RecordingAuditSink>,
    pub guard: ResultGuard,
}

impl Harness {
    pub fn new() -> Self {
        let store = Arc::new(FakeStore::new());
        let limiter = Arc::new(FakeRateLimiter::new());
        let audit = Arc::new(RecordingAuditSink::new());
        let guard = ResultGuard::new(store.clone(), limiter.clone(), audit.clone());
        Self {
            store,
            limiter,
            audit,
            guard,
        }
    }
}

pub fn ctx(actor: &Actor, operation: Operation) -> PermissionContext {
    PermissionContext::new(actor.clone(), operation)
        .with_source_ip("192.0.2.10".parse().unwrap())
        .with_client_id("test-client")
}

pub fn admin() -> Actor {
    Actor::new(ActorId::new(), MembershipClass::Admin)
}

pub fn competitor(permissions: impl IntoIterator<Item = Permission>) -> Actor {
    Actor::new(ActorId::new(), MembershipClass::Competitor).with_permissions(permissions)
}

pub fn org_actor(organization: OrgId, permissions: impl IntoIterator<Item = Permission>) -> Actor {
    Actor::new(ActorId::new(), MembershipClass::Organization)
        .with_permissions(permissions)
        .with_organization(organization)
}

pub fn open_competition() -> Competition {
    Competition {
        id: CompetitionId::new(),
        name: "spring invitational".to_string(),
        active: true,
        results_deadline: Some(Utc::now() + Duration::hours(6)),
    }
}

pub fn result_owned_by(
    owner: ActorId,
    competition: CompetitionId,
    age: Duration,
) -> CompetitionResult {
    CompetitionResult {
        id: ResultId::new(),
        competition_id: competition,
        owner,
        organization: None,
        verified: false,
        created_at: Utc::now() - age,
        version: 0,
        category: "overall".to_string(),
        placement: Some(3),
        score: Some(87.25),
        notes: None,
    }
}
