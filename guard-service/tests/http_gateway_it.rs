//! End-to-end behavior of the guarded gateway: authentication gate,
//! denial shaping, decision metadata, and conditional mutations.

use std::net::SocketAddr;
use std::sync::Arc;

use chrono::{Duration, Utc};
use reqwest::StatusCode;
use serde_json::{json, Value};

use guard_core::{
    Actor, ActorId, Competition, CompetitionId, CompetitionResult, MembershipClass, Permission,
    ResultGuard, ResultId,
};
use guard_service::adapters::{
    InMemoryResultStore, InMemorySessionStore, SlidingWindowRateLimiter, TracingAuditSink,
};
use guard_service::{app, AppState};

struct TestApp {
    base: String,
    client: reqwest::Client,
    results: Arc<InMemoryResultStore>,
    sessions: Arc<InMemorySessionStore>,
}

impl TestApp {
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    fn seed_session(&self, token: &str, actor: Actor) {
        self.sessions.insert_session(token, actor);
    }

    fn seed_competition(&self) -> CompetitionId {
        let competition = Competition {
            id: CompetitionId::new(),
            name: "autumn open".to_string(),
            active: true,
            results_deadline: Some(Utc::now() + Duration::hours(12)),
        };
        let id = competition.id;
        self.results.insert_competition(competition);
        id
    }

    fn seed_result(&self, owner: ActorId, age: Duration) -> ResultId {
        let result = CompetitionResult {
            id: ResultId::new(),
            competition_id: CompetitionId::new(),
            owner,
            organization: None,
            verified: false,
            created_at: Utc::now() - age,
            version: 0,
            category: "overall".to_string(),
            placement: Some(1),
            score: Some(99.0),
            notes: None,
        };
        let id = result.id;
        self.results.insert_result(result);
        id
    }
}

async fn spawn_app() -> TestApp {
    let results = Arc::new(InMemoryResultStore::new());
    let sessions = Arc::new(InMemorySessionStore::new());
    let guard = Arc::new(ResultGuard::new(
        results.clone(),
        Arc::new(SlidingWindowRateLimiter::new()),
        Arc::new(TracingAuditSink),
    ));
    let state = AppState {
        guard,
        results: results.clone(),
        sessions: sessions.clone(),
    };

    let listener = tokio::net::TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(
            listener,
            app(state).into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });

    TestApp {
        base: format!("http://{addr}"),
        client: reqwest::Client::new(),
        results,
        sessions,
    }
}

fn competitor(permissions: impl IntoIterator<Item = Permission>) -> Actor {
    Actor::new(ActorId::new(), MembershipClass::Competitor).with_permissions(permissions)
}

#[tokio::test]
async fn requests_without_a_session_get_401() {
    let app = spawn_app().await;

    let response = app
        .client
        .get(app.url(&format!("/api/v1/results/{}", ResultId::new())))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Authentication required");
}

#[tokio::test]
async fn missing_results_are_404_not_403() {
    let app = spawn_app().await;
    app.seed_session("root", Actor::new(ActorId::new(), MembershipClass::Admin));

    let response = app
        .client
        .get(app.url(&format!("/api/v1/results/{}", ResultId::new())))
        .bearer_auth("root")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "result_not_found");
}

#[tokio::test]
async fn stranger_edit_is_shaped_as_403_ownership_violation() {
    let app = spawn_app().await;
    let owner = ActorId::new();
    let result_id = app.seed_result(owner, Duration::hours(2));
    app.seed_session("b", competitor([Permission::EditOwnResults]));

    let response = app
        .client
        .put(app.url(&format!("/api/v1/results/{result_id}")))
        .bearer_auth("b")
        .json(&json!({ "expected_version": 0, "score": 50.0 }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "ownership_violation");
}

#[tokio::test]
async fn create_returns_decision_metadata() {
    let app = spawn_app().await;
    let competition = app.seed_competition();
    app.seed_session("a", competitor([Permission::CreateResults]));

    let response = app
        .client
        .post(app.url(&format!("/api/v1/competitions/{competition}/results")))
        .bearer_auth("a")
        .json(&json!({ "category": "overall", "placement": 4, "score": 71.5 }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let body: Value = response.json().await.unwrap();
    // Competitors are not trusted to self-verify.
    assert_eq!(body["requires_verification"], true);
    assert_eq!(body["result"]["category"], "overall");
    assert_eq!(body["result"]["version"], 0);
}

#[tokio::test]
async fn closed_deadline_denies_creation_regardless_of_grants() {
    let app = spawn_app().await;
    let competition = Competition {
        id: CompetitionId::new(),
        name: "closed".to_string(),
        active: true,
        results_deadline: Some(Utc::now() - Duration::hours(1)),
    };
    let competition_id = competition.id;
    app.results.insert_competition(competition);
    app.seed_session(
        "a",
        competitor([Permission::CreateResults, Permission::EditResults]),
    );

    let response = app
        .client
        .post(app.url(&format!("/api/v1/competitions/{competition_id}/results")))
        .bearer_auth("a")
        .json(&json!({ "category": "overall" }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "results_deadline_passed");
}

#[tokio::test]
async fn eleventh_creation_in_the_window_is_rate_limited() {
    let app = spawn_app().await;
    app.seed_session("a", competitor([Permission::CreateResults]));

    for attempt in 1..=11u32 {
        let competition = app.seed_competition();
        let response = app
            .client
            .post(app.url(&format!("/api/v1/competitions/{competition}/results")))
            .bearer_auth("a")
            .json(&json!({ "category": "overall" }))
            .send()
            .await
            .unwrap();

        if attempt <= 10 {
            assert_eq!(
                response.status(),
                StatusCode::CREATED,
                "attempt {attempt} should pass"
            );
        } else {
            assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
            let retry_after: u64 = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok())
                .expect("Retry-After header");
            assert!(retry_after > 0);
            let body: Value = response.json().await.unwrap();
            assert_eq!(body["error"], "rate_limit_exceeded");
        }
    }
}

#[tokio::test]
async fn delete_demands_confirmation_then_succeeds() {
    let app = spawn_app().await;
    let actor = competitor([Permission::DeleteOwnResults]);
    let result_id = app.seed_result(actor.id, Duration::minutes(10));
    app.seed_session("a", actor);

    let response = app
        .client
        .delete(app.url(&format!("/api/v1/results/{result_id}")))
        .bearer_auth("a")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::PRECONDITION_REQUIRED);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["requiresVerification"], true);

    let response = app
        .client
        .delete(app.url(&format!(
            "/api/v1/results/{result_id}?confirm=true&version=0"
        )))
        .bearer_auth("a")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(app.results.get(result_id).is_none());
}

#[tokio::test]
async fn stale_version_update_conflicts() {
    let app = spawn_app().await;
    let actor = competitor([Permission::EditOwnResults]);
    let result_id = app.seed_result(actor.id, Duration::minutes(10));
    app.seed_session("a", actor);

    let first = app
        .client
        .put(app.url(&format!("/api/v1/results/{result_id}")))
        .bearer_auth("a")
        .json(&json!({ "expected_version": 0, "placement": 2 }))
        .send()
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::OK);

    // Second writer still holding version 0 loses the race.
    let second = app
        .client
        .put(app.url(&format!("/api/v1/results/{result_id}")))
        .bearer_auth("a")
        .json(&json!({ "expected_version": 0, "placement": 3 }))
        .send()
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::CONFLICT);
    let body: Value = second.json().await.unwrap();
    assert_eq!(body["error"], "version_conflict");
    assert_eq!(body["currentVersion"], 1);

    assert_eq!(app.results.get(result_id).unwrap().placement, Some(2));
}

#[tokio::test]
async fn verified_results_are_publicly_viewable_with_the_general_grant() {
    let app = spawn_app().await;
    let owner = ActorId::new();
    let result_id = app.seed_result(owner, Duration::hours(1));

    // Flip the stored record to verified through the store, as the
    // out-of-scope verification workflow would.
    let mut record = app.results.get(result_id).unwrap();
    record.verified = true;
    app.results.insert_result(record);

    app.seed_session("viewer", competitor([Permission::ViewResults]));
    let response = app
        .client
        .get(app.url(&format!("/api/v1/results/{result_id}")))
        .bearer_auth("viewer")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["result"]["verified"], true);
}
