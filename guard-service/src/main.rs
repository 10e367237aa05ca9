use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use guard_core::{Actor, ActorId, MembershipClass, ResultGuard};
use guard_service::adapters::{
    InMemoryResultStore, InMemorySessionStore, SlidingWindowRateLimiter, TracingAuditSink,
};
use guard_service::{app, AppConfig, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::from_env();

    let results = Arc::new(InMemoryResultStore::new());
    let sessions = Arc::new(InMemorySessionStore::new());

    // Env-provisioned admin session for operational access; real
    // session management lives upstream.
    if let Ok(token) = std::env::var("GUARD_BOOTSTRAP_TOKEN") {
        sessions.insert_session(token, Actor::new(ActorId::new(), MembershipClass::Admin));
        tracing::info!("bootstrap admin session provisioned");
    }

    let guard = Arc::new(
        ResultGuard::new(
            results.clone(),
            Arc::new(SlidingWindowRateLimiter::new()),
            Arc::new(TracingAuditSink),
        )
        .with_policy(config.guard.clone()),
    );

    let state = AppState {
        guard,
        results,
        sessions,
    };

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    tracing::info!(addr = %config.bind_addr, "result guard gateway listening");
    axum::serve(
        listener,
        app(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .context("server terminated")?;

    Ok(())
}
