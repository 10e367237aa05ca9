//! HTTP gateway for the competition-result permission guard.
//!
//! The guard evaluator is mounted as per-route middleware ahead of the
//! mutation handlers; collaborators are wired in at startup and shared
//! through [`AppState`].

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms, future_incompatible)]

pub mod adapters;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod middleware;

use std::sync::Arc;

use axum::{
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use guard_core::ResultGuard;

use adapters::InMemoryResultStore;
use middleware::SessionStore;

pub use config::AppConfig;

#[derive(Clone)]
pub struct AppState {
    pub guard: Arc<ResultGuard>,
    pub results: Arc<InMemoryResultStore>,
    pub sessions: Arc<dyn SessionStore>,
}

pub fn app(state: AppState) -> Router {
    let guarded = Router::new()
        .route(
            "/results/:id",
            get(handlers::get_result)
                .put(handlers::update_result)
                .delete(handlers::delete_result),
        )
        .route_layer(from_fn_with_state(
            state.clone(),
            middleware::guard_result,
        ))
        .merge(
            Router::new()
                .route(
                    "/competitions/:competition_id/results",
                    post(handlers::create_result),
                )
                .route_layer(from_fn_with_state(
                    state.clone(),
                    middleware::guard_create,
                )),
        )
        .route_layer(from_fn_with_state(state.clone(), middleware::authenticate));

    Router::new()
        .route("/health", get(handlers::health))
        .nest("/api/v1", guarded)
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .with_state(state)
}
