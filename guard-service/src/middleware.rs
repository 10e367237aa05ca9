//! Request-gating middleware.
//!
//! Authentication runs first: a bearer token resolved through the
//! session store, short-circuiting with 401 before any guard
//! evaluation. The per-route guard gates then build a fresh
//! [`PermissionContext`], run the matching guard operation, and either
//! deny the request or attach the [`GuardDecision`] to the request
//! extensions for the handler.

use std::net::{IpAddr, SocketAddr};

use async_trait::async_trait;
use axum::{
    extract::{ConnectInfo, Path, Query, Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use serde::Deserialize;

use guard_core::{Actor, GuardDecision, Operation, PermissionContext};

use crate::errors::ApiError;
use crate::AppState;

/// Session state lookup. Authentication management itself is an
/// external collaborator; the guard only needs the resolved actor.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn resolve(&self, token: &str) -> Option<Actor>;
}

/// Resolve the caller or short-circuit with 401.
pub async fn authenticate(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_token(request.headers()).ok_or(ApiError::Unauthenticated)?;
    let actor = state
        .sessions
        .resolve(token)
        .await
        .ok_or(ApiError::Unauthenticated)?;
    request.extensions_mut().insert(actor);
    Ok(next.run(request).await)
}

#[derive(Debug, Deserialize)]
pub struct CreateGuardParams {
    /// Target actor for admin-initiated creation on another's behalf;
    /// defaults to the caller.
    pub for_actor: Option<String>,
}

/// Gate for result creation.
pub async fn guard_create(
    State(state): State<AppState>,
    Path(competition_id): Path<String>,
    Query(params): Query<CreateGuardParams>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let actor = caller(&request)?;
    let target = params
        .for_actor
        .unwrap_or_else(|| actor.id.to_string());
    let ctx = build_context(actor, Operation::Create, &request);

    let decision = state.guard.can_create(&target, &competition_id, &ctx).await;
    attach_or_deny(decision, request, next).await
}

/// Gate for the read/edit/delete routes; the operation follows the
/// HTTP method.
pub async fn guard_result(
    State(state): State<AppState>,
    Path(result_id): Path<String>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let operation = match request.method().as_str() {
        "GET" => Operation::View,
        "PUT" => Operation::Edit,
        "DELETE" => Operation::Delete,
        _ => {
            return Err(ApiError::BadRequest {
                reason: "unsupported method".to_string(),
            })
        }
    };

    let actor = caller(&request)?;
    let ctx = build_context(actor, operation, &request);

    let decision = match operation {
        Operation::View => state.guard.can_view(&result_id, &ctx).await,
        Operation::Edit => state.guard.can_edit(&result_id, &ctx).await,
        Operation::Delete => state.guard.can_delete(&result_id, &ctx).await,
        Operation::Create => unreachable!("create is routed separately"),
    };
    attach_or_deny(decision, request, next).await
}

fn caller(request: &Request) -> Result<Actor, ApiError> {
    request
        .extensions()
        .get::<Actor>()
        .cloned()
        .ok_or(ApiError::Unauthenticated)
}

async fn attach_or_deny(
    decision: GuardDecision,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if !decision.allowed {
        return Err(ApiError::Denied { decision });
    }
    request.extensions_mut().insert(decision);
    Ok(next.run(request).await)
}

fn build_context(actor: Actor, operation: Operation, request: &Request) -> PermissionContext {
    let mut ctx = PermissionContext::new(actor, operation);
    if let Some(ip) = client_ip(request) {
        ctx = ctx.with_source_ip(ip);
    }
    if let Some(client_id) = header_value(request.headers(), "x-client-id") {
        ctx = ctx.with_client_id(client_id);
    }
    if let Some(request_id) = header_value(request.headers(), "x-request-id") {
        ctx = ctx.with_request_id(request_id);
    }
    ctx
}

/// Client address, preferring proxy forwarding headers over the socket
/// peer.
fn client_ip(request: &Request) -> Option<IpAddr> {
    let headers = request.headers();

    if let Some(forwarded) = header_value(headers, "x-forwarded-for") {
        if let Some(first) = forwarded.split(',').next() {
            if let Ok(ip) = first.trim().parse() {
                return Some(ip);
            }
        }
    }

    if let Some(real_ip) = header_value(headers, "x-real-ip") {
        if let Ok(ip) = real_ip.parse() {
            return Some(ip);
        }
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0.ip())
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(String::from)
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .filter(|token| !token.is_empty())
}
