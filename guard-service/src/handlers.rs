//! Thin handlers behind the guard gates.
//!
//! By the time these run, the middleware has already authenticated the
//! caller and attached an allowed [`GuardDecision`]; the handlers only
//! perform the mutation and echo the decision metadata the caller
//! needs for response shaping.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use guard_core::{
    Actor, ActorId, CompetitionId, CompetitionResult, GuardDecision, Restriction, ResultId,
};

use crate::adapters::{MutationError, ResultPatch};
use crate::errors::ApiError;
use crate::middleware::CreateGuardParams;
use crate::AppState;

/// Result payload plus the decision metadata attached by the guard.
#[derive(Debug, Serialize)]
pub struct ResultEnvelope {
    pub result: CompetitionResult,
    pub requires_verification: bool,
    pub restrictions: Vec<Restriction>,
}

impl ResultEnvelope {
    fn new(result: CompetitionResult, decision: GuardDecision) -> Self {
        Self {
            result,
            requires_verification: decision.requires_verification,
            restrictions: decision.restrictions,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateResultRequest {
    pub category: String,
    #[serde(default)]
    pub placement: Option<u32>,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub notes: Option<String>,
}

pub async fn create_result(
    State(state): State<AppState>,
    Path(competition_id): Path<String>,
    Query(params): Query<CreateGuardParams>,
    Extension(actor): Extension<Actor>,
    Extension(decision): Extension<GuardDecision>,
    Json(body): Json<CreateResultRequest>,
) -> Result<(StatusCode, Json<ResultEnvelope>), ApiError> {
    let competition_id: CompetitionId = parse_id(&competition_id, "competition id")?;
    let owner: ActorId = match params.for_actor {
        Some(raw) => parse_id(&raw, "target actor id")?,
        None => actor.id,
    };
    // Creation on another actor's behalf carries no implicit
    // organization affiliation.
    let organization = if owner == actor.id {
        actor.organization
    } else {
        None
    };

    let result = CompetitionResult {
        id: ResultId::new(),
        competition_id,
        owner,
        organization,
        verified: false,
        created_at: Utc::now(),
        version: 0,
        category: body.category,
        placement: body.placement,
        score: body.score,
        notes: body.notes,
    };
    state.results.insert_result(result.clone());

    Ok((
        StatusCode::CREATED,
        Json(ResultEnvelope::new(result, decision)),
    ))
}

pub async fn get_result(
    State(state): State<AppState>,
    Path(result_id): Path<String>,
    Extension(decision): Extension<GuardDecision>,
) -> Result<Json<ResultEnvelope>, ApiError> {
    let id: ResultId = parse_id(&result_id, "result id")?;
    let result = state.results.get(id).ok_or(ApiError::NotFound)?;
    Ok(Json(ResultEnvelope::new(result, decision)))
}

#[derive(Debug, Deserialize)]
pub struct UpdateResultRequest {
    /// Version the caller read; the update fails on mismatch so racing
    /// writers cannot silently overwrite each other.
    pub expected_version: u64,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub placement: Option<u32>,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub notes: Option<String>,
}

pub async fn update_result(
    State(state): State<AppState>,
    Path(result_id): Path<String>,
    Extension(decision): Extension<GuardDecision>,
    Json(body): Json<UpdateResultRequest>,
) -> Result<Json<ResultEnvelope>, ApiError> {
    let id: ResultId = parse_id(&result_id, "result id")?;
    let updated = state
        .results
        .update_result(
            id,
            body.expected_version,
            ResultPatch {
                category: body.category,
                placement: body.placement,
                score: body.score,
                notes: body.notes,
            },
        )
        .map_err(map_mutation)?;
    Ok(Json(ResultEnvelope::new(updated, decision)))
}

#[derive(Debug, Deserialize)]
pub struct DeleteParams {
    #[serde(default)]
    pub confirm: Option<bool>,
    #[serde(default)]
    pub version: Option<u64>,
}

pub async fn delete_result(
    State(state): State<AppState>,
    Path(result_id): Path<String>,
    Query(params): Query<DeleteParams>,
    Extension(decision): Extension<GuardDecision>,
) -> Result<StatusCode, ApiError> {
    // A granted delete decision always demands explicit confirmation.
    if decision.requires_verification && !params.confirm.unwrap_or(false) {
        return Err(ApiError::ConfirmationRequired);
    }

    let id: ResultId = parse_id(&result_id, "result id")?;
    state
        .results
        .delete_result(id, params.version)
        .map_err(map_mutation)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

fn parse_id<T: std::str::FromStr>(raw: &str, what: &str) -> Result<T, ApiError> {
    raw.parse().map_err(|_| ApiError::BadRequest {
        reason: format!("malformed {what}"),
    })
}

fn map_mutation(err: MutationError) -> ApiError {
    match err {
        MutationError::NotFound => ApiError::NotFound,
        MutationError::VersionConflict { current } => ApiError::Conflict { current },
    }
}
