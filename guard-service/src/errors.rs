//! HTTP-facing error mapping.
//!
//! The guard itself never raises; denials arrive here as decisions and
//! are shaped into the response contract: 401 before any evaluation,
//! 404 for missing resources, 429 (with `Retry-After`) for rate
//! limiting, 403 for every other denial.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use guard_core::{DenyReason, GuardDecision};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("authentication required")]
    Unauthenticated,

    #[error("denied by guard")]
    Denied { decision: GuardDecision },

    #[error("result not found")]
    NotFound,

    #[error("version conflict")]
    Conflict { current: u64 },

    #[error("confirmation required")]
    ConfirmationRequired,

    #[error("invalid request: {reason}")]
    BadRequest { reason: String },
}

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::Denied { decision } => match decision.reason {
                Some(DenyReason::ResultNotFound) => StatusCode::NOT_FOUND,
                Some(DenyReason::RateLimitExceeded { .. }) => StatusCode::TOO_MANY_REQUESTS,
                _ => StatusCode::FORBIDDEN,
            },
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Conflict { .. } => StatusCode::CONFLICT,
            Self::ConfirmationRequired => StatusCode::PRECONDITION_REQUIRED,
            Self::BadRequest { .. } => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        match self {
            Self::Unauthenticated => {
                (status, Json(json!({ "error": "Authentication required" }))).into_response()
            }
            Self::Denied { decision } => {
                let code = decision
                    .reason
                    .as_ref()
                    .map_or("access_denied", |r| r.code());
                let mut body = json!({ "error": code });
                if decision.requires_verification {
                    body["requiresVerification"] = json!(true);
                }
                let retry_after = decision.retry_after_secs();

                let mut response = (status, Json(body)).into_response();
                if let Some(secs) = retry_after {
                    if let Ok(value) = HeaderValue::from_str(&secs.to_string()) {
                        response.headers_mut().insert(header::RETRY_AFTER, value);
                    }
                }
                response
            }
            Self::NotFound => {
                (status, Json(json!({ "error": "result_not_found" }))).into_response()
            }
            Self::Conflict { current } => (
                status,
                Json(json!({ "error": "version_conflict", "currentVersion": current })),
            )
                .into_response(),
            Self::ConfirmationRequired => (
                status,
                Json(json!({ "error": "confirmation_required", "requiresVerification": true })),
            )
                .into_response(),
            Self::BadRequest { reason } => {
                (status, Json(json!({ "error": reason }))).into_response()
            }
        }
    }
}
