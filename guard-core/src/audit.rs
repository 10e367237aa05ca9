//! Append-only audit records.
//!
//! Every guard evaluation, allowed or denied, produces exactly one
//! [`AuditEvent`] which is handed to the injected sink before the
//! decision reaches the caller.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

use crate::model::ActorId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditSeverity {
    Info,
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditOutcome {
    Allowed,
    Denied,
    /// A collaborator failed; the evaluation terminated in default-deny.
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub actor: ActorId,
    /// Action name, e.g. `edit_result` or `create_result_admin_bypass`.
    pub action: String,
    pub resource_type: String,
    /// Raw identifier as received, recorded even when malformed.
    pub resource_id: Option<String>,
    pub outcome: AuditOutcome,
    pub severity: AuditSeverity,
    /// Denial code, when the evaluation denied.
    pub reason: Option<String>,
    pub ip_address: Option<String>,
    pub client_id: Option<String>,
    pub request_id: Option<String>,
    /// Rule-specific payload: violated fields, failed check, retry
    /// hints, applied restrictions.
    pub details: HashMap<String, Value>,
}

impl AuditEvent {
    pub fn new(
        actor: ActorId,
        action: impl Into<String>,
        resource_type: impl Into<String>,
        outcome: AuditOutcome,
        severity: AuditSeverity,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            actor,
            action: action.into(),
            resource_type: resource_type.into(),
            resource_id: None,
            outcome,
            severity,
            reason: None,
            ip_address: None,
            client_id: None,
            request_id: None,
            details: HashMap::new(),
        }
    }

    pub fn with_resource_id(mut self, resource_id: impl Into<String>) -> Self {
        self.resource_id = Some(resource_id.into());
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn with_ip_address(mut self, ip_address: impl Into<String>) -> Self {
        self.ip_address = Some(ip_address.into());
        self
    }

    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub fn with_detail<T: Serialize>(mut self, key: impl Into<String>, value: T) -> Self {
        if let Ok(json) = serde_json::to_value(value) {
            self.details.insert(key.into(), json);
        }
        self
    }
}
