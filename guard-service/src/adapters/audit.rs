//! Audit sink backed by the tracing pipeline.

use async_trait::async_trait;
use tracing::{error, info, warn};

use guard_core::{AuditEvent, AuditSeverity, AuditSink, StoreError};

/// Emits every audit event as a structured record on the
/// `security_audit` target, level-mapped from the event severity. The
/// subscriber's transport is the durability boundary; the append itself
/// completes before the guard releases its decision.
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn append(&self, event: AuditEvent) -> Result<(), StoreError> {
        let payload = serde_json::to_string(&event).map_err(|e| StoreError::Corrupted {
            reason: e.to_string(),
        })?;

        match event.severity {
            AuditSeverity::High | AuditSeverity::Critical => {
                error!(
                    target: "security_audit",
                    event_id = %event.event_id,
                    action = %event.action,
                    outcome = ?event.outcome,
                    "AUDIT_EVENT: {payload}"
                );
            }
            AuditSeverity::Medium => {
                warn!(
                    target: "security_audit",
                    event_id = %event.event_id,
                    action = %event.action,
                    outcome = ?event.outcome,
                    "AUDIT_EVENT: {payload}"
                );
            }
            AuditSeverity::Info | AuditSeverity::Low => {
                info!(
                    target: "security_audit",
                    event_id = %event.event_id,
                    action = %event.action,
                    outcome = ?event.outcome,
                    "AUDIT_EVENT: {payload}"
                );
            }
        }
        Ok(())
    }
}
