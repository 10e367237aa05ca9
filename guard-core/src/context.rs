//! Per-request evaluation context.

use std::net::IpAddr;

use crate::capability::Capabilities;
use crate::model::Actor;

/// The four mutations the guard arbitrates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    View,
    Edit,
    Delete,
}

impl Operation {
    /// Audit action name for a normal evaluation.
    pub const fn action(self) -> &'static str {
        match self {
            Self::Create => "create_result",
            Self::View => "view_result",
            Self::Edit => "edit_result",
            Self::Delete => "delete_result",
        }
    }

    /// Audit action name when the administrative override applies.
    pub const fn admin_action(self) -> &'static str {
        match self {
            Self::Create => "create_result_admin_bypass",
            Self::View => "view_result_admin_bypass",
            Self::Edit => "edit_result_admin_bypass",
            Self::Delete => "delete_result_admin_bypass",
        }
    }

    /// Audit action name when a collaborator failed mid-evaluation.
    pub const fn error_action(self) -> &'static str {
        match self {
            Self::Create => "create_result_guard_error",
            Self::View => "view_result_guard_error",
            Self::Edit => "edit_result_guard_error",
            Self::Delete => "delete_result_guard_error",
        }
    }
}

/// Everything one evaluation needs about the caller: the actor, its
/// capabilities (resolved exactly once, here), and request metadata for
/// the audit trail. Constructed fresh per call, never persisted.
#[derive(Debug, Clone)]
pub struct PermissionContext {
    actor: Actor,
    capabilities: Capabilities,
    operation: Operation,
    source_ip: Option<IpAddr>,
    client_id: Option<String>,
    request_id: Option<String>,
}

impl PermissionContext {
    pub fn new(actor: Actor, operation: Operation) -> Self {
        let capabilities = Capabilities::resolve(&actor);
        Self {
            actor,
            capabilities,
            operation,
            source_ip: None,
            client_id: None,
            request_id: None,
        }
    }

    pub fn with_source_ip(mut self, ip: IpAddr) -> Self {
        self.source_ip = Some(ip);
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

    pub fn actor(&self) -> &Actor {
        &self.actor
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }

    pub fn source_ip(&self) -> Option<IpAddr> {
        self.source_ip
    }

    pub fn client_id(&self) -> Option<&str> {
        self.client_id.as_deref()
    }

    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }

    /// Key for the creation rate limiter: one bucket per
    /// (actor, source address) pair. Requests with no resolvable source
    /// share the `unknown` bucket rather than escaping the limit.
    pub fn rate_limit_key(&self) -> String {
        match self.source_ip {
            Some(ip) => format!("create_result:{}:{}", self.actor.id, ip),
            None => format!("create_result:{}:unknown", self.actor.id),
        }
    }
}
