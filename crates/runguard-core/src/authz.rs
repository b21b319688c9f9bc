//! Caller identity and namespace authorization.
//!
//! The orchestration layer never looks inside a caller's identity. It hands
//! the opaque [`CallerContext`] and a resolved namespace to an
//! [`Authorizer`] and treats anything but `Allowed` as terminal.
//!
//! [`NamespacePolicy`] is a static RBAC authorizer: principals bound to the
//! namespaces they may act in, with cluster admins allowed everywhere.

use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::ConfigError;

/// Per-request caller context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallerContext {
    /// Correlates log lines of one request.
    pub request_id: String,
    /// Authenticated principal, if the transport established one.
    pub identity: Option<String>,
}

impl CallerContext {
    pub fn new(identity: impl Into<String>) -> Self {
        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            identity: Some(identity.into()),
        }
    }

    pub fn anonymous() -> Self {
        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            identity: None,
        }
    }
}

/// Authorization decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthzDecision {
    Allowed,
    Denied { reason: String },
}

impl AuthzDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }
}

/// Policy engine consulted for every multi-tenant request.
#[async_trait]
pub trait Authorizer: Send + Sync {
    /// Decide whether `caller` may act in `namespace`.
    async fn authorize(&self, caller: &CallerContext, namespace: &str) -> AuthzDecision;
}

/// Principal with the namespaces it is bound to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: String,
    #[serde(default)]
    pub namespaces: Vec<String>,
    /// Cluster admins pass every namespace check.
    #[serde(default)]
    pub cluster_admin: bool,
}

impl Principal {
    pub fn member_of(id: impl Into<String>, namespaces: &[&str]) -> Self {
        Self {
            id: id.into(),
            namespaces: namespaces.iter().map(|ns| ns.to_string()).collect(),
            cluster_admin: false,
        }
    }

    pub fn admin(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            namespaces: Vec::new(),
            cluster_admin: true,
        }
    }
}

/// Static namespace RBAC policy.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NamespacePolicy {
    #[serde(default)]
    principals: Vec<Principal>,
}

impl NamespacePolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_principal(&mut self, principal: Principal) {
        self.principals.push(principal);
    }

    pub fn with_principal(mut self, principal: Principal) -> Self {
        self.add_principal(principal);
        self
    }

    /// Parse a policy document: `{"principals": [{"id", "namespaces", "cluster_admin"}]}`.
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    /// Check if `identity` may act in `namespace`.
    pub fn check(&self, identity: Option<&str>, namespace: &str) -> AuthzDecision {
        let Some(identity) = identity.filter(|id| !id.is_empty()) else {
            return AuthzDecision::Denied {
                reason: "no caller identity".to_string(),
            };
        };

        let Some(principal) = self.principals.iter().find(|p| p.id == identity) else {
            return AuthzDecision::Denied {
                reason: "principal not found".to_string(),
            };
        };

        if principal.cluster_admin {
            return AuthzDecision::Allowed;
        }

        // Namespace boundary enforcement
        if principal.namespaces.iter().any(|ns| ns == namespace) {
            AuthzDecision::Allowed
        } else {
            AuthzDecision::Denied {
                reason: format!("namespace boundary violation: {}", namespace),
            }
        }
    }

    /// Principals allowed to act in `namespace`.
    pub fn principals_for_namespace(&self, namespace: &str) -> Vec<&Principal> {
        self.principals
            .iter()
            .filter(|p| p.cluster_admin || p.namespaces.iter().any(|ns| ns == namespace))
            .collect()
    }
}

#[async_trait]
impl Authorizer for NamespacePolicy {
    async fn authorize(&self, caller: &CallerContext, namespace: &str) -> AuthzDecision {
        self.check(caller.identity.as_deref(), namespace)
    }
}
