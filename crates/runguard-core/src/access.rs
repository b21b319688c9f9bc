//! Namespace resolution and the multi-tenant access gate.
//!
//! [`AccessResolver`] maps a resource reference (or a run id) to the
//! namespace a caller must be authorized against. [`AccessGate`] combines
//! it with the configured [`AuthorizationMode`] and an [`Authorizer`]:
//! in single-tenant mode every check passes without touching the engine;
//! in multi-tenant mode a check passes only if resolution succeeded and
//! the authorizer allowed the caller. Any gap fails closed.

use std::sync::Arc;

use runguard_engine::{
    FilterContext, Relationship, ResourceKey, ResourceReference, ResourceType, RunEngine,
};

use crate::authz::{Authorizer, AuthzDecision, CallerContext};
use crate::config::AuthorizationMode;
use crate::domain::error::{ApiResult, RunApiError};
use crate::metrics::METRICS;
use crate::obs;

/// Resolves resource references to owning namespaces.
#[derive(Clone)]
pub struct AccessResolver {
    engine: Arc<dyn RunEngine>,
}

impl AccessResolver {
    pub fn new(engine: Arc<dyn RunEngine>) -> Self {
        Self { engine }
    }

    /// Namespace scoped by `key`.
    ///
    /// - `Namespace`: the id itself (must be non-empty).
    /// - `Experiment` / `ExperimentUUID`: the experiment's owning namespace,
    ///   looked up by experiment id (must be non-empty).
    /// - anything else: `InvalidInput`.
    pub async fn resolve_namespace(&self, key: &ResourceKey) -> ApiResult<String> {
        match key.resource_type {
            ResourceType::Namespace => {
                if key.id.is_empty() {
                    return Err(RunApiError::invalid_input(
                        "Invalid resource reference. Namespace is empty.",
                    ));
                }
                Ok(key.id.clone())
            }
            t if t.is_experiment() => {
                if key.id.is_empty() {
                    return Err(RunApiError::invalid_input(
                        "Invalid resource reference. Experiment ID is empty.",
                    ));
                }
                self.resolve_experiment_namespace(&key.id).await
            }
            _ => Err(RunApiError::invalid_input(format!(
                "Invalid resource reference for authorization. Got {}",
                key
            ))),
        }
    }

    async fn resolve_experiment_namespace(&self, experiment_id: &str) -> ApiResult<String> {
        let namespace = self
            .engine
            .namespace_for_experiment(experiment_id)
            .await
            .map_err(|e| {
                RunApiError::from(e).context(format!("Failed to get experiment {}", experiment_id))
            })?;
        if namespace.is_empty() {
            return Err(RunApiError::internal(format!(
                "Experiment {} doesn't have a namespace",
                experiment_id
            )));
        }
        Ok(namespace)
    }

    /// Namespace owning a stored run.
    ///
    /// An empty namespace for an existing run is a data-integrity fault and
    /// reported as `Internal`, not as a caller error.
    pub async fn resolve_namespace_for_run(&self, run_id: &str) -> ApiResult<String> {
        let namespace = self
            .engine
            .namespace_for_run(run_id)
            .await
            .map_err(|e| RunApiError::from(e).context("Failed to authorize with the run ID"))?;
        if namespace.is_empty() {
            return Err(RunApiError::internal(format!(
                "There is no namespace found for run {}",
                run_id
            )));
        }
        Ok(namespace)
    }
}

/// Owner references of a run that scope its authorization.
pub fn scoping_references(references: &[ResourceReference]) -> Vec<&ResourceKey> {
    references
        .iter()
        .filter(|r| r.relationship == Relationship::Owner)
        .map(|r| &r.key)
        .filter(|k| k.resource_type == ResourceType::Namespace || k.resource_type.is_experiment())
        .collect()
}

/// Mode-aware authorization front end used by every operation.
#[derive(Clone)]
pub struct AccessGate {
    mode: AuthorizationMode,
    resolver: AccessResolver,
    authorizer: Arc<dyn Authorizer>,
}

impl AccessGate {
    pub fn new(
        mode: AuthorizationMode,
        engine: Arc<dyn RunEngine>,
        authorizer: Arc<dyn Authorizer>,
    ) -> Self {
        Self {
            mode,
            resolver: AccessResolver::new(engine),
            authorizer,
        }
    }

    pub fn mode(&self) -> AuthorizationMode {
        self.mode
    }

    pub fn resolver(&self) -> &AccessResolver {
        &self.resolver
    }

    /// Ask the authorizer about an already-resolved namespace.
    pub async fn authorize_namespace(
        &self,
        op: &str,
        caller: &CallerContext,
        namespace: &str,
    ) -> ApiResult<()> {
        match self.authorizer.authorize(caller, namespace).await {
            AuthzDecision::Allowed => {
                obs::emit_request_authorized(op, namespace);
                Ok(())
            }
            AuthzDecision::Denied { reason } => {
                METRICS.inc_denials();
                obs::emit_authorization_denied(op, namespace, &reason);
                Err(RunApiError::AuthorizationDenied)
            }
        }
    }

    /// Single-run check: run → namespace → authorizer.
    pub async fn authorize_run(
        &self,
        op: &str,
        caller: &CallerContext,
        run_id: &str,
    ) -> ApiResult<()> {
        if !self.mode.is_multi_tenant() {
            return Ok(());
        }
        let namespace = self.resolver.resolve_namespace_for_run(run_id).await?;
        self.authorize_namespace(op, caller, &namespace)
            .await
            .map_err(|e| e.context("Failed to authorize with API resource references"))
    }

    /// Creation check: every owning namespace/experiment reference must
    /// resolve and pass; having none is invalid input.
    pub async fn authorize_references(
        &self,
        op: &str,
        caller: &CallerContext,
        references: &[ResourceReference],
    ) -> ApiResult<()> {
        if !self.mode.is_multi_tenant() {
            return Ok(());
        }
        let keys = scoping_references(references);
        if keys.is_empty() {
            return Err(RunApiError::invalid_input(
                "An owning experiment or namespace reference is required in multi-tenant mode.",
            ));
        }
        for key in keys {
            let namespace = self.resolver.resolve_namespace(key).await?;
            self.authorize_namespace(op, caller, &namespace)
                .await
                .map_err(|e| e.context(format!("Failed to authorize with {}", key)))?;
        }
        Ok(())
    }

    /// Listing check: the filter must be scoped by a namespace or an
    /// experiment (or its legacy alias) the caller may access.
    pub async fn authorize_list_filter(
        &self,
        op: &str,
        caller: &CallerContext,
        filter: &FilterContext,
    ) -> ApiResult<()> {
        if !self.mode.is_multi_tenant() {
            return Ok(());
        }
        let Some(key) = &filter.reference_key else {
            return Err(RunApiError::invalid_input(
                "ListRuns must filter by resource reference in multi-tenant mode.",
            ));
        };
        let label = match key.resource_type {
            ResourceType::Namespace => "Failed to authorize with namespace resource reference",
            t if t.is_experiment() => "Failed to authorize with experiment resource reference",
            _ => {
                return Err(RunApiError::invalid_input(format!(
                    "Invalid resource references for ListRuns. Got {}",
                    key
                )))
            }
        };
        let namespace = self.resolver.resolve_namespace(key).await?;
        self.authorize_namespace(op, caller, &namespace)
            .await
            .map_err(|e| e.context(label))
    }
}
