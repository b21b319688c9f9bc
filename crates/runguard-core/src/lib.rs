//! Runguard-Core: Authorization-Scoped Run Orchestration
//!
//! This crate decides, for every operation on a Run, whether the caller may
//! touch it and whether the request is well-formed, before anything is
//! delegated to a [`runguard_engine::RunEngine`].
//!
//! ## Layer 1 - Orchestration
//!
//! Focus: namespace resolution, multi-tenant authorization, request
//! validation, and partial-failure metric batches.
//!
//! ## Key Components
//!
//! - `RunServer`: Per-operation handlers (create/get/list/archive/unarchive/
//!   delete/terminate/retry/report-metrics/read-artifact)
//! - `AccessResolver` / `AccessGate`: Reference → namespace → authorizer
//! - `NamespacePolicy`: Static namespace RBAC `Authorizer`
//! - `RequestValidator`: Create-run spec / pipeline-version fallback
//! - `BatchReporter`: Ordered per-item metric results
//! - `ServerConfig`: Authorization mode and reporting access, from TOML/env

pub mod access;
pub mod authz;
pub mod batch;
pub mod config;
pub mod domain;
pub mod metrics;
pub mod obs;
pub mod server;
pub mod telemetry;

pub use access::{AccessGate, AccessResolver};
pub use authz::{Authorizer, AuthzDecision, CallerContext, NamespacePolicy, Principal};
pub use batch::BatchReporter;
pub use config::{AuthorizationMode, ConfigError, MetricsReportingAccess, ServerConfig};
pub use domain::error::{ApiResult, ErrorKind, RunApiError};
pub use domain::request::*;
pub use domain::validation::{validate_run_metric, MetricValidationError, RequestValidator};
pub use server::RunServer;

/// Runguard version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
