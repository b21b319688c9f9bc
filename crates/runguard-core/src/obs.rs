//! Structured observability hooks for runguard request handling.
//!
//! This module provides:
//! - Request-scoped tracing spans via [`request_span`]
//! - Emission functions for authorization outcomes, failed requests and
//!   metric batches
//!
//! Events are emitted at `info!`/`warn!` level; filter with `RUST_LOG`.

use tracing::{debug, info, warn};

use crate::authz::CallerContext;
use crate::domain::error::RunApiError;

/// Span tagged with the operation name and request id.
///
/// Attach it with `tracing::Instrument::instrument` so it follows the
/// request future across `.await` points.
pub fn request_span(op: &'static str, caller: &CallerContext) -> tracing::Span {
    tracing::info_span!("runguard.request", op = op, request_id = %caller.request_id)
}

/// Emit event: caller passed the namespace check.
pub fn emit_request_authorized(op: &str, namespace: &str) {
    info!(event = "authz.allowed", op = %op, namespace = %namespace);
}

/// Emit event: caller was denied. The reason stays in the server log.
pub fn emit_authorization_denied(op: &str, namespace: &str, reason: &str) {
    warn!(event = "authz.denied", op = %op, namespace = %namespace);
    debug!(event = "authz.denied_reason", op = %op, reason = %reason);
}

/// Emit event: an operation returned an error.
pub fn emit_request_failed(op: &str, error: &RunApiError) {
    warn!(
        event = "request.failed",
        op = %op,
        kind = ?error.kind(),
        error = %error,
    );
}

/// Emit event: a metrics batch was processed.
pub fn emit_metrics_reported(run_id: &str, total: usize, recorded: usize, failed: usize) {
    info!(
        event = "metrics.reported",
        run_id = %run_id,
        total = total,
        recorded = recorded,
        failed = failed,
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    #[test]
    fn request_span_create() {
        // Just ensure building the span doesn't panic
        let caller = CallerContext::new("alice");
        let _span = request_span("get_run", &caller);
    }

    #[traced_test]
    #[test]
    fn denial_reason_logged_separately() {
        emit_authorization_denied("get_run", "team-b", "namespace boundary violation: team-b");
        assert!(logs_contain("authz.denied"));
        assert!(logs_contain("namespace boundary violation"));
    }

    #[traced_test]
    #[test]
    fn failed_request_logs_kind() {
        emit_request_failed("create_run", &RunApiError::invalid_input("The run name is empty"));
        assert!(logs_contain("request.failed"));
        assert!(logs_contain("InvalidInput"));
    }
}
