//! Structured observability hooks for batch lifecycle events.
//!
//! - batch-scoped tracing spans via [`batch_span`]
//! - emission functions for batch start/finish, per-device outcomes and plans
//!
//! Events are emitted at `info!` (failures at `warn!`); filter with `RUST_LOG`.

use tracing::{info, warn};
use uuid::Uuid;

/// Fresh identifier that ties together every log line of one batch call.
pub fn new_batch_id() -> String {
    format!("batch-{}", &Uuid::new_v4().simple().to_string()[..12])
}

/// Span that tags every event of one batch call with its id and operation.
///
/// Attach it to the batch future with `tracing::Instrument::instrument`; an
/// entered span guard must not be held across `.await`.
pub fn batch_span(batch_id: &str, operation: &str) -> tracing::Span {
    tracing::info_span!("netfleet.batch", batch_id = %batch_id, operation = %operation)
}

pub fn emit_batch_started(batch_id: &str, operation: &str, devices: usize, concurrency: usize) {
    info!(
        event = "batch.started",
        batch_id = %batch_id,
        operation = %operation,
        devices = devices,
        concurrency = concurrency,
    );
}

pub fn emit_device_finished(batch_id: &str, device: &str, elapsed_ms: u64) {
    info!(event = "device.finished", batch_id = %batch_id, device = %device, elapsed_ms = elapsed_ms);
}

pub fn emit_device_failed(batch_id: &str, device: &str, kind: &str, error: &dyn std::fmt::Display) {
    warn!(
        event = "device.failed",
        batch_id = %batch_id,
        device = %device,
        kind = %kind,
        error = %error,
    );
}

pub fn emit_batch_finished(batch_id: &str, succeeded: usize, failed: usize, duration_ms: u64) {
    info!(
        event = "batch.finished",
        batch_id = %batch_id,
        succeeded = succeeded,
        failed = failed,
        duration_ms = duration_ms,
    );
}

/// Emit event: a remediation plan was computed.
pub fn emit_plan_computed(role: &str, devices: usize, directives: usize, gaps: usize) {
    info!(
        event = "plan.computed",
        role = %role,
        devices = devices,
        directives = directives,
        gaps = gaps,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_ids_are_unique() {
        let a = new_batch_id();
        let b = new_batch_id();
        assert!(a.starts_with("batch-"));
        assert_eq!(a.len(), "batch-".len() + 12);
        assert_ne!(a, b);
    }

    #[test]
    fn test_batch_span_enters() {
        let span = batch_span("batch-test", "dispatch");
        let _guard = span.enter();
    }
}
