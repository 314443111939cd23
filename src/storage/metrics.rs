//! Operation metrics shared by every repository backend.

use std::time::Instant;

/// Records operation metrics for repository operations.
///
/// Emits two metrics per call:
/// 1. `storage_operations_total` - Counter by backend, operation and status
/// 2. `storage_operation_duration_ms` - Latency histogram with the same labels
///
/// # Arguments
///
/// * `backend` - Backend name (`"sqlite"`, `"supabase"`, `"fake"`)
/// * `operation` - Repository operation name
/// * `start` - Operation start time from `Instant::now()`
/// * `status` - `"success"` or `"error"`
pub fn record_operation_metrics(
    backend: &'static str,
    operation: &'static str,
    start: Instant,
    status: &'static str,
) {
    metrics::counter!(
        "storage_operations_total",
        "backend" => backend,
        "operation" => operation,
        "status" => status
    )
    .increment(1);
    metrics::histogram!(
        "storage_operation_duration_ms",
        "backend" => backend,
        "operation" => operation,
        "status" => status
    )
    .record(start.elapsed().as_secs_f64() * 1000.0);
}

/// Records metrics for a finished operation from its result.
pub fn observe<T>(
    backend: &'static str,
    operation: &'static str,
    start: Instant,
    result: &crate::Result<T>,
) {
    let status = if result.is_ok() { "success" } else { "error" };
    if let Err(e) = result {
        tracing::debug!(backend, operation, error = %e, "repository operation failed");
    }
    record_operation_metrics(backend, operation, start, status);
}
