//! Metrics definitions for Bearer Gate.
//!
//! All metrics follow Prometheus naming conventions:
//! - `gate_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded:
//! - `method`: HTTP methods
//! - `endpoint`: the four known routes plus `/other`
//! - `result`: hit, miss
//! - `status`: success, error (timeout for HTTP)
//! - `reason`: `AuthError::kind()` values plus `none`

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

const HTTP_REQUEST_BUCKETS: &[f64] = &[
    0.005, 0.010, 0.025, 0.050, 0.100, 0.200, 0.500, 1.000, 2.000,
];

const JWKS_REFRESH_BUCKETS: &[f64] = &[
    0.010, 0.050, 0.100, 0.250, 0.500, 1.000, 2.500, 5.000, 10.000,
];

fn builder() -> Result<PrometheusBuilder, String> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Prefix("gate_http_request".to_string()),
            HTTP_REQUEST_BUCKETS,
        )
        .map_err(|e| format!("Failed to set HTTP request buckets: {e}"))?
        // JWKS fetches are bounded by the fetch timeout (10s default)
        .set_buckets_for_metric(
            Matcher::Prefix("gate_jwks_refresh".to_string()),
            JWKS_REFRESH_BUCKETS,
        )
        .map_err(|e| format!("Failed to set JWKS refresh buckets: {e}"))
}

/// Initialize the global Prometheus recorder and return the handle
/// for serving metrics via HTTP.
///
/// Must be called before any metrics are recorded.
///
/// # Errors
///
/// Returns error if the recorder fails to install (e.g., already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    builder()?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {e}"))
}

/// Build a Prometheus handle without installing it globally.
///
/// For test servers, where several instances share one process.
pub fn detached_metrics_handle() -> Result<PrometheusHandle, String> {
    Ok(builder()?.build_recorder().handle())
}

// ============================================================================
// HTTP Request Metrics
// ============================================================================

/// Record HTTP request completion
///
/// Metric: `gate_http_requests_total`, `gate_http_request_duration_seconds`
/// Labels: `method`, `endpoint`, `status`
pub fn record_http_request(method: &str, endpoint: &str, status_code: u16, duration: Duration) {
    let normalized_endpoint = normalize_endpoint(endpoint);
    let status = categorize_status_code(status_code);

    histogram!("gate_http_request_duration_seconds",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint,
        "status" => status
    )
    .record(duration.as_secs_f64());

    counter!("gate_http_requests_total",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint,
        "status_code" => status_code.to_string()
    )
    .increment(1);
}

/// Categorize HTTP status code into success/error/timeout
fn categorize_status_code(status_code: u16) -> &'static str {
    match status_code {
        200..=299 => "success",
        408 | 504 => "timeout",
        _ => "error",
    }
}

/// Known routes keep their path; everything else is `/other`.
fn normalize_endpoint(path: &str) -> &'static str {
    match path {
        "/" => "/",
        "/protected" => "/protected",
        "/health" => "/health",
        "/metrics" => "/metrics",
        _ => "/other",
    }
}

// ============================================================================
// Authentication Metrics
// ============================================================================

/// Record one pass through the authentication gate
///
/// Metric: `gate_auth_attempts_total`
/// Labels: `outcome` (success, failure), `reason` (`AuthError::kind()` or none)
pub fn record_auth_attempt(outcome: &'static str, reason: &'static str) {
    counter!("gate_auth_attempts_total",
        "outcome" => outcome,
        "reason" => reason
    )
    .increment(1);
}

// ============================================================================
// JWKS Cache Metrics
// ============================================================================

/// Record a JWKS cache lookup
///
/// Metric: `gate_jwks_cache_total`
/// Labels: `result` (hit, miss)
pub fn record_jwks_cache(result: &'static str) {
    counter!("gate_jwks_cache_total", "result" => result).increment(1);
}

/// Record a JWKS fetch against the remote endpoint
///
/// Metric: `gate_jwks_refresh_total`, `gate_jwks_refresh_duration_seconds`
/// Labels: `status` (success, error)
pub fn record_jwks_refresh(status: &'static str, duration: Duration) {
    histogram!("gate_jwks_refresh_duration_seconds").record(duration.as_secs_f64());

    counter!("gate_jwks_refresh_total", "status" => status).increment(1);
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use metrics_util::debugging::{DebugValue, DebuggingRecorder};

    // Without a recorder installed these calls go to the no-op recorder;
    // tests that care about values use a local DebuggingRecorder.

    #[test]
    fn test_record_http_request() {
        record_http_request("GET", "/health", 200, Duration::from_millis(5));
        record_http_request("GET", "/protected", 401, Duration::from_millis(10));
        record_http_request("GET", "/nope", 404, Duration::from_millis(1));
        record_http_request("GET", "/protected", 504, Duration::from_secs(30));
    }

    #[test]
    fn test_categorize_status_code() {
        assert_eq!(categorize_status_code(200), "success");
        assert_eq!(categorize_status_code(204), "success");
        assert_eq!(categorize_status_code(401), "error");
        assert_eq!(categorize_status_code(500), "error");
        assert_eq!(categorize_status_code(408), "timeout");
        assert_eq!(categorize_status_code(504), "timeout");
    }

    #[test]
    fn test_normalize_endpoint() {
        assert_eq!(normalize_endpoint("/"), "/");
        assert_eq!(normalize_endpoint("/protected"), "/protected");
        assert_eq!(normalize_endpoint("/health"), "/health");
        assert_eq!(normalize_endpoint("/metrics"), "/metrics");
        assert_eq!(normalize_endpoint("/protected/extra"), "/other");
        assert_eq!(normalize_endpoint("/admin"), "/other");
    }

    #[test]
    fn test_auth_and_jwks_counters() {
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();

        metrics::with_local_recorder(&recorder, || {
            record_auth_attempt("success", "none");
            record_auth_attempt("failure", "key_not_found");
            record_auth_attempt("failure", "key_not_found");
            record_jwks_cache("miss");
            record_jwks_cache("hit");
            record_jwks_cache("hit");
            record_jwks_refresh("success", Duration::from_millis(40));
        });

        let snapshot = snapshotter.snapshot().into_vec();
        let counter_value = |name: &str, label: (&str, &str)| -> u64 {
            snapshot
                .iter()
                .filter(|(key, _, _, _)| {
                    key.key().name() == name
                        && key
                            .key()
                            .labels()
                            .any(|l| l.key() == label.0 && l.value() == label.1)
                })
                .map(|(_, _, _, value)| match value {
                    DebugValue::Counter(count) => *count,
                    _ => 0,
                })
                .sum()
        };

        assert_eq!(
            counter_value("gate_auth_attempts_total", ("reason", "key_not_found")),
            2
        );
        assert_eq!(
            counter_value("gate_auth_attempts_total", ("outcome", "success")),
            1
        );
        assert_eq!(counter_value("gate_jwks_cache_total", ("result", "hit")), 2);
        assert_eq!(
            counter_value("gate_jwks_refresh_total", ("status", "success")),
            1
        );
    }

    #[test]
    fn test_detached_handle_renders() {
        let handle = detached_metrics_handle().unwrap();
        // Nothing is recorded through a recorder that was never installed
        assert!(!handle.render().contains("gate_auth_attempts_total"));
    }
}
