use prometheus::{Encoder, HistogramVec, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};
use std::sync::OnceLock;

// Global registry
pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

// Metrics
pub static HTTP_REQUESTS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
pub static HTTP_REQUEST_DURATION_SECONDS: OnceLock<HistogramVec> = OnceLock::new();
pub static SECRET_OPERATIONS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
pub static ACCESS_DENIED_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
pub static AUDIT_WRITE_FAILURES_TOTAL: OnceLock<IntCounter> = OnceLock::new();

pub fn init_metrics() {
    let registry = Registry::new();

    let requests_total = match IntCounterVec::new(
        Opts::new("http_requests_total", "Total number of HTTP requests"),
        &["method", "path", "status"],
    ) {
        Ok(metric) => metric,
        Err(e) => {
            tracing::error!("Failed to create http_requests_total metric: {}", e);
            panic!("Failed to initialize metrics: {}", e);
        }
    };

    let request_duration = match HistogramVec::new(
        prometheus::HistogramOpts::new(
            "http_request_duration_seconds",
            "HTTP request duration in seconds",
        ),
        &["method", "path", "status"],
    ) {
        Ok(metric) => metric,
        Err(e) => {
            tracing::error!(
                "Failed to create http_request_duration_seconds metric: {}",
                e
            );
            panic!("Failed to initialize metrics: {}", e);
        }
    };

    let secret_operations = match IntCounterVec::new(
        Opts::new("secret_operations_total", "Secret operations by kind"),
        &["operation"],
    ) {
        Ok(metric) => metric,
        Err(e) => {
            tracing::error!("Failed to create secret_operations_total metric: {}", e);
            panic!("Failed to initialize metrics: {}", e);
        }
    };

    let access_denied = match IntCounterVec::new(
        Opts::new("access_denied_total", "Scope denials by reason"),
        &["reason"],
    ) {
        Ok(metric) => metric,
        Err(e) => {
            tracing::error!("Failed to create access_denied_total metric: {}", e);
            panic!("Failed to initialize metrics: {}", e);
        }
    };

    let audit_write_failures = match IntCounter::new(
        "audit_write_failures_total",
        "Audit trail writes that could not be persisted",
    ) {
        Ok(metric) => metric,
        Err(e) => {
            tracing::error!("Failed to create audit_write_failures_total metric: {}", e);
            panic!("Failed to initialize metrics: {}", e);
        }
    };

    for collector in [
        Box::new(requests_total.clone()) as Box<dyn prometheus::core::Collector>,
        Box::new(request_duration.clone()),
        Box::new(secret_operations.clone()),
        Box::new(access_denied.clone()),
        Box::new(audit_write_failures.clone()),
    ] {
        if let Err(e) = registry.register(collector) {
            tracing::error!("Failed to register metrics collector: {}", e);
            panic!("Failed to initialize metrics: {}", e);
        }
    }

    // Initialize globals
    let _ = REGISTRY.set(registry);
    let _ = HTTP_REQUESTS_TOTAL.set(requests_total);
    let _ = HTTP_REQUEST_DURATION_SECONDS.set(request_duration);
    let _ = SECRET_OPERATIONS_TOTAL.set(secret_operations);
    let _ = ACCESS_DENIED_TOTAL.set(access_denied);
    let _ = AUDIT_WRITE_FAILURES_TOTAL.set(audit_write_failures);
}

pub fn record_secret_operation(operation: &str) {
    if let Some(counter) = SECRET_OPERATIONS_TOTAL.get() {
        counter.with_label_values(&[operation]).inc();
    }
}

pub fn record_access_denied(reason: &str) {
    if let Some(counter) = ACCESS_DENIED_TOTAL.get() {
        counter.with_label_values(&[reason]).inc();
    }
}

pub fn record_audit_write_failure() {
    if let Some(counter) = AUDIT_WRITE_FAILURES_TOTAL.get() {
        counter.inc();
    }
}

pub fn get_metrics() -> String {
    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();

    let registry = match REGISTRY.get() {
        Some(r) => r,
        None => {
            tracing::error!("Metrics registry not initialized");
            return "# Metrics registry not initialized\n".to_string();
        }
    };

    let metric_families = registry.gather();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
        return format!("# Failed to encode metrics: {}\n", e);
    }

    match String::from_utf8(buffer) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!("Failed to convert metrics to UTF-8: {}", e);
            format!("# Failed to convert metrics to UTF-8: {}\n", e)
        }
    }
}
