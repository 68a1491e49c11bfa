use axum::{http::StatusCode, response::IntoResponse};
use lazy_static::lazy_static;
use prometheus::{
    CounterVec, Encoder, Gauge, Histogram, HistogramOpts, HistogramVec, Opts, Registry,
    TextEncoder,
};
use std::time::Duration;

/// Metric name prefix for all converter metrics
const PREFIX: &str = "mp3_converter";

lazy_static! {
    // Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    // HTTP Request Metrics
    pub static ref HTTP_REQUESTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_http_requests_total"), "Total number of HTTP requests"),
        &["method", "path", "status"]
    ).expect("Failed to create http_requests_total metric");

    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            format!("{PREFIX}_http_request_duration_seconds"),
            "HTTP request duration in seconds"
        )
        .buckets(vec![0.001, 0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0]),
        &["method", "path"]
    ).expect("Failed to create http_request_duration_seconds metric");

    // Conversion Metrics
    pub static ref CONVERSION_JOBS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_conversion_jobs_total"), "Conversion jobs by outcome"),
        &["outcome"]
    ).expect("Failed to create conversion_jobs_total metric");

    pub static ref CONVERSION_JOBS_ACTIVE: Gauge = Gauge::new(
        format!("{PREFIX}_conversion_jobs_active"),
        "Number of conversion jobs still processing"
    ).expect("Failed to create conversion_jobs_active metric");

    pub static ref CONVERSION_DURATION_SECONDS: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            format!("{PREFIX}_conversion_duration_seconds"),
            "Time from job acceptance to terminal state in seconds"
        )
        .buckets(vec![1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0])
    ).expect("Failed to create conversion_duration_seconds metric");

    // Storage Metrics
    pub static ref ARTIFACTS_RECLAIMED_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_artifacts_reclaimed_total"), "Artifacts deleted from disk"),
        &["reason"]
    ).expect("Failed to create artifacts_reclaimed_total metric");
}

/// Initialize all metrics and register them with the Prometheus registry
pub fn init_metrics() {
    // Register all metrics - ignore errors if already registered (for tests)
    let _ = REGISTRY.register(Box::new(HTTP_REQUESTS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(HTTP_REQUEST_DURATION_SECONDS.clone()));
    let _ = REGISTRY.register(Box::new(CONVERSION_JOBS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(CONVERSION_JOBS_ACTIVE.clone()));
    let _ = REGISTRY.register(Box::new(CONVERSION_DURATION_SECONDS.clone()));
    let _ = REGISTRY.register(Box::new(ARTIFACTS_RECLAIMED_TOTAL.clone()));

    tracing::info!("Metrics system initialized successfully");
}

/// Record an HTTP request
pub fn record_http_request(method: &str, path: &str, status: u16, duration: Duration) {
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method, path, &status.to_string()])
        .inc();

    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[method, path])
        .observe(duration.as_secs_f64());
}

/// Record an accepted conversion job
pub fn record_job_created() {
    CONVERSION_JOBS_TOTAL.with_label_values(&["created"]).inc();
    CONVERSION_JOBS_ACTIVE.inc();
}

/// Record a job reaching a terminal state
pub fn record_job_finished(outcome: &str, duration: Duration) {
    CONVERSION_JOBS_TOTAL.with_label_values(&[outcome]).inc();
    CONVERSION_JOBS_ACTIVE.dec();
    CONVERSION_DURATION_SECONDS.observe(duration.as_secs_f64());
}

/// Record an artifact deleted by the download finalizer or the retention sweeper
pub fn record_artifact_reclaimed(reason: &str) {
    ARTIFACTS_RECLAIMED_TOTAL.with_label_values(&[reason]).inc();
}

/// Handler for the /metrics endpoint
pub async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();

    let mut buffer = vec![];
    match encoder.encode(&metric_families, &mut buffer) {
        Ok(()) => {
            let response = String::from_utf8(buffer).unwrap_or_else(|_| String::from(""));
            (StatusCode::OK, response)
        }
        Err(e) => {
            tracing::error!("Failed to encode metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to encode metrics: {}", e),
            )
        }
    }
}
