// Prometheus metrics definitions for the Runestone backend.

use lazy_static::lazy_static;
use prometheus::{
    Encoder, Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts,
    Registry, TextEncoder,
};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    // ── Gauges ───────────────────────────────────────────────────────

    /// Teams currently held in the store.
    pub static ref TEAMS: IntGauge =
        IntGauge::new("runestone_teams", "Teams currently in the store").unwrap();

    // ── Counters ─────────────────────────────────────────────────────

    /// Total teams created.
    pub static ref TEAMS_CREATED_TOTAL: IntCounter =
        IntCounter::new("runestone_teams_created_total", "Total teams created").unwrap();

    /// Total fragments marked solved (re-submissions not counted).
    pub static ref FRAGMENTS_COMPLETED_TOTAL: IntCounter = IntCounter::new(
        "runestone_fragments_completed_total",
        "Total fragments solved",
    )
    .unwrap();

    /// Full-password guesses, by result (accepted, rejected).
    pub static ref VERIFY_ATTEMPTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("runestone_verify_attempts_total", "Full password verification attempts"),
        &["result"],
    )
    .unwrap();

    /// Total API requests, by method/endpoint/status.
    pub static ref API_REQUESTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("runestone_api_requests_total", "Total API requests"),
        &["method", "endpoint", "status"],
    )
    .unwrap();

    // ── Histograms ───────────────────────────────────────────────────

    /// Time to persist the store document, in seconds.
    pub static ref STORE_WRITE_DURATION_SECONDS: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "runestone_store_write_duration_seconds",
            "Store document write duration in seconds",
        )
        .buckets(vec![0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.5]),
    )
    .unwrap();

    /// API request duration in seconds, by endpoint.
    pub static ref API_REQUEST_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "runestone_api_request_duration_seconds",
            "API request duration in seconds",
        )
        .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 5.0]),
        &["endpoint"],
    )
    .unwrap();
}

/// Register all metrics with the custom registry. Call once at startup;
/// repeated calls leave the registry unchanged.
pub fn register_metrics() {
    let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(TEAMS.clone()),
        Box::new(TEAMS_CREATED_TOTAL.clone()),
        Box::new(FRAGMENTS_COMPLETED_TOTAL.clone()),
        Box::new(VERIFY_ATTEMPTS_TOTAL.clone()),
        Box::new(API_REQUESTS_TOTAL.clone()),
        Box::new(STORE_WRITE_DURATION_SECONDS.clone()),
        Box::new(API_REQUEST_DURATION_SECONDS.clone()),
    ];

    for c in collectors {
        match REGISTRY.register(c) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => tracing::warn!("Failed to register metric: {e}"),
        }
    }
}

/// Serialize all registered metrics to the Prometheus text exposition format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::warn!("Failed to encode metrics: {e}");
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

/// Normalize a URL path for metric labels: team ids become `:id` and numeric
/// segments (fragment indexes) become `:index`.
pub fn normalize_path(path: &str) -> String {
    path.split('/')
        .map(|segment| {
            if uuid::Uuid::parse_str(segment).is_ok() {
                ":id"
            } else if !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit()) {
                ":index"
            } else {
                segment
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}
