use once_cell::sync::Lazy;
use prometheus::{
    CounterVec, Encoder, GaugeVec, HistogramVec, TextEncoder, register_counter_vec,
    register_gauge_vec, register_histogram_vec,
};

// Integration test metrics
pub static INTEGRATION_TESTS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "rcvtest_integration_tests_total",
        "Total integration tests run, by outcome",
        &["integration_type", "outcome"]
    )
    .unwrap()
});

pub static INTEGRATION_TEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "rcvtest_integration_test_duration_seconds",
        "Duration of the delivery attempt reported by the dispatcher",
        &["integration_type"],
        vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]
    )
    .unwrap()
});

pub static SECRET_PATCHES: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "rcvtest_secret_patches_total",
        "Secret patch attempts against stored receivers",
        &["result"]
    )
    .unwrap()
});

// Database pool metrics
pub static DB_POOL_SIZE: Lazy<GaugeVec> = Lazy::new(|| {
    register_gauge_vec!(
        "rcvtest_db_pool_connections",
        "Database connection pool size",
        &["state"]
    )
    .unwrap()
});

// HTTP metrics
pub static HTTP_REQUESTS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "rcvtest_http_requests_total",
        "Total HTTP requests",
        &["method", "route", "status_class"]
    )
    .unwrap()
});

pub static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "rcvtest_http_request_duration_seconds",
        "HTTP request duration in seconds",
        &["method", "route", "status_class"],
        vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    )
    .unwrap()
});

pub static HTTP_IN_FLIGHT: Lazy<GaugeVec> = Lazy::new(|| {
    register_gauge_vec!(
        "rcvtest_http_in_flight_requests",
        "In-flight HTTP requests",
        &["method", "route"]
    )
    .unwrap()
});

/// Generate Prometheus metrics output
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::warn!(error = %e, "failed to encode metrics");
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

/// Initialize all metrics (forces lazy statics to be created)
pub fn init_metrics() {
    Lazy::force(&INTEGRATION_TESTS);
    Lazy::force(&INTEGRATION_TEST_DURATION);
    Lazy::force(&SECRET_PATCHES);
    Lazy::force(&DB_POOL_SIZE);
    Lazy::force(&HTTP_REQUESTS_TOTAL);
    Lazy::force(&HTTP_REQUEST_DURATION);
    Lazy::force(&HTTP_IN_FLIGHT);
}

/// Update database pool metrics from sqlx pool stats
pub fn update_db_pool_metrics(pool: &sqlx::PgPool) {
    let size = pool.size() as f64;
    let idle = pool.num_idle() as f64;
    DB_POOL_SIZE.with_label_values(&["active"]).set(size - idle);
    DB_POOL_SIZE.with_label_values(&["idle"]).set(idle);
    DB_POOL_SIZE.with_label_values(&["total"]).set(size);
}
