use std::net::SocketAddr;

// ── Request-driven metrics ──────────────────────────────────────

/// Counter: bookings admitted.
pub const BOOKINGS_CREATED_TOTAL: &str = "roombook_bookings_created_total";

/// Counter: booking requests rejected because the slot was taken.
pub const BOOKING_CONFLICTS_TOTAL: &str = "roombook_booking_conflicts_total";

/// Counter: bookings cancelled.
pub const BOOKINGS_CANCELLED_TOTAL: &str = "roombook_bookings_cancelled_total";

/// Counter: join items reported as omitted. Labels: view.
pub const JOINS_OMITTED_TOTAL: &str = "roombook_joins_omitted_total";

/// Histogram: service operation latency in seconds. Labels: operation, status.
pub const OPERATION_DURATION_SECONDS: &str = "roombook_operation_duration_seconds";

// ── Store metrics ───────────────────────────────────────────────

/// Gauge: records held by the store.
pub const STORE_RECORDS: &str = "roombook_records";

/// Histogram: record log group-commit flush duration in seconds.
pub const LOG_FLUSH_DURATION_SECONDS: &str = "roombook_log_flush_duration_seconds";

/// Histogram: record log group-commit batch size (appends per flush).
pub const LOG_FLUSH_BATCH_SIZE: &str = "roombook_log_flush_batch_size";

/// Install the Prometheus exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}

/// Record one service call's latency and outcome.
pub fn record_operation(operation: &'static str, ok: bool, started: std::time::Instant) {
    let status = if ok { "ok" } else { "error" };
    metrics::histogram!(OPERATION_DURATION_SECONDS, "operation" => operation, "status" => status)
        .record(started.elapsed().as_secs_f64());
}
