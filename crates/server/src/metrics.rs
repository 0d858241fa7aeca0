//! Prometheus metrics for observability.
//!
//! This module provides metrics for monitoring the ticketdesk server:
//! - HTTP request metrics (latency, counts), labelled by route template
//! - Tickets by status and index size (collected dynamically)
//! - Core lifecycle and thread sync metrics, registered from the core crate

use once_cell::sync::Lazy;
use prometheus::{
    self, Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, IntGaugeVec, Opts,
    Registry, TextEncoder,
};
use ticketdesk_core::{TicketFilter, TicketStatus};

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

// =============================================================================
// HTTP Request Metrics
// =============================================================================

/// HTTP request duration in seconds.
pub static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "ticketdesk_http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
        ]),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests total count.
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("ticketdesk_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests currently in flight.
pub static HTTP_REQUESTS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "ticketdesk_http_requests_in_flight",
        "Number of HTTP requests currently being processed",
    )
    .unwrap()
});

// =============================================================================
// Ticket Metrics (collected dynamically)
// =============================================================================

/// Tickets by current status.
pub static TICKETS_BY_STATUS: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new("ticketdesk_tickets_by_status", "Current ticket count by status"),
        &["status"],
    )
    .unwrap()
});

/// Users with an entry in the in-memory ticket index.
pub static INDEX_ENTRIES: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "ticketdesk_index_entries",
        "Number of users tracked by the in-memory ticket index",
    )
    .unwrap()
});

// =============================================================================
// Registration
// =============================================================================

fn register_metrics(registry: &Registry) {
    // HTTP
    registry
        .register(Box::new(HTTP_REQUEST_DURATION.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_IN_FLIGHT.clone()))
        .unwrap();

    // Tickets
    registry
        .register(Box::new(TICKETS_BY_STATUS.clone()))
        .unwrap();
    registry.register(Box::new(INDEX_ENTRIES.clone())).unwrap();

    // Core metrics (lifecycle transitions, thread sync)
    for metric in ticketdesk_core::metrics::all_metrics() {
        registry.register(metric).unwrap();
    }
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

/// Collect dynamic metrics from current application state.
///
/// Called before encoding so the gauges reflect the store and index as they
/// are now.
pub async fn collect_dynamic_metrics(state: &crate::state::AppState) {
    let ticket_store = state.ticket_store();
    for status in [TicketStatus::Open, TicketStatus::Closed, TicketStatus::Banned] {
        let filter = TicketFilter::new().with_status(status);
        if let Ok(count) = ticket_store.count(&filter) {
            TICKETS_BY_STATUS
                .with_label_values(&[status.as_str()])
                .set(count);
        }
    }

    INDEX_ENTRIES.set(state.engine().index().len().await as i64);
}
