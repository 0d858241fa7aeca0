//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Lifecycle transitions (open, close, reopen, ban, unban, close-all)
//! - Staff thread synchronization
//! - Audit events lost on the way to storage

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, Opts};

// =============================================================================
// Lifecycle Metrics
// =============================================================================

/// Lifecycle operations by outcome.
pub static TRANSITIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "ticketdesk_transitions_total",
            "Total lifecycle operations by outcome",
        ),
        // result: "applied", "unchanged", "not_found", "invalid_transition", "store_unavailable"
        &["operation", "result"],
    )
    .unwrap()
});

/// Tickets closed by close-all sweeps.
pub static BULK_CLOSED_TICKETS: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "ticketdesk_bulk_closed_tickets",
            "Number of tickets closed per close-all sweep",
        )
        .buckets(vec![0.0, 1.0, 5.0, 10.0, 50.0, 100.0, 500.0]),
        &[],
    )
    .unwrap()
});

// =============================================================================
// Thread Sync Metrics
// =============================================================================

/// Thread API calls by outcome.
pub static THREAD_SYNC_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "ticketdesk_thread_sync_total",
            "Total staff thread API calls",
        ),
        &["backend", "operation", "status"], // status: "success", "error"
    )
    .unwrap()
});

/// Thread API call duration.
pub static THREAD_SYNC_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "ticketdesk_thread_sync_duration_seconds",
            "Duration of staff thread API calls",
        )
        .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
        &["backend", "operation"],
    )
    .unwrap()
});

// =============================================================================
// Audit Metrics
// =============================================================================

/// Audit events lost before reaching the store.
pub static AUDIT_EVENTS_DROPPED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "ticketdesk_audit_events_dropped_total",
            "Audit events dropped before they were stored",
        ),
        &["reason"], // reason: "channel_full", "channel_closed", "write_failed"
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(TRANSITIONS_TOTAL.clone()),
        Box::new(BULK_CLOSED_TICKETS.clone()),
        Box::new(THREAD_SYNC_TOTAL.clone()),
        Box::new(THREAD_SYNC_DURATION.clone()),
        Box::new(AUDIT_EVENTS_DROPPED.clone()),
    ]
}
