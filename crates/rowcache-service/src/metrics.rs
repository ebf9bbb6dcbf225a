//! Prometheus metrics for statement materialization and view building.
//!
//! Globals are registered with the default registry on first use. [`ServiceStats`] keeps
//! per-service counters that can be read without going through the registry.

use once_cell::sync::Lazy;
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, Encoder, Histogram,
    IntCounter, IntCounterVec, TextEncoder,
};
use std::sync::atomic::{AtomicU64, Ordering};

/// Statements submitted to the upstream engine
pub static STATEMENTS_SUBMITTED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "rowcache_statements_submitted_total",
        "Statements submitted to the upstream engine"
    )
    .expect("Failed to register statements counter")
});

/// Pages written, by cache ("base" or "view")
pub static PAGES_STORED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "rowcache_pages_stored_total",
        "Row pages written to the cache",
        &["cache"]
    )
    .expect("Failed to register pages counter")
});

/// View requests by outcome ("hit", "built", "fallback")
pub static VIEW_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "rowcache_view_requests_total",
        "Sorted/filtered row requests by outcome",
        &["outcome"]
    )
    .expect("Failed to register view request counter")
});

/// Row requests that gave up waiting for a missing page
pub static PAGE_WAIT_TIMEOUTS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "rowcache_page_wait_timeouts_total",
        "Row requests whose bounded page wait expired"
    )
    .expect("Failed to register page wait counter")
});

/// View build latency (seconds)
pub static VIEW_BUILD_DURATION_SECONDS: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "rowcache_view_build_duration_seconds",
        "View build latency in seconds",
        vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    )
    .expect("Failed to register view build histogram")
});

/// Exports all registered metrics in Prometheus text format.
pub fn export_prometheus() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();

    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
    }

    String::from_utf8(buffer).unwrap_or_else(|e| {
        tracing::error!("Failed to convert metrics to UTF-8: {}", e);
        String::from("# Error encoding metrics\n")
    })
}

/// Counters owned by one [`crate::ReportService`] and its scoped copies.
#[derive(Debug, Default)]
pub struct ServiceStats {
    statements_submitted: AtomicU64,
    view_hits: AtomicU64,
    view_builds: AtomicU64,
    view_fallbacks: AtomicU64,
    page_wait_timeouts: AtomicU64,
}

/// Point-in-time copy of [`ServiceStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub statements_submitted: u64,
    pub view_hits: u64,
    pub view_builds: u64,
    pub view_fallbacks: u64,
    pub page_wait_timeouts: u64,
    /// Stream tasks still filling the cache.
    pub active_streams: usize,
}

impl ServiceStats {
    pub(crate) fn record_submit(&self) {
        self.statements_submitted.fetch_add(1, Ordering::Relaxed);
        STATEMENTS_SUBMITTED_TOTAL.inc();
    }

    pub(crate) fn record_view_hit(&self) {
        self.view_hits.fetch_add(1, Ordering::Relaxed);
        VIEW_REQUESTS_TOTAL.with_label_values(&["hit"]).inc();
    }

    pub(crate) fn record_view_build(&self, seconds: f64) {
        self.view_builds.fetch_add(1, Ordering::Relaxed);
        VIEW_REQUESTS_TOTAL.with_label_values(&["built"]).inc();
        VIEW_BUILD_DURATION_SECONDS.observe(seconds);
    }

    pub(crate) fn record_view_fallback(&self) {
        self.view_fallbacks.fetch_add(1, Ordering::Relaxed);
        VIEW_REQUESTS_TOTAL.with_label_values(&["fallback"]).inc();
    }

    pub(crate) fn record_wait_timeout(&self) {
        self.page_wait_timeouts.fetch_add(1, Ordering::Relaxed);
        PAGE_WAIT_TIMEOUTS_TOTAL.inc();
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            statements_submitted: self.statements_submitted.load(Ordering::Relaxed),
            view_hits: self.view_hits.load(Ordering::Relaxed),
            view_builds: self.view_builds.load(Ordering::Relaxed),
            view_fallbacks: self.view_fallbacks.load(Ordering::Relaxed),
            page_wait_timeouts: self.page_wait_timeouts.load(Ordering::Relaxed),
            active_streams: 0,
        }
    }
}
